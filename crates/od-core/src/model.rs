//! Domain value types shared by every layer of the engine.
//!
//! Everything here lives in **domain space**: a time on the chart's time axis
//! and a price on its price axis. Device (pixel) coordinates are derived on
//! demand by the coordinate mapper and are never stored in the model.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

// ─── Time ────────────────────────────────────────────────────────────────

/// A point on the chart's time axis, in seconds.
///
/// Serialized as a bare number so persisted records stay readable.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Time(pub f64);

impl Time {
    pub const fn new(seconds: f64) -> Self {
        Self(seconds)
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Mirror of this time around zero. Used to build the left-hand
    /// "extend to boundary" sentinel from the right-hand one.
    pub fn mirrored(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive time range, e.g. the chart's currently visible window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub from: Time,
    pub to: Time,
}

impl TimeRange {
    pub fn new(from: Time, to: Time) -> Self {
        if from.0 <= to.0 {
            Self { from, to }
        } else {
            Self { from: to, to: from }
        }
    }

    pub fn contains(&self, t: Time) -> bool {
        t.0 >= self.from.0 && t.0 <= self.to.0
    }
}

// ─── Drawing points ──────────────────────────────────────────────────────

/// A domain coordinate. The only coordinate representation ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawingPoint {
    pub time: Time,
    pub price: f64,
}

impl DrawingPoint {
    pub const fn new(time: Time, price: f64) -> Self {
        Self { time, price }
    }

    pub fn is_finite(&self) -> bool {
        self.time.is_finite() && self.price.is_finite()
    }
}

/// Ordered control points of an annotation. Every shape stores one or two.
pub type ControlPoints = SmallVec<[DrawingPoint; 2]>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_normalizes_order() {
        let r = TimeRange::new(Time(50.0), Time(10.0));
        assert_eq!(r.from, Time(10.0));
        assert_eq!(r.to, Time(50.0));
        assert!(r.contains(Time(10.0)));
        assert!(r.contains(Time(50.0)));
        assert!(!r.contains(Time(50.5)));
    }

    #[test]
    fn drawing_point_serializes_time_as_number() {
        let p = DrawingPoint::new(Time(100.0), 50.5);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"time":100.0,"price":50.5}"#);
    }

    #[test]
    fn non_finite_points_are_detected() {
        assert!(!DrawingPoint::new(Time(f64::NAN), 1.0).is_finite());
        assert!(!DrawingPoint::new(Time(1.0), f64::INFINITY).is_finite());
        assert!(DrawingPoint::new(Time(1.0), 2.0).is_finite());
    }
}
