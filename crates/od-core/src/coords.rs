//! Domain ↔ device coordinate mapping.
//!
//! The host chart owns the real scales. Its time axis is non-linear (bars,
//! gaps, whitespace) and a conversion is undefined for times it has no data
//! for. [`CoordinateMapper`] wraps the host's primitives and falls back to
//! the nearest visible-range boundary, which is what keeps extended shapes
//! drawable while the user pans and zooms.

use crate::model::{DrawingPoint, Time, TimeRange};
use kurbo::Point;

/// Scale primitives provided by the host chart.
///
/// Every method returns `None` when the conversion is undefined.
pub trait ChartScale {
    fn time_to_x(&self, time: Time) -> Option<f64>;
    fn x_to_time(&self, x: f64) -> Option<Time>;
    fn price_to_y(&self, price: f64) -> Option<f64>;
    fn y_to_price(&self, y: f64) -> Option<f64>;
    /// The currently visible time window.
    fn visible_range(&self) -> Option<TimeRange>;
    /// Pane size in device pixels: `(width, height)`.
    fn pane_size(&self) -> (f64, f64);
}

/// Wraps a [`ChartScale`], falling back to the visible boundary where the
/// scale has no answer.
pub struct CoordinateMapper<'a, S: ChartScale + ?Sized> {
    scale: &'a S,
}

impl<'a, S: ChartScale + ?Sized> CoordinateMapper<'a, S> {
    pub fn new(scale: &'a S) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> &'a S {
        self.scale
    }

    /// Time → x. Outside the data window the x of the nearest visible
    /// boundary is used instead, or the pane edge when that boundary has
    /// no coordinate either.
    pub fn time_to_x(&self, time: Time) -> Option<f64> {
        if !time.is_finite() {
            return None;
        }
        if let Some(x) = self.scale.time_to_x(time).filter(|x| x.is_finite()) {
            return Some(x);
        }
        let range = self.scale.visible_range()?;
        let (boundary, edge) = if time.0 >= range.to.0 {
            (range.to, self.scale.pane_size().0)
        } else if time.0 <= range.from.0 {
            (range.from, 0.0)
        } else {
            // A gap inside the visible window: no sensible fallback.
            return None;
        };
        // A boundary without a coordinate of its own pins to the pane edge.
        self.scale
            .time_to_x(boundary)
            .filter(|x| x.is_finite())
            .or(Some(edge))
    }

    /// x → time. Outside the data window the nearest visible boundary
    /// time is used instead.
    pub fn x_to_time(&self, x: f64) -> Option<Time> {
        if !x.is_finite() {
            return None;
        }
        if let Some(t) = self.scale.x_to_time(x).filter(|t| t.is_finite()) {
            return Some(t);
        }
        let range = self.scale.visible_range()?;
        let from_x = self.scale.time_to_x(range.from);
        let to_x = self.scale.time_to_x(range.to);
        match (from_x, to_x) {
            (Some(fx), Some(tx)) => {
                if (x - fx).abs() <= (x - tx).abs() {
                    Some(range.from)
                } else {
                    Some(range.to)
                }
            }
            (Some(_), None) => Some(range.from),
            (None, Some(_)) => Some(range.to),
            (None, None) => None,
        }
    }

    pub fn price_to_y(&self, price: f64) -> Option<f64> {
        if !price.is_finite() {
            return None;
        }
        self.scale.price_to_y(price).filter(|y| y.is_finite())
    }

    pub fn y_to_price(&self, y: f64) -> Option<f64> {
        if !y.is_finite() {
            return None;
        }
        self.scale.y_to_price(y).filter(|p| p.is_finite())
    }

    pub fn to_device(&self, point: DrawingPoint) -> Option<Point> {
        Some(Point::new(
            self.time_to_x(point.time)?,
            self.price_to_y(point.price)?,
        ))
    }

    pub fn to_domain(&self, point: Point) -> Option<DrawingPoint> {
        Some(DrawingPoint::new(
            self.x_to_time(point.x)?,
            self.y_to_price(point.y)?,
        ))
    }
}

// ─── Headless linear scale ───────────────────────────────────────────────

/// A linear time/price scale with a bounded data window.
///
/// Used for offline projection and in tests. Times outside `data` are
/// undefined, the same way a real chart has no coordinate for a time it
/// holds no bar for.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearScale {
    /// Times the chart holds data for.
    pub data: TimeRange,
    /// Times currently on screen (mapped onto `0..width`).
    pub visible: TimeRange,
    /// Prices mapped onto `height..0` (higher price → smaller y).
    pub price_min: f64,
    pub price_max: f64,
    pub width: f64,
    pub height: f64,
}

impl LinearScale {
    pub fn new(
        visible: TimeRange,
        price_min: f64,
        price_max: f64,
        width: f64,
        height: f64,
    ) -> Self {
        Self {
            data: visible,
            visible,
            price_min,
            price_max,
            width,
            height,
        }
    }

    /// Scroll the visible window by `dt` seconds.
    pub fn pan(&mut self, dt: f64) {
        self.visible = TimeRange::new(
            Time(self.visible.from.0 + dt),
            Time(self.visible.to.0 + dt),
        );
    }

    fn time_span(&self) -> f64 {
        self.visible.to.0 - self.visible.from.0
    }

    fn price_span(&self) -> f64 {
        self.price_max - self.price_min
    }
}

impl ChartScale for LinearScale {
    fn time_to_x(&self, time: Time) -> Option<f64> {
        if !self.data.contains(time) || self.time_span() <= 0.0 {
            return None;
        }
        Some((time.0 - self.visible.from.0) / self.time_span() * self.width)
    }

    fn x_to_time(&self, x: f64) -> Option<Time> {
        if self.width <= 0.0 {
            return None;
        }
        let t = Time(self.visible.from.0 + x / self.width * self.time_span());
        self.data.contains(t).then_some(t)
    }

    fn price_to_y(&self, price: f64) -> Option<f64> {
        if self.price_span() <= 0.0 {
            return None;
        }
        Some((self.price_max - price) / self.price_span() * self.height)
    }

    fn y_to_price(&self, y: f64) -> Option<f64> {
        if self.height <= 0.0 {
            return None;
        }
        Some(self.price_max - y / self.height * self.price_span())
    }

    /// The part of the visible window that holds data.
    fn visible_range(&self) -> Option<TimeRange> {
        let from = self.visible.from.0.max(self.data.from.0);
        let to = self.visible.to.0.min(self.data.to.0);
        (from <= to).then(|| TimeRange::new(Time(from), Time(to)))
    }

    fn pane_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1 px per second over 0..1000, 10 px per price unit over 0..100.
    fn scale() -> LinearScale {
        LinearScale::new(TimeRange::new(Time(0.0), Time(1000.0)), 0.0, 100.0, 1000.0, 1000.0)
    }

    #[test]
    fn direct_conversion_roundtrips() {
        let s = scale();
        let m = CoordinateMapper::new(&s);
        let p = DrawingPoint::new(Time(100.0), 50.0);
        let device = m.to_device(p).unwrap();
        assert_eq!(device, Point::new(100.0, 500.0));
        assert_eq!(m.to_domain(device), Some(p));
    }

    #[test]
    fn far_future_time_falls_back_to_right_boundary() {
        let s = scale();
        let m = CoordinateMapper::new(&s);
        assert_eq!(m.time_to_x(Time(1.0e12)), Some(1000.0));
        assert_eq!(m.time_to_x(Time(-1.0e12)), Some(0.0));
    }

    #[test]
    fn x_beyond_data_snaps_to_nearest_boundary_time() {
        let s = scale();
        let m = CoordinateMapper::new(&s);
        assert_eq!(m.x_to_time(1500.0), Some(Time(1000.0)));
        assert_eq!(m.x_to_time(-20.0), Some(Time(0.0)));
    }

    #[test]
    fn non_finite_inputs_never_panic() {
        let s = scale();
        let m = CoordinateMapper::new(&s);
        assert_eq!(m.time_to_x(Time(f64::NAN)), None);
        assert_eq!(m.price_to_y(f64::INFINITY), None);
        assert_eq!(m.x_to_time(f64::NEG_INFINITY), None);
        assert_eq!(m.y_to_price(f64::NAN), None);
    }

    #[test]
    fn panning_past_the_data_keeps_far_times_on_screen() {
        let mut s = scale();
        s.pan(50.0);
        assert_eq!(
            s.visible_range(),
            Some(TimeRange::new(Time(50.0), Time(1000.0)))
        );
        let m = CoordinateMapper::new(&s);
        assert_eq!(m.time_to_x(Time(1.0e12)), Some(950.0));
        assert_eq!(m.time_to_x(Time(300.0)), Some(250.0));
    }

    #[test]
    fn visible_window_outside_the_data_has_no_range() {
        let mut s = scale();
        s.pan(5000.0);
        assert_eq!(s.visible_range(), None);
    }

    /// Host scale whose time axis has no coordinates at all.
    struct BlankTimeAxis;

    impl ChartScale for BlankTimeAxis {
        fn time_to_x(&self, _: Time) -> Option<f64> {
            None
        }
        fn x_to_time(&self, _: f64) -> Option<Time> {
            None
        }
        fn price_to_y(&self, price: f64) -> Option<f64> {
            Some(price)
        }
        fn y_to_price(&self, y: f64) -> Option<f64> {
            Some(y)
        }
        fn visible_range(&self) -> Option<TimeRange> {
            Some(TimeRange::new(Time(0.0), Time(1000.0)))
        }
        fn pane_size(&self) -> (f64, f64) {
            (800.0, 600.0)
        }
    }

    #[test]
    fn unmappable_boundary_falls_back_to_pane_edge() {
        let m = CoordinateMapper::new(&BlankTimeAxis);
        assert_eq!(m.time_to_x(Time(1.0e12)), Some(800.0));
        assert_eq!(m.time_to_x(Time(-1.0e12)), Some(0.0));
        assert_eq!(m.time_to_x(Time(500.0)), None);
    }

    #[test]
    fn pan_moves_device_positions() {
        let mut s = scale();
        s.data = TimeRange::new(Time(-5000.0), Time(5000.0));
        s.pan(100.0);
        let m = CoordinateMapper::new(&s);
        assert_eq!(m.time_to_x(Time(200.0)), Some(100.0));
    }
}
