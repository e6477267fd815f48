//! Engine-wide tuning knobs.

use crate::model::Time;
use serde::Deserialize;
use std::time::Duration;

/// Far-future time used as the "extend to boundary" sentinel (year 3000).
/// The coordinate mapper resolves it to the visible-range edge.
pub const DEFAULT_EXTEND_TIME: Time = Time(32_503_680_000.0);

/// Configuration shared by the registry, the viewport controllers and the
/// hit tester.
///
/// Every field has a default; hosts can deserialize a partial JSON object
/// and the missing fields fall back.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Constant added to half the stroke width to form the hit tolerance.
    pub hit_tolerance: f64,

    /// Hit radius of endpoint handles (`point1` / `point2`), in pixels.
    pub handle_radius: f64,

    /// Pointer travel (px) that cancels the press-and-hold timer and turns
    /// the press into a drag.
    pub drag_threshold: f64,

    /// How long a press must be held still before it becomes a drag.
    pub hold_delay_ms: u64,

    /// Sentinel time that extended shapes pin their open endpoint to.
    pub extend_time: Time,

    /// Appended to the symbol to form the storage key.
    pub storage_suffix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hit_tolerance: 3.0,
            handle_radius: 6.0,
            drag_threshold: 4.0,
            hold_delay_ms: 200,
            extend_time: DEFAULT_EXTEND_TIME,
            storage_suffix: "-drawings".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON config object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn hold_delay(&self) -> Duration {
        Duration::from_millis(self.hold_delay_ms)
    }

    /// Hit tolerance for a shape stroked `stroke_width` pixels wide.
    pub fn tolerance_for(&self, stroke_width: f64) -> f64 {
        let half = if stroke_width.is_finite() && stroke_width > 0.0 {
            (stroke_width / 2.0).ceil()
        } else {
            0.0
        };
        half + self.hit_tolerance
    }

    /// Whether `t` is one of the two extend sentinels.
    pub fn is_extend_time(&self, t: Time) -> bool {
        t == self.extend_time || t == self.extend_time.mirrored()
    }
}
