//! Shape kinds and their static dispatch table.
//!
//! Every behavior that differs per shape (point count, finalize hook,
//! whether the tool starts on hover, default style) is looked up through
//! [`ShapeKind::spec`], an exhaustive `match`, so adding a kind without a
//! table entry is a compile error.

use crate::model::{ControlPoints, DrawingPoint, Time};
use crate::style::StyleOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag selecting geometry, hit-test and finalize behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    Rectangle,
    RectangleExtended,
    Line,
    LineRay,
    HorizontalLine,
    HorizontalRay,
    VerticalLine,
    Fibonacci,
}

/// Finalize hook: post-processes control points once the required count is
/// reached. Must be idempotent: it is re-applied after every resize.
pub type FinalizeFn = fn(&mut ControlPoints, Time);

/// Static per-kind behavior.
pub struct ShapeSpec {
    pub kind: ShapeKind,
    /// Points the user places before the shape completes.
    pub required_points: usize,
    /// Points stored once finalized (some shapes expand a single click).
    pub stored_points: usize,
    /// Start drawing on the first hover instead of the first click.
    pub immediate_start: bool,
    /// One endpoint follows the visible-range boundary.
    pub extended: bool,
    pub finalize: FinalizeFn,
    pub default_style: fn() -> StyleOptions,
}

impl fmt::Debug for ShapeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeSpec")
            .field("kind", &self.kind)
            .field("required_points", &self.required_points)
            .field("stored_points", &self.stored_points)
            .field("immediate_start", &self.immediate_start)
            .field("extended", &self.extended)
            .finish()
    }
}

// ─── Finalize hooks ──────────────────────────────────────────────────────

fn keep(_: &mut ControlPoints, _: Time) {}

fn order_by_time(points: &mut ControlPoints) {
    if points.len() == 2 && points[0].time > points[1].time {
        points.swap(0, 1);
    }
}

fn finalize_rectangle(points: &mut ControlPoints, _extend: Time) {
    order_by_time(points);
}

fn finalize_rectangle_extended(points: &mut ControlPoints, extend: Time) {
    order_by_time(points);
    if let Some(right) = points.get_mut(1) {
        right.time = extend;
    }
}

fn finalize_horizontal_line(points: &mut ControlPoints, extend: Time) {
    if let Some(anchor) = points.first().copied() {
        points.clear();
        points.push(DrawingPoint::new(extend.mirrored(), anchor.price));
        points.push(DrawingPoint::new(extend, anchor.price));
    }
}

fn finalize_horizontal_ray(points: &mut ControlPoints, extend: Time) {
    if let Some(anchor) = points.first().copied() {
        points.truncate(1);
        points.push(DrawingPoint::new(extend, anchor.price));
    }
}

// ─── Table ───────────────────────────────────────────────────────────────

fn rectangle_style() -> StyleOptions {
    StyleOptions::defaults_for(ShapeKind::Rectangle)
}
fn rectangle_extended_style() -> StyleOptions {
    StyleOptions::defaults_for(ShapeKind::RectangleExtended)
}
fn line_style() -> StyleOptions {
    StyleOptions::defaults_for(ShapeKind::Line)
}
fn line_ray_style() -> StyleOptions {
    StyleOptions::defaults_for(ShapeKind::LineRay)
}
fn horizontal_line_style() -> StyleOptions {
    StyleOptions::defaults_for(ShapeKind::HorizontalLine)
}
fn horizontal_ray_style() -> StyleOptions {
    StyleOptions::defaults_for(ShapeKind::HorizontalRay)
}
fn vertical_line_style() -> StyleOptions {
    StyleOptions::defaults_for(ShapeKind::VerticalLine)
}
fn fibonacci_style() -> StyleOptions {
    StyleOptions::defaults_for(ShapeKind::Fibonacci)
}

static RECTANGLE: ShapeSpec = ShapeSpec {
    kind: ShapeKind::Rectangle,
    required_points: 2,
    stored_points: 2,
    immediate_start: false,
    extended: false,
    finalize: finalize_rectangle,
    default_style: rectangle_style,
};

static RECTANGLE_EXTENDED: ShapeSpec = ShapeSpec {
    kind: ShapeKind::RectangleExtended,
    required_points: 2,
    stored_points: 2,
    immediate_start: false,
    extended: true,
    finalize: finalize_rectangle_extended,
    default_style: rectangle_extended_style,
};

static LINE: ShapeSpec = ShapeSpec {
    kind: ShapeKind::Line,
    required_points: 2,
    stored_points: 2,
    immediate_start: false,
    extended: false,
    finalize: keep,
    default_style: line_style,
};

static LINE_RAY: ShapeSpec = ShapeSpec {
    kind: ShapeKind::LineRay,
    required_points: 2,
    stored_points: 2,
    immediate_start: false,
    extended: true,
    finalize: keep,
    default_style: line_ray_style,
};

static HORIZONTAL_LINE: ShapeSpec = ShapeSpec {
    kind: ShapeKind::HorizontalLine,
    required_points: 1,
    stored_points: 2,
    immediate_start: true,
    extended: true,
    finalize: finalize_horizontal_line,
    default_style: horizontal_line_style,
};

static HORIZONTAL_RAY: ShapeSpec = ShapeSpec {
    kind: ShapeKind::HorizontalRay,
    required_points: 1,
    stored_points: 2,
    immediate_start: true,
    extended: true,
    finalize: finalize_horizontal_ray,
    default_style: horizontal_ray_style,
};

static VERTICAL_LINE: ShapeSpec = ShapeSpec {
    kind: ShapeKind::VerticalLine,
    required_points: 1,
    stored_points: 1,
    immediate_start: true,
    extended: false,
    finalize: keep,
    default_style: vertical_line_style,
};

static FIBONACCI: ShapeSpec = ShapeSpec {
    kind: ShapeKind::Fibonacci,
    required_points: 2,
    stored_points: 2,
    immediate_start: false,
    extended: false,
    finalize: keep,
    default_style: fibonacci_style,
};

impl ShapeKind {
    pub const ALL: [ShapeKind; 8] = [
        ShapeKind::Rectangle,
        ShapeKind::RectangleExtended,
        ShapeKind::Line,
        ShapeKind::LineRay,
        ShapeKind::HorizontalLine,
        ShapeKind::HorizontalRay,
        ShapeKind::VerticalLine,
        ShapeKind::Fibonacci,
    ];

    pub fn spec(self) -> &'static ShapeSpec {
        match self {
            ShapeKind::Rectangle => &RECTANGLE,
            ShapeKind::RectangleExtended => &RECTANGLE_EXTENDED,
            ShapeKind::Line => &LINE,
            ShapeKind::LineRay => &LINE_RAY,
            ShapeKind::HorizontalLine => &HORIZONTAL_LINE,
            ShapeKind::HorizontalRay => &HORIZONTAL_RAY,
            ShapeKind::VerticalLine => &VERTICAL_LINE,
            ShapeKind::Fibonacci => &FIBONACCI,
        }
    }

    /// Persisted name, e.g. `rectangle-extended`.
    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::RectangleExtended => "rectangle-extended",
            ShapeKind::Line => "line",
            ShapeKind::LineRay => "line-ray",
            ShapeKind::HorizontalLine => "horizontal-line",
            ShapeKind::HorizontalRay => "horizontal-ray",
            ShapeKind::VerticalLine => "vertical-line",
            ShapeKind::Fibonacci => "fibonacci",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Rectangle family: box containment and 8-way resize handles.
    pub fn is_box(self) -> bool {
        matches!(self, ShapeKind::Rectangle | ShapeKind::RectangleExtended)
    }

    /// Run the finalize hook.
    pub fn finalize(self, points: &mut ControlPoints, extend: Time) {
        (self.spec().finalize)(points, extend);
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    const EXTEND: Time = Time(1.0e9);

    fn pt(t: f64, p: f64) -> DrawingPoint {
        DrawingPoint::new(Time(t), p)
    }

    #[test]
    fn table_entries_match_their_kind() {
        for kind in ShapeKind::ALL {
            let spec = kind.spec();
            assert_eq!(spec.kind, kind);
            assert!(spec.required_points <= spec.stored_points);
            assert_eq!(ShapeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ShapeKind::parse("triangle"), None);
    }

    #[test]
    fn serde_name_matches_persisted_name() {
        for kind in ShapeKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn rectangle_orders_left_point_first() {
        let mut points: ControlPoints = smallvec![pt(200.0, 80.0), pt(100.0, 50.0)];
        ShapeKind::Rectangle.finalize(&mut points, EXTEND);
        assert_eq!(points.as_slice(), &[pt(100.0, 50.0), pt(200.0, 80.0)]);
    }

    #[test]
    fn horizontal_ray_pins_later_endpoint_to_sentinel() {
        let mut points: ControlPoints = smallvec![pt(150.0, 42.5)];
        ShapeKind::HorizontalRay.finalize(&mut points, EXTEND);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], pt(150.0, 42.5));
        assert_eq!(points[1].time, EXTEND);
        assert_eq!(points[1].price, 42.5);
    }

    #[test]
    fn horizontal_line_spans_both_sentinels() {
        let mut points: ControlPoints = smallvec![pt(150.0, 10.0)];
        ShapeKind::HorizontalLine.finalize(&mut points, EXTEND);
        assert_eq!(points.as_slice(), &[pt(-1.0e9, 10.0), pt(1.0e9, 10.0)]);
    }

    #[test]
    fn finalize_is_idempotent() {
        for kind in ShapeKind::ALL {
            let mut points: ControlPoints = smallvec![pt(300.0, 20.0), pt(100.0, 60.0)];
            points.truncate(kind.spec().required_points);
            kind.finalize(&mut points, EXTEND);
            let once = points.clone();
            kind.finalize(&mut points, EXTEND);
            assert_eq!(points, once, "{kind} finalize is not idempotent");
            assert_eq!(points.len(), kind.spec().stored_points);
        }
    }
}
