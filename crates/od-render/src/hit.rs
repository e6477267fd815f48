//! Hit testing: containment and handle classification in device space.
//!
//! Handles are classified in a fixed order (endpoints before bodies,
//! corners before edges before inside) so a point maps to at most one
//! handle.

use crate::project::DeviceGeometry;
use kurbo::{Point, Rect};

/// A named grab region of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
    Inside,
    Point1,
    Point2,
    Middle,
}

/// Cursor the host should show for the current pointer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    #[default]
    Default,
    Pointer,
    Crosshair,
    Move,
    Grabbing,
    NsResize,
    EwResize,
    NwseResize,
    NeswResize,
}

impl Handle {
    pub fn as_str(self) -> &'static str {
        match self {
            Handle::TopLeft => "top-left",
            Handle::Top => "top",
            Handle::TopRight => "top-right",
            Handle::Right => "right",
            Handle::BottomRight => "bottom-right",
            Handle::Bottom => "bottom",
            Handle::BottomLeft => "bottom-left",
            Handle::Left => "left",
            Handle::Inside => "inside",
            Handle::Point1 => "point1",
            Handle::Point2 => "point2",
            Handle::Middle => "middle",
        }
    }

    /// Handles that translate the whole shape rather than reshape it.
    pub fn is_translate(self) -> bool {
        matches!(self, Handle::Inside | Handle::Middle)
    }

    pub fn cursor(self) -> CursorStyle {
        match self {
            Handle::TopLeft | Handle::BottomRight => CursorStyle::NwseResize,
            Handle::TopRight | Handle::BottomLeft => CursorStyle::NeswResize,
            Handle::Top | Handle::Bottom => CursorStyle::NsResize,
            Handle::Left | Handle::Right => CursorStyle::EwResize,
            Handle::Inside | Handle::Middle => CursorStyle::Move,
            Handle::Point1 | Handle::Point2 => CursorStyle::Pointer,
        }
    }
}

/// Hit distances for one shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitSlop {
    /// Body tolerance: `ceil(stroke / 2) + hit_tolerance`.
    pub edge: f64,
    /// Endpoint handle radius.
    pub handle: f64,
}

/// Euclidean distance from `p` to the segment `a`–`b`.
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.hypot2();
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// How far `p` lies outside `rect` along each axis (0 when inside).
fn outside(rect: Rect, p: Point) -> (f64, f64) {
    let dx = (rect.x0 - p.x).max(p.x - rect.x1).max(0.0);
    let dy = (rect.y0 - p.y).max(p.y - rect.y1).max(0.0);
    (dx, dy)
}

/// On or strictly closer than `tolerance`.
fn within(d: f64, tolerance: f64) -> bool {
    d <= 0.0 || d < tolerance
}

/// Whether `p` hits the shape body.
pub fn contains_point(geometry: &DeviceGeometry, p: Point, tolerance: f64) -> bool {
    match geometry {
        DeviceGeometry::Box { rect, .. } => {
            let (dx, dy) = outside(*rect, p);
            within(dx, tolerance) && within(dy, tolerance)
        }
        DeviceGeometry::Segment { p1, p2 } => distance_to_segment(p, *p1, *p2) <= tolerance,
        DeviceGeometry::Ray { p1, end, .. } => distance_to_segment(p, *p1, *end) <= tolerance,
        DeviceGeometry::HorizontalLine { y, x_start, x_end } => {
            let a = Point::new(*x_start, *y);
            let b = Point::new(*x_end, *y);
            distance_to_segment(p, a, b) <= tolerance
        }
        DeviceGeometry::HorizontalRay { origin, end_x } => {
            distance_to_segment(p, *origin, Point::new(*end_x, origin.y)) <= tolerance
        }
        DeviceGeometry::VerticalLine { x, y_start, y_end } => {
            let a = Point::new(*x, *y_start);
            let b = Point::new(*x, *y_end);
            distance_to_segment(p, a, b) <= tolerance
        }
        DeviceGeometry::Fibonacci { .. } => {
            let (dx, dy) = outside(geometry.bounds(), p);
            within(dx, tolerance) && within(dy, tolerance)
        }
    }
}

fn box_handle(rect: Rect, pinned_right: bool, p: Point, tol: f64) -> Option<Handle> {
    let (dx, dy) = outside(rect, p);
    if !(within(dx, tol) && within(dy, tol)) {
        return None;
    }
    let near = |d: f64| d.abs() < tol;
    let left = near(p.x - rect.x0);
    let right = !left && near(p.x - rect.x1);
    let top = near(p.y - rect.y0);
    let bottom = !top && near(p.y - rect.y1);

    let handle = match (left, right, top, bottom) {
        (true, _, true, _) => Handle::TopLeft,
        (_, true, true, _) => Handle::TopRight,
        (true, _, _, true) => Handle::BottomLeft,
        (_, true, _, true) => Handle::BottomRight,
        (true, ..) => Handle::Left,
        (_, true, ..) => Handle::Right,
        (_, _, true, _) => Handle::Top,
        (.., true) => Handle::Bottom,
        _ => Handle::Inside,
    };
    // The right edge of an extended box follows the chart boundary.
    if pinned_right {
        return Some(match handle {
            Handle::TopRight => Handle::Top,
            Handle::BottomRight => Handle::Bottom,
            Handle::Right => Handle::Inside,
            h => h,
        });
    }
    Some(handle)
}

fn endpoint_handle(p: Point, p1: Point, p2: Option<Point>, radius: f64) -> Option<Handle> {
    if p.distance(p1) <= radius {
        return Some(Handle::Point1);
    }
    match p2 {
        Some(p2) if p.distance(p2) <= radius => Some(Handle::Point2),
        _ => None,
    }
}

/// Classify the handle under `p`, or `None` when `p` misses the shape.
pub fn hover_target(geometry: &DeviceGeometry, p: Point, slop: HitSlop) -> Option<Handle> {
    match geometry {
        DeviceGeometry::Box { rect, pinned_right } => {
            box_handle(*rect, *pinned_right, p, slop.edge)
        }
        DeviceGeometry::Segment { p1, p2 } => endpoint_handle(p, *p1, Some(*p2), slop.handle)
            .or_else(|| contains_point(geometry, p, slop.edge).then_some(Handle::Middle)),
        DeviceGeometry::Ray { p1, p2, .. } => endpoint_handle(p, *p1, Some(*p2), slop.handle)
            .or_else(|| contains_point(geometry, p, slop.edge).then_some(Handle::Middle)),
        DeviceGeometry::HorizontalRay { origin, .. } => {
            endpoint_handle(p, *origin, None, slop.handle)
                .or_else(|| contains_point(geometry, p, slop.edge).then_some(Handle::Middle))
        }
        DeviceGeometry::HorizontalLine { .. } | DeviceGeometry::VerticalLine { .. } => {
            contains_point(geometry, p, slop.edge).then_some(Handle::Middle)
        }
        DeviceGeometry::Fibonacci { p1, p2, .. } => endpoint_handle(p, *p1, Some(*p2), slop.handle)
            .or_else(|| contains_point(geometry, p, slop.edge).then_some(Handle::Inside)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RECT: Rect = Rect::new(100.0, 200.0, 200.0, 500.0);
    const SLOP: HitSlop = HitSlop {
        edge: 4.0,
        handle: 6.0,
    };

    fn boxed(pinned_right: bool) -> DeviceGeometry {
        DeviceGeometry::Box {
            rect: RECT,
            pinned_right,
        }
    }

    #[test]
    fn rectangle_boundary_is_exclusive_at_tolerance() {
        let g = boxed(false);
        let tol = 4.0;
        // On each edge: contained.
        for p in [(100.0, 300.0), (200.0, 300.0), (150.0, 200.0), (150.0, 500.0)] {
            assert!(contains_point(&g, p.into(), tol), "edge point {p:?}");
        }
        // Exactly `tol` outside each edge: not contained.
        for p in [(96.0, 300.0), (204.0, 300.0), (150.0, 196.0), (150.0, 504.0)] {
            assert!(!contains_point(&g, p.into(), tol), "outside point {p:?}");
        }
        // Just inside the tolerance band: contained.
        assert!(contains_point(&g, Point::new(96.5, 300.0), tol));
    }

    #[test]
    fn box_handles_cover_corners_edges_and_inside() {
        let g = boxed(false);
        let cases = [
            ((100.0, 200.0), Handle::TopLeft),
            ((200.0, 200.0), Handle::TopRight),
            ((100.0, 500.0), Handle::BottomLeft),
            ((200.0, 500.0), Handle::BottomRight),
            ((150.0, 201.0), Handle::Top),
            ((150.0, 499.0), Handle::Bottom),
            ((101.0, 300.0), Handle::Left),
            ((198.0, 300.0), Handle::Right),
            ((150.0, 300.0), Handle::Inside),
        ];
        for (p, expected) in cases {
            assert_eq!(hover_target(&g, p.into(), SLOP), Some(expected), "at {p:?}");
        }
        assert_eq!(hover_target(&g, Point::new(50.0, 50.0), SLOP), None);
    }

    #[test]
    fn classification_is_exclusive_and_stable() {
        let g = boxed(false);
        for x in (90..=210).step_by(2) {
            for y in (190..=510).step_by(5) {
                let p = Point::new(x as f64, y as f64);
                let first = hover_target(&g, p, SLOP);
                assert_eq!(first, hover_target(&g, p, SLOP));
                assert_eq!(first.is_some(), contains_point(&g, p, SLOP.edge), "at {p:?}");
            }
        }
    }

    #[test]
    fn pinned_right_edge_has_no_resize_handles() {
        let g = boxed(true);
        assert_eq!(hover_target(&g, Point::new(200.0, 200.0), SLOP), Some(Handle::Top));
        assert_eq!(hover_target(&g, Point::new(199.0, 300.0), SLOP), Some(Handle::Inside));
        assert_eq!(hover_target(&g, Point::new(200.0, 500.0), SLOP), Some(Handle::Bottom));
        assert_eq!(hover_target(&g, Point::new(100.0, 200.0), SLOP), Some(Handle::TopLeft));
    }

    #[test]
    fn segment_endpoints_win_over_body() {
        let g = DeviceGeometry::Segment {
            p1: Point::new(0.0, 0.0),
            p2: Point::new(100.0, 0.0),
        };
        assert_eq!(hover_target(&g, Point::new(2.0, 2.0), SLOP), Some(Handle::Point1));
        assert_eq!(hover_target(&g, Point::new(99.0, -1.0), SLOP), Some(Handle::Point2));
        assert_eq!(hover_target(&g, Point::new(50.0, 3.0), SLOP), Some(Handle::Middle));
        assert_eq!(hover_target(&g, Point::new(50.0, 5.0), SLOP), None);
        assert_eq!(hover_target(&g, Point::new(130.0, 0.0), SLOP), None);
    }

    #[test]
    fn horizontal_ray_only_extends_rightwards() {
        let g = DeviceGeometry::HorizontalRay {
            origin: Point::new(100.0, 50.0),
            end_x: 1000.0,
        };
        assert_eq!(hover_target(&g, Point::new(101.0, 50.0), SLOP), Some(Handle::Point1));
        assert_eq!(hover_target(&g, Point::new(600.0, 52.0), SLOP), Some(Handle::Middle));
        assert_eq!(hover_target(&g, Point::new(40.0, 50.0), SLOP), None);
    }

    #[test]
    fn point_to_segment_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert_eq!(distance_to_segment(Point::new(5.0, 3.0), a, b), 3.0);
        assert_eq!(distance_to_segment(Point::new(13.0, 4.0), a, b), 5.0);
        assert_eq!(distance_to_segment(Point::new(3.0, 4.0), a, a), 5.0);
    }

    #[test]
    fn cursors_follow_handles() {
        assert_eq!(Handle::TopLeft.cursor(), CursorStyle::NwseResize);
        assert_eq!(Handle::BottomLeft.cursor(), CursorStyle::NeswResize);
        assert_eq!(Handle::Top.cursor(), CursorStyle::NsResize);
        assert_eq!(Handle::Left.cursor(), CursorStyle::EwResize);
        assert_eq!(Handle::Middle.cursor(), CursorStyle::Move);
    }
}
