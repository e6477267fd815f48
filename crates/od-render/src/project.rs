//! Domain points → device geometry.
//!
//! Projection resolves extended endpoints (through the mapper's boundary
//! fallback) and stretches rays and horizontal/vertical lines to the pane
//! edges. The result is what both the renderer and the hit tester consume.

use kurbo::{Point, Rect, Vec2};
use od_core::coords::{ChartScale, CoordinateMapper};
use od_core::model::DrawingPoint;
use od_core::shape::ShapeKind;
use od_core::style::StyleOptions;
use smallvec::SmallVec;

/// Device positions of an annotation's control points.
pub type Anchors = SmallVec<[Point; 2]>;

/// One projected fibonacci level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FibLevel {
    pub ratio: f64,
    pub price: f64,
    pub y: f64,
}

/// Device-space geometry of one annotation in one viewport.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceGeometry {
    /// Rectangle family. `pinned_right` marks an extended rectangle whose
    /// right edge follows the visible boundary.
    Box { rect: Rect, pinned_right: bool },
    Segment { p1: Point, p2: Point },
    /// Starts at `p1`, passes through `p2`, ends at the pane edge.
    Ray { p1: Point, p2: Point, end: Point },
    HorizontalLine { y: f64, x_start: f64, x_end: f64 },
    HorizontalRay { origin: Point, end_x: f64 },
    VerticalLine { x: f64, y_start: f64, y_end: f64 },
    Fibonacci { p1: Point, p2: Point, levels: Vec<FibLevel> },
}

impl DeviceGeometry {
    /// Axis-aligned bounds, used for culling and fibonacci containment.
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Box { rect, .. } => *rect,
            Self::Segment { p1, p2 } => Rect::from_points(*p1, *p2),
            Self::Ray { p1, end, .. } => Rect::from_points(*p1, *end),
            Self::HorizontalLine { y, x_start, x_end } => Rect::new(*x_start, *y, *x_end, *y),
            Self::HorizontalRay { origin, end_x } => {
                Rect::new(origin.x, origin.y, *end_x, origin.y)
            }
            Self::VerticalLine { x, y_start, y_end } => Rect::new(*x, *y_start, *x, *y_end),
            Self::Fibonacci { p1, p2, levels } => levels.iter().fold(
                Rect::from_points(*p1, *p2),
                |acc, level| acc.union_pt(Point::new(acc.x0, level.y)),
            ),
        }
    }
}

/// Map every point to device space. `None` if any point is unmappable.
pub fn anchors<S: ChartScale + ?Sized>(
    points: &[DrawingPoint],
    mapper: &CoordinateMapper<'_, S>,
) -> Option<Anchors> {
    points.iter().map(|p| mapper.to_device(*p)).collect()
}

/// Where a ray from `p1` through `p2` leaves the pane.
fn ray_end(p1: Point, p2: Point, width: f64, height: f64) -> Point {
    let d: Vec2 = p2 - p1;
    if d.hypot2() < f64::EPSILON {
        return p2;
    }
    let exit = |origin: f64, delta: f64, max: f64| {
        if delta > 0.0 {
            (max - origin) / delta
        } else if delta < 0.0 {
            -origin / delta
        } else {
            f64::INFINITY
        }
    };
    let t = exit(p1.x, d.x, width).min(exit(p1.y, d.y, height)).max(1.0);
    p1 + d * t
}

/// Project `points` (display points of an annotation of `kind`) into device
/// geometry. Returns `None` while the shape lacks points or when a point
/// cannot be mapped.
pub fn project<S: ChartScale + ?Sized>(
    kind: ShapeKind,
    points: &[DrawingPoint],
    style: &StyleOptions,
    mapper: &CoordinateMapper<'_, S>,
) -> Option<DeviceGeometry> {
    if points.len() < kind.spec().stored_points {
        return None;
    }
    let a = anchors(points, mapper)?;
    let (width, height) = mapper.scale().pane_size();

    let geometry = match kind {
        ShapeKind::Rectangle | ShapeKind::RectangleExtended => DeviceGeometry::Box {
            rect: Rect::from_points(a[0], a[1]),
            pinned_right: kind == ShapeKind::RectangleExtended,
        },
        ShapeKind::Line => DeviceGeometry::Segment { p1: a[0], p2: a[1] },
        ShapeKind::LineRay => DeviceGeometry::Ray {
            p1: a[0],
            p2: a[1],
            end: ray_end(a[0], a[1], width, height),
        },
        ShapeKind::HorizontalLine => DeviceGeometry::HorizontalLine {
            y: a[0].y,
            x_start: 0.0,
            x_end: width,
        },
        ShapeKind::HorizontalRay => DeviceGeometry::HorizontalRay {
            origin: a[0],
            end_x: width.max(a[0].x),
        },
        ShapeKind::VerticalLine => DeviceGeometry::VerticalLine {
            x: a[0].x,
            y_start: 0.0,
            y_end: height,
        },
        ShapeKind::Fibonacci => {
            let ratios: &[f64] = match style {
                StyleOptions::Fibonacci(s) => &s.levels,
                _ => &od_core::style::DEFAULT_FIB_LEVELS,
            };
            let (from, to) = (points[0].price, points[1].price);
            let levels = ratios
                .iter()
                .filter_map(|&ratio| {
                    let price = to + (from - to) * ratio;
                    let y = mapper.price_to_y(price)?;
                    Some(FibLevel { ratio, price, y })
                })
                .collect();
            DeviceGeometry::Fibonacci {
                p1: a[0],
                p2: a[1],
                levels,
            }
        }
    };
    Some(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use od_core::config::DEFAULT_EXTEND_TIME;
    use od_core::coords::LinearScale;
    use od_core::model::{Time, TimeRange};
    use pretty_assertions::assert_eq;

    fn scale() -> LinearScale {
        LinearScale::new(TimeRange::new(Time(0.0), Time(1000.0)), 0.0, 100.0, 1000.0, 1000.0)
    }

    fn pt(t: f64, p: f64) -> DrawingPoint {
        DrawingPoint::new(Time(t), p)
    }

    #[test]
    fn rectangle_projects_to_normalized_box() {
        let s = scale();
        let m = CoordinateMapper::new(&s);
        let style = StyleOptions::defaults_for(ShapeKind::Rectangle);
        let g = project(ShapeKind::Rectangle, &[pt(100.0, 50.0), pt(200.0, 80.0)], &style, &m);
        assert_eq!(
            g,
            Some(DeviceGeometry::Box {
                rect: Rect::new(100.0, 200.0, 200.0, 500.0),
                pinned_right: false,
            })
        );
    }

    #[test]
    fn extended_rectangle_reaches_right_boundary() {
        let s = scale();
        let m = CoordinateMapper::new(&s);
        let style = StyleOptions::defaults_for(ShapeKind::RectangleExtended);
        let points = [pt(100.0, 50.0), DrawingPoint::new(DEFAULT_EXTEND_TIME, 80.0)];
        let Some(DeviceGeometry::Box { rect, pinned_right }) =
            project(ShapeKind::RectangleExtended, &points, &style, &m)
        else {
            panic!("expected box");
        };
        assert!(pinned_right);
        assert_eq!(rect.x1, 1000.0);
    }

    #[test]
    fn ray_extends_to_pane_edge() {
        let s = scale();
        let m = CoordinateMapper::new(&s);
        let style = StyleOptions::defaults_for(ShapeKind::LineRay);
        // (100, 500) → (200, 400): heads up and right at 45°.
        let g = project(ShapeKind::LineRay, &[pt(100.0, 50.0), pt(200.0, 60.0)], &style, &m);
        let Some(DeviceGeometry::Ray { end, .. }) = g else {
            panic!("expected ray");
        };
        assert!((end.x - 600.0).abs() < 1e-9);
        assert!(end.y.abs() < 1e-9);
    }

    #[test]
    fn fibonacci_levels_span_the_two_prices() {
        let s = scale();
        let m = CoordinateMapper::new(&s);
        let style = StyleOptions::defaults_for(ShapeKind::Fibonacci);
        let g = project(ShapeKind::Fibonacci, &[pt(100.0, 20.0), pt(300.0, 70.0)], &style, &m);
        let Some(DeviceGeometry::Fibonacci { levels, .. }) = g else {
            panic!("expected fibonacci");
        };
        assert_eq!(levels.len(), 7);
        assert_eq!(levels[0].price, 70.0);
        assert_eq!(levels[6].price, 20.0);
        assert_eq!(levels[3].price, 45.0);
    }

    #[test]
    fn incomplete_points_do_not_project() {
        let s = scale();
        let m = CoordinateMapper::new(&s);
        let style = StyleOptions::defaults_for(ShapeKind::Line);
        assert_eq!(project(ShapeKind::Line, &[pt(1.0, 1.0)], &style, &m), None);
    }
}
