//! Move/resize transforms in device space.
//!
//! Every transform starts from the anchors captured at pointer-down and the
//! pointer's total travel, never from the previous frame, so rounding never
//! accumulates over a long drag.

use crate::hit::Handle;
use crate::project::Anchors;
use kurbo::{Point, Rect};
use smallvec::smallvec;

/// Apply `handle` to `start` (device anchors at pointer-down) for a pointer
/// that travelled from `origin` to `pointer`.
///
/// Returns `None` when the handle does not apply to the shape.
pub fn apply_handle(
    is_box: bool,
    handle: Handle,
    start: &[Point],
    origin: Point,
    pointer: Point,
) -> Option<Anchors> {
    let delta = pointer - origin;
    if handle.is_translate() {
        return Some(start.iter().map(|p| *p + delta).collect());
    }
    if is_box {
        return resize_box(handle, start, pointer);
    }
    match (handle, start) {
        (Handle::Point1, [_, rest @ ..]) => {
            let mut out: Anchors = smallvec![pointer];
            out.extend_from_slice(rest);
            Some(out)
        }
        (Handle::Point2, [first, _]) => Some(smallvec![*first, pointer]),
        _ => None,
    }
}

/// Normalize to top-left/bottom-right and move the grabbed side(s) to the
/// pointer.
fn resize_box(handle: Handle, start: &[Point], pointer: Point) -> Option<Anchors> {
    let [a, b] = start else {
        return None;
    };
    let r = Rect::from_points(*a, *b);
    let (mut x0, mut y0, mut x1, mut y1) = (r.x0, r.y0, r.x1, r.y1);
    match handle {
        Handle::TopLeft => {
            x0 = pointer.x;
            y0 = pointer.y;
        }
        Handle::Top => y0 = pointer.y,
        Handle::TopRight => {
            x1 = pointer.x;
            y0 = pointer.y;
        }
        Handle::Right => x1 = pointer.x,
        Handle::BottomRight => {
            x1 = pointer.x;
            y1 = pointer.y;
        }
        Handle::Bottom => y1 = pointer.y,
        Handle::BottomLeft => {
            x0 = pointer.x;
            y1 = pointer.y;
        }
        Handle::Left => x0 = pointer.x,
        _ => return None,
    }
    let r = Rect::new(x0, y0, x1, y1).abs();
    Some(smallvec![Point::new(r.x0, r.y0), Point::new(r.x1, r.y1)])
}
