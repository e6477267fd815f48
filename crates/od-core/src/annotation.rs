//! The annotation entity and its lifecycle.
//!
//! ```text
//! Drawing ──(required points placed)──▶ Idle ◀──(deselect)── Selected
//!                                        │                     ▲   │
//!                                        └──────(select)───────┘   │
//!                                   Selected ◀──(commit/cancel)── Dragging / Resizing
//! ```
//!
//! Drag and resize never write `points` directly. They stage a copy that
//! only replaces `points` on commit, so an interrupted gesture leaves the
//! annotation exactly as it was.

use crate::id::{AnnotationId, Symbol};
use crate::model::{ControlPoints, DrawingPoint, Time};
use crate::shape::ShapeKind;
use crate::style::StyleOptions;
use serde_json::Value;

/// Lifecycle state. Not persisted: reloaded annotations start `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationState {
    /// Still collecting control points.
    Drawing,
    Idle,
    Selected,
    Dragging,
    Resizing,
}

/// Kind of edit gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// Translate every point.
    Drag,
    /// Move one edge, corner or endpoint.
    Resize,
}

/// Result of placing a point while drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointOutcome {
    Pending { placed: usize, required: usize },
    Completed,
    /// Not drawing, or the point was not finite.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct Annotation {
    id: AnnotationId,
    symbol: Symbol,
    kind: ShapeKind,
    points: ControlPoints,
    staged: Option<ControlPoints>,
    style: StyleOptions,
    text: Option<String>,
    seconds_per_bar: Option<f64>,
    visible: bool,
    tags: Vec<String>,
    user_id: Option<String>,
    state: AnnotationState,
}

impl Annotation {
    /// Shape factory: a fresh annotation in the `Drawing` state.
    pub fn new(kind: ShapeKind, symbol: Symbol) -> Self {
        Self {
            id: AnnotationId::generate(),
            symbol,
            kind,
            points: ControlPoints::new(),
            staged: None,
            style: (kind.spec().default_style)(),
            text: None,
            seconds_per_bar: None,
            visible: true,
            tags: Vec::new(),
            user_id: None,
            state: AnnotationState::Drawing,
        }
    }

    /// Rebuild a completed annotation from stored parts.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: AnnotationId,
        symbol: Symbol,
        kind: ShapeKind,
        points: ControlPoints,
        style: StyleOptions,
        text: Option<String>,
        seconds_per_bar: Option<f64>,
        visible: bool,
        tags: Vec<String>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            id,
            symbol,
            kind,
            points,
            staged: None,
            style,
            text,
            seconds_per_bar,
            visible,
            tags,
            user_id,
            state: AnnotationState::Idle,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn state(&self) -> AnnotationState {
        self.state
    }

    /// Committed control points.
    pub fn points(&self) -> &[DrawingPoint] {
        &self.points
    }

    /// Points to render: the staging buffer while editing, else the
    /// committed points.
    pub fn display_points(&self) -> &[DrawingPoint] {
        self.staged.as_deref().unwrap_or(&self.points)
    }

    pub fn style(&self) -> &StyleOptions {
        &self.style
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn seconds_per_bar(&self) -> Option<f64> {
        self.seconds_per_bar
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_completed(&self) -> bool {
        self.state != AnnotationState::Drawing
    }

    pub fn is_selected(&self) -> bool {
        matches!(
            self.state,
            AnnotationState::Selected | AnnotationState::Dragging | AnnotationState::Resizing
        )
    }

    pub fn is_editing(&self) -> bool {
        matches!(
            self.state,
            AnnotationState::Dragging | AnnotationState::Resizing
        )
    }

    /// Whether the committed points satisfy the shape's stored count.
    pub fn has_full_geometry(&self) -> bool {
        self.points.len() >= self.kind.spec().stored_points
    }

    // ─── Metadata ────────────────────────────────────────────────────────

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn set_text(&mut self, text: Option<String>) {
        self.text = text.filter(|t| !t.is_empty());
    }

    pub fn set_seconds_per_bar(&mut self, seconds: Option<f64>) {
        self.seconds_per_bar = seconds.filter(|s| s.is_finite() && *s > 0.0);
    }

    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
    }

    pub fn set_user_id(&mut self, user_id: Option<String>) {
        self.user_id = user_id;
    }

    /// Patch style fields from loose JSON. See [`StyleOptions::apply_patch`].
    pub fn apply_style_patch(&mut self, patch: &Value) {
        self.style.apply_patch(self.kind, patch);
    }

    // ─── Drawing ─────────────────────────────────────────────────────────

    /// Place the next control point. Reaching the required count runs the
    /// finalize hook and moves to `Idle`.
    pub fn add_point(&mut self, point: DrawingPoint, extend: Time) -> PointOutcome {
        if self.state != AnnotationState::Drawing || !point.is_finite() {
            return PointOutcome::Ignored;
        }
        self.points.push(point);
        let required = self.kind.spec().required_points;
        if self.points.len() < required {
            return PointOutcome::Pending {
                placed: self.points.len(),
                required,
            };
        }
        self.kind.finalize(&mut self.points, extend);
        self.state = AnnotationState::Idle;
        log::debug!("{} {} completed with {:?}", self.kind, self.id, self.points);
        PointOutcome::Completed
    }

    /// Points placed so far plus a hover preview, finalized when the preview
    /// would complete the shape. Used to render a shape still being drawn.
    pub fn preview_points(&self, preview: Option<DrawingPoint>, extend: Time) -> ControlPoints {
        let mut points = self.points.clone();
        if self.state != AnnotationState::Drawing {
            return points;
        }
        if let Some(p) = preview.filter(DrawingPoint::is_finite) {
            points.push(p);
        }
        if points.len() >= self.kind.spec().required_points {
            self.kind.finalize(&mut points, extend);
        }
        points
    }

    // ─── Selection ───────────────────────────────────────────────────────

    /// `Idle → Selected`. Returns whether the annotation is selected afterwards.
    pub fn select(&mut self) -> bool {
        if self.state == AnnotationState::Idle {
            self.state = AnnotationState::Selected;
        }
        self.is_selected()
    }

    /// Back to `Idle`, discarding any staged edit. Returns `false` if it was
    /// not selected.
    pub fn deselect(&mut self) -> bool {
        if !self.is_selected() {
            return false;
        }
        self.staged = None;
        self.state = AnnotationState::Idle;
        true
    }

    // ─── Editing ─────────────────────────────────────────────────────────

    /// `Selected → Dragging | Resizing`. Refused unless selected with full
    /// geometry.
    pub fn begin_edit(&mut self, edit: EditKind) -> bool {
        if self.state != AnnotationState::Selected || !self.has_full_geometry() {
            return false;
        }
        self.staged = Some(self.points.clone());
        self.state = match edit {
            EditKind::Drag => AnnotationState::Dragging,
            EditKind::Resize => AnnotationState::Resizing,
        };
        true
    }

    /// Replace the staging buffer. Refused outside an edit, on a point-count
    /// change, or on non-finite points.
    pub fn stage(&mut self, points: ControlPoints) -> bool {
        if !self.is_editing()
            || points.len() != self.points.len()
            || !points.iter().all(DrawingPoint::is_finite)
        {
            return false;
        }
        self.staged = Some(points);
        true
    }

    /// Commit staged points and return to `Selected`. Returns whether the
    /// committed points changed.
    pub fn commit(&mut self) -> bool {
        if !self.is_editing() {
            return false;
        }
        self.state = AnnotationState::Selected;
        match self.staged.take() {
            Some(staged) if staged != self.points => {
                self.points = staged;
                true
            }
            _ => false,
        }
    }

    /// Abort an edit, keeping the committed points.
    pub fn cancel_edit(&mut self) {
        if self.is_editing() {
            self.staged = None;
            self.state = AnnotationState::Selected;
        }
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

    fn completed_rect() -> Annotation {
        let mut a = Annotation::new(ShapeKind::Rectangle, Symbol::intern("TEST"));
        a.add_point(pt(100.0, 50.0), EXTEND);
        a.add_point(pt(200.0, 80.0), EXTEND);
        a
    }

    #[test]
    fn drawing_completes_at_required_count() {
        let mut a = Annotation::new(ShapeKind::Rectangle, Symbol::intern("TEST"));
        assert!(!a.is_completed());
        assert_eq!(
            a.add_point(pt(100.0, 50.0), EXTEND),
            PointOutcome::Pending {
                placed: 1,
                required: 2
            }
        );
        assert_eq!(a.add_point(pt(200.0, 80.0), EXTEND), PointOutcome::Completed);
        assert!(a.is_completed());
        assert_eq!(a.points(), &[pt(100.0, 50.0), pt(200.0, 80.0)]);
        assert_eq!(a.add_point(pt(300.0, 1.0), EXTEND), PointOutcome::Ignored);
    }

    #[test]
    fn non_finite_points_are_ignored() {
        let mut a = Annotation::new(ShapeKind::Line, Symbol::intern("TEST"));
        assert_eq!(a.add_point(pt(f64::NAN, 1.0), EXTEND), PointOutcome::Ignored);
        assert!(a.points().is_empty());
    }

    #[test]
    fn preview_finalizes_single_click_shapes() {
        let a = Annotation::new(ShapeKind::HorizontalRay, Symbol::intern("TEST"));
        let preview = a.preview_points(Some(pt(10.0, 5.0)), EXTEND);
        assert_eq!(preview.as_slice(), &[pt(10.0, 5.0), pt(1.0e9, 5.0)]);
        assert!(a.points().is_empty());
    }

    #[test]
    fn staged_points_only_land_on_commit() {
        let mut a = completed_rect();
        assert!(!a.begin_edit(EditKind::Drag), "must be selected first");
        assert!(a.select());
        assert!(a.begin_edit(EditKind::Drag));
        assert_eq!(a.state(), AnnotationState::Dragging);

        assert!(a.stage(smallvec![pt(110.0, 55.0), pt(210.0, 85.0)]));
        assert_eq!(a.points(), &[pt(100.0, 50.0), pt(200.0, 80.0)]);
        assert_eq!(a.display_points(), &[pt(110.0, 55.0), pt(210.0, 85.0)]);

        assert!(a.commit());
        assert_eq!(a.state(), AnnotationState::Selected);
        assert_eq!(a.points(), &[pt(110.0, 55.0), pt(210.0, 85.0)]);
    }

    #[test]
    fn cancelled_edit_keeps_committed_points() {
        let mut a = completed_rect();
        a.select();
        a.begin_edit(EditKind::Resize);
        a.stage(smallvec![pt(0.0, 0.0), pt(1.0, 1.0)]);
        a.cancel_edit();
        assert_eq!(a.points(), &[pt(100.0, 50.0), pt(200.0, 80.0)]);
        assert_eq!(a.display_points(), a.points());
        assert_eq!(a.state(), AnnotationState::Selected);
    }

    #[test]
    fn stage_rejects_wrong_point_count() {
        let mut a = completed_rect();
        a.select();
        a.begin_edit(EditKind::Drag);
        assert!(!a.stage(smallvec![pt(0.0, 0.0)]));
    }

    #[test]
    fn deselect_discards_staging() {
        let mut a = completed_rect();
        a.select();
        a.begin_edit(EditKind::Drag);
        a.stage(smallvec![pt(0.0, 0.0), pt(1.0, 1.0)]);
        assert!(a.deselect());
        assert_eq!(a.state(), AnnotationState::Idle);
        assert_eq!(a.display_points(), a.points());
        assert!(!a.deselect());
    }
}
