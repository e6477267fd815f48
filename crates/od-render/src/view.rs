//! Per-viewport projection of one annotation.

use crate::hit::{self, Handle, HitSlop};
use crate::project::{self, Anchors, DeviceGeometry};
use kurbo::Point;
use od_core::annotation::Annotation;
use od_core::config::EngineConfig;
use od_core::coords::{ChartScale, CoordinateMapper};
use od_core::id::{AnnotationId, ViewportId};
use od_core::model::DrawingPoint;
use od_core::shape::ShapeKind;
use od_core::style::StyleOptions;

/// Whether a view accepts edit input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// The one view an edit or drawing is routed through.
    Live,
    ReadOnly,
}

/// Identity of a view: one per (annotation, viewport) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewKey {
    pub annotation: AnnotationId,
    pub viewport: ViewportId,
}

/// A renderable projection of one annotation into one viewport.
#[derive(Debug, Clone)]
pub struct ViewInstance {
    key: ViewKey,
    kind: ShapeKind,
    mode: ViewMode,
    anchors: Anchors,
    geometry: Option<DeviceGeometry>,
    style: StyleOptions,
    text: Option<String>,
    selected: bool,
    visible: bool,
    in_progress: bool,
    hovered: Option<Handle>,
}

impl ViewInstance {
    /// A read-only view of `annotation`, not yet projected.
    pub fn new(annotation: &Annotation, viewport: ViewportId) -> Self {
        Self {
            key: ViewKey {
                annotation: annotation.id(),
                viewport,
            },
            kind: annotation.kind(),
            mode: ViewMode::ReadOnly,
            anchors: Anchors::new(),
            geometry: None,
            style: annotation.style().clone(),
            text: annotation.text().map(str::to_string),
            selected: false,
            visible: annotation.is_visible(),
            in_progress: !annotation.is_completed(),
            hovered: None,
        }
    }

    pub fn key(&self) -> ViewKey {
        self.key
    }

    pub fn annotation(&self) -> AnnotationId {
        self.key.annotation
    }

    pub fn viewport(&self) -> ViewportId {
        self.key.viewport
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn is_live(&self) -> bool {
        self.mode == ViewMode::Live
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    /// Device positions of the control points as last projected.
    pub fn anchors(&self) -> &[Point] {
        &self.anchors
    }

    pub fn geometry(&self) -> Option<&DeviceGeometry> {
        self.geometry.as_ref()
    }

    /// The persisted style.
    pub fn base_style(&self) -> &StyleOptions {
        &self.style
    }

    /// Style to draw with: the selection override while selected.
    pub fn effective_style(&self) -> StyleOptions {
        if self.selected {
            self.style.selection_override()
        } else {
            self.style.clone()
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn hovered(&self) -> Option<Handle> {
        self.hovered
    }

    pub fn set_hovered(&mut self, handle: Option<Handle>) -> bool {
        let changed = self.hovered != handle;
        self.hovered = handle;
        changed
    }

    /// Re-read the annotation and re-project its display points.
    pub fn refresh<S: ChartScale + ?Sized>(
        &mut self,
        annotation: &Annotation,
        mapper: &CoordinateMapper<'_, S>,
    ) {
        self.project_points(annotation, annotation.display_points(), mapper);
    }

    /// Project an in-progress annotation with a hover preview appended.
    pub fn refresh_preview<S: ChartScale + ?Sized>(
        &mut self,
        annotation: &Annotation,
        preview: Option<DrawingPoint>,
        config: &EngineConfig,
        mapper: &CoordinateMapper<'_, S>,
    ) {
        let points = annotation.preview_points(preview, config.extend_time);
        self.project_points(annotation, &points, mapper);
    }

    fn project_points<S: ChartScale + ?Sized>(
        &mut self,
        annotation: &Annotation,
        points: &[DrawingPoint],
        mapper: &CoordinateMapper<'_, S>,
    ) {
        self.style = annotation.style().clone();
        self.text = annotation.text().map(str::to_string);
        self.selected = annotation.is_selected();
        self.visible = annotation.is_visible();
        self.in_progress = !annotation.is_completed();
        if !self.selected {
            self.hovered = None;
        }
        self.anchors = project::anchors(points, mapper).unwrap_or_default();
        self.geometry = project::project(self.kind, points, &self.style, mapper);
        log::trace!(
            "project {} in {}: {:?}",
            self.key.annotation,
            self.key.viewport,
            self.geometry
        );
    }

    fn slop(&self, config: &EngineConfig) -> HitSlop {
        HitSlop {
            edge: config.tolerance_for(self.effective_style().stroke_width()),
            handle: config.handle_radius,
        }
    }

    /// Body hit. Hidden and unprojected views never hit.
    pub fn contains(&self, p: Point, config: &EngineConfig) -> bool {
        if !self.visible || self.in_progress {
            return false;
        }
        self.geometry
            .as_ref()
            .is_some_and(|g| hit::contains_point(g, p, self.slop(config).edge))
    }

    /// Handle under `p`, if any.
    pub fn hover_target(&self, p: Point, config: &EngineConfig) -> Option<Handle> {
        if !self.visible || self.in_progress {
            return None;
        }
        let geometry = self.geometry.as_ref()?;
        hit::hover_target(geometry, p, self.slop(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use od_core::coords::LinearScale;
    use od_core::id::Symbol;
    use od_core::model::{Time, TimeRange};
    use pretty_assertions::assert_eq;

    fn scale() -> LinearScale {
        LinearScale::new(TimeRange::new(Time(0.0), Time(1000.0)), 0.0, 100.0, 1000.0, 1000.0)
    }

    fn rect() -> Annotation {
        let config = EngineConfig::default();
        let mut a = Annotation::new(ShapeKind::Rectangle, Symbol::intern("VIEW"));
        a.add_point(DrawingPoint::new(Time(100.0), 50.0), config.extend_time);
        a.add_point(DrawingPoint::new(Time(200.0), 80.0), config.extend_time);
        a
    }

    #[test]
    fn refresh_projects_anchors() {
        let s = scale();
        let a = rect();
        let mut view = ViewInstance::new(&a, ViewportId(1));
        view.refresh(&a, &CoordinateMapper::new(&s));
        assert_eq!(view.anchors(), &[Point::new(100.0, 500.0), Point::new(200.0, 200.0)]);
        assert!(view.geometry().is_some());
        assert_eq!(view.mode(), ViewMode::ReadOnly);
    }

    #[test]
    fn selection_override_leaves_base_style_alone() {
        let s = scale();
        let mut a = rect();
        a.select();
        let mut view = ViewInstance::new(&a, ViewportId(1));
        view.refresh(&a, &CoordinateMapper::new(&s));
        assert!(view.is_selected());
        assert_eq!(view.base_style(), a.style());
        assert!(view.effective_style().stroke_width() > a.style().stroke_width());
    }

    #[test]
    fn hidden_views_are_not_hit() {
        let config = EngineConfig::default();
        let s = scale();
        let mut a = rect();
        let mut view = ViewInstance::new(&a, ViewportId(1));
        view.refresh(&a, &CoordinateMapper::new(&s));
        let inside = Point::new(150.0, 300.0);
        assert!(view.contains(inside, &config));
        a.set_visible(false);
        view.refresh(&a, &CoordinateMapper::new(&s));
        assert!(!view.contains(inside, &config));
        assert_eq!(view.hover_target(inside, &config), None);
    }

    #[test]
    fn preview_projects_an_in_progress_shape() {
        let config = EngineConfig::default();
        let s = scale();
        let a = Annotation::new(ShapeKind::HorizontalRay, Symbol::intern("VIEW"));
        let mut view = ViewInstance::new(&a, ViewportId(2));
        view.refresh_preview(
            &a,
            Some(DrawingPoint::new(Time(300.0), 40.0)),
            &config,
            &CoordinateMapper::new(&s),
        );
        assert!(view.is_in_progress());
        assert_eq!(
            view.geometry(),
            Some(&DeviceGeometry::HorizontalRay {
                origin: Point::new(300.0, 600.0),
                end_x: 1000.0,
            })
        );
    }
}
