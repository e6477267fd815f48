//! The annotation registry.
//!
//! One registry owns every annotation, keyed by symbol, plus the registered
//! viewports and their [`ViewInstance`]s. Any change to an annotation is
//! pushed to every viewport showing its symbol, and any change to a
//! symbol's list is written through the persistence adapter before the
//! call returns.
//!
//! Only one view is ever `Live`: the selected annotation's view in the
//! viewport it was selected in, which is the only place edits are accepted.

use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus, ToolGroup};
use crate::shortcuts::ShortcutAction;
use crate::tools::{DrawingSession, Reanchor, ToolCoordinator, ToolToggle};
use kurbo::Point;
use od_core::annotation::{Annotation, EditKind, PointOutcome};
use od_core::config::EngineConfig;
use od_core::coords::CoordinateMapper;
use od_core::id::{AnnotationId, Symbol, ViewportId};
use od_core::model::{ControlPoints, DrawingPoint};
use od_core::persist::{KeyValueStore, PersistenceAdapter};
use od_core::shape::ShapeKind;
use od_render::hit::{CursorStyle, Handle};
use od_render::project::Anchors;
use od_render::surface::ChartSurface;
use od_render::transform;
use od_render::view::{ViewInstance, ViewMode};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

// ─── Viewports ───────────────────────────────────────────────────────────

/// What a host hands over to register a chart pane.
pub struct ViewportDescriptor {
    pub symbol: String,
    /// Bar interval of the chart, recorded on annotations drawn in it.
    pub seconds_per_bar: Option<f64>,
    pub surface: Box<dyn ChartSurface>,
}

impl ViewportDescriptor {
    pub fn new(symbol: impl Into<String>, surface: impl ChartSurface + 'static) -> Self {
        Self {
            symbol: symbol.into(),
            seconds_per_bar: None,
            surface: Box::new(surface),
        }
    }

    pub fn with_seconds_per_bar(mut self, seconds: f64) -> Self {
        self.seconds_per_bar = Some(seconds);
        self
    }
}

/// Returned by [`AnnotationRegistry::register_viewport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewportHandle {
    pub id: ViewportId,
    pub symbol: Symbol,
}

/// The selected annotation and the viewport that accepts edits for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub annotation: AnnotationId,
    pub viewport: ViewportId,
}

struct ViewportRecord {
    id: ViewportId,
    symbol: Symbol,
    seconds_per_bar: Option<f64>,
    surface: Box<dyn ChartSurface>,
    /// Completed annotations, in draw order.
    views: Vec<ViewInstance>,
    /// The annotation being drawn here, if any.
    in_progress: Option<ViewInstance>,
    toolbar_open: bool,
}

impl ViewportRecord {
    fn view(&self, id: AnnotationId) -> Option<&ViewInstance> {
        self.views.iter().find(|v| v.annotation() == id)
    }

    fn is_live(&self, id: AnnotationId, selection: Option<Selection>) -> bool {
        selection.is_some_and(|s| s.annotation == id && s.viewport == self.id)
    }

    /// Project and attach a new view.
    fn attach(&mut self, mut view: ViewInstance, annotation: &Annotation) {
        view.refresh(annotation, &CoordinateMapper::new(&*self.surface));
        if let Err(e) = self.surface.attach_overlay(&view) {
            log::warn!("attach {} to {}: {e}", annotation.id(), self.id);
        }
        self.views.push(view);
    }

    /// Keep an already attached view (the in-progress one) as a completed view.
    fn adopt(&mut self, mut view: ViewInstance, annotation: &Annotation) {
        view.set_mode(ViewMode::ReadOnly);
        view.refresh(annotation, &CoordinateMapper::new(&*self.surface));
        self.surface.overlay_changed(&view);
        self.views.push(view);
    }

    fn detach_view(&mut self, view: &ViewInstance) {
        if let Err(e) = self.surface.detach_overlay(view.key()) {
            log::warn!("detach {} from {}: {e}", view.annotation(), self.id);
        }
    }

    fn detach(&mut self, id: AnnotationId) -> bool {
        let Some(index) = self.views.iter().position(|v| v.annotation() == id) else {
            return false;
        };
        let view = self.views.remove(index);
        self.detach_view(&view);
        true
    }

    fn detach_all(&mut self) {
        for view in std::mem::take(&mut self.views) {
            self.detach_view(&view);
        }
        self.clear_in_progress();
    }

    fn clear_in_progress(&mut self) {
        if let Some(view) = self.in_progress.take() {
            self.detach_view(&view);
        }
    }

    /// Re-project the view of `annotation`, if this viewport shows it.
    fn refresh(&mut self, annotation: &Annotation, selection: Option<Selection>) {
        let live = self.is_live(annotation.id(), selection);
        let Some(view) = self.views.iter_mut().find(|v| v.annotation() == annotation.id()) else {
            return;
        };
        view.set_mode(if live { ViewMode::Live } else { ViewMode::ReadOnly });
        view.refresh(annotation, &CoordinateMapper::new(&*self.surface));
        self.surface.overlay_changed(view);
    }

    /// Create or update the in-progress slot for a drawing session.
    fn show_in_progress(
        &mut self,
        annotation: &Annotation,
        preview: Option<DrawingPoint>,
        config: &EngineConfig,
    ) {
        let (mut view, attached) = match self.in_progress.take() {
            Some(view) if view.annotation() == annotation.id() => (view, true),
            stale => {
                if let Some(stale) = stale {
                    self.detach_view(&stale);
                }
                let mut view = ViewInstance::new(annotation, self.id);
                view.set_mode(ViewMode::Live);
                (view, false)
            }
        };
        view.refresh_preview(
            annotation,
            preview,
            config,
            &CoordinateMapper::new(&*self.surface),
        );
        if attached {
            self.surface.overlay_changed(&view);
        } else if let Err(e) = self.surface.attach_overlay(&view) {
            log::warn!("attach drawing {} to {}: {e}", annotation.id(), self.id);
        }
        self.in_progress = Some(view);
    }
}

// ─── Edit session ────────────────────────────────────────────────────────

/// A drag or resize in progress. Transforms always start from the anchors
/// captured at pointer-down.
#[derive(Debug, Clone)]
struct EditSession {
    annotation: AnnotationId,
    viewport: ViewportId,
    handle: Handle,
    origin: Point,
    start: Anchors,
}

// ─── Registry ────────────────────────────────────────────────────────────

fn find(symbols: &HashMap<Symbol, Vec<Annotation>>, id: AnnotationId) -> Option<&Annotation> {
    symbols.values().flatten().find(|a| a.id() == id)
}

fn find_mut(
    symbols: &mut HashMap<Symbol, Vec<Annotation>>,
    id: AnnotationId,
) -> Option<&mut Annotation> {
    symbols.values_mut().flatten().find(|a| a.id() == id)
}

/// Push `annotation` to every viewport showing its symbol.
fn propagate(
    viewports: &mut BTreeMap<ViewportId, ViewportRecord>,
    annotation: &Annotation,
    selection: Option<Selection>,
) {
    for record in viewports.values_mut() {
        if record.symbol == annotation.symbol() {
            record.refresh(annotation, selection);
        }
    }
}

pub struct AnnotationRegistry {
    config: EngineConfig,
    persistence: PersistenceAdapter,
    symbols: HashMap<Symbol, Vec<Annotation>>,
    viewports: BTreeMap<ViewportId, ViewportRecord>,
    next_viewport: u32,
    active: Option<ViewportId>,
    hovered: Option<ViewportId>,
    tools: ToolCoordinator,
    selection: Option<Selection>,
    edit: Option<EditSession>,
    events: EventBus,
    /// Set while a deselection runs; selection requests are refused.
    deselecting: bool,
}

impl AnnotationRegistry {
    pub fn new(config: EngineConfig, store: Box<dyn KeyValueStore>) -> Self {
        let persistence = PersistenceAdapter::new(store, config.storage_suffix.clone());
        Self {
            config,
            persistence,
            symbols: HashMap::new(),
            viewports: BTreeMap::new(),
            next_viewport: 1,
            active: None,
            hovered: None,
            tools: ToolCoordinator::new(),
            selection: None,
            edit: None,
            events: EventBus::new(),
            deselecting: false,
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Completed annotations of `symbol`, in draw order.
    pub fn annotations(&self, symbol: Symbol) -> &[Annotation] {
        self.symbols.get(&symbol).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        find(&self.symbols, id)
    }

    /// Completed views attached to `viewport`.
    pub fn views(&self, viewport: ViewportId) -> &[ViewInstance] {
        self.viewports
            .get(&viewport)
            .map(|r| r.views.as_slice())
            .unwrap_or_default()
    }

    pub fn view(&self, id: AnnotationId, viewport: ViewportId) -> Option<&ViewInstance> {
        self.viewports.get(&viewport)?.view(id)
    }

    /// The view of the annotation being drawn in `viewport`.
    pub fn in_progress_view(&self, viewport: ViewportId) -> Option<&ViewInstance> {
        self.viewports.get(&viewport)?.in_progress.as_ref()
    }

    /// The annotation currently being drawn.
    pub fn drawing(&self) -> Option<&Annotation> {
        self.tools.session().map(|s| &s.annotation)
    }

    pub fn selected(&self) -> Option<Selection> {
        self.selection
    }

    pub fn is_editing(&self) -> bool {
        self.edit.is_some()
    }

    pub fn tools(&self) -> &ToolCoordinator {
        &self.tools
    }

    pub fn persistence(&self) -> &PersistenceAdapter {
        &self.persistence
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn active_viewport(&self) -> Option<ViewportId> {
        self.active
    }

    pub fn hovered_viewport(&self) -> Option<ViewportId> {
        self.hovered
    }

    pub fn is_toolbar_open(&self, viewport: ViewportId) -> bool {
        self.viewports.get(&viewport).is_some_and(|r| r.toolbar_open)
    }

    pub fn viewports(&self) -> impl Iterator<Item = ViewportHandle> + '_ {
        self.viewports.values().map(|r| ViewportHandle {
            id: r.id,
            symbol: r.symbol,
        })
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn persist(&mut self, symbol: Symbol) {
        let list = self.symbols.get(&symbol).map(Vec::as_slice).unwrap_or_default();
        if let Err(e) = self.persistence.save(symbol, list) {
            log::warn!("persisting {symbol} failed: {e}");
        }
    }

    fn refresh_annotation(&mut self, id: AnnotationId) {
        if let Some(annotation) = find(&self.symbols, id) {
            propagate(&mut self.viewports, annotation, self.selection);
        }
    }

    fn sync_session_view(&mut self) {
        let Some(session) = self.tools.session() else {
            return;
        };
        if let Some(record) = self.viewports.get_mut(&session.viewport) {
            record.show_in_progress(&session.annotation, session.preview, &self.config);
        }
    }

    fn discard_session(&mut self, session: Option<DrawingSession>) {
        let Some(session) = session else {
            return;
        };
        log::debug!(
            "discarding unfinished {} {}",
            session.annotation.kind(),
            session.annotation.id()
        );
        if let Some(record) = self.viewports.get_mut(&session.viewport) {
            record.clear_in_progress();
        }
    }

    /// Re-anchor or restart a drawing session when the pointer works in
    /// another viewport.
    fn follow_pointer(&mut self, viewport: ViewportId, symbol: Symbol) {
        match self.tools.reanchor(viewport, symbol) {
            Reanchor::Unchanged => {}
            Reanchor::Moved { from } => {
                if let Some(record) = self.viewports.get_mut(&from) {
                    record.clear_in_progress();
                }
                self.sync_session_view();
            }
            Reanchor::Restarted { from } => {
                if let Some(record) = self.viewports.get_mut(&from) {
                    record.clear_in_progress();
                }
            }
        }
    }

    // ─── Viewport lifecycle ──────────────────────────────────────────────

    /// Register a chart pane. The first viewport of a symbol loads its
    /// persisted annotations; later ones reuse the in-memory list.
    pub fn register_viewport(
        &mut self,
        descriptor: ViewportDescriptor,
    ) -> Result<ViewportHandle, EngineError> {
        let name = descriptor.symbol.trim();
        if name.is_empty() {
            return Err(EngineError::EmptySymbol);
        }
        if let Some(s) = descriptor.seconds_per_bar {
            if !(s.is_finite() && s > 0.0) {
                return Err(EngineError::InvalidBarInterval(s));
            }
        }
        let symbol = Symbol::intern(name);
        let id = ViewportId(self.next_viewport);
        self.next_viewport += 1;

        if !self.symbols.contains_key(&symbol) {
            let loaded = self.persistence.load(symbol);
            self.symbols.insert(symbol, loaded);
        }

        let mut record = ViewportRecord {
            id,
            symbol,
            seconds_per_bar: descriptor.seconds_per_bar,
            surface: descriptor.surface,
            views: Vec::new(),
            in_progress: None,
            toolbar_open: false,
        };
        for annotation in self.annotations(symbol) {
            record.attach(ViewInstance::new(annotation, id), annotation);
        }
        log::debug!("registered {id} for {symbol} with {} view(s)", record.views.len());
        self.viewports.insert(id, record);
        Ok(ViewportHandle { id, symbol })
    }

    /// Tear a viewport down: abort edits, selection and drawing anchored
    /// there, then detach every view. Returns `false` for an unknown id.
    pub fn unregister_viewport(&mut self, viewport: ViewportId) -> bool {
        if !self.viewports.contains_key(&viewport) {
            return false;
        }
        if self.edit.as_ref().is_some_and(|e| e.viewport == viewport) {
            self.cancel_edit();
        }
        if self.selection.is_some_and(|s| s.viewport == viewport) {
            self.unselect_annotation();
        }
        let dropped = self.tools.drop_session_in(viewport);
        self.discard_session(dropped);

        if let Some(mut record) = self.viewports.remove(&viewport) {
            record.detach_all();
        }
        if self.active == Some(viewport) {
            self.active = None;
            self.events
                .publish(EngineEvent::ViewportDeactivated { viewport });
        }
        if self.hovered == Some(viewport) {
            self.hovered = None;
        }
        log::debug!("unregistered {viewport}");
        true
    }

    /// Move the toolbar to `viewport` and bring any drawing along. Returns
    /// whether the active viewport changed.
    pub fn switch_active_viewport(&mut self, viewport: ViewportId) -> Result<bool, EngineError> {
        let symbol = self
            .viewports
            .get(&viewport)
            .map(|r| r.symbol)
            .ok_or(EngineError::UnknownViewport(viewport))?;
        if self.active == Some(viewport) {
            return Ok(false);
        }
        if let Some(previous) = self.active.take() {
            if let Some(record) = self.viewports.get_mut(&previous) {
                record.toolbar_open = false;
            }
            self.events
                .publish(EngineEvent::ViewportDeactivated { viewport: previous });
        }
        if let Some(record) = self.viewports.get_mut(&viewport) {
            record.toolbar_open = true;
        }
        self.active = Some(viewport);
        self.events
            .publish(EngineEvent::ViewportActivated { viewport });
        self.follow_pointer(viewport, symbol);
        Ok(true)
    }

    /// Re-project every view of `viewport` after the host panned or zoomed.
    pub fn refresh_viewport(&mut self, viewport: ViewportId) -> Result<(), EngineError> {
        let record = self
            .viewports
            .get_mut(&viewport)
            .ok_or(EngineError::UnknownViewport(viewport))?;
        if let Some(list) = self.symbols.get(&record.symbol) {
            for annotation in list {
                record.refresh(annotation, self.selection);
            }
        }
        if self.tools.session().is_some_and(|s| s.viewport == viewport) {
            self.sync_session_view();
        }
        Ok(())
    }

    // ─── Selection ───────────────────────────────────────────────────────

    /// Select `id`, making its view in `viewport` the live one. Refused for
    /// hidden or unknown annotations, for a viewport of another symbol, and
    /// while a deselection is running.
    pub fn select_annotation(&mut self, id: AnnotationId, viewport: ViewportId) -> bool {
        if self.deselecting {
            log::debug!("select {id} refused during deselection");
            return false;
        }
        let Some(record) = self.viewports.get(&viewport) else {
            return false;
        };
        let Some(annotation) = find(&self.symbols, id) else {
            return false;
        };
        if annotation.symbol() != record.symbol
            || !annotation.is_completed()
            || !annotation.is_visible()
        {
            return false;
        }
        let kind = annotation.kind();

        if let Some(current) = self.selection {
            if current.annotation == id {
                if current.viewport != viewport {
                    if self.edit.is_some() {
                        self.cancel_edit();
                    }
                    self.selection = Some(Selection {
                        annotation: id,
                        viewport,
                    });
                    self.refresh_annotation(id);
                }
                return true;
            }
            self.unselect_annotation();
        }

        let Some(annotation) = find_mut(&mut self.symbols, id) else {
            return false;
        };
        if !annotation.select() {
            return false;
        }
        self.selection = Some(Selection {
            annotation: id,
            viewport,
        });
        self.refresh_annotation(id);
        self.events
            .publish(EngineEvent::AnnotationSelected { id, kind, viewport });
        true
    }

    /// Drop the selection, discarding any staged edit. Returns `false` when
    /// nothing was selected or a deselection is already running.
    pub fn unselect_annotation(&mut self) -> bool {
        if self.deselecting {
            return false;
        }
        let Some(selection) = self.selection.take() else {
            return false;
        };
        self.deselecting = true;
        self.edit = None;
        if let Some(annotation) = find_mut(&mut self.symbols, selection.annotation) {
            annotation.deselect();
        }
        self.refresh_annotation(selection.annotation);
        self.events.publish(EngineEvent::AnnotationDeselected {
            id: selection.annotation,
        });
        self.deselecting = false;
        true
    }

    // ─── Tools & drawing ─────────────────────────────────────────────────

    /// Arm `kind`: abandon any drawing in progress and clear the selection.
    pub fn start_tool_drawing(&mut self, kind: ShapeKind) {
        self.unselect_annotation();
        let dropped = self.tools.activate(kind);
        self.discard_session(dropped);
        self.tools.remember_sub_tool(kind);
        self.events
            .publish(EngineEvent::ToolClicked { tool: Some(kind) });
    }

    /// Toolbar click. Clicking the armed tool disarms it.
    pub fn click_tool(&mut self, kind: ShapeKind) -> ToolToggle {
        self.unselect_annotation();
        let (toggle, dropped) = self.tools.toggle(kind);
        self.discard_session(dropped);
        let tool = match toggle {
            ToolToggle::Activated(kind) => Some(kind),
            ToolToggle::Deactivated => None,
        };
        self.events.publish(EngineEvent::ToolClicked { tool });
        toggle
    }

    /// Click on a group button: toggles the group's remembered sub-tool.
    pub fn click_tool_group(&mut self, group: ToolGroup) -> ToolToggle {
        let kind = self.tools.sub_tool(group);
        self.click_tool(kind)
    }

    /// Pick a sub-tool from a group's menu and arm it.
    pub fn click_sub_tool(&mut self, kind: ShapeKind) {
        let group = self.tools.remember_sub_tool(kind);
        self.events
            .publish(EngineEvent::SubToolClicked { group, tool: kind });
        self.start_tool_drawing(kind);
    }

    /// Disarm the tool and drop the unfinished annotation. Returns whether a
    /// tool was armed.
    pub fn cancel_drawing(&mut self) -> bool {
        let armed = self.tools.is_creating();
        let dropped = self.tools.deactivate();
        self.discard_session(dropped);
        if armed {
            self.events.publish(EngineEvent::ToolClicked { tool: None });
        }
        armed
    }

    /// Hover while a tool is armed. Immediate-start tools open their session
    /// here; others only preview once the first point is down.
    pub fn preview_point(&mut self, viewport: ViewportId, p: Point) -> bool {
        if !self.tools.is_creating() {
            return false;
        }
        let Some(record) = self.viewports.get(&viewport) else {
            return false;
        };
        let (symbol, seconds_per_bar) = (record.symbol, record.seconds_per_bar);
        let Some(domain) = CoordinateMapper::new(&*record.surface).to_domain(p) else {
            return false;
        };
        self.follow_pointer(viewport, symbol);

        let immediate = self
            .tools
            .current()
            .is_some_and(|kind| kind.spec().immediate_start);
        if self.tools.session().is_none() && !immediate {
            return false;
        }
        let Some(session) = self.tools.begin_session(symbol, viewport, seconds_per_bar) else {
            return false;
        };
        session.preview = Some(domain);
        self.sync_session_view();
        true
    }

    /// Click at device position `p` while a tool is armed.
    pub fn place_point(
        &mut self,
        viewport: ViewportId,
        p: Point,
    ) -> Result<PointOutcome, EngineError> {
        let record = self
            .viewports
            .get(&viewport)
            .ok_or(EngineError::UnknownViewport(viewport))?;
        match CoordinateMapper::new(&*record.surface).to_domain(p) {
            Some(point) => self.place_domain_point(viewport, point),
            None => Ok(PointOutcome::Ignored),
        }
    }

    /// Place a point given in domain coordinates.
    pub fn place_domain_point(
        &mut self,
        viewport: ViewportId,
        point: DrawingPoint,
    ) -> Result<PointOutcome, EngineError> {
        let record = self
            .viewports
            .get(&viewport)
            .ok_or(EngineError::UnknownViewport(viewport))?;
        let (symbol, seconds_per_bar) = (record.symbol, record.seconds_per_bar);
        if !self.tools.is_creating() {
            return Ok(PointOutcome::Ignored);
        }
        self.follow_pointer(viewport, symbol);

        let extend = self.config.extend_time;
        let Some(session) = self.tools.begin_session(symbol, viewport, seconds_per_bar) else {
            return Ok(PointOutcome::Ignored);
        };
        session.preview = None;
        let outcome = session.annotation.add_point(point, extend);
        match outcome {
            PointOutcome::Completed => {
                if let Some(session) = self.tools.take_session() {
                    self.complete_drawing(session.annotation, viewport)?;
                }
            }
            PointOutcome::Pending { .. } => self.sync_session_view(),
            PointOutcome::Ignored => {}
        }
        Ok(outcome)
    }

    /// Add a completed annotation drawn in `origin`: append it, persist, and
    /// show it in every viewport of its symbol. The origin keeps the view it
    /// was drawn in; every other viewport gets a new read-only one.
    pub fn complete_drawing(
        &mut self,
        annotation: Annotation,
        origin: ViewportId,
    ) -> Result<AnnotationId, EngineError> {
        let id = annotation.id();
        if !annotation.is_completed() {
            return Err(EngineError::IncompleteAnnotation(id));
        }
        if !self.viewports.contains_key(&origin) {
            return Err(EngineError::UnknownViewport(origin));
        }
        let (symbol, kind) = (annotation.symbol(), annotation.kind());

        let mut carried = self
            .viewports
            .get_mut(&origin)
            .and_then(|r| r.in_progress.take());
        if let Some(stale) = carried.take_if(|v| v.annotation() != id) {
            if let Some(record) = self.viewports.get_mut(&origin) {
                record.detach_view(&stale);
            }
        }

        self.symbols.entry(symbol).or_default().push(annotation);
        self.persist(symbol);

        if let Some(annotation) = self.symbols.get(&symbol).and_then(|l| l.last()) {
            for (viewport, record) in self.viewports.iter_mut() {
                if record.symbol != symbol {
                    continue;
                }
                match carried.take_if(|_| *viewport == origin) {
                    Some(view) => record.adopt(view, annotation),
                    None => record.attach(ViewInstance::new(annotation, *viewport), annotation),
                }
            }
        }
        if let Some(view) = carried {
            // Drawn in a viewport of another symbol.
            if let Some(record) = self.viewports.get_mut(&origin) {
                record.detach_view(&view);
            }
        }

        self.tools.deactivate();
        self.events
            .publish(EngineEvent::AnnotationCompleted { id, symbol, kind });
        self.events.publish(EngineEvent::ToolClicked { tool: None });
        Ok(id)
    }

    // ─── Removal ─────────────────────────────────────────────────────────

    /// Remove one annotation everywhere. Removing an unknown id is a no-op.
    pub fn remove_annotation(&mut self, id: AnnotationId) -> bool {
        let Some(symbol) = find(&self.symbols, id).map(Annotation::symbol) else {
            return false;
        };
        if self.selection.is_some_and(|s| s.annotation == id) {
            self.unselect_annotation();
        }
        if let Some(list) = self.symbols.get_mut(&symbol) {
            list.retain(|a| a.id() != id);
        }
        for record in self.viewports.values_mut() {
            record.detach(id);
        }
        self.persist(symbol);
        self.events
            .publish(EngineEvent::AnnotationRemoved { id, symbol });
        true
    }

    /// Remove every annotation of `symbol`. Returns how many were removed.
    pub fn remove_all_for_symbol(&mut self, symbol: Symbol) -> usize {
        let ids: Vec<AnnotationId> = self.annotations(symbol).iter().map(Annotation::id).collect();
        if ids.is_empty() {
            return 0;
        }
        if self.selection.is_some_and(|s| ids.contains(&s.annotation)) {
            self.unselect_annotation();
        }
        if let Some(list) = self.symbols.get_mut(&symbol) {
            list.clear();
        }
        for record in self.viewports.values_mut() {
            if record.symbol == symbol {
                for id in &ids {
                    record.detach(*id);
                }
            }
        }
        self.persist(symbol);
        for id in &ids {
            self.events
                .publish(EngineEvent::AnnotationRemoved { id: *id, symbol });
        }
        ids.len()
    }

    // ─── Pointer interaction ─────────────────────────────────────────────

    /// Topmost annotation under `p` in `viewport` and the handle hit. The
    /// selected annotation wins over anything drawn above it.
    pub fn hit_test(&self, viewport: ViewportId, p: Point) -> Option<(AnnotationId, Handle)> {
        let record = self.viewports.get(&viewport)?;
        if let Some(selected) = self.selection.map(|s| s.annotation) {
            let hit = record
                .view(selected)
                .and_then(|v| v.hover_target(p, &self.config));
            if let Some(handle) = hit {
                return Some((selected, handle));
            }
        }
        record
            .views
            .iter()
            .rev()
            .find_map(|v| v.hover_target(p, &self.config).map(|h| (v.annotation(), h)))
    }

    /// Pointer moved over `viewport` with no button held. Updates hover
    /// feedback (or the drawing preview) and returns the cursor to show.
    pub fn hover(&mut self, viewport: ViewportId, p: Point) -> CursorStyle {
        let Some(symbol) = self.viewports.get(&viewport).map(|r| r.symbol) else {
            return CursorStyle::Default;
        };
        self.hovered = Some(viewport);
        if self.tools.is_creating() {
            self.follow_pointer(viewport, symbol);
            self.preview_point(viewport, p);
            return CursorStyle::Crosshair;
        }
        if self.edit.is_some() {
            return CursorStyle::Grabbing;
        }

        let hit = self.hit_test(viewport, p);
        let selected = self.selection.map(|s| s.annotation);
        if let Some(record) = self.viewports.get_mut(&viewport) {
            for view in &mut record.views {
                let handle = match hit {
                    Some((id, handle)) if Some(id) == selected && view.annotation() == id => {
                        Some(handle)
                    }
                    _ => None,
                };
                if view.set_hovered(handle) {
                    record.surface.overlay_changed(view);
                }
            }
        }
        log::trace!("hover {viewport} at {p:?}: {hit:?}");
        match hit {
            Some((id, handle)) if Some(id) == selected => handle.cursor(),
            Some(_) => CursorStyle::Pointer,
            None => CursorStyle::Default,
        }
    }

    /// Pointer left `viewport`.
    pub fn clear_hover(&mut self, viewport: ViewportId) {
        if self.hovered == Some(viewport) {
            self.hovered = None;
        }
        if let Some(record) = self.viewports.get_mut(&viewport) {
            for view in &mut record.views {
                if view.set_hovered(None) {
                    record.surface.overlay_changed(view);
                }
            }
        }
    }

    /// Start dragging or resizing the selected annotation from `p`. Only
    /// the viewport holding the selection accepts this.
    pub fn begin_edit(&mut self, viewport: ViewportId, p: Point) -> bool {
        if self.edit.is_some() {
            return false;
        }
        let Some(selection) = self.selection.filter(|s| s.viewport == viewport) else {
            return false;
        };
        let Some(view) = self
            .viewports
            .get(&viewport)
            .and_then(|r| r.view(selection.annotation))
        else {
            return false;
        };
        let Some(handle) = view.hover_target(p, &self.config) else {
            return false;
        };
        let start: Anchors = view.anchors().iter().copied().collect();

        let Some(annotation) = find_mut(&mut self.symbols, selection.annotation) else {
            return false;
        };
        if start.len() != annotation.points().len() {
            return false;
        }
        let edit = if handle.is_translate() {
            EditKind::Drag
        } else {
            EditKind::Resize
        };
        if !annotation.begin_edit(edit) {
            return false;
        }
        log::debug!("{edit:?} {} via {}", selection.annotation, handle.as_str());
        self.edit = Some(EditSession {
            annotation: selection.annotation,
            viewport,
            handle,
            origin: p,
            start,
        });
        self.refresh_annotation(selection.annotation);
        true
    }

    /// Pointer at `p` during an edit: stage the transformed points. A no-op
    /// when the viewport or the geometry is gone.
    pub fn update_edit(&mut self, p: Point) -> bool {
        let Some(edit) = self.edit.as_ref() else {
            return false;
        };
        let Some(record) = self.viewports.get(&edit.viewport) else {
            return false;
        };
        let Some(kind) = find(&self.symbols, edit.annotation).map(Annotation::kind) else {
            return false;
        };
        let Some(device) =
            transform::apply_handle(kind.is_box(), edit.handle, &edit.start, edit.origin, p)
        else {
            return false;
        };
        let mapper = CoordinateMapper::new(&*record.surface);
        let Some(mut points) = device
            .iter()
            .map(|d| mapper.to_domain(*d))
            .collect::<Option<ControlPoints>>()
        else {
            return false;
        };
        kind.finalize(&mut points, self.config.extend_time);

        let id = edit.annotation;
        let Some(annotation) = find_mut(&mut self.symbols, id) else {
            return false;
        };
        if !annotation.stage(points) {
            return false;
        }
        log::trace!("staged {id}: {:?}", annotation.display_points());
        self.refresh_annotation(id);
        true
    }

    /// Pointer released: commit the staged points and persist if they
    /// changed. Returns whether anything changed.
    pub fn finish_edit(&mut self) -> bool {
        let Some(edit) = self.edit.take() else {
            return false;
        };
        let Some(annotation) = find_mut(&mut self.symbols, edit.annotation) else {
            return false;
        };
        let changed = annotation.commit();
        let symbol = annotation.symbol();
        if changed {
            self.persist(symbol);
        }
        self.refresh_annotation(edit.annotation);
        changed
    }

    /// Abort an edit, keeping the committed points.
    pub fn cancel_edit(&mut self) -> bool {
        let Some(edit) = self.edit.take() else {
            return false;
        };
        if let Some(annotation) = find_mut(&mut self.symbols, edit.annotation) {
            annotation.cancel_edit();
        }
        self.refresh_annotation(edit.annotation);
        true
    }

    // ─── Attribute edits ─────────────────────────────────────────────────

    fn edit_attribute(
        &mut self,
        id: AnnotationId,
        f: impl FnOnce(&mut Annotation),
    ) -> Result<(), EngineError> {
        let annotation =
            find_mut(&mut self.symbols, id).ok_or(EngineError::UnknownAnnotation(id))?;
        f(annotation);
        let symbol = annotation.symbol();
        self.persist(symbol);
        self.refresh_annotation(id);
        Ok(())
    }

    /// Patch style fields from loose JSON; malformed fields fall back to
    /// their defaults.
    pub fn update_style(&mut self, id: AnnotationId, patch: &Value) -> Result<(), EngineError> {
        self.edit_attribute(id, |a| a.apply_style_patch(patch))
    }

    pub fn set_text(&mut self, id: AnnotationId, text: Option<String>) -> Result<(), EngineError> {
        self.edit_attribute(id, |a| a.set_text(text))
    }

    /// Show or hide one annotation. Hiding the selection deselects it.
    pub fn set_visible(&mut self, id: AnnotationId, visible: bool) -> Result<(), EngineError> {
        if !visible && self.selection.is_some_and(|s| s.annotation == id) {
            self.unselect_annotation();
        }
        self.edit_attribute(id, |a| a.set_visible(visible))
    }

    /// Show or hide every annotation of `symbol`. Returns how many changed.
    pub fn set_symbol_visible(&mut self, symbol: Symbol, visible: bool) -> usize {
        let ids: Vec<AnnotationId> = self
            .annotations(symbol)
            .iter()
            .filter(|a| a.is_visible() != visible)
            .map(Annotation::id)
            .collect();
        if ids.is_empty() {
            return 0;
        }
        if !visible && self.selection.is_some_and(|s| ids.contains(&s.annotation)) {
            self.unselect_annotation();
        }
        if let Some(list) = self.symbols.get_mut(&symbol) {
            for annotation in list.iter_mut() {
                annotation.set_visible(visible);
            }
        }
        self.persist(symbol);
        for id in &ids {
            self.refresh_annotation(*id);
        }
        ids.len()
    }

    // ─── Keyboard ────────────────────────────────────────────────────────

    /// Run a resolved shortcut. Returns whether it did anything.
    pub fn apply_shortcut(&mut self, action: ShortcutAction) -> bool {
        match action {
            ShortcutAction::Delete => match self.selection {
                Some(selection) => self.remove_annotation(selection.annotation),
                None => false,
            },
            ShortcutAction::Cancel => {
                if self.tools.is_creating() {
                    self.cancel_drawing()
                } else if self.edit.is_some() {
                    self.cancel_edit()
                } else {
                    self.unselect_annotation()
                }
            }
            ShortcutAction::Tool(kind) => {
                self.click_tool(kind);
                true
            }
        }
    }
}

impl Drop for AnnotationRegistry {
    fn drop(&mut self) {
        for record in self.viewports.values_mut() {
            record.detach_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use od_core::coords::LinearScale;
    use od_core::model::{Time, TimeRange};
    use od_core::persist::MemoryStore;
    use od_render::surface::HeadlessSurface;

    fn registry_with_rect() -> (AnnotationRegistry, ViewportId, AnnotationId) {
        let mut reg =
            AnnotationRegistry::new(EngineConfig::default(), Box::new(MemoryStore::new()));
        let surface = HeadlessSurface::new(LinearScale::new(
            TimeRange::new(Time(0.0), Time(1000.0)),
            0.0,
            100.0,
            1000.0,
            1000.0,
        ));
        let handle = reg
            .register_viewport(ViewportDescriptor::new("GUARD", surface))
            .unwrap();
        reg.start_tool_drawing(ShapeKind::Rectangle);
        for (t, p) in [(100.0, 50.0), (200.0, 80.0)] {
            reg.place_domain_point(handle.id, DrawingPoint::new(Time(t), p))
                .unwrap();
        }
        let id = reg.annotations(handle.symbol)[0].id();
        (reg, handle.id, id)
    }

    #[test]
    fn selection_is_refused_while_deselecting() {
        let (mut reg, vp, id) = registry_with_rect();
        reg.deselecting = true;
        assert!(!reg.select_annotation(id, vp));
        assert_eq!(reg.selected(), None);
        assert!(!reg.annotation(id).unwrap().is_selected());

        reg.deselecting = false;
        assert!(reg.select_annotation(id, vp));
    }

    #[test]
    fn nested_deselection_is_a_no_op() {
        let (mut reg, vp, id) = registry_with_rect();
        reg.select_annotation(id, vp);
        reg.events_mut().drain();

        reg.deselecting = true;
        assert!(!reg.unselect_annotation());
        assert!(reg.events().pending().is_empty());

        reg.deselecting = false;
        assert!(reg.unselect_annotation());
        assert!(!reg.deselecting);
        assert_eq!(
            reg.events_mut().drain(),
            vec![EngineEvent::AnnotationDeselected { id }]
        );
    }
}
