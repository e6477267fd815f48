//! Tool coordination: the active drawing tool and the in-progress session.
//!
//! At most one annotation is being drawn at a time, anchored to the
//! viewport it was started in. If the pointer moves to another viewport
//! mid-draw the session is re-anchored (same symbol) or restarted
//! (different symbol).

use crate::events::ToolGroup;
use od_core::annotation::Annotation;
use od_core::id::{Symbol, ViewportId};
use od_core::model::DrawingPoint;
use od_core::shape::ShapeKind;
use std::collections::HashMap;

/// An annotation being drawn.
#[derive(Debug)]
pub struct DrawingSession {
    pub annotation: Annotation,
    /// Viewport the points are being placed in.
    pub viewport: ViewportId,
    /// Last hover position, drawn as the next point.
    pub preview: Option<DrawingPoint>,
}

/// Result of clicking a tool button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolToggle {
    Activated(ShapeKind),
    Deactivated,
}

/// What happened to a session when the pointer entered another viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reanchor {
    /// No session, or already anchored there.
    Unchanged,
    /// Same symbol: points kept, new anchor.
    Moved { from: ViewportId },
    /// Different symbol: points dropped, tool still armed.
    Restarted { from: ViewportId },
}

#[derive(Debug, Default)]
pub struct ToolCoordinator {
    current: Option<ShapeKind>,
    creating: bool,
    session: Option<DrawingSession>,
    sub_tools: HashMap<ToolGroup, ShapeKind>,
}

impl ToolCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<ShapeKind> {
        self.current
    }

    /// Whether a tool is armed and the next click creates an annotation.
    pub fn is_creating(&self) -> bool {
        self.creating
    }

    pub fn session(&self) -> Option<&DrawingSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut DrawingSession> {
        self.session.as_mut()
    }

    /// Sub-tool a group button currently stands for.
    pub fn sub_tool(&self, group: ToolGroup) -> ShapeKind {
        self.sub_tools
            .get(&group)
            .copied()
            .unwrap_or_else(|| group.default_tool())
    }

    /// Remember `kind` as its group's sub-tool.
    pub fn remember_sub_tool(&mut self, kind: ShapeKind) -> ToolGroup {
        let group = ToolGroup::of(kind);
        self.sub_tools.insert(group, kind);
        group
    }

    /// Arm `kind`. Returns the abandoned session, if any.
    pub fn activate(&mut self, kind: ShapeKind) -> Option<DrawingSession> {
        let dropped = self.session.take();
        self.current = Some(kind);
        self.creating = true;
        dropped
    }

    /// Disarm. Returns the abandoned session, if any.
    pub fn deactivate(&mut self) -> Option<DrawingSession> {
        self.current = None;
        self.creating = false;
        self.session.take()
    }

    /// Toolbar click: re-selecting the armed tool disarms it.
    pub fn toggle(&mut self, kind: ShapeKind) -> (ToolToggle, Option<DrawingSession>) {
        if self.current == Some(kind) {
            (ToolToggle::Deactivated, self.deactivate())
        } else {
            (ToolToggle::Activated(kind), self.activate(kind))
        }
    }

    /// Start a session for the armed tool in `viewport`. No-op when a
    /// session already exists or no tool is armed.
    pub fn begin_session(
        &mut self,
        symbol: Symbol,
        viewport: ViewportId,
        seconds_per_bar: Option<f64>,
    ) -> Option<&mut DrawingSession> {
        if self.session.is_none() {
            let kind = self.current.filter(|_| self.creating)?;
            let mut annotation = Annotation::new(kind, symbol);
            annotation.set_seconds_per_bar(seconds_per_bar);
            log::debug!("drawing {kind} {} in {viewport}", annotation.id());
            self.session = Some(DrawingSession {
                annotation,
                viewport,
                preview: None,
            });
        }
        self.session.as_mut()
    }

    /// Take the session out (on completion).
    pub fn take_session(&mut self) -> Option<DrawingSession> {
        self.session.take()
    }

    /// Follow the pointer into `viewport` showing `symbol`.
    pub fn reanchor(&mut self, viewport: ViewportId, symbol: Symbol) -> Reanchor {
        let Some(session) = self.session.as_mut() else {
            return Reanchor::Unchanged;
        };
        let from = session.viewport;
        if from == viewport {
            return Reanchor::Unchanged;
        }
        if session.annotation.symbol() == symbol {
            session.viewport = viewport;
            session.preview = None;
            return Reanchor::Moved { from };
        }
        log::debug!(
            "restarting {} drawing: {from} → {viewport} changes symbol",
            session.annotation.kind()
        );
        self.session = None;
        Reanchor::Restarted { from }
    }

    /// Drop a session anchored to `viewport` (viewport teardown).
    pub fn drop_session_in(&mut self, viewport: ViewportId) -> Option<DrawingSession> {
        if self.session.as_ref().is_some_and(|s| s.viewport == viewport) {
            return self.session.take();
        }
        None
    }
}
