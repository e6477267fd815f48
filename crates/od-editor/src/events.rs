//! Typed notifications for toolbar and UI collaborators.

use od_core::id::{AnnotationId, Symbol, ViewportId};
use od_core::shape::ShapeKind;

/// Toolbar groups. A group button remembers the last sub-tool picked in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolGroup {
    Rectangles,
    Lines,
    Fibonacci,
}

impl ToolGroup {
    pub const ALL: [ToolGroup; 3] = [ToolGroup::Rectangles, ToolGroup::Lines, ToolGroup::Fibonacci];

    pub fn of(kind: ShapeKind) -> Self {
        match kind {
            ShapeKind::Rectangle | ShapeKind::RectangleExtended => ToolGroup::Rectangles,
            ShapeKind::Line
            | ShapeKind::LineRay
            | ShapeKind::HorizontalLine
            | ShapeKind::HorizontalRay
            | ShapeKind::VerticalLine => ToolGroup::Lines,
            ShapeKind::Fibonacci => ToolGroup::Fibonacci,
        }
    }

    /// Sub-tool a group starts out with.
    pub fn default_tool(self) -> ShapeKind {
        match self {
            ToolGroup::Rectangles => ShapeKind::Rectangle,
            ToolGroup::Lines => ShapeKind::Line,
            ToolGroup::Fibonacci => ShapeKind::Fibonacci,
        }
    }
}

/// Everything the engine announces.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    AnnotationCompleted {
        id: AnnotationId,
        symbol: Symbol,
        kind: ShapeKind,
    },
    AnnotationSelected {
        id: AnnotationId,
        kind: ShapeKind,
        viewport: ViewportId,
    },
    AnnotationDeselected { id: AnnotationId },
    AnnotationRemoved { id: AnnotationId, symbol: Symbol },
    /// A tool was activated (`Some`) or toggled off (`None`).
    ToolClicked { tool: Option<ShapeKind> },
    SubToolClicked { group: ToolGroup, tool: ShapeKind },
    /// The toolbar opened on this viewport.
    ViewportActivated { viewport: ViewportId },
    /// The toolbar closed on this viewport.
    ViewportDeactivated { viewport: ViewportId },
}

type Subscriber = Box<dyn FnMut(&EngineEvent)>;

/// Publish/subscribe channel with a closed event set.
///
/// Subscribers are called synchronously on publish. Events are also queued
/// so hosts without callbacks can poll with [`EventBus::drain`].
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    queue: Vec<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, f: impl FnMut(&EngineEvent) + 'static) {
        self.subscribers.push(Box::new(f));
    }

    pub fn publish(&mut self, event: EngineEvent) {
        log::debug!("event: {event:?}");
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
        self.queue.push(event);
    }

    /// Take every queued event.
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.queue)
    }

    /// Queued events, oldest first.
    pub fn pending(&self) -> &[EngineEvent] {
        &self.queue
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .field("queue", &self.queue)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn subscribers_and_queue_both_see_events() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut bus = EventBus::new();
        bus.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        bus.publish(EngineEvent::ToolClicked {
            tool: Some(ShapeKind::Line),
        });
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(bus.drain().len(), 1);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn groups_cover_every_kind() {
        for kind in ShapeKind::ALL {
            let group = ToolGroup::of(kind);
            assert_eq!(ToolGroup::of(group.default_tool()), group);
        }
    }
}
