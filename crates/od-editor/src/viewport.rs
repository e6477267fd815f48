//! Per-chart pointer controller.
//!
//! Translates one viewport's raw input into registry calls. A press on the
//! selected annotation arms a hold timer: holding still past
//! `hold_delay_ms`, or moving further than `drag_threshold`, turns the press
//! into a drag; releasing earlier is a plain click. Other presses resolve
//! as clicks on release (placing a point, selecting, or deselecting).

use crate::input::{InputEvent, PointerButton};
use crate::registry::AnnotationRegistry;
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use kurbo::Point;
use od_core::id::ViewportId;
use od_render::hit::CursorStyle;
use std::time::Instant;

/// What the host should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerResponse {
    pub cursor: CursorStyle,
    /// Something visible changed.
    pub redraw: bool,
    /// Keep the pointer captured (suppress chart panning).
    pub capture: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Press {
    /// Resolves as a click on release, unless the pointer travelled.
    Click { origin: Point },
    /// On the selected annotation, waiting for hold or travel.
    Armed { origin: Point, deadline: Instant },
    Editing,
}

#[derive(Debug)]
pub struct ViewportController {
    viewport: ViewportId,
    press: Option<Press>,
}

impl ViewportController {
    pub fn new(viewport: ViewportId) -> Self {
        Self {
            viewport,
            press: None,
        }
    }

    pub fn viewport(&self) -> ViewportId {
        self.viewport
    }

    /// Whether a button is held over this viewport.
    pub fn is_pressing(&self) -> bool {
        self.press.is_some()
    }

    /// Whether a press is waiting on the hold timer.
    pub fn is_armed(&self) -> bool {
        matches!(self.press, Some(Press::Armed { .. }))
    }

    pub fn handle(
        &mut self,
        registry: &mut AnnotationRegistry,
        event: &InputEvent,
    ) -> PointerResponse {
        match event {
            InputEvent::PointerDown {
                x,
                y,
                button: PointerButton::Primary,
                at,
                ..
            } => self.pointer_down(registry, Point::new(*x, *y), *at),
            InputEvent::PointerDown {
                button: PointerButton::Secondary,
                ..
            } => self.secondary_down(registry),
            InputEvent::PointerDown { .. } => PointerResponse::default(),
            InputEvent::PointerMove { x, y, at } => {
                self.pointer_move(registry, Point::new(*x, *y), *at)
            }
            InputEvent::PointerUp {
                x,
                y,
                button: PointerButton::Primary,
                ..
            } => self.pointer_up(registry, Point::new(*x, *y)),
            InputEvent::PointerUp { .. } => PointerResponse::default(),
            InputEvent::PointerLeave { .. } => {
                if !self.is_pressing() {
                    registry.clear_hover(self.viewport);
                }
                PointerResponse {
                    redraw: true,
                    capture: self.is_pressing(),
                    ..PointerResponse::default()
                }
            }
            InputEvent::Key { key, modifiers } => {
                let Some(action) = ShortcutMap::resolve(key, *modifiers) else {
                    return PointerResponse::default();
                };
                if action == ShortcutAction::Cancel {
                    self.press = None;
                }
                PointerResponse {
                    redraw: registry.apply_shortcut(action),
                    ..PointerResponse::default()
                }
            }
        }
    }

    /// Fire the hold timer if it expired.
    pub fn tick(&mut self, registry: &mut AnnotationRegistry, now: Instant) -> PointerResponse {
        match self.press {
            Some(Press::Armed { origin, deadline }) if now >= deadline => {
                log::trace!("hold timer fired in {}", self.viewport);
                self.start_drag(registry, origin, origin)
            }
            _ => PointerResponse::default(),
        }
    }

    fn pointer_down(
        &mut self,
        registry: &mut AnnotationRegistry,
        p: Point,
        at: Instant,
    ) -> PointerResponse {
        if registry.switch_active_viewport(self.viewport).is_err() {
            self.press = None;
            return PointerResponse::default();
        }
        // A new press during an edit means the release was lost: abort the
        // edit and drop the selection without picking anything new.
        if self.press.take() == Some(Press::Editing) || registry.is_editing() {
            registry.cancel_edit();
            registry.unselect_annotation();
            return PointerResponse {
                redraw: true,
                ..PointerResponse::default()
            };
        }

        if registry.tools().is_creating() {
            self.press = Some(Press::Click { origin: p });
            return PointerResponse {
                cursor: CursorStyle::Crosshair,
                redraw: false,
                capture: true,
            };
        }

        let selected = registry.selected().map(|s| s.annotation);
        match registry.hit_test(self.viewport, p) {
            Some((id, handle)) if Some(id) == selected => {
                let moved = registry.select_annotation(id, self.viewport);
                self.press = Some(Press::Armed {
                    origin: p,
                    deadline: at + registry.config().hold_delay(),
                });
                PointerResponse {
                    cursor: handle.cursor(),
                    redraw: moved,
                    capture: true,
                }
            }
            hit => {
                self.press = Some(Press::Click { origin: p });
                PointerResponse {
                    cursor: if hit.is_some() {
                        CursorStyle::Pointer
                    } else {
                        CursorStyle::Default
                    },
                    redraw: false,
                    capture: hit.is_some(),
                }
            }
        }
    }

    fn secondary_down(&mut self, registry: &mut AnnotationRegistry) -> PointerResponse {
        self.press = None;
        registry.cancel_edit();
        let redraw = registry.unselect_annotation();
        PointerResponse {
            redraw,
            ..PointerResponse::default()
        }
    }

    fn pointer_move(
        &mut self,
        registry: &mut AnnotationRegistry,
        p: Point,
        at: Instant,
    ) -> PointerResponse {
        match self.press {
            Some(Press::Armed { origin, deadline }) => {
                if p.distance(origin) > registry.config().drag_threshold || at >= deadline {
                    self.start_drag(registry, origin, p)
                } else {
                    PointerResponse {
                        cursor: CursorStyle::Grabbing,
                        redraw: false,
                        capture: true,
                    }
                }
            }
            Some(Press::Editing) => PointerResponse {
                cursor: CursorStyle::Grabbing,
                redraw: registry.update_edit(p),
                capture: true,
            },
            Some(Press::Click { .. }) | None => {
                let cursor = registry.hover(self.viewport, p);
                PointerResponse {
                    cursor,
                    redraw: true,
                    capture: self.is_pressing() && registry.tools().is_creating(),
                }
            }
        }
    }

    fn pointer_up(&mut self, registry: &mut AnnotationRegistry, p: Point) -> PointerResponse {
        let redraw = match self.press.take() {
            Some(Press::Editing) => {
                registry.update_edit(p);
                registry.finish_edit();
                true
            }
            // Released on the selected annotation before the hold fired.
            Some(Press::Armed { .. }) => false,
            Some(Press::Click { origin })
                if p.distance(origin) <= registry.config().drag_threshold =>
            {
                self.click(registry, p)
            }
            // The pointer travelled: the host panned the chart.
            Some(Press::Click { .. }) | None => false,
        };
        PointerResponse {
            cursor: registry.hover(self.viewport, p),
            redraw,
            capture: false,
        }
    }

    fn click(&mut self, registry: &mut AnnotationRegistry, p: Point) -> bool {
        if registry.tools().is_creating() {
            return match registry.place_point(self.viewport, p) {
                Ok(outcome) => {
                    log::trace!("placed point in {}: {outcome:?}", self.viewport);
                    true
                }
                Err(e) => {
                    log::warn!("placing point in {}: {e}", self.viewport);
                    false
                }
            };
        }
        match registry.hit_test(self.viewport, p) {
            Some((id, _)) => registry.select_annotation(id, self.viewport),
            None => registry.unselect_annotation(),
        }
    }

    fn start_drag(
        &mut self,
        registry: &mut AnnotationRegistry,
        origin: Point,
        p: Point,
    ) -> PointerResponse {
        if !registry.begin_edit(self.viewport, origin) {
            self.press = Some(Press::Click { origin });
            return PointerResponse::default();
        }
        self.press = Some(Press::Editing);
        registry.update_edit(p);
        PointerResponse {
            cursor: CursorStyle::Grabbing,
            redraw: true,
            capture: true,
        }
    }
}
