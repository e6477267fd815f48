//! Input abstraction layer.
//!
//! Normalizes host pointer and keyboard callbacks into `InputEvent`s
//! consumed by the viewport controller. Positions are device pixels
//! relative to the chart pane. Every pointer event carries the `Instant`
//! it happened at, which drives the press-and-hold timer.

use kurbo::Point;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

/// Modifier keys held during an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: false,
        meta: false,
    };
}

/// A normalized input event from the host chart.
#[derive(Debug, Clone)]
pub enum InputEvent {
    PointerDown {
        x: f64,
        y: f64,
        button: PointerButton,
        modifiers: Modifiers,
        at: Instant,
    },

    PointerMove { x: f64, y: f64, at: Instant },

    PointerUp {
        x: f64,
        y: f64,
        button: PointerButton,
        at: Instant,
    },

    /// Pointer left the pane.
    PointerLeave { at: Instant },

    /// Keyboard key (`KeyboardEvent.key` value, e.g. `"Escape"`).
    Key { key: String, modifiers: Modifiers },
}

impl InputEvent {
    pub fn pointer_down(x: f64, y: f64, at: Instant) -> Self {
        Self::PointerDown {
            x,
            y,
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
            at,
        }
    }

    pub fn secondary_down(x: f64, y: f64, at: Instant) -> Self {
        Self::PointerDown {
            x,
            y,
            button: PointerButton::Secondary,
            modifiers: Modifiers::NONE,
            at,
        }
    }

    pub fn pointer_move(x: f64, y: f64, at: Instant) -> Self {
        Self::PointerMove { x, y, at }
    }

    pub fn pointer_up(x: f64, y: f64, at: Instant) -> Self {
        Self::PointerUp {
            x,
            y,
            button: PointerButton::Primary,
            at,
        }
    }

    pub fn key(key: &str, modifiers: Modifiers) -> Self {
        Self::Key {
            key: key.to_string(),
            modifiers,
        }
    }

    /// Extract position if this is a pointer event.
    pub fn position(&self) -> Option<Point> {
        match self {
            Self::PointerDown { x, y, .. }
            | Self::PointerMove { x, y, .. }
            | Self::PointerUp { x, y, .. } => Some(Point::new(*x, *y)),
            _ => None,
        }
    }

    /// Timestamp, if this is a pointer event.
    pub fn at(&self) -> Option<Instant> {
        match self {
            Self::PointerDown { at, .. }
            | Self::PointerMove { at, .. }
            | Self::PointerUp { at, .. }
            | Self::PointerLeave { at } => Some(*at),
            Self::Key { .. } => None,
        }
    }
}
