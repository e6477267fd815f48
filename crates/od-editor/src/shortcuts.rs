//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s. Drawing tools
//! live on Alt so plain letters stay free for the host chart.

use crate::input::Modifiers;
use od_core::shape::ShapeKind;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    /// Remove the selected annotation.
    Delete,
    /// Abort drawing, else abort the edit, else deselect.
    Cancel,
    /// Toggle a drawing tool.
    Tool(ShapeKind),
}

/// Resolves key events into shortcut actions.
pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action.
    ///
    /// `key` is the `KeyboardEvent.key` value (e.g. `"t"`, `"Delete"`).
    /// Returns `None` if the key combo has no binding.
    pub fn resolve(key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        let cmd = modifiers.ctrl || modifiers.meta;
        if cmd {
            return None;
        }

        // ── Modifier combos first (most specific) ──
        if modifiers.alt && modifiers.shift {
            return match key {
                "r" | "R" => Some(ShortcutAction::Tool(ShapeKind::Rectangle)),
                _ => None,
            };
        }

        if modifiers.alt {
            return match key {
                "t" | "T" => Some(ShortcutAction::Tool(ShapeKind::Line)),
                "h" | "H" => Some(ShortcutAction::Tool(ShapeKind::HorizontalLine)),
                "j" | "J" => Some(ShortcutAction::Tool(ShapeKind::HorizontalRay)),
                "v" | "V" => Some(ShortcutAction::Tool(ShapeKind::VerticalLine)),
                "f" | "F" => Some(ShortcutAction::Tool(ShapeKind::Fibonacci)),
                _ => None,
            };
        }

        if modifiers.shift {
            return None;
        }

        // ── Single keys (no modifiers) ──
        match key {
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Cancel),
            _ => None,
        }
    }
}
