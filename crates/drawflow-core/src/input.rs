//! Pointer and keyboard events delivered by the host.

use crate::element::ElementId;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Two clicks on the same target within this window form a double-click.
pub const DOUBLE_CLICK_TIME_MS: u64 = 300;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const CTRL: Self = Self {
        shift: false,
        ctrl: true,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Ctrl on Linux/Windows, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Pointer event in screen coordinates.
///
/// `timestamp_ms` is the host's event clock (e.g. `PointerEvent.timeStamp`);
/// only differences between timestamps are used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
        timestamp_ms: u64,
    },
    Up {
        position: Point,
        button: MouseButton,
    },
    Move {
        position: Point,
    },
    Scroll {
        position: Point,
        delta: Vec2,
    },
}

impl PointerEvent {
    /// Left-button press without modifiers.
    pub fn down(position: Point, timestamp_ms: u64) -> Self {
        PointerEvent::Down {
            position,
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
            timestamp_ms,
        }
    }

    pub fn up(position: Point) -> Self {
        PointerEvent::Up {
            position,
            button: MouseButton::Left,
        }
    }

    pub fn moved(position: Point) -> Self {
        PointerEvent::Move { position }
    }

    pub fn position(&self) -> Point {
        match self {
            PointerEvent::Down { position, .. }
            | PointerEvent::Up { position, .. }
            | PointerEvent::Move { position }
            | PointerEvent::Scroll { position, .. } => *position,
        }
    }
}

/// Keys the editor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Escape,
    Delete,
    Backspace,
    Enter,
    F2,
    Character(char),
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Escape" | "Esc" => Some(Key::Escape),
            "Delete" | "Del" => Some(Key::Delete),
            "Backspace" => Some(Key::Backspace),
            "Enter" | "Return" => Some(Key::Enter),
            "F2" => Some(Key::F2),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Key::Character(c.to_ascii_lowercase())),
                    _ => None,
                }
            }
        }
    }
}

/// Key press with the modifiers held at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub fn char(c: char) -> Self {
        Self::new(Key::Character(c))
    }
}

/// Result of registering a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    Single,
    Double,
}

/// Counts clicks per target using event timestamps.
///
/// A click is a double-click when it hits the same target as the previous
/// click within [`DOUBLE_CLICK_TIME_MS`]. A detected double-click resets the
/// counter so a third click starts over.
#[derive(Debug, Clone)]
pub struct ClickTracker {
    last: Option<(Option<ElementId>, u64)>,
    window_ms: u64,
}

impl Default for ClickTracker {
    fn default() -> Self {
        Self::new(DOUBLE_CLICK_TIME_MS)
    }
}

impl ClickTracker {
    pub fn new(window_ms: u64) -> Self {
        Self {
            last: None,
            window_ms,
        }
    }

    pub fn register(&mut self, target: Option<ElementId>, timestamp_ms: u64) -> ClickKind {
        let is_double = matches!(
            self.last,
            Some((last_target, last_time))
                if target.is_some()
                    && last_target == target
                    && timestamp_ms >= last_time
                    && timestamp_ms - last_time < self.window_ms
        );
        if is_double {
            self.last = None;
            ClickKind::Double
        } else {
            self.last = Some((target, timestamp_ms));
            ClickKind::Single
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Pointer state carried between events.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Last pointer position in screen coordinates.
    pub pointer_position: Point,
    pressed_buttons: HashSet<MouseButton>,
    pub modifiers: Modifiers,
    /// Screen position where the current left-button drag started.
    pub drag_start: Option<Point>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_pointer_event(&mut self, event: &PointerEvent) {
        match *event {
            PointerEvent::Down {
                position,
                button,
                modifiers,
                ..
            } => {
                self.pointer_position = position;
                self.modifiers = modifiers;
                self.pressed_buttons.insert(button);
                if button == MouseButton::Left {
                    self.drag_start = Some(position);
                }
            }
            PointerEvent::Up { position, button } => {
                self.pointer_position = position;
                self.pressed_buttons.remove(&button);
                if button == MouseButton::Left {
                    self.drag_start = None;
                }
            }
            PointerEvent::Move { position } | PointerEvent::Scroll { position, .. } => {
                self.pointer_position = position;
            }
        }
    }

    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_start.is_some()
    }

    /// Screen-space distance travelled since the drag started.
    pub fn drag_delta(&self) -> Option<Vec2> {
        self.drag_start.map(|start| self.pointer_position - start)
    }
}
