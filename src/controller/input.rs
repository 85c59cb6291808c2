/// Platform-agnostic input handling system
use std::collections::HashSet;

use serde::Deserialize;

/// Platform-independent input events
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),
    /// Relative pointer movement in pixels
    MouseMove { dx: f32, dy: f32 },
    PointerLockChanged { locked: bool },
}

/// Pressed keys and mouse movement accumulated between frames
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<String>,
    look_delta: (f32, f32),
    pub pointer_locked: bool,
}

/// Key names are compared case-insensitively ("W" with shift held is still "w")
fn normalize_key(key: &str) -> String {
    key.to_ascii_lowercase()
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process an input event and update state
    pub fn process_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                self.pressed_keys.insert(normalize_key(key));
            }
            InputEvent::KeyUp(key) => {
                self.pressed_keys.remove(&normalize_key(key));
            }
            InputEvent::MouseMove { dx, dy } => {
                self.look_delta.0 += dx;
                self.look_delta.1 += dy;
            }
            InputEvent::PointerLockChanged { locked } => {
                self.pointer_locked = *locked;
            }
        }
    }

    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.pressed_keys.contains(&normalize_key(key))
    }

    pub fn pressed_count(&self) -> usize {
        self.pressed_keys.len()
    }

    /// Mouse movement since the last call
    pub fn consume_look(&mut self) -> (f32, f32) {
        std::mem::take(&mut self.look_delta)
    }
}

/// Key mapping configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub forward: String,
    pub backward: String,
    pub left: String,
    pub right: String,
    pub toggle_debug: String,
    pub toggle_settings: String,
    pub toggle_camera: String,
    pub escape: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: "w".to_string(),
            backward: "s".to_string(),
            left: "a".to_string(),
            right: "d".to_string(),
            toggle_debug: "f".to_string(),
            toggle_settings: "g".to_string(),
            toggle_camera: "c".to_string(),
            escape: "Escape".to_string(),
        }
    }
}

/// One-shot actions triggered on key down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    ToggleDebug,
    ToggleSettings,
    ToggleCamera,
    ReleasePointer,
}

/// High-level input processor
#[derive(Debug, Clone, Default)]
pub struct InputProcessor {
    bindings: KeyBindings,
}

impl InputProcessor {
    pub fn new(bindings: KeyBindings) -> Self {
        Self { bindings }
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    pub fn is_driving_forward(&self, input: &InputState) -> bool {
        input.is_key_pressed(&self.bindings.forward)
    }

    pub fn is_driving_backward(&self, input: &InputState) -> bool {
        input.is_key_pressed(&self.bindings.backward)
    }

    pub fn is_steering_left(&self, input: &InputState) -> bool {
        input.is_key_pressed(&self.bindings.left)
    }

    pub fn is_steering_right(&self, input: &InputState) -> bool {
        input.is_key_pressed(&self.bindings.right)
    }

    pub fn action_for_key(&self, key: &str) -> Option<KeyAction> {
        let b = &self.bindings;
        if key.eq_ignore_ascii_case(&b.toggle_debug) {
            Some(KeyAction::ToggleDebug)
        } else if key.eq_ignore_ascii_case(&b.toggle_settings) {
            Some(KeyAction::ToggleSettings)
        } else if key.eq_ignore_ascii_case(&b.toggle_camera) {
            Some(KeyAction::ToggleCamera)
        } else if key.eq_ignore_ascii_case(&b.escape) {
            Some(KeyAction::ReleasePointer)
        } else {
            None
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub mod wasm {
    use super::*;
    use web_sys::{KeyboardEvent, MouseEvent};

    pub fn keyboard_event_to_input(e: &KeyboardEvent, is_down: bool) -> InputEvent {
        let key = e.key();
        if is_down {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        }
    }

    pub fn mouse_move_to_input(e: &MouseEvent) -> InputEvent {
        InputEvent::MouseMove {
            dx: e.movement_x() as f32,
            dy: e.movement_y() as f32,
        }
    }
}
