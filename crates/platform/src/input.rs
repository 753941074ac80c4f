//! Keyboard state tracking.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::PhysicalKey;

/// Tracks held keys and the edges seen since the last frame.
#[derive(Debug, Default)]
pub struct InputState {
    /// Currently held keys
    held: HashSet<KeyCode>,
    /// Keys pressed since the last `begin_frame`
    just_pressed: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears per-frame edges. Call once per frame after handling input.
    pub fn begin_frame(&mut self) {
        self.just_pressed.clear();
    }

    /// Feeds a winit keyboard event. Key repeats do not count as new presses.
    pub fn on_key_event(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(key) = event.physical_key else {
            return;
        };
        match event.state {
            ElementState::Pressed => self.on_key_pressed(key),
            ElementState::Released => self.on_key_released(key),
        }
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.held.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.held.remove(&key);
    }

    /// True while the key is held.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    /// True if the key went down since the last `begin_frame`.
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_edge_survives_until_begin_frame() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Space);
        assert!(input.is_key_pressed(KeyCode::Space));
        assert!(input.is_key_just_pressed(KeyCode::Space));

        input.begin_frame();
        assert!(input.is_key_pressed(KeyCode::Space));
        assert!(!input.is_key_just_pressed(KeyCode::Space));
    }

    #[test]
    fn test_repeat_press_is_not_a_new_edge() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::ArrowUp);
        input.begin_frame();
        input.on_key_pressed(KeyCode::ArrowUp);
        assert!(!input.is_key_just_pressed(KeyCode::ArrowUp));

        input.on_key_released(KeyCode::ArrowUp);
        input.on_key_pressed(KeyCode::ArrowUp);
        assert!(input.is_key_just_pressed(KeyCode::ArrowUp));
    }
}
