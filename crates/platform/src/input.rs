//! Mouse input tracking.
//!
//! The render loop receives mouse events from winit and forwards them to
//! the application's camera controls. [`MouseState`] keeps the last known
//! cursor position and pressed buttons so drag handlers can compute
//! per-event deltas.

use winit::event::MouseButton as WinitMouseButton;

/// Mouse buttons the renderer cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Translate a winit mouse button, if it is one we track.
    pub fn from_winit(button: WinitMouseButton) -> Option<Self> {
        match button {
            WinitMouseButton::Left => Some(MouseButton::Left),
            WinitMouseButton::Right => Some(MouseButton::Right),
            WinitMouseButton::Middle => Some(MouseButton::Middle),
            _ => None,
        }
    }

    #[inline]
    fn index(self) -> usize {
        match self {
            MouseButton::Left => 0,
            MouseButton::Right => 1,
            MouseButton::Middle => 2,
        }
    }
}

/// Tracks cursor position and button state between events.
#[derive(Debug, Default)]
pub struct MouseState {
    position: (f32, f32),
    pressed: [bool; 3],
}

impl MouseState {
    /// Create a new mouse state with nothing pressed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a button press at the current cursor position.
    pub fn on_button_down(&mut self, button: MouseButton) {
        self.pressed[button.index()] = true;
    }

    /// Record a button release.
    pub fn on_button_up(&mut self, button: MouseButton) {
        self.pressed[button.index()] = false;
    }

    /// Record a cursor move and return the delta from the previous
    /// position in pixels.
    pub fn on_move(&mut self, x: f32, y: f32) -> (f32, f32) {
        let delta = (x - self.position.0, y - self.position.1);
        self.position = (x, y);
        delta
    }

    /// Last known cursor position.
    #[inline]
    pub fn position(&self) -> (f32, f32) {
        self.position
    }

    /// Whether the given button is currently held.
    #[inline]
    pub fn is_pressed(&self, button: MouseButton) -> bool {
        self.pressed[button.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_reports_delta() {
        let mut mouse = MouseState::new();
        mouse.on_move(10.0, 20.0);
        let (dx, dy) = mouse.on_move(15.0, 18.0);
        assert_eq!(dx, 5.0);
        assert_eq!(dy, -2.0);
    }

    #[test]
    fn test_button_state_tracking() {
        let mut mouse = MouseState::new();
        assert!(!mouse.is_pressed(MouseButton::Left));

        mouse.on_button_down(MouseButton::Left);
        assert!(mouse.is_pressed(MouseButton::Left));
        assert!(!mouse.is_pressed(MouseButton::Right));

        mouse.on_button_up(MouseButton::Left);
        assert!(!mouse.is_pressed(MouseButton::Left));
    }

    #[test]
    fn test_from_winit_ignores_extra_buttons() {
        assert_eq!(
            MouseButton::from_winit(WinitMouseButton::Left),
            Some(MouseButton::Left)
        );
        assert_eq!(MouseButton::from_winit(WinitMouseButton::Back), None);
    }
}
