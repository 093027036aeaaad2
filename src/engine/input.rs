// Input state tracking for keyboard and mouse
// Abstracts winit events into a queryable per-frame snapshot

use std::collections::HashSet;
use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

pub struct InputState {
    // Keyboard
    keys_held: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,

    // Mouse, in physical pixels
    pub mouse_position: (f32, f32),
    /// Set when the cursor moved this frame.
    pub mouse_moved: bool,
    /// Cursor position of every left-button press this frame.
    pub clicks: Vec<(f32, f32)>,

    // Scroll: accumulated vertical scroll this frame, reset in end_frame()
    pub scroll_delta: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            keys_held: HashSet::new(),
            keys_pressed: HashSet::new(),
            mouse_position: (0.0, 0.0),
            mouse_moved: false,
            clicks: Vec::new(),
            scroll_delta: 0.0,
        }
    }

    /// Feed a winit WindowEvent into the input state.
    /// Call this once per event before the game's own event handling.
    pub fn process_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => {
                            if !event.repeat {
                                self.keys_pressed.insert(key);
                            }
                            self.keys_held.insert(key);
                        }
                        ElementState::Released => { self.keys_held.remove(&key); }
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_position = (position.x as f32, position.y as f32);
                self.mouse_moved = true;
            }
            WindowEvent::MouseInput { state: ElementState::Pressed, button: MouseButton::Left, .. } => {
                self.clicks.push(self.mouse_position);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                self.scroll_delta += y;
            }
            _ => {}
        }
    }

    /// Call once per frame after update() and render() have consumed input.
    /// Resets per-frame accumulators.
    pub fn end_frame(&mut self) {
        self.scroll_delta = 0.0;
        self.mouse_moved = false;
        self.clicks.clear();
        self.keys_pressed.clear();
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    /// True only on the frame the key went down.
    pub fn was_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Arrow-key direction on the ground plane, -1/0/1 per axis.
    /// Left beats right and up beats down when both are held.
    pub fn arrow_direction(&self) -> Vec2 {
        let x = if self.is_key_held(KeyCode::ArrowLeft) {
            -1.0
        } else if self.is_key_held(KeyCode::ArrowRight) {
            1.0
        } else {
            0.0
        };
        let y = if self.is_key_held(KeyCode::ArrowUp) {
            -1.0
        } else if self.is_key_held(KeyCode::ArrowDown) {
            1.0
        } else {
            0.0
        };
        Vec2::new(x, y)
    }
}
