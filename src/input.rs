// Keyboard, mouse and touch input mapped to camera motion

use std::collections::{HashMap, HashSet};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Pixels of pinch spread per unit of zoom
const PINCH_SCALE: f32 = 0.02;
/// Pixel wheel deltas per wheel "line"
const PIXELS_PER_LINE: f32 = 50.0;

/// One-shot commands triggered by a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ToggleMode,
    AddKeyframe,
    PlayPath,
    ExportPath,
    ToggleGui,
    ResetCamera,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub forward: KeyCode,
    pub back: KeyCode,
    pub left: KeyCode,
    pub right: KeyCode,
    pub up: KeyCode,
    pub down: KeyCode,
    pub toggle_mode: KeyCode,
    pub add_keyframe: KeyCode,
    pub play_path: KeyCode,
    pub export_path: KeyCode,
    pub toggle_gui: KeyCode,
    pub reset_camera: KeyCode,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: KeyCode::KeyW,
            back: KeyCode::KeyS,
            left: KeyCode::KeyA,
            right: KeyCode::KeyD,
            up: KeyCode::KeyE,
            down: KeyCode::KeyQ,
            toggle_mode: KeyCode::KeyC,
            add_keyframe: KeyCode::KeyK,
            play_path: KeyCode::KeyP,
            export_path: KeyCode::KeyX,
            toggle_gui: KeyCode::F1,
            reset_camera: KeyCode::KeyR,
        }
    }
}

impl KeyBindings {
    pub fn action_for(&self, code: KeyCode) -> Option<Action> {
        let table = [
            (self.toggle_mode, Action::ToggleMode),
            (self.add_keyframe, Action::AddKeyframe),
            (self.play_path, Action::PlayPath),
            (self.export_path, Action::ExportPath),
            (self.toggle_gui, Action::ToggleGui),
            (self.reset_camera, Action::ResetCamera),
        ];
        table
            .into_iter()
            .find(|(key, _)| *key == code)
            .map(|(_, action)| action)
    }

    /// Movement direction (right, up, forward) for the held keys.
    pub fn movement(&self, held: &HashSet<KeyCode>) -> Vec3 {
        let axis = |pos: KeyCode, neg: KeyCode| {
            let mut value = 0.0;
            if held.contains(&pos) {
                value += 1.0;
            }
            if held.contains(&neg) {
                value -= 1.0;
            }
            value
        };
        Vec3::new(
            axis(self.right, self.left),
            axis(self.up, self.down),
            axis(self.forward, self.back),
        )
    }
}

/// Camera motion collected since the previous frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputFrame {
    /// Local axes: x right, y up, z forward
    pub movement: Vec3,
    /// Look/orbit drag in pixels
    pub look: Vec2,
    /// Positive zooms in
    pub zoom: f32,
    /// Pan drag in pixels
    pub pan: Vec2,
}

/// The subset of window events the camera cares about
#[derive(Debug, Clone, Copy, PartialEq)]
enum InputEvent {
    Key { code: KeyCode, pressed: bool },
    Button { button: MouseButton, pressed: bool },
    Cursor(Vec2),
    CursorLeft,
    /// Wheel movement in lines
    Wheel(f32),
    Touch { id: u64, phase: TouchPhase, position: Vec2 },
    FocusLost,
}

impl InputEvent {
    fn from_window_event(event: &WindowEvent) -> Option<Self> {
        let event = match event {
            WindowEvent::KeyboardInput { event, .. } => match event.physical_key {
                PhysicalKey::Code(code) => InputEvent::Key {
                    code,
                    pressed: event.state == ElementState::Pressed,
                },
                PhysicalKey::Unidentified(_) => return None,
            },
            WindowEvent::MouseInput { state, button, .. } => InputEvent::Button {
                button: *button,
                pressed: *state == ElementState::Pressed,
            },
            WindowEvent::CursorMoved { position, .. } => {
                InputEvent::Cursor(Vec2::new(position.x as f32, position.y as f32))
            }
            WindowEvent::CursorLeft { .. } => InputEvent::CursorLeft,
            WindowEvent::MouseWheel { delta, .. } => InputEvent::Wheel(match delta {
                MouseScrollDelta::LineDelta(_, y) => *y,
                MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_LINE,
            }),
            WindowEvent::Touch(touch) => InputEvent::Touch {
                id: touch.id,
                phase: touch.phase,
                position: Vec2::new(touch.location.x as f32, touch.location.y as f32),
            },
            WindowEvent::Focused(false) => InputEvent::FocusLost,
            _ => return None,
        };
        Some(event)
    }
}

#[derive(Debug, Default)]
struct MouseButtons {
    left: bool,
    right: bool,
    middle: bool,
}

#[derive(Debug, Default)]
pub struct InputState {
    bindings: KeyBindings,
    held: HashSet<KeyCode>,
    buttons: MouseButtons,
    cursor: Option<Vec2>,
    touches: HashMap<u64, Vec2>,
    look: Vec2,
    pan: Vec2,
    zoom: f32,
    actions: Vec<Action>,
}

impl InputState {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            ..Self::default()
        }
    }

    /// Feed a window event. `gui_consumed` is true when the GUI already
    /// handled it.
    pub fn handle_window_event(&mut self, event: &WindowEvent, gui_consumed: bool) {
        if let Some(event) = InputEvent::from_window_event(event) {
            self.handle(event, gui_consumed);
        }
    }

    /// Presses the GUI consumed never reach the camera, but releases are
    /// always honoured so keys and buttons cannot get stuck. The cursor is
    /// still tracked so the next drag starts from the right place.
    fn handle(&mut self, event: InputEvent, gui_consumed: bool) {
        match event {
            InputEvent::Key { code, pressed } => {
                if !(gui_consumed && pressed) {
                    self.key(code, pressed);
                }
            }
            InputEvent::Button { button, pressed } => {
                if !(gui_consumed && pressed) {
                    self.mouse_button(button, pressed);
                }
            }
            InputEvent::Cursor(position) => {
                if gui_consumed {
                    self.cursor = Some(position);
                } else {
                    self.cursor_moved(position);
                }
            }
            InputEvent::CursorLeft => self.cursor = None,
            InputEvent::Wheel(lines) => {
                if !gui_consumed {
                    self.scroll(lines);
                }
            }
            InputEvent::Touch { id, phase, position } => {
                if !(gui_consumed && phase == TouchPhase::Started) {
                    self.touch(id, phase, position);
                }
            }
            InputEvent::FocusLost => self.release_all(),
        }
    }

    fn key(&mut self, code: KeyCode, pressed: bool) {
        if pressed {
            // Auto-repeat arrives as repeated presses; only the first triggers
            if self.held.insert(code) {
                if let Some(action) = self.bindings.action_for(code) {
                    log::debug!("Action triggered: {action:?}");
                    self.actions.push(action);
                }
            }
        } else {
            self.held.remove(&code);
        }
    }

    fn mouse_button(&mut self, button: MouseButton, pressed: bool) {
        match button {
            MouseButton::Left => self.buttons.left = pressed,
            MouseButton::Right => self.buttons.right = pressed,
            MouseButton::Middle => self.buttons.middle = pressed,
            _ => {}
        }
    }

    /// Left drag looks/orbits, right or middle drag pans.
    fn cursor_moved(&mut self, position: Vec2) {
        if let Some(previous) = self.cursor {
            let delta = position - previous;
            if self.buttons.left {
                self.look += delta;
            } else if self.buttons.right || self.buttons.middle {
                self.pan += delta;
            }
        }
        self.cursor = Some(position);
    }

    fn scroll(&mut self, lines: f32) {
        self.zoom += lines;
    }

    /// One finger drags the view; two fingers pinch to zoom and move
    /// together to pan.
    fn touch(&mut self, id: u64, phase: TouchPhase, position: Vec2) {
        match phase {
            TouchPhase::Started => {
                self.touches.insert(id, position);
            }
            TouchPhase::Moved => {
                let Some(previous) = self.touches.get(&id).copied() else {
                    return;
                };
                match self.touches.len() {
                    1 => self.look += position - previous,
                    2 => {
                        if let Some(other) = self
                            .touches
                            .iter()
                            .find(|(other_id, _)| **other_id != id)
                            .map(|(_, p)| *p)
                        {
                            let old_centre = (previous + other) * 0.5;
                            let new_centre = (position + other) * 0.5;
                            self.pan += new_centre - old_centre;
                            let spread = position.distance(other) - previous.distance(other);
                            self.zoom += spread * PINCH_SCALE;
                        }
                    }
                    _ => {}
                }
                self.touches.insert(id, position);
            }
            TouchPhase::Ended | TouchPhase::Cancelled => {
                self.touches.remove(&id);
            }
        }
    }

    /// Drop all held state, e.g. when the window loses focus.
    fn release_all(&mut self) {
        self.held.clear();
        self.buttons = MouseButtons::default();
        self.touches.clear();
    }

    pub fn drain_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }

    /// Collect this frame's motion and reset the per-frame accumulators.
    pub fn take_frame(&mut self) -> InputFrame {
        InputFrame {
            movement: self.bindings.movement(&self.held),
            look: std::mem::take(&mut self.look),
            zoom: std::mem::take(&mut self.zoom),
            pan: std::mem::take(&mut self.pan),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn input() -> InputState {
        InputState::new(KeyBindings::default())
    }

    #[test]
    fn wasd_maps_to_local_axes() {
        let mut input = input();
        input.key(KeyCode::KeyW, true);
        input.key(KeyCode::KeyD, true);
        assert_eq!(input.take_frame().movement, Vec3::new(1.0, 0.0, 1.0));

        input.key(KeyCode::KeyS, true);
        assert_eq!(input.take_frame().movement, Vec3::new(1.0, 0.0, 0.0));

        input.key(KeyCode::KeyW, false);
        input.key(KeyCode::KeyS, false);
        input.key(KeyCode::KeyD, false);
        assert_eq!(input.take_frame().movement, Vec3::ZERO);
    }

    #[test]
    fn actions_fire_once_per_press() {
        let mut input = input();
        input.key(KeyCode::KeyK, true);
        input.key(KeyCode::KeyK, true);
        input.key(KeyCode::KeyK, false);
        input.key(KeyCode::KeyC, true);
        assert_eq!(input.drain_actions(), vec![Action::AddKeyframe, Action::ToggleMode]);
        assert!(input.drain_actions().is_empty());
    }

    #[test]
    fn left_drag_looks_right_drag_pans() {
        let mut input = input();
        input.cursor_moved(Vec2::new(10.0, 10.0));
        input.cursor_moved(Vec2::new(20.0, 10.0));
        assert_eq!(input.take_frame().look, Vec2::ZERO);

        input.mouse_button(MouseButton::Left, true);
        input.cursor_moved(Vec2::new(25.0, 14.0));
        input.mouse_button(MouseButton::Left, false);
        input.mouse_button(MouseButton::Right, true);
        input.cursor_moved(Vec2::new(20.0, 14.0));

        let frame = input.take_frame();
        assert_eq!(frame.look, Vec2::new(5.0, 4.0));
        assert_eq!(frame.pan, Vec2::new(-5.0, 0.0));
        assert_eq!(input.take_frame().look, Vec2::ZERO);
    }

    #[test]
    fn single_touch_drags_view() {
        let mut input = input();
        input.touch(1, TouchPhase::Started, Vec2::new(100.0, 100.0));
        input.touch(1, TouchPhase::Moved, Vec2::new(110.0, 95.0));
        input.touch(1, TouchPhase::Ended, Vec2::new(110.0, 95.0));
        assert_eq!(input.take_frame().look, Vec2::new(10.0, -5.0));
    }

    #[test]
    fn pinch_zooms_and_two_finger_drag_pans() {
        let mut input = input();
        input.touch(1, TouchPhase::Started, Vec2::new(100.0, 100.0));
        input.touch(2, TouchPhase::Started, Vec2::new(200.0, 100.0));
        // spread the fingers apart by 50 px
        input.touch(2, TouchPhase::Moved, Vec2::new(250.0, 100.0));
        let frame = input.take_frame();
        assert_abs_diff_eq!(frame.zoom, 50.0 * PINCH_SCALE, epsilon = 1e-5);
        assert_eq!(frame.look, Vec2::ZERO);

        // both fingers move down by 20 px
        input.touch(1, TouchPhase::Moved, Vec2::new(100.0, 120.0));
        input.touch(2, TouchPhase::Moved, Vec2::new(250.0, 120.0));
        let frame = input.take_frame();
        assert_abs_diff_eq!(frame.pan.y, 20.0, epsilon = 1e-4);
        assert_abs_diff_eq!(frame.zoom, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn release_all_clears_held_keys() {
        let mut input = input();
        input.key(KeyCode::KeyW, true);
        input.release_all();
        assert_eq!(input.take_frame().movement, Vec3::ZERO);
    }

    #[test]
    fn scroll_accumulates_until_taken() {
        let mut input = input();
        input.scroll(1.0);
        input.scroll(0.5);
        assert_abs_diff_eq!(input.take_frame().zoom, 1.5);
        assert_abs_diff_eq!(input.take_frame().zoom, 0.0);
    }

    #[test]
    fn gui_consumed_press_is_ignored_but_release_applies() {
        let mut input = input();
        input.handle(
            InputEvent::Key {
                code: KeyCode::KeyW,
                pressed: true,
            },
            true,
        );
        assert_eq!(input.take_frame().movement, Vec3::ZERO);

        input.handle(
            InputEvent::Key {
                code: KeyCode::KeyD,
                pressed: true,
            },
            false,
        );
        input.handle(
            InputEvent::Key {
                code: KeyCode::KeyD,
                pressed: false,
            },
            true,
        );
        assert_eq!(input.take_frame().movement, Vec3::ZERO);
        assert!(input.drain_actions().is_empty());
    }

    #[test]
    fn gui_consumed_click_does_not_start_a_drag() {
        let mut input = input();
        input.handle(InputEvent::Cursor(Vec2::new(10.0, 10.0)), false);
        input.handle(
            InputEvent::Button {
                button: MouseButton::Left,
                pressed: true,
            },
            true,
        );
        input.handle(InputEvent::Cursor(Vec2::new(40.0, 30.0)), false);
        assert_eq!(input.take_frame().look, Vec2::ZERO);
    }

    #[test]
    fn cursor_is_tracked_while_over_the_gui() {
        let mut input = input();
        input.handle(InputEvent::Cursor(Vec2::new(10.0, 10.0)), false);
        input.handle(
            InputEvent::Button {
                button: MouseButton::Left,
                pressed: true,
            },
            false,
        );
        input.handle(InputEvent::Cursor(Vec2::new(50.0, 10.0)), true);
        input.handle(InputEvent::Cursor(Vec2::new(55.0, 12.0)), false);
        assert_eq!(input.take_frame().look, Vec2::new(5.0, 2.0));
    }

    #[test]
    fn gui_consumed_wheel_and_touch_start_are_filtered() {
        let mut input = input();
        input.handle(InputEvent::Wheel(2.0), true);
        input.handle(
            InputEvent::Touch {
                id: 7,
                phase: TouchPhase::Started,
                position: Vec2::ZERO,
            },
            true,
        );
        input.handle(
            InputEvent::Touch {
                id: 7,
                phase: TouchPhase::Moved,
                position: Vec2::new(30.0, 0.0),
            },
            false,
        );
        let frame = input.take_frame();
        assert_abs_diff_eq!(frame.zoom, 0.0);
        assert_eq!(frame.look, Vec2::ZERO);
    }

    #[test]
    fn focus_loss_releases_buttons() {
        let mut input = input();
        input.handle(InputEvent::Cursor(Vec2::ZERO), false);
        input.handle(
            InputEvent::Button {
                button: MouseButton::Left,
                pressed: true,
            },
            false,
        );
        input.handle(InputEvent::FocusLost, false);
        input.handle(InputEvent::Cursor(Vec2::new(20.0, 0.0)), false);
        assert_eq!(input.take_frame().look, Vec2::ZERO);
    }
}
