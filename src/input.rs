use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta};

use crate::camera::{OrbitControls, PerspectiveCamera};

/// Pixels of browser-style wheel delta per zoom step.
const PIXELS_PER_ZOOM_STEP: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drag {
    Rotate,
    Pan,
}

/// Turns raw pointer events into orbit control input.
///
/// Left drag rotates, right or middle drag pans and the wheel zooms. Positions
/// are logical pixels.
#[derive(Debug, Default)]
pub struct PointerState {
    position: Option<Vec2>,
    drag: Option<Drag>,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn button(&mut self, button: MouseButton, state: ElementState) {
        let drag = match button {
            MouseButton::Left => Drag::Rotate,
            MouseButton::Right | MouseButton::Middle => Drag::Pan,
            _ => return,
        };

        match state {
            ElementState::Pressed if self.drag.is_none() => self.drag = Some(drag),
            ElementState::Released if self.drag == Some(drag) => self.drag = None,
            _ => {}
        }
    }

    pub fn moved(
        &mut self,
        position: Vec2,
        viewport_height: f32,
        controls: &mut OrbitControls,
        camera: &PerspectiveCamera,
    ) {
        let previous = self.position.replace(position);

        let (Some(drag), Some(previous)) = (self.drag, previous) else {
            return;
        };

        let delta = position - previous;
        match drag {
            Drag::Rotate => controls.rotate_by_pixels(delta, viewport_height),
            Drag::Pan => controls.pan_by_pixels(delta, viewport_height, camera),
        }
    }

    /// Pointer left the window; the next move must not produce a jump.
    pub fn left(&mut self) {
        self.position = None;
    }

    pub fn wheel(&mut self, delta: MouseScrollDelta, controls: &mut OrbitControls) {
        let steps = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_ZOOM_STEP,
        };

        if steps != 0.0 {
            controls.dolly(steps);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;

    fn setup() -> (PerspectiveCamera, OrbitControls) {
        let config = CameraConfig::default();
        (
            PerspectiveCamera::from_config(&config, 4.0 / 3.0),
            OrbitControls::from_config(&config),
        )
    }

    #[test]
    fn moving_without_a_button_does_nothing() {
        let (camera, mut controls) = setup();
        let mut pointer = PointerState::new();

        pointer.moved(Vec2::new(10.0, 10.0), 600.0, &mut controls, &camera);
        pointer.moved(Vec2::new(50.0, 10.0), 600.0, &mut controls, &camera);

        assert!(!controls.has_pending_motion());
    }

    #[test]
    fn left_drag_rotates_the_camera() {
        let (mut camera, mut controls) = setup();
        let mut pointer = PointerState::new();
        let before = camera.position;

        pointer.moved(Vec2::new(10.0, 10.0), 600.0, &mut controls, &camera);
        pointer.button(MouseButton::Left, ElementState::Pressed);
        pointer.moved(Vec2::new(60.0, 10.0), 600.0, &mut controls, &camera);

        assert!(controls.update(&mut camera));
        assert_ne!(camera.position, before);
        assert!((camera.position.length() - before.length()).abs() < 1e-4);
    }

    #[test]
    fn first_move_after_leaving_does_not_jump() {
        let (camera, mut controls) = setup();
        let mut pointer = PointerState::new();

        pointer.button(MouseButton::Left, ElementState::Pressed);
        pointer.left();
        pointer.moved(Vec2::new(300.0, 300.0), 600.0, &mut controls, &camera);

        assert!(!controls.has_pending_motion());
    }

    #[test]
    fn releasing_another_button_keeps_the_drag() {
        let (camera, mut controls) = setup();
        let mut pointer = PointerState::new();

        pointer.moved(Vec2::ZERO, 600.0, &mut controls, &camera);
        pointer.button(MouseButton::Right, ElementState::Pressed);
        pointer.button(MouseButton::Left, ElementState::Released);
        pointer.moved(Vec2::new(20.0, 0.0), 600.0, &mut controls, &camera);

        assert!(controls.has_pending_motion());
    }

    #[test]
    fn scrolling_up_zooms_in() {
        let (mut camera, mut controls) = setup();
        let mut pointer = PointerState::new();
        let distance = camera.position.distance(controls.target);

        pointer.wheel(MouseScrollDelta::LineDelta(0.0, 1.0), &mut controls);
        controls.update(&mut camera);

        assert!(camera.position.distance(controls.target) < distance);
    }
}
