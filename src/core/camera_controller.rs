//! Orbit camera controller

use crate::core::camera::Camera;
use crate::core::input::InputState;
use crate::core::types::Vec3;
use winit::event::MouseButton;

/// Orbit-style camera controller: drag to rotate about a focus point,
/// scroll to zoom
pub struct OrbitCameraController {
    /// Point the camera orbits around
    pub focus: Vec3,
    /// Distance from focus to camera
    pub distance: f32,
    /// Rotation sensitivity (radians per pixel, scaled by 0.001)
    pub sensitivity: f32,
    /// Zoom factor per scroll line
    pub zoom_speed: f32,
    /// Minimum allowed distance
    pub min_distance: f32,
    /// Current yaw (rotation around Y axis) in radians
    yaw: f32,
    /// Current pitch (rotation around X axis) in radians
    pitch: f32,
}

impl OrbitCameraController {
    /// Create new controller orbiting `focus` at `distance`
    pub fn new(focus: Vec3, distance: f32) -> Self {
        Self {
            focus,
            distance: distance.max(0.01),
            sensitivity: 4.0,
            zoom_speed: 0.1,
            min_distance: 0.01,
            yaw: 0.0,
            pitch: -0.4,
        }
    }

    /// Update camera based on input
    pub fn update(&mut self, camera: &mut Camera, input: &InputState, _dt: f32) {
        if input.is_mouse_button_pressed(MouseButton::Left) {
            let (dx, dy) = input.mouse_delta();
            self.yaw -= dx * self.sensitivity * 0.001;
            self.pitch -= dy * self.sensitivity * 0.001;

            // Clamp pitch to prevent gimbal lock
            self.pitch = self.pitch.clamp(-1.5, 1.5);
        }

        let scroll = input.scroll_delta();
        if scroll != 0.0 {
            self.distance *= 1.0 - scroll * self.zoom_speed;
            self.distance = self.distance.max(self.min_distance);
        }

        camera.set_rotation_euler(self.yaw, self.pitch);
        camera.position = self.focus + camera.rotation * Vec3::Z * self.distance;
    }

    /// Set orientation from angles (in radians)
    pub fn set_orientation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = pitch.clamp(-1.5, 1.5);
    }

    /// Get current yaw
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Get current pitch
    pub fn pitch(&self) -> f32 {
        self.pitch
    }
}

impl Default for OrbitCameraController {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 3.0)
    }
}
