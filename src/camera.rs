// Interactive camera: first-person and orbit controls

use glam::{Mat4, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::CameraConfig;
use crate::input::InputFrame;
use crate::math::{self, Basis};

const MIN_ORBIT_DISTANCE: f32 = 0.05;
const MAX_ORBIT_DISTANCE: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraMode {
    #[default]
    FirstPerson,
    Orbit,
}

/// A stored camera placement: what keyframes and scene cameras hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub orientation: Quat,
    /// Vertical field of view in radians
    pub fov_y: f32,
}

impl CameraPose {
    pub fn look_at(eye: Vec3, target: Vec3, fov_degrees: f32) -> Self {
        Self {
            position: eye,
            orientation: Basis::look_at(eye, target, Vec3::Y).to_quat(),
            fov_y: fov_degrees.to_radians(),
        }
    }

    pub fn basis(&self) -> Basis {
        Basis::from_quat(self.orientation)
    }

    /// Interpolate towards `other`: position and fov linearly,
    /// orientation along the shortest great arc.
    pub fn lerp(&self, other: &CameraPose, t: f32) -> CameraPose {
        CameraPose {
            position: self.position.lerp(other.position, t),
            orientation: math::slerp_shortest(self.orientation, other.orientation, t),
            fov_y: self.fov_y + (other.fov_y - self.fov_y) * t,
        }
    }
}

pub struct Camera {
    pub position: Vec3,
    basis: Basis,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    mode: CameraMode,
    /// Orbit pivot; only meaningful in orbit mode
    pub target: Vec3,
    pub distance: f32,
    pitch_limit: f32,
    home: CameraPose,
}

impl Camera {
    pub fn new(home: CameraPose, config: &CameraConfig) -> Self {
        let mut camera = Self {
            position: home.position,
            basis: home.basis(),
            fov_y: home.fov_y,
            near: config.near,
            far: config.far,
            mode: CameraMode::FirstPerson,
            target: Vec3::ZERO,
            distance: config.orbit_distance,
            pitch_limit: config.pitch_limit_degrees.to_radians(),
            home,
        };
        camera.set_mode(config.mode);
        camera
    }

    pub fn basis(&self) -> &Basis {
        &self.basis
    }

    pub fn forward(&self) -> Vec3 {
        self.basis.forward()
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    /// Switch control scheme. Entering orbit mode places the pivot
    /// `distance` ahead of the eye so the view does not jump.
    pub fn set_mode(&mut self, mode: CameraMode) {
        if mode == CameraMode::Orbit && self.mode != CameraMode::Orbit {
            self.target = self.position + self.forward() * self.distance;
        }
        self.mode = mode;
    }

    pub fn toggle_mode(&mut self) {
        let next = match self.mode {
            CameraMode::FirstPerson => CameraMode::Orbit,
            CameraMode::Orbit => CameraMode::FirstPerson,
        };
        self.set_mode(next);
    }

    pub fn view_matrix(&self) -> Mat4 {
        math::view_matrix(self.position, &self.basis)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect.max(1e-3), self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.position,
            orientation: self.basis.to_quat(),
            fov_y: self.fov_y,
        }
    }

    pub fn set_pose(&mut self, pose: &CameraPose) {
        self.position = pose.position;
        self.basis = pose.basis();
        self.fov_y = pose.fov_y;
        if self.mode == CameraMode::Orbit {
            self.target = self.position + self.forward() * self.distance;
        }
    }

    pub fn reset(&mut self) {
        let home = self.home;
        self.set_pose(&home);
    }

    /// Translate along the camera's right, up and forward axes.
    pub fn move_local(&mut self, direction: Vec3, dt: f32, speed: f32) {
        if direction == Vec3::ZERO {
            return;
        }
        let offset = (self.basis.right * direction.x
            + self.basis.up * direction.y
            + self.forward() * direction.z)
            * speed
            * dt;
        self.position += offset;
        if self.mode == CameraMode::Orbit {
            self.target += offset;
        }
    }

    /// Mouse-look: yaw about world up, pitch about the local right axis.
    pub fn look(&mut self, dx: f32, dy: f32, sensitivity: f32) {
        self.rotate_in_place(-dx * sensitivity, -dy * sensitivity);
    }

    /// Rotate around the orbit pivot, keeping the distance fixed.
    pub fn orbit(&mut self, dx: f32, dy: f32, sensitivity: f32) {
        self.rotate_in_place(-dx * sensitivity, -dy * sensitivity);
        self.position = self.target - self.forward() * self.distance;
    }

    /// Positive `amount` moves closer. Orbit mode scales the distance,
    /// first-person mode dollies along the view direction.
    pub fn zoom(&mut self, amount: f32, zoom_speed: f32) {
        match self.mode {
            CameraMode::Orbit => {
                self.distance = (self.distance * (-amount * zoom_speed).exp())
                    .clamp(MIN_ORBIT_DISTANCE, MAX_ORBIT_DISTANCE);
                self.position = self.target - self.forward() * self.distance;
            }
            CameraMode::FirstPerson => {
                self.position += self.forward() * amount * zoom_speed * 10.0;
            }
        }
    }

    /// Slide eye and pivot together in the view plane. Screen-space deltas:
    /// dragging right moves the scene right.
    pub fn pan(&mut self, dx: f32, dy: f32, pan_speed: f32) {
        let scale = match self.mode {
            CameraMode::Orbit => self.distance,
            CameraMode::FirstPerson => 10.0,
        };
        let offset = (-self.basis.right * dx + self.basis.up * dy) * pan_speed * scale;
        self.position += offset;
        self.target += offset;
    }

    pub fn apply(&mut self, frame: &InputFrame, dt: f32, config: &CameraConfig) {
        self.move_local(frame.movement, dt, config.move_speed);
        if frame.look != Vec2::ZERO {
            let dy = if config.invert_y {
                -frame.look.y
            } else {
                frame.look.y
            };
            match self.mode {
                CameraMode::FirstPerson => self.look(frame.look.x, dy, config.look_sensitivity),
                CameraMode::Orbit => self.orbit(frame.look.x, dy, config.look_sensitivity),
            }
        }
        if frame.zoom != 0.0 {
            self.zoom(frame.zoom, config.zoom_speed);
        }
        if frame.pan != Vec2::ZERO {
            self.pan(frame.pan.x, frame.pan.y, config.pan_speed);
        }
    }

    /// Elevation of the view direction above the horizon, in radians.
    pub fn elevation(&self) -> f32 {
        self.forward().y.clamp(-1.0, 1.0).asin()
    }

    fn rotate_in_place(&mut self, yaw: f32, pitch: f32) {
        if yaw != 0.0 {
            self.basis.rotate(Quat::from_axis_angle(Vec3::Y, yaw));
        }
        if pitch != 0.0 {
            let applied = self.allowed_pitch(pitch);
            if applied != 0.0 {
                // Horizontal axis: positive angles raise the view whatever the roll
                let axis = self
                    .forward()
                    .cross(Vec3::Y)
                    .try_normalize()
                    .unwrap_or(self.basis.right);
                self.basis.rotate(Quat::from_axis_angle(axis, applied));
            }
        }
    }

    /// The part of a pitch step that stays within the limit. Motion back
    /// towards the horizon is never restricted.
    fn allowed_pitch(&self, pitch: f32) -> f32 {
        let current = self.elevation();
        if pitch > 0.0 {
            pitch.min((self.pitch_limit - current).max(0.0))
        } else {
            pitch.max((-self.pitch_limit - current).min(0.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn camera(mode: CameraMode) -> Camera {
        let config = CameraConfig {
            mode,
            ..CameraConfig::default()
        };
        Camera::new(
            CameraPose::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 60.0),
            &config,
        )
    }

    #[test]
    fn pose_round_trip() {
        let mut cam = camera(CameraMode::FirstPerson);
        cam.look(120.0, -40.0, 0.003);
        let pose = cam.pose();
        let mut other = camera(CameraMode::FirstPerson);
        other.set_pose(&pose);
        assert!(other.view_matrix().abs_diff_eq(cam.view_matrix(), 1e-4));
    }

    #[test]
    fn forward_movement_follows_view() {
        let mut cam = camera(CameraMode::FirstPerson);
        cam.move_local(Vec3::new(0.0, 0.0, 1.0), 0.5, 4.0);
        assert_abs_diff_eq!(cam.position.z, 3.0, epsilon = 1e-4);
        cam.move_local(Vec3::new(1.0, 0.0, 0.0), 1.0, 1.0);
        assert_abs_diff_eq!(cam.position.x, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn vertical_movement_follows_camera_up() {
        let mut cam = camera(CameraMode::FirstPerson);
        cam.look(0.0, -100.0, 0.005);
        let up = cam.basis().up;
        let start = cam.position;
        cam.move_local(Vec3::new(0.0, 1.0, 0.0), 1.0, 2.0);
        assert!((cam.position - start).abs_diff_eq(up * 2.0, 1e-4));
    }

    #[test]
    fn mouse_right_turns_right() {
        let mut cam = camera(CameraMode::FirstPerson);
        cam.look(100.0, 0.0, 0.005);
        assert!(cam.forward().x > 0.0);
        assert!(cam.basis().is_orthonormal(1e-4));
    }

    #[test]
    fn pitch_is_clamped_at_limit() {
        let mut cam = camera(CameraMode::FirstPerson);
        for _ in 0..100 {
            cam.look(3.0, -50.0, 0.01);
        }
        assert_abs_diff_eq!(cam.elevation(), 89f32.to_radians(), epsilon = 1e-3);
        assert!(cam.basis().up.y > 0.0);
        assert!(cam.basis().is_orthonormal(1e-4));
    }

    #[test]
    fn rolled_camera_pitch_stays_clamped() {
        let mut cam = camera(CameraMode::FirstPerson);
        cam.set_pose(&CameraPose {
            position: Vec3::ZERO,
            orientation: Quat::from_rotation_z(std::f32::consts::PI),
            fov_y: 1.0,
        });
        assert!(cam.basis().up.y < 0.0);
        cam.look(0.0, -10.0, 0.01);
        assert!(cam.elevation() > 0.0);
        for _ in 0..400 {
            cam.look(0.0, -10.0, 0.01);
        }
        assert_abs_diff_eq!(cam.elevation(), 89f32.to_radians(), epsilon = 1e-3);
        // still facing the original side of the pole
        assert!(cam.forward().z < 0.0);
        assert!(cam.basis().is_orthonormal(1e-4));
    }

    #[test]
    fn pitch_beyond_limit_only_moves_back_towards_horizon() {
        let config = CameraConfig::default();
        let mut cam = Camera::new(
            CameraPose::look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, 60.0),
            &config,
        );
        let before = cam.elevation();
        assert!(before < -89f32.to_radians());
        cam.look(0.0, 1.0, 0.003);
        assert_abs_diff_eq!(cam.elevation(), before, epsilon = 1e-6);
        cam.look(0.0, -1.0, 0.003);
        assert!(cam.elevation() > before);
        assert!(cam.basis().is_orthonormal(1e-4));
    }

    #[test]
    fn orbit_keeps_distance_to_target() {
        let mut cam = camera(CameraMode::FirstPerson);
        cam.distance = 5.0;
        cam.set_mode(CameraMode::Orbit);
        assert!(cam.target.abs_diff_eq(Vec3::ZERO, 1e-4));
        for _ in 0..50 {
            cam.orbit(7.0, 3.0, 0.01);
        }
        assert_abs_diff_eq!(cam.position.distance(cam.target), 5.0, epsilon = 1e-3);
        let to_target = (cam.target - cam.position).normalize();
        assert!(to_target.abs_diff_eq(cam.forward(), 1e-4));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut cam = camera(CameraMode::Orbit);
        for _ in 0..1000 {
            cam.zoom(10.0, 0.5);
        }
        assert_abs_diff_eq!(cam.distance, MIN_ORBIT_DISTANCE, epsilon = 1e-5);
        assert_abs_diff_eq!(cam.position.distance(cam.target), MIN_ORBIT_DISTANCE, epsilon = 1e-4);
    }

    #[test]
    fn pan_moves_eye_and_target_together() {
        let mut cam = camera(CameraMode::Orbit);
        let before = cam.target - cam.position;
        cam.pan(30.0, -10.0, 0.01);
        assert!((cam.target - cam.position).abs_diff_eq(before, 1e-4));
        assert!(cam.target.x < 0.0);
    }

    #[test]
    fn reset_returns_home() {
        let mut cam = camera(CameraMode::FirstPerson);
        let home = cam.pose();
        cam.move_local(Vec3::ONE, 1.0, 3.0);
        cam.look(40.0, 20.0, 0.01);
        cam.reset();
        assert!(cam.position.abs_diff_eq(home.position, 1e-5));
    }

    #[test]
    fn pose_lerp_endpoints() {
        let a = CameraPose::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 50.0);
        let b = CameraPose::look_at(Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO, 70.0);
        let start = a.lerp(&b, 0.0);
        let end = a.lerp(&b, 1.0);
        assert!(start.position.abs_diff_eq(a.position, 1e-5));
        assert!(end.position.abs_diff_eq(b.position, 1e-5));
        assert_abs_diff_eq!(a.lerp(&b, 0.5).fov_y, 60f32.to_radians(), epsilon = 1e-5);
        let mid = a.lerp(&b, 0.5).basis();
        assert!(mid.is_orthonormal(1e-4));
        // halfway between looking -Z and -X is looking diagonally
        let expected = Vec3::new(-1.0, 0.0, -1.0).normalize();
        assert!(mid.forward().abs_diff_eq(expected, 1e-3));
    }

    #[test]
    fn apply_dispatches_on_mode() {
        let config = CameraConfig::default();
        let mut cam = camera(CameraMode::Orbit);
        let frame = InputFrame {
            zoom: 1.0,
            ..InputFrame::default()
        };
        let before = cam.distance;
        cam.apply(&frame, 0.016, &config);
        assert!(cam.distance < before);
    }

    #[test]
    fn invert_y_flips_pitch() {
        let drag_up = InputFrame {
            look: Vec2::new(0.0, -50.0),
            ..InputFrame::default()
        };
        let mut normal = camera(CameraMode::FirstPerson);
        normal.apply(&drag_up, 0.016, &CameraConfig::default());
        assert!(normal.elevation() > 0.0);

        let inverted_config = CameraConfig {
            invert_y: true,
            ..CameraConfig::default()
        };
        let mut inverted = camera(CameraMode::FirstPerson);
        inverted.apply(&drag_up, 0.016, &inverted_config);
        assert!(inverted.elevation() < 0.0);
    }
}
