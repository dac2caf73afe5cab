// Math utilities: transforms and camera orientation

use glam::{EulerRot, Mat3, Mat4, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Represents a 3D transformation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// Create a new transform
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Create an identity transform
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    /// Generate transformation matrix
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Rotation as XYZ euler angles in degrees, for editing
    pub fn euler_degrees(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
    }

    pub fn set_euler_degrees(&mut self, degrees: Vec3) {
        self.rotation = Quat::from_euler(
            EulerRot::XYZ,
            degrees.x.to_radians(),
            degrees.y.to_radians(),
            degrees.z.to_radians(),
        );
    }
}

/// Camera orientation kept as an orthonormal right/up pair.
///
/// The camera looks down its local -Z axis, so `forward = up × right`.
/// Every mutation goes through [`Basis::orthonormalize`] so accumulated
/// floating point drift never skews the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basis {
    pub right: Vec3,
    pub up: Vec3,
}

impl Default for Basis {
    fn default() -> Self {
        Self {
            right: Vec3::X,
            up: Vec3::Y,
        }
    }
}

impl Basis {
    /// Build a basis from two vectors, orthonormalizing them.
    pub fn new(right: Vec3, up: Vec3) -> Self {
        let mut basis = Self { right, up };
        basis.orthonormalize();
        basis
    }

    /// Basis for a camera at `eye` looking at `target`.
    pub fn look_at(eye: Vec3, target: Vec3, world_up: Vec3) -> Self {
        let forward = (target - eye).try_normalize().unwrap_or(Vec3::NEG_Z);
        let right = forward
            .cross(world_up)
            .try_normalize()
            .unwrap_or_else(|| forward.any_orthonormal_vector());
        let up = right.cross(forward);
        Self::new(right, up)
    }

    pub fn forward(&self) -> Vec3 {
        self.up.cross(self.right)
    }

    /// Re-orthonormalize: right is normalized and kept, up loses its
    /// right component. Degenerate input falls back to a valid basis.
    pub fn orthonormalize(&mut self) {
        let right = self.right.try_normalize().unwrap_or(Vec3::X);
        let up = (self.up - right * self.up.dot(right))
            .try_normalize()
            .unwrap_or_else(|| {
                // up was zero or parallel to right; prefer world Y if possible
                (Vec3::Y - right * right.y)
                    .try_normalize()
                    .unwrap_or_else(|| right.any_orthonormal_vector())
            });
        self.right = right;
        self.up = up;
    }

    /// Rotation taking the canonical axes (X, Y, Z) onto (right, up, -forward).
    pub fn to_quat(&self) -> Quat {
        let back = self.right.cross(self.up);
        Quat::from_mat3(&Mat3::from_cols(self.right, self.up, back)).normalize()
    }

    pub fn from_quat(rotation: Quat) -> Self {
        let rotation = rotation.normalize();
        Self::new(rotation * Vec3::X, rotation * Vec3::Y)
    }

    /// Apply a world-space rotation to the basis.
    pub fn rotate(&mut self, rotation: Quat) {
        self.right = rotation * self.right;
        self.up = rotation * self.up;
        self.orthonormalize();
        debug_assert!(self.is_orthonormal(1e-3));
    }

    pub fn is_orthonormal(&self, epsilon: f32) -> bool {
        (self.right.length() - 1.0).abs() < epsilon
            && (self.up.length() - 1.0).abs() < epsilon
            && self.right.dot(self.up).abs() < epsilon
    }
}

/// World-to-camera matrix for a camera at `position` with orientation `basis`.
///
/// This is the inverse of the camera's rigid world transform, written out
/// directly from the basis rows.
pub fn view_matrix(position: Vec3, basis: &Basis) -> Mat4 {
    let r = basis.right;
    let u = basis.up;
    let b = r.cross(u);
    Mat4::from_cols(
        Vec4::new(r.x, u.x, b.x, 0.0),
        Vec4::new(r.y, u.y, b.y, 0.0),
        Vec4::new(r.z, u.z, b.z, 0.0),
        Vec4::new(-r.dot(position), -u.dot(position), -b.dot(position), 1.0),
    )
}

/// Shortest-arc spherical interpolation between two orientations.
pub fn slerp_shortest(from: Quat, to: Quat, t: f32) -> Quat {
    let to = if from.dot(to) < 0.0 { -to } else { to };
    from.slerp(to, t).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-4);
        assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-4);
        assert_abs_diff_eq!(a.z, b.z, epsilon = 1e-4);
    }

    #[test]
    fn default_basis_looks_down_negative_z() {
        let basis = Basis::default();
        assert_vec_eq(basis.forward(), Vec3::NEG_Z);
        assert_eq!(basis.to_quat(), Quat::IDENTITY);
    }

    #[test]
    fn orthonormalize_removes_skew() {
        let mut basis = Basis {
            right: Vec3::new(2.0, 0.0, 0.0),
            up: Vec3::new(0.5, 3.0, 0.1),
        };
        basis.orthonormalize();
        assert!(basis.is_orthonormal(1e-5));
        assert_vec_eq(basis.right, Vec3::X);
    }

    #[test]
    fn orthonormalize_handles_degenerate_up() {
        let mut basis = Basis {
            right: Vec3::X,
            up: Vec3::X * 4.0,
        };
        basis.orthonormalize();
        assert!(basis.is_orthonormal(1e-5));
        assert_vec_eq(basis.up, Vec3::Y);

        let mut zero = Basis {
            right: Vec3::ZERO,
            up: Vec3::ZERO,
        };
        zero.orthonormalize();
        assert!(zero.is_orthonormal(1e-5));
    }

    #[test]
    fn quat_round_trip_preserves_basis() {
        let q = Quat::from_euler(EulerRot::YXZ, 0.7, -0.3, 0.2);
        let basis = Basis::from_quat(q);
        let back = Basis::from_quat(basis.to_quat());
        assert_vec_eq(back.right, basis.right);
        assert_vec_eq(back.up, basis.up);
        assert!(basis.to_quat().abs_diff_eq(q, 1e-4) || basis.to_quat().abs_diff_eq(-q, 1e-4));
    }

    #[test]
    fn look_at_points_forward_at_target() {
        let eye = Vec3::new(3.0, 2.0, 5.0);
        let basis = Basis::look_at(eye, Vec3::ZERO, Vec3::Y);
        assert!(basis.is_orthonormal(1e-5));
        assert_vec_eq(basis.forward(), (-eye).normalize());
        assert!(basis.up.y > 0.0);
    }

    #[test]
    fn look_at_straight_down_stays_finite() {
        let basis = Basis::look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, Vec3::Y);
        assert!(basis.is_orthonormal(1e-5));
        assert_vec_eq(basis.forward(), Vec3::NEG_Y);
    }

    #[test]
    fn view_matrix_inverts_camera_transform() {
        let position = Vec3::new(1.0, -2.0, 4.0);
        let basis = Basis::look_at(position, Vec3::new(0.5, 0.0, 0.0), Vec3::Y);
        let world = Mat4::from_rotation_translation(basis.to_quat(), position);
        let product = view_matrix(position, &basis) * world;
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-4));

        // Glam's own look-to agrees
        let reference = Mat4::look_to_rh(position, basis.forward(), basis.up);
        assert!(view_matrix(position, &basis).abs_diff_eq(reference, 1e-4));
    }

    #[test]
    fn rotate_keeps_basis_orthonormal_over_many_steps() {
        let mut basis = Basis::default();
        let step = Quat::from_axis_angle(Vec3::new(0.3, 1.0, 0.1).normalize(), 0.013);
        for _ in 0..10_000 {
            basis.rotate(step);
        }
        assert!(basis.is_orthonormal(1e-4));
    }

    #[test]
    fn slerp_takes_shortest_arc() {
        let a = Quat::from_rotation_y(0.2);
        let b = -Quat::from_rotation_y(0.6);
        let mid = slerp_shortest(a, b, 0.5);
        let expected = Quat::from_rotation_y(0.4);
        assert!(mid.abs_diff_eq(expected, 1e-4) || mid.abs_diff_eq(-expected, 1e-4));
    }

    #[test]
    fn euler_degrees_round_trip() {
        let mut transform = Transform::identity();
        transform.set_euler_degrees(Vec3::new(10.0, 20.0, 30.0));
        assert_vec_eq(transform.euler_degrees(), Vec3::new(10.0, 20.0, 30.0));
    }
}
