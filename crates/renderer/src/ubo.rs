//! Uniform buffer object definitions for shaders.
//!
//! The structure must match the vertex shader's uniform block exactly. It
//! uses `#[repr(C)]` for predictable memory layout and implements `Pod` and
//! `Zeroable` for safe byte casting.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Degrees the model turns per second of elapsed time.
pub const ROTATION_DEGREES_PER_SECOND: f32 = 90.0;

/// Eye position of the fixed camera.
pub const EYE: Vec3 = Vec3::new(2.0, 2.0, 2.0);

/// Vertical field of view in degrees.
pub const FOV_Y_DEGREES: f32 = 45.0;

/// Near clip plane distance.
pub const Z_NEAR: f32 = 0.1;

/// Far clip plane distance.
pub const Z_FAR: f32 = 10.0;

/// Transform uniforms bound at binding 0.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: projection matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UniformBufferObject {
    /// Object to world space.
    pub model: Mat4,
    /// World to view space.
    pub view: Mat4,
    /// View to clip space, with Y flipped for Vulkan.
    pub proj: Mat4,
}

impl UniformBufferObject {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Builds the transforms for a frame `elapsed` seconds into the run.
    ///
    /// The model spins about +Z while the camera looks at the origin from
    /// (2, 2, 2) with +Z up.
    pub fn for_elapsed(elapsed: f32, aspect: f32) -> Self {
        let model = Mat4::from_rotation_z((elapsed * ROTATION_DEGREES_PER_SECOND).to_radians());
        let view = Mat4::look_at_rh(EYE, Vec3::ZERO, Vec3::Z);
        let mut proj = Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR);
        // Vulkan clip space has Y pointing down.
        proj.y_axis.y *= -1.0;

        Self { model, view, proj }
    }

    /// Returns the raw bytes uploaded to the uniform buffer.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ubo_size() {
        // 3 Mat4 (3 * 64) = 192 bytes
        assert_eq!(UniformBufferObject::SIZE, 192);
        assert_eq!(UniformBufferObject::default().as_bytes().len(), 192);
    }

    #[test]
    fn test_ubo_alignment() {
        assert_eq!(std::mem::align_of::<UniformBufferObject>(), 16);
    }

    #[test]
    fn test_ubo_projection_y_flip() {
        let aspect = 800.0 / 600.0;
        let ubo = UniformBufferObject::for_elapsed(0.0, aspect);
        let unflipped =
            Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR);

        assert!(ubo.proj.y_axis.y < 0.0);
        assert_eq!(ubo.proj.y_axis.y, -unflipped.y_axis.y);
        assert_eq!(ubo.proj.x_axis, unflipped.x_axis);
        assert_eq!(ubo.proj.z_axis, unflipped.z_axis);
        assert_eq!(ubo.proj.w_axis, unflipped.w_axis);
    }

    #[test]
    fn test_ubo_model_at_zero_is_identity() {
        let ubo = UniformBufferObject::for_elapsed(0.0, 1.0);
        assert!(ubo.model.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_ubo_model_quarter_turn_after_one_second() {
        let ubo = UniformBufferObject::for_elapsed(1.0, 1.0);
        let rotated = ubo.model.transform_vector3(Vec3::X);
        assert!(rotated.abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn test_ubo_view_looks_at_origin() {
        let ubo = UniformBufferObject::for_elapsed(0.0, 1.0);
        // The origin sits on the negative view-space Z axis.
        let origin = ubo.view.transform_point3(Vec3::ZERO);
        assert!(origin.x.abs() < 1e-5);
        assert!(origin.y.abs() < 1e-5);
        assert!((origin.z + EYE.length()).abs() < 1e-5);
    }
}
