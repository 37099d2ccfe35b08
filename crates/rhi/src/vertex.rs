//! Vertex data structure and input description.
//!
//! # Memory Layout
//!
//! [`Vertex`] is interleaved and `#[repr(C)]`:
//! - Offset 0: position (12 bytes), location 0
//! - Offset 12: color (12 bytes), location 1
//! - Offset 24: tex_coord (8 bytes), location 2
//! - Total size: 32 bytes

use std::hash::{Hash, Hasher};

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Model vertex with position, color and texture coordinates.
///
/// Equality and hashing compare the raw bits of all eight floats, so a
/// vertex can key a `HashMap` during deduplication. `0.0` and `-0.0` are
/// distinct, and a NaN equals itself.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct Vertex {
    /// 3D position in object space.
    pub position: Vec3,
    /// RGB color.
    pub color: Vec3,
    /// Texture coordinates (UV).
    pub tex_coord: Vec2,
}

impl Vertex {
    /// Creates a new vertex with the specified attributes.
    #[inline]
    pub const fn new(position: Vec3, color: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            color,
            tex_coord,
        }
    }

    /// Returns the size of the vertex in bytes.
    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Get the vertex input binding description.
    ///
    /// Returns a binding description for binding 0 with per-vertex input rate.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: Self::size() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Get the vertex attribute descriptions.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            // Position at location 0
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, position) as u32,
            },
            // Color at location 1
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, color) as u32,
            },
            // TexCoord at location 2
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, tex_coord) as u32,
            },
        ]
    }

    fn bits(&self) -> [u32; 8] {
        let floats: [f32; 8] = bytemuck::cast(*self);
        floats.map(f32::to_bits)
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}
