// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fixed-layout constant buffer payloads.
//!
//! Every struct is `#[repr(C)]` and `Pod` so it can be copied byte-for-byte
//! into an upload buffer slot. Matrices are stored in shader layout (see
//! [`to_shader_layout`](crate::math::to_shader_layout)).

use crate::math::{to_shader_layout, Mat4, Vec3, Vec4};
use bytemuck::{Pod, Zeroable};

/// Per-frame camera constants, shared by every lane.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameConstants {
    /// World to view.
    pub view: Mat4,
    /// View to clip.
    pub projection: Mat4,
    /// View to world.
    pub inverse_view: Mat4,
    /// Clip to view.
    pub inverse_projection: Mat4,
    /// Camera position in world space (`w` unused).
    pub eye_position: Vec4,
}

impl Default for FrameConstants {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO)
    }
}

impl FrameConstants {
    /// Builds the constants from CPU-layout view and projection matrices.
    pub fn new(view: Mat4, projection: Mat4, eye: Vec3) -> Self {
        Self {
            view: to_shader_layout(&view),
            projection: to_shader_layout(&projection),
            inverse_view: to_shader_layout(&view.inverse()),
            inverse_projection: to_shader_layout(&projection.inverse()),
            eye_position: eye.extend(1.0),
        }
    }
}

/// Per-instance transform.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    /// Object to world.
    pub world: Mat4,
    /// Scale applied to texture coordinates.
    pub texture_scale: f32,
    /// Padding to a 16-byte boundary.
    pub _padding: [f32; 3],
}

impl ObjectConstants {
    /// Builds the constants from a CPU-layout world matrix.
    pub fn new(world: &Mat4, texture_scale: f32) -> Self {
        Self {
            world: to_shader_layout(world),
            texture_scale,
            _padding: [0.0; 3],
        }
    }
}

/// Surface parameters of one instance.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialProperties {
    /// Base color (`rgb`) and opacity (`a`).
    pub base_color: Vec4,
    /// Metalness in `[0, 1]`.
    pub metalness: f32,
    /// Smoothness in `[0, 1]`.
    pub smoothness: f32,
    /// Padding to a 16-byte boundary.
    pub _padding: [f32; 2],
}

impl MaterialProperties {
    /// Creates a material.
    pub fn new(base_color: Vec4, metalness: f32, smoothness: f32) -> Self {
        Self {
            base_color,
            metalness,
            smoothness,
            _padding: [0.0; 2],
        }
    }
}

/// A point light with a finite range.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PunctualLight {
    /// World position (`xyz`) and range (`w`).
    pub position_and_range: Vec4,
    /// Color (`rgb`) and power (`w`).
    pub color_and_power: Vec4,
}

impl PunctualLight {
    /// Creates a light.
    pub fn new(position: Vec3, range: f32, color: Vec3, power: f32) -> Self {
        Self {
            position_and_range: position.extend(range),
            color_and_power: color.extend(power),
        }
    }
}

/// Constants that never change after initialization.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ImmutableConstants {
    /// Near plane, far plane, screen width, screen height.
    pub near_far_screen: Vec4,
}

/// Tessellation parameters of the height-mapped lane.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct HeightMappingConstants {
    /// Distance at which tessellation is maximal.
    pub min_tessellation_distance: f32,
    /// Distance at which tessellation is minimal.
    pub max_tessellation_distance: f32,
    /// Tessellation factor at the far distance.
    pub min_tessellation_factor: f32,
    /// Tessellation factor at the near distance.
    pub max_tessellation_factor: f32,
    /// Displacement scale applied to height samples.
    pub height_scale: f32,
    /// Padding to a 16-byte boundary.
    pub _padding: [f32; 3],
}

/// Maximum number of hemisphere samples in the ambient occlusion kernel.
pub const MAX_AMBIENT_OCCLUSION_SAMPLES: usize = 32;

/// Sample kernel and parameters of the ambient occlusion lane.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct AmbientOcclusionConstants {
    /// Hemisphere sample offsets (`xyz`); `w` unused.
    pub samples: [Vec4; MAX_AMBIENT_OCCLUSION_SAMPLES],
    /// Number of valid entries in `samples`.
    pub sample_count: u32,
    /// Sampling radius in view space.
    pub radius: f32,
    /// Padding to a 16-byte boundary.
    pub _padding: [f32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn payloads_are_16_byte_multiples() {
        assert_eq!(size_of::<FrameConstants>() % 16, 0);
        assert_eq!(size_of::<ObjectConstants>() % 16, 0);
        assert_eq!(size_of::<MaterialProperties>() % 16, 0);
        assert_eq!(size_of::<PunctualLight>(), 32);
        assert_eq!(size_of::<HeightMappingConstants>() % 16, 0);
        assert_eq!(size_of::<AmbientOcclusionConstants>() % 16, 0);
    }

    #[test]
    fn frame_constants_store_transposed_matrices() {
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let constants = FrameConstants::new(view, Mat4::IDENTITY, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(constants.view, view.transpose());
        assert_eq!(constants.eye_position.w, 1.0);
    }
}
