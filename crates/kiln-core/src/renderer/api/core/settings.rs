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

//! Global settings for the rendering system.

use serde::{Deserialize, Serialize};

use crate::renderer::api::command::{ScissorRect, Viewport};
use crate::renderer::api::resource::TextureFormat;
use crate::renderer::error::RenderError;

/// Settings fixed at startup. Shapes derived from them (allocator counts,
/// descriptor heap size, render target formats) never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Number of frames the CPU may record ahead of the GPU (`K`).
    pub queued_frame_count: usize,
    /// Back buffer width in pixels.
    pub width: u32,
    /// Back buffer height in pixels.
    pub height: u32,
    /// Near clip plane distance.
    pub near_plane: f32,
    /// Far clip plane distance.
    pub far_plane: f32,
    /// Format of the presented back buffer.
    pub frame_buffer_format: TextureFormat,
    /// Format of the scene depth buffer.
    pub depth_stencil_format: TextureFormat,
    /// Format of the HDR color buffer lit by the lighting stage.
    pub color_buffer_format: TextureFormat,
    /// Formats of the geometry buffers: normal/smoothness, then base color/metalness.
    pub geometry_buffer_formats: Vec<TextureFormat>,
    /// Format of the ambient accessibility buffer and its blurred copy.
    pub ambient_accessibility_format: TextureFormat,
    /// Slots in the shared shader-visible descriptor heap.
    pub descriptor_heap_capacity: u32,
    /// Number of samples in the ambient occlusion kernel.
    pub ambient_occlusion_samples: u32,
    /// Ambient occlusion sampling radius in view space.
    pub ambient_occlusion_radius: f32,
    /// Displacement scale of height-mapped geometry.
    pub height_scale: f32,
    /// Distance under which height-mapped geometry is fully tessellated.
    pub min_tessellation_distance: f32,
    /// Distance over which height-mapped geometry is minimally tessellated.
    pub max_tessellation_distance: f32,
    /// Minimum tessellation factor.
    pub min_tessellation_factor: f32,
    /// Maximum tessellation factor.
    pub max_tessellation_factor: f32,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            queued_frame_count: 3,
            width: 1920,
            height: 1080,
            near_plane: 1.0,
            far_plane: 5000.0,
            frame_buffer_format: TextureFormat::Rgba8Unorm,
            depth_stencil_format: TextureFormat::Depth24UnormStencil8,
            color_buffer_format: TextureFormat::Rgba16Float,
            geometry_buffer_formats: vec![TextureFormat::Rgba16Float, TextureFormat::Rgba8Unorm],
            ambient_accessibility_format: TextureFormat::R16Unorm,
            descriptor_heap_capacity: 4096,
            ambient_occlusion_samples: 16,
            ambient_occlusion_radius: 0.5,
            height_scale: 0.1,
            min_tessellation_distance: 20.0,
            max_tessellation_distance: 500.0,
            min_tessellation_factor: 1.0,
            max_tessellation_factor: 5.0,
        }
    }
}

impl RendererSettings {
    /// Checks that every setting is in range.
    pub fn validate(&self) -> Result<(), RenderError> {
        let invalid = |msg: String| Err(RenderError::InvalidConfiguration(msg));

        if !(2..=3).contains(&self.queued_frame_count) {
            return invalid(format!(
                "queued_frame_count must be 2 or 3, got {}",
                self.queued_frame_count
            ));
        }
        if self.width == 0 || self.height == 0 {
            return invalid(format!(
                "resolution must be non-zero, got {}x{}",
                self.width, self.height
            ));
        }
        if !(self.near_plane > 0.0 && self.far_plane > self.near_plane) {
            return invalid(format!(
                "clip planes must satisfy 0 < near < far, got {} / {}",
                self.near_plane, self.far_plane
            ));
        }
        if !self.depth_stencil_format.is_depth_stencil() {
            return invalid(format!(
                "{:?} is not a depth-stencil format",
                self.depth_stencil_format
            ));
        }
        if self.geometry_buffer_formats.len() != 2 {
            return invalid(format!(
                "exactly 2 geometry buffer formats are required, got {}",
                self.geometry_buffer_formats.len()
            ));
        }
        if self.descriptor_heap_capacity == 0 {
            return invalid("descriptor_heap_capacity must be non-zero".to_string());
        }
        if self.ambient_occlusion_samples == 0
            || self.ambient_occlusion_samples as usize
                > crate::renderer::api::scene::MAX_AMBIENT_OCCLUSION_SAMPLES
        {
            return invalid(format!(
                "ambient_occlusion_samples must be in 1..={}, got {}",
                crate::renderer::api::scene::MAX_AMBIENT_OCCLUSION_SAMPLES,
                self.ambient_occlusion_samples
            ));
        }
        if self.min_tessellation_factor < 1.0
            || self.max_tessellation_factor < self.min_tessellation_factor
        {
            return invalid("tessellation factors must satisfy 1 <= min <= max".to_string());
        }
        Ok(())
    }

    /// A viewport covering the back buffer.
    pub fn viewport(&self) -> Viewport {
        Viewport::full(self.width, self.height)
    }

    /// A scissor rectangle covering the back buffer.
    pub fn scissor_rect(&self) -> ScissorRect {
        ScissorRect::full(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RendererSettings::default().validate().is_ok());
    }

    #[test]
    fn queued_frame_count_must_be_two_or_three() {
        for k in [0, 1, 4] {
            let settings = RendererSettings {
                queued_frame_count: k,
                ..Default::default()
            };
            assert!(matches!(
                settings.validate(),
                Err(RenderError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn color_format_as_depth_is_rejected() {
        let settings = RendererSettings {
            depth_stencil_format: TextureFormat::Rgba8Unorm,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn viewport_covers_resolution() {
        let settings = RendererSettings {
            width: 800,
            height: 600,
            ..Default::default()
        };
        assert_eq!(settings.viewport().width, 800.0);
        assert_eq!(settings.scissor_rect().bottom, 600);
    }
}
