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

//! The intermediate render targets the passes of a frame hand to each other.

use kiln_core::renderer::{
    CpuDescriptorHandle, GpuDevice, RendererSettings, ResourceError, TextureDescriptor,
    TextureDimension, TextureFormat, TextureId,
};

/// A texture together with the target view the passes draw into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// The backing texture, sampled by later passes.
    pub texture: TextureId,
    /// The render target or depth-stencil view.
    pub view: CpuDescriptorHandle,
}

/// Every screen-sized target of the deferred frame.
///
/// | Target | Written by | Read by |
/// |---|---|---|
/// | `geometry_buffers` | geometry lanes | lighting, ambient occlusion |
/// | `depth` | geometry lanes, sky box (test only) | lighting, ambient occlusion |
/// | `color_buffer` | lighting, sky box | post-process |
/// | `ambient_accessibility` | ambient occlusion | blur |
/// | `blurred_accessibility` | blur | |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargets {
    /// Normal/smoothness then base color/metalness.
    pub geometry_buffers: Vec<RenderTarget>,
    /// The scene depth.
    pub depth: RenderTarget,
    /// The HDR color buffer.
    pub color_buffer: RenderTarget,
    /// Raw ambient accessibility.
    pub ambient_accessibility: RenderTarget,
    /// Blurred ambient accessibility.
    pub blurred_accessibility: RenderTarget,
}

impl RenderTargets {
    /// Creates every target at the configured resolution and formats.
    pub fn new(device: &dyn GpuDevice, settings: &RendererSettings) -> Result<Self, ResourceError> {
        let color = |label: &str, format: TextureFormat| -> Result<RenderTarget, ResourceError> {
            let texture = device.create_texture(&Self::descriptor(settings, label, format), None)?;
            let view = device.create_render_target_view(texture)?;
            Ok(RenderTarget { texture, view })
        };

        let geometry_buffers = settings
            .geometry_buffer_formats
            .iter()
            .enumerate()
            .map(|(i, format)| color(&format!("Geometry buffer {i}"), *format))
            .collect::<Result<Vec<_>, _>>()?;

        let depth_texture = device.create_texture(
            &Self::descriptor(settings, "Depth buffer", settings.depth_stencil_format),
            None,
        )?;
        let depth = RenderTarget {
            texture: depth_texture,
            view: device.create_depth_stencil_view(depth_texture)?,
        };

        let targets = Self {
            geometry_buffers,
            depth,
            color_buffer: color("Color buffer", settings.color_buffer_format)?,
            ambient_accessibility: color(
                "Ambient accessibility buffer",
                settings.ambient_accessibility_format,
            )?,
            blurred_accessibility: color(
                "Blurred ambient accessibility buffer",
                settings.ambient_accessibility_format,
            )?,
        };
        log::info!(
            "RenderTargets: created {} targets at {}x{}",
            targets.geometry_buffers.len() + 4,
            settings.width,
            settings.height
        );
        Ok(targets)
    }

    fn descriptor(settings: &RendererSettings, label: &str, format: TextureFormat) -> TextureDescriptor {
        TextureDescriptor {
            label: Some(label.to_string()),
            width: settings.width,
            height: settings.height,
            mip_level_count: 1,
            format,
            dimension: TextureDimension::D2,
        }
    }

    /// The geometry buffer render target views, in slot order.
    pub fn geometry_buffer_views(&self) -> Vec<CpuDescriptorHandle> {
        self.geometry_buffers.iter().map(|t| t.view).collect()
    }

    /// The geometry buffer textures, in slot order.
    pub fn geometry_buffer_textures(&self) -> Vec<TextureId> {
        self.geometry_buffers.iter().map(|t| t.texture).collect()
    }

    /// Destroys every texture. The GPU must be idle.
    pub fn release(self, device: &dyn GpuDevice) {
        let all = self
            .geometry_buffers
            .into_iter()
            .chain([
                self.depth,
                self.color_buffer,
                self.ambient_accessibility,
                self.blurred_accessibility,
            ]);
        for target in all {
            if let Err(e) = device.destroy_texture(target.texture) {
                log::warn!("RenderTargets: failed to destroy {:?}: {e}", target.texture);
            }
        }
    }
}
