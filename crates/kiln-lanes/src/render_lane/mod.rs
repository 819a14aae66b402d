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

//! Rendering lanes - one recorder per render pass.

use kiln_core::lane::{Lane, LaneError};
use kiln_core::renderer::{
    CpuDescriptorHandle, DescriptorRange, FrameContext, GpuContext, GpuDevice,
    GraphicsCommandList, PipelineState, ResourceError, ShaderResourceViewDescriptor, TextureId,
};

mod ambient_occlusion;
mod blur;
mod clear;
mod color;
mod geometry;
mod height_mapping;
mod normal_mapping;
pub mod pipelines;
mod post_process;
mod punctual_light;
mod skybox;
mod targets;

pub use ambient_occlusion::*;
pub use blur::*;
pub use clear::*;
pub use color::*;
pub use geometry::{GeometryInputError, GeometryInputs};
pub use height_mapping::*;
pub use normal_mapping::*;
pub use post_process::*;
pub use punctual_light::*;
pub use skybox::*;
pub use targets::*;

/// Vertices of the two triangles covering the screen in full-screen passes.
pub const FULL_SCREEN_VERTEX_COUNT: u32 = 6;

/// The per-frame recording contract shared by every render pass.
///
/// A lane is constructed with the shared [`GpuContext`], initialized once
/// with its scene inputs through its own `init` method, then asked every
/// frame to record its work into a command list and push that list to the
/// shared executor. Recording never waits on the GPU: the allocator it
/// resets was last submitted `queued_frame_count` frames earlier, and the
/// frame pacer guarantees that work has completed.
pub trait RenderLane: Lane {
    /// Returns `true` once `init` succeeded and every handle the lane
    /// records with is valid.
    fn is_data_valid(&self) -> bool;

    /// Records this frame's commands and pushes the closed list(s) to the
    /// shared executor.
    ///
    /// # Returns
    ///
    /// The number of command lists pushed.
    ///
    /// # Errors
    ///
    /// * `LaneError::NotInitialized` if `init` was never called.
    /// * `LaneError::Render` if an allocator or list could not be reset or
    ///   closed, including `RenderError::AllocatorInUse` when the GPU still
    ///   owns the allocator of the current frame slot.
    fn record_and_push(&mut self, frame: &FrameContext<'_>) -> Result<u32, LaneError>;

    /// Frees the lane's constant buffers and returns it to the uninitialized
    /// state. The GPU must be idle.
    fn release(&mut self);
}

/// Sets the state every pass starts from: viewport, scissor, render
/// targets, the shared descriptor heap and the pipeline's binding signature.
pub(crate) fn bind_pass_state(
    list: &mut dyn GraphicsCommandList,
    context: &GpuContext,
    pipeline: &PipelineState,
    color_targets: &[CpuDescriptorHandle],
    depth_target: Option<CpuDescriptorHandle>,
) {
    list.set_viewports(&[context.settings.viewport()]);
    list.set_scissor_rects(&[context.settings.scissor_rect()]);
    list.set_render_targets(color_targets, depth_target);
    list.set_descriptor_heaps(&[context.arena.heap()]);
    list.set_graphics_binding_signature(pipeline.binding_signature);
}

/// A texture together with the view its shader resource slot will hold.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextureView {
    texture: TextureId,
    descriptor: ShaderResourceViewDescriptor,
}

/// Looks up every texture before anything is allocated for it, so an
/// unknown or destroyed texture fails the lane's `init` with nothing to undo.
pub(crate) fn resolve_texture_views(
    device: &dyn GpuDevice,
    textures: &[TextureId],
) -> Result<Vec<TextureView>, ResourceError> {
    textures
        .iter()
        .map(|&texture| {
            let info = device.texture_info(texture)?;
            Ok(TextureView {
                texture,
                descriptor: ShaderResourceViewDescriptor::for_texture(&info),
            })
        })
        .collect()
}

/// Writes each view into consecutive slots of `range`, starting at slot 0.
pub(crate) fn write_texture_views(
    device: &dyn GpuDevice,
    views: &[TextureView],
    range: &DescriptorRange,
) -> Result<(), ResourceError> {
    for (i, view) in (0..range.len()).zip(views) {
        device.create_shader_resource_view(view.texture, &view.descriptor, range.cpu(i))?;
    }
    Ok(())
}
