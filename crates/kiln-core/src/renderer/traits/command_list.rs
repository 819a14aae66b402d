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

use crate::renderer::api::*;
use crate::renderer::error::RenderError;
use std::fmt::Debug;

/// A command list recording graphics commands.
///
/// Lifecycle: `reset (allocator idle) → record → close → submit`. A list is
/// created closed; it must be closed before it is reset again and before it
/// is submitted. Recording methods are infallible; misuse (recording into a
/// closed list) is reported by the next [`close`](Self::close).
pub trait GraphicsCommandList: Send + Debug {
    /// The ID this list is submitted under.
    fn id(&self) -> CommandListId;

    /// Reopens the list for recording against `allocator`, with an optional
    /// initial pipeline state.
    /// ## Errors
    /// * `RenderError::InvalidCommandListState` - If the list is still
    ///   recording, or was closed but never submitted.
    fn reset(
        &mut self,
        allocator: CommandAllocatorId,
        pipeline: Option<PipelineStateId>,
    ) -> Result<(), RenderError>;

    /// Binds the viewports.
    fn set_viewports(&mut self, viewports: &[Viewport]);

    /// Binds the scissor rectangles.
    fn set_scissor_rects(&mut self, rects: &[ScissorRect]);

    /// Binds color render targets and an optional depth-stencil target.
    fn set_render_targets(
        &mut self,
        color_targets: &[CpuDescriptorHandle],
        depth_stencil: Option<CpuDescriptorHandle>,
    );

    /// Clears a render target view to `color`.
    fn clear_render_target(&mut self, target: CpuDescriptorHandle, color: [f32; 4]);

    /// Clears a depth-stencil view.
    fn clear_depth_stencil(&mut self, target: CpuDescriptorHandle, depth: f32, stencil: u8);

    /// Binds the shader-visible descriptor heaps.
    fn set_descriptor_heaps(&mut self, heaps: &[DescriptorHeapId]);

    /// Binds the graphics binding signature.
    fn set_graphics_binding_signature(&mut self, signature: BindingSignatureId);

    /// Points root parameter `parameter` at a descriptor table starting at `base`.
    fn set_graphics_root_descriptor_table(&mut self, parameter: u32, base: GpuDescriptorHandle);

    /// Binds a constant buffer directly to root parameter `parameter`.
    fn set_graphics_root_constant_buffer_view(
        &mut self,
        parameter: u32,
        address: GpuVirtualAddress,
    );

    /// Sets the input assembler topology.
    fn set_primitive_topology(&mut self, topology: PrimitiveTopology);

    /// Binds vertex buffers starting at `start_slot`.
    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]);

    /// Binds the index buffer.
    fn set_index_buffer(&mut self, view: &IndexBufferView);

    /// Issues a non-indexed draw.
    fn draw_instanced(
        &mut self,
        vertex_count_per_instance: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    );

    /// Issues an indexed draw.
    fn draw_indexed_instanced(
        &mut self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    );

    /// Finishes recording.
    /// ## Errors
    /// * `RenderError::InvalidCommandListState` - If the list was not
    ///   recording, or commands were recorded while it was closed.
    fn close(&mut self) -> Result<(), RenderError>;

    /// Closes the list and throws away what was recorded. The list is never
    /// submitted and may be reset again right away.
    fn discard(&mut self);

    /// Whether the list is currently closed.
    fn is_closed(&self) -> bool;
}
