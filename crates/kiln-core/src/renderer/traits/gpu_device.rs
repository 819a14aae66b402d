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
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::GraphicsCommandList;
use std::fmt::Debug;

/// The explicit GPU device contract every backend implements.
///
/// The device owns the command queue and its fence timeline. All resource
/// creation goes through `&self` so a single device can be shared behind an
/// `Arc` by every recorder of a frame.
pub trait GpuDevice: Send + Sync + Debug + 'static {
    // --- Command objects ---

    /// Creates a command allocator for lists of the given kind.
    /// ## Arguments
    /// * `kind` - The queue type the allocator serves.
    /// * `label` - An optional debug label.
    /// ## Returns
    /// The ID of the new allocator.
    /// ## Errors
    /// * `ResourceError` - If the backend cannot create the allocator.
    fn create_command_allocator(
        &self,
        kind: CommandListKind,
        label: Option<&str>,
    ) -> Result<CommandAllocatorId, ResourceError>;

    /// Resets a command allocator so its memory can be reused.
    /// ## Arguments
    /// * `allocator` - The allocator to reset.
    /// ## Errors
    /// * `RenderError::AllocatorInUse` - If a list recorded from the allocator
    ///   was submitted and its fence has not completed yet. Implementations
    ///   must detect this case instead of letting the reset race the GPU.
    /// * `RenderError::ResourceError` - If the allocator does not exist.
    fn reset_command_allocator(&self, allocator: CommandAllocatorId) -> Result<(), RenderError>;

    /// Creates a command list in the closed state, bound to `allocator`.
    /// ## Arguments
    /// * `kind` - The queue type of the list. Must match the allocator's kind.
    /// * `allocator` - The allocator the list is first associated with.
    /// * `label` - An optional debug label.
    /// ## Returns
    /// A boxed, closed command list.
    fn create_command_list(
        &self,
        kind: CommandListKind,
        allocator: CommandAllocatorId,
        label: Option<&str>,
    ) -> Result<Box<dyn GraphicsCommandList>, ResourceError>;

    /// Submits closed command lists to the GPU queue, in slice order.
    /// ## Errors
    /// * `RenderError::InvalidCommandListState` - If a list is unknown, not
    ///   closed, or was already submitted since its last close.
    fn execute_command_lists(&self, lists: &[CommandListId]) -> Result<(), RenderError>;

    /// Signals the queue fence with the next value on the timeline.
    /// ## Returns
    /// The signaled value. It completes once every list submitted before
    /// the signal has finished executing.
    fn signal_fence(&self) -> Result<FenceValue, RenderError>;

    /// The highest fence value the GPU has completed.
    fn completed_fence_value(&self) -> FenceValue;

    /// Blocks the calling thread until `value` has completed.
    fn wait_for_fence(&self, value: FenceValue) -> Result<(), RenderError>;

    // --- Buffers ---

    /// Creates a device-local buffer initialized with `data` through an
    /// intermediate upload buffer.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError>;

    /// Creates a persistently mapped, CPU-writable buffer.
    /// ## Arguments
    /// * `size` - The size in bytes.
    /// * `label` - An optional debug label.
    fn create_upload_buffer(&self, size: u64, label: Option<&str>)
        -> Result<BufferId, ResourceError>;

    /// Writes bytes into an upload buffer.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the write exceeds the buffer.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Reads bytes back from a buffer. Meant for upload buffers and tests.
    fn read_buffer(&self, id: BufferId, offset: u64, len: u64) -> Result<Vec<u8>, ResourceError>;

    /// The GPU virtual address of the first byte of the buffer.
    fn buffer_gpu_address(&self, id: BufferId) -> Result<GpuVirtualAddress, ResourceError>;

    /// Releases a buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    // --- Textures ---

    /// Creates a texture, optionally uploading its initial contents.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<TextureId, ResourceError>;

    /// Returns the format, mip count and dimension of a texture.
    fn texture_info(&self, id: TextureId) -> Result<TextureInfo, ResourceError>;

    /// Releases a texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates a render target view of `texture` in a device-owned,
    /// non-shader-visible heap.
    fn create_render_target_view(
        &self,
        texture: TextureId,
    ) -> Result<CpuDescriptorHandle, ResourceError>;

    /// Creates a depth-stencil view of `texture` in a device-owned,
    /// non-shader-visible heap.
    fn create_depth_stencil_view(
        &self,
        texture: TextureId,
    ) -> Result<CpuDescriptorHandle, ResourceError>;

    // --- Descriptors ---

    /// Creates a shader-visible CBV/SRV heap with `capacity` slots.
    fn create_descriptor_heap(
        &self,
        capacity: u32,
        label: Option<&str>,
    ) -> Result<DescriptorHeapId, ResourceError>;

    /// The first slot of a shader-visible heap, as a (CPU, GPU) handle pair.
    fn descriptor_heap_start(
        &self,
        heap: DescriptorHeapId,
    ) -> Result<(CpuDescriptorHandle, GpuDescriptorHandle), ResourceError>;

    /// The byte distance between two adjacent CBV/SRV descriptors.
    fn descriptor_increment(&self) -> u32;

    /// Writes a constant buffer view into the slot at `destination`.
    fn create_constant_buffer_view(
        &self,
        descriptor: &ConstantBufferViewDescriptor,
        destination: CpuDescriptorHandle,
    ) -> Result<(), ResourceError>;

    /// Writes a shader resource view of `texture` into the slot at `destination`.
    fn create_shader_resource_view(
        &self,
        texture: TextureId,
        descriptor: &ShaderResourceViewDescriptor,
        destination: CpuDescriptorHandle,
    ) -> Result<(), ResourceError>;

    // --- Pipelines ---

    /// Creates a binding signature (root signature) from its serialized blob.
    fn create_binding_signature(
        &self,
        blob: &[u8],
        label: Option<&str>,
    ) -> Result<BindingSignatureId, ResourceError>;

    /// Creates a pipeline state object from resolved shader bytecode.
    fn create_pipeline_state(
        &self,
        info: &PipelineStateCreateInfo<'_>,
    ) -> Result<PipelineStateId, ResourceError>;

    /// Releases a pipeline state object.
    fn destroy_pipeline_state(&self, id: PipelineStateId) -> Result<(), ResourceError>;
}
