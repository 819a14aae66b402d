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

//! A counting mock device shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::renderer::api::*;
use crate::renderer::error::{RenderError, ResourceError, ShaderError};
use crate::renderer::traits::{GpuDevice, GraphicsCommandList, ShaderLoader};

#[derive(Debug, Default)]
struct MockState {
    buffers: HashMap<BufferId, Vec<u8>>,
    allocator_resets: Vec<CommandAllocatorId>,
    executed_batches: Vec<Vec<CommandListId>>,
    waited_fences: Vec<FenceValue>,
}

#[derive(Debug)]
pub struct MockDevice {
    next_id: AtomicU64,
    pipelines_created: AtomicUsize,
    next_fence: AtomicU64,
    completed_fence: AtomicU64,
    auto_complete: AtomicBool,
    state: Mutex<MockState>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pipelines_created: AtomicUsize::new(0),
            next_fence: AtomicU64::new(0),
            completed_fence: AtomicU64::new(0),
            auto_complete: AtomicBool::new(true),
            state: Mutex::new(MockState::default()),
        }
    }

    fn id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// When enabled (the default), every signal completes immediately.
    pub fn set_auto_complete(&self, enabled: bool) {
        self.auto_complete.store(enabled, Ordering::SeqCst);
    }

    pub fn pipelines_created(&self) -> usize {
        self.pipelines_created.load(Ordering::SeqCst)
    }

    pub fn allocator_resets(&self) -> Vec<CommandAllocatorId> {
        self.state.lock().unwrap().allocator_resets.clone()
    }

    pub fn executed_batches(&self) -> Vec<Vec<CommandListId>> {
        self.state.lock().unwrap().executed_batches.clone()
    }

    pub fn waited_fences(&self) -> Vec<FenceValue> {
        self.state.lock().unwrap().waited_fences.clone()
    }
}

#[derive(Debug)]
struct MockCommandList {
    id: CommandListId,
    closed: bool,
}

impl GraphicsCommandList for MockCommandList {
    fn id(&self) -> CommandListId {
        self.id
    }
    fn reset(
        &mut self,
        _allocator: CommandAllocatorId,
        _pipeline: Option<PipelineStateId>,
    ) -> Result<(), RenderError> {
        self.closed = false;
        Ok(())
    }
    fn set_viewports(&mut self, _viewports: &[Viewport]) {}
    fn set_scissor_rects(&mut self, _rects: &[ScissorRect]) {}
    fn set_render_targets(
        &mut self,
        _color_targets: &[CpuDescriptorHandle],
        _depth_stencil: Option<CpuDescriptorHandle>,
    ) {
    }
    fn clear_render_target(&mut self, _target: CpuDescriptorHandle, _color: [f32; 4]) {}
    fn clear_depth_stencil(&mut self, _target: CpuDescriptorHandle, _depth: f32, _stencil: u8) {}
    fn set_descriptor_heaps(&mut self, _heaps: &[DescriptorHeapId]) {}
    fn set_graphics_binding_signature(&mut self, _signature: BindingSignatureId) {}
    fn set_graphics_root_descriptor_table(&mut self, _parameter: u32, _base: GpuDescriptorHandle) {}
    fn set_graphics_root_constant_buffer_view(
        &mut self,
        _parameter: u32,
        _address: GpuVirtualAddress,
    ) {
    }
    fn set_primitive_topology(&mut self, _topology: PrimitiveTopology) {}
    fn set_vertex_buffers(&mut self, _start_slot: u32, _views: &[VertexBufferView]) {}
    fn set_index_buffer(&mut self, _view: &IndexBufferView) {}
    fn draw_instanced(&mut self, _v: u32, _i: u32, _sv: u32, _si: u32) {}
    fn draw_indexed_instanced(&mut self, _c: u32, _i: u32, _si: u32, _bv: i32, _sti: u32) {}
    fn close(&mut self) -> Result<(), RenderError> {
        self.closed = true;
        Ok(())
    }
    fn discard(&mut self) {
        self.closed = true;
    }
    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl GpuDevice for MockDevice {
    fn create_command_allocator(
        &self,
        _kind: CommandListKind,
        _label: Option<&str>,
    ) -> Result<CommandAllocatorId, ResourceError> {
        Ok(CommandAllocatorId(self.id()))
    }

    fn reset_command_allocator(&self, allocator: CommandAllocatorId) -> Result<(), RenderError> {
        self.state.lock().unwrap().allocator_resets.push(allocator);
        Ok(())
    }

    fn create_command_list(
        &self,
        _kind: CommandListKind,
        _allocator: CommandAllocatorId,
        _label: Option<&str>,
    ) -> Result<Box<dyn GraphicsCommandList>, ResourceError> {
        Ok(Box::new(MockCommandList {
            id: CommandListId(self.id()),
            closed: true,
        }))
    }

    fn execute_command_lists(&self, lists: &[CommandListId]) -> Result<(), RenderError> {
        self.state
            .lock()
            .unwrap()
            .executed_batches
            .push(lists.to_vec());
        Ok(())
    }

    fn signal_fence(&self) -> Result<FenceValue, RenderError> {
        let value = self.next_fence.fetch_add(1, Ordering::SeqCst) + 1;
        if self.auto_complete.load(Ordering::SeqCst) {
            self.completed_fence.fetch_max(value, Ordering::SeqCst);
        }
        Ok(FenceValue(value))
    }

    fn completed_fence_value(&self) -> FenceValue {
        FenceValue(self.completed_fence.load(Ordering::SeqCst))
    }

    fn wait_for_fence(&self, value: FenceValue) -> Result<(), RenderError> {
        self.state.lock().unwrap().waited_fences.push(value);
        self.completed_fence.fetch_max(value.0, Ordering::SeqCst);
        Ok(())
    }

    fn create_buffer_with_data(
        &self,
        _descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.id());
        self.state.lock().unwrap().buffers.insert(id, data.to_vec());
        Ok(id)
    }

    fn create_upload_buffer(
        &self,
        size: u64,
        _label: Option<&str>,
    ) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.id());
        self.state
            .lock()
            .unwrap()
            .buffers
            .insert(id, vec![0; size as usize]);
        Ok(id)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.state.lock().unwrap();
        let buffer = state.buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let start = offset as usize;
        let end = start + data.len();
        if end > buffer.len() {
            return Err(ResourceError::OutOfBounds);
        }
        buffer[start..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, len: u64) -> Result<Vec<u8>, ResourceError> {
        let state = self.state.lock().unwrap();
        let buffer = state.buffers.get(&id).ok_or(ResourceError::NotFound)?;
        buffer
            .get(offset as usize..(offset + len) as usize)
            .map(<[u8]>::to_vec)
            .ok_or(ResourceError::OutOfBounds)
    }

    fn buffer_gpu_address(&self, id: BufferId) -> Result<GpuVirtualAddress, ResourceError> {
        Ok(GpuVirtualAddress(id.0 << 32))
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.state
            .lock()
            .unwrap()
            .buffers
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_texture(
        &self,
        _descriptor: &TextureDescriptor,
        _data: Option<&[u8]>,
    ) -> Result<TextureId, ResourceError> {
        Ok(TextureId(self.id()))
    }

    fn texture_info(&self, _id: TextureId) -> Result<TextureInfo, ResourceError> {
        Ok(TextureInfo {
            format: TextureFormat::Rgba8Unorm,
            mip_level_count: 1,
            dimension: TextureDimension::D2,
        })
    }

    fn destroy_texture(&self, _id: TextureId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_render_target_view(
        &self,
        _texture: TextureId,
    ) -> Result<CpuDescriptorHandle, ResourceError> {
        Ok(CpuDescriptorHandle(self.id()))
    }

    fn create_depth_stencil_view(
        &self,
        _texture: TextureId,
    ) -> Result<CpuDescriptorHandle, ResourceError> {
        Ok(CpuDescriptorHandle(self.id()))
    }

    fn create_descriptor_heap(
        &self,
        _capacity: u32,
        _label: Option<&str>,
    ) -> Result<DescriptorHeapId, ResourceError> {
        Ok(DescriptorHeapId(self.id()))
    }

    fn descriptor_heap_start(
        &self,
        _heap: DescriptorHeapId,
    ) -> Result<(CpuDescriptorHandle, GpuDescriptorHandle), ResourceError> {
        Ok((CpuDescriptorHandle(0x1000), GpuDescriptorHandle(0x8000_0000)))
    }

    fn descriptor_increment(&self) -> u32 {
        32
    }

    fn create_constant_buffer_view(
        &self,
        _descriptor: &ConstantBufferViewDescriptor,
        _destination: CpuDescriptorHandle,
    ) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_shader_resource_view(
        &self,
        _texture: TextureId,
        _descriptor: &ShaderResourceViewDescriptor,
        _destination: CpuDescriptorHandle,
    ) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_binding_signature(
        &self,
        _blob: &[u8],
        _label: Option<&str>,
    ) -> Result<BindingSignatureId, ResourceError> {
        Ok(BindingSignatureId(self.id()))
    }

    fn create_pipeline_state(
        &self,
        _info: &PipelineStateCreateInfo<'_>,
    ) -> Result<PipelineStateId, ResourceError> {
        self.pipelines_created.fetch_add(1, Ordering::SeqCst);
        // Widen the race window for the concurrent creation test.
        std::thread::sleep(std::time::Duration::from_millis(5));
        Ok(PipelineStateId(self.id()))
    }

    fn destroy_pipeline_state(&self, _id: PipelineStateId) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// Returns the path bytes as the blob for every path.
#[derive(Debug)]
pub struct MockShaderLoader;

impl ShaderLoader for MockShaderLoader {
    fn load_compiled_shader(&self, path: &str) -> Result<Arc<[u8]>, ShaderError> {
        if path.is_empty() {
            return Err(ShaderError::NotFound {
                path: path.to_string(),
            });
        }
        Ok(Arc::from(path.as_bytes()))
    }
}
