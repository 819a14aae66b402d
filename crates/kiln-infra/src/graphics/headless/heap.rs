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

//! Shader-visible descriptor heaps and the views written into them.

use kiln_core::renderer::{
    ConstantBufferViewDescriptor, CpuDescriptorHandle, DescriptorHeapId, GpuDescriptorHandle,
    ResourceError, ShaderResourceViewDescriptor, TextureId,
};

/// The byte distance between two CBV/SRV descriptors.
pub(crate) const DESCRIPTOR_INCREMENT: u32 = 32;

/// Each heap gets its own 1 TiB window of handle space.
const HEAP_WINDOW: u64 = 1 << 40;
const CPU_HANDLE_BASE: u64 = 0x0010_0000_0000_0000;
const GPU_HANDLE_BASE: u64 = 0x0080_0000_0000_0000;

/// A view stored in a descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorView {
    /// A constant buffer view.
    ConstantBuffer(ConstantBufferViewDescriptor),
    /// A shader resource view of a texture.
    ShaderResource {
        /// The viewed texture.
        texture: TextureId,
        /// The view parameters.
        view: ShaderResourceViewDescriptor,
    },
}

#[derive(Debug)]
struct ShaderVisibleHeap {
    id: DescriptorHeapId,
    cpu_start: CpuDescriptorHandle,
    gpu_start: GpuDescriptorHandle,
    slots: Vec<Option<DescriptorView>>,
}

impl ShaderVisibleHeap {
    fn span(&self) -> u64 {
        self.slots.len() as u64 * DESCRIPTOR_INCREMENT as u64
    }

    fn cpu_slot(&self, handle: CpuDescriptorHandle) -> Option<usize> {
        let offset = handle.0.checked_sub(self.cpu_start.0)?;
        (offset < self.span() && offset % DESCRIPTOR_INCREMENT as u64 == 0)
            .then(|| (offset / DESCRIPTOR_INCREMENT as u64) as usize)
    }

    fn gpu_slot(&self, handle: GpuDescriptorHandle) -> Option<usize> {
        let offset = handle.0.checked_sub(self.gpu_start.0)?;
        (offset < self.span() && offset % DESCRIPTOR_INCREMENT as u64 == 0)
            .then(|| (offset / DESCRIPTOR_INCREMENT as u64) as usize)
    }
}

#[derive(Debug, Default)]
pub(crate) struct DescriptorHeaps {
    heaps: Vec<ShaderVisibleHeap>,
}

impl DescriptorHeaps {
    pub(crate) fn create(&mut self, id: DescriptorHeapId, capacity: u32) {
        let window = self.heaps.len() as u64 * HEAP_WINDOW;
        self.heaps.push(ShaderVisibleHeap {
            id,
            cpu_start: CpuDescriptorHandle(CPU_HANDLE_BASE + window),
            gpu_start: GpuDescriptorHandle(GPU_HANDLE_BASE + window),
            slots: vec![None; capacity as usize],
        });
    }

    pub(crate) fn start(
        &self,
        id: DescriptorHeapId,
    ) -> Result<(CpuDescriptorHandle, GpuDescriptorHandle), ResourceError> {
        self.heaps
            .iter()
            .find(|h| h.id == id)
            .map(|h| (h.cpu_start, h.gpu_start))
            .ok_or(ResourceError::NotFound)
    }

    pub(crate) fn write(
        &mut self,
        destination: CpuDescriptorHandle,
        view: DescriptorView,
    ) -> Result<(), ResourceError> {
        for heap in &mut self.heaps {
            if let Some(slot) = heap.cpu_slot(destination) {
                heap.slots[slot] = Some(view);
                return Ok(());
            }
        }
        Err(ResourceError::InvalidHandle)
    }

    pub(crate) fn view_at(&self, handle: GpuDescriptorHandle) -> Option<DescriptorView> {
        self.heaps
            .iter()
            .find_map(|h| h.gpu_slot(handle).map(|slot| h.slots[slot]))
            .flatten()
    }

    /// The heap whose GPU range contains `handle`.
    pub(crate) fn heap_of(&self, handle: GpuDescriptorHandle) -> Option<DescriptorHeapId> {
        self.heaps
            .iter()
            .find(|h| h.gpu_slot(handle).is_some())
            .map(|h| h.id)
    }

    pub(crate) fn contains(&self, id: DescriptorHeapId) -> bool {
        self.heaps.iter().any(|h| h.id == id)
    }
}
