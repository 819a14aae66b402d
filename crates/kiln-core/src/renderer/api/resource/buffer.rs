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

/// An opaque handle to a GPU buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// A GPU virtual address, as consumed by root constant-buffer bindings and
/// buffer views.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuVirtualAddress(pub u64);

impl GpuVirtualAddress {
    /// Returns the address `bytes` past this one.
    #[inline]
    pub fn offset(self, bytes: u64) -> Self {
        GpuVirtualAddress(self.0 + bytes)
    }
}

/// Where a buffer's memory lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Fast device memory, filled through a copy from an upload buffer.
    DeviceLocal,
    /// CPU-writable memory read by the GPU over the bus.
    Upload,
}

/// Describes a buffer to create.
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    /// An optional debug label.
    pub label: Option<String>,
    /// The size in bytes.
    pub size: u64,
    /// The memory the buffer lives in.
    pub memory: MemoryLocation,
}

/// The width of the indices in an index buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit unsigned indices.
    Uint16,
    /// 32-bit unsigned indices.
    Uint32,
}

impl IndexFormat {
    /// The size of a single index in bytes.
    pub fn size_in_bytes(self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// A view of a vertex buffer bound to the input assembler.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VertexBufferView {
    /// The buffer the view points into.
    pub buffer: BufferId,
    /// The GPU address of the first vertex.
    pub location: GpuVirtualAddress,
    /// Total size of the view in bytes.
    pub size_in_bytes: u32,
    /// Size of one vertex in bytes.
    pub stride_in_bytes: u32,
}

/// A view of an index buffer bound to the input assembler.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IndexBufferView {
    /// The buffer the view points into.
    pub buffer: BufferId,
    /// The GPU address of the first index.
    pub location: GpuVirtualAddress,
    /// Total size of the view in bytes.
    pub size_in_bytes: u32,
    /// The index width.
    pub format: IndexFormat,
}

impl IndexBufferView {
    /// The number of indices covered by the view.
    pub fn index_count(&self) -> u32 {
        self.size_in_bytes / self.format.size_in_bytes()
    }
}
