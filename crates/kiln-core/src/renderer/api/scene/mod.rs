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

//! Scene-side inputs consumed by lanes: geometry instances and the constant
//! payloads uploaded to the GPU.

mod constants;

pub use self::constants::*;

use crate::math::Mat4;
use crate::renderer::api::resource::{
    BufferDescriptor, IndexBufferView, IndexFormat, MemoryLocation, VertexBufferView,
};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GpuDevice;

/// One mesh drawn once per world matrix.
#[derive(Debug, Clone)]
pub struct GeometryData {
    /// The mesh vertices.
    pub vertex_buffer: VertexBufferView,
    /// The mesh indices.
    pub index_buffer: IndexBufferView,
    /// One world transform per drawn instance.
    pub world_matrices: Vec<Mat4>,
}

impl GeometryData {
    /// Creates device-local vertex and index buffers for a mesh with 32-bit
    /// indices.
    pub fn upload(
        device: &dyn GpuDevice,
        label: &str,
        vertices: &[u8],
        vertex_stride: u32,
        indices: &[u32],
        world_matrices: Vec<Mat4>,
    ) -> Result<Self, ResourceError> {
        let vertex_buffer = device.create_buffer_with_data(
            &BufferDescriptor {
                label: Some(format!("{label} vertices")),
                size: vertices.len() as u64,
                memory: MemoryLocation::DeviceLocal,
            },
            vertices,
        )?;
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let index_buffer = device.create_buffer_with_data(
            &BufferDescriptor {
                label: Some(format!("{label} indices")),
                size: index_bytes.len() as u64,
                memory: MemoryLocation::DeviceLocal,
            },
            index_bytes,
        )?;

        Ok(Self {
            vertex_buffer: VertexBufferView {
                buffer: vertex_buffer,
                location: device.buffer_gpu_address(vertex_buffer)?,
                size_in_bytes: vertices.len() as u32,
                stride_in_bytes: vertex_stride,
            },
            index_buffer: IndexBufferView {
                buffer: index_buffer,
                location: device.buffer_gpu_address(index_buffer)?,
                size_in_bytes: index_bytes.len() as u32,
                format: IndexFormat::Uint32,
            },
            world_matrices,
        })
    }

    /// Destroys the vertex and index buffers.
    pub fn destroy_buffers(&self, device: &dyn GpuDevice) {
        for buffer in [self.vertex_buffer.buffer, self.index_buffer.buffer] {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!("GeometryData: failed to destroy {buffer:?}: {e}");
            }
        }
    }

    /// Number of indices drawn per instance.
    pub fn index_count(&self) -> u32 {
        self.index_buffer.index_count()
    }

    /// Number of instances.
    pub fn instance_count(&self) -> u32 {
        self.world_matrices.len() as u32
    }
}

/// Total number of instances over a list of geometry entries.
pub fn total_instance_count(geometry: &[GeometryData]) -> u32 {
    geometry.iter().map(GeometryData::instance_count).sum()
}
