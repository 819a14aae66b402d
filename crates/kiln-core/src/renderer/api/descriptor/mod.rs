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

//! Descriptor handles, view descriptors, and the shader-visible heap arena.

mod arena;

pub use self::arena::{DescriptorArena, DescriptorRange};

use crate::renderer::api::resource::{GpuVirtualAddress, TextureDimension, TextureFormat, TextureInfo};

/// An opaque handle to a shader-visible descriptor heap.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorHeapId(pub u64);

/// The CPU-side address of a descriptor slot, used when writing views.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuDescriptorHandle(pub u64);

impl CpuDescriptorHandle {
    /// The null handle.
    pub const NULL: CpuDescriptorHandle = CpuDescriptorHandle(0);

    /// Whether this handle is null.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The handle `slots` descriptors further, given the heap increment.
    #[inline]
    pub fn offset(self, slots: u32, increment: u32) -> Self {
        CpuDescriptorHandle(self.0 + slots as u64 * increment as u64)
    }
}

/// The GPU-side address of a descriptor slot, used when binding tables.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuDescriptorHandle(pub u64);

impl GpuDescriptorHandle {
    /// The null handle.
    pub const NULL: GpuDescriptorHandle = GpuDescriptorHandle(0);

    /// Whether this handle is null.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The handle `slots` descriptors further, given the heap increment.
    #[inline]
    pub fn offset(self, slots: u32, increment: u32) -> Self {
        GpuDescriptorHandle(self.0 + slots as u64 * increment as u64)
    }
}

/// Describes a constant buffer view.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ConstantBufferViewDescriptor {
    /// GPU address of the first byte; must be 256-byte aligned.
    pub location: GpuVirtualAddress,
    /// Size of the view; must be a multiple of 256.
    pub size_in_bytes: u32,
}

/// The shape a shader resource view presents to shaders.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderResourceViewDimension {
    /// `Texture2D`.
    Texture2D,
    /// `TextureCube`.
    TextureCube,
}

/// Describes a shader resource view of a texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShaderResourceViewDescriptor {
    /// The format the shader reads the texture as.
    pub format: TextureFormat,
    /// The view dimension.
    pub dimension: ShaderResourceViewDimension,
    /// The first mip visible to the view.
    pub most_detailed_mip: u32,
    /// The number of visible mips.
    pub mip_levels: u32,
}

impl ShaderResourceViewDescriptor {
    /// A view of every mip of a texture, in its own format and dimension.
    ///
    /// Depth formats are read as their single float channel.
    pub fn for_texture(info: &TextureInfo) -> Self {
        let format = match info.format {
            TextureFormat::Depth32Float | TextureFormat::Depth24UnormStencil8 => {
                TextureFormat::R32Float
            }
            other => other,
        };
        let dimension = match info.dimension {
            TextureDimension::D2 => ShaderResourceViewDimension::Texture2D,
            TextureDimension::Cube => ShaderResourceViewDimension::TextureCube,
        };
        Self {
            format,
            dimension,
            most_detailed_mip: 0,
            mip_levels: info.mip_level_count,
        }
    }
}
