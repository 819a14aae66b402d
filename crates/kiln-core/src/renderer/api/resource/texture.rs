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

use serde::{Deserialize, Serialize};

/// An opaque handle to a GPU texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Pixel formats used by render targets and sampled textures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    /// 8-bit RGBA, normalized.
    Rgba8Unorm,
    /// 8-bit RGBA, normalized, sRGB encoded.
    Rgba8UnormSrgb,
    /// 8-bit BGRA, normalized.
    Bgra8Unorm,
    /// 10-bit RGB with 2-bit alpha, normalized.
    Rgb10A2Unorm,
    /// Single 16-bit normalized channel.
    R16Unorm,
    /// Single 16-bit float channel.
    R16Float,
    /// Two 16-bit float channels.
    Rg16Float,
    /// Four 16-bit float channels.
    Rgba16Float,
    /// Single 32-bit float channel.
    R32Float,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24UnormStencil8,
}

impl TextureFormat {
    /// Whether the format can back a depth-stencil view.
    pub fn is_depth_stencil(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24UnormStencil8
        )
    }

    /// Size of one texel in bytes.
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::R16Unorm | TextureFormat::R16Float => 2,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Rgb10A2Unorm
            | TextureFormat::Rg16Float
            | TextureFormat::R32Float
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24UnormStencil8 => 4,
            TextureFormat::Rgba16Float => 8,
        }
    }
}

/// The shape of a texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    /// A 2D texture (or 2D array).
    D2,
    /// A cube map with six faces.
    Cube,
}

/// Describes a texture to create.
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    /// An optional debug label.
    pub label: Option<String>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Number of mip levels.
    pub mip_level_count: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Shape of the texture.
    pub dimension: TextureDimension,
}

/// The properties a shader resource view needs from an existing texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    /// Texel format.
    pub format: TextureFormat,
    /// Number of mip levels.
    pub mip_level_count: u32,
    /// Shape of the texture.
    pub dimension: TextureDimension,
}
