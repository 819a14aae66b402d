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

use super::BindingSignatureId;
use crate::renderer::api::resource::TextureFormat;
use crate::renderer::error::PipelineError;

/// The maximum number of simultaneously bound color targets.
pub const MAX_RENDER_TARGETS: usize = 8;

/// The class of primitives a pipeline rasterizes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveTopologyType {
    /// Triangles.
    Triangle,
    /// Tessellation control-point patches.
    Patch,
}

/// The exact input assembler topology set on a command list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    /// A list of independent triangles.
    TriangleList,
    /// Patches of three control points.
    PatchList3,
}

impl PrimitiveTopology {
    /// The topology class a pipeline must be built for to use this topology.
    pub fn topology_type(self) -> PrimitiveTopologyType {
        match self {
            PrimitiveTopology::TriangleList => PrimitiveTopologyType::Triangle,
            PrimitiveTopology::PatchList3 => PrimitiveTopologyType::Patch,
        }
    }
}

/// The vertex layout a pipeline expects.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InputLayout {
    /// No vertex input; vertices are generated from `SV_VertexID`.
    None,
    /// Position (float3), normal (float3), tangent (float3), texture coordinates (float2).
    PositionNormalTangentUv,
}

/// Depth test configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DepthStencilMode {
    /// No depth test or write.
    Disabled,
    /// `Less` test with depth writes.
    ReadWrite,
    /// `LessEqual` test without depth writes.
    ReadOnlyLessEqual,
}

/// Color blending configuration, applied to every target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Overwrite the target.
    Opaque,
    /// Add to the target.
    Additive,
}

/// Face culling configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// Draw every face.
    None,
    /// Cull back faces.
    Back,
    /// Cull front faces (used when the camera is inside the mesh).
    Front,
}

/// Paths of the compiled shader blobs per stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderStages {
    /// Vertex shader.
    pub vertex: Option<String>,
    /// Hull shader.
    pub hull: Option<String>,
    /// Domain shader.
    pub domain: Option<String>,
    /// Geometry shader.
    pub geometry: Option<String>,
    /// Pixel shader.
    pub pixel: Option<String>,
}

impl ShaderStages {
    /// Every stage path that is set, in pipeline order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        [
            &self.vertex,
            &self.hull,
            &self.domain,
            &self.geometry,
            &self.pixel,
        ]
        .into_iter()
        .filter_map(|s| s.as_deref())
    }
}

/// Everything needed to build a pipeline state object.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStateDescriptor {
    /// Shader blobs per stage.
    pub shaders: ShaderStages,
    /// Path of the serialized binding signature blob.
    pub binding_signature: Option<String>,
    /// The vertex layout.
    pub input_layout: InputLayout,
    /// The topology class.
    pub topology_type: PrimitiveTopologyType,
    /// Formats of the color targets, in slot order.
    pub render_target_formats: Vec<TextureFormat>,
    /// Format of the depth-stencil target, if any.
    pub depth_stencil_format: Option<TextureFormat>,
    /// Depth test configuration.
    pub depth_stencil: DepthStencilMode,
    /// Blending configuration.
    pub blend: BlendMode,
    /// Culling configuration.
    pub cull: CullMode,
}

impl PipelineStateDescriptor {
    /// Checks that the descriptor names all data a pipeline needs.
    pub fn validate(&self, name: &str) -> Result<(), PipelineError> {
        if self.shaders.vertex.is_none() {
            return Err(PipelineError::MissingVertexShader {
                name: name.to_string(),
            });
        }
        if self.binding_signature.is_none() {
            return Err(PipelineError::MissingBindingSignature {
                name: name.to_string(),
            });
        }
        if self.render_target_formats.is_empty() && self.depth_stencil_format.is_none() {
            return Err(PipelineError::MissingRenderTargets {
                name: name.to_string(),
            });
        }
        if self.render_target_formats.len() > MAX_RENDER_TARGETS {
            return Err(PipelineError::TooManyRenderTargets {
                name: name.to_string(),
                count: self.render_target_formats.len(),
            });
        }

        let has_hull = self.shaders.hull.is_some();
        let has_domain = self.shaders.domain.is_some();
        let is_patch = self.topology_type == PrimitiveTopologyType::Patch;
        if has_hull != has_domain || has_hull != is_patch {
            return Err(PipelineError::InconsistentTessellation {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// A pipeline descriptor with every blob resolved, handed to the device.
#[derive(Debug, Clone, Copy)]
pub struct PipelineStateCreateInfo<'a> {
    /// The symbolic name, used as debug label.
    pub label: &'a str,
    /// The source descriptor.
    pub descriptor: &'a PipelineStateDescriptor,
    /// The binding signature created from `descriptor.binding_signature`.
    pub binding_signature: BindingSignatureId,
    /// Vertex shader bytecode.
    pub vertex_shader: &'a [u8],
    /// Hull shader bytecode.
    pub hull_shader: Option<&'a [u8]>,
    /// Domain shader bytecode.
    pub domain_shader: Option<&'a [u8]>,
    /// Geometry shader bytecode.
    pub geometry_shader: Option<&'a [u8]>,
    /// Pixel shader bytecode.
    pub pixel_shader: Option<&'a [u8]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_descriptor() -> PipelineStateDescriptor {
        PipelineStateDescriptor {
            shaders: ShaderStages {
                vertex: Some("color_vs.cso".into()),
                pixel: Some("color_ps.cso".into()),
                ..Default::default()
            },
            binding_signature: Some("color_rs.cso".into()),
            input_layout: InputLayout::PositionNormalTangentUv,
            topology_type: PrimitiveTopologyType::Triangle,
            render_target_formats: vec![TextureFormat::Rgba16Float],
            depth_stencil_format: Some(TextureFormat::Depth24UnormStencil8),
            depth_stencil: DepthStencilMode::ReadWrite,
            blend: BlendMode::Opaque,
            cull: CullMode::Back,
        }
    }

    #[test]
    fn complete_descriptor_validates() {
        assert!(color_descriptor().validate("color").is_ok());
        assert_eq!(color_descriptor().shaders.paths().count(), 2);
    }

    #[test]
    fn missing_render_targets_is_rejected() {
        let mut desc = color_descriptor();
        desc.render_target_formats.clear();
        desc.depth_stencil_format = None;
        assert!(matches!(
            desc.validate("color"),
            Err(PipelineError::MissingRenderTargets { .. })
        ));
    }

    #[test]
    fn tessellation_requires_patch_topology() {
        let mut desc = color_descriptor();
        desc.shaders.hull = Some("height_hs.cso".into());
        desc.shaders.domain = Some("height_ds.cso".into());
        assert!(matches!(
            desc.validate("height"),
            Err(PipelineError::InconsistentTessellation { .. })
        ));
        desc.topology_type = PrimitiveTopologyType::Patch;
        assert!(desc.validate("height").is_ok());
    }
}
