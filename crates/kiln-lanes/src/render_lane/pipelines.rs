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

//! Symbolic pipeline names and the descriptors they are built from.
//!
//! Each lane type draws with exactly one pipeline. The descriptors depend on
//! the renderer settings only through render target formats.

use kiln_core::renderer::{
    BlendMode, CullMode, DepthStencilMode, InputLayout, PipelineStateDescriptor,
    PrimitiveTopologyType, RendererSettings, ShaderStages, TextureFormat,
};

/// Geometry buffers written by opaque geometry without textures.
pub const COLOR_MAPPING: &str = "GeometryPass/ColorMapping";
/// Geometry buffers written by geometry with diffuse and normal maps.
pub const NORMAL_MAPPING: &str = "GeometryPass/NormalMapping";
/// Geometry buffers written by tessellated, displaced geometry.
pub const HEIGHT_MAPPING: &str = "GeometryPass/HeightMapping";
/// Additive accumulation of point lights into the color buffer.
pub const PUNCTUAL_LIGHT: &str = "LightPass/PunctualLight";
/// Screen-space ambient accessibility.
pub const AMBIENT_OCCLUSION: &str = "AmbientLightPass/AmbientOcclusion";
/// Box blur of the ambient accessibility buffer.
pub const BLUR: &str = "AmbientLightPass/Blur";
/// Cube-mapped sky behind the scene.
pub const SKY_BOX: &str = "SkyBoxPass/SkyBox";
/// Tone mapping into the back buffer.
pub const POST_PROCESS: &str = "PostProcessPass/PostProcess";

fn stages(name: &str, tessellated: bool) -> ShaderStages {
    let path = |stage: &str| Some(format!("{name}/Shaders/{stage}.cso"));
    ShaderStages {
        vertex: path("VS"),
        hull: if tessellated { path("HS") } else { None },
        domain: if tessellated { path("DS") } else { None },
        geometry: None,
        pixel: path("PS"),
    }
}

fn binding_signature(name: &str) -> Option<String> {
    Some(format!("{name}/Shaders/RS.cso"))
}

fn geometry_pass(name: &str, settings: &RendererSettings, tessellated: bool) -> PipelineStateDescriptor {
    PipelineStateDescriptor {
        shaders: stages(name, tessellated),
        binding_signature: binding_signature(name),
        input_layout: InputLayout::PositionNormalTangentUv,
        topology_type: if tessellated {
            PrimitiveTopologyType::Patch
        } else {
            PrimitiveTopologyType::Triangle
        },
        render_target_formats: settings.geometry_buffer_formats.clone(),
        depth_stencil_format: Some(settings.depth_stencil_format),
        depth_stencil: DepthStencilMode::ReadWrite,
        blend: BlendMode::Opaque,
        cull: CullMode::Back,
    }
}

fn full_screen_pass(name: &str, target: TextureFormat, blend: BlendMode) -> PipelineStateDescriptor {
    PipelineStateDescriptor {
        shaders: stages(name, false),
        binding_signature: binding_signature(name),
        input_layout: InputLayout::None,
        topology_type: PrimitiveTopologyType::Triangle,
        render_target_formats: vec![target],
        depth_stencil_format: None,
        depth_stencil: DepthStencilMode::Disabled,
        blend,
        cull: CullMode::None,
    }
}

/// The color-mapping geometry pipeline.
pub fn color_mapping(settings: &RendererSettings) -> PipelineStateDescriptor {
    geometry_pass(COLOR_MAPPING, settings, false)
}

/// The normal-mapping geometry pipeline.
pub fn normal_mapping(settings: &RendererSettings) -> PipelineStateDescriptor {
    geometry_pass(NORMAL_MAPPING, settings, false)
}

/// The height-mapping geometry pipeline, with hull and domain stages.
pub fn height_mapping(settings: &RendererSettings) -> PipelineStateDescriptor {
    geometry_pass(HEIGHT_MAPPING, settings, true)
}

/// The punctual light pipeline.
pub fn punctual_light(settings: &RendererSettings) -> PipelineStateDescriptor {
    full_screen_pass(PUNCTUAL_LIGHT, settings.color_buffer_format, BlendMode::Additive)
}

/// The ambient occlusion pipeline.
pub fn ambient_occlusion(settings: &RendererSettings) -> PipelineStateDescriptor {
    full_screen_pass(
        AMBIENT_OCCLUSION,
        settings.ambient_accessibility_format,
        BlendMode::Opaque,
    )
}

/// The blur pipeline.
pub fn blur(settings: &RendererSettings) -> PipelineStateDescriptor {
    full_screen_pass(BLUR, settings.ambient_accessibility_format, BlendMode::Opaque)
}

/// The sky box pipeline. It tests against the scene depth without writing it.
pub fn sky_box(settings: &RendererSettings) -> PipelineStateDescriptor {
    PipelineStateDescriptor {
        shaders: stages(SKY_BOX, false),
        binding_signature: binding_signature(SKY_BOX),
        input_layout: InputLayout::PositionNormalTangentUv,
        topology_type: PrimitiveTopologyType::Triangle,
        render_target_formats: vec![settings.color_buffer_format],
        depth_stencil_format: Some(settings.depth_stencil_format),
        depth_stencil: DepthStencilMode::ReadOnlyLessEqual,
        blend: BlendMode::Opaque,
        // The camera sits inside the sphere.
        cull: CullMode::None,
    }
}

/// The post-process pipeline.
pub fn post_process(settings: &RendererSettings) -> PipelineStateDescriptor {
    full_screen_pass(POST_PROCESS, settings.frame_buffer_format, BlendMode::Opaque)
}

/// Every pipeline name with its descriptor, for tools that preload blobs.
pub fn all(settings: &RendererSettings) -> Vec<(&'static str, PipelineStateDescriptor)> {
    vec![
        (COLOR_MAPPING, color_mapping(settings)),
        (NORMAL_MAPPING, normal_mapping(settings)),
        (HEIGHT_MAPPING, height_mapping(settings)),
        (PUNCTUAL_LIGHT, punctual_light(settings)),
        (AMBIENT_OCCLUSION, ambient_occlusion(settings)),
        (BLUR, blur(settings)),
        (SKY_BOX, sky_box(settings)),
        (POST_PROCESS, post_process(settings)),
    ]
}

/// Every shader and binding signature path the pipelines above load.
pub fn shader_paths(settings: &RendererSettings) -> Vec<String> {
    let mut paths: Vec<String> = all(settings)
        .iter()
        .flat_map(|(_, descriptor)| {
            descriptor
                .shaders
                .paths()
                .chain(descriptor.binding_signature.as_deref())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_descriptor_validates() {
        let settings = RendererSettings::default();
        for (name, descriptor) in all(&settings) {
            assert!(descriptor.validate(name).is_ok(), "{name} is invalid");
        }
    }

    #[test]
    fn only_height_mapping_is_tessellated() {
        let settings = RendererSettings::default();
        for (name, descriptor) in all(&settings) {
            let tessellated = descriptor.topology_type == PrimitiveTopologyType::Patch;
            assert_eq!(tessellated, name == HEIGHT_MAPPING, "{name}");
            assert_eq!(descriptor.shaders.hull.is_some(), tessellated);
        }
    }

    #[test]
    fn post_process_targets_the_back_buffer_format() {
        let settings = RendererSettings {
            frame_buffer_format: TextureFormat::Bgra8Unorm,
            ..Default::default()
        };
        assert_eq!(
            post_process(&settings).render_target_formats,
            vec![TextureFormat::Bgra8Unorm]
        );
    }

    #[test]
    fn shader_paths_cover_every_stage_once() {
        let paths = shader_paths(&RendererSettings::default());
        assert!(paths.contains(&format!("{HEIGHT_MAPPING}/Shaders/HS.cso")));
        assert!(paths.contains(&format!("{POST_PROCESS}/Shaders/RS.cso")));
        // 8 pipelines x (VS, PS, RS) + HS and DS for height mapping.
        assert_eq!(paths.len(), 8 * 3 + 2);
    }
}
