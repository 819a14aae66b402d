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

//! The demo scene: procedural meshes and textures, and one lane of every
//! kind registered on the agent.

use std::f32::consts::TAU;

use anyhow::Context;
use kiln_agents::render_agent::RenderAgent;
use kiln_core::math::{Mat4, Quat, Vec3, Vec4};
use kiln_core::renderer::{
    GeometryData, GpuDevice, MaterialProperties, PunctualLight, TextureDescriptor,
    TextureDimension, TextureFormat, TextureId,
};
use kiln_lanes::render_lane::{
    AmbientOcclusionLane, BlurLane, ColorLane, GeometryInputs, HeightMappingLane,
    NormalMappingLane, PostProcessLane, PunctualLightLane, SkyBoxLane,
};

use crate::config::SceneConfig;
use crate::mesh::MeshData;

const TEXTURE_SIZE: u32 = 16;
const SKY_SIZE: u32 = 64;

/// GPU resources owned by the scene, destroyed after the agent released its
/// lanes.
#[derive(Debug, Default)]
pub struct DemoScene {
    geometry: Vec<GeometryData>,
    textures: Vec<TextureId>,
}

impl DemoScene {
    /// Uploads the scene and registers its lanes on `agent`.
    pub fn build(agent: &mut RenderAgent, config: &SceneConfig) -> anyhow::Result<Self> {
        let context = agent.context().clone();
        let targets = agent.targets()?.clone();
        let device = context.device.as_ref();
        let mut scene = Self::default();

        // Color-mapped grid of cubes standing on a floor slab.
        let grid = config.grid_size.max(1);
        let mut worlds: Vec<Mat4> = (0..grid * grid)
            .map(|i| {
                let (x, z) = ((i % grid) as f32, (i / grid) as f32);
                let offset = (grid as f32 - 1.0) * 0.5;
                Mat4::from_translation(Vec3::new((x - offset) * 2.0, 0.5, (z - offset) * 2.0))
            })
            .collect();
        worlds.push(Mat4::from_scale_rotation_translation(
            Vec3::new(grid as f32 * 2.0 + 2.0, 0.1, grid as f32 * 2.0 + 2.0),
            Quat::IDENTITY,
            Vec3::new(0.0, -0.1, 0.0),
        ));
        let materials = (0..worlds.len())
            .map(|i| {
                let hue = i as f32 / worlds.len() as f32;
                MaterialProperties::new(Vec4::new(hue, 1.0 - hue, 0.5, 1.0), 0.0, 0.4)
            })
            .collect();
        let cubes = scene.upload(device, "Cube", &MeshData::cube(0.5), worlds)?;
        let mut color = ColorLane::new(context.clone())?;
        color.init(GeometryInputs::new(vec![cubes], materials), &targets)?;
        agent.register_lane(Box::new(color))?;

        // Normal-mapped spheres in a ring around the grid.
        if config.sphere_count > 0 {
            let count = config.sphere_count as usize;
            let radius = grid as f32 + 3.0;
            let worlds = ring(count, radius, 1.0).map(Mat4::from_translation).collect();
            let spheres = scene.upload(device, "Sphere", &MeshData::sphere(0.75, 12, 24), worlds)?;
            let diffuse = scene.textures_2d(device, "Sphere diffuse", count, checker_texels)?;
            let normals = scene.textures_2d(device, "Sphere normals", count, flat_normal_texels)?;
            let mut normal = NormalMappingLane::new(context.clone())?;
            let material = MaterialProperties::new(Vec4::ONE, 0.8, 0.9);
            normal.init(
                GeometryInputs::new(vec![spheres], vec![material; count])
                    .with_texture_scale(config.texture_scale),
                &diffuse,
                &normals,
                &targets,
            )?;
            agent.register_lane(Box::new(normal))?;
        }

        // A tessellated terrain patch behind the grid.
        let terrain_world = Mat4::from_translation(Vec3::new(0.0, 0.0, -(grid as f32 * 2.0 + 8.0)));
        let terrain = scene.upload(device, "Terrain", &MeshData::grid(16.0, 8), vec![terrain_world])?;
        let diffuse = scene.textures_2d(device, "Terrain diffuse", 1, checker_texels)?;
        let normals = scene.textures_2d(device, "Terrain normals", 1, flat_normal_texels)?;
        let heights = scene.textures_2d(device, "Terrain heights", 1, ridge_texels)?;
        let mut height = HeightMappingLane::new(context.clone())?;
        height.init(
            GeometryInputs::new(vec![terrain], vec![MaterialProperties::new(Vec4::ONE, 0.0, 0.2)])
                .with_texture_scale(config.texture_scale),
            &diffuse,
            &normals,
            &heights,
            &targets,
        )?;
        agent.register_lane(Box::new(height))?;

        // Lights in a ring above the scene.
        let light_count = config.light_count.max(1) as usize;
        let lights: Vec<PunctualLight> = ring(light_count, grid as f32 + 1.0, 4.0)
            .enumerate()
            .map(|(i, position)| {
                let t = i as f32 / light_count as f32;
                PunctualLight::new(position, 12.0, Vec3::new(1.0, 0.6 + 0.4 * t, 1.0 - t), 8.0)
            })
            .collect();
        let mut light = PunctualLightLane::new(context.clone())?;
        light.init(&lights, &targets)?;
        agent.register_lane(Box::new(light))?;

        let mut occlusion = AmbientOcclusionLane::new(context.clone())?;
        occlusion.init(&targets)?;
        agent.register_lane(Box::new(occlusion))?;

        let mut blur = BlurLane::new(context.clone())?;
        blur.init(&targets)?;
        agent.register_lane(Box::new(blur))?;

        let sky_sphere = scene.upload(
            device,
            "Sky sphere",
            &MeshData::sphere(1.0, 8, 16),
            vec![Mat4::from_scale(Vec3::splat(500.0))],
        )?;
        let cube_map = scene.texture(
            device,
            "Sky cube map",
            SKY_SIZE,
            TextureDimension::Cube,
            &sky_texels(SKY_SIZE),
        )?;
        let mut sky = SkyBoxLane::new(context.clone())?;
        sky.init(sky_sphere, cube_map, &targets)?;
        agent.register_lane(Box::new(sky))?;

        let mut post = PostProcessLane::new(context)?;
        post.init(&targets)?;
        agent.register_lane(Box::new(post))?;

        log::info!(
            "DemoScene: {} lanes, {} meshes, {} textures",
            agent.lanes().len(),
            scene.geometry.len(),
            scene.textures.len()
        );
        Ok(scene)
    }

    /// Destroys the meshes and textures. The GPU must be idle.
    pub fn release(self, device: &dyn GpuDevice) {
        for geometry in &self.geometry {
            geometry.destroy_buffers(device);
        }
        for texture in self.textures {
            if let Err(e) = device.destroy_texture(texture) {
                log::warn!("DemoScene: failed to destroy {texture:?}: {e}");
            }
        }
    }

    fn upload(
        &mut self,
        device: &dyn GpuDevice,
        label: &str,
        mesh: &MeshData,
        world_matrices: Vec<Mat4>,
    ) -> anyhow::Result<GeometryData> {
        let geometry = GeometryData::upload(
            device,
            label,
            mesh.vertex_bytes(),
            MeshData::STRIDE,
            &mesh.indices,
            world_matrices,
        )
        .with_context(|| format!("failed to upload mesh {label}"))?;
        self.geometry.push(geometry.clone());
        Ok(geometry)
    }

    fn texture(
        &mut self,
        device: &dyn GpuDevice,
        label: &str,
        size: u32,
        dimension: TextureDimension,
        texels: &[u8],
    ) -> anyhow::Result<TextureId> {
        let texture = device
            .create_texture(
                &TextureDescriptor {
                    label: Some(label.to_string()),
                    width: size,
                    height: size,
                    mip_level_count: 1,
                    format: TextureFormat::Rgba8Unorm,
                    dimension,
                },
                Some(texels),
            )
            .with_context(|| format!("failed to create texture {label}"))?;
        self.textures.push(texture);
        Ok(texture)
    }

    fn textures_2d(
        &mut self,
        device: &dyn GpuDevice,
        label: &str,
        count: usize,
        texels: fn(u32) -> Vec<u8>,
    ) -> anyhow::Result<Vec<TextureId>> {
        let data = texels(TEXTURE_SIZE);
        (0..count)
            .map(|i| {
                self.texture(
                    device,
                    &format!("{label} {i}"),
                    TEXTURE_SIZE,
                    TextureDimension::D2,
                    &data,
                )
            })
            .collect()
    }
}

/// `count` points evenly spaced on a horizontal circle at `height`.
fn ring(count: usize, radius: f32, height: f32) -> impl Iterator<Item = Vec3> {
    (0..count).map(move |i| {
        let angle = i as f32 / count as f32 * TAU;
        Vec3::new(angle.cos() * radius, height, angle.sin() * radius)
    })
}

fn rgba_texels(size: u32, texel: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
    (0..size * size)
        .flat_map(|i| texel(i % size, i / size))
        .collect()
}

fn checker_texels(size: u32) -> Vec<u8> {
    rgba_texels(size, |x, y| {
        if (x / 4 + y / 4) % 2 == 0 {
            [220, 220, 220, 255]
        } else {
            [60, 60, 60, 255]
        }
    })
}

fn flat_normal_texels(size: u32) -> Vec<u8> {
    rgba_texels(size, |_, _| [128, 128, 255, 255])
}

fn ridge_texels(size: u32) -> Vec<u8> {
    rgba_texels(size, |x, y| {
        let h = ((x as f32 / size as f32 * TAU).sin() * (y as f32 / size as f32 * TAU).cos())
            .mul_add(0.5, 0.5);
        let h = (h * 255.0) as u8;
        [h, h, h, 255]
    })
}

/// Six faces blending from a horizon color to a zenith color.
fn sky_texels(size: u32) -> Vec<u8> {
    let face = rgba_texels(size, |_, y| {
        let t = y as f32 / size as f32;
        [(90.0 + 100.0 * t) as u8, (140.0 + 80.0 * t) as u8, 230, 255]
    });
    face.repeat(6)
}
