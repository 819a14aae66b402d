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

//! Headless kiln runtime.
//!
//! Builds a deferred demo scene on the emulated GPU and renders a fixed
//! number of frames through the render agent, `K` frames in flight.

mod config;
mod mesh;
mod report;
mod scene;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use kiln_agents::render_agent::{FrameReport, RenderAgent};
use kiln_core::lane::Lane;
use kiln_core::math::{Mat4, Vec3};
use kiln_core::renderer::{
    CpuDescriptorHandle, FrameConstants, GpuContext, GpuDevice, RendererSettings,
    ShaderLoader, TextureDescriptor, TextureDimension,
};
use kiln_infra::{FileShaderLoader, HeadlessDevice, InMemoryShaderLoader};
use kiln_lanes::render_lane::pipelines;

use crate::config::RuntimeConfig;
use crate::report::{FrameSummary, RunReport};
use crate::scene::DemoScene;

const SWAP_CHAIN_BUFFERS: usize = 2;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// RON configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frames to render.
    #[arg(short, long, default_value_t = 10)]
    frames: u64,

    /// Write a JSON run report to this path.
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Directory of compiled shader blobs. Placeholder blobs are used when
    /// omitted.
    #[arg(short, long)]
    shaders: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = RuntimeConfig::load(args.config.as_deref())?;
    run(&args, config)
}

fn run(args: &Args, config: RuntimeConfig) -> anyhow::Result<()> {
    let device = HeadlessDevice::with_config(config.gpu.into());
    let shaders = shader_loader(args, &config.renderer);
    let settings = config.renderer.clone();
    let context = GpuContext::new(Arc::new(device.clone()), shaders, settings.clone())
        .context("failed to create the GPU context")?;

    let back_buffers = create_back_buffers(&device, &settings)?;
    let mut agent = RenderAgent::new(context)?;
    let scene = DemoScene::build(&mut agent, &config.scene)?;
    let lanes = agent
        .lanes()
        .all()
        .iter()
        .map(|lane| lane.strategy_name().to_string())
        .collect();

    let rendered = render_frames(&mut agent, &settings, &back_buffers, args.frames);

    agent.release()?;
    scene.release(&device);
    let frames = rendered?;

    let stats = device.stats();
    println!(
        "rendered {} frames: {} batches, {} lists, {} draws, {} clears, {} fence waits, {} validation errors",
        frames.len(),
        stats.batches,
        stats.lists_executed,
        stats.draw_calls,
        stats.clears,
        stats.fence_waits,
        stats.validation_errors
    );
    for error in device.validation_errors() {
        log::error!("{error}");
    }

    if let Some(path) = &args.report {
        RunReport {
            queued_frame_count: settings.queued_frame_count,
            lanes,
            frames: frames.iter().map(FrameSummary::from).collect(),
            device: stats.into(),
        }
        .write(path)?;
    }
    Ok(())
}

fn shader_loader(args: &Args, settings: &RendererSettings) -> Arc<dyn ShaderLoader> {
    match &args.shaders {
        Some(root) => {
            log::info!("Loading shaders from {}", root.display());
            Arc::new(FileShaderLoader::new(root))
        }
        None => {
            let loader = InMemoryShaderLoader::new();
            let paths = pipelines::shader_paths(settings);
            loader.register_placeholders(paths.iter().map(String::as_str));
            log::info!("Using {} placeholder shader blobs", paths.len());
            Arc::new(loader)
        }
    }
}

fn create_back_buffers(
    device: &HeadlessDevice,
    settings: &RendererSettings,
) -> anyhow::Result<Vec<CpuDescriptorHandle>> {
    (0..SWAP_CHAIN_BUFFERS)
        .map(|i| {
            let texture = device.create_texture(
                &TextureDescriptor {
                    label: Some(format!("Back buffer {i}")),
                    width: settings.width,
                    height: settings.height,
                    mip_level_count: 1,
                    format: settings.frame_buffer_format,
                    dimension: TextureDimension::D2,
                },
                None,
            )?;
            Ok(device.create_render_target_view(texture)?)
        })
        .collect()
}

/// Camera constants for a slow orbit around the scene origin.
fn orbit_camera(settings: &RendererSettings, frame: u64) -> FrameConstants {
    let angle = frame as f32 * 0.05;
    let eye = Vec3::new(angle.cos() * 14.0, 6.0, angle.sin() * 14.0);
    let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
    let aspect = settings.width as f32 / settings.height as f32;
    let projection = Mat4::perspective_rh(
        std::f32::consts::FRAC_PI_4,
        aspect,
        settings.near_plane,
        settings.far_plane,
    );
    FrameConstants::new(view, projection, eye)
}

fn render_frames(
    agent: &mut RenderAgent,
    settings: &RendererSettings,
    back_buffers: &[CpuDescriptorHandle],
    frames: u64,
) -> anyhow::Result<Vec<FrameReport>> {
    let mut reports = Vec::with_capacity(frames as usize);
    for frame in 0..frames {
        let constants = orbit_camera(settings, frame);
        let back_buffer = back_buffers[frame as usize % back_buffers.len()];
        let report = agent
            .render_frame(&constants, back_buffer)
            .with_context(|| format!("frame {frame} failed"))?;
        log::info!(
            "frame {} slot {}: {} lists, fence {:?}, {:?}",
            report.frame_number,
            report.slot,
            report.lists_submitted(),
            report.fence,
            report.cpu_time
        );
        reports.push(report);
    }
    agent.flush()?;
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;

    fn small_config() -> RuntimeConfig {
        RuntimeConfig {
            renderer: RendererSettings {
                width: 64,
                height: 32,
                descriptor_heap_capacity: 256,
                ..Default::default()
            },
            scene: SceneConfig {
                grid_size: 2,
                sphere_count: 2,
                light_count: 3,
                texture_scale: 1.0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn the_demo_renders_every_stage_without_validation_errors() {
        let config = small_config();
        let device = HeadlessDevice::with_config(config.gpu.into());
        let args = Args::parse_from(["kiln-runtime"]);
        let shaders = shader_loader(&args, &config.renderer);
        let context =
            GpuContext::new(Arc::new(device.clone()), shaders, config.renderer.clone()).unwrap();
        let back_buffers = create_back_buffers(&device, &config.renderer).unwrap();

        let mut agent = RenderAgent::new(context).unwrap();
        let scene = DemoScene::build(&mut agent, &config.scene).unwrap();
        assert_eq!(agent.lanes().len(), 8);

        let reports = render_frames(&mut agent, &config.renderer, &back_buffers, 4).unwrap();
        assert_eq!(reports.len(), 4);
        // Two clears, eight lanes.
        assert!(reports.iter().all(|r| r.lists_submitted() == 10));
        assert_eq!(device.validation_errors(), Vec::<String>::new());

        agent.release().unwrap();
        scene.release(&device);
        assert_eq!(device.allocated_buffer_bytes(), 0);
    }

    #[test]
    fn the_camera_orbits_the_origin() {
        let settings = RendererSettings::default();
        let a = orbit_camera(&settings, 0);
        let b = orbit_camera(&settings, 10);
        assert_ne!(a.eye_position, b.eye_position);
        assert!((a.eye_position.truncate().length() - b.eye_position.truncate().length()).abs() < 1e-4);
    }

    #[test]
    fn arguments_have_sensible_defaults() {
        let args = Args::parse_from(["kiln-runtime", "--frames", "3"]);
        assert_eq!(args.frames, 3);
        assert!(args.config.is_none() && args.report.is_none());
    }
}
