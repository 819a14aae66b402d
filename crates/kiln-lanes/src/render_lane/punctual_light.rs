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

//! Accumulates point lights into the color buffer.
//!
//! Every light is one full-screen draw that reads the geometry buffers and
//! the depth buffer and blends additively. The light's constants are bound
//! through a one-descriptor table that advances by one slot per light.

use std::any::Any;
use std::sync::Arc;

use kiln_core::lane::{Lane, LaneError, LaneKind};
use kiln_core::math::Vec4;
use kiln_core::renderer::{
    CommandListKind, CommandListSet, CpuDescriptorHandle, DescriptorRange, FrameConstants,
    FrameContext, GpuContext, ImmutableConstants, PipelineError, PipelineState,
    PipelineStateCache, PrimitiveTopology, PunctualLight, RendererSettings, UploadBuffer,
    UploadBufferGuard,
};
use thiserror::Error;

use super::{
    bind_pass_state, pipelines, resolve_texture_views, write_texture_views, RenderLane,
    RenderTargets, FULL_SCREEN_VERTEX_COUNT,
};

// Binding signature:
// 0: geometry buffers + depth table, 1: light constants table,
// 2: frame constants, 3: immutable constants.
const SURFACE_PARAMETER: u32 = 0;
const LIGHT_PARAMETER: u32 = 1;
const FRAME_PARAMETER: u32 = 2;
const IMMUTABLE_PARAMETER: u32 = 3;

/// Invalid light list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LightInputError {
    /// The lane was given no light.
    #[error("no punctual lights were provided")]
    NoLights,
}

#[derive(Debug)]
struct PunctualLightData {
    surface: DescriptorRange,
    lights: DescriptorRange,
    light_constants: UploadBuffer,
    immutable_constants: UploadBuffer,
    frame_constants: UploadBuffer,
    color_buffer: CpuDescriptorHandle,
}

/// Shades the geometry buffers with a list of punctual lights.
#[derive(Debug)]
pub struct PunctualLightLane {
    context: GpuContext,
    pipeline: Arc<PipelineState>,
    commands: CommandListSet,
    data: Option<PunctualLightData>,
}

impl PunctualLightLane {
    /// The lane's name, used in logs and the lane registry.
    pub const NAME: &'static str = "PunctualLight";

    /// Builds or fetches the pipeline shared by every `PunctualLightLane`.
    pub fn init_pipeline_state(
        cache: &PipelineStateCache,
        settings: &RendererSettings,
    ) -> Result<Arc<PipelineState>, PipelineError> {
        cache.get_or_create(pipelines::PUNCTUAL_LIGHT, &pipelines::punctual_light(settings))
    }

    /// Creates an uninitialized lane with its command allocators.
    pub fn new(context: GpuContext) -> Result<Self, LaneError> {
        let pipeline = Self::init_pipeline_state(&context.pipelines, &context.settings)?;
        let commands = CommandListSet::new(
            context.device.as_ref(),
            CommandListKind::Direct,
            context.queued_frame_count(),
            Self::NAME,
        )?;
        Ok(Self {
            context,
            pipeline,
            commands,
            data: None,
        })
    }

    /// Uploads the lights and creates views of the geometry buffers and the
    /// depth buffer.
    pub fn init(&mut self, lights: &[PunctualLight], targets: &RenderTargets) -> Result<(), LaneError> {
        if self.data.is_some() {
            return Err(LaneError::AlreadyInitialized { lane: Self::NAME });
        }
        if lights.is_empty() {
            return Err(LaneError::invalid_input(Self::NAME, LightInputError::NoLights));
        }

        let device = self.context.device.as_ref();
        let settings = &self.context.settings;
        let light_count = lights.len() as u32;

        let mut surface_textures = targets.geometry_buffer_textures();
        surface_textures.push(targets.depth.texture);
        let surface_count = surface_textures.len() as u32;
        let surface_views = resolve_texture_views(device, &surface_textures)?;

        let block = self.context.arena.allocate(surface_count + light_count)?;
        let surface = block.sub_range(0, surface_count);
        let light_tables = block.sub_range(surface_count, light_count);
        write_texture_views(device, &surface_views, &surface)?;

        let mut buffers = UploadBufferGuard::new(device);
        let light_constants =
            buffers.for_constants::<PunctualLight>(light_count, "Light constants")?;
        for (i, light) in (0..light_count).zip(lights) {
            light_constants.copy_constants(device, i, light)?;
            device.create_constant_buffer_view(
                &light_constants.constant_buffer_view(i),
                light_tables.cpu(i),
            )?;
        }

        let immutable_constants =
            buffers.for_constants::<ImmutableConstants>(1, "Immutable constants")?;
        immutable_constants.copy_constants(
            device,
            0,
            &ImmutableConstants {
                near_far_screen: Vec4::new(
                    settings.near_plane,
                    settings.far_plane,
                    settings.width as f32,
                    settings.height as f32,
                ),
            },
        )?;

        let frame_constants = buffers.for_constants::<FrameConstants>(
            self.context.queued_frame_count() as u32,
            "Frame constants",
        )?;
        buffers.commit();

        log::debug!("{}: initialized {} lights", Self::NAME, light_count);
        self.data = Some(PunctualLightData {
            surface,
            lights: light_tables,
            light_constants,
            immutable_constants,
            frame_constants,
            color_buffer: targets.color_buffer.view,
        });
        Ok(())
    }

    /// Number of lights drawn per frame.
    pub fn light_count(&self) -> u32 {
        self.data.as_ref().map_or(0, |d| d.lights.len())
    }
}

impl Lane for PunctualLightLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Lighting
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RenderLane for PunctualLightLane {
    fn is_data_valid(&self) -> bool {
        self.commands.is_valid()
            && self.data.as_ref().is_some_and(|d| {
                !d.surface.gpu(0).is_null() && !d.lights.gpu(0).is_null() && !d.color_buffer.is_null()
            })
    }

    fn record_and_push(&mut self, frame: &FrameContext<'_>) -> Result<u32, LaneError> {
        let data = self
            .data
            .as_ref()
            .ok_or(LaneError::NotInitialized { lane: Self::NAME })?;
        let device = self.context.device.as_ref();
        let slot = self.commands.frame_index() as u32;

        let list = self.commands.begin(device, Some(self.pipeline.id))?;
        if let Err(e) = data.frame_constants.copy_constants(device, slot, frame.constants) {
            self.commands.abandon();
            return Err(e.into());
        }

        bind_pass_state(list, &self.context, &self.pipeline, &[data.color_buffer], None);
        list.set_graphics_root_descriptor_table(SURFACE_PARAMETER, data.surface.gpu(0));
        list.set_graphics_root_constant_buffer_view(
            FRAME_PARAMETER,
            data.frame_constants.element_address(slot),
        );
        list.set_graphics_root_constant_buffer_view(
            IMMUTABLE_PARAMETER,
            data.immutable_constants.element_address(0),
        );
        list.set_primitive_topology(PrimitiveTopology::TriangleList);

        for i in 0..data.lights.len() {
            list.set_graphics_root_descriptor_table(LIGHT_PARAMETER, data.lights.gpu(i));
            list.draw_instanced(FULL_SCREEN_VERTEX_COUNT, 1, 0, 0);
        }

        self.commands.close_and_push(&self.context.executor)?;
        Ok(1)
    }

    fn release(&mut self) {
        if let Some(data) = self.data.take() {
            let device = self.context.device.as_ref();
            data.light_constants.destroy(device);
            data.immutable_constants.destroy(device);
            data.frame_constants.destroy(device);
        }
    }
}
