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

//! Draws the environment cube map behind the lit scene.

use std::any::Any;
use std::sync::Arc;

use kiln_core::lane::{Lane, LaneError, LaneKind};
use kiln_core::renderer::{
    CommandListKind, CommandListSet, CpuDescriptorHandle, DescriptorRange, FrameConstants,
    FrameContext, GeometryData, GpuContext, ObjectConstants, PipelineError, PipelineState,
    PipelineStateCache, PrimitiveTopology, RendererSettings, TextureDimension, TextureId,
    UploadBuffer, UploadBufferGuard,
};
use thiserror::Error;

use super::{
    bind_pass_state, pipelines, resolve_texture_views, write_texture_views, RenderLane,
    RenderTargets,
};

// Binding signature:
// 0: object constants table, 1: frame constants, 2: cube map table.
const OBJECT_PARAMETER: u32 = 0;
const FRAME_PARAMETER: u32 = 1;
const CUBE_MAP_PARAMETER: u32 = 2;

/// Invalid sky box inputs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SkyBoxInputError {
    /// The sphere must be drawn exactly once.
    #[error("the sky sphere needs exactly one world matrix, found {found}")]
    InstanceCount {
        /// Number of world matrices provided.
        found: usize,
    },
    /// The texture is not a cube map.
    #[error("texture {0:?} is not a cube map")]
    NotACubeMap(TextureId),
}

#[derive(Debug)]
struct SkyBoxData {
    sphere: GeometryData,
    object: DescriptorRange,
    cube_map: DescriptorRange,
    object_constants: UploadBuffer,
    frame_constants: UploadBuffer,
    color_buffer: CpuDescriptorHandle,
    depth: CpuDescriptorHandle,
}

/// Draws a sphere textured with a cube map where depth is still clear.
#[derive(Debug)]
pub struct SkyBoxLane {
    context: GpuContext,
    pipeline: Arc<PipelineState>,
    commands: CommandListSet,
    data: Option<SkyBoxData>,
}

impl SkyBoxLane {
    /// The lane's name, used in logs and the lane registry.
    pub const NAME: &'static str = "SkyBox";

    /// Builds or fetches the pipeline shared by every `SkyBoxLane`.
    pub fn init_pipeline_state(
        cache: &PipelineStateCache,
        settings: &RendererSettings,
    ) -> Result<Arc<PipelineState>, PipelineError> {
        cache.get_or_create(pipelines::SKY_BOX, &pipelines::sky_box(settings))
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

    /// Uploads the sphere transform and creates the cube map view.
    pub fn init(
        &mut self,
        sphere: GeometryData,
        cube_map: TextureId,
        targets: &RenderTargets,
    ) -> Result<(), LaneError> {
        if self.data.is_some() {
            return Err(LaneError::AlreadyInitialized { lane: Self::NAME });
        }
        let world = match sphere.world_matrices.as_slice() {
            [world] => *world,
            other => {
                return Err(LaneError::invalid_input(
                    Self::NAME,
                    SkyBoxInputError::InstanceCount { found: other.len() },
                ))
            }
        };
        let device = self.context.device.as_ref();
        if device.texture_info(cube_map)?.dimension != TextureDimension::Cube {
            return Err(LaneError::invalid_input(
                Self::NAME,
                SkyBoxInputError::NotACubeMap(cube_map),
            ));
        }
        let cube_views = resolve_texture_views(device, &[cube_map])?;

        let block = self.context.arena.allocate(2)?;
        let object = block.sub_range(0, 1);
        let cube_range = block.sub_range(1, 1);
        write_texture_views(device, &cube_views, &cube_range)?;

        let mut buffers = UploadBufferGuard::new(device);
        let object_constants =
            buffers.for_constants::<ObjectConstants>(1, "Sky box object constants")?;
        object_constants.copy_constants(device, 0, &ObjectConstants::new(&world, 1.0))?;
        device.create_constant_buffer_view(&object_constants.constant_buffer_view(0), object.cpu(0))?;

        let frame_constants = buffers.for_constants::<FrameConstants>(
            self.context.queued_frame_count() as u32,
            "Frame constants",
        )?;
        buffers.commit();

        self.data = Some(SkyBoxData {
            sphere,
            object,
            cube_map: cube_range,
            object_constants,
            frame_constants,
            color_buffer: targets.color_buffer.view,
            depth: targets.depth.view,
        });
        Ok(())
    }
}

impl Lane for SkyBoxLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::SkyBox
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RenderLane for SkyBoxLane {
    fn is_data_valid(&self) -> bool {
        self.commands.is_valid()
            && self.data.as_ref().is_some_and(|d| {
                d.sphere.index_count() > 0
                    && !d.object.gpu(0).is_null()
                    && !d.cube_map.gpu(0).is_null()
                    && !d.color_buffer.is_null()
                    && !d.depth.is_null()
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

        bind_pass_state(
            list,
            &self.context,
            &self.pipeline,
            &[data.color_buffer],
            Some(data.depth),
        );
        list.set_graphics_root_descriptor_table(OBJECT_PARAMETER, data.object.gpu(0));
        list.set_graphics_root_constant_buffer_view(
            FRAME_PARAMETER,
            data.frame_constants.element_address(slot),
        );
        list.set_graphics_root_descriptor_table(CUBE_MAP_PARAMETER, data.cube_map.gpu(0));
        list.set_primitive_topology(PrimitiveTopology::TriangleList);
        list.set_vertex_buffers(0, &[data.sphere.vertex_buffer]);
        list.set_index_buffer(&data.sphere.index_buffer);
        list.draw_indexed_instanced(data.sphere.index_count(), 1, 0, 0, 0);

        self.commands.close_and_push(&self.context.executor)?;
        Ok(1)
    }

    fn release(&mut self) {
        if let Some(data) = self.data.take() {
            let device = self.context.device.as_ref();
            data.object_constants.destroy(device);
            data.frame_constants.destroy(device);
        }
    }
}
