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

//! Resolves the HDR color buffer into the frame's back buffer.

use std::any::Any;
use std::sync::Arc;

use kiln_core::lane::{Lane, LaneError, LaneKind};
use kiln_core::renderer::{
    CommandListKind, CommandListSet, DescriptorRange, FrameContext, GpuContext, PipelineError,
    PipelineState, PipelineStateCache, PrimitiveTopology, RendererSettings,
};
use thiserror::Error;

use super::{
    bind_pass_state, pipelines, resolve_texture_views, write_texture_views, RenderLane,
    RenderTargets, FULL_SCREEN_VERTEX_COUNT,
};

const COLOR_BUFFER_PARAMETER: u32 = 0;

/// Invalid per-frame inputs of the post-process lane.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PostProcessInputError {
    /// The frame carried no back buffer view.
    #[error("the frame has no back buffer to resolve into")]
    MissingBackBuffer,
}

/// Tone maps the color buffer into the back buffer of each frame.
#[derive(Debug)]
pub struct PostProcessLane {
    context: GpuContext,
    pipeline: Arc<PipelineState>,
    commands: CommandListSet,
    color_buffer: Option<DescriptorRange>,
}

impl PostProcessLane {
    /// The lane's name, used in logs and the lane registry.
    pub const NAME: &'static str = "PostProcess";

    /// Builds or fetches the pipeline shared by every `PostProcessLane`.
    pub fn init_pipeline_state(
        cache: &PipelineStateCache,
        settings: &RendererSettings,
    ) -> Result<Arc<PipelineState>, PipelineError> {
        cache.get_or_create(pipelines::POST_PROCESS, &pipelines::post_process(settings))
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
            color_buffer: None,
        })
    }

    /// Creates the view of the color buffer.
    pub fn init(&mut self, targets: &RenderTargets) -> Result<(), LaneError> {
        if self.color_buffer.is_some() {
            return Err(LaneError::AlreadyInitialized { lane: Self::NAME });
        }
        let device = self.context.device.as_ref();
        let views = resolve_texture_views(device, &[targets.color_buffer.texture])?;
        let range = self.context.arena.allocate(1)?;
        write_texture_views(device, &views, &range)?;
        self.color_buffer = Some(range);
        Ok(())
    }
}

impl Lane for PostProcessLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::PostProcess
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RenderLane for PostProcessLane {
    fn is_data_valid(&self) -> bool {
        self.commands.is_valid()
            && self
                .color_buffer
                .as_ref()
                .is_some_and(|range| !range.gpu(0).is_null())
    }

    fn record_and_push(&mut self, frame: &FrameContext<'_>) -> Result<u32, LaneError> {
        let color_buffer = self
            .color_buffer
            .as_ref()
            .ok_or(LaneError::NotInitialized { lane: Self::NAME })?;
        if frame.back_buffer.is_null() {
            return Err(LaneError::invalid_input(
                Self::NAME,
                PostProcessInputError::MissingBackBuffer,
            ));
        }
        let device = self.context.device.as_ref();

        let list = self.commands.begin(device, Some(self.pipeline.id))?;
        bind_pass_state(list, &self.context, &self.pipeline, &[frame.back_buffer], None);
        list.set_graphics_root_descriptor_table(COLOR_BUFFER_PARAMETER, color_buffer.gpu(0));
        list.set_primitive_topology(PrimitiveTopology::TriangleList);
        list.draw_instanced(FULL_SCREEN_VERTEX_COUNT, 1, 0, 0);

        self.commands.close_and_push(&self.context.executor)?;
        Ok(1)
    }

    fn release(&mut self) {
        self.color_buffer = None;
    }
}
