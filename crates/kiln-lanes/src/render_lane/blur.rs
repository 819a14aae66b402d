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

//! Smooths the raw ambient accessibility buffer.

use std::any::Any;
use std::sync::Arc;

use kiln_core::lane::{Lane, LaneError, LaneKind};
use kiln_core::renderer::{
    CommandListKind, CommandListSet, CpuDescriptorHandle, DescriptorRange, FrameContext,
    GpuContext, PipelineError, PipelineState, PipelineStateCache, PrimitiveTopology,
    RendererSettings,
};

use super::{
    bind_pass_state, pipelines, resolve_texture_views, write_texture_views, RenderLane,
    RenderTargets, FULL_SCREEN_VERTEX_COUNT,
};

const INPUT_PARAMETER: u32 = 0;

#[derive(Debug)]
struct BlurData {
    input: DescriptorRange,
    target: CpuDescriptorHandle,
}

/// Blurs ambient accessibility into its own target.
///
/// Must be registered after [`AmbientOcclusionLane`](super::AmbientOcclusionLane):
/// both record in the same stage and the blur reads what occlusion wrote.
#[derive(Debug)]
pub struct BlurLane {
    context: GpuContext,
    pipeline: Arc<PipelineState>,
    commands: CommandListSet,
    data: Option<BlurData>,
}

impl BlurLane {
    /// The lane's name, used in logs and the lane registry.
    pub const NAME: &'static str = "Blur";

    /// Builds or fetches the pipeline shared by every `BlurLane`.
    pub fn init_pipeline_state(
        cache: &PipelineStateCache,
        settings: &RendererSettings,
    ) -> Result<Arc<PipelineState>, PipelineError> {
        cache.get_or_create(pipelines::BLUR, &pipelines::blur(settings))
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

    /// Creates the view of the raw ambient accessibility buffer.
    pub fn init(&mut self, targets: &RenderTargets) -> Result<(), LaneError> {
        if self.data.is_some() {
            return Err(LaneError::AlreadyInitialized { lane: Self::NAME });
        }
        let device = self.context.device.as_ref();
        let views = resolve_texture_views(device, &[targets.ambient_accessibility.texture])?;
        let input = self.context.arena.allocate(1)?;
        write_texture_views(device, &views, &input)?;
        self.data = Some(BlurData {
            input,
            target: targets.blurred_accessibility.view,
        });
        Ok(())
    }
}

impl Lane for BlurLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Ambient
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RenderLane for BlurLane {
    fn is_data_valid(&self) -> bool {
        self.commands.is_valid()
            && self
                .data
                .as_ref()
                .is_some_and(|d| !d.input.gpu(0).is_null() && !d.target.is_null())
    }

    fn record_and_push(&mut self, _frame: &FrameContext<'_>) -> Result<u32, LaneError> {
        let data = self
            .data
            .as_ref()
            .ok_or(LaneError::NotInitialized { lane: Self::NAME })?;
        let device = self.context.device.as_ref();

        let list = self.commands.begin(device, Some(self.pipeline.id))?;
        bind_pass_state(list, &self.context, &self.pipeline, &[data.target], None);
        list.set_graphics_root_descriptor_table(INPUT_PARAMETER, data.input.gpu(0));
        list.set_primitive_topology(PrimitiveTopology::TriangleList);
        list.draw_instanced(FULL_SCREEN_VERTEX_COUNT, 1, 0, 0);

        self.commands.close_and_push(&self.context.executor)?;
        Ok(1)
    }

    fn release(&mut self) {
        self.data = None;
    }
}
