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

//! Clears recorded at the start of a stage, ahead of the stage's lanes.

use kiln_core::lane::LaneError;
use kiln_core::renderer::{
    CommandListKind, CommandListSet, CpuDescriptorHandle, FrameContext, GpuContext,
};

/// One view to clear and its clear value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearTarget {
    /// A render target view cleared to a color.
    Color {
        /// The view.
        view: CpuDescriptorHandle,
        /// The clear color.
        color: [f32; 4],
    },
    /// A depth-stencil view.
    DepthStencil {
        /// The view.
        view: CpuDescriptorHandle,
        /// The clear depth.
        depth: f32,
        /// The clear stencil.
        stencil: u8,
    },
}

/// Records a command list that only clears targets.
///
/// The orchestrator pushes it before the lanes of the stage it belongs to,
/// so lanes recording in parallel never race on the clear.
#[derive(Debug)]
pub struct ClearPass {
    context: GpuContext,
    commands: CommandListSet,
    targets: Vec<ClearTarget>,
}

impl ClearPass {
    /// Creates a clear pass over `targets`.
    pub fn new(context: GpuContext, label: &str, targets: Vec<ClearTarget>) -> Result<Self, LaneError> {
        let commands = CommandListSet::new(
            context.device.as_ref(),
            CommandListKind::Direct,
            context.queued_frame_count(),
            label,
        )?;
        Ok(Self {
            context,
            commands,
            targets,
        })
    }

    /// The cleared targets.
    pub fn targets(&self) -> &[ClearTarget] {
        &self.targets
    }

    /// Records the clears and pushes the list.
    pub fn record_and_push(&mut self, _frame: &FrameContext<'_>) -> Result<u32, LaneError> {
        if self.targets.is_empty() {
            return Ok(0);
        }

        let list = self.commands.begin(self.context.device.as_ref(), None)?;
        for target in &self.targets {
            match *target {
                ClearTarget::Color { view, color } => list.clear_render_target(view, color),
                ClearTarget::DepthStencil {
                    view,
                    depth,
                    stencil,
                } => list.clear_depth_stencil(view, depth, stencil),
            }
        }
        self.commands.close_and_push(&self.context.executor)?;
        Ok(1)
    }
}
