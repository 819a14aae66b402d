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

//! Defines the RenderAgent, the per-frame orchestrator of the render lanes.

use std::sync::Arc;
use std::time::Instant;

use kiln_core::lane::{LaneError, LaneKind, LaneRegistry};
use kiln_core::renderer::{
    CpuDescriptorHandle, FrameConstants, FrameContext, FramePacer, GpuContext, RenderError,
};
use kiln_lanes::render_lane::{ClearPass, ClearTarget, RenderLane, RenderTargets};
use rayon::prelude::*;

use super::FrameReport;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];
/// Fully accessible: no occlusion until the ambient occlusion lane writes.
const CLEAR_ACCESSIBILITY: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// The agent responsible for pacing frames and recording the lanes in stage
/// order.
pub struct RenderAgent {
    context: GpuContext,
    pacer: FramePacer,
    // Registered lanes, grouped by stage when recording.
    lanes: LaneRegistry<dyn RenderLane>,
    // Screen-sized intermediate targets, `None` once released.
    targets: Option<RenderTargets>,
    // Clears pushed ahead of the geometry and ambient stages.
    geometry_clear: ClearPass,
    ambient_clear: ClearPass,
    frame_count: u64,
}

impl RenderAgent {
    /// Creates the render targets and clear passes for `context`.
    pub fn new(context: GpuContext) -> Result<Self, LaneError> {
        let pacer = FramePacer::new(context.queued_frame_count())?;
        let targets = RenderTargets::new(context.device.as_ref(), &context.settings)?;

        let mut geometry_targets: Vec<ClearTarget> = targets
            .geometry_buffer_views()
            .into_iter()
            .chain([targets.color_buffer.view])
            .map(|view| ClearTarget::Color {
                view,
                color: CLEAR_COLOR,
            })
            .collect();
        geometry_targets.push(ClearTarget::DepthStencil {
            view: targets.depth.view,
            depth: 1.0,
            stencil: 0,
        });
        let geometry_clear = ClearPass::new(context.clone(), "Geometry clear", geometry_targets)?;

        let ambient_targets = [targets.ambient_accessibility, targets.blurred_accessibility]
            .into_iter()
            .map(|target| ClearTarget::Color {
                view: target.view,
                color: CLEAR_ACCESSIBILITY,
            })
            .collect();
        let ambient_clear = ClearPass::new(context.clone(), "Ambient clear", ambient_targets)?;

        log::info!(
            "RenderAgent: created with {} queued frames",
            context.queued_frame_count()
        );
        Ok(Self {
            context,
            pacer,
            lanes: LaneRegistry::new(),
            targets: Some(targets),
            geometry_clear,
            ambient_clear,
            frame_count: 0,
        })
    }

    /// The shared GPU context lanes are created with.
    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// The intermediate targets lanes read and write.
    ///
    /// # Errors
    ///
    /// `RenderError::NotInitialized` after `release`.
    pub fn targets(&self) -> Result<&RenderTargets, RenderError> {
        self.targets.as_ref().ok_or(RenderError::NotInitialized)
    }

    /// Adds an initialized lane. Lanes of one stage that depend on each
    /// other must be registered in dependency order.
    ///
    /// # Errors
    ///
    /// `LaneError::NotInitialized` if the lane's `init` has not succeeded.
    pub fn register_lane(&mut self, lane: Box<dyn RenderLane>) -> Result<(), LaneError> {
        if !lane.is_data_valid() {
            return Err(LaneError::NotInitialized {
                lane: lane.strategy_name(),
            });
        }
        log::info!(
            "RenderAgent: registered lane '{}' in stage {}",
            lane.strategy_name(),
            lane.lane_kind()
        );
        self.lanes.register(lane);
        Ok(())
    }

    /// Returns the registered lanes.
    pub fn lanes(&self) -> &LaneRegistry<dyn RenderLane> {
        &self.lanes
    }

    /// Number of frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Renders one frame.
    ///
    /// Waits until the GPU released the frame slot, records every stage,
    /// submits all lists as one batch and signals the slot's fence.
    ///
    /// # Arguments
    ///
    /// * `constants`: camera constants shared by every lane this frame
    /// * `back_buffer`: the render target view presented this frame
    ///
    /// # Errors
    ///
    /// Any lane or device failure. Lists recorded before the failure are
    /// still submitted so that every allocator stays fenced.
    pub fn render_frame(
        &mut self,
        constants: &FrameConstants,
        back_buffer: CpuDescriptorHandle,
    ) -> Result<FrameReport, LaneError> {
        let frame_start = Instant::now();
        let device = Arc::clone(&self.context.device);

        let ticket = self.pacer.begin_frame(device.as_ref())?;
        let frame = FrameContext {
            frame_number: ticket.frame_number,
            slot: ticket.slot,
            constants,
            back_buffer,
        };

        let recorded = self.record_stages(&frame);
        let fence = self.context.executor.execute_pending(device.as_ref())?;
        self.pacer.end_frame(fence)?;
        let stage_lists = recorded?;

        self.frame_count += 1;
        let report = FrameReport {
            frame_number: ticket.frame_number,
            slot: ticket.slot,
            stage_lists,
            fence,
            cpu_time: frame_start.elapsed(),
        };
        log::debug!(
            "RenderAgent: frame {} slot {} submitted {} lists (fence {:?})",
            report.frame_number,
            report.slot,
            report.lists_submitted(),
            report.fence
        );
        Ok(report)
    }

    fn record_stages(&mut self, frame: &FrameContext<'_>) -> Result<Vec<(LaneKind, u32)>, LaneError> {
        let mut stage_lists = Vec::with_capacity(LaneKind::STAGES.len());

        for kind in LaneKind::STAGES {
            let mut lists = match kind {
                LaneKind::Geometry => self.geometry_clear.record_and_push(frame)?,
                LaneKind::Ambient => self.ambient_clear.record_and_push(frame)?,
                _ => 0,
            };

            let mut lanes = self.lanes.find_by_kind_mut(kind);
            if kind.records_in_parallel() {
                lists += lanes
                    .par_iter_mut()
                    .map(|lane| lane.record_and_push(frame))
                    .collect::<Result<Vec<u32>, LaneError>>()?
                    .into_iter()
                    .sum::<u32>();
            } else {
                for lane in lanes {
                    lists += lane.record_and_push(frame)?;
                }
            }

            log::trace!("RenderAgent: stage {kind} pushed {lists} lists");
            stage_lists.push((kind, lists));
        }
        Ok(stage_lists)
    }

    /// Blocks until the GPU finished every submitted frame.
    pub fn flush(&self) -> Result<(), RenderError> {
        self.pacer.wait_idle(self.context.device.as_ref())
    }

    /// Waits for the GPU, then frees every lane's buffers and the render
    /// targets. Registered lanes are dropped.
    pub fn release(&mut self) -> Result<(), RenderError> {
        self.flush()?;
        for lane in self.lanes.iter_mut() {
            lane.release();
        }
        self.lanes = LaneRegistry::new();
        if let Some(targets) = self.targets.take() {
            targets.release(self.context.device.as_ref());
        }
        log::info!("RenderAgent: released after {} frames", self.frame_count);
        Ok(())
    }
}

impl std::fmt::Debug for RenderAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderAgent")
            .field("lanes", &self.lanes)
            .field("frame_count", &self.frame_count)
            .field("slot", &self.pacer.current_slot())
            .finish()
    }
}
