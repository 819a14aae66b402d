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

//! Keeps at most `queued_frame_count` frames in flight.
//!
//! Each slot remembers the fence value signaled for the last frame recorded
//! into it. Before the CPU records into a slot again, [`FramePacer::begin_frame`]
//! waits for that fence, so every per-slot allocator and constant buffer is
//! idle on the GPU by the time lanes touch it.

use crate::renderer::api::command::FenceValue;
use crate::renderer::error::RenderError;
use crate::renderer::traits::GpuDevice;

/// Identifies the frame being recorded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameTicket {
    /// Monotonic frame counter.
    pub frame_number: u64,
    /// The in-flight slot the frame records into.
    pub slot: usize,
}

/// Per-slot fence bookkeeping.
#[derive(Debug)]
pub struct FramePacer {
    slot_fences: Vec<FenceValue>,
    current_slot: usize,
    frame_number: u64,
    in_frame: bool,
}

impl FramePacer {
    /// Creates a pacer for `queued_frame_count` in-flight frames.
    pub fn new(queued_frame_count: usize) -> Result<Self, RenderError> {
        if queued_frame_count == 0 {
            return Err(RenderError::InvalidConfiguration(
                "queued frame count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            slot_fences: vec![FenceValue::INITIAL; queued_frame_count],
            current_slot: 0,
            frame_number: 0,
            in_frame: false,
        })
    }

    /// Waits until the GPU finished the previous frame recorded into the
    /// current slot, then opens the frame.
    pub fn begin_frame(&mut self, device: &dyn GpuDevice) -> Result<FrameTicket, RenderError> {
        if self.in_frame {
            return Err(RenderError::Internal(
                "begin_frame called twice without end_frame".to_string(),
            ));
        }

        let fence = self.slot_fences[self.current_slot];
        if device.completed_fence_value() < fence {
            log::trace!(
                "FramePacer: slot {} waiting for fence {}",
                self.current_slot,
                fence.0
            );
            device.wait_for_fence(fence)?;
        }

        self.in_frame = true;
        Ok(FrameTicket {
            frame_number: self.frame_number,
            slot: self.current_slot,
        })
    }

    /// Records the fence signaled for the frame's work and moves to the next slot.
    ///
    /// `None` means nothing was submitted; the slot keeps its previous fence.
    pub fn end_frame(&mut self, fence: Option<FenceValue>) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::Internal(
                "end_frame called without begin_frame".to_string(),
            ));
        }

        if let Some(fence) = fence {
            self.slot_fences[self.current_slot] = fence;
        }
        self.in_frame = false;
        self.current_slot = (self.current_slot + 1) % self.slot_fences.len();
        self.frame_number += 1;
        Ok(())
    }

    /// Whether the GPU has finished the last frame recorded into `slot`.
    pub fn is_slot_free(&self, slot: usize, device: &dyn GpuDevice) -> bool {
        self.slot_fences
            .get(slot)
            .is_some_and(|fence| device.completed_fence_value() >= *fence)
    }

    /// Blocks until every submitted frame has completed.
    pub fn wait_idle(&self, device: &dyn GpuDevice) -> Result<(), RenderError> {
        if let Some(latest) = self.slot_fences.iter().max() {
            device.wait_for_fence(*latest)?;
        }
        Ok(())
    }

    /// The slot the next frame records into.
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// The number of frames begun and ended so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// The number of slots.
    pub fn queued_frame_count(&self) -> usize {
        self.slot_fences.len()
    }
}
