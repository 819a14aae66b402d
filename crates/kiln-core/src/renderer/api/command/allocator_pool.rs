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

//! Per-lane command allocators, one per queued frame.
//!
//! A lane records into one command list, but backs it with a different
//! allocator every frame, cycling through `queued_frame_count` of them. An
//! allocator is therefore reused only `queued_frame_count` frames after it
//! was last submitted, which is exactly the window the frame pacer waits on.

use super::{CommandAllocatorId, CommandListExecutor, CommandListId, CommandListKind};
use crate::renderer::api::pipeline::PipelineStateId;
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::{GpuDevice, GraphicsCommandList};

/// The allocators, command list and frame index owned by one lane.
#[derive(Debug)]
pub struct CommandListSet {
    allocators: Vec<CommandAllocatorId>,
    list: Box<dyn GraphicsCommandList>,
    frame_index: usize,
    recording: bool,
}

impl CommandListSet {
    /// Creates `queued_frame_count` allocators and one closed command list.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If `queued_frame_count` is zero.
    /// * Any error the device reports while creating the objects.
    pub fn new(
        device: &dyn GpuDevice,
        kind: CommandListKind,
        queued_frame_count: usize,
        label: &str,
    ) -> Result<Self, ResourceError> {
        if queued_frame_count == 0 {
            return Err(ResourceError::OutOfBounds);
        }

        let allocators = (0..queued_frame_count)
            .map(|i| device.create_command_allocator(kind, Some(&format!("{label} allocator {i}"))))
            .collect::<Result<Vec<_>, _>>()?;
        let list = device.create_command_list(kind, allocators[0], Some(label))?;

        Ok(Self {
            allocators,
            list,
            frame_index: 0,
            recording: false,
        })
    }

    /// Resets the allocator of the current frame slot and reopens the list
    /// against it with `pipeline` bound.
    ///
    /// ## Errors
    /// * `RenderError::AllocatorInUse` - If the GPU may still read the
    ///   allocator, i.e. the frame pacer did not wait for this slot.
    /// * `RenderError::InvalidCommandListState` - If a previous recording was
    ///   not finished.
    pub fn begin(
        &mut self,
        device: &dyn GpuDevice,
        pipeline: Option<PipelineStateId>,
    ) -> Result<&mut dyn GraphicsCommandList, RenderError> {
        if self.recording {
            return Err(RenderError::InvalidCommandListState {
                list: self.list.id(),
                reason: "recording started twice without being pushed",
            });
        }

        let allocator = self.allocators[self.frame_index];
        device.reset_command_allocator(allocator)?;
        self.list.reset(allocator, pipeline)?;
        self.recording = true;
        Ok(self.list.as_mut())
    }

    /// Closes the list, pushes it to the submission queue and advances the
    /// frame index.
    pub fn close_and_push(
        &mut self,
        executor: &CommandListExecutor,
    ) -> Result<CommandListId, RenderError> {
        if !self.recording {
            return Err(RenderError::InvalidCommandListState {
                list: self.list.id(),
                reason: "pushed without recording",
            });
        }

        let closed = self.list.close();
        self.recording = false;
        closed?;

        let id = self.list.id();
        executor.add_command_list(id);
        self.frame_index = (self.frame_index + 1) % self.allocators.len();
        Ok(id)
    }

    /// Drops an open recording without pushing it. The frame index stays on
    /// the current slot, so the next `begin` reuses the same allocator.
    pub fn abandon(&mut self) {
        if self.recording {
            self.list.discard();
            self.recording = false;
            log::debug!("CommandListSet: abandoned recording of {:?}", self.list.id());
        }
    }

    /// The slot whose allocator the next recording will use.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// The allocators, in slot order.
    pub fn allocators(&self) -> &[CommandAllocatorId] {
        &self.allocators
    }

    /// The ID of the owned command list.
    pub fn list_id(&self) -> CommandListId {
        self.list.id()
    }

    /// Whether every allocator and the list exist and the list is idle.
    pub fn is_valid(&self) -> bool {
        !self.allocators.is_empty() && self.list.is_closed() && !self.recording
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockDevice;
    use std::collections::HashSet;

    #[test]
    fn creates_one_distinct_allocator_per_queued_frame() {
        let device = MockDevice::new();
        let set = CommandListSet::new(&device, CommandListKind::Direct, 3, "lane").unwrap();
        let unique: HashSet<_> = set.allocators().iter().collect();
        assert_eq!(unique.len(), 3);
        assert!(set.is_valid());
    }

    #[test]
    fn frame_index_cycles_modulo_queued_frames() {
        let device = MockDevice::new();
        let executor = CommandListExecutor::new();
        let mut set = CommandListSet::new(&device, CommandListKind::Direct, 3, "lane").unwrap();

        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(set.frame_index());
            set.begin(&device, None).unwrap();
            set.close_and_push(&executor).unwrap();
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(executor.pending_count(), 7);
        executor.execute_pending(&device).unwrap();
        assert_eq!(device.executed_batches(), vec![vec![set.list_id(); 7]]);
    }

    #[test]
    fn allocator_resets_follow_the_slot() {
        let device = MockDevice::new();
        let executor = CommandListExecutor::new();
        let mut set = CommandListSet::new(&device, CommandListKind::Direct, 2, "lane").unwrap();
        let expected = [set.allocators()[0], set.allocators()[1], set.allocators()[0]];

        for _ in 0..3 {
            set.begin(&device, None).unwrap();
            set.close_and_push(&executor).unwrap();
        }
        assert_eq!(device.allocator_resets(), expected.to_vec());
    }

    #[test]
    fn begin_twice_is_rejected() {
        let device = MockDevice::new();
        let mut set = CommandListSet::new(&device, CommandListKind::Direct, 2, "lane").unwrap();
        set.begin(&device, None).unwrap();
        assert!(!set.is_valid());
        assert!(matches!(
            set.begin(&device, None),
            Err(RenderError::InvalidCommandListState { .. })
        ));
    }

    #[test]
    fn abandoned_recordings_are_not_pushed() {
        let device = MockDevice::new();
        let executor = CommandListExecutor::new();
        let mut set = CommandListSet::new(&device, CommandListKind::Direct, 2, "lane").unwrap();

        set.begin(&device, None).unwrap();
        set.abandon();
        assert!(set.is_valid());
        assert_eq!(set.frame_index(), 0);
        assert_eq!(executor.pending_count(), 0);

        set.begin(&device, None).unwrap();
        set.close_and_push(&executor).unwrap();
        assert_eq!(set.frame_index(), 1);
        assert_eq!(executor.pending_count(), 1);
        assert_eq!(device.allocator_resets(), vec![set.allocators()[0]; 2]);
    }

    #[test]
    fn abandon_without_recording_does_nothing() {
        let device = MockDevice::new();
        let mut set = CommandListSet::new(&device, CommandListKind::Direct, 2, "lane").unwrap();
        set.abandon();
        assert!(set.is_valid());
        assert_eq!(set.frame_index(), 0);
    }

    #[test]
    fn zero_queued_frames_is_rejected() {
        let device = MockDevice::new();
        assert!(CommandListSet::new(&device, CommandListKind::Direct, 0, "lane").is_err());
    }
}
