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

//! The submission queue shared by every lane.
//!
//! Lanes push closed command lists from any thread. Once per frame the
//! orchestrator drains the queue: the lists are submitted to the GPU in the
//! order they were pushed, then the fence is signaled once for the batch.

use std::sync::atomic::{AtomicU64, Ordering};

use super::{CommandListId, FenceValue};
use crate::renderer::error::RenderError;
use crate::renderer::traits::GpuDevice;

/// A multi-producer FIFO of closed command lists awaiting submission.
#[derive(Debug)]
pub struct CommandListExecutor {
    sender: flume::Sender<CommandListId>,
    receiver: flume::Receiver<CommandListId>,
    submitted_lists: AtomicU64,
    submitted_batches: AtomicU64,
}

impl Default for CommandListExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandListExecutor {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            sender,
            receiver,
            submitted_lists: AtomicU64::new(0),
            submitted_batches: AtomicU64::new(0),
        }
    }

    /// Enqueues a closed command list. Callable from any thread.
    pub fn add_command_list(&self, list: CommandListId) {
        // The executor owns the receiver, so the channel cannot be disconnected.
        let _ = self.sender.send(list);
    }

    /// Number of lists waiting for the next drain.
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Submits every pending list in push order and signals the fence.
    ///
    /// ## Returns
    /// The fence value signaled for the batch, or `None` if nothing was pending.
    pub fn execute_pending(
        &self,
        device: &dyn GpuDevice,
    ) -> Result<Option<FenceValue>, RenderError> {
        let batch: Vec<CommandListId> = self.receiver.try_iter().collect();
        if batch.is_empty() {
            return Ok(None);
        }

        device.execute_command_lists(&batch)?;
        let fence = device.signal_fence()?;

        self.submitted_lists
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        self.submitted_batches.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "CommandListExecutor: submitted {} lists, fence {}",
            batch.len(),
            fence.0
        );
        Ok(Some(fence))
    }

    /// Total lists submitted since creation.
    pub fn submitted_lists(&self) -> u64 {
        self.submitted_lists.load(Ordering::Relaxed)
    }

    /// Total batches (fence signals) since creation.
    pub fn submitted_batches(&self) -> u64 {
        self.submitted_batches.load(Ordering::Relaxed)
    }
}
