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

//! Per-frame data and the pacing of in-flight frames.

mod pacer;

pub use self::pacer::{FramePacer, FrameTicket};

use crate::renderer::api::descriptor::CpuDescriptorHandle;
use crate::renderer::api::scene::FrameConstants;

/// What a lane receives when asked to record a frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    /// Monotonic frame counter, starting at 0.
    pub frame_number: u64,
    /// The in-flight slot the frame occupies, in `[0, queued_frame_count)`.
    pub slot: usize,
    /// Camera and timing constants for the frame.
    pub constants: &'a FrameConstants,
    /// Render target view of the back buffer presented this frame.
    pub back_buffer: CpuDescriptorHandle,
}
