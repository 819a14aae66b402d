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

//! A host-emulated explicit GPU.
//!
//! The headless device keeps the D3D12 lifetime rules that matter to frame
//! pacing: allocators may only be reset once the fence that covers their
//! last submission has completed, closed lists must be submitted before they
//! are reset, and fences complete strictly in signal order.

mod command_list;
mod device;
mod heap;
mod memory;

pub use self::command_list::{HeadlessCommandList, RecordedCommand};
pub use self::device::{
    DrawKind, ExecutedDraw, HeadlessConfig, HeadlessDevice, HeadlessStats, SubmissionRecord,
};
pub use self::heap::DescriptorView;
