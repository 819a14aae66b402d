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

//! Orchestration of one deferred frame.
//!
//! The agent records the lanes stage by stage in the order geometry,
//! lighting, ambient, sky box, post-process. Lanes of the geometry and
//! lighting stages record on the rayon pool; the other stages record in
//! registration order. Each stage's lists reach the shared executor before
//! the next stage starts, and the whole frame is submitted as one batch
//! under one fence.

mod agent;
mod report;

pub use agent::*;
pub use report::*;
