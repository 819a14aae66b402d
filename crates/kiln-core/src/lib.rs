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

//! # Kiln Core
//!
//! Foundational crate containing the GPU device contracts, the frame pacing
//! discipline, and the shared descriptor / pipeline management that every
//! render lane builds on.
//!
//! Nothing in this crate talks to a concrete graphics API. Backends live in
//! `kiln-infra`, pass recorders in `kiln-lanes`, and the per-frame
//! orchestration in `kiln-agents`.

#![warn(missing_docs)]

pub mod lane;
pub mod math;
pub mod renderer;

#[cfg(test)]
pub(crate) mod test_support;
