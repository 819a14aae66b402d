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

//! # Lane Abstraction
//!
//! A **Lane** records the GPU work of one render pass. Every lane goes
//! through the same states: constructed, initialized once with its scene
//! inputs, then asked to record and push a command list every frame.
//!
//! The hierarchy has two levels:
//!
//! 1. **`Lane`** (this trait) - identity and classification shared by all lanes.
//! 2. **`RenderLane: Lane`** (in `kiln-lanes`) - the per-frame recording contract.
//!
//! Lanes are grouped by [`LaneKind`]; the kind fixes the pipeline stage a
//! lane's command lists are submitted in.

use std::any::Any;
use std::fmt;

use crate::renderer::error::RenderError;

/// Errors raised by lanes during initialization or recording.
#[derive(Debug)]
pub enum LaneError {
    /// The lane was asked to record before `init` succeeded.
    NotInitialized {
        /// The lane's strategy name.
        lane: &'static str,
    },
    /// `init` was called on an already initialized lane.
    AlreadyInitialized {
        /// The lane's strategy name.
        lane: &'static str,
    },
    /// The scene inputs handed to `init` are empty or inconsistent.
    InvalidInput {
        /// The lane's strategy name.
        lane: &'static str,
        /// The underlying validation failure.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A device, arena or queue operation failed.
    Render(RenderError),
}

impl fmt::Display for LaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneError::NotInitialized { lane } => write!(f, "Lane '{lane}' not initialized"),
            LaneError::AlreadyInitialized { lane } => {
                write!(f, "Lane '{lane}' is already initialized")
            }
            LaneError::InvalidInput { lane, source } => {
                write!(f, "Invalid input for lane '{lane}': {source}")
            }
            LaneError::Render(e) => write!(f, "Lane GPU operation failed: {e}"),
        }
    }
}

impl std::error::Error for LaneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaneError::InvalidInput { source, .. } => Some(source.as_ref()),
            LaneError::Render(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RenderError> for LaneError {
    fn from(err: RenderError) -> Self {
        LaneError::Render(err)
    }
}

impl From<crate::renderer::error::ResourceError> for LaneError {
    fn from(err: crate::renderer::error::ResourceError) -> Self {
        LaneError::Render(err.into())
    }
}

impl From<crate::renderer::error::PipelineError> for LaneError {
    fn from(err: crate::renderer::error::PipelineError) -> Self {
        LaneError::Render(err.into())
    }
}

impl LaneError {
    /// Wraps an input validation error.
    pub fn invalid_input(
        lane: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        LaneError::InvalidInput {
            lane,
            source: Box::new(source),
        }
    }
}

/// The pipeline stage a lane belongs to.
///
/// Stages are submitted in declaration order; lanes of one stage may record
/// concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LaneKind {
    /// Fills the geometry buffers and depth.
    Geometry,
    /// Accumulates lights into the color buffer.
    Lighting,
    /// Ambient occlusion and its blur.
    Ambient,
    /// Sky behind the lit scene.
    SkyBox,
    /// Tone mapping into the back buffer.
    PostProcess,
}

impl LaneKind {
    /// Every stage, in submission order.
    pub const STAGES: [LaneKind; 5] = [
        LaneKind::Geometry,
        LaneKind::Lighting,
        LaneKind::Ambient,
        LaneKind::SkyBox,
        LaneKind::PostProcess,
    ];

    /// Whether the lanes of this stage are independent of each other.
    ///
    /// Geometry and lighting lanes write disjoint or additively blended
    /// targets, so they may record concurrently and reach the queue in any
    /// order. The other stages chain their lanes (ambient occlusion feeds
    /// the blur) and record in registration order.
    pub fn records_in_parallel(self) -> bool {
        matches!(self, LaneKind::Geometry | LaneKind::Lighting)
    }
}

impl fmt::Display for LaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneKind::Geometry => write!(f, "Geometry"),
            LaneKind::Lighting => write!(f, "Lighting"),
            LaneKind::Ambient => write!(f, "Ambient"),
            LaneKind::SkyBox => write!(f, "SkyBox"),
            LaneKind::PostProcess => write!(f, "PostProcess"),
        }
    }
}

/// Identity shared by every lane.
pub trait Lane: Send {
    /// A human-readable name for logs.
    fn strategy_name(&self) -> &'static str;

    /// The stage the lane records in.
    fn lane_kind(&self) -> LaneKind;

    /// Returns `self` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

// ─────────────────────────────────────────────────────────────────────────────
// LaneRegistry - lanes grouped by stage
// ─────────────────────────────────────────────────────────────────────────────

/// A container of heterogeneous lanes, kept in registration order.
pub struct LaneRegistry<L: ?Sized + Lane> {
    lanes: Vec<Box<L>>,
}

impl<L: ?Sized + Lane> LaneRegistry<L> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { lanes: Vec::new() }
    }

    /// Adds a lane.
    pub fn register(&mut self, lane: Box<L>) {
        self.lanes.push(lane);
    }

    /// The first lane registered under `name`.
    pub fn get(&self, name: &str) -> Option<&L> {
        self.lanes
            .iter()
            .find(|l| l.strategy_name() == name)
            .map(|b| b.as_ref())
    }

    /// Every lane of `kind`, in registration order.
    pub fn find_by_kind(&self, kind: LaneKind) -> Vec<&L> {
        self.lanes
            .iter()
            .filter(|l| l.lane_kind() == kind)
            .map(|b| b.as_ref())
            .collect()
    }

    /// Mutable access to every lane of `kind`, in registration order.
    pub fn find_by_kind_mut(&mut self, kind: LaneKind) -> Vec<&mut L> {
        self.lanes
            .iter_mut()
            .filter(|l| l.lane_kind() == kind)
            .map(|b| b.as_mut())
            .collect()
    }

    /// Mutable access to every lane.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut L> {
        self.lanes.iter_mut().map(|b| b.as_mut())
    }

    /// All lanes.
    pub fn all(&self) -> &[Box<L>] {
        &self.lanes
    }

    /// Number of registered lanes.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// Whether no lane is registered.
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

impl<L: ?Sized + Lane> Default for LaneRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized + Lane> fmt::Debug for LaneRegistry<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.lanes.iter().map(|l| (l.strategy_name(), l.lane_kind())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedLane(&'static str, LaneKind);

    impl Lane for NamedLane {
        fn strategy_name(&self) -> &'static str {
            self.0
        }
        fn lane_kind(&self) -> LaneKind {
            self.1
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn stages_are_ordered() {
        let mut sorted = LaneKind::STAGES;
        sorted.sort();
        assert_eq!(sorted, LaneKind::STAGES);
        assert!(LaneKind::Geometry < LaneKind::PostProcess);
    }

    #[test]
    fn only_independent_stages_record_in_parallel() {
        assert!(LaneKind::Geometry.records_in_parallel());
        assert!(LaneKind::Lighting.records_in_parallel());
        assert!(!LaneKind::Ambient.records_in_parallel());
        assert!(!LaneKind::PostProcess.records_in_parallel());
    }

    #[test]
    fn registry_groups_by_kind_in_registration_order() {
        let mut registry: LaneRegistry<dyn Lane> = LaneRegistry::new();
        registry.register(Box::new(NamedLane("Blur", LaneKind::Ambient)));
        registry.register(Box::new(NamedLane("Color", LaneKind::Geometry)));
        registry.register(Box::new(NamedLane("AO", LaneKind::Ambient)));

        let ambient: Vec<_> = registry
            .find_by_kind(LaneKind::Ambient)
            .iter()
            .map(|l| l.strategy_name())
            .collect();
        assert_eq!(ambient, vec!["Blur", "AO"]);
        assert!(registry.get("Color").is_some());
        assert_eq!(registry.find_by_kind_mut(LaneKind::SkyBox).len(), 0);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn invalid_input_keeps_source() {
        use std::error::Error;
        let err = LaneError::invalid_input(
            "Color",
            std::io::Error::new(std::io::ErrorKind::Other, "no geometry"),
        );
        assert_eq!(format!("{err}"), "Invalid input for lane 'Color': no geometry");
        assert!(err.source().is_some());
    }
}
