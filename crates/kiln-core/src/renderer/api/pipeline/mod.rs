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

//! Pipeline state objects, binding signatures, and their shared cache.

mod cache;
mod descriptor;

pub use self::cache::PipelineStateCache;
pub use self::descriptor::*;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// An opaque handle to an immutable pipeline state object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PipelineStateId(pub u64);

/// An opaque handle to a binding signature (the layout of root parameters).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BindingSignatureId(pub u64);

/// The cache key of a pipeline: a hash of its symbolic name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey(pub u64);

impl PipelineKey {
    /// Hashes a symbolic pipeline name.
    pub fn from_name(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        PipelineKey(hasher.finish())
    }
}

/// A built pipeline state object together with the binding signature it was
/// created against. Shared read-only by every lane that draws with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    /// The symbolic name the pipeline was created under.
    pub name: String,
    /// The cache key derived from `name`.
    pub key: PipelineKey,
    /// The device handle of the pipeline state object.
    pub id: PipelineStateId,
    /// The binding signature to bind alongside the pipeline.
    pub binding_signature: BindingSignatureId,
    /// The topology class the pipeline was built for.
    pub topology_type: PrimitiveTopologyType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_stable_per_name() {
        assert_eq!(
            PipelineKey::from_name("geometry/color"),
            PipelineKey::from_name("geometry/color")
        );
        assert_ne!(
            PipelineKey::from_name("geometry/color"),
            PipelineKey::from_name("geometry/height_mapping")
        );
    }
}
