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

//! The shared pipeline state cache.
//!
//! Lanes of the same type share one pipeline state object. The cache is
//! injected into every lane instead of living in a global, and builds each
//! pipeline at most once even when several lanes initialize concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::{BindingSignatureId, PipelineKey, PipelineState, PipelineStateCreateInfo, PipelineStateDescriptor};
use crate::renderer::error::{PipelineError, ResourceError};
use crate::renderer::traits::{GpuDevice, ShaderLoader};

/// Create-once storage of pipeline state objects keyed by symbolic name.
#[derive(Debug)]
pub struct PipelineStateCache {
    device: Arc<dyn GpuDevice>,
    shaders: Arc<dyn ShaderLoader>,
    entries: RwLock<HashMap<PipelineKey, Arc<PipelineState>>>,
    signatures: Mutex<HashMap<String, BindingSignatureId>>,
    creation: Mutex<()>,
}

impl PipelineStateCache {
    /// Creates an empty cache building pipelines on `device` from blobs
    /// provided by `shaders`.
    pub fn new(device: Arc<dyn GpuDevice>, shaders: Arc<dyn ShaderLoader>) -> Self {
        Self {
            device,
            shaders,
            entries: RwLock::new(HashMap::new()),
            signatures: Mutex::new(HashMap::new()),
            creation: Mutex::new(()),
        }
    }

    /// Returns the pipeline cached under `name`, building it from
    /// `descriptor` on first use.
    ///
    /// Concurrent first-time calls with the same name build exactly one
    /// pipeline; every caller receives the same shared state.
    ///
    /// ## Errors
    /// * `PipelineError` - If the descriptor is incomplete, a blob cannot be
    ///   loaded, or the device refuses to build the pipeline.
    pub fn get_or_create(
        &self,
        name: &str,
        descriptor: &PipelineStateDescriptor,
    ) -> Result<Arc<PipelineState>, PipelineError> {
        let key = PipelineKey::from_name(name);
        if let Some(state) = self.lookup(key) {
            return Ok(state);
        }

        let _creation = self.creation.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = self.lookup(key) {
            return Ok(state);
        }

        let state = Arc::new(self.build(name, key, descriptor)?);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&state));

        log::info!(
            "PipelineStateCache: created pipeline '{}' ({:?})",
            name,
            state.id
        );
        Ok(state)
    }

    /// Returns the pipeline cached under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<PipelineState>, PipelineError> {
        self.lookup(PipelineKey::from_name(name))
            .ok_or_else(|| PipelineError::NotCached {
                name: name.to_string(),
            })
    }

    /// Whether a pipeline is cached under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(PipelineKey::from_name(name)).is_some()
    }

    /// Removes the pipeline cached under `name` and releases it on the device.
    ///
    /// The caller guarantees that no submitted command list still references it.
    ///
    /// ## Errors
    /// * `PipelineError::NotCached` - If nothing is cached under `name`.
    pub fn erase(&self, name: &str) -> Result<(), PipelineError> {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&PipelineKey::from_name(name))
            .ok_or_else(|| PipelineError::NotCached {
                name: name.to_string(),
            })?;

        if let Err(e) = self.device.destroy_pipeline_state(removed.id) {
            log::warn!("PipelineStateCache: failed to destroy '{name}': {e}");
        }
        log::debug!("PipelineStateCache: erased pipeline '{name}'");
        Ok(())
    }

    /// Number of cached pipelines.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no pipeline.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: PipelineKey) -> Option<Arc<PipelineState>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn binding_signature(&self, path: &str) -> Result<BindingSignatureId, PipelineError> {
        let mut signatures = self.signatures.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = signatures.get(path) {
            return Ok(*id);
        }

        let blob = self.shaders.load_compiled_shader(path)?;
        let id = self
            .device
            .create_binding_signature(&blob, Some(path))
            .map_err(|e| device_failure(path, e))?;
        signatures.insert(path.to_string(), id);
        Ok(id)
    }

    fn build(
        &self,
        name: &str,
        key: PipelineKey,
        descriptor: &PipelineStateDescriptor,
    ) -> Result<PipelineState, PipelineError> {
        descriptor.validate(name)?;

        let signature_path = descriptor.binding_signature.as_deref().ok_or_else(|| {
            PipelineError::MissingBindingSignature {
                name: name.to_string(),
            }
        })?;
        let binding_signature = self.binding_signature(signature_path)?;

        let load = |path: &Option<String>| -> Result<Option<Arc<[u8]>>, PipelineError> {
            path.as_deref()
                .map(|p| self.shaders.load_compiled_shader(p))
                .transpose()
                .map_err(PipelineError::from)
        };
        let vertex = load(&descriptor.shaders.vertex)?.ok_or_else(|| {
            PipelineError::MissingVertexShader {
                name: name.to_string(),
            }
        })?;
        let hull = load(&descriptor.shaders.hull)?;
        let domain = load(&descriptor.shaders.domain)?;
        let geometry = load(&descriptor.shaders.geometry)?;
        let pixel = load(&descriptor.shaders.pixel)?;

        let info = PipelineStateCreateInfo {
            label: name,
            descriptor,
            binding_signature,
            vertex_shader: &vertex,
            hull_shader: hull.as_deref(),
            domain_shader: domain.as_deref(),
            geometry_shader: geometry.as_deref(),
            pixel_shader: pixel.as_deref(),
        };
        let id = self
            .device
            .create_pipeline_state(&info)
            .map_err(|e| device_failure(name, e))?;

        Ok(PipelineState {
            name: name.to_string(),
            key,
            id,
            binding_signature,
            topology_type: descriptor.topology_type,
        })
    }
}

fn device_failure(label: &str, err: ResourceError) -> PipelineError {
    match err {
        ResourceError::Pipeline(inner) => inner,
        ResourceError::Shader(inner) => PipelineError::Shader(inner),
        other => PipelineError::CompilationFailed {
            label: Some(label.to_string()),
            details: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::pipeline::*;
    use crate::renderer::api::resource::TextureFormat;
    use crate::test_support::{MockDevice, MockShaderLoader};
    use std::thread;

    fn descriptor(vs: &str) -> PipelineStateDescriptor {
        PipelineStateDescriptor {
            shaders: ShaderStages {
                vertex: Some(vs.to_string()),
                pixel: Some("ps.cso".to_string()),
                ..Default::default()
            },
            binding_signature: Some("rs.cso".to_string()),
            input_layout: InputLayout::None,
            topology_type: PrimitiveTopologyType::Triangle,
            render_target_formats: vec![TextureFormat::Rgba8Unorm],
            depth_stencil_format: None,
            depth_stencil: DepthStencilMode::Disabled,
            blend: BlendMode::Opaque,
            cull: CullMode::None,
        }
    }

    fn cache() -> (Arc<MockDevice>, PipelineStateCache) {
        let device = Arc::new(MockDevice::new());
        let cache = PipelineStateCache::new(device.clone(), Arc::new(MockShaderLoader));
        (device, cache)
    }

    #[test]
    fn same_name_returns_identical_state() {
        let (device, cache) = cache();
        let a = cache.get_or_create("blur", &descriptor("blur_vs.cso")).unwrap();
        let b = cache.get_or_create("blur", &descriptor("blur_vs.cso")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(device.pipelines_created(), 1);
    }

    #[test]
    fn different_names_return_distinct_states() {
        let (device, cache) = cache();
        let a = cache.get_or_create("blur", &descriptor("blur_vs.cso")).unwrap();
        let b = cache.get_or_create("post", &descriptor("post_vs.cso")).unwrap();
        assert_ne!(a.id, b.id);
        // Both pipelines share the same binding signature blob.
        assert_eq!(a.binding_signature, b.binding_signature);
        assert_eq!(device.pipelines_created(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_first_use_creates_once() {
        let (device, cache) = cache();
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get_or_create("sky", &descriptor("sky_vs.cso")).unwrap())
            })
            .collect();
        let states: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(device.pipelines_created(), 1);
        assert!(states.iter().all(|s| Arc::ptr_eq(s, &states[0])));
    }

    #[test]
    fn erase_removes_entry() {
        let (_device, cache) = cache();
        cache.get_or_create("blur", &descriptor("blur_vs.cso")).unwrap();
        assert!(cache.contains("blur"));
        cache.erase("blur").unwrap();
        assert!(!cache.contains("blur"));
        assert!(matches!(
            cache.erase("blur"),
            Err(PipelineError::NotCached { .. })
        ));
    }

    #[test]
    fn incomplete_descriptor_fails() {
        let (device, cache) = cache();
        let mut desc = descriptor("vs.cso");
        desc.binding_signature = None;
        assert!(cache.get_or_create("broken", &desc).is_err());
        assert!(cache.is_empty());
        assert_eq!(device.pipelines_created(), 0);
    }
}
