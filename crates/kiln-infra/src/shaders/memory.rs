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

//! Blobs registered at runtime.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use kiln_core::renderer::{ShaderError, ShaderLoader};

/// A loader backed by an in-memory table, for tools and headless runs that
/// synthesize their blobs.
#[derive(Debug, Default)]
pub struct InMemoryShaderLoader {
    blobs: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl InMemoryShaderLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bytes` under `path`, replacing any previous blob.
    pub fn register(&self, path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), bytes.into());
    }

    /// Registers a placeholder blob for each path, built from the path itself.
    pub fn register_placeholders<'a>(&self, paths: impl IntoIterator<Item = &'a str>) {
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        for path in paths {
            blobs
                .entry(path.to_string())
                .or_insert_with(|| Arc::from(path.as_bytes()));
        }
    }

    /// Whether a blob is registered under `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }
}

impl ShaderLoader for InMemoryShaderLoader {
    fn load_compiled_shader(&self, path: &str) -> Result<Arc<[u8]>, ShaderError> {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        let blob = blobs.get(path).ok_or_else(|| ShaderError::NotFound {
            path: path.to_string(),
        })?;
        if blob.is_empty() {
            return Err(ShaderError::InvalidBytecode {
                path: path.to_string(),
            });
        }
        Ok(Arc::clone(blob))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_blobs_are_returned() {
        let loader = InMemoryShaderLoader::new();
        loader.register("a.cso", vec![7u8, 8]);
        loader.register_placeholders(["b.cso", "a.cso"]);

        assert_eq!(&loader.load_compiled_shader("a.cso").unwrap()[..], &[7, 8]);
        assert_eq!(&loader.load_compiled_shader("b.cso").unwrap()[..], b"b.cso");
        assert!(matches!(
            loader.load_compiled_shader("c.cso"),
            Err(ShaderError::NotFound { .. })
        ));
    }
}
