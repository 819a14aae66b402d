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

//! Loads precompiled blobs from a directory tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use kiln_core::renderer::{ShaderError, ShaderLoader};

/// Resolves blob paths relative to a root directory and caches every blob
/// after its first read.
#[derive(Debug)]
pub struct FileShaderLoader {
    root: PathBuf,
    cache: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl FileShaderLoader {
    /// Creates a loader rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The directory blob paths are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of blobs read so far.
    pub fn cached_count(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ShaderLoader for FileShaderLoader {
    fn load_compiled_shader(&self, path: &str) -> Result<Arc<[u8]>, ShaderError> {
        if let Some(blob) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return Ok(Arc::clone(blob));
        }

        let full_path = self.root.join(path);
        let bytes = std::fs::read(&full_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ShaderError::NotFound {
                path: path.to_string(),
            },
            _ => ShaderError::LoadError {
                path: path.to_string(),
                source_error: e.to_string(),
            },
        })?;
        if bytes.is_empty() {
            return Err(ShaderError::InvalidBytecode {
                path: path.to_string(),
            });
        }

        log::debug!(
            "FileShaderLoader: loaded '{}' ({} bytes)",
            full_path.display(),
            bytes.len()
        );
        let blob: Arc<[u8]> = Arc::from(bytes);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), Arc::clone(&blob));
        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_blobs_relative_to_the_root_and_caches_them() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("color")).unwrap();
        std::fs::write(dir.path().join("color/vs.cso"), [1u8, 2, 3]).unwrap();

        let loader = FileShaderLoader::new(dir.path());
        let blob = loader.load_compiled_shader("color/vs.cso").unwrap();
        assert_eq!(&blob[..], &[1, 2, 3]);

        std::fs::remove_file(dir.path().join("color/vs.cso")).unwrap();
        let cached = loader.load_compiled_shader("color/vs.cso").unwrap();
        assert!(Arc::ptr_eq(&blob, &cached));
        assert_eq!(loader.cached_count(), 1);
    }

    #[test]
    fn missing_and_empty_blobs_are_reported() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("empty.cso"), b"").unwrap();
        let loader = FileShaderLoader::new(dir.path());

        assert!(matches!(
            loader.load_compiled_shader("missing.cso"),
            Err(ShaderError::NotFound { .. })
        ));
        assert!(matches!(
            loader.load_compiled_shader("empty.cso"),
            Err(ShaderError::InvalidBytecode { .. })
        ));
    }
}
