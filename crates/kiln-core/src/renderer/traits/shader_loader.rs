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

use crate::renderer::error::ShaderError;
use std::fmt::Debug;
use std::sync::Arc;

/// Loads precompiled shader and binding-signature blobs by path.
///
/// Blobs are opaque to the renderer; they are only forwarded to the device.
pub trait ShaderLoader: Send + Sync + Debug {
    /// Returns the blob stored under `path`.
    /// ## Errors
    /// * `ShaderError::NotFound` / `ShaderError::LoadError` - If the blob is unavailable.
    /// * `ShaderError::InvalidBytecode` - If the blob is empty.
    fn load_compiled_shader(&self, path: &str) -> Result<Arc<[u8]>, ShaderError>;
}
