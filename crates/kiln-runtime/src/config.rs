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

//! Runtime configuration, read from a RON file.

use std::path::Path;

use anyhow::Context;
use kiln_core::renderer::RendererSettings;
use kiln_infra::HeadlessConfig;
use serde::{Deserialize, Serialize};

/// Shape of the generated demo scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Cubes per side of the color-mapped grid.
    pub grid_size: u32,
    /// Normal-mapped spheres in a ring around the grid.
    pub sphere_count: u32,
    /// Punctual lights in a ring above the scene.
    pub light_count: u32,
    /// Texture coordinate scale of textured geometry.
    pub texture_scale: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            grid_size: 3,
            sphere_count: 4,
            light_count: 4,
            texture_scale: 1.0,
        }
    }
}

/// How the emulated GPU progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    /// Complete every batch as soon as it is signaled.
    pub complete_on_signal: bool,
    /// Retire the oldest batch once more than this many are in flight.
    pub max_in_flight_batches: Option<usize>,
}

impl From<GpuConfig> for HeadlessConfig {
    fn from(config: GpuConfig) -> Self {
        HeadlessConfig {
            complete_on_signal: config.complete_on_signal,
            max_in_flight_batches: config.max_in_flight_batches,
        }
    }
}

/// Everything the runtime reads from its configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Renderer settings, validated when the GPU context is created.
    pub renderer: RendererSettings,
    /// The demo scene.
    pub scene: SceneConfig,
    /// The emulated GPU.
    pub gpu: GpuConfig,
}

impl RuntimeConfig {
    /// Loads the configuration at `path`, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            log::info!("No configuration file given, using defaults");
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config = ron::from_str(&text)
            .with_context(|| format!("failed to parse configuration {}", path.display()))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_fields_keep_their_defaults() {
        let config: RuntimeConfig = ron::from_str("(scene: (light_count: 9))").unwrap();
        assert_eq!(config.scene.light_count, 9);
        assert_eq!(config.scene.grid_size, SceneConfig::default().grid_size);
        assert_eq!(config.renderer, RendererSettings::default());
    }

    #[test]
    fn loads_the_shipped_demo_configuration() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/demo.ron");
        let config = RuntimeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.renderer.queued_frame_count, 3);
        assert_eq!(config.gpu.max_in_flight_batches, Some(2));
        assert!(config.renderer.validate().is_ok());
    }

    #[test]
    fn parse_errors_name_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(renderer: (width: \"wide\"))").unwrap();
        let err = RuntimeConfig::load(Some(file.path())).unwrap_err();
        assert!(format!("{err}").contains("failed to parse configuration"));
    }
}
