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

use std::sync::Arc;

use super::RendererSettings;
use crate::renderer::api::command::CommandListExecutor;
use crate::renderer::api::descriptor::DescriptorArena;
use crate::renderer::api::pipeline::PipelineStateCache;
use crate::renderer::error::RenderError;
use crate::renderer::traits::{GpuDevice, ShaderLoader};

/// The objects shared by every lane: the device, the submission queue, the
/// descriptor arena and the pipeline cache.
///
/// Cloning is cheap; all members are reference counted.
#[derive(Debug, Clone)]
pub struct GpuContext {
    /// The GPU device.
    pub device: Arc<dyn GpuDevice>,
    /// The shared submission queue.
    pub executor: Arc<CommandListExecutor>,
    /// The shared shader-visible descriptor heap.
    pub arena: Arc<DescriptorArena>,
    /// The shared pipeline state cache.
    pub pipelines: Arc<PipelineStateCache>,
    /// Startup settings.
    pub settings: Arc<RendererSettings>,
}

impl GpuContext {
    /// Validates `settings` and creates the shared objects on `device`.
    pub fn new(
        device: Arc<dyn GpuDevice>,
        shaders: Arc<dyn ShaderLoader>,
        settings: RendererSettings,
    ) -> Result<Self, RenderError> {
        settings.validate()?;

        let arena = DescriptorArena::new(device.as_ref(), settings.descriptor_heap_capacity)?;
        let pipelines = PipelineStateCache::new(Arc::clone(&device), shaders);

        log::info!(
            "GpuContext: {} queued frames, {}x{}",
            settings.queued_frame_count,
            settings.width,
            settings.height
        );

        Ok(Self {
            device,
            executor: Arc::new(CommandListExecutor::new()),
            arena: Arc::new(arena),
            pipelines: Arc::new(pipelines),
            settings: Arc::new(settings),
        })
    }

    /// Number of frames the CPU may record ahead of the GPU.
    pub fn queued_frame_count(&self) -> usize {
        self.settings.queued_frame_count
    }
}
