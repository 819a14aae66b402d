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

//! Screen-space ambient accessibility from the normals and depth.

use std::any::Any;
use std::sync::Arc;

use kiln_core::lane::{Lane, LaneError, LaneKind};
use kiln_core::math::{Vec3, Vec4};
use kiln_core::renderer::{
    AmbientOcclusionConstants, CommandListKind, CommandListSet, CpuDescriptorHandle,
    DescriptorRange, FrameConstants, FrameContext, GpuContext, PipelineError, PipelineState,
    PipelineStateCache, PrimitiveTopology, RendererSettings, UploadBuffer, UploadBufferGuard,
    MAX_AMBIENT_OCCLUSION_SAMPLES,
};
use thiserror::Error;

use super::{
    bind_pass_state, pipelines, resolve_texture_views, write_texture_views, RenderLane,
    RenderTargets, FULL_SCREEN_VERTEX_COUNT,
};

// Binding signature:
// 0: normal + depth table, 1: sample kernel table, 2: frame constants.
const SURFACE_PARAMETER: u32 = 0;
const KERNEL_PARAMETER: u32 = 1;
const FRAME_PARAMETER: u32 = 2;

const GOLDEN_ANGLE: f32 = 2.399_963;

/// Invalid ambient occlusion inputs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmbientOcclusionInputError {
    /// The render targets carry no geometry buffer to read normals from.
    #[error("no geometry buffer holds the surface normals")]
    MissingNormals,
}

/// Builds a deterministic hemisphere kernel of `sample_count` offsets around
/// `+z`, denser near the origin.
pub fn sample_kernel(sample_count: u32, radius: f32) -> AmbientOcclusionConstants {
    let count = (sample_count as usize).min(MAX_AMBIENT_OCCLUSION_SAMPLES);
    let mut samples = [Vec4::ZERO; MAX_AMBIENT_OCCLUSION_SAMPLES];

    for (i, sample) in samples.iter_mut().take(count).enumerate() {
        let t = (i as f32 + 0.5) / count as f32;
        let cos_theta = 1.0 - t;
        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
        let phi = i as f32 * GOLDEN_ANGLE;
        let direction = Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);

        // Scale up towards 1 so most samples stay close to the shaded point.
        let scale = 0.1 + 0.9 * t * t;
        *sample = (direction * scale).extend(0.0);
    }

    AmbientOcclusionConstants {
        samples,
        sample_count: count as u32,
        radius,
        _padding: [0.0; 2],
    }
}

#[derive(Debug)]
struct AmbientOcclusionData {
    surface: DescriptorRange,
    kernel: DescriptorRange,
    kernel_constants: UploadBuffer,
    frame_constants: UploadBuffer,
    target: CpuDescriptorHandle,
}

/// Computes the ambient accessibility buffer.
#[derive(Debug)]
pub struct AmbientOcclusionLane {
    context: GpuContext,
    pipeline: Arc<PipelineState>,
    commands: CommandListSet,
    data: Option<AmbientOcclusionData>,
}

impl AmbientOcclusionLane {
    /// The lane's name, used in logs and the lane registry.
    pub const NAME: &'static str = "AmbientOcclusion";

    /// Builds or fetches the pipeline shared by every `AmbientOcclusionLane`.
    pub fn init_pipeline_state(
        cache: &PipelineStateCache,
        settings: &RendererSettings,
    ) -> Result<Arc<PipelineState>, PipelineError> {
        cache.get_or_create(
            pipelines::AMBIENT_OCCLUSION,
            &pipelines::ambient_occlusion(settings),
        )
    }

    /// Creates an uninitialized lane with its command allocators.
    pub fn new(context: GpuContext) -> Result<Self, LaneError> {
        let pipeline = Self::init_pipeline_state(&context.pipelines, &context.settings)?;
        let commands = CommandListSet::new(
            context.device.as_ref(),
            CommandListKind::Direct,
            context.queued_frame_count(),
            Self::NAME,
        )?;
        Ok(Self {
            context,
            pipeline,
            commands,
            data: None,
        })
    }

    /// Creates views of the normal and depth buffers and uploads the kernel.
    pub fn init(&mut self, targets: &RenderTargets) -> Result<(), LaneError> {
        if self.data.is_some() {
            return Err(LaneError::AlreadyInitialized { lane: Self::NAME });
        }
        let device = self.context.device.as_ref();
        let settings = &self.context.settings;

        let normals = targets
            .geometry_buffers
            .first()
            .ok_or_else(|| {
                LaneError::invalid_input(Self::NAME, AmbientOcclusionInputError::MissingNormals)
            })?;

        let surface_views =
            resolve_texture_views(device, &[normals.texture, targets.depth.texture])?;

        let block = self.context.arena.allocate(3)?;
        let surface = block.sub_range(0, 2);
        let kernel = block.sub_range(2, 1);
        write_texture_views(device, &surface_views, &surface)?;

        let mut buffers = UploadBufferGuard::new(device);
        let kernel_constants =
            buffers.for_constants::<AmbientOcclusionConstants>(1, "Ambient occlusion kernel")?;
        kernel_constants.copy_constants(
            device,
            0,
            &sample_kernel(
                settings.ambient_occlusion_samples,
                settings.ambient_occlusion_radius,
            ),
        )?;
        device.create_constant_buffer_view(&kernel_constants.constant_buffer_view(0), kernel.cpu(0))?;

        let frame_constants = buffers.for_constants::<FrameConstants>(
            self.context.queued_frame_count() as u32,
            "Frame constants",
        )?;
        buffers.commit();

        self.data = Some(AmbientOcclusionData {
            surface,
            kernel,
            kernel_constants,
            frame_constants,
            target: targets.ambient_accessibility.view,
        });
        Ok(())
    }
}

impl Lane for AmbientOcclusionLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Ambient
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RenderLane for AmbientOcclusionLane {
    fn is_data_valid(&self) -> bool {
        self.commands.is_valid()
            && self.data.as_ref().is_some_and(|d| {
                !d.surface.gpu(0).is_null() && !d.kernel.gpu(0).is_null() && !d.target.is_null()
            })
    }

    fn record_and_push(&mut self, frame: &FrameContext<'_>) -> Result<u32, LaneError> {
        let data = self
            .data
            .as_ref()
            .ok_or(LaneError::NotInitialized { lane: Self::NAME })?;
        let device = self.context.device.as_ref();
        let slot = self.commands.frame_index() as u32;

        let list = self.commands.begin(device, Some(self.pipeline.id))?;
        if let Err(e) = data.frame_constants.copy_constants(device, slot, frame.constants) {
            self.commands.abandon();
            return Err(e.into());
        }

        bind_pass_state(list, &self.context, &self.pipeline, &[data.target], None);
        list.set_graphics_root_descriptor_table(SURFACE_PARAMETER, data.surface.gpu(0));
        list.set_graphics_root_descriptor_table(KERNEL_PARAMETER, data.kernel.gpu(0));
        list.set_graphics_root_constant_buffer_view(
            FRAME_PARAMETER,
            data.frame_constants.element_address(slot),
        );
        list.set_primitive_topology(PrimitiveTopology::TriangleList);
        list.draw_instanced(FULL_SCREEN_VERTEX_COUNT, 1, 0, 0);

        self.commands.close_and_push(&self.context.executor)?;
        Ok(1)
    }

    fn release(&mut self) {
        if let Some(data) = self.data.take() {
            let device = self.context.device.as_ref();
            data.kernel_constants.destroy(device);
            data.frame_constants.destroy(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kernel_samples_lie_in_the_upper_unit_hemisphere() {
        let kernel = sample_kernel(16, 0.5);
        assert_eq!(kernel.sample_count, 16);
        assert_relative_eq!(kernel.radius, 0.5);

        for sample in &kernel.samples[..16] {
            assert!(sample.z > 0.0);
            assert!(sample.truncate().length() <= 1.0 + f32::EPSILON);
        }
        assert!(kernel.samples[16..].iter().all(|s| *s == Vec4::ZERO));
    }

    #[test]
    fn kernel_is_deterministic_and_clamped() {
        assert_eq!(sample_kernel(8, 1.0), sample_kernel(8, 1.0));
        assert_eq!(sample_kernel(100, 1.0).sample_count, MAX_AMBIENT_OCCLUSION_SAMPLES as u32);
    }
}
