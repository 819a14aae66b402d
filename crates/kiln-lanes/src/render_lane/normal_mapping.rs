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

//! Geometry with diffuse and normal maps.

use std::any::Any;
use std::sync::Arc;

use kiln_core::lane::{Lane, LaneError, LaneKind};
use kiln_core::renderer::{
    FrameContext, GpuContext, PipelineError, PipelineState, PipelineStateCache, PrimitiveTopology,
    RendererSettings, TextureId,
};

use super::geometry::{
    GeometryInputs, GeometryLaneCore, GeometryLayout, GeometryTargets, TextureTable,
};
use super::{pipelines, RenderLane, RenderTargets};

// Binding signature:
// 0: object constants table, 1: frame constants (vertex), 2: material table,
// 3: frame constants (pixel), 4: diffuse texture table, 5: normal texture table.
const LAYOUT: GeometryLayout = GeometryLayout {
    object_parameter: 0,
    material_parameter: 2,
    frame_parameters: &[1, 3],
    topology: PrimitiveTopology::TriangleList,
};
const DIFFUSE_PARAMETER: u32 = 4;
const NORMAL_PARAMETER: u32 = 5;

/// Writes the geometry buffers of meshes with diffuse and normal maps.
#[derive(Debug)]
pub struct NormalMappingLane {
    core: GeometryLaneCore,
}

impl NormalMappingLane {
    /// The lane's name, used in logs and the lane registry.
    pub const NAME: &'static str = "NormalMapping";

    /// Builds or fetches the pipeline shared by every `NormalMappingLane`.
    pub fn init_pipeline_state(
        cache: &PipelineStateCache,
        settings: &RendererSettings,
    ) -> Result<Arc<PipelineState>, PipelineError> {
        cache.get_or_create(pipelines::NORMAL_MAPPING, &pipelines::normal_mapping(settings))
    }

    /// Creates an uninitialized lane with its command allocators.
    pub fn new(context: GpuContext) -> Result<Self, LaneError> {
        let pipeline = Self::init_pipeline_state(&context.pipelines, &context.settings)?;
        Ok(Self {
            core: GeometryLaneCore::new(Self::NAME, LAYOUT, context, pipeline)?,
        })
    }

    /// Uploads the instances and materials and creates one view per texture.
    /// `diffuse` and `normals` hold one texture per instance.
    pub fn init(
        &mut self,
        inputs: GeometryInputs,
        diffuse: &[TextureId],
        normals: &[TextureId],
        targets: &RenderTargets,
    ) -> Result<(), LaneError> {
        let tables = [
            TextureTable {
                kind: "diffuse textures",
                parameter: DIFFUSE_PARAMETER,
                textures: diffuse,
            },
            TextureTable {
                kind: "normal textures",
                parameter: NORMAL_PARAMETER,
                textures: normals,
            },
        ];
        let targets = GeometryTargets {
            render_targets: targets.geometry_buffer_views(),
            depth_target: targets.depth.view,
        };
        self.core.init(inputs, &tables, &[], targets)
    }

    /// The allocator slot the next frame records into.
    pub fn frame_index(&self) -> usize {
        self.core.frame_index()
    }
}

impl Lane for NormalMappingLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Geometry
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RenderLane for NormalMappingLane {
    fn is_data_valid(&self) -> bool {
        self.core.is_data_valid()
    }

    fn record_and_push(&mut self, frame: &FrameContext<'_>) -> Result<u32, LaneError> {
        self.core.record_and_push(frame)
    }

    fn release(&mut self) {
        self.core.release();
    }
}
