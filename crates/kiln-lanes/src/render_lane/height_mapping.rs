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

//! Tessellated geometry displaced by a height map.

use std::any::Any;
use std::sync::Arc;

use kiln_core::lane::{Lane, LaneError, LaneKind};
use kiln_core::renderer::{
    FrameContext, GpuContext, HeightMappingConstants, PipelineError, PipelineState,
    PipelineStateCache, PrimitiveTopology, RendererSettings, TextureId,
};

use super::geometry::{
    GeometryInputs, GeometryLaneCore, GeometryLayout, GeometryTargets, TextureTable,
};
use super::{pipelines, RenderLane, RenderTargets};

// Binding signature:
// 0: object constants table (vertex), 1: frame constants (domain),
// 2: frame constants (hull), 3: height texture table (domain),
// 4: material table, 5: frame constants (pixel), 6: diffuse texture table,
// 7: normal texture table, 8: tessellation constants.
const LAYOUT: GeometryLayout = GeometryLayout {
    object_parameter: 0,
    material_parameter: 4,
    frame_parameters: &[1, 2, 5],
    topology: PrimitiveTopology::PatchList3,
};
const HEIGHT_PARAMETER: u32 = 3;
const DIFFUSE_PARAMETER: u32 = 6;
const NORMAL_PARAMETER: u32 = 7;
const TESSELLATION_PARAMETER: u32 = 8;

/// Writes the geometry buffers of meshes tessellated by distance and
/// displaced by a height map.
#[derive(Debug)]
pub struct HeightMappingLane {
    core: GeometryLaneCore,
}

impl HeightMappingLane {
    /// The lane's name, used in logs and the lane registry.
    pub const NAME: &'static str = "HeightMapping";

    /// Builds or fetches the pipeline shared by every `HeightMappingLane`.
    pub fn init_pipeline_state(
        cache: &PipelineStateCache,
        settings: &RendererSettings,
    ) -> Result<Arc<PipelineState>, PipelineError> {
        cache.get_or_create(pipelines::HEIGHT_MAPPING, &pipelines::height_mapping(settings))
    }

    /// Creates an uninitialized lane with its command allocators.
    pub fn new(context: GpuContext) -> Result<Self, LaneError> {
        let pipeline = Self::init_pipeline_state(&context.pipelines, &context.settings)?;
        Ok(Self {
            core: GeometryLaneCore::new(Self::NAME, LAYOUT, context, pipeline)?,
        })
    }

    /// The tessellation parameters taken from the settings.
    pub fn tessellation_constants(settings: &RendererSettings) -> HeightMappingConstants {
        HeightMappingConstants {
            min_tessellation_distance: settings.min_tessellation_distance,
            max_tessellation_distance: settings.max_tessellation_distance,
            min_tessellation_factor: settings.min_tessellation_factor,
            max_tessellation_factor: settings.max_tessellation_factor,
            height_scale: settings.height_scale,
            _padding: [0.0; 3],
        }
    }

    /// Uploads the instances, materials and tessellation parameters, and
    /// creates one view per texture. Every texture slice holds one texture
    /// per instance.
    pub fn init(
        &mut self,
        inputs: GeometryInputs,
        diffuse: &[TextureId],
        normals: &[TextureId],
        heights: &[TextureId],
        targets: &RenderTargets,
    ) -> Result<(), LaneError> {
        let tables = [
            TextureTable {
                kind: "height textures",
                parameter: HEIGHT_PARAMETER,
                textures: heights,
            },
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

        let tessellation = Self::tessellation_constants(&self.core.context().settings);
        let targets = GeometryTargets {
            render_targets: targets.geometry_buffer_views(),
            depth_target: targets.depth.view,
        };
        self.core.init(
            inputs,
            &tables,
            &[(TESSELLATION_PARAMETER, bytemuck::bytes_of(&tessellation))],
            targets,
        )
    }

    /// The allocator slot the next frame records into.
    pub fn frame_index(&self) -> usize {
        self.core.frame_index()
    }
}

impl Lane for HeightMappingLane {
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

impl RenderLane for HeightMappingLane {
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
