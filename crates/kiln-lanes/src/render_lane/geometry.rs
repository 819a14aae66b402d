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

//! Shared machinery of the geometry lanes.
//!
//! Color, normal-mapped and height-mapped geometry differ only in which
//! descriptor tables they bind, at which root parameters, and in topology.
//! [`GeometryLaneCore`] owns everything else: input validation, the
//! descriptor block carved into one sub-range per table kind, the constant
//! buffers and the per-instance draw loop.

use std::sync::Arc;

use kiln_core::lane::LaneError;
use kiln_core::renderer::{
    total_instance_count, CommandListKind, CommandListSet, CpuDescriptorHandle, DescriptorRange,
    FrameConstants, FrameContext, GeometryData, GpuContext, MaterialProperties, ObjectConstants,
    PipelineState, PrimitiveTopology, RenderError, ResourceError, TextureId, UploadBuffer,
    UploadBufferGuard,
};
use thiserror::Error;

use super::{bind_pass_state, resolve_texture_views, write_texture_views};

/// Inconsistent scene data handed to a geometry lane.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryInputError {
    /// No geometry entry was provided.
    #[error("no geometry entries were provided")]
    EmptyGeometry,
    /// A geometry entry has no world matrix, so it would never be drawn.
    #[error("geometry entry {index} has no world matrices")]
    EmptyInstances {
        /// Position of the entry.
        index: usize,
    },
    /// A per-instance collection does not have one element per instance.
    #[error("expected {expected} {kind} (one per instance), found {found}")]
    CountMismatch {
        /// What was counted.
        kind: &'static str,
        /// The total instance count.
        expected: u32,
        /// The collection length.
        found: usize,
    },
}

/// The scene data every geometry lane draws: meshes, their instances and one
/// material per instance.
#[derive(Debug, Clone)]
pub struct GeometryInputs {
    /// Meshes, each drawn once per world matrix.
    pub geometry: Vec<GeometryData>,
    /// One material per instance, in instance order.
    pub materials: Vec<MaterialProperties>,
    /// Scale applied to texture coordinates of every instance.
    pub texture_scale: f32,
}

impl GeometryInputs {
    /// Creates inputs with a unit texture scale.
    pub fn new(geometry: Vec<GeometryData>, materials: Vec<MaterialProperties>) -> Self {
        Self {
            geometry,
            materials,
            texture_scale: 1.0,
        }
    }

    /// Sets the texture coordinate scale.
    pub fn with_texture_scale(mut self, texture_scale: f32) -> Self {
        self.texture_scale = texture_scale;
        self
    }

    /// Total number of instances over all entries.
    pub fn instance_count(&self) -> u32 {
        total_instance_count(&self.geometry)
    }
}

/// A table of one texture per instance, bound at `parameter`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextureTable<'a> {
    pub kind: &'static str,
    pub parameter: u32,
    pub textures: &'a [TextureId],
}

/// Root parameter assignment of a geometry lane.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GeometryLayout {
    pub object_parameter: u32,
    pub material_parameter: u32,
    pub frame_parameters: &'static [u32],
    pub topology: PrimitiveTopology,
}

/// Checks that every per-instance collection matches the instance count.
pub(crate) fn validate_inputs(
    inputs: &GeometryInputs,
    textures: &[TextureTable<'_>],
) -> Result<u32, GeometryInputError> {
    if inputs.geometry.is_empty() {
        return Err(GeometryInputError::EmptyGeometry);
    }
    if let Some(index) = inputs.geometry.iter().position(|g| g.world_matrices.is_empty()) {
        return Err(GeometryInputError::EmptyInstances { index });
    }

    let expected = inputs.instance_count();
    let counts = std::iter::once(("materials", inputs.materials.len()))
        .chain(textures.iter().map(|t| (t.kind, t.textures.len())));
    for (kind, found) in counts {
        if found != expected as usize {
            return Err(GeometryInputError::CountMismatch {
                kind,
                expected,
                found,
            });
        }
    }
    Ok(expected)
}

/// Slots needed for one object, one material and one texture descriptor per
/// table, for every instance.
fn descriptor_block_len(instance_count: u32, table_count: usize) -> Option<u32> {
    u32::try_from(table_count)
        .ok()?
        .checked_add(2)?
        .checked_mul(instance_count)
}

#[derive(Debug)]
struct GeometryLaneData {
    geometry: Vec<GeometryData>,
    /// Descriptor tables sorted by root parameter.
    tables: Vec<(u32, DescriptorRange)>,
    object_constants: UploadBuffer,
    material_constants: UploadBuffer,
    frame_constants: UploadBuffer,
    root_constants: Vec<(u32, UploadBuffer)>,
    render_targets: Vec<CpuDescriptorHandle>,
    depth_target: CpuDescriptorHandle,
}

/// Where a geometry lane draws.
#[derive(Debug, Clone)]
pub(crate) struct GeometryTargets {
    pub render_targets: Vec<CpuDescriptorHandle>,
    pub depth_target: CpuDescriptorHandle,
}

#[derive(Debug)]
pub(crate) struct GeometryLaneCore {
    name: &'static str,
    layout: GeometryLayout,
    context: GpuContext,
    pipeline: Arc<PipelineState>,
    commands: CommandListSet,
    data: Option<GeometryLaneData>,
}

impl GeometryLaneCore {
    pub(crate) fn new(
        name: &'static str,
        layout: GeometryLayout,
        context: GpuContext,
        pipeline: Arc<PipelineState>,
    ) -> Result<Self, LaneError> {
        let commands = CommandListSet::new(
            context.device.as_ref(),
            CommandListKind::Direct,
            context.queued_frame_count(),
            name,
        )?;
        Ok(Self {
            name,
            layout,
            context,
            pipeline,
            commands,
            data: None,
        })
    }

    pub(crate) fn context(&self) -> &GpuContext {
        &self.context
    }

    pub(crate) fn frame_index(&self) -> usize {
        self.commands.frame_index()
    }

    /// Validates the inputs, fills the descriptor block and the constant
    /// buffers. Each of `root_constants` is uploaded once and bound every
    /// frame at its root parameter.
    pub(crate) fn init(
        &mut self,
        inputs: GeometryInputs,
        textures: &[TextureTable<'_>],
        root_constants: &[(u32, &[u8])],
        targets: GeometryTargets,
    ) -> Result<(), LaneError> {
        if self.data.is_some() {
            return Err(LaneError::AlreadyInitialized { lane: self.name });
        }
        let count = validate_inputs(&inputs, textures)
            .map_err(|e| LaneError::invalid_input(self.name, e))?;

        let device = self.context.device.as_ref();
        let views = textures
            .iter()
            .map(|table| resolve_texture_views(device, table.textures))
            .collect::<Result<Vec<_>, _>>()?;
        let block_len = descriptor_block_len(count, textures.len()).ok_or_else(|| {
            RenderError::DescriptorHeapExhausted {
                requested: u32::MAX,
                available: self.context.arena.capacity() - self.context.arena.allocated(),
            }
        })?;
        let block = self.context.arena.allocate(block_len)?;
        let objects = block.sub_range(0, count);
        let materials = block.sub_range(count, count);
        let mut buffers = UploadBufferGuard::new(device);

        let object_constants = buffers.for_constants::<ObjectConstants>(count, "Object constants")?;
        let world_matrices = inputs.geometry.iter().flat_map(|g| g.world_matrices.iter());
        for (i, world) in (0..count).zip(world_matrices) {
            object_constants.copy_constants(device, i, &ObjectConstants::new(world, inputs.texture_scale))?;
            device.create_constant_buffer_view(&object_constants.constant_buffer_view(i), objects.cpu(i))?;
        }

        let material_constants =
            buffers.for_constants::<MaterialProperties>(count, "Material constants")?;
        for (i, material) in (0..count).zip(&inputs.materials) {
            material_constants.copy_constants(device, i, material)?;
            device.create_constant_buffer_view(
                &material_constants.constant_buffer_view(i),
                materials.cpu(i),
            )?;
        }

        let mut tables = vec![
            (self.layout.object_parameter, objects),
            (self.layout.material_parameter, materials),
        ];
        for (k, (table, views)) in textures.iter().zip(&views).enumerate() {
            let range = block.sub_range((2 + k as u32) * count, count);
            write_texture_views(device, views, &range)?;
            tables.push((table.parameter, range));
        }
        tables.sort_by_key(|(parameter, _)| *parameter);

        let frame_constants = buffers.for_constants::<FrameConstants>(
            self.context.queued_frame_count() as u32,
            "Frame constants",
        )?;
        let root_constants = root_constants
            .iter()
            .map(|(parameter, bytes)| -> Result<_, ResourceError> {
                let buffer = buffers.create(bytes.len() as u64, 1, "Root constants")?;
                buffer.copy_data(device, 0, bytes)?;
                Ok((*parameter, buffer))
            })
            .collect::<Result<Vec<_>, _>>()?;
        buffers.commit();

        log::debug!(
            "{}: initialized {} instances over {} meshes, descriptors {}..{}",
            self.name,
            count,
            inputs.geometry.len(),
            block.first_slot(),
            block.first_slot() + block.len()
        );
        self.data = Some(GeometryLaneData {
            geometry: inputs.geometry,
            tables,
            object_constants,
            material_constants,
            frame_constants,
            root_constants,
            render_targets: targets.render_targets,
            depth_target: targets.depth_target,
        });
        Ok(())
    }

    pub(crate) fn is_data_valid(&self) -> bool {
        self.commands.is_valid()
            && self.data.as_ref().is_some_and(|data| {
                data.tables.iter().all(|(_, range)| !range.gpu(0).is_null())
                    && !data.render_targets.is_empty()
                    && !data.depth_target.is_null()
            })
    }

    /// Records one indexed draw per instance. Before each draw every table
    /// is pointed at the instance's descriptor, in root parameter order.
    pub(crate) fn record_and_push(&mut self, frame: &FrameContext<'_>) -> Result<u32, LaneError> {
        let data = self
            .data
            .as_ref()
            .ok_or(LaneError::NotInitialized { lane: self.name })?;
        let device = self.context.device.as_ref();
        let slot = self.commands.frame_index() as u32;

        let list = self.commands.begin(device, Some(self.pipeline.id))?;
        if let Err(e) = data.frame_constants.copy_constants(device, slot, frame.constants) {
            self.commands.abandon();
            return Err(e.into());
        }

        bind_pass_state(
            list,
            &self.context,
            &self.pipeline,
            &data.render_targets,
            Some(data.depth_target),
        );
        let frame_address = data.frame_constants.element_address(slot);
        for parameter in self.layout.frame_parameters {
            list.set_graphics_root_constant_buffer_view(*parameter, frame_address);
        }
        for (parameter, buffer) in &data.root_constants {
            list.set_graphics_root_constant_buffer_view(*parameter, buffer.element_address(0));
        }
        list.set_primitive_topology(self.layout.topology);

        let mut instance = 0;
        for entry in &data.geometry {
            list.set_vertex_buffers(0, &[entry.vertex_buffer]);
            list.set_index_buffer(&entry.index_buffer);
            for _ in 0..entry.instance_count() {
                for (parameter, range) in &data.tables {
                    list.set_graphics_root_descriptor_table(*parameter, range.gpu(instance));
                }
                list.draw_indexed_instanced(entry.index_count(), 1, 0, 0, 0);
                instance += 1;
            }
        }

        self.commands.close_and_push(&self.context.executor)?;
        Ok(1)
    }

    pub(crate) fn release(&mut self) {
        if let Some(data) = self.data.take() {
            let device = self.context.device.as_ref();
            data.object_constants.destroy(device);
            data.material_constants.destroy(device);
            data.frame_constants.destroy(device);
            for (_, buffer) in data.root_constants {
                buffer.destroy(device);
            }
            log::debug!("{}: released", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::math::Mat4;
    use kiln_core::renderer::{
        BufferId, GpuVirtualAddress, IndexBufferView, IndexFormat, VertexBufferView,
    };

    fn entry(instances: usize) -> GeometryData {
        GeometryData {
            vertex_buffer: VertexBufferView {
                buffer: BufferId(1),
                location: GpuVirtualAddress(0x1000),
                size_in_bytes: 48,
                stride_in_bytes: 48,
            },
            index_buffer: IndexBufferView {
                buffer: BufferId(2),
                location: GpuVirtualAddress(0x2000),
                size_in_bytes: 12,
                format: IndexFormat::Uint32,
            },
            world_matrices: vec![Mat4::IDENTITY; instances],
        }
    }

    fn materials(count: usize) -> Vec<MaterialProperties> {
        vec![MaterialProperties::new(glam::Vec4::ONE, 0.0, 0.5); count]
    }

    #[test]
    fn consistent_inputs_report_the_instance_count() {
        let inputs = GeometryInputs::new(vec![entry(3), entry(5)], materials(8));
        let diffuse = [TextureId(1); 8];
        let tables = [TextureTable {
            kind: "diffuse textures",
            parameter: 4,
            textures: &diffuse,
        }];
        assert_eq!(validate_inputs(&inputs, &tables), Ok(8));
    }

    #[test]
    fn empty_collections_are_rejected() {
        let inputs = GeometryInputs::new(Vec::new(), Vec::new());
        assert_eq!(
            validate_inputs(&inputs, &[]),
            Err(GeometryInputError::EmptyGeometry)
        );

        let inputs = GeometryInputs::new(vec![entry(2), entry(0)], materials(2));
        assert_eq!(
            validate_inputs(&inputs, &[]),
            Err(GeometryInputError::EmptyInstances { index: 1 })
        );
    }

    #[test]
    fn count_mismatches_name_the_offending_collection() {
        let inputs = GeometryInputs::new(vec![entry(3)], materials(3));
        let normals = [TextureId(1); 2];
        let tables = [TextureTable {
            kind: "normal textures",
            parameter: 5,
            textures: &normals,
        }];
        assert_eq!(
            validate_inputs(&inputs, &tables),
            Err(GeometryInputError::CountMismatch {
                kind: "normal textures",
                expected: 3,
                found: 2
            })
        );

        let inputs = GeometryInputs::new(vec![entry(3)], materials(4));
        let err = validate_inputs(&inputs, &[]).unwrap_err();
        assert_eq!(err.to_string(), "expected 3 materials (one per instance), found 4");
    }

    #[test]
    fn descriptor_block_len_refuses_to_wrap() {
        assert_eq!(descriptor_block_len(8, 2), Some(32));
        assert_eq!(descriptor_block_len(u32::MAX / 3, 1), Some(u32::MAX / 3 * 3));
        assert_eq!(descriptor_block_len(u32::MAX / 3 + 1, 1), None);
        assert_eq!(descriptor_block_len(1, usize::MAX), None);
    }
}
