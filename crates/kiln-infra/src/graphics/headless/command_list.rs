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

//! Command lists that record into a host-side command stream.

use std::sync::Arc;

use kiln_core::renderer::{
    BindingSignatureId, CommandAllocatorId, CommandListId, CommandListKind, CpuDescriptorHandle,
    DescriptorHeapId, GpuDescriptorHandle, GpuVirtualAddress, GraphicsCommandList,
    IndexBufferView, PipelineStateId, PrimitiveTopology, RenderError, ScissorRect,
    VertexBufferView, Viewport,
};

use super::device::HeadlessDeviceInternal;

/// One recorded command, replayed when the owning batch completes.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// Initial pipeline state bound by `reset`.
    SetPipelineState(PipelineStateId),
    /// `set_viewports`.
    SetViewports(Vec<Viewport>),
    /// `set_scissor_rects`.
    SetScissorRects(Vec<ScissorRect>),
    /// `set_render_targets`.
    SetRenderTargets {
        /// Color targets.
        color: Vec<CpuDescriptorHandle>,
        /// Depth target.
        depth: Option<CpuDescriptorHandle>,
    },
    /// `clear_render_target`.
    ClearRenderTarget {
        /// The cleared view.
        target: CpuDescriptorHandle,
        /// The clear color.
        color: [f32; 4],
    },
    /// `clear_depth_stencil`.
    ClearDepthStencil {
        /// The cleared view.
        target: CpuDescriptorHandle,
        /// The clear depth.
        depth: f32,
        /// The clear stencil.
        stencil: u8,
    },
    /// `set_descriptor_heaps`.
    SetDescriptorHeaps(Vec<DescriptorHeapId>),
    /// `set_graphics_binding_signature`.
    SetBindingSignature(BindingSignatureId),
    /// `set_graphics_root_descriptor_table`.
    SetRootDescriptorTable {
        /// Root parameter index.
        parameter: u32,
        /// First descriptor of the table.
        base: GpuDescriptorHandle,
    },
    /// `set_graphics_root_constant_buffer_view`.
    SetRootConstantBufferView {
        /// Root parameter index.
        parameter: u32,
        /// Address of the constants.
        address: GpuVirtualAddress,
    },
    /// `set_primitive_topology`.
    SetPrimitiveTopology(PrimitiveTopology),
    /// `set_vertex_buffers`.
    SetVertexBuffers {
        /// First slot.
        start_slot: u32,
        /// Bound views.
        views: Vec<VertexBufferView>,
    },
    /// `set_index_buffer`.
    SetIndexBuffer(IndexBufferView),
    /// `draw_instanced`.
    Draw {
        /// Vertices per instance.
        vertex_count: u32,
        /// Instances.
        instance_count: u32,
        /// First vertex.
        start_vertex: u32,
        /// First instance.
        start_instance: u32,
    },
    /// `draw_indexed_instanced`.
    DrawIndexed {
        /// Indices per instance.
        index_count: u32,
        /// Instances.
        instance_count: u32,
        /// First index.
        start_index: u32,
        /// Value added to each index.
        base_vertex: i32,
        /// First instance.
        start_instance: u32,
    },
}

#[derive(Debug, PartialEq, Eq)]
enum ListState {
    Recording,
    Closed,
}

/// A command list recording into a `Vec<RecordedCommand>`.
///
/// On `close` the stream is handed to the device, where it waits to be
/// submitted with `execute_command_lists`.
#[derive(Debug)]
pub struct HeadlessCommandList {
    id: CommandListId,
    kind: CommandListKind,
    device: Arc<HeadlessDeviceInternal>,
    allocator: CommandAllocatorId,
    commands: Vec<RecordedCommand>,
    state: ListState,
    recorded_while_closed: bool,
}

impl HeadlessCommandList {
    pub(crate) fn new(
        id: CommandListId,
        kind: CommandListKind,
        allocator: CommandAllocatorId,
        device: Arc<HeadlessDeviceInternal>,
    ) -> Self {
        Self {
            id,
            kind,
            device,
            allocator,
            commands: Vec::new(),
            state: ListState::Closed,
            recorded_while_closed: false,
        }
    }

    fn record(&mut self, command: RecordedCommand) {
        if self.state == ListState::Recording {
            self.commands.push(command);
        } else {
            self.recorded_while_closed = true;
        }
    }
}

impl GraphicsCommandList for HeadlessCommandList {
    fn id(&self) -> CommandListId {
        self.id
    }

    fn reset(
        &mut self,
        allocator: CommandAllocatorId,
        pipeline: Option<PipelineStateId>,
    ) -> Result<(), RenderError> {
        if self.state == ListState::Recording {
            return Err(RenderError::InvalidCommandListState {
                list: self.id,
                reason: "reset while recording",
            });
        }
        self.device.check_list_reset(self.id, self.kind, allocator)?;

        self.allocator = allocator;
        self.commands.clear();
        self.state = ListState::Recording;
        if let Some(pipeline) = pipeline {
            self.commands.push(RecordedCommand::SetPipelineState(pipeline));
        }
        Ok(())
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        self.record(RecordedCommand::SetViewports(viewports.to_vec()));
    }

    fn set_scissor_rects(&mut self, rects: &[ScissorRect]) {
        self.record(RecordedCommand::SetScissorRects(rects.to_vec()));
    }

    fn set_render_targets(
        &mut self,
        color_targets: &[CpuDescriptorHandle],
        depth_stencil: Option<CpuDescriptorHandle>,
    ) {
        self.record(RecordedCommand::SetRenderTargets {
            color: color_targets.to_vec(),
            depth: depth_stencil,
        });
    }

    fn clear_render_target(&mut self, target: CpuDescriptorHandle, color: [f32; 4]) {
        self.record(RecordedCommand::ClearRenderTarget { target, color });
    }

    fn clear_depth_stencil(&mut self, target: CpuDescriptorHandle, depth: f32, stencil: u8) {
        self.record(RecordedCommand::ClearDepthStencil {
            target,
            depth,
            stencil,
        });
    }

    fn set_descriptor_heaps(&mut self, heaps: &[DescriptorHeapId]) {
        self.record(RecordedCommand::SetDescriptorHeaps(heaps.to_vec()));
    }

    fn set_graphics_binding_signature(&mut self, signature: BindingSignatureId) {
        self.record(RecordedCommand::SetBindingSignature(signature));
    }

    fn set_graphics_root_descriptor_table(&mut self, parameter: u32, base: GpuDescriptorHandle) {
        self.record(RecordedCommand::SetRootDescriptorTable { parameter, base });
    }

    fn set_graphics_root_constant_buffer_view(
        &mut self,
        parameter: u32,
        address: GpuVirtualAddress,
    ) {
        self.record(RecordedCommand::SetRootConstantBufferView { parameter, address });
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.record(RecordedCommand::SetPrimitiveTopology(topology));
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]) {
        self.record(RecordedCommand::SetVertexBuffers {
            start_slot,
            views: views.to_vec(),
        });
    }

    fn set_index_buffer(&mut self, view: &IndexBufferView) {
        self.record(RecordedCommand::SetIndexBuffer(*view));
    }

    fn draw_instanced(
        &mut self,
        vertex_count_per_instance: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    ) {
        self.record(RecordedCommand::Draw {
            vertex_count: vertex_count_per_instance,
            instance_count,
            start_vertex,
            start_instance,
        });
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        self.record(RecordedCommand::DrawIndexed {
            index_count: index_count_per_instance,
            instance_count,
            start_index,
            base_vertex,
            start_instance,
        });
    }

    fn close(&mut self) -> Result<(), RenderError> {
        if self.state != ListState::Recording {
            return Err(RenderError::InvalidCommandListState {
                list: self.id,
                reason: "closed while not recording",
            });
        }
        self.state = ListState::Closed;
        if self.recorded_while_closed {
            self.recorded_while_closed = false;
            self.commands.clear();
            return Err(RenderError::InvalidCommandListState {
                list: self.id,
                reason: "commands were recorded into a closed list",
            });
        }

        let commands = std::mem::take(&mut self.commands);
        self.device.store_closed_list(self.id, self.allocator, commands);
        Ok(())
    }

    fn discard(&mut self) {
        self.commands.clear();
        self.recorded_while_closed = false;
        self.state = ListState::Closed;
    }

    fn is_closed(&self) -> bool {
        self.state == ListState::Closed
    }
}
