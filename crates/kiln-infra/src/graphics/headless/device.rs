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

//! The headless device: an explicit GPU emulated on the host.
//!
//! Work submitted with `execute_command_lists` is held in flight until the
//! fence value signaled after it completes. Completion happens when the CPU
//! waits on the fence, on [`HeadlessDevice::poll`], or automatically when
//! [`HeadlessConfig`] limits how far the emulated GPU may lag. Completed
//! command streams are replayed against a validation model and every draw
//! is logged for inspection.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kiln_core::renderer::{
    BindingSignatureId, BufferDescriptor, BufferId, CommandAllocatorId, CommandListId,
    CommandListKind, ConstantBufferViewDescriptor, CpuDescriptorHandle, DescriptorHeapId,
    FenceValue, GpuDescriptorHandle, GpuDevice, GpuVirtualAddress, GraphicsCommandList,
    MemoryLocation, PipelineError, PipelineStateCreateInfo, PipelineStateId, PrimitiveTopology,
    PrimitiveTopologyType, RenderError, ResourceError, ShaderError,
    ShaderResourceViewDescriptor, TextureDescriptor, TextureDimension, TextureId, TextureInfo,
    CONSTANT_BUFFER_ALIGNMENT,
};

use super::command_list::{HeadlessCommandList, RecordedCommand};
use super::heap::{DescriptorHeaps, DescriptorView, DESCRIPTOR_INCREMENT};
use super::memory::GpuMemory;

const TARGET_VIEW_BASE: u64 = 0x0070_0000_0000_0000;

/// How the emulated GPU progresses.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Complete every batch as soon as its fence is signaled.
    pub complete_on_signal: bool,
    /// Retire the oldest batches once more than this many are in flight.
    pub max_in_flight_batches: Option<usize>,
}

/// One submitted command list and the fence its batch signaled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    /// The submitted list.
    pub list: CommandListId,
    /// The list's debug label.
    pub label: Option<String>,
    /// The fence value that completes the list.
    pub fence: FenceValue,
}

/// The shape of an executed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    /// `draw_instanced`.
    Vertices {
        /// Vertices per instance.
        vertex_count: u32,
        /// Instances.
        instance_count: u32,
    },
    /// `draw_indexed_instanced`.
    Indexed {
        /// Indices per instance.
        index_count: u32,
        /// Instances.
        instance_count: u32,
    },
}

/// A draw replayed by the emulated GPU, with the bindings it saw.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedDraw {
    /// The list the draw was recorded in.
    pub list: CommandListId,
    /// The list's debug label.
    pub list_label: Option<String>,
    /// The fence of the batch the list was submitted in.
    pub fence: FenceValue,
    /// The bound pipeline.
    pub pipeline: Option<PipelineStateId>,
    /// The bound topology.
    pub topology: Option<PrimitiveTopology>,
    /// Descriptor tables per root parameter.
    pub tables: BTreeMap<u32, GpuDescriptorHandle>,
    /// Root constant buffers per root parameter.
    pub constant_buffers: BTreeMap<u32, GpuVirtualAddress>,
    /// Bound color targets.
    pub render_targets: Vec<CpuDescriptorHandle>,
    /// Bound depth target.
    pub depth_target: Option<CpuDescriptorHandle>,
    /// Draw parameters.
    pub kind: DrawKind,
}

/// Counters over the device's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    /// Fence signals.
    pub batches: u64,
    /// Command lists submitted.
    pub lists_executed: u64,
    /// Draws replayed.
    pub draw_calls: u64,
    /// Render target and depth clears replayed.
    pub clears: u64,
    /// CPU waits on a fence that had not completed yet.
    pub fence_waits: u64,
    /// Pipeline state objects created.
    pub pipelines_created: u64,
    /// Validation failures found while replaying.
    pub validation_errors: u64,
}

#[derive(Debug)]
struct AllocatorRecord {
    kind: CommandListKind,
    /// Lists recorded from it were executed but no fence was signaled since.
    awaiting_signal: bool,
    /// Fence that completes the last submission recorded from it.
    last_fence: FenceValue,
}

#[derive(Debug)]
struct ListRecord {
    kind: CommandListKind,
    label: Option<String>,
}

#[derive(Debug)]
struct ClosedStream {
    allocator: CommandAllocatorId,
    commands: Vec<RecordedCommand>,
}

#[derive(Debug)]
struct TextureRecord {
    info: TextureInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetViewKind {
    RenderTarget,
    DepthStencil,
}

#[derive(Debug)]
struct PipelineRecord {
    binding_signature: BindingSignatureId,
    topology_type: PrimitiveTopologyType,
}

#[derive(Debug)]
struct InFlightBatch {
    fence: FenceValue,
    lists: Vec<(CommandListId, ClosedStream)>,
}

#[derive(Debug)]
struct HeadlessState {
    allocators: HashMap<CommandAllocatorId, AllocatorRecord>,
    lists: HashMap<CommandListId, ListRecord>,
    closed_streams: HashMap<CommandListId, ClosedStream>,
    memory: GpuMemory,
    textures: HashMap<TextureId, TextureRecord>,
    target_views: HashMap<CpuDescriptorHandle, (TextureId, TargetViewKind)>,
    next_target_view: u64,
    heaps: DescriptorHeaps,
    signatures: HashMap<BindingSignatureId, Option<String>>,
    pipelines: HashMap<PipelineStateId, PipelineRecord>,
    unsignaled: Vec<(CommandListId, ClosedStream)>,
    in_flight: VecDeque<InFlightBatch>,
    last_signaled: FenceValue,
    completed: FenceValue,
    submissions: Vec<SubmissionRecord>,
    executed_draws: Vec<ExecutedDraw>,
    validation_errors: Vec<String>,
    stats: HeadlessStats,
}

/// The shared internals, also referenced by every command list.
#[derive(Debug)]
pub(crate) struct HeadlessDeviceInternal {
    config: HeadlessConfig,
    next_id: AtomicU64,
    state: Mutex<HeadlessState>,
}

impl HeadlessDeviceInternal {
    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn check_list_reset(
        &self,
        list: CommandListId,
        kind: CommandListKind,
        allocator: CommandAllocatorId,
    ) -> Result<(), RenderError> {
        let state = self.state();
        let record = state
            .allocators
            .get(&allocator)
            .ok_or(ResourceError::NotFound)?;
        if record.kind != kind {
            return Err(RenderError::InvalidCommandListState {
                list,
                reason: "allocator was created for another list kind",
            });
        }
        if state.closed_streams.contains_key(&list) {
            return Err(RenderError::InvalidCommandListState {
                list,
                reason: "reset before the closed list was submitted",
            });
        }
        Ok(())
    }

    pub(crate) fn store_closed_list(
        &self,
        list: CommandListId,
        allocator: CommandAllocatorId,
        commands: Vec<RecordedCommand>,
    ) {
        self.state()
            .closed_streams
            .insert(list, ClosedStream { allocator, commands });
    }
}

impl HeadlessState {
    fn new() -> Self {
        Self {
            allocators: HashMap::new(),
            lists: HashMap::new(),
            closed_streams: HashMap::new(),
            memory: GpuMemory::new(),
            textures: HashMap::new(),
            target_views: HashMap::new(),
            next_target_view: 0,
            heaps: DescriptorHeaps::default(),
            signatures: HashMap::new(),
            pipelines: HashMap::new(),
            unsignaled: Vec::new(),
            in_flight: VecDeque::new(),
            last_signaled: FenceValue::INITIAL,
            completed: FenceValue::INITIAL,
            submissions: Vec::new(),
            executed_draws: Vec::new(),
            validation_errors: Vec::new(),
            stats: HeadlessStats::default(),
        }
    }

    fn retire_oldest(&mut self) {
        if let Some(batch) = self.in_flight.pop_front() {
            for (list, stream) in &batch.lists {
                self.replay(*list, batch.fence, &stream.commands);
            }
            self.completed = self.completed.max(batch.fence);
        }
    }

    fn complete_through(&mut self, value: FenceValue) {
        while self
            .in_flight
            .front()
            .is_some_and(|batch| batch.fence <= value)
        {
            self.retire_oldest();
        }
        self.completed = self.completed.max(value);
    }

    fn create_target_view(
        &mut self,
        texture: TextureId,
        kind: TargetViewKind,
    ) -> Result<CpuDescriptorHandle, ResourceError> {
        let record = self.textures.get(&texture).ok_or(ResourceError::NotFound)?;
        let is_depth = record.info.format.is_depth_stencil();
        if is_depth != (kind == TargetViewKind::DepthStencil) {
            return Err(ResourceError::BackendError(format!(
                "format {:?} cannot back a {:?} view",
                record.info.format, kind
            )));
        }

        let handle = CpuDescriptorHandle(
            TARGET_VIEW_BASE + self.next_target_view * DESCRIPTOR_INCREMENT as u64,
        );
        self.next_target_view += 1;
        self.target_views.insert(handle, (texture, kind));
        Ok(handle)
    }

    /// Replays a completed command stream against the validation model.
    fn replay(&mut self, list: CommandListId, fence: FenceValue, commands: &[RecordedCommand]) {
        let label = self.lists.get(&list).and_then(|l| l.label.clone());
        let mut bound = BoundState::default();
        let mut draws = Vec::new();
        let mut errors = Vec::new();

        for command in commands {
            match command {
                RecordedCommand::SetPipelineState(id) => bound.pipeline = Some(*id),
                RecordedCommand::SetViewports(v) => bound.has_viewport = !v.is_empty(),
                RecordedCommand::SetScissorRects(_) => {}
                RecordedCommand::SetRenderTargets { color, depth } => {
                    for target in color {
                        self.check_target(*target, TargetViewKind::RenderTarget, &mut errors);
                    }
                    if let Some(depth) = depth {
                        self.check_target(*depth, TargetViewKind::DepthStencil, &mut errors);
                    }
                    bound.render_targets = color.clone();
                    bound.depth_target = *depth;
                }
                RecordedCommand::ClearRenderTarget { target, .. } => {
                    self.check_target(*target, TargetViewKind::RenderTarget, &mut errors);
                    self.stats.clears += 1;
                }
                RecordedCommand::ClearDepthStencil { target, .. } => {
                    self.check_target(*target, TargetViewKind::DepthStencil, &mut errors);
                    self.stats.clears += 1;
                }
                RecordedCommand::SetDescriptorHeaps(heaps) => {
                    for heap in heaps {
                        if !self.heaps.contains(*heap) {
                            errors.push(format!("unknown descriptor heap {heap:?}"));
                        }
                    }
                    bound.heaps = heaps.clone();
                }
                RecordedCommand::SetBindingSignature(signature) => {
                    if !self.signatures.contains_key(signature) {
                        errors.push(format!("unknown binding signature {signature:?}"));
                    }
                    // Changing the signature invalidates every root argument.
                    bound.signature = Some(*signature);
                    bound.tables.clear();
                    bound.constant_buffers.clear();
                }
                RecordedCommand::SetRootDescriptorTable { parameter, base } => {
                    bound.tables.insert(*parameter, *base);
                }
                RecordedCommand::SetRootConstantBufferView { parameter, address } => {
                    bound.constant_buffers.insert(*parameter, *address);
                }
                RecordedCommand::SetPrimitiveTopology(topology) => bound.topology = Some(*topology),
                RecordedCommand::SetVertexBuffers { .. } => {}
                RecordedCommand::SetIndexBuffer(_) => bound.has_index_buffer = true,
                RecordedCommand::Draw {
                    vertex_count,
                    instance_count,
                    ..
                } => {
                    let kind = DrawKind::Vertices {
                        vertex_count: *vertex_count,
                        instance_count: *instance_count,
                    };
                    self.validate_draw(&bound, false, &mut errors);
                    draws.push(bound.draw(list, label.clone(), fence, kind));
                }
                RecordedCommand::DrawIndexed {
                    index_count,
                    instance_count,
                    ..
                } => {
                    let kind = DrawKind::Indexed {
                        index_count: *index_count,
                        instance_count: *instance_count,
                    };
                    self.validate_draw(&bound, true, &mut errors);
                    draws.push(bound.draw(list, label.clone(), fence, kind));
                }
            }
        }

        for error in &errors {
            log::error!(
                "HeadlessDevice: validation error in list {:?} ({}): {}",
                list,
                label.as_deref().unwrap_or("unlabeled"),
                error
            );
        }
        self.stats.draw_calls += draws.len() as u64;
        self.stats.validation_errors += errors.len() as u64;
        self.executed_draws.extend(draws);
        self.validation_errors.extend(errors);
    }

    fn check_target(
        &self,
        target: CpuDescriptorHandle,
        expected: TargetViewKind,
        errors: &mut Vec<String>,
    ) {
        match self.target_views.get(&target) {
            Some((_, kind)) if *kind == expected => {}
            Some((_, kind)) => errors.push(format!(
                "{target:?} is a {kind:?} view, expected {expected:?}"
            )),
            None => errors.push(format!("{target:?} is not a render target view")),
        }
    }

    fn validate_draw(&self, bound: &BoundState, indexed: bool, errors: &mut Vec<String>) {
        let Some(pipeline_id) = bound.pipeline else {
            errors.push("draw without a pipeline state".to_string());
            return;
        };
        let Some(pipeline) = self.pipelines.get(&pipeline_id) else {
            errors.push(format!("draw with unknown pipeline {pipeline_id:?}"));
            return;
        };

        if bound.signature != Some(pipeline.binding_signature) {
            errors.push(format!(
                "bound signature {:?} does not match pipeline signature {:?}",
                bound.signature, pipeline.binding_signature
            ));
        }
        match bound.topology {
            Some(t) if t.topology_type() == pipeline.topology_type => {}
            other => errors.push(format!(
                "topology {other:?} is incompatible with a {:?} pipeline",
                pipeline.topology_type
            )),
        }
        if !bound.has_viewport {
            errors.push("draw without a viewport".to_string());
        }
        if bound.render_targets.is_empty() && bound.depth_target.is_none() {
            errors.push("draw without render targets".to_string());
        }
        for (parameter, base) in &bound.tables {
            match self.heaps.heap_of(*base) {
                Some(heap) if bound.heaps.contains(&heap) => {}
                Some(heap) => errors.push(format!(
                    "table {parameter} points into heap {heap:?} which is not bound"
                )),
                None => errors.push(format!(
                    "table {parameter} base {base:?} is outside every descriptor heap"
                )),
            }
        }
        for (parameter, address) in &bound.constant_buffers {
            if self.memory.resolve(*address).is_none() {
                errors.push(format!(
                    "root constant buffer {parameter} address {address:?} is not mapped"
                ));
            }
        }
        if indexed && !bound.has_index_buffer {
            errors.push("indexed draw without an index buffer".to_string());
        }
    }
}

#[derive(Debug, Default)]
struct BoundState {
    pipeline: Option<PipelineStateId>,
    signature: Option<BindingSignatureId>,
    heaps: Vec<DescriptorHeapId>,
    tables: BTreeMap<u32, GpuDescriptorHandle>,
    constant_buffers: BTreeMap<u32, GpuVirtualAddress>,
    topology: Option<PrimitiveTopology>,
    has_viewport: bool,
    has_index_buffer: bool,
    render_targets: Vec<CpuDescriptorHandle>,
    depth_target: Option<CpuDescriptorHandle>,
}

impl BoundState {
    fn draw(
        &self,
        list: CommandListId,
        list_label: Option<String>,
        fence: FenceValue,
        kind: DrawKind,
    ) -> ExecutedDraw {
        ExecutedDraw {
            list,
            list_label,
            fence,
            pipeline: self.pipeline,
            topology: self.topology,
            tables: self.tables.clone(),
            constant_buffers: self.constant_buffers.clone(),
            render_targets: self.render_targets.clone(),
            depth_target: self.depth_target,
            kind,
        }
    }
}

/// A clonable handle to the headless device.
#[derive(Clone, Debug)]
pub struct HeadlessDevice {
    internal: Arc<HeadlessDeviceInternal>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Creates a device whose GPU only progresses when waited on or polled.
    pub fn new() -> Self {
        Self::with_config(HeadlessConfig::default())
    }

    /// Creates a device with an explicit progress model.
    pub fn with_config(config: HeadlessConfig) -> Self {
        log::info!("HeadlessDevice: created with {config:?}");
        Self {
            internal: Arc::new(HeadlessDeviceInternal {
                config,
                next_id: AtomicU64::new(1),
                state: Mutex::new(HeadlessState::new()),
            }),
        }
    }

    /// Completes every signaled batch, as if the GPU caught up.
    pub fn poll(&self) -> FenceValue {
        let mut state = self.internal.state();
        let latest = state.last_signaled;
        state.complete_through(latest);
        state.completed
    }

    /// The highest fence value signaled so far.
    pub fn last_signaled_fence(&self) -> FenceValue {
        self.internal.state().last_signaled
    }

    /// Every submitted list, in submission order.
    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.internal.state().submissions.clone()
    }

    /// Every draw replayed so far, in execution order.
    pub fn executed_draws(&self) -> Vec<ExecutedDraw> {
        self.internal.state().executed_draws.clone()
    }

    /// Drains the replayed draw log.
    pub fn take_executed_draws(&self) -> Vec<ExecutedDraw> {
        std::mem::take(&mut self.internal.state().executed_draws)
    }

    /// Validation failures found while replaying.
    pub fn validation_errors(&self) -> Vec<String> {
        self.internal.state().validation_errors.clone()
    }

    /// Lifetime counters.
    pub fn stats(&self) -> HeadlessStats {
        self.internal.state().stats
    }

    /// The debug label a list was created with.
    pub fn list_label(&self, list: CommandListId) -> Option<String> {
        self.internal
            .state()
            .lists
            .get(&list)
            .and_then(|l| l.label.clone())
    }

    /// The view stored in a shader-visible descriptor slot.
    pub fn descriptor_at(&self, handle: GpuDescriptorHandle) -> Option<DescriptorView> {
        self.internal.state().heaps.view_at(handle)
    }

    /// Reads the bytes a constant buffer view stored at `handle` covers.
    pub fn read_constant_buffer(&self, handle: GpuDescriptorHandle) -> Result<Vec<u8>, ResourceError> {
        let state = self.internal.state();
        match state.heaps.view_at(handle) {
            Some(DescriptorView::ConstantBuffer(view)) => state
                .memory
                .read_address(view.location, view.size_in_bytes as u64),
            _ => Err(ResourceError::InvalidHandle),
        }
    }

    /// Reads `len` bytes at a GPU virtual address.
    pub fn read_gpu_address(
        &self,
        address: GpuVirtualAddress,
        len: u64,
    ) -> Result<Vec<u8>, ResourceError> {
        self.internal.state().memory.read_address(address, len)
    }

    /// The texture behind a render target or depth-stencil view.
    pub fn target_view_texture(&self, handle: CpuDescriptorHandle) -> Option<TextureId> {
        self.internal
            .state()
            .target_views
            .get(&handle)
            .map(|(texture, _)| *texture)
    }

    /// Bytes currently held by buffers.
    pub fn allocated_buffer_bytes(&self) -> u64 {
        self.internal.state().memory.allocated_bytes()
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_command_allocator(
        &self,
        kind: CommandListKind,
        label: Option<&str>,
    ) -> Result<CommandAllocatorId, ResourceError> {
        let id = CommandAllocatorId(self.internal.next_id());
        self.internal.state().allocators.insert(
            id,
            AllocatorRecord {
                kind,
                awaiting_signal: false,
                last_fence: FenceValue::INITIAL,
            },
        );
        log::debug!(
            "HeadlessDevice: created allocator {:?} '{}'",
            id,
            label.unwrap_or_default()
        );
        Ok(id)
    }

    fn reset_command_allocator(&self, allocator: CommandAllocatorId) -> Result<(), RenderError> {
        let state = self.internal.state();
        let record = state
            .allocators
            .get(&allocator)
            .ok_or(ResourceError::NotFound)?;

        let pending_fence = if record.awaiting_signal {
            Some(state.last_signaled.next())
        } else if record.last_fence > state.completed {
            Some(record.last_fence)
        } else {
            None
        };

        match pending_fence {
            Some(pending_fence) => Err(RenderError::AllocatorInUse {
                allocator,
                pending_fence,
                completed_fence: state.completed,
            }),
            None => Ok(()),
        }
    }

    fn create_command_list(
        &self,
        kind: CommandListKind,
        allocator: CommandAllocatorId,
        label: Option<&str>,
    ) -> Result<Box<dyn GraphicsCommandList>, ResourceError> {
        let id = CommandListId(self.internal.next_id());
        {
            let mut state = self.internal.state();
            let record = state
                .allocators
                .get(&allocator)
                .ok_or(ResourceError::NotFound)?;
            if record.kind != kind {
                return Err(ResourceError::BackendError(format!(
                    "allocator {allocator:?} was created for {:?} lists, not {kind:?}",
                    record.kind
                )));
            }
            state.lists.insert(
                id,
                ListRecord {
                    kind,
                    label: label.map(str::to_string),
                },
            );
        }
        Ok(Box::new(HeadlessCommandList::new(
            id,
            kind,
            allocator,
            Arc::clone(&self.internal),
        )))
    }

    fn execute_command_lists(&self, lists: &[CommandListId]) -> Result<(), RenderError> {
        let mut state = self.internal.state();

        for (i, list) in lists.iter().enumerate() {
            if !state.closed_streams.contains_key(list) || lists[..i].contains(list) {
                return Err(RenderError::InvalidCommandListState {
                    list: *list,
                    reason: "not closed, or already submitted since its last close",
                });
            }
            if state.lists.get(list).map(|l| l.kind) != Some(CommandListKind::Direct) {
                log::warn!("HeadlessDevice: list {list:?} is not a direct list");
            }
        }

        for list in lists {
            if let Some(stream) = state.closed_streams.remove(list) {
                if let Some(allocator) = state.allocators.get_mut(&stream.allocator) {
                    allocator.awaiting_signal = true;
                }
                state.unsignaled.push((*list, stream));
            }
        }
        state.stats.lists_executed += lists.len() as u64;
        Ok(())
    }

    fn signal_fence(&self) -> Result<FenceValue, RenderError> {
        let mut state = self.internal.state();
        let fence = state.last_signaled.next();
        state.last_signaled = fence;

        let lists = std::mem::take(&mut state.unsignaled);
        for (list, stream) in &lists {
            if let Some(allocator) = state.allocators.get_mut(&stream.allocator) {
                allocator.awaiting_signal = false;
                allocator.last_fence = fence;
            }
            let label = state.lists.get(list).and_then(|l| l.label.clone());
            state.submissions.push(SubmissionRecord {
                list: *list,
                label,
                fence,
            });
        }
        state.in_flight.push_back(InFlightBatch { fence, lists });
        state.stats.batches += 1;

        if self.internal.config.complete_on_signal {
            state.complete_through(fence);
        } else if let Some(max) = self.internal.config.max_in_flight_batches {
            while state.in_flight.len() > max {
                state.retire_oldest();
            }
        }
        Ok(fence)
    }

    fn completed_fence_value(&self) -> FenceValue {
        self.internal.state().completed
    }

    fn wait_for_fence(&self, value: FenceValue) -> Result<(), RenderError> {
        let mut state = self.internal.state();
        if value > state.last_signaled {
            return Err(RenderError::Internal(format!(
                "waiting on fence {} which was never signaled (last {})",
                value.0, state.last_signaled.0
            )));
        }
        if value > state.completed {
            state.stats.fence_waits += 1;
            state.complete_through(value);
        }
        Ok(())
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let size = descriptor.size.max(data.len() as u64);
        if size == 0 {
            return Err(ResourceError::OutOfBounds);
        }

        let id = BufferId(self.internal.next_id());
        let mut state = self.internal.state();
        state
            .memory
            .allocate(id, size, descriptor.memory, descriptor.label.as_deref());
        state.memory.write(id, 0, data)?;
        log::debug!(
            "HeadlessDevice: created buffer {:?} '{}' ({} bytes)",
            id,
            descriptor.label.as_deref().unwrap_or_default(),
            size
        );
        Ok(id)
    }

    fn create_upload_buffer(
        &self,
        size: u64,
        label: Option<&str>,
    ) -> Result<BufferId, ResourceError> {
        if size == 0 {
            return Err(ResourceError::OutOfBounds);
        }
        let id = BufferId(self.internal.next_id());
        self.internal
            .state()
            .memory
            .allocate(id, size, MemoryLocation::Upload, label);
        Ok(id)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.internal.state();
        if state.memory.get(id)?.memory != MemoryLocation::Upload {
            return Err(ResourceError::BackendError(format!(
                "buffer {id:?} is not CPU-writable"
            )));
        }
        state.memory.write(id, offset, data)
    }

    fn read_buffer(&self, id: BufferId, offset: u64, len: u64) -> Result<Vec<u8>, ResourceError> {
        self.internal.state().memory.read(id, offset, len)
    }

    fn buffer_gpu_address(&self, id: BufferId) -> Result<GpuVirtualAddress, ResourceError> {
        Ok(self.internal.state().memory.get(id)?.address)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.internal.state();
        if let Ok(record) = state.memory.get(id) {
            log::debug!(
                "HeadlessDevice: destroying buffer {:?} '{}'",
                id,
                record.label.as_deref().unwrap_or_default()
            );
        }
        state.memory.free(id)
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<TextureId, ResourceError> {
        if descriptor.width == 0 || descriptor.height == 0 || descriptor.mip_level_count == 0 {
            return Err(ResourceError::OutOfBounds);
        }
        let faces = match descriptor.dimension {
            TextureDimension::D2 => 1,
            TextureDimension::Cube => {
                if descriptor.width != descriptor.height {
                    return Err(ResourceError::BackendError(
                        "cube map faces must be square".to_string(),
                    ));
                }
                6
            }
        };
        if let Some(data) = data {
            let top_level = descriptor.width as u64
                * descriptor.height as u64
                * descriptor.format.bytes_per_texel() as u64
                * faces;
            if (data.len() as u64) < top_level {
                return Err(ResourceError::OutOfBounds);
            }
        }

        let id = TextureId(self.internal.next_id());
        self.internal.state().textures.insert(
            id,
            TextureRecord {
                info: TextureInfo {
                    format: descriptor.format,
                    mip_level_count: descriptor.mip_level_count,
                    dimension: descriptor.dimension,
                },
            },
        );
        log::debug!(
            "HeadlessDevice: created texture {:?} '{}' {}x{} {:?}",
            id,
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.width,
            descriptor.height,
            descriptor.format
        );
        Ok(id)
    }

    fn texture_info(&self, id: TextureId) -> Result<TextureInfo, ResourceError> {
        self.internal
            .state()
            .textures
            .get(&id)
            .map(|t| t.info)
            .ok_or(ResourceError::NotFound)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let mut state = self.internal.state();
        state.textures.remove(&id).ok_or(ResourceError::NotFound)?;
        state.target_views.retain(|_, (texture, _)| *texture != id);
        Ok(())
    }

    fn create_render_target_view(
        &self,
        texture: TextureId,
    ) -> Result<CpuDescriptorHandle, ResourceError> {
        self.internal
            .state()
            .create_target_view(texture, TargetViewKind::RenderTarget)
    }

    fn create_depth_stencil_view(
        &self,
        texture: TextureId,
    ) -> Result<CpuDescriptorHandle, ResourceError> {
        self.internal
            .state()
            .create_target_view(texture, TargetViewKind::DepthStencil)
    }

    fn create_descriptor_heap(
        &self,
        capacity: u32,
        label: Option<&str>,
    ) -> Result<DescriptorHeapId, ResourceError> {
        if capacity == 0 {
            return Err(ResourceError::OutOfBounds);
        }
        let id = DescriptorHeapId(self.internal.next_id());
        self.internal.state().heaps.create(id, capacity);
        log::debug!(
            "HeadlessDevice: created descriptor heap {:?} '{}' ({} slots)",
            id,
            label.unwrap_or_default(),
            capacity
        );
        Ok(id)
    }

    fn descriptor_heap_start(
        &self,
        heap: DescriptorHeapId,
    ) -> Result<(CpuDescriptorHandle, GpuDescriptorHandle), ResourceError> {
        self.internal.state().heaps.start(heap)
    }

    fn descriptor_increment(&self) -> u32 {
        DESCRIPTOR_INCREMENT
    }

    fn create_constant_buffer_view(
        &self,
        descriptor: &ConstantBufferViewDescriptor,
        destination: CpuDescriptorHandle,
    ) -> Result<(), ResourceError> {
        let mut state = self.internal.state();
        if descriptor.location.0 % CONSTANT_BUFFER_ALIGNMENT != 0
            || descriptor.size_in_bytes as u64 % CONSTANT_BUFFER_ALIGNMENT != 0
            || descriptor.size_in_bytes == 0
        {
            return Err(ResourceError::BackendError(format!(
                "constant buffer view {descriptor:?} is not 256-byte aligned"
            )));
        }
        let (buffer, offset) = state
            .memory
            .resolve(descriptor.location)
            .ok_or(ResourceError::InvalidHandle)?;
        let buffer_len = state.memory.get(buffer)?.data.len() as u64;
        if offset + descriptor.size_in_bytes as u64 > buffer_len {
            return Err(ResourceError::OutOfBounds);
        }
        state
            .heaps
            .write(destination, DescriptorView::ConstantBuffer(*descriptor))
    }

    fn create_shader_resource_view(
        &self,
        texture: TextureId,
        descriptor: &ShaderResourceViewDescriptor,
        destination: CpuDescriptorHandle,
    ) -> Result<(), ResourceError> {
        let mut state = self.internal.state();
        let info = state
            .textures
            .get(&texture)
            .map(|t| t.info)
            .ok_or(ResourceError::NotFound)?;
        if descriptor.most_detailed_mip + descriptor.mip_levels > info.mip_level_count {
            return Err(ResourceError::OutOfBounds);
        }
        state.heaps.write(
            destination,
            DescriptorView::ShaderResource {
                texture,
                view: *descriptor,
            },
        )
    }

    fn create_binding_signature(
        &self,
        blob: &[u8],
        label: Option<&str>,
    ) -> Result<BindingSignatureId, ResourceError> {
        if blob.is_empty() {
            return Err(ShaderError::InvalidBytecode {
                path: label.unwrap_or_default().to_string(),
            }
            .into());
        }
        let id = BindingSignatureId(self.internal.next_id());
        self.internal
            .state()
            .signatures
            .insert(id, label.map(str::to_string));
        Ok(id)
    }

    fn create_pipeline_state(
        &self,
        info: &PipelineStateCreateInfo<'_>,
    ) -> Result<PipelineStateId, ResourceError> {
        let mut state = self.internal.state();
        if !state.signatures.contains_key(&info.binding_signature) {
            return Err(PipelineError::CompilationFailed {
                label: Some(info.label.to_string()),
                details: format!("unknown binding signature {:?}", info.binding_signature),
            }
            .into());
        }
        if info.vertex_shader.is_empty() {
            return Err(PipelineError::CompilationFailed {
                label: Some(info.label.to_string()),
                details: "empty vertex shader bytecode".to_string(),
            }
            .into());
        }

        let id = PipelineStateId(self.internal.next_id());
        state.pipelines.insert(
            id,
            PipelineRecord {
                binding_signature: info.binding_signature,
                topology_type: info.descriptor.topology_type,
            },
        );
        state.stats.pipelines_created += 1;
        log::debug!("HeadlessDevice: created pipeline {:?} '{}'", id, info.label);
        Ok(id)
    }

    fn destroy_pipeline_state(&self, id: PipelineStateId) -> Result<(), ResourceError> {
        self.internal
            .state()
            .pipelines
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }
}
