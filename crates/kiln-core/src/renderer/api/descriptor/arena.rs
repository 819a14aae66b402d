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

//! A bump allocator over the single shader-visible CBV/SRV heap.
//!
//! Every lane asks the arena once, at initialization, for a contiguous range
//! sized to its data. Ranges are never returned; the heap lives as long as
//! the renderer.

use std::sync::atomic::{AtomicU32, Ordering};

use super::{CpuDescriptorHandle, DescriptorHeapId, GpuDescriptorHandle};
use crate::renderer::error::RenderError;
use crate::renderer::traits::GpuDevice;

/// A contiguous run of slots in the shader-visible heap.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DescriptorRange {
    first_slot: u32,
    count: u32,
    cpu_base: CpuDescriptorHandle,
    gpu_base: GpuDescriptorHandle,
    increment: u32,
}

impl DescriptorRange {
    /// The CPU handle of the `index`-th slot of the range.
    pub fn cpu(&self, index: u32) -> CpuDescriptorHandle {
        debug_assert!(index < self.count, "descriptor index out of range");
        self.cpu_base.offset(index, self.increment)
    }

    /// The GPU handle of the `index`-th slot of the range.
    pub fn gpu(&self, index: u32) -> GpuDescriptorHandle {
        debug_assert!(index < self.count, "descriptor index out of range");
        self.gpu_base.offset(index, self.increment)
    }

    /// A sub-range of `count` slots starting `offset` slots into this one.
    ///
    /// Lanes lay out one block per descriptor kind, `k * data_count` slots
    /// from the start of their range.
    pub fn sub_range(&self, offset: u32, count: u32) -> DescriptorRange {
        assert!(
            offset + count <= self.count,
            "sub-range {offset}+{count} exceeds descriptor range of {}",
            self.count
        );
        DescriptorRange {
            first_slot: self.first_slot + offset,
            count,
            cpu_base: self.cpu_base.offset(offset, self.increment),
            gpu_base: self.gpu_base.offset(offset, self.increment),
            increment: self.increment,
        }
    }

    /// Index of the first slot within the heap.
    pub fn first_slot(&self) -> u32 {
        self.first_slot
    }

    /// Number of slots in the range.
    pub fn len(&self) -> u32 {
        self.count
    }

    /// Whether the range has no slots.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The byte distance between two adjacent slots.
    pub fn increment(&self) -> u32 {
        self.increment
    }

    /// Whether the two ranges share at least one slot.
    pub fn overlaps(&self, other: &DescriptorRange) -> bool {
        self.first_slot < other.first_slot + other.count
            && other.first_slot < self.first_slot + self.count
    }
}

/// The shared, shader-visible descriptor heap and its bump pointer.
#[derive(Debug)]
pub struct DescriptorArena {
    heap: DescriptorHeapId,
    cpu_start: CpuDescriptorHandle,
    gpu_start: GpuDescriptorHandle,
    increment: u32,
    capacity: u32,
    next: AtomicU32,
}

impl DescriptorArena {
    /// Creates the heap with `capacity` slots.
    pub fn new(device: &dyn GpuDevice, capacity: u32) -> Result<Self, RenderError> {
        if capacity == 0 {
            return Err(RenderError::InvalidConfiguration(
                "descriptor heap capacity must be non-zero".to_string(),
            ));
        }

        let heap = device.create_descriptor_heap(capacity, Some("Shader-visible CBV/SRV heap"))?;
        let (cpu_start, gpu_start) = device.descriptor_heap_start(heap)?;
        let increment = device.descriptor_increment();

        log::info!(
            "DescriptorArena: created heap {:?} with {} slots (increment {} bytes)",
            heap,
            capacity,
            increment
        );

        Ok(Self {
            heap,
            cpu_start,
            gpu_start,
            increment,
            capacity,
            next: AtomicU32::new(0),
        })
    }

    /// Reserves `count` contiguous slots.
    ///
    /// ## Errors
    /// * `RenderError::DescriptorHeapExhausted` - If fewer than `count` slots remain.
    /// * `RenderError::Internal` - If `count` is zero.
    pub fn allocate(&self, count: u32) -> Result<DescriptorRange, RenderError> {
        if count == 0 {
            return Err(RenderError::Internal(
                "zero-slot descriptor allocation".to_string(),
            ));
        }

        let capacity = self.capacity;
        let first_slot = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |next| {
                next.checked_add(count).filter(|end| *end <= capacity)
            })
            .map_err(|next| RenderError::DescriptorHeapExhausted {
                requested: count,
                available: capacity.saturating_sub(next),
            })?;

        log::debug!(
            "DescriptorArena: allocated slots [{}, {})",
            first_slot,
            first_slot + count
        );

        Ok(DescriptorRange {
            first_slot,
            count,
            cpu_base: self.cpu_start.offset(first_slot, self.increment),
            gpu_base: self.gpu_start.offset(first_slot, self.increment),
            increment: self.increment,
        })
    }

    /// Translates a CPU handle inside this heap into its GPU counterpart.
    pub fn gpu_handle(&self, cpu: CpuDescriptorHandle) -> Option<GpuDescriptorHandle> {
        let offset = cpu.0.checked_sub(self.cpu_start.0)?;
        let end = self.capacity as u64 * self.increment as u64;
        (offset < end).then_some(GpuDescriptorHandle(self.gpu_start.0 + offset))
    }

    /// The heap every lane binds before drawing.
    pub fn heap(&self) -> DescriptorHeapId {
        self.heap
    }

    /// The byte distance between two adjacent slots.
    pub fn increment(&self) -> u32 {
        self.increment
    }

    /// Total slots in the heap.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next.load(Ordering::Acquire)
    }
}
