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

//! Command recording primitives: allocators, command lists, fences and the
//! submission queue they flow through.

mod allocator_pool;
mod executor;

pub use self::allocator_pool::CommandListSet;
pub use self::executor::CommandListExecutor;

/// An opaque handle to a command allocator owned by a device.
///
/// An allocator backs the memory of every command list recorded from it and
/// must not be reset while the GPU may still execute one of those lists.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandAllocatorId(pub u64);

/// An opaque handle to a command list.
///
/// Closed lists are referenced by this ID when pushed to the
/// [`CommandListExecutor`] and submitted through
/// [`GpuDevice::execute_command_lists`](crate::renderer::GpuDevice::execute_command_lists).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandListId(pub u64);

/// A value on the device's fence timeline.
///
/// Each submission batch signals a strictly greater value than the previous
/// one. `FenceValue(0)` is the initial, always-completed value.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FenceValue(pub u64);

impl FenceValue {
    /// The value every fence starts at; it is always considered completed.
    pub const INITIAL: FenceValue = FenceValue(0);

    /// Returns the next value on the timeline.
    pub fn next(self) -> FenceValue {
        FenceValue(self.0 + 1)
    }
}

/// The queue type a command list and its allocators are created for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CommandListKind {
    /// Graphics, compute and copy commands.
    Direct,
    /// Compute and copy commands only.
    Compute,
    /// Copy commands only.
    Copy,
}

/// A viewport transform from normalized device coordinates to render-target pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Minimum depth, usually `0.0`.
    pub min_depth: f32,
    /// Maximum depth, usually `1.0`.
    pub max_depth: f32,
}

impl Viewport {
    /// A viewport covering a `width × height` target with the full depth range.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// A scissor rectangle in render-target pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScissorRect {
    /// Left edge (inclusive).
    pub left: i32,
    /// Top edge (inclusive).
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

impl ScissorRect {
    /// A scissor rectangle covering a `width × height` target.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        }
    }
}
