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

//! Upload buffers holding fixed-size, 256-byte aligned constant slots.
//!
//! Constant buffer views must start on 256-byte boundaries, so each element
//! of an [`UploadBuffer`] occupies [`constant_buffer_byte_size`] bytes even
//! when the payload is smaller.

use crate::renderer::api::descriptor::ConstantBufferViewDescriptor;
use crate::renderer::api::resource::{BufferId, GpuVirtualAddress};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GpuDevice;
use bytemuck::Pod;
use std::fmt;

/// Required alignment, in bytes, of a constant buffer view.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Rounds `size` up to the next multiple of [`CONSTANT_BUFFER_ALIGNMENT`].
#[inline]
pub const fn constant_buffer_byte_size(size: u64) -> u64 {
    (size + (CONSTANT_BUFFER_ALIGNMENT - 1)) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

/// A CPU-writable buffer divided into `element_count` aligned slots.
#[derive(Debug)]
pub struct UploadBuffer {
    buffer: BufferId,
    base_address: GpuVirtualAddress,
    element_size: u64,
    element_count: u32,
}

impl UploadBuffer {
    /// Creates an upload buffer with `element_count` slots of at least
    /// `element_size` bytes each.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If `element_size` or `element_count` is zero.
    /// * Any error the device reports while creating the buffer.
    pub fn new(
        device: &dyn GpuDevice,
        element_size: u64,
        element_count: u32,
        label: &str,
    ) -> Result<Self, ResourceError> {
        if element_size == 0 || element_count == 0 {
            return Err(ResourceError::OutOfBounds);
        }

        let element_size = constant_buffer_byte_size(element_size);
        let buffer = device.create_upload_buffer(element_size * element_count as u64, Some(label))?;
        let base_address = device.buffer_gpu_address(buffer)?;

        Ok(Self {
            buffer,
            base_address,
            element_size,
            element_count,
        })
    }

    /// Creates an upload buffer sized for `element_count` values of `T`.
    pub fn for_constants<T: Pod>(
        device: &dyn GpuDevice,
        element_count: u32,
        label: &str,
    ) -> Result<Self, ResourceError> {
        Self::new(
            device,
            std::mem::size_of::<T>() as u64,
            element_count,
            label,
        )
    }

    /// Copies `bytes` into slot `index`.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If `index` is out of range or the payload
    ///   is larger than one slot.
    pub fn copy_data(
        &self,
        device: &dyn GpuDevice,
        index: u32,
        bytes: &[u8],
    ) -> Result<(), ResourceError> {
        if index >= self.element_count || bytes.len() as u64 > self.element_size {
            return Err(ResourceError::OutOfBounds);
        }
        device.write_buffer(self.buffer, index as u64 * self.element_size, bytes)
    }

    /// Copies a POD value into slot `index`.
    pub fn copy_constants<T: Pod>(
        &self,
        device: &dyn GpuDevice,
        index: u32,
        value: &T,
    ) -> Result<(), ResourceError> {
        self.copy_data(device, index, bytemuck::bytes_of(value))
    }

    /// The GPU address of slot `index`.
    pub fn element_address(&self, index: u32) -> GpuVirtualAddress {
        debug_assert!(index < self.element_count, "upload buffer slot out of range");
        self.base_address.offset(index as u64 * self.element_size)
    }

    /// A constant buffer view descriptor covering slot `index`.
    pub fn constant_buffer_view(&self, index: u32) -> ConstantBufferViewDescriptor {
        ConstantBufferViewDescriptor {
            location: self.element_address(index),
            size_in_bytes: self.element_size as u32,
        }
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// The aligned size of one slot in bytes.
    pub fn element_size(&self) -> u64 {
        self.element_size
    }

    /// The number of slots.
    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    /// Releases the underlying buffer.
    pub fn destroy(self, device: &dyn GpuDevice) {
        if let Err(e) = device.destroy_buffer(self.buffer) {
            log::warn!("Failed to destroy upload buffer {:?}: {e}", self.buffer);
        }
    }
}

/// Tracks the upload buffers created while a lane initializes.
///
/// Dropping the guard destroys every tracked buffer, so an initialization
/// that returns early through `?` leaves no buffer behind. Call
/// [`commit`](Self::commit) once the buffers are owned by the lane.
pub struct UploadBufferGuard<'a> {
    device: &'a dyn GpuDevice,
    buffers: Vec<BufferId>,
}

impl<'a> UploadBufferGuard<'a> {
    /// Creates an empty guard for buffers of `device`.
    pub fn new(device: &'a dyn GpuDevice) -> Self {
        Self {
            device,
            buffers: Vec::new(),
        }
    }

    /// [`UploadBuffer::new`], tracked by the guard.
    pub fn create(
        &mut self,
        element_size: u64,
        element_count: u32,
        label: &str,
    ) -> Result<UploadBuffer, ResourceError> {
        let buffer = UploadBuffer::new(self.device, element_size, element_count, label)?;
        self.buffers.push(buffer.buffer());
        Ok(buffer)
    }

    /// [`UploadBuffer::for_constants`], tracked by the guard.
    pub fn for_constants<T: Pod>(
        &mut self,
        element_count: u32,
        label: &str,
    ) -> Result<UploadBuffer, ResourceError> {
        self.create(std::mem::size_of::<T>() as u64, element_count, label)
    }

    /// Stops tracking: the buffers now outlive the guard.
    pub fn commit(mut self) {
        self.buffers.clear();
    }
}

impl Drop for UploadBufferGuard<'_> {
    fn drop(&mut self) {
        if self.buffers.is_empty() {
            return;
        }
        log::debug!(
            "Destroying {} upload buffers of an unfinished initialization",
            self.buffers.len()
        );
        for buffer in self.buffers.drain(..) {
            if let Err(e) = self.device.destroy_buffer(buffer) {
                log::warn!("Failed to destroy upload buffer {buffer:?}: {e}");
            }
        }
    }
}

impl fmt::Debug for UploadBufferGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadBufferGuard")
            .field("buffers", &self.buffers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Mat4, Vec3};
    use crate::renderer::api::scene::FrameConstants;
    use crate::test_support::MockDevice;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn byte_size_rounds_up_to_256() {
        assert_eq!(constant_buffer_byte_size(1), 256);
        assert_eq!(constant_buffer_byte_size(64), 256);
        assert_eq!(constant_buffer_byte_size(256), 256);
        assert_eq!(constant_buffer_byte_size(257), 512);
        assert_eq!(constant_buffer_byte_size(300), 512);
    }

    #[test]
    fn slots_are_aligned_and_contiguous() {
        let device = MockDevice::new();
        let upload = UploadBuffer::new(&device, 300, 4, "test").unwrap();
        assert_eq!(upload.element_size(), 512);
        let base = upload.element_address(0).0;
        assert_eq!(base % CONSTANT_BUFFER_ALIGNMENT, 0);
        assert_eq!(upload.element_address(3).0, base + 3 * 512);
        assert_eq!(upload.constant_buffer_view(1).size_in_bytes, 512);
    }

    #[test]
    fn copy_data_round_trips_through_device_memory() {
        let device = MockDevice::new();
        let upload = UploadBuffer::new(&device, 16, 3, "test").unwrap();
        upload.copy_data(&device, 2, &[9u8; 16]).unwrap();

        let bytes = device.read_buffer(upload.buffer(), 2 * 256, 16).unwrap();
        assert_eq!(bytes, vec![9u8; 16]);
    }

    #[test]
    fn copy_data_rejects_out_of_range_slots_and_oversized_payloads() {
        let device = MockDevice::new();
        let upload = UploadBuffer::new(&device, 16, 2, "test").unwrap();
        assert!(matches!(
            upload.copy_data(&device, 2, &[0u8; 4]),
            Err(ResourceError::OutOfBounds)
        ));
        assert!(matches!(
            upload.copy_data(&device, 0, &[0u8; 257]),
            Err(ResourceError::OutOfBounds)
        ));
    }

    #[test]
    fn zero_sized_buffers_are_rejected() {
        let device = MockDevice::new();
        assert!(UploadBuffer::new(&device, 0, 1, "empty").is_err());
        assert!(UploadBuffer::new(&device, 16, 0, "empty").is_err());
    }

    #[test]
    fn dropped_guards_destroy_their_buffers() {
        let device = MockDevice::new();
        let kept;
        let lost;
        {
            let mut guard = UploadBufferGuard::new(&device);
            lost = guard.for_constants::<[f32; 4]>(2, "lost").unwrap().buffer();
        }
        {
            let mut guard = UploadBufferGuard::new(&device);
            kept = guard.create(16, 1, "kept").unwrap().buffer();
            guard.commit();
        }
        assert!(matches!(device.read_buffer(lost, 0, 1), Err(ResourceError::NotFound)));
        assert!(device.read_buffer(kept, 0, 16).is_ok());
    }

    #[test]
    fn frame_constants_read_back_in_shader_layout() {
        let device = MockDevice::new();
        let upload = UploadBuffer::for_constants::<FrameConstants>(&device, 2, "frame").unwrap();
        let eye = Vec3::new(3.0, 4.0, 5.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(1.0, 2.0, 0.1, 100.0);
        upload
            .copy_constants(&device, 1, &FrameConstants::new(view, projection, eye))
            .unwrap();

        let bytes = device
            .read_buffer(upload.buffer(), 256, std::mem::size_of::<FrameConstants>() as u64)
            .unwrap();
        let constants: FrameConstants = bytemuck::pod_read_unaligned(&bytes);
        assert_relative_eq!(constants.eye_position.x, 3.0);
        assert_relative_eq!(constants.eye_position.w, 1.0);

        let identity = (constants.view * constants.inverse_view).to_cols_array();
        for (value, expected) in identity.iter().zip(Mat4::IDENTITY.to_cols_array()) {
            assert_abs_diff_eq!(*value, expected, epsilon = 1e-5);
        }
    }
}
