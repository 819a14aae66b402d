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

//! Host-backed buffer storage with a simulated GPU virtual address space.

use std::collections::{BTreeMap, HashMap};

use kiln_core::renderer::{BufferId, GpuVirtualAddress, MemoryLocation, ResourceError};

/// Buffers are placed on 64 KiB boundaries, like committed resources.
const PLACEMENT_ALIGNMENT: u64 = 64 * 1024;
const ADDRESS_SPACE_START: u64 = 0x0001_0000_0000;

#[derive(Debug)]
pub(crate) struct BufferRecord {
    pub(crate) label: Option<String>,
    pub(crate) memory: MemoryLocation,
    pub(crate) address: GpuVirtualAddress,
    pub(crate) data: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct GpuMemory {
    buffers: HashMap<BufferId, BufferRecord>,
    by_address: BTreeMap<u64, BufferId>,
    next_address: u64,
    allocated_bytes: u64,
}

impl GpuMemory {
    pub(crate) fn new() -> Self {
        Self {
            buffers: HashMap::new(),
            by_address: BTreeMap::new(),
            next_address: ADDRESS_SPACE_START,
            allocated_bytes: 0,
        }
    }

    pub(crate) fn allocate(
        &mut self,
        id: BufferId,
        size: u64,
        memory: MemoryLocation,
        label: Option<&str>,
    ) -> GpuVirtualAddress {
        let address = GpuVirtualAddress(self.next_address);
        let span = size.max(1).div_ceil(PLACEMENT_ALIGNMENT) * PLACEMENT_ALIGNMENT;
        self.next_address += span;
        self.allocated_bytes += size;

        self.by_address.insert(address.0, id);
        self.buffers.insert(
            id,
            BufferRecord {
                label: label.map(str::to_string),
                memory,
                address,
                data: vec![0; size as usize],
            },
        );
        address
    }

    pub(crate) fn free(&mut self, id: BufferId) -> Result<(), ResourceError> {
        let record = self.buffers.remove(&id).ok_or(ResourceError::NotFound)?;
        self.by_address.remove(&record.address.0);
        self.allocated_bytes -= record.data.len() as u64;
        Ok(())
    }

    pub(crate) fn get(&self, id: BufferId) -> Result<&BufferRecord, ResourceError> {
        self.buffers.get(&id).ok_or(ResourceError::NotFound)
    }

    pub(crate) fn write(
        &mut self,
        id: BufferId,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), ResourceError> {
        let record = self.buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let start = offset as usize;
        let end = start
            .checked_add(bytes.len())
            .ok_or(ResourceError::OutOfBounds)?;
        record
            .data
            .get_mut(start..end)
            .ok_or(ResourceError::OutOfBounds)?
            .copy_from_slice(bytes);
        Ok(())
    }

    pub(crate) fn read(&self, id: BufferId, offset: u64, len: u64) -> Result<Vec<u8>, ResourceError> {
        let record = self.get(id)?;
        record
            .data
            .get(offset as usize..(offset + len) as usize)
            .map(<[u8]>::to_vec)
            .ok_or(ResourceError::OutOfBounds)
    }

    /// Finds the buffer containing `address` and the offset into it.
    pub(crate) fn resolve(&self, address: GpuVirtualAddress) -> Option<(BufferId, u64)> {
        let (base, id) = self.by_address.range(..=address.0).next_back()?;
        let record = self.buffers.get(id)?;
        let offset = address.0 - base;
        (offset < record.data.len() as u64).then_some((*id, offset))
    }

    pub(crate) fn read_address(
        &self,
        address: GpuVirtualAddress,
        len: u64,
    ) -> Result<Vec<u8>, ResourceError> {
        let (id, offset) = self.resolve(address).ok_or(ResourceError::InvalidHandle)?;
        self.read(id, offset, len)
    }

    pub(crate) fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_resolve_inside_their_buffer_only() {
        let mut memory = GpuMemory::new();
        let a = memory.allocate(BufferId(1), 512, MemoryLocation::Upload, Some("a"));
        let b = memory.allocate(BufferId(2), 16, MemoryLocation::DeviceLocal, None);

        assert_eq!(a.0 % PLACEMENT_ALIGNMENT, 0);
        assert_eq!(memory.resolve(a.offset(256)), Some((BufferId(1), 256)));
        assert_eq!(memory.resolve(b), Some((BufferId(2), 0)));
        assert_eq!(memory.resolve(a.offset(512)), None);
    }

    #[test]
    fn writes_are_bounds_checked() {
        let mut memory = GpuMemory::new();
        memory.allocate(BufferId(1), 8, MemoryLocation::Upload, None);
        assert!(memory.write(BufferId(1), 4, &[1, 2, 3, 4]).is_ok());
        assert!(matches!(
            memory.write(BufferId(1), 6, &[1, 2, 3]),
            Err(ResourceError::OutOfBounds)
        ));
        assert_eq!(memory.read(BufferId(1), 4, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn freeing_releases_the_address() {
        let mut memory = GpuMemory::new();
        let a = memory.allocate(BufferId(1), 64, MemoryLocation::Upload, None);
        memory.free(BufferId(1)).unwrap();
        assert_eq!(memory.resolve(a), None);
        assert_eq!(memory.allocated_bytes(), 0);
        assert!(memory.free(BufferId(1)).is_err());
    }
}
