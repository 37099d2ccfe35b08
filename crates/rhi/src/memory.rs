//! Memory-type selection.
//!
//! Buffers and images are backed through the same protocol: query the
//! object's requirements, pick a memory type that is both allowed by the
//! requirement's type filter and carries the requested property flags, then
//! allocate and bind at offset 0.

use ash::vk;
use gpu_allocator::MemoryLocation;

use crate::error::{RhiError, RhiResult};

/// Host-visible memory whose writes need no explicit flush.
pub const HOST_VISIBLE_COHERENT: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Finds the first memory type allowed by `type_bits` that has all of `properties`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableMemoryType`] when no type qualifies.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> RhiResult<u32> {
    memory_properties
        .memory_types_as_slice()
        .iter()
        .enumerate()
        .find(|(i, memory_type)| {
            type_bits & (1 << i) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(i, _)| i as u32)
        .ok_or(RhiError::NoSuitableMemoryType {
            type_bits,
            properties,
        })
}

/// Maps requested property flags onto the allocator's memory locations.
///
/// Cached host memory is what the allocator hands out for read-back.
pub fn memory_location(properties: vk::MemoryPropertyFlags) -> MemoryLocation {
    if properties.contains(vk::MemoryPropertyFlags::HOST_CACHED) {
        MemoryLocation::GpuToCpu
    } else if properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
        MemoryLocation::CpuToGpu
    } else {
        MemoryLocation::GpuOnly
    }
}

/// Checks that memory granted by the allocator carries every requested flag.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableMemoryType`] when a requested flag is missing.
pub fn ensure_properties(
    granted: vk::MemoryPropertyFlags,
    requested: vk::MemoryPropertyFlags,
    type_bits: u32,
) -> RhiResult<()> {
    if granted.contains(requested) {
        Ok(())
    } else {
        Err(RhiError::NoSuitableMemoryType {
            type_bits,
            properties: requested,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Device-local type 0, host-visible+coherent type 1, host-cached type 2.
    fn memory_properties() -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 3,
            memory_heap_count: 2,
            ..Default::default()
        };
        props.memory_types[0] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            heap_index: 0,
        };
        props.memory_types[1] = vk::MemoryType {
            property_flags: HOST_VISIBLE_COHERENT,
            heap_index: 1,
        };
        props.memory_types[2] = vk::MemoryType {
            property_flags: HOST_VISIBLE_COHERENT | vk::MemoryPropertyFlags::HOST_CACHED,
            heap_index: 1,
        };
        props
    }

    #[test]
    fn test_find_memory_type_device_local() {
        let props = memory_properties();
        let index = find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL);
        assert_eq!(index.unwrap(), 0);
    }

    #[test]
    fn test_find_memory_type_respects_type_filter() {
        let props = memory_properties();
        // Type 1 excluded by the filter, type 2 still has the flags
        let index = find_memory_type(&props, 0b100, HOST_VISIBLE_COHERENT);
        assert_eq!(index.unwrap(), 2);
    }

    #[test]
    fn test_find_memory_type_requires_all_flags() {
        let props = memory_properties();
        let index = find_memory_type(
            &props,
            0b111,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED,
        );
        assert_eq!(index.unwrap(), 2);
    }

    #[test]
    fn test_find_memory_type_none() {
        let props = memory_properties();
        let err = find_memory_type(&props, 0b001, HOST_VISIBLE_COHERENT).unwrap_err();
        assert!(matches!(
            err,
            RhiError::NoSuitableMemoryType { type_bits: 0b001, .. }
        ));
    }

    #[test]
    fn test_find_memory_type_ignores_types_past_count() {
        let mut props = memory_properties();
        props.memory_type_count = 1;
        assert!(find_memory_type(&props, 0b111, HOST_VISIBLE_COHERENT).is_err());
    }

    #[test]
    fn test_memory_location() {
        assert_eq!(
            memory_location(HOST_VISIBLE_COHERENT),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(
            memory_location(vk::MemoryPropertyFlags::DEVICE_LOCAL),
            MemoryLocation::GpuOnly
        );
        assert_eq!(
            memory_location(
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED
            ),
            MemoryLocation::GpuToCpu
        );
    }

    #[test]
    fn test_ensure_properties() {
        let cached = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED;

        assert!(ensure_properties(HOST_VISIBLE_COHERENT | cached, cached, 0b111).is_ok());
        let err = ensure_properties(HOST_VISIBLE_COHERENT, cached, 0b110).unwrap_err();
        assert!(matches!(
            err,
            RhiError::NoSuitableMemoryType {
                type_bits: 0b110,
                properties,
            } if properties == cached
        ));
    }
}
