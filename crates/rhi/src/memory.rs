//! Device memory type selection and raw allocation.

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Finds the first memory type usable for a resource.
///
/// A type qualifies when its bit is set in `type_bits` (from
/// `vk::MemoryRequirements::memory_type_bits`) and its property flags
/// contain every flag in `required`.
pub fn find_memory_type_index(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = (properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);
    properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|&(i, memory_type)| {
            type_bits & (1 << i) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(i, _)| i as u32)
}

/// Allocates memory sized to `requirements` from a type with `properties`.
///
/// The allocation size is the size the driver reported, which may exceed
/// the size the caller asked for.
///
/// Returns the memory handle and the chosen memory type index.
pub fn allocate(
    device: &Device,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> RhiResult<(vk::DeviceMemory, u32)> {
    let memory_type_index = device.find_memory_type(requirements.memory_type_bits, properties)?;

    let allocate_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    let memory = unsafe { device.handle().allocate_memory(&allocate_info, None) }.map_err(|e| {
        RhiError::ResourceCreationError(format!(
            "allocating {} bytes from memory type {} failed: {}",
            requirements.size, memory_type_index, e
        ))
    })?;

    debug!(
        "Allocated {} bytes from memory type {} ({:?})",
        requirements.size, memory_type_index, properties
    );

    Ok((memory, memory_type_index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, &flags) in properties.memory_types.iter_mut().zip(types) {
            slot.property_flags = flags;
        }
        properties
    }

    const DEVICE_LOCAL: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    const HOST_VISIBLE: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_VISIBLE;
    const HOST_COHERENT: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_COHERENT;

    #[test]
    fn test_requires_all_flags() {
        // Type 0 is only host-visible; type 1 is visible and coherent
        let properties = memory_properties(&[HOST_VISIBLE, HOST_VISIBLE | HOST_COHERENT]);
        let index = find_memory_type_index(&properties, 0b11, HOST_VISIBLE | HOST_COHERENT);
        assert_eq!(index, Some(1));
    }

    #[test]
    fn test_superset_flags_qualify() {
        let properties = memory_properties(&[DEVICE_LOCAL | HOST_VISIBLE | HOST_COHERENT]);
        assert_eq!(find_memory_type_index(&properties, 0b1, HOST_VISIBLE), Some(0));
        assert_eq!(find_memory_type_index(&properties, 0b1, DEVICE_LOCAL), Some(0));
    }

    #[test]
    fn test_type_bits_mask_is_respected() {
        let properties = memory_properties(&[DEVICE_LOCAL, DEVICE_LOCAL, DEVICE_LOCAL]);
        assert_eq!(find_memory_type_index(&properties, 0b100, DEVICE_LOCAL), Some(2));
        assert_eq!(find_memory_type_index(&properties, 0b110, DEVICE_LOCAL), Some(1));
        assert_eq!(find_memory_type_index(&properties, 0, DEVICE_LOCAL), None);
    }

    #[test]
    fn test_first_match_wins() {
        let properties = memory_properties(&[HOST_VISIBLE, DEVICE_LOCAL, DEVICE_LOCAL]);
        assert_eq!(find_memory_type_index(&properties, 0b111, DEVICE_LOCAL), Some(1));
    }

    #[test]
    fn test_types_past_count_are_ignored() {
        let mut properties = memory_properties(&[HOST_VISIBLE]);
        properties.memory_types[1].property_flags = DEVICE_LOCAL;
        assert_eq!(find_memory_type_index(&properties, 0b11, DEVICE_LOCAL), None);
    }

    #[test]
    fn test_no_compatible_type() {
        let properties = memory_properties(&[DEVICE_LOCAL]);
        assert_eq!(find_memory_type_index(&properties, 0b1, HOST_VISIBLE), None);
    }

    #[test]
    fn test_empty_requirement_matches_first_allowed_type() {
        let properties = memory_properties(&[DEVICE_LOCAL, HOST_VISIBLE]);
        assert_eq!(
            find_memory_type_index(&properties, 0b10, vk::MemoryPropertyFlags::empty()),
            Some(1)
        );
    }
}
