//! GPU selection.
//!
//! A candidate needs a graphics queue family. When selecting against a
//! surface it also needs a family that can present to it, the swapchain
//! extension and at least one surface format and present mode. Among the
//! candidates the best ranked wins: discrete before integrated before the
//! rest, ties broken in favor of one family serving both queues.
//!
//! Without a surface the present family mirrors the graphics family, which
//! lets tests run transfers on a headless device.

use std::ffi::CStr;
use std::fmt;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};
use crate::surface::Surface;

/// The queue families the engine submits and presents on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    #[inline]
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// One entry per distinct family, graphics first.
    pub fn distinct(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    /// Sharing mode for images both queues touch, with the families to list
    /// when it is concurrent.
    pub fn sharing_mode(&self) -> (vk::SharingMode, Vec<u32>) {
        if self.is_shared() {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        } else {
            (vk::SharingMode::CONCURRENT, self.distinct())
        }
    }
}

/// Chooses graphics and present families from a device's family list.
///
/// The first family that does both wins outright. Otherwise the first
/// graphics family is paired with the first presenting one. Families with
/// no queues are ignored.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    can_present: impl Fn(u32) -> bool,
) -> Option<QueueFamilies> {
    let mut graphics = None;
    let mut present = None;

    let usable = families
        .iter()
        .zip(0u32..)
        .filter(|(family, _)| family.queue_count > 0);
    for (family, index) in usable {
        let draws = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let presents = can_present(index);
        if draws && presents {
            return Some(QueueFamilies {
                graphics: index,
                present: index,
            });
        }
        if draws {
            graphics.get_or_insert(index);
        }
        if presents {
            present.get_or_insert(index);
        }
    }

    Some(QueueFamilies {
        graphics: graphics?,
        present: present?,
    })
}

/// Preference order among suitable devices. Higher is better.
fn rank(device_type: vk::PhysicalDeviceType, queues: QueueFamilies) -> u32 {
    let by_type = match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 4,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    };
    by_type * 2 + u32::from(queues.is_shared())
}

/// The selected GPU and what the device and swapchain need to know about it.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub handle: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queues: QueueFamilies,
    /// Selected against a surface; the device must enable the swapchain extension.
    pub presentable: bool,
}

impl PhysicalDeviceInfo {
    pub fn name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("<unnamed>")
    }

    fn rank(&self) -> u32 {
        rank(self.properties.device_type, self.queues)
    }
}

impl fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.name())
            .field("type", &self.properties.device_type)
            .field("queues", &self.queues)
            .field("presentable", &self.presentable)
            .finish()
    }
}

/// Picks the best ranked suitable GPU.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if nothing qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: Option<&Surface>,
) -> RhiResult<PhysicalDeviceInfo> {
    let handles = unsafe { instance.enumerate_physical_devices()? };
    info!("Found {} GPU(s)", handles.len());

    let best = handles
        .into_iter()
        .filter_map(|handle| inspect(instance, handle, surface))
        .inspect(|candidate| debug!("Candidate {:?} ranked {}", candidate, candidate.rank()))
        .max_by_key(PhysicalDeviceInfo::rank);

    match best {
        Some(selected) => {
            info!(
                "Selected GPU '{}' ({:?})",
                selected.name(),
                selected.properties.device_type
            );
            Ok(selected)
        }
        None => {
            warn!("No GPU offers the required queues and surface support");
            Err(RhiError::NoSuitableGpu)
        }
    }
}

/// Gathers what selection needs, or `None` if the device cannot be used.
fn inspect(
    instance: &ash::Instance,
    handle: vk::PhysicalDevice,
    surface: Option<&Surface>,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(handle) };
    let families = unsafe { instance.get_physical_device_queue_family_properties(handle) };
    let name = properties
        .device_name_as_c_str()
        .map(CStr::to_string_lossy)
        .unwrap_or_default();

    let queues = match surface {
        Some(surface) => find_queue_families(&families, |index| {
            surface.supports_queue_family(handle, index)
        }),
        // Headless: presenting is never asked for
        None => find_queue_families(&families, |_| true),
    };
    let Some(queues) = queues else {
        debug!("Skipping '{}': no usable queue families", name);
        return None;
    };

    if let Some(surface) = surface {
        if !has_device_extension(instance, handle, ash::khr::swapchain::NAME) {
            debug!("Skipping '{}': no swapchain extension", name);
            return None;
        }
        if !surface.is_usable_by(handle) {
            debug!("Skipping '{}': surface offers no format or present mode", name);
            return None;
        }
    }

    Some(PhysicalDeviceInfo {
        handle,
        properties,
        memory_properties: unsafe { instance.get_physical_device_memory_properties(handle) },
        queues,
        presentable: surface.is_some(),
    })
}

fn has_device_extension(instance: &ash::Instance, handle: vk::PhysicalDevice, wanted: &CStr) -> bool {
    unsafe { instance.enumerate_device_extension_properties(handle) }
        .map(|extensions| {
            extensions
                .iter()
                .filter_map(|ext| ext.extension_name_as_c_str().ok())
                .any(|name| name == wanted)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_family_for_both_wins() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let queues = find_queue_families(&families, |i| i >= 1).unwrap();
        assert_eq!(
            queues,
            QueueFamilies {
                graphics: 2,
                present: 2
            }
        );
    }

    #[test]
    fn test_split_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
        ];
        let queues = find_queue_families(&families, |i| i == 1).unwrap();
        assert_eq!((queues.graphics, queues.present), (0, 1));
        assert!(!queues.is_shared());
    }

    #[test]
    fn test_missing_family_yields_none() {
        let families = [family(vk::QueueFlags::TRANSFER)];
        assert!(find_queue_families(&families, |_| true).is_none());
        assert!(find_queue_families(&[family(vk::QueueFlags::GRAPHICS)], |_| false).is_none());
    }

    #[test]
    fn test_empty_families_are_ignored() {
        let mut empty = family(vk::QueueFlags::GRAPHICS);
        empty.queue_count = 0;
        let queues = find_queue_families(&[empty, family(vk::QueueFlags::GRAPHICS)], |_| true)
            .unwrap();
        assert_eq!(queues.graphics, 1);
    }

    #[test]
    fn test_sharing_mode_follows_family_split() {
        let shared = QueueFamilies {
            graphics: 0,
            present: 0,
        };
        assert_eq!(shared.sharing_mode(), (vk::SharingMode::EXCLUSIVE, vec![]));
        assert_eq!(shared.distinct(), vec![0]);

        let split = QueueFamilies {
            graphics: 0,
            present: 2,
        };
        assert_eq!(split.sharing_mode(), (vk::SharingMode::CONCURRENT, vec![0, 2]));
    }

    #[test]
    fn test_rank_prefers_discrete_then_shared_family() {
        let shared = QueueFamilies {
            graphics: 0,
            present: 0,
        };
        let split = QueueFamilies {
            graphics: 0,
            present: 1,
        };
        let discrete_split = rank(vk::PhysicalDeviceType::DISCRETE_GPU, split);
        let integrated_shared = rank(vk::PhysicalDeviceType::INTEGRATED_GPU, shared);
        assert!(discrete_split > integrated_shared);
        assert!(
            rank(vk::PhysicalDeviceType::CPU, shared) > rank(vk::PhysicalDeviceType::CPU, split)
        );
    }
}
