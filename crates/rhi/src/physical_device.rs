//! Physical device (GPU) selection.
//!
//! Selection is deliberately simple: the first enumerated adapter is taken
//! unconditionally, and on it the first queue family that advertises graphics
//! support. An adapter without such a family is a fatal error.
//!
//! # Example
//!
//! ```no_run
//! use minirender_rhi::instance::Instance;
//! use minirender_rhi::physical_device::select_physical_device;
//!
//! let instance = Instance::new(false, &[]).expect("Failed to create instance");
//! let device_info = select_physical_device(instance.handle())
//!     .expect("Failed to select physical device");
//!
//! println!("Selected GPU: {:?}", device_info.device_name());
//! ```

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Information about the selected physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Index of the queue family used for graphics, transfer and presentation.
    pub graphics_family: u32,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("graphics_family", &self.graphics_family)
            .finish()
    }
}

/// Selects the first physical device and its first graphics queue family.
///
/// # Errors
///
/// - [`RhiError::NoSuitableGpu`] if the instance reports no adapters.
/// - [`RhiError::NoGraphicsQueue`] if the first adapter has no graphics family.
pub fn select_physical_device(instance: &ash::Instance) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    let Some(&device) = devices.first() else {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    };

    info!("Found {} GPU(s), using the first", devices.len());

    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    for (i, family) in queue_families.iter().enumerate() {
        debug!(
            "Queue family {}: {:?} x{}",
            i, family.queue_flags, family.queue_count
        );
    }

    let graphics_family = find_graphics_family(&queue_families).ok_or(RhiError::NoGraphicsQueue)?;

    let info = PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        graphics_family,
    };

    let (major, minor, patch) = info.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}, graphics family {}",
        info.device_name(),
        info.device_type_name(),
        major,
        minor,
        patch,
        graphics_family
    );

    Ok(info)
}

/// Returns the index of the first queue family advertising graphics support.
pub fn find_graphics_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| {
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|i| i as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn test_find_graphics_family_first_match() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 2),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 16),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        assert_eq!(find_graphics_family(&families), Some(1));
    }

    #[test]
    fn test_find_graphics_family_none() {
        let families = [
            family(vk::QueueFlags::COMPUTE, 4),
            family(vk::QueueFlags::TRANSFER, 1),
        ];
        assert_eq!(find_graphics_family(&families), None);
        assert_eq!(find_graphics_family(&[]), None);
    }

    #[test]
    fn test_find_graphics_family_skips_empty_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 0),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        assert_eq!(find_graphics_family(&families), Some(1));
    }
}
