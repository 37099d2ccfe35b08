//! Vulkan logical device and queue management.
//!
//! This module handles VkDevice creation, queue retrieval, and gpu-allocator initialization.
//!
//! # Overview
//!
//! The [`Device`] is the device context the rest of the renderer builds on:
//! - A logical device with the swapchain extension
//! - Exactly one queue, taken from the selected graphics family, used for
//!   graphics work, transfers, presentation and host-side waits
//! - The memory-type table of the adapter
//! - Memory allocation via gpu-allocator
//!
//! # Example
//!
//! ```no_run
//! use minirender_rhi::instance::Instance;
//! use minirender_rhi::physical_device::select_physical_device;
//! use minirender_rhi::device::Device;
//!
//! let instance = Instance::new(false, &[]).expect("Failed to create instance");
//! let physical_device_info = select_physical_device(instance.handle())
//!     .expect("No suitable GPU found");
//!
//! let device = Device::new(&instance, &physical_device_info)
//!     .expect("Failed to create logical device");
//!
//! let queue = device.queue();
//! ```

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, error, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::PhysicalDeviceInfo;

/// Required device extensions.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Vulkan logical device wrapper.
///
/// # Thread Safety
///
/// The [`Device`] is shared through `Arc`. The allocator is protected by a
/// `Mutex`; everything else is an immutable handle.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Physical device handle.
    physical_device: vk::PhysicalDevice,
    /// Memory types and heaps of the physical device.
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// GPU memory allocator, dropped before the device is destroyed.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// The single graphics queue.
    queue: vk::Queue,
    /// Family index of `queue`.
    queue_family_index: u32,
}

impl Device {
    /// Creates a new logical device with one queue at priority 1.0.
    ///
    /// # Arguments
    ///
    /// * `instance` - The Vulkan instance
    /// * `physical_device_info` - The selected adapter and its graphics family
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Device creation fails
    /// - Allocator initialization fails
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
    ) -> Result<Arc<Self>, RhiError> {
        let queue_family_index = physical_device_info.graphics_family;
        let queue_priorities = [1.0f32];

        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities)];

        let features = vk::PhysicalDeviceFeatures::default();

        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };

        info!(
            "Logical device created with {} extension(s)",
            DEVICE_EXTENSIONS.len()
        );

        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };
        debug!("Queue retrieved from family {}", queue_family_index);

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device_info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };

        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            memory_properties: physical_device_info.memory_properties,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            queue,
            queue_family_index,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the queue handle.
    #[inline]
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Returns the queue family index the queue was created from.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Returns the memory-type properties of the physical device.
    #[inline]
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Locks the GPU memory allocator.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::MemoryError`] if a previous holder panicked.
    pub fn lock_allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| RhiError::MemoryError("allocator mutex poisoned".to_string()))
    }

    /// Waits for the device to become idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Blocks until the queue has drained.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn queue_wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.queue_wait_idle(self.queue)? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle during drop: {:?}", e);
            }

            // The allocator releases its memory blocks through the device
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: Device is Send+Sync because:
// - ash::Device is Send+Sync
// - vk::PhysicalDevice and vk::Queue are Copy types (handles)
// - Allocator is protected by Mutex
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_extensions_defined() {
        assert_eq!(DEVICE_EXTENSIONS, &[ash::khr::swapchain::NAME]);
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
