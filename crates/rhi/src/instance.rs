//! Vulkan instance management.
//!
//! This module handles VkInstance creation, layer and extension discovery,
//! and the optional debug messenger.
//!
//! # Overview
//!
//! The [`Instance`] struct owns the Vulkan entry, the instance, and the debug
//! hooks. The debug-utils function table is resolved once here and kept as a
//! field, so teardown never reaches for process-wide state. The hooks are
//! always installed and always torn down; with validation off they do nothing.
//!
//! # Example
//!
//! ```no_run
//! use minirender_rhi::instance::Instance;
//!
//! let surface_extensions = [ash::khr::surface::NAME];
//! let instance = Instance::new(cfg!(debug_assertions), &surface_extensions)
//!     .expect("Failed to create Vulkan instance");
//!
//! let vk_instance = instance.handle();
//! let entry = instance.entry();
//! ```

use std::ffi::{CStr, c_char};

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use crate::error::RhiError;

/// The Khronos validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Upper bound on how many layer or extension entries we accept from the loader.
///
/// Enumeration results are collected into growable vectors; this only guards
/// against a broken loader reporting absurd counts.
const MAX_ENUMERATED_PROPERTIES: usize = 1024;

/// Optional debug hooks resolved at instance creation.
///
/// `Disabled` still goes through [`DebugHooks::setup`] and
/// [`DebugHooks::teardown`] so both build configurations run the same
/// sequence of calls.
enum DebugHooks {
    Disabled,
    Enabled {
        loader: ash::ext::debug_utils::Instance,
        messenger: vk::DebugUtilsMessengerEXT,
    },
}

impl DebugHooks {
    fn setup(entry: &Entry, instance: &ash::Instance, enabled: bool) -> Result<Self, RhiError> {
        if !enabled {
            debug!("Debug hooks disabled");
            return Ok(Self::Disabled);
        }

        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
        info!("Debug messenger created successfully");

        Ok(Self::Enabled { loader, messenger })
    }

    fn teardown(&mut self) {
        if let Self::Enabled { loader, messenger } = self {
            unsafe {
                loader.destroy_debug_utils_messenger(*messenger, None);
            }
            debug!("Debug messenger destroyed");
        }
        *self = Self::Disabled;
    }

    fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

/// Vulkan instance wrapper with optional validation layer support.
///
/// When dropped, the debug hooks are torn down before the instance.
pub struct Instance {
    /// Vulkan entry point loader
    entry: Entry,
    /// Vulkan instance handle
    instance: ash::Instance,
    /// Debug messenger and its function table
    debug_hooks: DebugHooks,
}

impl Instance {
    /// Creates a new Vulkan instance.
    ///
    /// # Arguments
    ///
    /// * `enable_validation` - If true, enables the validation layer and debug messenger
    /// * `surface_extensions` - Platform surface extensions reported by the windowing layer
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Vulkan library cannot be loaded
    /// - A required extension is not available
    /// - Instance creation fails
    /// - Debug messenger setup fails (when validation is enabled)
    pub fn new(enable_validation: bool, surface_extensions: &[&CStr]) -> Result<Self, RhiError> {
        let entry = unsafe { Entry::load()? };

        let available_layers = enumerate_layers(&entry)?;
        let available_extensions = enumerate_extensions(&entry)?;

        let validation_available = enable_validation
            && available_layers
                .iter()
                .any(|name| name.as_c_str() == VALIDATION_LAYER_NAME);

        if enable_validation && !validation_available {
            warn!("Validation layer requested but not available, proceeding without it");
        }

        let mut required = Self::required_extensions(surface_extensions);
        if validation_available {
            required.push(ash::ext::debug_utils::NAME);
        }
        check_extensions(&required, &available_extensions)?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"minirender")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"No Engine")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let extension_ptrs: Vec<*const c_char> = required.iter().map(|ext| ext.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = if validation_available {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        info!(
            "Vulkan instance created with {} extension(s), {} layer(s)",
            extension_ptrs.len(),
            layer_ptrs.len()
        );

        let debug_hooks = match DebugHooks::setup(&entry, &instance, validation_available) {
            Ok(hooks) => hooks,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        };

        Ok(Self {
            entry,
            instance,
            debug_hooks,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the Vulkan entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns whether validation layers are enabled.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_hooks.is_enabled()
    }

    /// The surface extension plus whatever the window system asks for, without duplicates.
    fn required_extensions<'a>(surface_extensions: &[&'a CStr]) -> Vec<&'a CStr> {
        let mut extensions: Vec<&CStr> = Vec::with_capacity(surface_extensions.len() + 2);
        extensions.push(ash::khr::surface::NAME);
        for &ext in surface_extensions {
            if !extensions.contains(&ext) {
                extensions.push(ext);
            }
        }
        extensions
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.debug_hooks.teardown();
        unsafe {
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Collects the names of all instance layers, logging each one.
fn enumerate_layers(entry: &Entry) -> Result<Vec<std::ffi::CString>, RhiError> {
    let properties = unsafe { entry.enumerate_instance_layer_properties()? };
    let names = collect_names(
        properties.iter().map(|layer| layer.layer_name_as_c_str()),
        "layer",
    );
    debug!("{} instance layer(s) available", names.len());
    Ok(names)
}

/// Collects the names of all instance extensions, logging each one.
fn enumerate_extensions(entry: &Entry) -> Result<Vec<std::ffi::CString>, RhiError> {
    let properties = unsafe { entry.enumerate_instance_extension_properties(None)? };
    let names = collect_names(
        properties.iter().map(|ext| ext.extension_name_as_c_str()),
        "extension",
    );
    debug!("{} instance extension(s) available", names.len());
    Ok(names)
}

fn collect_names<'a, I>(names: I, kind: &str) -> Vec<std::ffi::CString>
where
    I: Iterator<Item = Result<&'a CStr, std::ffi::FromBytesUntilNulError>>,
{
    let mut collected = Vec::new();
    for name in names {
        if collected.len() == MAX_ENUMERATED_PROPERTIES {
            warn!(
                "Loader reported more than {} {}s, ignoring the rest",
                MAX_ENUMERATED_PROPERTIES, kind
            );
            break;
        }
        match name {
            Ok(name) => {
                debug!("  {}: {}", kind, name.to_string_lossy());
                collected.push(name.to_owned());
            }
            Err(_) => warn!("Skipping {} with an unterminated name", kind),
        }
    }
    collected
}

/// Fails with the first required extension the loader does not report.
fn check_extensions(required: &[&CStr], available: &[std::ffi::CString]) -> Result<(), RhiError> {
    match required
        .iter()
        .find(|ext| !available.iter().any(|a| a.as_c_str() == **ext))
    {
        Some(missing) => Err(RhiError::MissingExtension(
            missing.to_string_lossy().into_owned(),
        )),
        None => Ok(()),
    }
}

/// Debug callback function for validation layer messages.
///
/// Messages are forwarded to `tracing` at the matching level.
///
/// # Safety
///
/// This function is called from the Vulkan driver and must follow the
/// Vulkan specification for debug callbacks.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let type_str = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "General",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "Validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "Performance",
        _ => "Unknown",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            error!("[Vulkan {}] {}", type_str, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            warn!("[Vulkan {}] {}", type_str, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            info!("[Vulkan {}] {}", type_str, message);
        }
        _ => {
            debug!("[Vulkan {} Verbose] {}", type_str, message);
        }
    }

    // VK_FALSE: never abort the triggering call
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skip_without_vulkan(result: Result<Instance, RhiError>) -> Option<Instance> {
        match result {
            Ok(instance) => Some(instance),
            Err(
                e @ (RhiError::LoadingError(_)
                | RhiError::VulkanError(_)
                | RhiError::MissingExtension(_)),
            ) => {
                eprintln!("Skipping test: Vulkan not usable here ({})", e);
                None
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_instance_creation_without_validation() {
        if let Some(instance) = skip_without_vulkan(Instance::new(false, &[])) {
            assert!(!instance.has_validation());
        }
    }

    #[test]
    fn test_instance_creation_with_validation() {
        // Validation may or may not be installed; either way creation must succeed
        if let Some(instance) = skip_without_vulkan(Instance::new(true, &[])) {
            if instance.has_validation() {
                assert!(matches!(instance.debug_hooks, DebugHooks::Enabled { .. }));
            }
        }
    }

    #[test]
    fn test_required_extensions_include_surface_once() {
        let platform = [ash::khr::surface::NAME, ash::khr::xlib_surface::NAME];
        let extensions = Instance::required_extensions(&platform);

        assert_eq!(extensions[0], ash::khr::surface::NAME);
        assert_eq!(extensions.len(), 2);
        assert!(extensions.contains(&ash::khr::xlib_surface::NAME));
    }

    #[test]
    fn test_check_extensions_reports_missing() {
        let available = vec![ash::khr::surface::NAME.to_owned()];

        assert!(check_extensions(&[ash::khr::surface::NAME], &available).is_ok());

        let err = check_extensions(
            &[ash::khr::surface::NAME, ash::khr::win32_surface::NAME],
            &available,
        )
        .unwrap_err();
        match err {
            RhiError::MissingExtension(name) => assert_eq!(name, "VK_KHR_win32_surface"),
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_collect_names_skips_bad_entries() {
        let good = c"VK_LAYER_KHRONOS_validation";
        let bad = CStr::from_bytes_until_nul(b"no terminator");
        let names = collect_names(vec![Ok(good), bad].into_iter(), "layer");
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].as_c_str(), good);
    }
}
