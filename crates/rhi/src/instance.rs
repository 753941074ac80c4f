//! The Vulkan instance and its validation messenger.
//!
//! Validation is best effort: when the Khronos layer is requested but not
//! installed, the instance is created without it and a warning is logged.
//! Validation output is routed into `tracing` under the `vulkan` target.

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_void};

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use crate::error::RhiResult;

const KHRONOS_VALIDATION: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Layers and extensions actually enabled on the instance.
#[derive(Debug, Default, PartialEq, Eq)]
struct InstanceLayout {
    layers: Vec<&'static CStr>,
    extensions: Vec<&'static CStr>,
}

impl InstanceLayout {
    /// Adds the validation layer and debug utils only when the layer exists.
    fn resolve(
        window_extensions: &[&'static CStr],
        want_validation: bool,
        layer_present: bool,
    ) -> Self {
        let mut layout = Self {
            layers: Vec::new(),
            extensions: window_extensions.to_vec(),
        };
        if want_validation && layer_present {
            layout.layers.push(KHRONOS_VALIDATION);
            layout.extensions.push(ash::ext::debug_utils::NAME);
        }
        layout
    }

    fn validation(&self) -> bool {
        self.layers.contains(&KHRONOS_VALIDATION)
    }
}

fn pointers(names: &[&CStr]) -> Vec<*const c_char> {
    names.iter().map(|name| name.as_ptr()).collect()
}

/// Debug messenger plus the loader that destroys it.
struct Messenger {
    loader: ash::ext::debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl Messenger {
    fn install(entry: &Entry, instance: &ash::Instance) -> RhiResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(forward_to_tracing));
        let handle = unsafe { loader.create_debug_utils_messenger(&info, None)? };
        Ok(Self { loader, handle })
    }

    /// Must run before the instance is destroyed.
    fn destroy(&self) {
        unsafe { self.loader.destroy_debug_utils_messenger(self.handle, None) };
    }
}

/// Owns the loader entry, the `VkInstance` and the optional messenger.
///
/// Everything created from the instance (surface, device) must drop first.
pub struct Instance {
    entry: Entry,
    raw: ash::Instance,
    messenger: Option<Messenger>,
}

impl Instance {
    /// Loads Vulkan and creates an instance targeting API 1.1.
    ///
    /// `window_extensions` are the surface extensions the windowing layer
    /// reports; pass an empty slice for a headless instance.
    ///
    /// # Errors
    ///
    /// Fails if the loader is missing or `vkCreateInstance` fails. A
    /// missing validation layer is not an error.
    pub fn new(want_validation: bool, window_extensions: &[&'static CStr]) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let layer_present = want_validation && has_layer(&entry, KHRONOS_VALIDATION)?;
        if want_validation && !layer_present {
            warn!("Khronos validation layer not installed; continuing without validation");
        }
        let layout = InstanceLayout::resolve(window_extensions, want_validation, layer_present);
        debug!(
            "Instance layers {:?}, extensions {:?}",
            layout.layers, layout.extensions
        );

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"toy2d")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"toy2d")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_1);
        let layer_ptrs = pointers(&layout.layers);
        let extension_ptrs = pointers(&layout.extensions);
        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs);

        let raw = unsafe { entry.create_instance(&create_info, None)? };

        let messenger = if layout.validation() {
            match Messenger::install(&entry, &raw) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { raw.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        info!(
            "Vulkan instance created (validation {})",
            if messenger.is_some() { "on" } else { "off" }
        );
        Ok(Self {
            entry,
            raw,
            messenger,
        })
    }

    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.raw
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// True when validation output is being forwarded.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.messenger.is_some()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if let Some(messenger) = self.messenger.take() {
            messenger.destroy();
        }
        unsafe { self.raw.destroy_instance(None) };
        info!("Vulkan instance destroyed");
    }
}

fn has_layer(entry: &Entry, wanted: &CStr) -> RhiResult<bool> {
    let layers = unsafe { entry.enumerate_instance_layer_properties()? };
    Ok(layers
        .iter()
        .filter_map(|layer| layer.layer_name_as_c_str().ok())
        .any(|name| name == wanted))
}

fn message_kind(kind: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if kind.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if kind.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    }
}

/// Messenger callback. Never asks the driver to abort the call.
unsafe extern "system" fn forward_to_tracing(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    // SAFETY: the loader passes either null or a pointer valid for this call
    let text = match unsafe { data.as_ref() } {
        Some(data) if !data.p_message.is_null() => unsafe {
            CStr::from_ptr(data.p_message).to_string_lossy()
        },
        _ => Cow::Borrowed("<empty>"),
    };
    let kind = message_kind(kind);

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", kind, "{}", text);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", kind, "{}", text);
    } else {
        debug!(target: "vulkan", kind, "{}", text);
    }
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RhiError;

    const WINDOW_EXT: &CStr = c"VK_KHR_surface";

    #[test]
    fn test_layout_without_validation_keeps_window_extensions() {
        let layout = InstanceLayout::resolve(&[WINDOW_EXT], false, true);
        assert!(layout.layers.is_empty());
        assert_eq!(layout.extensions, vec![WINDOW_EXT]);
        assert!(!layout.validation());
    }

    #[test]
    fn test_layout_with_validation_adds_debug_utils() {
        let layout = InstanceLayout::resolve(&[WINDOW_EXT], true, true);
        assert_eq!(layout.layers, vec![KHRONOS_VALIDATION]);
        assert_eq!(
            layout.extensions,
            vec![WINDOW_EXT, ash::ext::debug_utils::NAME]
        );
        assert!(layout.validation());
    }

    #[test]
    fn test_missing_layer_falls_back_silently() {
        let layout = InstanceLayout::resolve(&[], true, false);
        assert_eq!(layout, InstanceLayout::default());
    }

    #[test]
    fn test_message_kind_prefers_validation() {
        let both = vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE;
        assert_eq!(message_kind(both), "validation");
        assert_eq!(
            message_kind(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL),
            "general"
        );
    }

    #[test]
    fn test_headless_instance() {
        match Instance::new(false, &[]) {
            Ok(instance) => assert!(!instance.has_validation()),
            Err(RhiError::LoadingError(_))
            | Err(RhiError::VulkanError(vk::Result::ERROR_INCOMPATIBLE_DRIVER)) => {
                eprintln!("Skipping test: no Vulkan driver")
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }
}
