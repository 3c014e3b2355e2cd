use std::{collections::HashSet, ffi::CStr, os::raw::c_void};

use log::{debug, error, info, trace, warn};
use vulkanalia::{
    Version,
    loader::{LIBRARY, LibloadingLoader},
    prelude::v1_0::*,
    vk::ExtDebugUtilsExtension,
    window as vk_window,
};
use winit::raw_window_handle::HasWindowHandle;

use super::error::InstanceError;
use crate::config::{APPLICATION_NAME, AppConfig, VALIDATION_LAYER};

/// The Vulkan version which added the portability subset extensions for macOS.
const PORTABILITY_MACOS_VERSION: Version = Version::new(1, 3, 216);

/// Owns the loader entry, the instance, and the optional debug messenger.
///
/// Everything is destroyed on drop, messenger first.
pub struct VulkanInstance {
    _entry: Entry,
    instance: Instance,
    messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    /// Loads Vulkan, reports what it supports, and creates an instance with the extensions the
    /// windowing system behind `window` needs.
    ///
    /// # Errors
    ///
    /// - [`InstanceError::Loader`]
    /// - [`InstanceError::UnsupportedExtensions`]
    /// - [`InstanceError::UnsupportedLayers`]
    /// - [`InstanceError::Vulkan`]
    pub fn new(window: &dyn HasWindowHandle, config: &AppConfig) -> Result<Self, InstanceError> {
        let loader = unsafe { LibloadingLoader::new(LIBRARY) }
            .map_err(|e| InstanceError::Loader(e.to_string()))?;
        let entry =
            unsafe { Entry::new(loader) }.map_err(|e| InstanceError::Loader(e.to_string()))?;

        let available_extensions = supported_extensions(&entry)?;
        info!("{} extensions supported:", available_extensions.len());
        for extension in &available_extensions {
            info!("- {}", extension.to_string_lossy());
        }

        let required_layers = if config.validation {
            vec![VALIDATION_LAYER]
        } else {
            Vec::new()
        };

        if config.validation {
            let available_layers = supported_layers(&entry)?;
            info!("{} layers supported:", available_layers.len());
            for layer in &available_layers {
                info!("- {}", layer.to_string_lossy());
            }

            info!("{} validation layers required", required_layers.len());
            let missing = report_support(&required_layers, &available_layers);
            if !missing.is_empty() {
                return Err(InstanceError::UnsupportedLayers(missing));
            }

            info!("Validation layers enabled");
        }

        let layers = required_layers
            .iter()
            .map(|l| l.as_ptr())
            .collect::<Vec<_>>();

        let mut required_extensions = vk_window::get_required_instance_extensions(window)
            .iter()
            .map(|e| **e)
            .collect::<Vec<_>>();

        if config.validation {
            required_extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name);
        }

        // Required by Vulkan SDK on macOS since 1.3.216.
        let flags = if cfg!(target_os = "macos") && entry.version()? >= PORTABILITY_MACOS_VERSION {
            debug!("Enabling extensions for macOS portability.");
            required_extensions.push(vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION.name);
            required_extensions.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name);
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        info!("{} extensions required:", required_extensions.len());
        let missing = report_support(&required_extensions, &available_extensions);
        if !missing.is_empty() {
            return Err(InstanceError::UnsupportedExtensions(missing));
        }

        let extensions = required_extensions
            .iter()
            .map(|e| e.as_ptr())
            .collect::<Vec<_>>();

        let application_info = vk::ApplicationInfo::builder()
            .application_name(APPLICATION_NAME)
            .application_version(0)
            .api_version(config.api_version);

        let mut info = vk::InstanceCreateInfo::builder()
            .application_info(&application_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .flags(flags);

        let mut debug_info = debug_messenger_info();
        if config.validation {
            info = info.push_next(&mut debug_info);
        }

        let instance = unsafe { entry.create_instance(&info, None) }?;

        let messenger = if config.validation {
            match unsafe { instance.create_debug_utils_messenger_ext(&debug_info, None) } {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        debug!("Created Vulkan instance.");

        Ok(Self {
            _entry: entry,
            instance,
            messenger,
        })
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some(messenger) = self.messenger.take() {
                self.instance.destroy_debug_utils_messenger_ext(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        debug!("Destroyed Vulkan instance.");
    }
}

fn supported_extensions(entry: &Entry) -> Result<HashSet<vk::ExtensionName>, InstanceError> {
    Ok(unsafe { entry.enumerate_instance_extension_properties(None) }?
        .iter()
        .map(|e| e.extension_name)
        .collect())
}

fn supported_layers(entry: &Entry) -> Result<HashSet<vk::ExtensionName>, InstanceError> {
    Ok(unsafe { entry.enumerate_instance_layer_properties() }?
        .iter()
        .map(|l| l.layer_name)
        .collect())
}

/// Logs one supported/unsupported line per required name and returns the unsupported ones.
fn report_support(
    required: &[vk::ExtensionName],
    available: &HashSet<vk::ExtensionName>,
) -> Vec<String> {
    let mut missing = Vec::new();

    for name in required {
        let display = name.to_string_lossy();
        if available.contains(name) {
            info!("- {display} (Supported)");
        } else {
            info!("- {display} (NOT supported)");
            missing.push(display.into_owned());
        }
    }

    missing
}

fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXTBuilder<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .user_callback(Some(debug_callback))
}

/// Forwards validation layer messages into the `log` facade.
extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    type_: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _: *mut c_void,
) -> vk::Bool32 {
    let data = unsafe { *data };
    let message = unsafe { CStr::from_ptr(data.message) }.to_string_lossy();

    if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        error!("({type_:?}) {message}");
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        warn!("({type_:?}) {message}");
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        debug!("({type_:?}) {message}");
    } else {
        trace!("({type_:?}) {message}");
    }

    vk::FALSE
}
