//! # Config Module
//!
//! Compile-time settings for the window, the Vulkan instance, and the criteria used to pick a
//! physical device. [`AppConfig::default`] collects them into a value the application owns.

use vulkanalia::vk;

/// Initial window width in logical pixels.
pub const WIDTH: u32 = 800;

/// Initial window height in logical pixels.
pub const HEIGHT: u32 = 600;

pub const WINDOW_TITLE: &str = "Finestra";

/// Name reported to the driver through `VkApplicationInfo`.
pub const APPLICATION_NAME: &[u8] = b"vulkanrs\0";

/// Validation layers are only requested in debug builds.
pub const VALIDATION_ENABLED: bool = cfg!(debug_assertions);

pub const VALIDATION_LAYER: vk::ExtensionName =
    vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub api_version: u32,
    pub validation: bool,
    pub device: DeviceRequirements,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            title: WINDOW_TITLE.to_owned(),
            api_version: vk::make_version(1, 2, 0),
            validation: VALIDATION_ENABLED,
            device: DeviceRequirements::default(),
        }
    }
}

/// What the application asks of the physical device it runs on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceRequirements {
    pub extensions: Vec<String>,
    pub preferred_extensions: Vec<String>,
    pub require_discrete: bool,
    pub prefer_discrete: bool,
}

impl Default for DeviceRequirements {
    fn default() -> Self {
        Self {
            extensions: vec![vk::KHR_SWAPCHAIN_EXTENSION.name.to_string_lossy().into_owned()],
            preferred_extensions: Vec::new(),
            require_discrete: false,
            prefer_discrete: true,
        }
    }
}
