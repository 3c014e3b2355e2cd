//! Error types for instance creation and physical device selection.

use thiserror::Error;
use vulkanalia::vk;

/// Errors raised while creating the Vulkan instance.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum InstanceError {
    /// The Vulkan loader library could not be opened or its entry points resolved.
    #[error("Failed to load the Vulkan library: {0}")]
    Loader(String),

    /// One or more required instance extensions are missing from the loader.
    #[error("Unsupported Vulkan instance extension(s): {}", .0.join(", "))]
    UnsupportedExtensions(Vec<String>),

    /// One or more requested layers are not installed.
    #[error("Unsupported Vulkan layer(s): {}", .0.join(", "))]
    UnsupportedLayers(Vec<String>),

    #[error(transparent)]
    Vulkan(#[from] vk::ErrorCode),
}

/// Errors raised by [`PhysicalDeviceBuilder::build`](super::PhysicalDeviceBuilder::build).
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// The instance exposes zero physical devices.
    #[error("No physical devices found.")]
    NoDevicesFound,

    /// Devices exist but none of them satisfy the selection criteria.
    #[error("No suitable physical device found.")]
    NoSuitableDeviceFound,

    /// An enumeration or query call returned a Vulkan error code.
    #[error(transparent)]
    Vulkan(#[from] vk::ErrorCode),
}
