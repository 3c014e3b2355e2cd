//! # Vulkan Module
//!
//! Thin layer over [`vulkanalia`]: [`VulkanInstance`] loads the library and owns the instance,
//! and [`PhysicalDeviceBuilder`] picks the physical device the application will run on.

mod device;
mod error;
mod instance;
mod queue;

pub use device::{DeviceProperties, PhysicalDeviceBuilder};
pub use instance::VulkanInstance;
pub use queue::QueueFamilyIndices;

use log::info;
use vulkanalia::vk;
use winit::raw_window_handle::HasWindowHandle;

use crate::config::AppConfig;

/// The Vulkan objects the application keeps alive while its window is open.
pub struct VulkanContext {
    /// The chosen device; valid for as long as `instance` is.
    pub physical_device: vk::PhysicalDevice,
    pub device_properties: DeviceProperties,
    pub queue_families: QueueFamilyIndices,
    pub instance: VulkanInstance,
}

impl VulkanContext {
    /// Creates the instance for `window` and selects a physical device per `config.device`.
    pub fn new(window: &dyn HasWindowHandle, config: &AppConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let instance = VulkanInstance::new(window, config)
            .context("Failed to create the Vulkan instance")?;

        let requirements = &config.device;
        let mut builder = PhysicalDeviceBuilder::new(instance.instance())
            .require_extensions(&requirements.extensions)
            .prefer_extensions(&requirements.preferred_extensions);
        if requirements.require_discrete {
            builder = builder.require_discrete();
        }
        if requirements.prefer_discrete {
            builder = builder.prefer_discrete();
        }

        let selected = builder
            .build()
            .context("Failed to select a physical device")?;
        let physical_device = selected.handle();
        let device_properties = selected.properties().clone();
        let queue_families = selected.queue_families();

        info!("Vulkan initialized on {}.", device_properties.name);

        Ok(Self {
            physical_device,
            device_properties,
            queue_families,
            instance,
        })
    }
}
