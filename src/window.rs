//! # Window Module
//!
//! The `window` module uses [`winit`] to create cross-platform windows and poll events from the
//! user and OS. This module also uses [`raw_window_handle`](winit::raw_window_handle) to retrieve
//! the window handle safely for the [`vulkan`](crate::vulkan) module, which creates the instance
//! and selects a physical device.

use anyhow::Context;
use log::{debug, error, info};
use thiserror::Error;
use vulkanalia::vk::InstanceV1_0;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    error::OsError,
    event::WindowEvent,
    event_loop::ActiveEventLoop,
    raw_window_handle::{HandleError, HasWindowHandle, WindowHandle},
    window::{Window as WinitWindow, WindowId},
};

use crate::{config::AppConfig, vulkan::VulkanContext};

/// Custom error types for winit and raw-window-handle.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WindowError {
    /// Caller attempted to reference the winit window before it was created.
    #[error("Window has not been created yet.")]
    NotInitialized,

    /// raw-window-handle failed to retrieve the window or display handle.
    #[error(transparent)]
    BadHandle(#[from] HandleError),

    /// The OS refused to create the window.
    #[error(transparent)]
    Os(#[from] OsError),
}

pub struct Window {
    config: AppConfig,
    /// Dropped before `inner` so the instance never outlives the window it was created for.
    vulkan: Option<VulkanContext>,
    /// The winit window object
    inner: Option<WinitWindow>,
    /// The first initialization failure, returned from `main` once the loop exits.
    error: Option<anyhow::Error>,
}

impl Window {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            vulkan: None,
            inner: None,
            error: None,
        }
    }

    /// Gets a reference to the winit window object.
    ///
    /// # Errors
    ///
    /// - [`WindowError::NotInitialized`]
    pub fn window(&self) -> Result<&WinitWindow, WindowError> {
        self.inner.as_ref().ok_or(WindowError::NotInitialized)
    }

    /// Gets the native [`WindowHandle`] from the winit window. The lifetime of WindowHandle is
    /// guaranteed to be valid as long as `&self` is valid.
    ///
    /// # Errors
    ///
    /// - [`WindowError::NotInitialized`]
    /// - [`WindowError::BadHandle`]
    pub fn window_handle(&self) -> Result<WindowHandle<'_>, WindowError> {
        Ok(self.window()?.window_handle()?)
    }

    /// Takes the error that stopped the event loop, if any.
    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.error.take()
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<(), WindowError> {
        let attributes = WinitWindow::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height))
            .with_resizable(false);

        self.inner = Some(event_loop.create_window(attributes)?);
        Ok(())
    }

    fn init_vulkan(&mut self) -> anyhow::Result<()> {
        let handle = self.window_handle()?;
        let context = VulkanContext::new(&handle, &self.config)?;

        debug!(
            "Instance {:?}, physical device {:?} ({:?})",
            context.instance.instance().handle(),
            context.physical_device,
            context.device_properties.device_type,
        );
        let queues = context.queue_families;
        debug!(
            "Queue families: {queues:?} (complete: {}, sparse binding: {})",
            queues.is_complete(),
            queues.sparse_binding.is_some()
        );

        self.vulkan = Some(context);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        if self.error.is_none() {
            self.error = Some(err);
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for Window {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.inner.is_some() {
            return;
        }

        let result = self
            .create_window(event_loop)
            .context("Could not create window")
            .and_then(|()| self.init_vulkan());

        if let Err(err) = result {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("The close button was pressed; stopping");
                event_loop.exit();
            }
            _ => (),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(context) = self.vulkan.take() {
            debug!("Releasing Vulkan context for {}.", context.device_properties.name);
        }
        if self.inner.take().is_some() {
            info!("Closing window");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_require_a_created_window() {
        let window = Window::new(AppConfig::default());

        assert!(matches!(window.window(), Err(WindowError::NotInitialized)));
        assert!(matches!(
            window.window_handle(),
            Err(WindowError::NotInitialized)
        ));
    }

    #[test]
    fn vulkan_context_takes_a_window_handle() {
        let _: fn(&dyn HasWindowHandle, &AppConfig) -> anyhow::Result<VulkanContext> =
            VulkanContext::new;
    }

    #[test]
    fn no_error_before_the_loop_runs() {
        let mut window = Window::new(AppConfig::default());

        assert!(window.take_error().is_none());
    }
}
