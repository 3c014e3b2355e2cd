//! # Vulkan-RS Application
//!
//! This binary uses [`winit`] for cross-platform window management, and [`vulkanalia`] for FFI
//! to the Vulkan API. It opens a window, creates a Vulkan instance, selects a physical device
//! with [`vulkan::PhysicalDeviceBuilder`], and polls window events until the window is closed.
//!
//! Logging goes through [`log`]; set `RUST_LOG` (e.g. `RUST_LOG=debug`) to see more detail.

mod config;
mod vulkan;
mod window;

use anyhow::Context;
use config::AppConfig;
use log::LevelFilter;
use window::Window;
use winit::event_loop::{ControlFlow, EventLoop};

fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let mut window = Window::new(AppConfig::default());
    let event_loop = EventLoop::new().context("Could not create event loop")?;

    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop
        .run_app(&mut window)
        .context("Event loop terminated abnormally")?;

    match window.take_error() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
