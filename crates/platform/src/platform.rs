//! Event loop ownership and non-blocking event pumping.
//!
//! [`Platform`] owns the winit event loop and the single window. The render
//! loop calls [`Platform::update`] once per frame; it drains pending OS
//! events without blocking and reports whether to keep running.

use std::sync::Arc;
use std::time::Duration;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window as WinitWindow, WindowAttributes, WindowId};

use minirender_core::{Error, Result};

use crate::window::{Window, window_attributes};

/// Event handler state shared with winit during a pump.
struct PlatformState {
    attributes: WindowAttributes,
    window: Option<Arc<WinitWindow>>,
    close_requested: bool,
    pending_resize: Option<(u32, u32)>,
    error: Option<String>,
}

impl PlatformState {
    fn new(attributes: WindowAttributes) -> Self {
        Self {
            attributes,
            window: None,
            close_requested: false,
            pending_resize: None,
            error: None,
        }
    }

    fn on_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                // The swapchain is built once; resizes are only observed.
                tracing::debug!("Window resized to {}x{}", size.width, size.height);
                self.pending_resize = Some((size.width, size.height));
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for PlatformState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => {
                tracing::error!("Failed to create window: {}", e);
                self.error = Some(e.to_string());
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.on_window_event(&event);
    }
}

/// The OS window and the event loop driving it.
pub struct Platform {
    window: Window,
    state: PlatformState,
    event_loop: EventLoop<()>,
}

impl Platform {
    /// Creates the event loop and a non-resizable window.
    ///
    /// Events are pumped until the window exists.
    ///
    /// # Errors
    /// Returns an error if the event loop or the window cannot be created.
    pub fn open(width: u32, height: u32, title: &str) -> Result<Self> {
        let mut event_loop = EventLoop::new().map_err(|e| Error::Window(e.to_string()))?;
        let mut state = PlatformState::new(window_attributes(width, height, title));

        let window = loop {
            let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut state);
            if let Some(error) = state.error.take() {
                return Err(Error::Window(error));
            }
            if let Some(window) = state.window.clone() {
                break window;
            }
            if let PumpStatus::Exit(code) = status {
                return Err(Error::Window(format!(
                    "Event loop exited with code {} before the window opened",
                    code
                )));
            }
        };

        tracing::info!("Window created: {}x{} '{}'", width, height, title);

        Ok(Self {
            window: Window::new(window, width, height),
            state,
            event_loop,
        })
    }

    /// Drains pending events without blocking.
    ///
    /// Returns `false` once a close was requested or the event loop exited.
    pub fn update(&mut self) -> bool {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);
        if let PumpStatus::Exit(code) = status {
            tracing::debug!("Event loop exited with code {}", code);
            self.close();
        }
        !self.should_close()
    }

    /// Asks the loop to stop; the next [`Platform::update`] returns `false`.
    pub fn close(&mut self) {
        self.state.close_requested = true;
    }

    /// Whether a close was requested.
    pub fn should_close(&self) -> bool {
        self.state.close_requested
    }

    /// Returns the last observed resize, if any, and clears it.
    pub fn take_resize(&mut self) -> Option<(u32, u32)> {
        self.state.pending_resize.take()
    }

    /// The window opened by [`Platform::open`].
    pub fn window(&self) -> &Window {
        &self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalSize;

    fn state() -> PlatformState {
        PlatformState::new(window_attributes(800, 600, "test"))
    }

    #[test]
    fn test_close_requested_sets_flag() {
        let mut state = state();
        assert!(!state.close_requested);
        state.on_window_event(&WindowEvent::CloseRequested);
        assert!(state.close_requested);
    }

    #[test]
    fn test_resize_is_recorded() {
        let mut state = state();
        state.on_window_event(&WindowEvent::Resized(PhysicalSize::new(1024, 768)));
        state.on_window_event(&WindowEvent::Resized(PhysicalSize::new(640, 480)));
        assert_eq!(state.pending_resize.take(), Some((640, 480)));
        assert_eq!(state.pending_resize, None);
        assert!(!state.close_requested);
    }
}
