use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

use crate::time::FrameClock;

use super::{WindowConfig, WindowHost};

/// Upper bound on startup pumps while waiting for the window to be created.
const STARTUP_PUMPS: usize = 100;
const STARTUP_PUMP_TIMEOUT: Duration = Duration::from_millis(10);

/// A `winit` window driven synchronously by pumping its event loop.
///
/// The frame loop calls [`WindowHost::poll_events`] once per frame instead of
/// handing control to `winit`.
pub struct WinitHost {
    event_loop: EventLoop<()>,
    window: Arc<Window>,
    state: HostState,
    clock: FrameClock,
}

impl WinitHost {
    /// Creates the event loop and the window.
    pub fn new(config: WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = HostState::new(config);

        // The window is created from `resumed`, which the first pumps deliver.
        for _ in 0..STARTUP_PUMPS {
            let status = event_loop.pump_app_events(Some(STARTUP_PUMP_TIMEOUT), &mut state);

            if let Some(err) = state.create_error.take() {
                anyhow::bail!("failed to create window: {err}");
            }
            if state.window.is_some() {
                break;
            }
            if let PumpStatus::Exit(code) = status {
                anyhow::bail!("event loop exited with code {code} before the window was created");
            }
        }

        let window = state.window.clone().context("window was not created")?;

        Ok(Self {
            event_loop,
            window,
            state,
            clock: FrameClock::new(),
        })
    }

    /// The hosted window.
    pub fn window(&self) -> Arc<Window> {
        self.window.clone()
    }
}

impl WindowHost for WinitHost {
    fn poll_events(&mut self) {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state)
        {
            log::debug!("event loop exited with code {code}");
            self.state.close_requested = true;
        }
    }

    fn close_requested(&self) -> bool {
        self.state.close_requested
    }

    fn time(&self) -> f64 {
        self.clock.elapsed()
    }

    fn take_resize(&mut self) -> Option<PhysicalSize<u32>> {
        self.state.pending_resize.take()
    }
}

struct HostState {
    config: WindowConfig,
    window: Option<Arc<Window>>,
    create_error: Option<winit::error::OsError>,
    close_requested: bool,
    pending_resize: Option<PhysicalSize<u32>>,
}

impl HostState {
    fn new(config: WindowConfig) -> Self {
        Self {
            config,
            window: None,
            create_error: None,
            close_requested: false,
            pending_resize: None,
        }
    }
}

impl ApplicationHandler for HostState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));

        match event_loop.create_window(attrs) {
            Ok(window) => {
                log::info!(
                    "window created: \"{}\" {}x{}",
                    self.config.title,
                    self.config.width,
                    self.config.height
                );
                self.window = Some(Arc::new(window));
            }
            Err(e) => {
                self.create_error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::debug!("close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => self.pending_resize = Some(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    self.pending_resize = Some(window.inner_size());
                }
            }
            _ => {}
        }
    }
}
