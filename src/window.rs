//! Window shell: winit event loop driving the engine.
//!
//! The close request is observed here, between frames; the in-flight work of
//! an interrupted loop is never canceled, only drained when the engine drops.

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::EngineError;

/// Run the frame loop for the given configuration until the window closes
/// or a fatal error occurs.
pub(crate) fn run(config: EngineConfig) -> Result<(), EngineError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        config,
        window: None,
        engine: None,
        failure: None,
    };
    event_loop.run_app(&mut app)?;

    match app.failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

struct App {
    config: EngineConfig,
    window: Option<Arc<Window>>,
    engine: Option<Engine>,
    failure: Option<EngineError>,
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: EngineError) {
        log::error!("{}", error);
        self.failure = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ))
            .with_resizable(false);

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        match Engine::new(&window, self.config.clone()) {
            Ok(engine) => {
                self.engine = Some(engine);
                window.request_redraw();
                self.window = Some(window);
            }
            Err(e) => self.fail(event_loop, e.into()),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                // Dropping the engine after the loop exits drains all
                // in-flight frames before any resource is released.
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if self.failure.is_some() {
                    return;
                }
                if let Some(engine) = self.engine.as_mut() {
                    match engine.run_frame() {
                        Ok(()) => {
                            if let Some(window) = &self.window {
                                window.request_redraw();
                            }
                        }
                        Err(e) => self.fail(event_loop, e.into()),
                    }
                }
            }
            _ => {}
        }
    }
}
