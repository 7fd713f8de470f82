//! glint - colored-cube demo entry point.
//!
//! The winit event loop is the window collaborator: it delivers resize,
//! focus, and mouse events into the shell's application hooks and drives
//! one frame per redraw. The clock pauses while the window is minimized
//! or unfocused, matching the shell's pause semantics.

mod cube;

use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use glint_core::FrameClock;
use glint_platform::{MouseButton, MouseState, Window};
use glint_renderer::shell::{Shell, ShellApp};

use cube::CubeDemo;

/// Default client area size.
const WINDOW_WIDTH: u32 = 800;
const WINDOW_HEIGHT: u32 = 600;

struct App {
    // Declared before the shell so its GPU resources drop first; the
    // frame loop's trailing flush means nothing is in flight by then
    cube: CubeDemo,
    shell: Option<Shell>,
    window: Option<Window>,
    mouse: MouseState,
    clock: FrameClock,
}

impl App {
    fn new() -> Self {
        Self {
            cube: CubeDemo::new(),
            shell: None,
            window: None,
            mouse: MouseState::new(),
            clock: FrameClock::new(),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(event_loop, WINDOW_WIDTH, WINDOW_HEIGHT, "glint") {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let mut shell = match Shell::new(&window) {
            Ok(shell) => shell,
            Err(e) => {
                error!("Failed to initialize GPU stack: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.cube.setup(&mut shell) {
            error!("Failed to build demo resources: {:?}", e);
            event_loop.exit();
            return;
        }

        info!("Initialization complete, entering main loop");
        self.shell = Some(shell);
        self.window = Some(window);
        self.clock.reset();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(ref mut window) = self.window {
                    window.resize(size.width, size.height);
                }

                if size.width == 0 || size.height == 0 {
                    // Minimized: stop the clock until the window comes back
                    self.clock.stop();
                    return;
                }
                self.clock.start();

                if let Some(ref mut shell) = self.shell {
                    if let Err(e) = shell.resize(size.width, size.height) {
                        error!("Resize failed: {:?}", e);
                        event_loop.exit();
                        return;
                    }
                }
                self.cube.on_resize(size.width, size.height);
            }
            WindowEvent::Focused(focused) => {
                if focused {
                    self.clock.start();
                } else {
                    self.clock.stop();
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(button) = MouseButton::from_winit(button) {
                    let (x, y) = self.mouse.position();
                    match state {
                        ElementState::Pressed => {
                            self.mouse.on_button_down(button);
                            self.cube.on_mouse_down(button, x, y);
                        }
                        ElementState::Released => {
                            self.mouse.on_button_up(button);
                            self.cube.on_mouse_up(button, x, y);
                        }
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (dx, dy) = self.mouse.on_move(position.x as f32, position.y as f32);
                self.cube
                    .on_mouse_move(position.x as f32, position.y as f32, dx, dy);
            }
            WindowEvent::RedrawRequested => {
                self.clock.tick();

                if self.clock.is_stopped() {
                    // Paused: don't spin the CPU
                    std::thread::sleep(Duration::from_millis(100));
                    return;
                }

                self.cube
                    .update(self.clock.delta_time(), self.clock.total_time());

                let (Some(shell), Some(window)) = (self.shell.as_mut(), self.window.as_ref())
                else {
                    return;
                };

                match shell.draw_frame(&mut self.cube) {
                    Ok(true) => {
                        if let Err(e) = shell.resize(window.width(), window.height()) {
                            error!("Swapchain recreation failed: {:?}", e);
                            event_loop.exit();
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        error!("Render error: {:?}", e);
                        event_loop.exit();
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    glint_core::init_logging();
    info!("Starting glint");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)?;

    Ok(())
}
