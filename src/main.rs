use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

use rallydrive::controller::{InputEvent, InputState, KeyAction};
use rallydrive::view::{EguiFrame, FrameOutcome, GpuContext, RenderState};
use rallydrive::{assets, logging, ui, Simulation};

/// Key names as the browser reports them, so bindings work the same on both shells
fn key_name(code: KeyCode) -> Option<&'static str> {
    Some(match code {
        KeyCode::KeyA => "a",
        KeyCode::KeyB => "b",
        KeyCode::KeyC => "c",
        KeyCode::KeyD => "d",
        KeyCode::KeyE => "e",
        KeyCode::KeyF => "f",
        KeyCode::KeyG => "g",
        KeyCode::KeyH => "h",
        KeyCode::KeyI => "i",
        KeyCode::KeyJ => "j",
        KeyCode::KeyK => "k",
        KeyCode::KeyL => "l",
        KeyCode::KeyM => "m",
        KeyCode::KeyN => "n",
        KeyCode::KeyO => "o",
        KeyCode::KeyP => "p",
        KeyCode::KeyQ => "q",
        KeyCode::KeyR => "r",
        KeyCode::KeyS => "s",
        KeyCode::KeyT => "t",
        KeyCode::KeyU => "u",
        KeyCode::KeyV => "v",
        KeyCode::KeyW => "w",
        KeyCode::KeyX => "x",
        KeyCode::KeyY => "y",
        KeyCode::KeyZ => "z",
        KeyCode::Space => " ",
        KeyCode::Escape => "Escape",
        KeyCode::ArrowUp => "ArrowUp",
        KeyCode::ArrowDown => "ArrowDown",
        KeyCode::ArrowLeft => "ArrowLeft",
        KeyCode::ArrowRight => "ArrowRight",
        KeyCode::ShiftLeft | KeyCode::ShiftRight => "Shift",
        _ => return None,
    })
}

/// Presses egui took stay with egui; releases always reach the game so no key stays held
fn reaches_game(state: ElementState, consumed_by_egui: bool) -> bool {
    state == ElementState::Released || !consumed_by_egui
}

struct Running {
    window: Arc<Window>,
    gpu: GpuContext,
    render_state: RenderState,
    sim: Simulation,
    input: InputState,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    last_frame: Instant,
}

impl Running {
    fn new(event_loop: &ActiveEventLoop, asset_base: &str) -> Result<Self, String> {
        let attributes = Window::default_attributes()
            .with_title("rallydrive")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|e| format!("failed to create window: {e}"))?,
        );
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| format!("failed to create surface: {e}"))?;
        let gpu = pollster::block_on(GpuContext::new_native(&instance, surface, size.width, size.height))
            .map_err(|e| format!("GPU init failed: {e}"))?;

        let aspect = size.width as f32 / size.height.max(1) as f32;
        let sim = pollster::block_on(rallydrive::load_simulation(asset_base, aspect))
            .map_err(|e| format!("failed to start: {e}"))?;

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let render_state = RenderState::new(&gpu);

        tracing::info!(width = size.width, height = size.height, "running");
        Ok(Self {
            window,
            gpu,
            render_state,
            sim,
            input: InputState::new(),
            egui_ctx,
            egui_state,
            last_frame: Instant::now(),
        })
    }

    fn set_pointer_locked(&mut self, locked: bool) {
        if locked {
            let grabbed = self
                .window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));
            if let Err(e) = grabbed {
                tracing::warn!(error = %e, "could not grab cursor");
                return;
            }
        } else if let Err(e) = self.window.set_cursor_grab(CursorGrabMode::None) {
            tracing::warn!(error = %e, "could not release cursor");
        }
        self.window.set_cursor_visible(!locked);
        self.input.process_event(&InputEvent::PointerLockChanged { locked });
    }

    fn on_key(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let Some(name) = key_name(code) else {
            return;
        };
        match event.state {
            ElementState::Pressed => {
                if !event.repeat && self.sim.handle_key(name) == Some(KeyAction::ReleasePointer) {
                    self.set_pointer_locked(false);
                }
                self.input.process_event(&InputEvent::KeyDown(name.to_string()));
            }
            ElementState::Released => {
                self.input.process_event(&InputEvent::KeyUp(name.to_string()));
            }
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.gpu.resize(width, height);
        self.render_state.resize(&self.gpu.device, width, height);
        self.sim.resize(width, height);
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;

        let report = self.sim.tick(dt, &mut self.input);
        tracing::trace!(?report, "frame");

        let raw_input = self.egui_state.take_egui_input(&self.window);
        let output = ui::build_ui(&self.egui_ctx, raw_input, &mut self.sim, dt);
        self.egui_state
            .handle_platform_output(&self.window, output.platform_output);
        let primitives = self.egui_ctx.tessellate(output.shapes, output.pixels_per_point);

        let outcome = self.render_state.render(
            &self.gpu,
            &self.sim.scene,
            &self.sim.camera,
            Some(EguiFrame {
                primitives,
                textures_delta: output.textures_delta,
                pixels_per_point: output.pixels_per_point,
            }),
        );
        if outcome == FrameOutcome::Skipped {
            tracing::trace!("frame skipped");
        }
    }
}

struct App {
    asset_base: String,
    running: Option<Running>,
    failed: bool,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match Running::new(event_loop, &self.asset_base) {
            Ok(running) => self.running = Some(running),
            Err(e) => {
                tracing::error!("{e}");
                self.failed = true;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(app) = self.running.as_mut() else {
            return;
        };
        if window_id != app.window.id() {
            return;
        }

        // egui gets first look; events it consumes do not reach the game
        let consumed = app.egui_state.on_window_event(&app.window, &event).consumed;

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => app.resize(size.width, size.height),
            WindowEvent::RedrawRequested => app.redraw(),
            WindowEvent::KeyboardInput { event, .. } if reaches_game(event.state, consumed) => app.on_key(&event),
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } if !consumed && !app.egui_ctx.is_pointer_over_area() => app.set_pointer_locked(true),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        let Some(app) = self.running.as_mut() else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta } = event {
            // unlocked cursor motion belongs to egui
            if app.input.pointer_locked {
                app.input.process_event(&InputEvent::MouseMove {
                    dx: delta.0 as f32,
                    dy: delta.1 as f32,
                });
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(app) = self.running.as_ref() {
            app.window.request_redraw();
        }
    }
}

fn main() -> ExitCode {
    logging::init();

    let asset_base = std::env::args()
        .nth(1)
        .unwrap_or_else(|| assets::DEFAULT_ASSET_BASE.to_string());

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            tracing::error!("failed to create event loop: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut app = App {
        asset_base,
        running: None,
        failed: false,
    };
    if let Err(e) = event_loop.run_app(&mut app) {
        tracing::error!("event loop error: {e}");
        return ExitCode::FAILURE;
    }
    if app.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
