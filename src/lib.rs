pub mod assets;
pub mod config;
pub mod error;
pub mod logging;
pub mod ui;
pub mod utils;

// MVC Architecture
pub mod controller;
pub mod model;
pub mod view;

pub use config::DemoConfig;
pub use controller::{build_simulation, Simulation};
pub use error::{AssetError, GpuInitError, PhysicsError, SetupError};

/// Load config and startup assets, then build the world. Shared by the web and native shells.
pub async fn load_simulation(asset_base: &str, aspect: f32) -> Result<Simulation, SetupError> {
    let config = assets::load_config(&assets::AssetSource::new(asset_base)).await?;
    let source = if config.assets.base == assets::DEFAULT_ASSET_BASE {
        assets::AssetSource::new(asset_base)
    } else {
        assets::AssetSource::new(config.assets.base.clone())
    };
    let startup = assets::StartupAssets::load(&source, &config.assets).await?;
    build_simulation(&config, startup, aspect)
}

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
    use web_sys::{Document, HtmlCanvasElement, KeyboardEvent, MouseEvent, Window};

    use crate::controller::input::wasm::{keyboard_event_to_input, mouse_move_to_input};
    use crate::controller::{InputEvent, InputState, KeyAction, Simulation};
    use crate::view::{EguiFrame, GpuContext, RenderState};
    use crate::{assets, logging, ui};

    #[wasm_bindgen(start)]
    pub async fn start() -> Result<(), JsValue> {
        logging::init();
        let (window, document, canvas) = init_canvas()?;
        setup_app(window, document, canvas).await.map_err(|e| {
            tracing::error!("startup failed: {e:?}");
            e
        })
    }

    async fn setup_app(window: Window, document: Document, canvas: HtmlCanvasElement) -> Result<(), JsValue> {
        let (width, height) = (canvas.width(), canvas.height());
        let gpu = GpuContext::new(&canvas, width, height)
            .await
            .map_err(|e| js_error(format!("GPU init failed: {e}")))?;

        let sim = crate::load_simulation(assets::DEFAULT_ASSET_BASE, width as f32 / height.max(1) as f32)
            .await
            .map_err(|e| js_error(format!("failed to start: {e}")))?;
        let sim = Rc::new(RefCell::new(sim));
        let input = Rc::new(RefCell::new(InputState::new()));
        let egui_events: Rc<RefCell<Vec<egui::Event>>> = Rc::new(RefCell::new(Vec::new()));
        let egui_ctx = egui::Context::default();

        setup_input_listeners(&document, &canvas, sim.clone(), input.clone(), egui_events.clone(), egui_ctx.clone())?;

        let mut render_state = RenderState::new(&gpu);
        let mut last = now_ms(&window);
        let frame_window = window.clone();
        let f = RcCellCallback::new(window, move || {
            let now = now_ms(&frame_window);
            let dt = ((now - last) / 1000.0) as f32;
            last = now;

            let mut sim = sim.borrow_mut();
            let report = sim.tick(dt, &mut input.borrow_mut());
            tracing::trace!(?report, "frame");

            let events = std::mem::take(&mut *egui_events.borrow_mut());
            let raw_input = ui::canvas_raw_input(gpu.config.width, gpu.config.height, 1.0, now, events);
            let output = ui::build_ui(&egui_ctx, raw_input, &mut sim, dt);
            let primitives = egui_ctx.tessellate(output.shapes, output.pixels_per_point);
            render_state.render(
                &gpu,
                &sim.scene,
                &sim.camera,
                Some(EguiFrame {
                    primitives,
                    textures_delta: output.textures_delta,
                    pixels_per_point: output.pixels_per_point,
                }),
            );
        });
        f.start()?;

        tracing::info!(width, height, "running");
        Ok(())
    }

    /// Keyboard, mouse and pointer-lock listeners feeding the input state and egui
    fn setup_input_listeners(
        document: &Document,
        canvas: &HtmlCanvasElement,
        sim: Rc<RefCell<Simulation>>,
        input: Rc<RefCell<InputState>>,
        egui_events: Rc<RefCell<Vec<egui::Event>>>,
        egui_ctx: egui::Context,
    ) -> Result<(), JsValue> {
        // Keyboard down
        {
            let input = input.clone();
            let sim = sim.clone();
            let document_for_exit = document.clone();
            let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                if !e.repeat() {
                    if let Some(action) = sim.borrow_mut().handle_key(&e.key()) {
                        if action == KeyAction::ReleasePointer {
                            document_for_exit.exit_pointer_lock();
                        }
                        e.prevent_default();
                    }
                }
                input.borrow_mut().process_event(&keyboard_event_to_input(&e, true));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
            keydown.forget();
        }

        // Keyboard up
        {
            let input = input.clone();
            let keyup = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                input.borrow_mut().process_event(&keyboard_event_to_input(&e, false));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keyup", keyup.as_ref().unchecked_ref())?;
            keyup.forget();
        }

        // Pointer lock change
        {
            let input = input.clone();
            let doc_pl = document.clone();
            let plc = Closure::wrap(Box::new(move |_e: web_sys::Event| {
                let locked = doc_pl.pointer_lock_element().is_some();
                input.borrow_mut().process_event(&InputEvent::PointerLockChanged { locked });
            }) as Box<dyn FnMut(web_sys::Event)>);
            document.add_event_listener_with_callback("pointerlockchange", plc.as_ref().unchecked_ref())?;
            plc.forget();
        }

        // Canvas click to enter pointer lock, unless the click was meant for the settings panel
        {
            let canvas_click = canvas.clone();
            let egui_ctx = egui_ctx.clone();
            let click = Closure::wrap(Box::new(move |_e: MouseEvent| {
                if !egui_ctx.is_pointer_over_area() {
                    canvas_click.request_pointer_lock();
                }
            }) as Box<dyn FnMut(MouseEvent)>);
            canvas.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
            click.forget();
        }

        // Mouse move: relative motion for the camera, absolute position for egui
        {
            let input = input.clone();
            let egui_events = egui_events.clone();
            let mm = Closure::wrap(Box::new(move |e: MouseEvent| {
                let mut input = input.borrow_mut();
                input.process_event(&mouse_move_to_input(&e));
                if !input.pointer_locked {
                    let pos = egui::pos2(e.offset_x() as f32, e.offset_y() as f32);
                    egui_events.borrow_mut().push(egui::Event::PointerMoved(pos));
                }
            }) as Box<dyn FnMut(MouseEvent)>);
            canvas.add_event_listener_with_callback("mousemove", mm.as_ref().unchecked_ref())?;
            mm.forget();
        }

        // Mouse buttons for egui
        for (event_name, pressed) in [("mousedown", true), ("mouseup", false)] {
            let egui_events = egui_events.clone();
            let button = Closure::wrap(Box::new(move |e: MouseEvent| {
                let button = match e.button() {
                    1 => egui::PointerButton::Middle,
                    2 => egui::PointerButton::Secondary,
                    _ => egui::PointerButton::Primary,
                };
                egui_events.borrow_mut().push(egui::Event::PointerButton {
                    pos: egui::pos2(e.offset_x() as f32, e.offset_y() as f32),
                    button,
                    pressed,
                    modifiers: egui::Modifiers::default(),
                });
            }) as Box<dyn FnMut(MouseEvent)>);
            canvas.add_event_listener_with_callback(event_name, button.as_ref().unchecked_ref())?;
            button.forget();
        }

        Ok(())
    }

    fn init_canvas() -> Result<(Window, Document, HtmlCanvasElement), JsValue> {
        let window = web_sys::window().ok_or_else(|| js_error("no global `window`"))?;
        let document = window.document().ok_or_else(|| js_error("no document on window"))?;
        let body = document.body().ok_or_else(|| js_error("no body on document"))?;
        let canvas_el = document
            .create_element("canvas")?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| js_error("failed to create canvas"))?;

        let size = |v: Result<JsValue, JsValue>, fallback: u32| {
            v.ok().and_then(|v| v.as_f64()).map(|v| v as u32).filter(|v| *v > 0).unwrap_or(fallback)
        };
        canvas_el.set_width(size(window.inner_width(), 800));
        canvas_el.set_height(size(window.inner_height(), 600));
        body.append_child(&canvas_el)?;
        Ok((window, document, canvas_el))
    }

    fn now_ms(window: &Window) -> f64 {
        window.performance().map(|p| p.now()).unwrap_or(0.0)
    }

    fn js_error<E: Into<String>>(msg: E) -> JsValue {
        JsValue::from_str(&msg.into())
    }

    /// requestAnimationFrame loop around a boxed frame callback
    struct RcCellCallback {
        inner: Rc<RefCell<Box<dyn FnMut()>>>,
        window: Window,
    }

    impl RcCellCallback {
        fn new(window: Window, f: impl FnMut() + 'static) -> Self {
            Self {
                inner: Rc::new(RefCell::new(Box::new(f))),
                window,
            }
        }

        fn start(self) -> Result<(), JsValue> {
            let inner = self.inner.clone();
            let window = self.window.clone();

            let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut()>>));
            let callback_clone = callback.clone();

            *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
                inner.borrow_mut().as_mut()();

                if let Some(cb) = callback_clone.borrow().as_ref() {
                    if let Err(e) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                        tracing::error!("requestAnimationFrame failed, stopping: {e:?}");
                    }
                }
            }) as Box<dyn FnMut()>));

            if let Some(cb) = callback.borrow().as_ref() {
                self.window.request_animation_frame(cb.as_ref().unchecked_ref())?;
            }

            // The closure reschedules itself and lives as long as the page
            std::mem::forget(callback);
            Ok(())
        }
    }
}
