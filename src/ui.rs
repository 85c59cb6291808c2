use egui::{Context, RichText};

use crate::controller::camera_controller::{MAX_SENSITIVITY, MIN_SENSITIVITY};
use crate::controller::{FollowMode, Simulation};

/// Raw input for a canvas of the given size, fed with events gathered since the last frame
pub fn canvas_raw_input(width: u32, height: u32, pixels_per_point: f32, now_ms: f64, events: Vec<egui::Event>) -> egui::RawInput {
    let ppp = pixels_per_point.max(0.1);
    let mut raw_input = egui::RawInput {
        time: Some(now_ms / 1000.0),
        screen_rect: Some(egui::Rect::from_min_size(
            egui::Pos2::ZERO,
            egui::vec2(width as f32 / ppp, height as f32 / ppp),
        )),
        events,
        ..Default::default()
    };
    raw_input
        .viewports
        .entry(egui::ViewportId::ROOT)
        .or_default()
        .native_pixels_per_point = Some(ppp);
    raw_input
}

/// Run one egui pass over the simulation
pub fn build_ui(ctx: &Context, raw_input: egui::RawInput, sim: &mut Simulation, dt: f32) -> egui::FullOutput {
    ctx.run(raw_input, |ctx| draw_ui(ctx, sim, dt))
}

pub fn draw_ui(ctx: &Context, sim: &mut Simulation, dt: f32) {
    draw_controls_hint(ctx, sim);
    if sim.settings_visible() {
        draw_settings_window(ctx, sim, dt);
    }
}

fn draw_controls_hint(ctx: &Context, sim: &Simulation) {
    let keys = sim.processor.bindings();
    let hint = format!(
        "{}{}{}{} drive · {} settings · {} wireframes · {} camera",
        keys.forward.to_uppercase(),
        keys.left.to_uppercase(),
        keys.backward.to_uppercase(),
        keys.right.to_uppercase(),
        keys.toggle_settings.to_uppercase(),
        keys.toggle_debug.to_uppercase(),
        keys.toggle_camera.to_uppercase(),
    );
    egui::Area::new(egui::Id::new("controls_hint"))
        .anchor(egui::Align2::LEFT_BOTTOM, [8.0, -8.0])
        .show(ctx, |ui| {
            ui.label(RichText::new(hint).small().color(egui::Color32::WHITE));
        });
}

fn draw_settings_window(ctx: &Context, sim: &mut Simulation, dt: f32) {
    let mut open = true;
    egui::Window::new("Camera Settings")
        .open(&mut open)
        .default_pos([8.0, 8.0])
        .resizable(false)
        .show(ctx, |ui| {
            let mut sensitivity = sim.follow.sensitivity();
            if ui
                .add(egui::Slider::new(&mut sensitivity, MIN_SENSITIVITY..=MAX_SENSITIVITY).text("Sensitivity"))
                .changed()
            {
                sim.follow.set_sensitivity(sensitivity);
            }
            if ui.button("Reset Camera").clicked() {
                sim.follow.reset();
                tracing::debug!("camera rotation reset");
            }

            ui.separator();
            let t = sim.telemetry();
            ui.label(RichText::new(format!("FPS: {:.0}", if dt > 0.0 { 1.0 / dt } else { 0.0 })).small());
            ui.label(RichText::new(format!("Speed: {:.1} m/s", t.speed)).small());
            ui.label(
                RichText::new(format!(
                    "Pos: x: {:.1} y: {:.1} z: {:.1}",
                    t.position.x, t.position.y, t.position.z
                ))
                .small(),
            );
            let follow = match t.follow {
                FollowMode::Enabled => "following",
                FollowMode::Disabled => "free",
            };
            ui.label(RichText::new(format!("Camera: {follow}")).small());
            ui.label(RichText::new(format!("Physics steps: {}", t.steps)).small());
        });
    if !open {
        sim.set_settings_visible(false);
    }
}
