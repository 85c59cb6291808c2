use glam::Vec3;

use rallydrive::assets::StartupAssets;
use rallydrive::controller::{FollowMode, InputEvent, InputState, KeyAction};
use rallydrive::model::{Layer, TextureData};
use rallydrive::utils::create_box_mesh;
use rallydrive::{build_simulation, DemoConfig, Simulation};

const FRAME: f32 = 1.0 / 60.0;

fn assets(with_terrain: bool) -> StartupAssets {
    StartupAssets {
        car: create_box_mesh(Vec3::new(1.0, 0.5, 2.0)),
        terrain: with_terrain.then(|| create_box_mesh(Vec3::new(50.0, 0.1, 50.0))),
        skybox: create_box_mesh(Vec3::splat(100.0)),
        obstacle_texture: TextureData {
            width: 1,
            height: 1,
            rgba: vec![200, 80, 40, 255],
        },
    }
}

fn simulation() -> Simulation {
    build_simulation(&DemoConfig::default(), assets(true), 16.0 / 9.0).unwrap()
}

fn run(sim: &mut Simulation, input: &mut InputState, frames: usize) {
    for _ in 0..frames {
        sim.tick(FRAME, input);
    }
}

fn assert_bindings_in_sync(sim: &Simulation) {
    for binding in sim.bindings() {
        let pose = sim.world.body_pose(binding.body).unwrap();
        let node = sim.scene.node(binding.mesh.unwrap()).unwrap();
        assert_eq!(node.transform.translation, pose.position + binding.offset);
        assert_eq!(node.transform.rotation, pose.orientation);
    }
}

#[test]
fn world_has_ground_car_and_obstacles() {
    let sim = simulation();
    // ground + car + 20 obstacles
    assert_eq!(sim.world.body_count(), 22);
    // car + obstacles + one wireframe per body
    assert_eq!(sim.bindings().len(), 1 + 20 + 22);
    assert!(sim.scene.find_node("terrain").is_some());
    assert!(sim.scene.find_node("skybox").is_some());
    assert_eq!(sim.scene.lights().len(), 2);
}

#[test]
fn missing_terrain_still_builds() {
    let sim = build_simulation(&DemoConfig::default(), assets(false), 1.0).unwrap();
    assert!(sim.scene.find_node("terrain").is_none());
    assert!(sim.player_binding().is_some());
}

#[test]
fn visuals_track_bodies_every_frame() {
    let mut sim = simulation();
    let mut input = InputState::new();
    input.process_event(&InputEvent::KeyDown("w".into()));
    input.process_event(&InputEvent::KeyDown("a".into()));
    for _ in 0..90 {
        sim.tick(FRAME, &mut input);
        assert_bindings_in_sync(&sim);
    }
}

#[test]
fn car_lands_on_the_ground_and_stays_above_it() {
    let mut sim = simulation();
    let mut input = InputState::new();
    let car = sim.player.body().unwrap();
    for _ in 0..120 {
        sim.tick(FRAME, &mut input);
        let y = sim.world.body_pose(car).unwrap().position.y;
        assert!(y > 1.0, "car sank to {y}");
    }
    let y = sim.world.body_pose(car).unwrap().position.y;
    assert!(y < 2.0, "car never fell: {y}");
    assert!(sim.world.linear_velocity(car).unwrap().y.abs() < 0.5);
}

#[test]
fn holding_forward_drives_along_local_z() {
    let mut sim = simulation();
    let mut input = InputState::new();
    let car = sim.player.body().unwrap();
    run(&mut sim, &mut input, 60);
    let start = sim.world.body_pose(car).unwrap().position;

    input.process_event(&InputEvent::KeyDown("w".into()));
    let mut last_speed = 0.0;
    for _ in 0..30 {
        let report = sim.tick(FRAME, &mut input);
        if report.substeps > 0 {
            assert_eq!(report.drive.force, Vec3::new(0.0, 0.0, 1000.0));
        }
        let vz = sim.world.local_linear_velocity(car).unwrap().z;
        assert!(vz >= last_speed - 1e-2);
        last_speed = vz;
    }
    assert!(last_speed > 0.0);
    assert!(sim.world.body_pose(car).unwrap().position.z > start.z);

    input.process_event(&InputEvent::KeyUp("w".into()));
    let report = sim.tick(FRAME, &mut input);
    assert!(report.drive.is_idle());
}

#[test]
fn camera_chases_the_car_mesh() {
    let mut sim = simulation();
    let mut input = InputState::new();
    run(&mut sim, &mut input, 10);

    let target = sim.player_target().unwrap();
    let car_node = sim.player_binding().unwrap().mesh.unwrap();
    assert_eq!(target, sim.scene.node(car_node).unwrap().transform.translation);
    assert_eq!(sim.camera.target, target);
    assert!((sim.camera.eye - (target + Vec3::new(0.0, 5.0, 10.0))).length() < 1e-4);
}

#[test]
fn mouse_rotation_is_clamped_through_the_frame_loop() {
    let mut sim = simulation();
    let mut input = InputState::new();
    for _ in 0..20 {
        input.process_event(&InputEvent::MouseMove { dx: -5000.0, dy: 300.0 });
        sim.tick(FRAME, &mut input);
        let state = sim.follow.state();
        assert!(state.yaw.abs() <= std::f32::consts::FRAC_PI_6 + 1e-6);
        assert!(state.pitch.abs() <= std::f32::consts::FRAC_PI_6 + 1e-6);
    }
}

#[test]
fn disabled_follow_leaves_camera_and_rotation_alone() {
    let mut sim = simulation();
    let mut input = InputState::new();
    run(&mut sim, &mut input, 5);

    assert_eq!(sim.handle_key("c"), Some(KeyAction::ToggleCamera));
    assert_eq!(sim.follow.mode(), FollowMode::Disabled);
    let eye = sim.camera.eye;
    let state = sim.follow.state();

    input.process_event(&InputEvent::KeyDown("w".into()));
    for _ in 0..30 {
        input.process_event(&InputEvent::MouseMove { dx: 40.0, dy: 0.0 });
        sim.tick(FRAME, &mut input);
    }
    assert_eq!(sim.camera.eye, eye);
    assert_eq!(sim.follow.state(), state);
}

fn visible_wireframes(sim: &Simulation) -> usize {
    sim.scene
        .nodes()
        .iter()
        .filter(|n| n.layer == Layer::Debug && n.visible)
        .count()
}

#[test]
fn debug_key_toggles_every_wireframe() {
    let mut sim = simulation();
    assert_eq!(visible_wireframes(&sim), 0);

    assert_eq!(sim.handle_key("f"), Some(KeyAction::ToggleDebug));
    assert!(sim.show_debug());
    assert_eq!(visible_wireframes(&sim), sim.world.body_count());

    sim.handle_key("F");
    assert!(!sim.show_debug());
    assert_eq!(visible_wireframes(&sim), 0);
}

#[test]
fn settings_panel_toggles_and_renders_headless() {
    let mut sim = simulation();
    assert!(!sim.settings_visible());
    assert_eq!(sim.handle_key("g"), Some(KeyAction::ToggleSettings));
    assert!(sim.settings_visible());

    let ctx = egui::Context::default();
    let output = rallydrive::ui::build_ui(&ctx, egui::RawInput::default(), &mut sim, FRAME);
    assert!(!output.shapes.is_empty());
}

#[test]
fn overrides_change_the_world() {
    let mut config = DemoConfig::default();
    config.obstacles.count = 3;
    config.player.spawn = Vec3::new(4.0, 3.0, 0.0);
    let sim = build_simulation(&config, assets(true), 1.0).unwrap();
    assert_eq!(sim.world.body_count(), 5);
    let car = sim.player.body().unwrap();
    assert_eq!(sim.world.body_pose(car).unwrap().position, Vec3::new(4.0, 3.0, 0.0));
}

#[test]
fn panel_sensitivity_scales_mouse_look() {
    let mut sim = simulation();
    let mut input = InputState::new();
    sim.follow.set_sensitivity(2.0);
    input.process_event(&InputEvent::MouseMove { dx: -5.0, dy: 0.0 });
    sim.tick(FRAME, &mut input);
    assert!((sim.follow.state().yaw - 0.1).abs() < 1e-6);
    assert_eq!(sim.telemetry().sensitivity, 2.0);
}

#[test]
fn telemetry_counts_physics_steps() {
    let mut sim = simulation();
    let mut input = InputState::new();
    assert_eq!(sim.telemetry().steps, 0);
    run(&mut sim, &mut input, 60);
    let steps = sim.telemetry().steps;
    assert!((58..=61).contains(&steps), "{steps} steps");
}
