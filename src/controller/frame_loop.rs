use glam::Vec3;
use tracing::{debug, info};

use crate::controller::camera_controller::{CameraFollow, FollowMode};
use crate::controller::input::{InputProcessor, InputState, KeyAction};
use crate::controller::player::{DriveCommand, PlayerController};
use crate::controller::stepper::FixedStepper;
use crate::model::{sync_bindings, Camera, EntityBinding, Layer, PhysicsWorld, Scene};

/// What one call to [`Simulation::tick`] did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub substeps: u32,
    /// Command of the last substep, idle when no step ran
    pub drive: DriveCommand,
    pub synced: usize,
}

/// Read-only numbers for the settings panel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    pub speed: f32,
    pub position: Vec3,
    pub follow: FollowMode,
    pub sensitivity: f32,
    pub steps: u64,
}

/// Everything a frame touches, owned in one place
pub struct Simulation {
    pub world: PhysicsWorld,
    pub scene: Scene,
    pub camera: Camera,
    pub player: PlayerController,
    pub follow: CameraFollow,
    pub processor: InputProcessor,
    pub stepper: FixedStepper,
    pub(crate) bindings: Vec<EntityBinding>,
    /// Index into `bindings`
    pub(crate) player_binding: Option<usize>,
    show_debug: bool,
    settings_visible: bool,
}

impl Simulation {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        world: PhysicsWorld,
        scene: Scene,
        camera: Camera,
        player: PlayerController,
        follow: CameraFollow,
        processor: InputProcessor,
        stepper: FixedStepper,
        bindings: Vec<EntityBinding>,
        player_binding: Option<usize>,
    ) -> Self {
        Self {
            world,
            scene,
            camera,
            player,
            follow,
            processor,
            stepper,
            bindings,
            player_binding,
            show_debug: false,
            settings_visible: false,
        }
    }

    /// Advance one displayed frame of `dt` seconds
    pub fn tick(&mut self, dt: f32, input: &mut InputState) -> FrameReport {
        let (dx, dy) = input.consume_look();
        self.follow.apply_mouse_delta(dx, dy);

        let substeps = self.stepper.advance(dt);
        let mut drive = DriveCommand::default();
        for _ in 0..substeps {
            drive = self.player.apply(input, &self.processor, &mut self.world);
            self.world.step(self.stepper.step());
        }

        let synced = sync_bindings(&self.bindings, &self.world, &mut self.scene);
        if let Some(target) = self.player_target() {
            self.follow.update(&mut self.camera, target);
        }

        FrameReport { substeps, drive, synced }
    }

    /// Where the camera aims: the player's visual, or its body when no visual is bound
    pub fn player_target(&self) -> Option<Vec3> {
        let binding = self.player_binding.and_then(|i| self.bindings.get(i))?;
        if let Some(node) = binding.mesh.and_then(|id| self.scene.node(id)) {
            return Some(node.transform.translation);
        }
        self.world
            .body_pose(binding.body)
            .map(|pose| pose.position + binding.offset)
    }

    pub fn bindings(&self) -> &[EntityBinding] {
        &self.bindings
    }

    pub fn player_binding(&self) -> Option<&EntityBinding> {
        self.player_binding.and_then(|i| self.bindings.get(i))
    }

    /// Apply a key press that maps to a one-shot action. `ReleasePointer` is left to the shell.
    pub fn handle_key(&mut self, key: &str) -> Option<KeyAction> {
        let action = self.processor.action_for_key(key)?;
        match action {
            KeyAction::ToggleDebug => self.set_show_debug(!self.show_debug),
            KeyAction::ToggleSettings => {
                self.settings_visible = !self.settings_visible;
                debug!(visible = self.settings_visible, "settings panel toggled");
            }
            KeyAction::ToggleCamera => {
                let mode = self.follow.toggle();
                info!(?mode, "camera follow toggled");
            }
            KeyAction::ReleasePointer => {}
        }
        Some(action)
    }

    pub fn show_debug(&self) -> bool {
        self.show_debug
    }

    pub fn set_show_debug(&mut self, show: bool) {
        self.show_debug = show;
        let changed = self.scene.set_layer_visible(Layer::Debug, show);
        debug!(show, changed, "physics wireframes toggled");
    }

    pub fn settings_visible(&self) -> bool {
        self.settings_visible
    }

    pub fn set_settings_visible(&mut self, visible: bool) {
        self.settings_visible = visible;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_aspect(width, height);
    }

    pub fn telemetry(&self) -> Telemetry {
        let body = self.player.body();
        let velocity = body
            .and_then(|b| self.world.linear_velocity(b))
            .unwrap_or(Vec3::ZERO);
        let position = body
            .and_then(|b| self.world.body_pose(b))
            .map(|pose| pose.position)
            .unwrap_or(Vec3::ZERO);
        Telemetry {
            speed: velocity.length(),
            position,
            follow: self.follow.mode(),
            sensitivity: self.follow.sensitivity(),
            steps: self.world.steps(),
        }
    }
}
