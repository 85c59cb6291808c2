use glam::{Quat, Vec3};

use crate::config::CameraConfig;
use crate::model::Camera;

pub const MIN_SENSITIVITY: f32 = 0.1;
pub const MAX_SENSITIVITY: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowMode {
    Enabled,
    /// Camera left wherever it was; mouse input ignored
    Disabled,
}

/// Accumulated mouse rotation, radians
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraState {
    pub yaw: f32,
    pub pitch: f32,
}

/// Chase camera: fixed offset behind the player, swung around by the mouse
#[derive(Debug, Clone)]
pub struct CameraFollow {
    mode: FollowMode,
    state: CameraState,
    offset: Vec3,
    base_sensitivity: f32,
    sensitivity: f32,
    max_rotation: f32,
}

impl CameraFollow {
    pub fn new(offset: Vec3, base_sensitivity: f32, max_rotation: f32) -> Self {
        Self {
            mode: FollowMode::Enabled,
            state: CameraState::default(),
            offset,
            base_sensitivity,
            sensitivity: 1.0,
            max_rotation: max_rotation.abs(),
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        let mut follow = Self::new(config.follow_offset, config.mouse_sensitivity, config.max_rotation);
        follow.set_sensitivity(config.sensitivity);
        follow
    }

    pub fn mode(&self) -> FollowMode {
        self.mode
    }

    pub fn toggle(&mut self) -> FollowMode {
        self.mode = match self.mode {
            FollowMode::Enabled => FollowMode::Disabled,
            FollowMode::Disabled => FollowMode::Enabled,
        };
        self.mode
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY);
    }

    /// Only horizontal movement steers the camera
    pub fn apply_mouse_delta(&mut self, dx: f32, _dy: f32) {
        if self.mode == FollowMode::Disabled {
            return;
        }
        let limit = self.max_rotation;
        self.state.yaw = (self.state.yaw - dx * self.base_sensitivity * self.sensitivity).clamp(-limit, limit);
        self.state.pitch = self.state.pitch.clamp(-limit, limit);
    }

    pub fn reset(&mut self) {
        self.state = CameraState::default();
    }

    /// Pitch about X then yaw about Y, composed into one rotation
    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_x(self.state.pitch) * Quat::from_rotation_y(self.state.yaw)
    }

    /// Place the camera behind `target` and aim at it
    pub fn update(&self, camera: &mut Camera, target: Vec3) {
        if self.mode == FollowMode::Disabled {
            return;
        }
        camera.eye = target + self.rotation() * self.offset;
        camera.look_at(target);
    }
}
