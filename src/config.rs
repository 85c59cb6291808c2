use std::f32::consts::PI;

use glam::Vec3;
use serde::{Deserialize, Deserializer};

use crate::controller::input::KeyBindings;
use crate::error::AssetError;
use crate::model::ContactMaterial;

/// Optional overrides, looked up next to the other assets
pub const CONFIG_FILE: &str = "demo.toml";

/// Tunables for the whole demo; every section falls back to its defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub physics: PhysicsConfig,
    pub player: PlayerConfig,
    pub camera: CameraConfig,
    pub obstacles: ObstacleConfig,
    pub assets: AssetConfig,
    pub keys: KeyBindings,
}

impl DemoConfig {
    pub fn from_toml(text: &str, path: &str) -> Result<Self, AssetError> {
        toml::from_str(text).map_err(|source| AssetError::Config {
            path: path.to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    /// Seconds per physics step
    pub time_step: f32,
    /// Steps allowed per rendered frame before backlog is dropped
    pub max_substeps: u32,
    /// Longest frame delta fed to the stepper, in seconds
    pub max_frame_time: f32,
    pub ground_half_extents: Vec3,
    pub ground_position: Vec3,
    /// Contact between the car and the ground
    #[serde(deserialize_with = "ground_contact_over_defaults")]
    pub ground_contact: ContactMaterial,
    /// Used for every pair without a registered contact material
    #[serde(deserialize_with = "default_contact_over_defaults")]
    pub default_contact: ContactMaterial,
}

/// A `[physics.*_contact]` table; keys left out keep the section's own defaults
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
struct ContactOverride {
    friction: Option<f32>,
    restitution: Option<f32>,
    stiffness: Option<f32>,
    relaxation: Option<f32>,
}

impl ContactOverride {
    fn over(self, base: ContactMaterial) -> ContactMaterial {
        ContactMaterial {
            friction: self.friction.unwrap_or(base.friction),
            restitution: self.restitution.unwrap_or(base.restitution),
            stiffness: self.stiffness.unwrap_or(base.stiffness),
            relaxation: self.relaxation.unwrap_or(base.relaxation),
        }
    }
}

fn ground_contact_over_defaults<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ContactMaterial, D::Error> {
    let base = PhysicsConfig::default().ground_contact;
    Ok(ContactOverride::deserialize(deserializer)?.over(base))
}

fn default_contact_over_defaults<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ContactMaterial, D::Error> {
    let base = PhysicsConfig::default().default_contact;
    Ok(ContactOverride::deserialize(deserializer)?.over(base))
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.8, 0.0),
            time_step: 1.0 / 60.0,
            max_substeps: 5,
            max_frame_time: 0.1,
            ground_half_extents: Vec3::new(500.0, 0.01, 2000.0),
            ground_position: Vec3::new(0.0, 0.0, -190.0),
            ground_contact: ContactMaterial {
                friction: 0.0,
                restitution: 0.1,
                stiffness: 1e8,
                relaxation: 3.0,
            },
            default_contact: ContactMaterial::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub mass: f32,
    pub spawn: Vec3,
    pub linear_damping: f32,
    /// Visual origin relative to the physics origin
    pub mesh_offset: Vec3,
    pub drive_force: f32,
    pub steer_torque: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mass: 100.0,
            spawn: Vec3::new(0.0, 2.0, 0.0),
            linear_damping: 0.5,
            mesh_offset: Vec3::new(0.0, -1.3, 0.0),
            drive_force: 1000.0,
            steer_torque: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub initial_position: Vec3,
    /// Camera position relative to the player before rotation
    pub follow_offset: Vec3,
    /// Radians per pixel of mouse movement
    pub mouse_sensitivity: f32,
    /// Clamp for accumulated yaw and pitch, radians
    pub max_rotation: f32,
    /// User multiplier on `mouse_sensitivity`
    pub sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            z_near: 0.1,
            z_far: 1000.0,
            initial_position: Vec3::new(0.0, 5.0, 10.0),
            follow_offset: Vec3::new(0.0, 5.0, 10.0),
            mouse_sensitivity: 0.01,
            max_rotation: PI / 6.0,
            sensitivity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObstacleConfig {
    pub count: usize,
    pub radius: f32,
    pub mass: f32,
    pub height: f32,
    /// Distance between consecutive obstacles along -Z
    pub spacing: f32,
    /// Width of the band obstacles are scattered across on X
    pub spread: f32,
    pub seed: u64,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            count: 20,
            radius: 1.0,
            mass: 1.0,
            height: 5.0,
            spacing: 8.0,
            spread: 16.0,
            seed: 0x0b57_ac1e,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory (native) or URL prefix (web) all asset paths are relative to
    pub base: String,
    pub car: String,
    pub terrain: String,
    pub skybox: String,
    pub obstacle_texture: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            base: "assets/".to_string(),
            car: "Car/F1.glb".to_string(),
            terrain: "Car/Map.glb".to_string(),
            skybox: "skybox/skydome.glb".to_string(),
            obstacle_texture: "Object/obstacle.png".to_string(),
        }
    }
}
