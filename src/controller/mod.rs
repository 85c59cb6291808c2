// CONTROLLER: Input, driving, camera and the per-frame update
pub mod camera_controller;
pub mod frame_loop;
pub mod input;
pub mod player;
pub mod setup;
pub mod stepper;

pub use camera_controller::{CameraFollow, CameraState, FollowMode};
pub use frame_loop::{FrameReport, Simulation, Telemetry};
pub use input::{InputEvent, InputProcessor, InputState, KeyAction, KeyBindings};
pub use player::{DriveCommand, PlayerController};
pub use setup::build_simulation;
pub use stepper::FixedStepper;
