use glam::Vec3;

use crate::controller::input::{InputProcessor, InputState};
use crate::model::{BodyHandle, PhysicsWorld};

/// Force and torque pushed into the world for one physics step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveCommand {
    /// Body-local force
    pub force: Vec3,
    /// World-frame torque
    pub torque: Vec3,
}

impl DriveCommand {
    pub fn is_idle(&self) -> bool {
        self.force == Vec3::ZERO && self.torque == Vec3::ZERO
    }
}

/// Maps held drive keys onto the player's rigid body
#[derive(Debug, Clone)]
pub struct PlayerController {
    body: Option<BodyHandle>,
    pub drive_force: f32,
    pub steer_torque: f32,
}

impl PlayerController {
    pub fn new(drive_force: f32, steer_torque: f32) -> Self {
        Self {
            body: None,
            drive_force,
            steer_torque,
        }
    }

    pub fn attach(&mut self, body: BodyHandle) {
        self.body = Some(body);
    }

    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    /// What the current keys ask for; opposing keys cancel out
    pub fn command(&self, input: &InputState, processor: &InputProcessor) -> DriveCommand {
        let mut cmd = DriveCommand::default();
        if processor.is_driving_forward(input) {
            cmd.force.z += self.drive_force;
        }
        if processor.is_driving_backward(input) {
            cmd.force.z -= self.drive_force;
        }
        if processor.is_steering_left(input) {
            cmd.torque.y += self.steer_torque;
        }
        if processor.is_steering_right(input) {
            cmd.torque.y -= self.steer_torque;
        }
        cmd
    }

    /// Push the current command into the world. Nothing happens until a body is attached.
    pub fn apply(&self, input: &InputState, processor: &InputProcessor, world: &mut PhysicsWorld) -> DriveCommand {
        let Some(body) = self.body else {
            return DriveCommand::default();
        };
        let cmd = self.command(input, processor);
        if cmd.force != Vec3::ZERO {
            world.apply_local_force(body, cmd.force);
        }
        if cmd.torque != Vec3::ZERO {
            world.apply_torque(body, cmd.torque);
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::input::InputEvent;
    use crate::model::{BodyDesc, CollisionShape, ShapeInstance};

    fn held(keys: &[&str]) -> InputState {
        let mut input = InputState::new();
        for key in keys {
            input.process_event(&InputEvent::KeyDown(key.to_string()));
        }
        input
    }

    #[test]
    fn keys_map_to_force_and_torque() {
        let player = PlayerController::new(1000.0, 1000.0);
        let processor = InputProcessor::default();

        let cmd = player.command(&held(&["w", "a"]), &processor);
        assert_eq!(cmd.force, Vec3::new(0.0, 0.0, 1000.0));
        assert_eq!(cmd.torque, Vec3::new(0.0, 1000.0, 0.0));

        let cmd = player.command(&held(&["s", "d"]), &processor);
        assert_eq!(cmd.force, Vec3::new(0.0, 0.0, -1000.0));
        assert_eq!(cmd.torque, Vec3::new(0.0, -1000.0, 0.0));

        assert!(player.command(&held(&["w", "s"]), &processor).is_idle());
    }

    #[test]
    fn detached_controller_is_a_no_op() {
        let player = PlayerController::new(1000.0, 1000.0);
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let cmd = player.apply(&held(&["w"]), &InputProcessor::default(), &mut world);
        assert!(cmd.is_idle());
    }

    #[test]
    fn forward_key_pushes_along_local_z() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let body = world
            .add_body(&BodyDesc::new(100.0, Vec3::ZERO).with_shape(ShapeInstance::centered(
                CollisionShape::Box { half_extents: Vec3::ONE },
            )))
            .unwrap();
        let mut player = PlayerController::new(1000.0, 1000.0);
        player.attach(body);

        player.apply(&held(&["w"]), &InputProcessor::default(), &mut world);
        world.step(1.0 / 60.0);
        let v = world.local_linear_velocity(body).unwrap();
        assert!(v.z > 0.0);
        assert!(v.x.abs() < 1e-4);
    }
}
