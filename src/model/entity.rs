use glam::Vec3;

use crate::model::physics_world::{BodyHandle, PhysicsWorld};
use crate::model::scene::{NodeId, Scene};

/// Non-owning link between a physics body and the node that shows it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityBinding {
    pub body: BodyHandle,
    /// `None` until the visual has been loaded and added to the scene
    pub mesh: Option<NodeId>,
    /// Added to the body position (visual origin vs. shape origin)
    pub offset: Vec3,
}

impl EntityBinding {
    pub fn new(body: BodyHandle, mesh: Option<NodeId>) -> Self {
        Self { body, mesh, offset: Vec3::ZERO }
    }

    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    /// Copy the body pose onto the node. False when either side is missing.
    pub fn sync(&self, world: &PhysicsWorld, scene: &mut Scene) -> bool {
        let Some(node_id) = self.mesh else {
            return false;
        };
        let (Some(pose), Some(node)) = (world.body_pose(self.body), scene.node_mut(node_id)) else {
            return false;
        };
        node.transform.translation = pose.position + self.offset;
        node.transform.rotation = pose.orientation;
        true
    }
}

/// Sync every binding, returns how many were applied
pub fn sync_bindings(bindings: &[EntityBinding], world: &PhysicsWorld, scene: &mut Scene) -> usize {
    bindings
        .iter()
        .filter(|binding| binding.sync(world, scene))
        .count()
}
