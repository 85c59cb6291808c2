use std::collections::HashMap;

use glam::{Quat, Vec3};
use rapier3d::prelude::*;
use tracing::{debug, trace};

use crate::error::PhysicsError;
use crate::model::shapes::{ContactMaterial, MaterialId, ShapeInstance};

const DEFAULT_LINEAR_DAMPING: f32 = 0.01;
const DEFAULT_ANGULAR_DAMPING: f32 = 0.01;

/// Opaque reference to a rigid body owned by a [`PhysicsWorld`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

/// World-space position and orientation of a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

/// Everything needed to register a rigid body
#[derive(Debug, Clone)]
pub struct BodyDesc {
    pub shapes: Vec<ShapeInstance>,
    pub material: Option<MaterialId>,
    /// Kilograms; 0 makes the body fixed
    pub mass: f32,
    pub position: Vec3,
    pub linear_damping: Option<f32>,
}

impl BodyDesc {
    pub fn new(mass: f32, position: Vec3) -> Self {
        Self {
            shapes: Vec::new(),
            material: None,
            mass,
            position,
            linear_damping: None,
        }
    }

    pub fn with_shape(mut self, shape: ShapeInstance) -> Self {
        self.shapes.push(shape);
        self
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_linear_damping(mut self, damping: f32) -> Self {
        self.linear_damping = Some(damping);
        self
    }
}

/// Pairwise contact responses, consulted by the solver through rapier's hooks
#[derive(Default)]
struct ContactMaterialTable {
    pairs: HashMap<(MaterialId, MaterialId), ContactMaterial>,
}

impl ContactMaterialTable {
    fn key(a: MaterialId, b: MaterialId) -> (MaterialId, MaterialId) {
        if a <= b { (a, b) } else { (b, a) }
    }

    fn insert(&mut self, a: MaterialId, b: MaterialId, material: ContactMaterial) {
        self.pairs.insert(Self::key(a, b), material);
    }

    fn get(&self, a: MaterialId, b: MaterialId) -> Option<&ContactMaterial> {
        self.pairs.get(&Self::key(a, b))
    }
}

impl PhysicsHooks for ContactMaterialTable {
    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        let material_of = |handle: ColliderHandle| {
            context
                .colliders
                .get(handle)
                .and_then(|collider| MaterialId::from_user_data(collider.user_data))
        };
        let (Some(a), Some(b)) = (material_of(context.collider1), material_of(context.collider2)) else {
            return;
        };
        let Some(contact) = self.get(a, b) else {
            return;
        };
        for solver_contact in context.solver_contacts.iter_mut() {
            solver_contact.friction = contact.friction;
            solver_contact.restitution = contact.restitution;
        }
    }
}

/// Rigid-body simulation: owns every body, collider and contact material
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,

    contact_materials: ContactMaterialTable,
    default_contact: ContactMaterial,
    surface_names: Vec<String>,
    body_shapes: HashMap<BodyHandle, Vec<ShapeInstance>>,
    /// Bodies with forces pending for the next step
    loaded: Vec<BodyHandle>,
    /// Per-step error reduction contacts are tuned to, if any
    contact_erp: Option<f32>,
    steps: u64,
}

impl PhysicsWorld {
    /// Empty world with constant gravity
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity: vector![gravity.x, gravity.y, gravity.z],
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            contact_materials: ContactMaterialTable::default(),
            default_contact: ContactMaterial::default(),
            surface_names: Vec::new(),
            body_shapes: HashMap::new(),
            loaded: Vec::new(),
            contact_erp: None,
            steps: 0,
        }
    }

    /// Register a named surface, or return the id it already has
    pub fn surface_material(&mut self, name: &str) -> MaterialId {
        if let Some(idx) = self.surface_names.iter().position(|n| n == name) {
            return MaterialId(idx);
        }
        self.surface_names.push(name.to_string());
        debug!(name, id = self.surface_names.len() - 1, "registered surface material");
        MaterialId(self.surface_names.len() - 1)
    }

    pub fn surface_name(&self, material: MaterialId) -> Option<&str> {
        self.surface_names.get(material.0).map(String::as_str)
    }

    /// Friction/restitution used for contacts without a registered pair
    pub fn set_default_contact(&mut self, contact: ContactMaterial) {
        self.default_contact = contact;
    }

    /// Tune every contact to correct penetration at `contact`'s relaxation rate.
    /// rapier's contact softness is world-wide, so one material decides it.
    pub fn set_contact_softness(&mut self, contact: &ContactMaterial) {
        let erp = contact.error_reduction().clamp(0.01, 0.99);
        debug!(relaxation = contact.relaxation, erp, "contact softness");
        self.contact_erp = Some(erp);
    }

    pub fn register_contact_material(&mut self, a: MaterialId, b: MaterialId, contact: ContactMaterial) {
        debug!(
            a = self.surface_name(a).unwrap_or("?"),
            b = self.surface_name(b).unwrap_or("?"),
            friction = contact.friction,
            restitution = contact.restitution,
            "registered contact material"
        );
        self.contact_materials.insert(a, b, contact);
    }

    pub fn contact_material(&self, a: MaterialId, b: MaterialId) -> Option<&ContactMaterial> {
        self.contact_materials.get(a, b)
    }

    /// Register a rigid body; mass 0 makes it fixed
    pub fn add_body(&mut self, desc: &BodyDesc) -> Result<BodyHandle, PhysicsError> {
        if desc.shapes.is_empty() {
            return Err(PhysicsError::NoShapes);
        }
        if !desc.mass.is_finite() || desc.mass < 0.0 {
            return Err(PhysicsError::InvalidMass(desc.mass));
        }
        if let Some(material) = desc.material {
            if material.0 >= self.surface_names.len() {
                return Err(PhysicsError::UnknownMaterial(material.0));
            }
        }

        let is_static = desc.mass == 0.0;
        let mass_per_shape = desc.mass / desc.shapes.len() as f32;

        // Build every collider before touching the sets so a bad shape leaves the world unchanged
        let colliders = desc
            .shapes
            .iter()
            .map(|instance| {
                let o = instance.offset;
                let mut builder = instance
                    .shape
                    .collider_builder()?
                    .translation(vector![o.x, o.y, o.z])
                    .friction(self.default_contact.friction)
                    .restitution(self.default_contact.restitution);
                if !is_static {
                    builder = builder.mass(mass_per_shape);
                }
                if let Some(material) = desc.material {
                    builder = builder
                        .user_data(material.to_user_data())
                        .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS);
                }
                Ok(builder.build())
            })
            .collect::<Result<Vec<Collider>, PhysicsError>>()?;

        let p = desc.position;
        let builder = if is_static {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
        };
        let body = builder
            .translation(vector![p.x, p.y, p.z])
            .linear_damping(desc.linear_damping.unwrap_or(DEFAULT_LINEAR_DAMPING))
            .angular_damping(DEFAULT_ANGULAR_DAMPING)
            .build();

        let handle = self.rigid_body_set.insert(body);
        for collider in colliders {
            self.collider_set
                .insert_with_parent(collider, handle, &mut self.rigid_body_set);
        }

        let handle = BodyHandle(handle);
        self.body_shapes.insert(handle, desc.shapes.clone());
        debug!(
            mass = desc.mass,
            shapes = desc.shapes.len(),
            position = ?p,
            "added rigid body"
        );
        Ok(handle)
    }

    /// Force in the body's local frame, applied at the centre of mass for the next step
    pub fn apply_local_force(&mut self, handle: BodyHandle, force: Vec3) {
        let Some(body) = self.rigid_body_set.get_mut(handle.0) else {
            trace!(?handle, "force on unknown body ignored");
            return;
        };
        if !body.is_dynamic() {
            trace!(?handle, "force on fixed body ignored");
            return;
        }
        let world_force = body.rotation() * vector![force.x, force.y, force.z];
        body.add_force(world_force, true);
        self.loaded.push(handle);
    }

    /// World-frame torque for the next step
    pub fn apply_torque(&mut self, handle: BodyHandle, torque: Vec3) {
        let Some(body) = self.rigid_body_set.get_mut(handle.0) else {
            trace!(?handle, "torque on unknown body ignored");
            return;
        };
        if !body.is_dynamic() {
            trace!(?handle, "torque on fixed body ignored");
            return;
        }
        body.add_torque(vector![torque.x, torque.y, torque.z], true);
        self.loaded.push(handle);
    }

    /// Advance every body by one fixed step of `dt` seconds
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        if let Some(erp) = self.contact_erp {
            // erp = dt*w / (dt*w + 2*zeta), solved for the spring frequency w
            let zeta = self.integration_parameters.contact_damping_ratio;
            let angular = 2.0 * zeta * erp / (dt * (1.0 - erp));
            self.integration_parameters.contact_natural_frequency = angular / std::f32::consts::TAU;
        }
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &self.contact_materials,
            &(),
        );

        // forces are instantaneous: they only act on the step that follows them
        for handle in self.loaded.drain(..) {
            if let Some(body) = self.rigid_body_set.get_mut(handle.0) {
                body.reset_forces(false);
                body.reset_torques(false);
            }
        }
        self.steps += 1;
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    pub fn body_pose(&self, handle: BodyHandle) -> Option<Pose> {
        self.rigid_body_set.get(handle.0).map(|body| Pose {
            position: to_vec3(body.translation()),
            orientation: to_quat(body.rotation()),
        })
    }

    pub fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.rigid_body_set
            .get(handle.0)
            .map(|body| to_vec3(body.linvel()))
    }

    /// Linear velocity expressed in the body's own frame
    pub fn local_linear_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.rigid_body_set
            .get(handle.0)
            .map(|body| to_vec3(&body.rotation().inverse_transform_vector(body.linvel())))
    }

    pub fn is_static(&self, handle: BodyHandle) -> Option<bool> {
        self.rigid_body_set.get(handle.0).map(|body| body.is_fixed())
    }

    pub fn body_shapes(&self, handle: BodyHandle) -> Option<&[ShapeInstance]> {
        self.body_shapes.get(&handle).map(Vec::as_slice)
    }

    /// Handles of every registered body, in no particular order
    pub fn bodies(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.rigid_body_set.iter().map(|(handle, _)| BodyHandle(handle))
    }
}

fn to_vec3(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn to_quat(q: &Rotation<Real>) -> Quat {
    let c = q.coords;
    Quat::from_xyzw(c.x, c.y, c.z, c.w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::shapes::CollisionShape;

    const DT: f32 = 1.0 / 60.0;

    fn unit_box() -> ShapeInstance {
        ShapeInstance::centered(CollisionShape::Box { half_extents: Vec3::ONE })
    }

    fn ground(world: &mut PhysicsWorld) -> BodyHandle {
        let desc = BodyDesc::new(0.0, Vec3::new(0.0, 0.0, -190.0)).with_shape(ShapeInstance::centered(
            CollisionShape::Box { half_extents: Vec3::new(500.0, 0.01, 2000.0) },
        ));
        world.add_body(&desc).unwrap()
    }

    #[test]
    fn falling_body_rests_on_ground() {
        let mut world = PhysicsWorld::new(Vec3::new(0.0, -9.8, 0.0));
        ground(&mut world);
        let body = world
            .add_body(&BodyDesc::new(100.0, Vec3::new(0.0, 2.0, 0.0)).with_shape(unit_box()))
            .unwrap();

        // ground top at y = 0.01, box half height 1
        let surface = 0.01 + 1.0;
        for _ in 0..60 {
            world.step(DT);
            let y = world.body_pose(body).unwrap().position.y;
            assert!(y > surface - 0.05, "body sank into the ground: y = {y}");
        }
        let after_one_second = world.body_pose(body).unwrap().position.y;
        assert!(after_one_second < 2.0);

        for _ in 0..120 {
            world.step(DT);
        }
        let rest = world.body_pose(body).unwrap().position.y;
        assert!((rest - surface).abs() < 0.05, "resting height {rest}");
    }

    #[test]
    fn fixed_body_ignores_forces() {
        let mut world = PhysicsWorld::new(Vec3::new(0.0, -9.8, 0.0));
        let plane = ground(&mut world);
        let start = world.body_pose(plane).unwrap();
        for _ in 0..100 {
            world.apply_local_force(plane, Vec3::new(1.0e6, 1.0e6, 1.0e6));
            world.apply_torque(plane, Vec3::new(0.0, 1.0e6, 0.0));
            world.step(DT);
        }
        assert_eq!(world.body_pose(plane).unwrap(), start);
        assert_eq!(world.is_static(plane), Some(true));
    }

    #[test]
    fn forward_force_accelerates_monotonically() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let car = world
            .add_body(
                &BodyDesc::new(100.0, Vec3::ZERO)
                    .with_shape(unit_box())
                    .with_linear_damping(0.5),
            )
            .unwrap();

        let mut previous = 0.0;
        for _ in 0..120 {
            world.apply_local_force(car, Vec3::new(0.0, 0.0, 1000.0));
            world.step(DT);
            let vz = world.local_linear_velocity(car).unwrap().z;
            assert!(vz > 0.0);
            assert!(vz >= previous - 1e-5, "velocity dropped from {previous} to {vz}");
            previous = vz;
        }
    }

    #[test]
    fn relaxation_sets_contact_error_reduction() {
        let mut world = PhysicsWorld::new(Vec3::new(0.0, -9.8, 0.0));
        let default_erp = {
            world.integration_parameters.dt = DT;
            world.integration_parameters.contact_erp()
        };

        let contact = ContactMaterial { friction: 0.0, restitution: 0.1, stiffness: 1e8, relaxation: 3.0 };
        world.set_contact_softness(&contact);
        world.step(DT);
        let erp = world.integration_parameters.contact_erp();
        assert!((erp - 4.0 / 13.0).abs() < 1e-4, "erp {erp}");
        assert!(erp != default_erp);

        // slower relaxation gives softer contacts
        world.set_contact_softness(&ContactMaterial { relaxation: 10.0, ..contact });
        world.step(DT);
        assert!(world.integration_parameters.contact_erp() < erp);
    }

    #[test]
    fn forces_only_last_one_step() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let body = world
            .add_body(&BodyDesc::new(1.0, Vec3::ZERO).with_shape(unit_box()))
            .unwrap();
        world.apply_local_force(body, Vec3::new(60.0, 0.0, 0.0));
        world.step(DT);
        let v1 = world.linear_velocity(body).unwrap().x;
        world.step(DT);
        let v2 = world.linear_velocity(body).unwrap().x;
        assert!(v1 > 0.0);
        assert!(v2 <= v1);
    }

    #[test]
    fn contact_material_lookup_ignores_order() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let ground = world.surface_material("ground");
        let slippery = world.surface_material("slippery");
        let other = world.surface_material("rubber");
        assert_eq!(world.surface_material("ground"), ground);

        let contact = ContactMaterial { friction: 0.0, restitution: 0.1, stiffness: 1e8, relaxation: 3.0 };
        world.register_contact_material(ground, slippery, contact);
        assert_eq!(world.contact_material(slippery, ground), Some(&contact));
        assert_eq!(world.contact_material(ground, other), None);
    }

    #[test]
    fn frictionless_pair_keeps_sliding() {
        let mut world = PhysicsWorld::new(Vec3::new(0.0, -9.8, 0.0));
        let ground_mat = world.surface_material("ground");
        let ice = world.surface_material("ice");
        world.register_contact_material(
            ground_mat,
            ice,
            ContactMaterial { friction: 0.0, restitution: 0.0, ..ContactMaterial::default() },
        );
        world
            .add_body(
                &BodyDesc::new(0.0, Vec3::ZERO)
                    .with_shape(ShapeInstance::centered(CollisionShape::Box {
                        half_extents: Vec3::new(100.0, 0.5, 100.0),
                    }))
                    .with_material(ground_mat),
            )
            .unwrap();
        let slider = world
            .add_body(
                &BodyDesc::new(1.0, Vec3::new(0.0, 1.0, 0.0))
                    .with_shape(ShapeInstance::centered(CollisionShape::Box { half_extents: Vec3::splat(0.5) }))
                    .with_material(ice)
                    .with_linear_damping(0.0),
            )
            .unwrap();
        let grippy = world
            .add_body(
                &BodyDesc::new(1.0, Vec3::new(10.0, 1.0, 0.0))
                    .with_shape(ShapeInstance::centered(CollisionShape::Box { half_extents: Vec3::splat(0.5) }))
                    .with_linear_damping(0.0),
            )
            .unwrap();

        // let both settle, then push them equally along x
        for _ in 0..30 {
            world.step(DT);
        }
        for _ in 0..30 {
            world.apply_local_force(slider, Vec3::new(20.0, 0.0, 0.0));
            world.apply_local_force(grippy, Vec3::new(20.0, 0.0, 0.0));
            world.step(DT);
        }
        let slid = world.linear_velocity(slider).unwrap().x;
        let gripped = world.linear_velocity(grippy).unwrap().x;
        assert!(slid > gripped, "frictionless {slid} vs default {gripped}");
    }

    #[test]
    fn invalid_bodies_are_rejected() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        assert_eq!(world.add_body(&BodyDesc::new(1.0, Vec3::ZERO)), Err(PhysicsError::NoShapes));
        assert_eq!(
            world.add_body(&BodyDesc::new(-1.0, Vec3::ZERO).with_shape(unit_box())),
            Err(PhysicsError::InvalidMass(-1.0))
        );
        assert_eq!(
            world.add_body(&BodyDesc::new(1.0, Vec3::ZERO).with_shape(unit_box()).with_material(MaterialId(7))),
            Err(PhysicsError::UnknownMaterial(7))
        );
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn compound_body_keeps_its_shapes() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let desc = BodyDesc::new(100.0, Vec3::ZERO)
            .with_shape(ShapeInstance::new(
                CollisionShape::Box { half_extents: Vec3::new(1.0, 1.3, 2.0) },
                Vec3::new(0.0, 0.0, -1.0),
            ))
            .with_shape(ShapeInstance::new(CollisionShape::Sphere { radius: 0.5 }, Vec3::new(0.0, 1.0, 0.0)));
        let body = world.add_body(&desc).unwrap();
        assert_eq!(world.body_shapes(body).map(<[_]>::len), Some(2));
        assert_eq!(world.bodies().count(), 1);
    }
}
