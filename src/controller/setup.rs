use std::f32::consts::FRAC_PI_2;

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::assets::StartupAssets;
use crate::config::DemoConfig;
use crate::controller::camera_controller::CameraFollow;
use crate::controller::frame_loop::Simulation;
use crate::controller::input::InputProcessor;
use crate::controller::player::PlayerController;
use crate::controller::stepper::FixedStepper;
use crate::error::SetupError;
use crate::model::scene::rgb_hex;
use crate::model::{
    sync_bindings, BodyDesc, BodyHandle, Camera, CollisionShape, EntityBinding, Layer, Light, PhysicsWorld, Scene,
    ShapeInstance, Transform, VisualMesh,
};
use crate::utils::{create_sphere_mesh, Mesh, Topology};

const GROUND_SURFACE: &str = "ground";
const CAR_SURFACE: &str = "slippery";

const CAR_BOX_HALF_EXTENTS: Vec3 = Vec3::new(1.0, 1.3, 2.0);
const CAR_BOX_OFFSET: Vec3 = Vec3::new(0.0, 0.0, -1.0);
const CAR_WEDGE_OFFSET: Vec3 = Vec3::new(-1.0, -1.3, 1.0);

const SPHERE_SEGMENTS: u32 = 32;

/// Triangular prism forming the car's nose
pub fn car_wedge() -> CollisionShape {
    CollisionShape::ConvexPolyhedron {
        vertices: vec![
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 2.0),
            Vec3::new(2.0, 2.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::new(0.0, 2.0, 0.0),
        ],
        faces: vec![
            vec![3, 4, 5],
            vec![2, 1, 0],
            vec![1, 2, 5, 4],
            vec![0, 3, 4, 1],
            vec![0, 2, 5, 3],
        ],
    }
}

/// Obstacle positions: a line marching down -Z, scattered on X
pub fn obstacle_positions(config: &DemoConfig) -> Vec<Vec3> {
    let o = &config.obstacles;
    let mut rng = ChaCha8Rng::seed_from_u64(o.seed);
    (0..o.count)
        .map(|i| {
            let x = rng.gen::<f32>() * o.spread - o.spread / 2.0;
            Vec3::new(x, o.height, -((i + 1) as f32) * o.spacing)
        })
        .collect()
}

/// Build the demo world: ground, car, obstacles, their visuals, lights and camera
pub fn build_simulation(config: &DemoConfig, assets: StartupAssets, aspect: f32) -> Result<Simulation, SetupError> {
    let physics = &config.physics;
    let mut world = PhysicsWorld::new(physics.gravity);
    world.set_default_contact(physics.default_contact);
    let ground_surface = world.surface_material(GROUND_SURFACE);
    let car_surface = world.surface_material(CAR_SURFACE);
    world.register_contact_material(ground_surface, car_surface, physics.ground_contact);
    world.set_contact_softness(&physics.ground_contact);

    let mut scene = Scene::new();
    scene.add_light(Light::Hemisphere {
        sky: rgb_hex(0xffffbb),
        ground: rgb_hex(0x080820),
        intensity: 1.0,
    });
    scene.add_light(Light::Directional {
        color: Vec3::ONE,
        intensity: 1.0,
        position: Vec3::new(1.0, 10.0, 6.0),
    });

    let cam_cfg = &config.camera;
    let mut camera = Camera::perspective(cam_cfg.fov_y_degrees, aspect, cam_cfg.z_near, cam_cfg.z_far);
    camera.eye = cam_cfg.initial_position;
    camera.look_at(config.player.spawn);

    let skybox = scene.add_mesh(assets.skybox);
    scene.add_to_scene(
        VisualMesh::new("skybox", skybox)
            .with_transform(
                Transform::from_translation(Vec3::new(0.0, -40.0, 0.0))
                    .with_rotation(Quat::from_rotation_y(-FRAC_PI_2))
                    .with_scale(Vec3::splat(0.1)),
            )
            .unlit(),
    );

    if let Some(terrain) = assets.terrain {
        let terrain = scene.add_mesh(terrain);
        scene.add_to_scene(VisualMesh::new("terrain", terrain).with_transform(
            Transform::from_translation(Vec3::new(0.0, -0.1, 0.0)).with_rotation(Quat::from_rotation_y(FRAC_PI_2)),
        ));
    }

    let ground = world.add_body(
        &BodyDesc::new(0.0, physics.ground_position)
            .with_shape(ShapeInstance::centered(CollisionShape::Box {
                half_extents: physics.ground_half_extents,
            }))
            .with_material(ground_surface),
    )?;

    let p = &config.player;
    let car = world.add_body(
        &BodyDesc::new(p.mass, p.spawn)
            .with_shape(ShapeInstance::new(
                CollisionShape::Box { half_extents: CAR_BOX_HALF_EXTENTS },
                CAR_BOX_OFFSET,
            ))
            .with_shape(ShapeInstance::new(car_wedge(), CAR_WEDGE_OFFSET))
            .with_material(car_surface)
            .with_linear_damping(p.linear_damping),
    )?;
    let car_mesh = scene.add_mesh(assets.car);
    let car_node = scene.add_to_scene(VisualMesh::new("car", car_mesh));

    let mut bindings = vec![EntityBinding::new(car, Some(car_node)).with_offset(p.mesh_offset)];
    let player_binding = Some(0);
    let mut player = PlayerController::new(p.drive_force, p.steer_torque);
    player.attach(car);

    let o = &config.obstacles;
    let sphere = scene.add_mesh(create_sphere_mesh(o.radius, SPHERE_SEGMENTS, SPHERE_SEGMENTS));
    let texture = scene.add_texture(assets.obstacle_texture);
    let mut obstacles = Vec::with_capacity(o.count);
    for (i, position) in obstacle_positions(config).into_iter().enumerate() {
        let body = world.add_body(
            &BodyDesc::new(o.mass, position)
                .with_shape(ShapeInstance::centered(CollisionShape::Sphere { radius: o.radius })),
        )?;
        let node = scene.add_to_scene(
            VisualMesh::new(format!("obstacle-{i}"), sphere)
                .with_texture(texture)
                .unlit(),
        );
        bindings.push(EntityBinding::new(body, Some(node)));
        obstacles.push(body);
    }

    let debug_bodies = [ground, car].into_iter().chain(obstacles);
    for body in debug_bodies {
        if let Some(binding) = add_wireframe(&world, &mut scene, body) {
            bindings.push(binding);
        }
    }

    let synced = sync_bindings(&bindings, &world, &mut scene);
    info!(
        bodies = world.body_count(),
        nodes = scene.nodes().len(),
        synced,
        "world ready"
    );

    Ok(Simulation::from_parts(
        world,
        scene,
        camera,
        player,
        CameraFollow::from_config(cam_cfg),
        InputProcessor::new(config.keys.clone()),
        FixedStepper::new(physics.time_step, physics.max_substeps, physics.max_frame_time),
        bindings,
        player_binding,
    ))
}

/// Hidden line mesh of a body's collision shapes, bound to the body
fn add_wireframe(world: &PhysicsWorld, scene: &mut Scene, body: BodyHandle) -> Option<EntityBinding> {
    let shapes = world.body_shapes(body)?;
    let mut wire = Mesh {
        topology: Topology::Lines,
        ..Mesh::empty()
    };
    for instance in shapes {
        wire.extend(&instance.shape.wireframe(instance.offset));
    }
    let mesh = scene.add_mesh(wire);
    let node = scene.add_to_scene(
        VisualMesh::new("physics-wireframe", mesh)
            .on_layer(Layer::Debug)
            .unlit()
            .hidden(),
    );
    Some(EntityBinding::new(body, Some(node)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obstacles_march_down_the_track_within_spread() {
        let config = DemoConfig::default();
        let positions = obstacle_positions(&config);
        assert_eq!(positions.len(), 20);
        for (i, p) in positions.iter().enumerate() {
            assert!(p.x >= -8.0 && p.x <= 8.0);
            assert_eq!(p.y, 5.0);
            assert_eq!(p.z, -8.0 * (i + 1) as f32);
        }
    }

    #[test]
    fn same_seed_same_layout() {
        let config = DemoConfig::default();
        assert_eq!(obstacle_positions(&config), obstacle_positions(&config));
        let mut other = config.clone();
        other.obstacles.seed += 1;
        assert_ne!(obstacle_positions(&config), obstacle_positions(&other));
    }

    #[test]
    fn wedge_is_a_valid_polyhedron() {
        assert!(car_wedge().validate().is_ok());
    }
}
