// MODEL: Simulation and scene data
pub mod camera;
pub mod entity;
pub mod physics_world;
pub mod scene;
pub mod shapes;

pub use camera::Camera;
pub use entity::{sync_bindings, EntityBinding};
pub use physics_world::{BodyDesc, BodyHandle, PhysicsWorld, Pose};
pub use scene::{Layer, Light, NodeId, Scene, TextureData, Transform, VisualMesh};
pub use shapes::{CollisionShape, ContactMaterial, MaterialId, ShapeInstance};
