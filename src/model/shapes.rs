use std::f32::consts::TAU;

use glam::Vec3;
use rapier3d::prelude::*;

use crate::error::PhysicsError;
use crate::utils::{Mesh, Topology, Vertex};

/// Wireframe color for physics debug meshes
const DEBUG_LINE_COLOR: [f32; 4] = [0.1, 1.0, 0.2, 1.0];
const DEBUG_CIRCLE_SEGMENTS: u32 = 24;

/// Geometric primitive attached to a rigid body
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionShape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Convex hull given by explicit vertices and polygon faces (indices into `vertices`)
    ConvexPolyhedron { vertices: Vec<Vec3>, faces: Vec<Vec<u32>> },
}

/// A shape placed in its body's local frame
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeInstance {
    pub shape: CollisionShape,
    pub offset: Vec3,
}

impl ShapeInstance {
    pub fn new(shape: CollisionShape, offset: Vec3) -> Self {
        Self { shape, offset }
    }

    pub fn centered(shape: CollisionShape) -> Self {
        Self::new(shape, Vec3::ZERO)
    }
}

/// Named surface registered with the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub(crate) usize);

impl MaterialId {
    /// Encoding stored in a collider's user data; 0 means "no material"
    pub(crate) fn to_user_data(self) -> u128 {
        self.0 as u128 + 1
    }

    pub(crate) fn from_user_data(data: u128) -> Option<Self> {
        data.checked_sub(1).map(|id| MaterialId(id as usize))
    }
}

/// Contact response between two surface materials
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactMaterial {
    pub friction: f32,
    pub restitution: f32,
    /// Contact equation stiffness. Informational: rapier contacts are rigid, there is no compliance term.
    pub stiffness: f32,
    /// Steps over which penetration is corrected. Drives the world-wide contact softness,
    /// see [`PhysicsWorld::set_contact_softness`](crate::model::PhysicsWorld::set_contact_softness).
    pub relaxation: f32,
}

impl ContactMaterial {
    /// Fraction of penetration removed per step by a SPOOK solver with this relaxation
    pub fn error_reduction(&self) -> f32 {
        4.0 / (1.0 + 4.0 * self.relaxation.max(0.0))
    }
}

impl Default for ContactMaterial {
    fn default() -> Self {
        Self {
            friction: 0.3,
            restitution: 0.0,
            stiffness: 1e7,
            relaxation: 3.0,
        }
    }
}

impl CollisionShape {
    /// Reject degenerate boxes/spheres and malformed polyhedra
    pub fn validate(&self) -> Result<(), PhysicsError> {
        match self {
            CollisionShape::Box { half_extents } => {
                if half_extents.min_element() <= 0.0 || !half_extents.is_finite() {
                    return Err(PhysicsError::InvalidShape(format!(
                        "box half extents must be positive, got {half_extents}"
                    )));
                }
            }
            CollisionShape::Sphere { radius } => {
                if *radius <= 0.0 || !radius.is_finite() {
                    return Err(PhysicsError::InvalidShape(format!(
                        "sphere radius must be positive, got {radius}"
                    )));
                }
            }
            CollisionShape::ConvexPolyhedron { vertices, faces } => {
                if vertices.len() < 4 {
                    return Err(PhysicsError::InvalidPolyhedron(format!(
                        "need at least 4 vertices, got {}",
                        vertices.len()
                    )));
                }
                for (i, face) in faces.iter().enumerate() {
                    if face.len() < 3 {
                        return Err(PhysicsError::InvalidPolyhedron(format!(
                            "face {i} has {} indices",
                            face.len()
                        )));
                    }
                    if let Some(bad) = face.iter().find(|&&idx| idx as usize >= vertices.len()) {
                        return Err(PhysicsError::InvalidPolyhedron(format!(
                            "face {i} references vertex {bad} of {}",
                            vertices.len()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Build the rapier collider for this shape (without mass or material)
    pub(crate) fn collider_builder(&self) -> Result<ColliderBuilder, PhysicsError> {
        self.validate()?;
        let builder = match self {
            CollisionShape::Box { half_extents } => {
                ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
            CollisionShape::Sphere { radius } => ColliderBuilder::ball(*radius),
            CollisionShape::ConvexPolyhedron { vertices, faces } => {
                let points: Vec<Point<Real>> =
                    vertices.iter().map(|v| point![v.x, v.y, v.z]).collect();
                let triangles = fan_triangulate(faces);
                ColliderBuilder::convex_mesh(points.clone(), &triangles)
                    .or_else(|| ColliderBuilder::convex_hull(&points))
                    .ok_or_else(|| {
                        PhysicsError::InvalidPolyhedron("vertices do not span a volume".into())
                    })?
            }
        };
        Ok(builder)
    }

    /// Edges of the shape as a line list, shifted by `offset`
    pub fn wireframe(&self, offset: Vec3) -> Mesh {
        let mut mesh = Mesh { vertices: Vec::new(), indices: Vec::new(), topology: Topology::Lines };
        let mut push_edge = |a: Vec3, b: Vec3| {
            let base = mesh.vertices.len() as u32;
            mesh.vertices.push(Vertex::line(a + offset, DEBUG_LINE_COLOR));
            mesh.vertices.push(Vertex::line(b + offset, DEBUG_LINE_COLOR));
            mesh.indices.extend_from_slice(&[base, base + 1]);
        };

        match self {
            CollisionShape::Box { half_extents } => {
                let h = *half_extents;
                let corner = |i: u32| {
                    Vec3::new(
                        if i & 1 == 0 { -h.x } else { h.x },
                        if i & 2 == 0 { -h.y } else { h.y },
                        if i & 4 == 0 { -h.z } else { h.z },
                    )
                };
                // corners that differ in exactly one bit share an edge
                for a in 0..8u32 {
                    for bit in [1, 2, 4] {
                        let b = a | bit;
                        if b != a {
                            push_edge(corner(a), corner(b));
                        }
                    }
                }
            }
            CollisionShape::Sphere { radius } => {
                for axis in 0..3 {
                    for seg in 0..DEBUG_CIRCLE_SEGMENTS {
                        let a0 = seg as f32 / DEBUG_CIRCLE_SEGMENTS as f32 * TAU;
                        let a1 = (seg + 1) as f32 / DEBUG_CIRCLE_SEGMENTS as f32 * TAU;
                        let on_circle = |a: f32| {
                            let (s, c) = a.sin_cos();
                            let dir = match axis {
                                0 => Vec3::new(0.0, c, s),
                                1 => Vec3::new(c, 0.0, s),
                                _ => Vec3::new(c, s, 0.0),
                            };
                            dir * *radius
                        };
                        push_edge(on_circle(a0), on_circle(a1));
                    }
                }
            }
            CollisionShape::ConvexPolyhedron { vertices, faces } => {
                for face in faces {
                    for (i, &idx) in face.iter().enumerate() {
                        let next = face[(i + 1) % face.len()];
                        if let (Some(a), Some(b)) =
                            (vertices.get(idx as usize), vertices.get(next as usize))
                        {
                            push_edge(*a, *b);
                        }
                    }
                }
            }
        }
        mesh
    }
}

/// Split polygon faces into triangle fans
fn fan_triangulate(faces: &[Vec<u32>]) -> Vec<[u32; 3]> {
    faces
        .iter()
        .flat_map(|face| (1..face.len().saturating_sub(1)).map(move |i| [face[0], face[i], face[i + 1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wedge() -> CollisionShape {
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

    #[test]
    fn quads_become_two_triangles() {
        let tris = fan_triangulate(&[vec![0, 1, 2, 3], vec![4, 5, 6]]);
        assert_eq!(tris, vec![[0, 1, 2], [0, 2, 3], [4, 5, 6]]);
    }

    #[test]
    fn out_of_range_face_is_rejected() {
        let shape = CollisionShape::ConvexPolyhedron {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
            faces: vec![vec![0, 1, 9]],
        };
        assert!(matches!(shape.validate(), Err(PhysicsError::InvalidPolyhedron(_))));
    }

    #[test]
    fn wedge_builds_a_collider() {
        assert!(wedge().collider_builder().is_ok());
    }

    #[test]
    fn box_wireframe_has_twelve_edges() {
        let mesh = CollisionShape::Box { half_extents: Vec3::ONE }.wireframe(Vec3::ZERO);
        assert_eq!(mesh.topology, Topology::Lines);
        assert_eq!(mesh.indices.len(), 24);
    }

    #[test]
    fn wireframe_is_shifted_by_offset() {
        let offset = Vec3::new(0.0, 0.0, -1.0);
        let mesh = CollisionShape::Sphere { radius: 1.0 }.wireframe(offset);
        for v in &mesh.vertices {
            let d = Vec3::from_array(v.pos) - offset;
            assert!((d.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn user_data_round_trip_reserves_zero() {
        assert_eq!(MaterialId::from_user_data(0), None);
        assert_eq!(MaterialId::from_user_data(MaterialId(3).to_user_data()), Some(MaterialId(3)));
    }
}
