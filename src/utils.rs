use std::f32::consts::PI;

use bytemuck::NoUninit;
use glam::Vec3;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, NoUninit)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(pos: Vec3, normal: Vec3, uv: [f32; 2]) -> Self {
        Self {
            pos: pos.to_array(),
            normal: normal.to_array(),
            color: [1.0, 1.0, 1.0, 1.0],
            uv,
        }
    }

    /// Vertex for debug line meshes (no lighting, solid color)
    pub fn line(pos: Vec3, color: [f32; 4]) -> Self {
        Self {
            pos: pos.to_array(),
            normal: [0.0, 1.0, 0.0],
            color,
            uv: [0.0, 0.0],
        }
    }
}

/// How the index buffer of a mesh is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Triangles,
    Lines,
}

pub struct MeshBuffer {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub topology: Topology,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub topology: Topology,
}

impl Mesh {
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            topology: Topology::Triangles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Append another mesh of the same topology, rebasing its indices
    pub fn extend(&mut self, other: &Mesh) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    pub fn upload(&self, device: &wgpu::Device) -> MeshBuffer {
        let vertices = bytemuck::cast_slice(&self.vertices);
        let indices = bytemuck::cast_slice(&self.indices);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: vertices,
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: indices,
            usage: wgpu::BufferUsages::INDEX,
        });

        MeshBuffer {
            vertex_buffer,
            index_buffer,
            index_count: self.indices.len() as u32,
            topology: self.topology,
        }
    }
}

/// UV sphere centred on the origin, `segments` around and `rings` top to bottom
pub fn create_sphere_mesh(radius: f32, segments: u32, rings: u32) -> Mesh {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
    let mut indices = Vec::with_capacity((segments * rings * 6) as usize);

    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let theta = v * PI;
        for seg in 0..=segments {
            let u = seg as f32 / segments as f32;
            let phi = u * PI * 2.0;
            let normal = Vec3::new(-phi.cos() * theta.sin(), theta.cos(), phi.sin() * theta.sin());
            vertices.push(Vertex::new(normal * radius, normal, [u, v]));
        }
    }

    let stride = segments + 1;
    for ring in 0..rings {
        for seg in 0..segments {
            let a = ring * stride + seg;
            let b = a + stride;
            // skip the degenerate triangles at the poles
            if ring != 0 {
                indices.extend_from_slice(&[a, b, a + 1]);
            }
            if ring != rings - 1 {
                indices.extend_from_slice(&[a + 1, b, b + 1]);
            }
        }
    }

    Mesh { vertices, indices, topology: Topology::Triangles }
}

/// Axis-aligned box with per-face normals
pub fn create_box_mesh(half_extents: Vec3) -> Mesh {
    let h = half_extents;
    let faces: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut mesh = Mesh::empty();
    for (normal, u, v) in faces {
        let base = mesh.vertices.len() as u32;
        let centre = normal * h;
        let (du, dv) = (u * h, v * h);
        mesh.vertices.push(Vertex::new(centre - du - dv, normal, [0.0, 1.0]));
        mesh.vertices.push(Vertex::new(centre + du - dv, normal, [1.0, 1.0]));
        mesh.vertices.push(Vertex::new(centre + du + dv, normal, [1.0, 0.0]));
        mesh.vertices.push(Vertex::new(centre - du + dv, normal, [0.0, 0.0]));
        mesh.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let mesh = create_sphere_mesh(2.0, 16, 8);
        assert!(!mesh.is_empty());
        for v in &mesh.vertices {
            let len = Vec3::from_array(v.pos).length();
            assert!((len - 2.0).abs() < 1e-4);
        }
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
        assert_eq!(mesh.indices.len() % 3, 0);
    }

    #[test]
    fn extend_rebases_indices() {
        let mut a = create_box_mesh(Vec3::ONE);
        let b = create_box_mesh(Vec3::splat(0.5));
        let count = a.vertices.len() as u32;
        a.extend(&b);
        assert_eq!(a.vertices.len(), 48);
        assert_eq!(a.indices[36], count);
        assert!(a.indices.iter().all(|&i| (i as usize) < a.vertices.len()));
    }
}
