use glam::{Mat3, Mat4, Vec3};
use gltf::buffer::Data;
use gltf::mesh::Mode;

use crate::error::AssetError;
use crate::utils::{Mesh, Topology, Vertex};

/// Which part of the default scene gets baked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeRoot {
    /// Every root node, each with its transform
    Scene,
    /// Only the first root node's subtree, in that node's own frame.
    /// Meshes placed by the demo use this; their placement replaces the node's transform.
    FirstNode,
}

/// Parse a binary glTF and flatten its default scene into one mesh.
/// Node transforms are applied and each primitive's base color becomes its vertex color.
pub fn bake_gltf(bytes: &[u8], path: &str, root: BakeRoot) -> Result<Mesh, AssetError> {
    let gltf_err = |source| AssetError::Gltf {
        path: path.to_string(),
        source,
    };
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes).map_err(gltf_err)?;
    let buffers = gltf::import_buffers(&document, None, blob).map_err(gltf_err)?;

    let mut mesh = Mesh::empty();
    if let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) {
        match root {
            BakeRoot::Scene => {
                for node in scene.nodes() {
                    let local = Mat4::from_cols_array_2d(&node.transform().matrix());
                    bake_node(&node, local, &buffers, &mut mesh);
                }
            }
            BakeRoot::FirstNode => {
                if let Some(node) = scene.nodes().next() {
                    bake_node(&node, Mat4::IDENTITY, &buffers, &mut mesh);
                }
            }
        }
    }

    if mesh.is_empty() {
        return Err(AssetError::EmptyModel { path: path.to_string() });
    }
    Ok(mesh)
}

/// Bake `node` with `world` as its full transform, then its children beneath it
fn bake_node(node: &gltf::Node, world: Mat4, buffers: &[Data], out: &mut Mesh) {

    if let Some(gltf_mesh) = node.mesh() {
        let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
        for primitive in gltf_mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                tracing::debug!(mode = ?primitive.mode(), "skipping non-triangle primitive");
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<Vec3> = positions.map(|p| world.transform_point3(Vec3::from(p))).collect();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            if indices.iter().any(|&i| i as usize >= positions.len()) {
                tracing::warn!(mesh = ?gltf_mesh.name(), "primitive indices out of range, skipped");
                continue;
            }
            let normals: Vec<Vec3> = match reader.read_normals() {
                Some(normals) => normals
                    .map(|n| (normal_matrix * Vec3::from(n)).normalize_or_zero())
                    .collect(),
                None => face_normals(&positions, &indices),
            };
            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|uv| uv.into_f32().collect())
                .unwrap_or_default();
            let color = primitive.material().pbr_metallic_roughness().base_color_factor();

            let vertices = positions
                .iter()
                .enumerate()
                .map(|(i, &pos)| {
                    let normal = normals.get(i).copied().unwrap_or(Vec3::Y);
                    let uv = uvs.get(i).copied().unwrap_or([0.0, 0.0]);
                    Vertex { color, ..Vertex::new(pos, normal, uv) }
                })
                .collect();
            out.extend(&Mesh {
                vertices,
                indices,
                topology: Topology::Triangles,
            });
        }
    }

    for child in node.children() {
        let local = Mat4::from_cols_array_2d(&child.transform().matrix());
        bake_node(&child, world * local, buffers, out);
    }
}

/// Area-weighted vertex normals for primitives that ship without any
fn face_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal GLB: one red triangle in the XY plane on a root node translated by +1 on X,
    /// with a child node carrying the same triangle one unit up
    fn triangle_glb() -> Vec<u8> {
        let json = r#"{
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"nodes": [0]}],
            "nodes": [
                {"mesh": 0, "translation": [1.0, 0.0, 0.0], "children": [1]},
                {"mesh": 0, "translation": [0.0, 1.0, 0.0]}
            ],
            "materials": [{"pbrMetallicRoughness": {"baseColorFactor": [1.0, 0.0, 0.0, 1.0]}}],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "material": 0}]}],
            "accessors": [{
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            }],
            "bufferViews": [{"buffer": 0, "byteLength": 36}],
            "buffers": [{"byteLength": 36}]
        }"#;
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = Vec::new();
        for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
        glb
    }

    #[test]
    fn scene_bake_applies_every_node_transform() {
        let mesh = bake_gltf(&triangle_glb(), "triangle.glb", BakeRoot::Scene).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(mesh.vertices[0].pos, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[1].pos, [2.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[3].pos, [1.0, 1.0, 0.0]);
        assert_eq!(mesh.vertices[0].color, [1.0, 0.0, 0.0, 1.0]);
        let n = Vec3::from(mesh.vertices[2].normal);
        assert!((n - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn first_node_bake_drops_the_root_transform_only() {
        let mesh = bake_gltf(&triangle_glb(), "triangle.glb", BakeRoot::FirstNode).unwrap();
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.vertices[0].pos, [0.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[1].pos, [1.0, 0.0, 0.0]);
        // the child keeps its own offset relative to the root
        assert_eq!(mesh.vertices[3].pos, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = bake_gltf(b"definitely not a model", "junk.glb", BakeRoot::Scene).unwrap_err();
        assert!(matches!(err, AssetError::Gltf { .. }));
    }
}
