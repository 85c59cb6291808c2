use glam::{Mat4, Quat, Vec3, Vec4};

use crate::utils::Mesh;

pub type MeshId = usize;
pub type TextureId = usize;
pub type NodeId = usize;

/// Decoded RGBA8 image
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::default() }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Which pass a node is drawn in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    World,
    /// Physics wireframes, toggled as a group
    Debug,
}

/// A renderable node: mesh + material parameters + transform
#[derive(Debug, Clone)]
pub struct VisualMesh {
    pub name: String,
    pub mesh: MeshId,
    pub texture: Option<TextureId>,
    pub transform: Transform,
    pub tint: Vec4,
    /// Skip lighting (skybox, textured obstacles)
    pub unlit: bool,
    pub visible: bool,
    pub layer: Layer,
}

impl VisualMesh {
    pub fn new(name: impl Into<String>, mesh: MeshId) -> Self {
        Self {
            name: name.into(),
            mesh,
            texture: None,
            transform: Transform::default(),
            tint: Vec4::ONE,
            unlit: false,
            visible: true,
            layer: Layer::World,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_texture(mut self, texture: TextureId) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn unlit(mut self) -> Self {
        self.unlit = true;
        self
    }

    pub fn on_layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    /// Sky/ground gradient lighting by surface normal
    Hemisphere { sky: Vec3, ground: Vec3, intensity: f32 },
    /// Sun-like light shining from `position` towards the origin
    Directional { color: Vec3, intensity: f32, position: Vec3 },
}

/// Convert a 0xRRGGBB color to linear-ish floats
pub fn rgb_hex(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

/// CPU-side scene graph; the renderer uploads from it lazily
pub struct Scene {
    meshes: Vec<Mesh>,
    textures: Vec<TextureData>,
    nodes: Vec<VisualMesh>,
    lights: Vec<Light>,
    pub background: [f64; 4],
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            meshes: Vec::new(),
            textures: Vec::new(),
            nodes: Vec::new(),
            lights: Vec::new(),
            background: [0.5, 0.8, 1.0, 1.0],
        }
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_texture(&mut self, texture: TextureData) -> TextureId {
        self.textures.push(texture);
        self.textures.len() - 1
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn add_to_scene(&mut self, node: VisualMesh) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureData> {
        self.textures.get(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&VisualMesh> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut VisualMesh> {
        self.nodes.get_mut(id)
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn textures(&self) -> &[TextureData] {
        &self.textures
    }

    pub fn nodes(&self) -> &[VisualMesh] {
        &self.nodes
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Show or hide every node on a layer, returns how many changed
    pub fn set_layer_visible(&mut self, layer: Layer, visible: bool) -> usize {
        let mut changed = 0;
        for node in self.nodes.iter_mut().filter(|n| n.layer == layer) {
            if node.visible != visible {
                node.visible = visible;
                changed += 1;
            }
        }
        changed
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_box_mesh;

    #[test]
    fn layer_visibility_only_touches_that_layer() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(create_box_mesh(Vec3::ONE));
        let car = scene.add_to_scene(VisualMesh::new("car", mesh));
        let wire = scene.add_to_scene(VisualMesh::new("car-wire", mesh).on_layer(Layer::Debug).hidden());

        assert_eq!(scene.set_layer_visible(Layer::Debug, true), 1);
        assert!(scene.node(wire).unwrap().visible);
        assert!(scene.node(car).unwrap().visible);
        assert_eq!(scene.set_layer_visible(Layer::Debug, true), 0);
    }

    #[test]
    fn hex_colors_split_into_channels() {
        let c = rgb_hex(0xffffbb);
        assert_eq!(c.x, 1.0);
        assert_eq!(c.y, 1.0);
        assert!((c.z - 187.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn transform_matrix_applies_scale_then_rotation_then_translation() {
        let t = Transform::from_translation(Vec3::new(0.0, -40.0, 0.0))
            .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2))
            .with_scale(Vec3::splat(0.1));
        let p = t.matrix().transform_point3(Vec3::new(10.0, 0.0, 0.0));
        assert!((p - Vec3::new(0.0, -40.0, -1.0)).length() < 1e-5);
    }
}
