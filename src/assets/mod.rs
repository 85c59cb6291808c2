// Asset fetching and decoding
mod gltf_loader;
mod texture;

pub use gltf_loader::{bake_gltf, BakeRoot};
pub use texture::decode_texture;

use tracing::{info, warn};

use crate::config::{AssetConfig, DemoConfig, CONFIG_FILE};
use crate::error::AssetError;
use crate::model::TextureData;
use crate::utils::Mesh;

pub const DEFAULT_ASSET_BASE: &str = "assets/";

/// Where assets are read from: a URL prefix in the browser, a directory natively
#[derive(Debug, Clone)]
pub struct AssetSource {
    base: String,
}

impl AssetSource {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn resolve(&self, path: &str) -> String {
        if self.base.is_empty() {
            return path.to_string();
        }
        format!("{}/{}", self.base.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    #[cfg(target_arch = "wasm32")]
    pub async fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        use wasm_bindgen::JsCast;
        use wasm_bindgen_futures::JsFuture;

        let url = self.resolve(path);
        let fetch_err = |reason: String| AssetError::Fetch { path: url.clone(), reason };

        let window = web_sys::window().ok_or_else(|| fetch_err("no window".into()))?;
        let response = JsFuture::from(window.fetch_with_str(&url))
            .await
            .map_err(|e| fetch_err(format!("{e:?}")))?;
        let response: web_sys::Response = response
            .dyn_into()
            .map_err(|e| fetch_err(format!("not a response: {e:?}")))?;
        if response.status() == 404 {
            return Err(AssetError::NotFound { path: url });
        }
        if !response.ok() {
            return Err(fetch_err(format!("HTTP {}", response.status())));
        }
        let buffer = response.array_buffer().map_err(|e| fetch_err(format!("{e:?}")))?;
        let buffer = JsFuture::from(buffer).await.map_err(|e| fetch_err(format!("{e:?}")))?;
        Ok(js_sys::Uint8Array::new(&buffer).to_vec())
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub async fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        let full = self.resolve(path);
        std::fs::read(&full).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound { path: full.clone() },
            _ => AssetError::Fetch {
                path: full.clone(),
                reason: e.to_string(),
            },
        })
    }
}

/// Fetch a `.glb` and bake its default scene into one triangle mesh
pub async fn load_mesh(source: &AssetSource, path: &str) -> Result<Mesh, AssetError> {
    load_gltf(source, path, BakeRoot::Scene).await
}

/// Fetch a `.glb` and bake only its first root node, for meshes the demo positions itself
pub async fn load_model_root(source: &AssetSource, path: &str) -> Result<Mesh, AssetError> {
    load_gltf(source, path, BakeRoot::FirstNode).await
}

async fn load_gltf(source: &AssetSource, path: &str, root: BakeRoot) -> Result<Mesh, AssetError> {
    let bytes = source.fetch_bytes(path).await?;
    let mesh = bake_gltf(&bytes, path, root)?;
    info!(path, ?root, vertices = mesh.vertices.len(), "loaded model");
    Ok(mesh)
}

pub async fn load_texture(source: &AssetSource, path: &str) -> Result<TextureData, AssetError> {
    let bytes = source.fetch_bytes(path).await?;
    let texture = decode_texture(&bytes, path)?;
    info!(path, texture.width, texture.height, "loaded texture");
    Ok(texture)
}

/// `demo.toml` from the source, or defaults when there is none
pub async fn load_config(source: &AssetSource) -> Result<DemoConfig, AssetError> {
    match source.fetch_bytes(CONFIG_FILE).await {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let config = DemoConfig::from_toml(&text, CONFIG_FILE)?;
            info!(path = CONFIG_FILE, "loaded config overrides");
            Ok(config)
        }
        Err(e) if e.is_not_found() => {
            info!("no {CONFIG_FILE}, using defaults");
            Ok(DemoConfig::default())
        }
        Err(e) => Err(e),
    }
}

/// Result of loading one startup asset
#[derive(Debug)]
pub enum LoadOutcome<T> {
    Loaded(T),
    Failed(AssetError),
}

impl<T> From<Result<T, AssetError>> for LoadOutcome<T> {
    fn from(result: Result<T, AssetError>) -> Self {
        match result {
            Ok(value) => LoadOutcome::Loaded(value),
            Err(e) => LoadOutcome::Failed(e),
        }
    }
}

impl<T> LoadOutcome<T> {
    fn required(self, what: &str) -> Result<T, AssetError> {
        match self {
            LoadOutcome::Loaded(value) => Ok(value),
            LoadOutcome::Failed(e) => {
                tracing::error!(asset = what, error = %e, "required asset failed to load");
                Err(e)
            }
        }
    }

    fn optional(self, what: &str) -> Option<T> {
        match self {
            LoadOutcome::Loaded(value) => Some(value),
            LoadOutcome::Failed(e) => {
                warn!(asset = what, error = %e, "optional asset failed to load, continuing without it");
                None
            }
        }
    }
}

/// Everything the world needs before the first frame
#[derive(Debug, Clone)]
pub struct StartupAssets {
    pub car: Mesh,
    pub terrain: Option<Mesh>,
    pub skybox: Mesh,
    pub obstacle_texture: TextureData,
}

impl StartupAssets {
    /// Terrain may fail; car, skybox and obstacle texture may not
    pub fn from_outcomes(
        car: LoadOutcome<Mesh>,
        terrain: LoadOutcome<Mesh>,
        skybox: LoadOutcome<Mesh>,
        obstacle_texture: LoadOutcome<TextureData>,
    ) -> Result<Self, AssetError> {
        let terrain = terrain.optional("terrain");
        Ok(Self {
            car: car.required("car")?,
            terrain,
            skybox: skybox.required("skybox")?,
            obstacle_texture: obstacle_texture.required("obstacle texture")?,
        })
    }

    pub async fn load(source: &AssetSource, paths: &AssetConfig) -> Result<Self, AssetError> {
        let car = load_model_root(source, &paths.car).await.into();
        let terrain = load_mesh(source, &paths.terrain).await.into();
        let skybox = load_model_root(source, &paths.skybox).await.into();
        let texture = load_texture(source, &paths.obstacle_texture).await.into();
        Self::from_outcomes(car, terrain, skybox, texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_box_mesh;
    use glam::Vec3;

    fn texture() -> TextureData {
        TextureData {
            width: 1,
            height: 1,
            rgba: vec![255; 4],
        }
    }

    fn missing(path: &str) -> AssetError {
        AssetError::NotFound { path: path.into() }
    }

    #[test]
    fn terrain_failure_is_tolerated() {
        let assets = StartupAssets::from_outcomes(
            LoadOutcome::Loaded(create_box_mesh(Vec3::ONE)),
            LoadOutcome::Failed(missing("Car/Map.glb")),
            LoadOutcome::Loaded(create_box_mesh(Vec3::ONE)),
            LoadOutcome::Loaded(texture()),
        )
        .unwrap();
        assert!(assets.terrain.is_none());
    }

    #[test]
    fn car_failure_aborts() {
        let err = StartupAssets::from_outcomes(
            LoadOutcome::Failed(missing("Car/F1.glb")),
            LoadOutcome::Loaded(create_box_mesh(Vec3::ONE)),
            LoadOutcome::Loaded(create_box_mesh(Vec3::ONE)),
            LoadOutcome::Loaded(texture()),
        )
        .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("F1.glb"));
    }

    #[test]
    fn skybox_failure_aborts() {
        let err = StartupAssets::from_outcomes(
            LoadOutcome::Loaded(create_box_mesh(Vec3::ONE)),
            LoadOutcome::Loaded(create_box_mesh(Vec3::ONE)),
            LoadOutcome::Failed(missing("skybox/skydome.glb")),
            LoadOutcome::Loaded(texture()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("skydome.glb"));
    }

    #[test]
    fn obstacle_texture_failure_aborts() {
        let err = StartupAssets::from_outcomes(
            LoadOutcome::Loaded(create_box_mesh(Vec3::ONE)),
            LoadOutcome::Failed(missing("Car/Map.glb")),
            LoadOutcome::Loaded(create_box_mesh(Vec3::ONE)),
            LoadOutcome::Failed(AssetError::Image {
                path: "Object/obstacle.png".into(),
                source: image::ImageError::IoError(std::io::Error::other("truncated")),
            }),
        )
        .unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("obstacle.png"));
    }

    #[test]
    fn paths_join_with_single_slash() {
        assert_eq!(AssetSource::new("assets/").resolve("Car/F1.glb"), "assets/Car/F1.glb");
        assert_eq!(AssetSource::new("assets").resolve("/demo.toml"), "assets/demo.toml");
        assert_eq!(AssetSource::new("").resolve("demo.toml"), "demo.toml");
    }

    #[test]
    fn missing_file_is_not_found() {
        let source = AssetSource::new("definitely/not/here");
        let err = pollster::block_on(source.fetch_bytes("nothing.glb")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let source = AssetSource::new("definitely/not/here");
        let config = pollster::block_on(load_config(&source)).unwrap();
        assert_eq!(config.obstacles.count, 20);
    }
}
