use thiserror::Error;

/// Failures while fetching or decoding an asset
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {path}")]
    NotFound { path: String },

    #[error("failed to fetch {path}: {reason}")]
    Fetch { path: String, reason: String },

    #[error("failed to parse model {path}: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },

    #[error("model {path} contains no triangle geometry")]
    EmptyModel { path: String },

    #[error("failed to decode image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl AssetError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AssetError::NotFound { .. })
    }
}

/// Rejected body descriptions
#[derive(Debug, Error, PartialEq)]
pub enum PhysicsError {
    #[error("a rigid body needs at least one collision shape")]
    NoShapes,

    #[error("mass must be finite and non-negative, got {0}")]
    InvalidMass(f32),

    #[error("invalid collision shape: {0}")]
    InvalidShape(String),

    #[error("invalid convex polyhedron: {0}")]
    InvalidPolyhedron(String),

    #[error("unknown surface material id {0}")]
    UnknownMaterial(usize),
}

/// Anything that stops the demo from starting
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Physics(#[from] PhysicsError),
}

#[derive(Debug, Error)]
pub enum GpuInitError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter found: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to request device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
}
