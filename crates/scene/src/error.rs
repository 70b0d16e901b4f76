/// Failures that abort initialisation of a single canvas.
///
/// Storage problems never surface here; the persistence adapter logs them and
/// falls back to defaults.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("canvas with id {0} not found")]
    CanvasNotFound(String),
    #[error("failed to create render target for canvas {0}")]
    RenderTarget(String),
    #[error("invalid scene configuration: {0}")]
    InvalidConfig(String),
    #[error("scene for canvas {0} is already initialized")]
    AlreadyInitialized(String),
}
