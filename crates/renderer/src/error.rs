//! Renderer error types.

use thiserror::Error;
use toy2d_resources::ResourceError;
use toy2d_rhi::RhiError;

/// Error type for renderer and engine operations.
#[derive(Error, Debug)]
pub enum RendererError {
    /// Failure in the Vulkan layer
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// Image or shader file could not be loaded
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Geometry handed to the renderer is malformed
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The windowing layer failed to create a surface
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),
}

impl RendererError {
    /// Short name of the stage that failed, for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            RendererError::Rhi(e) => e.stage(),
            RendererError::Resource(_) => "asset loading",
            RendererError::InvalidGeometry(_) => "geometry upload",
            RendererError::SurfaceCreation(_) => "surface",
        }
    }

    /// Whether the render loop must stop.
    pub fn is_fatal(&self) -> bool {
        match self {
            RendererError::Rhi(e) => e.is_fatal(),
            RendererError::SurfaceCreation(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for renderer operations.
pub type RendererResult<T> = std::result::Result<T, RendererError>;

#[cfg(test)]
mod tests {
    use super::*;
    use toy2d_rhi::vk;

    #[test]
    fn test_stage_delegates_to_rhi() {
        let err = RendererError::from(RhiError::AcquisitionError(vk::Result::ERROR_OUT_OF_DATE_KHR));
        assert_eq!(err.stage(), "image acquisition");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_invalid_geometry_is_not_fatal() {
        let err = RendererError::InvalidGeometry("index 4 out of range".into());
        assert_eq!(err.stage(), "geometry upload");
        assert!(!err.is_fatal());
    }
}
