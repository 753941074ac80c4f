//! RHI-specific error types.
//!
//! Four variants are always fatal: [`RhiError::ResourceCreationError`],
//! [`RhiError::AcquisitionError`], [`RhiError::PresentationError`] and
//! [`RhiError::DeviceLostError`]. So are the remaining frame-stage failures
//! ([`RhiError::RecordingError`], [`RhiError::SubmissionError`]) and
//! [`RhiError::FrameLoopHalted`]. Nothing in this crate retries them.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error outside the frame-loop stages
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// A GPU object could not be created (no compatible memory type, zero
    /// size, pipeline or layout creation failure)
    #[error("Resource creation failed: {0}")]
    ResourceCreationError(String),

    /// Acquiring the next swapchain image failed
    #[error("Failed to acquire swapchain image: {0}")]
    AcquisitionError(vk::Result),

    /// Presenting a swapchain image did not return success
    #[error("Failed to present swapchain image: {0}")]
    PresentationError(vk::Result),

    /// Waiting on a fence or queue failed
    #[error("Device lost while waiting for the GPU: {0}")]
    DeviceLostError(vk::Result),

    /// Resetting, beginning or ending a frame's command buffer failed
    #[error("Failed to record frame commands: {0}")]
    RecordingError(vk::Result),

    /// Submitting a frame to the graphics queue failed
    #[error("Failed to submit frame: {0}")]
    SubmissionError(vk::Result),

    /// A previous frame failed after its fence was reset; the slot can never
    /// be waited on again
    #[error("Frame loop halted after a {0} failure")]
    FrameLoopHalted(&'static str),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Shader module error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Buffer access out of range or on unmappable memory
    #[error("Invalid buffer access: {0}")]
    InvalidAccess(String),
}

impl RhiError {
    /// Short name of the stage that failed, for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            RhiError::ResourceCreationError(_) => "resource creation",
            RhiError::AcquisitionError(_) => "image acquisition",
            RhiError::PresentationError(_) => "presentation",
            RhiError::DeviceLostError(_) => "device wait",
            RhiError::RecordingError(_) => "command recording",
            RhiError::SubmissionError(_) => "submission",
            RhiError::FrameLoopHalted(_) => "frame loop",
            RhiError::LoadingError(_) => "loader",
            RhiError::NoSuitableGpu => "device selection",
            RhiError::ShaderError(_) => "shader",
            RhiError::SurfaceError(_) => "surface",
            RhiError::SwapchainError(_) => "swapchain",
            RhiError::InvalidAccess(_) => "buffer access",
            RhiError::VulkanError(_) => "vulkan call",
        }
    }

    /// Whether the error is unrecoverable and must end the render loop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RhiError::ResourceCreationError(_)
                | RhiError::AcquisitionError(_)
                | RhiError::PresentationError(_)
                | RhiError::DeviceLostError(_)
                | RhiError::RecordingError(_)
                | RhiError::SubmissionError(_)
                | RhiError::FrameLoopHalted(_)
        )
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(
            RhiError::AcquisitionError(vk::Result::ERROR_OUT_OF_DATE_KHR).stage(),
            "image acquisition"
        );
        assert_eq!(
            RhiError::PresentationError(vk::Result::SUBOPTIMAL_KHR).stage(),
            "presentation"
        );
        assert_eq!(
            RhiError::DeviceLostError(vk::Result::ERROR_DEVICE_LOST).stage(),
            "device wait"
        );
    }

    #[test]
    fn test_fatal_taxonomy() {
        assert!(RhiError::ResourceCreationError("no memory type".into()).is_fatal());
        assert!(RhiError::DeviceLostError(vk::Result::ERROR_DEVICE_LOST).is_fatal());
        assert!(!RhiError::ShaderError("bad".into()).is_fatal());
        assert!(!RhiError::from(vk::Result::ERROR_OUT_OF_HOST_MEMORY).is_fatal());
    }

    #[test]
    fn test_every_frame_stage_failure_is_fatal() {
        let stages = [
            RhiError::DeviceLostError(vk::Result::TIMEOUT),
            RhiError::AcquisitionError(vk::Result::ERROR_OUT_OF_DATE_KHR),
            RhiError::RecordingError(vk::Result::ERROR_OUT_OF_HOST_MEMORY),
            RhiError::SubmissionError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            RhiError::PresentationError(vk::Result::SUBOPTIMAL_KHR),
            RhiError::FrameLoopHalted("submission"),
        ];
        for err in &stages {
            assert!(err.is_fatal(), "{} should be fatal", err);
        }
        assert_eq!(stages[3].stage(), "submission");
        assert_eq!(stages[2].stage(), "command recording");
    }

    #[test]
    fn test_display_names_the_stage() {
        let msg = RhiError::PresentationError(vk::Result::ERROR_SURFACE_LOST_KHR).to_string();
        assert!(msg.contains("present"));
    }
}
