//! Engine configuration.
//!
//! Configuration is read from an optional TOML file. Every field has a
//! default, so a missing file or a partial file is fine:
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//!
//! [renderer]
//! max_frames_in_flight = 2
//! clear_color = [0.1, 0.1, 0.1, 1.0]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub renderer: RendererConfig,
}

/// Window creation parameters.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Toy2D".to_string(),
        }
    }
}

/// Renderer parameters.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Number of frame slots that may be in flight at once.
    pub max_frames_in_flight: usize,
    /// Swapchain image count requested before clamping to surface limits.
    pub preferred_image_count: u32,
    /// Clear color of the single render pass.
    pub clear_color: [f32; 4],
    /// Use MAILBOX presentation when the surface supports it.
    pub prefer_mailbox: bool,
    /// Enable the Khronos validation layer when available.
    pub validation: bool,
    /// SPIR-V vertex shader path.
    pub vertex_shader: PathBuf,
    /// SPIR-V fragment shader path.
    pub fragment_shader: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_frames_in_flight: 2,
            preferred_image_count: 2,
            clear_color: [0.1, 0.1, 0.1, 1.0],
            prefer_mailbox: true,
            validation: cfg!(debug_assertions),
            vertex_shader: PathBuf::from("shader/triangle.vert.spv"),
            fragment_shader: PathBuf::from("shader/triangle.frag.spv"),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from TOML text and validates it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration at `path`.
    ///
    /// A missing file yields the defaults. A file that exists but cannot be
    /// parsed or validated is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config = Self::from_toml_str(&text)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Checks value ranges that the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        if self.renderer.max_frames_in_flight == 0 {
            return Err(Error::Config(
                "max_frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.renderer.preferred_image_count == 0 {
            return Err(Error::Config(
                "preferred_image_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.renderer.max_frames_in_flight, 2);
        assert_eq!(config.renderer.clear_color, [0.1, 0.1, 0.1, 1.0]);
        assert_eq!(config.window.width, 1280);
    }

    #[test]
    fn test_partial_document_overrides_fields() {
        let text = r#"
            [renderer]
            max_frames_in_flight = 3
            clear_color = [0.0, 0.0, 0.0, 1.0]
        "#;
        let config = EngineConfig::from_toml_str(text).unwrap();
        assert_eq!(config.renderer.max_frames_in_flight, 3);
        assert_eq!(config.renderer.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.renderer.preferred_image_count, 2);
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn test_zero_frames_in_flight_rejected() {
        let text = "[renderer]\nmax_frames_in_flight = 0\n";
        let err = EngineConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_window_size_rejected() {
        let text = "[window]\nwidth = 0\n";
        assert!(EngineConfig::from_toml_str(text).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let text = "[renderer]\nframes = 2\n";
        assert!(matches!(
            EngineConfig::from_toml_str(text),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = EngineConfig::load(Path::new("does/not/exist/toy2d.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
