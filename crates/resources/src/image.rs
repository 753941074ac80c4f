//! Image decoding to RGBA8.

use std::path::Path;

use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// Decoded image with 4 bytes per pixel, rows tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RgbaImage {
    /// Wraps raw RGBA8 pixels.
    ///
    /// # Errors
    /// Returns [`ResourceError::PixelSizeMismatch`] if `pixels` is not exactly
    /// `width * height * 4` bytes.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> ResourceResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(ResourceError::PixelSizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A single pixel of the given color.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
        }
    }

    /// Loads and decodes an image file, converting any channel layout to RGBA8.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let decoded = ::image::open(path).map_err(|source| ResourceError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = decoded.into_rgba8();
        let (width, height) = rgba.dimensions();

        debug!("Decoded {} ({}x{})", path.display(), width, height);

        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel bytes, `width * height * 4` long.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Byte size of the pixel data.
    pub fn byte_size(&self) -> u64 {
        self.pixels.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_checks_size() {
        assert!(RgbaImage::from_raw(2, 2, vec![0; 16]).is_ok());

        let err = RgbaImage::from_raw(2, 2, vec![0; 12]).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::PixelSizeMismatch {
                expected: 16,
                actual: 12,
                ..
            }
        ));
    }

    #[test]
    fn test_solid_is_one_pixel() {
        let image = RgbaImage::solid([255, 255, 255, 255]);
        assert_eq!((image.width(), image.height()), (1, 1));
        assert_eq!(image.pixels(), &[255, 255, 255, 255]);
        assert_eq!(image.byte_size(), 4);
    }

    #[test]
    fn test_missing_file() {
        let err = RgbaImage::load(Path::new("no/such/image.png")).unwrap_err();
        assert!(matches!(err, ResourceError::FileNotFound(_)));
    }
}
