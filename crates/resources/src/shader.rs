//! SPIR-V binary loading.

use std::path::Path;

use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// Reads a precompiled SPIR-V file as raw bytes.
///
/// The byte length must be a whole number of 32-bit words; endianness and
/// the magic number are left to the driver to validate.
pub fn read_spirv_file(path: &Path) -> ResourceResult<Vec<u8>> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ResourceError::FileNotFound(path.to_path_buf())
        } else {
            ResourceError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    if bytes.len() % 4 != 0 {
        return Err(ResourceError::MisalignedSpirv {
            path: path.to_path_buf(),
            len: bytes.len(),
        });
    }

    debug!("Read {} bytes of SPIR-V from {}", bytes.len(), path.display());
    Ok(bytes)
}
