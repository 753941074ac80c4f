//! Shader modules for the two pipeline stages.
//!
//! Reading SPIR-V from disk lives in `toy2d-resources`; this module only
//! turns the bytes into a module. Every module is entered at `main`.

use std::ffi::CStr;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Entry point of every shader module.
pub const ENTRY_POINT: &CStr = c"main";

const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// A shader module tagged with its stage.
///
/// Only needed until the pipeline is built.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
}

impl Shader {
    /// Creates a module from raw SPIR-V bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::ShaderError`] if the bytes are not word-aligned,
    /// do not start with the SPIR-V magic number, or the driver rejects them.
    pub fn new(device: Arc<Device>, stage: ShaderStage, spirv: &[u8]) -> RhiResult<Self> {
        let code = spirv_words(spirv)
            .map_err(|e| RhiError::ShaderError(format!("{} shader: {}", stage, e)))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { device.handle().create_shader_module(&create_info, None) }
            .map_err(|e| {
                RhiError::ShaderError(format!("{} shader module creation failed: {}", stage, e))
            })?;

        info!("{} shader module created ({} words)", stage, code.len());
        Ok(Self {
            device,
            module,
            stage,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Pipeline stage description borrowing this module.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(ENTRY_POINT)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
        debug!("{} shader module destroyed", self.stage);
    }
}

/// Decodes SPIR-V bytes into words and checks the header magic.
fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>, String> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| e.to_string())?;
    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(&other) => Err(format!("bad SPIR-V magic {:#010x}", other)),
        None => Err("empty SPIR-V module".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_stage_flags_and_names() {
        assert_eq!(
            ShaderStage::Vertex.to_vk_stage(),
            vk::ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(ShaderStage::Vertex.to_string(), "vertex");
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }

    #[test]
    fn test_spirv_words_little_endian() {
        let bytes = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00];
        let words = spirv_words(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000]);
    }

    #[test]
    fn test_spirv_words_rejects_bad_input() {
        assert!(spirv_words(&[0u8; 5]).is_err());
        assert!(spirv_words(&[]).is_err());

        let err = spirv_words(&[0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert!(err.contains("magic"));
    }

    #[test]
    fn test_entry_point_is_main() {
        assert_eq!(ENTRY_POINT.to_bytes(), b"main");
    }
}
