//! Loading precompiled SPIR-V shader binaries.
//!
//! Shader compilation is out of scope; binaries are produced offline (see
//! `shaders/`) and loaded here as opaque word streams.

use std::fs::File;
use std::path::Path;

use ash::util::read_spv;
use ash::{vk, Device};

use crate::error::SetupError;

/// Read a SPIR-V binary from disk, validating size and alignment.
pub fn load_spirv(path: &Path) -> Result<Vec<u32>, SetupError> {
    let mut file = File::open(path).map_err(|source| SetupError::ShaderRead {
        path: path.to_owned(),
        source,
    })?;
    read_spv(&mut file).map_err(|source| SetupError::ShaderRead {
        path: path.to_owned(),
        source,
    })
}

/// A shader module with RAII cleanup.
///
/// Modules are only needed until pipeline creation finishes; the engine drops
/// them as soon as the pipelines are built.
pub struct ShaderModule {
    device: Device,
    raw: vk::ShaderModule,
}

impl ShaderModule {
    pub fn from_file(device: &Device, path: &Path) -> Result<Self, SetupError> {
        let words = load_spirv(path)?;
        let info = vk::ShaderModuleCreateInfo::default().code(&words);
        let raw = unsafe { device.create_shader_module(&info, None) }
            .map_err(SetupError::api("vkCreateShaderModule"))?;
        Ok(Self {
            device: device.clone(),
            raw,
        })
    }

    #[inline]
    pub fn raw(&self) -> vk::ShaderModule {
        self.raw
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.raw, None);
        }
    }
}
