//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::SetupError;

/// Transfer chunk limit for the one-time particle seed upload, in bytes.
///
/// Matches the inline-update limit of `vkCmdUpdateBuffer`.
pub const SEED_CHUNK_BYTES: u64 = 65536;

/// Configuration for a [`crate::engine::Engine`].
///
/// Values are plain data; validation happens once in [`EngineConfig::validate`]
/// before any device resource is created.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of simulated particles.
    pub particle_count: u32,
    /// Compute workgroup width. Dispatches round up, the shader guards the tail.
    pub workgroup_size: u32,
    /// Initial window width in pixels.
    pub window_width: u32,
    /// Initial window height in pixels.
    pub window_height: u32,
    /// Window title.
    pub title: String,
    /// Directory containing the compiled SPIR-V shader binaries.
    pub shader_dir: PathBuf,
    /// Host wait bound for GPU completion signals.
    ///
    /// `None` waits forever, which is the production default; tests bound it
    /// so a stuck device surfaces as an error instead of a hang.
    pub gpu_timeout: Option<Duration>,
    /// Render pass clear color (RGBA).
    pub clear_color: [f32; 4],
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            particle_count: 100_000,
            workgroup_size: 256,
            window_width: 800,
            window_height: 600,
            title: "plume".to_string(),
            shader_dir: PathBuf::from("shaders"),
            gpu_timeout: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl EngineConfig {
    /// Check the configuration before any device work starts.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.particle_count == 0 {
            return Err(SetupError::Config("particle_count must be non-zero".into()));
        }
        if self.workgroup_size == 0 {
            return Err(SetupError::Config("workgroup_size must be non-zero".into()));
        }
        if self.window_width == 0 || self.window_height == 0 {
            return Err(SetupError::Config("window dimensions must be non-zero".into()));
        }
        Ok(())
    }

    /// The fence wait bound in nanoseconds, as Vulkan expects it.
    #[inline]
    pub fn timeout_ns(&self) -> u64 {
        match self.gpu_timeout {
            Some(d) => d.as_nanos().min(u64::MAX as u128) as u64,
            None => u64::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout_ns(), u64::MAX);
    }

    #[test]
    fn test_zero_particles_rejected() {
        let config = EngineConfig {
            particle_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workgroup_rejected() {
        let config = EngineConfig {
            workgroup_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bounded_timeout_converts_to_nanos() {
        let config = EngineConfig {
            gpu_timeout: Some(Duration::from_millis(250)),
            ..Default::default()
        };
        assert_eq!(config.timeout_ns(), 250_000_000);
    }
}
