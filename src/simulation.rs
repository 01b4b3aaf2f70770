//! Simulation builder and runner.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::window;

/// A particle simulation builder.
///
/// Use method chaining to configure, then call `.run()` to open the window
/// and drive the frame loop until it is closed.
///
/// ```ignore
/// use plume::Simulation;
///
/// Simulation::new()
///     .with_particle_count(500_000)
///     .with_window_size(1280, 720)
///     .run()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    config: EngineConfig,
}

impl Simulation {
    /// Create a simulation with default settings.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Set the number of simulated particles.
    pub fn with_particle_count(mut self, count: u32) -> Self {
        self.config.particle_count = count;
        self
    }

    /// Set the compute workgroup width.
    pub fn with_workgroup_size(mut self, size: u32) -> Self {
        self.config.workgroup_size = size;
        self
    }

    /// Set the window size in pixels.
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.config.window_width = width;
        self.config.window_height = height;
        self
    }

    /// Set the window title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    /// Set the directory the compiled shader binaries are loaded from.
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.shader_dir = dir.into();
        self
    }

    /// Bound every host wait on the GPU instead of waiting forever.
    pub fn with_gpu_timeout(mut self, timeout: Duration) -> Self {
        self.config.gpu_timeout = Some(timeout);
        self
    }

    /// Set the background clear color.
    pub fn with_clear_color(mut self, rgba: [f32; 4]) -> Self {
        self.config.clear_color = rgba;
        self
    }

    /// The resolved configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open the window and run the frame loop until a close is requested.
    ///
    /// Returns after all in-flight GPU work has drained and every device
    /// resource has been released.
    pub fn run(self) -> Result<(), EngineError> {
        window::run(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chains() {
        let sim = Simulation::new()
            .with_particle_count(42)
            .with_workgroup_size(64)
            .with_window_size(320, 240)
            .with_title("test")
            .with_gpu_timeout(Duration::from_secs(2));
        let config = sim.config();
        assert_eq!(config.particle_count, 42);
        assert_eq!(config.workgroup_size, 64);
        assert_eq!(config.window_width, 320);
        assert_eq!(config.window_height, 240);
        assert_eq!(config.title, "test");
        assert_eq!(config.gpu_timeout, Some(Duration::from_secs(2)));
    }
}
