//! Error types for plume.
//!
//! Failures are split by phase: [`SetupError`] for anything that goes wrong
//! before the frame loop starts (device bootstrap, pipeline creation, buffer
//! allocation), [`FrameError`] for per-frame failures inside the loop. Both
//! fold into [`EngineError`], which is what the public entry points return.

use std::fmt;
use std::path::PathBuf;

use ash::vk;

/// Errors raised while bringing up the Vulkan device and frame resources.
///
/// All of these are fatal: startup is aborted and nothing is retried.
#[derive(Debug)]
pub enum SetupError {
    /// The Vulkan loader could not be found or initialized.
    Loader(ash::LoadingError),
    /// A Vulkan call failed during setup.
    Api {
        /// The call that failed, e.g. `"vkCreateInstance"`.
        call: &'static str,
        result: vk::Result,
    },
    /// No physical device exposes the required queue families.
    NoSuitableDevice,
    /// The selected device is missing a required queue capability.
    MissingQueue(&'static str),
    /// A shader binary could not be read from disk.
    ShaderRead { path: PathBuf, source: std::io::Error },
    /// A buffer size does not satisfy the device alignment contract.
    UnalignedBuffer { size: u64, alignment: u64 },
    /// The engine configuration is invalid.
    Config(String),
    /// Failed to obtain raw window/display handles for surface creation.
    Surface(raw_window_handle::HandleError),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::Loader(e) => write!(f, "Failed to load the Vulkan library: {}", e),
            SetupError::Api { call, result } => write!(f, "{} failed: {}", call, result),
            SetupError::NoSuitableDevice => write!(
                f,
                "No physical device with graphics+present and compute queue support was found"
            ),
            SetupError::MissingQueue(which) => {
                write!(f, "Device does not expose a {} queue", which)
            }
            SetupError::ShaderRead { path, source } => {
                write!(f, "Failed to read shader binary {}: {}", path.display(), source)
            }
            SetupError::UnalignedBuffer { size, alignment } => write!(
                f,
                "Buffer size {} is not a multiple of the required alignment {}",
                size, alignment
            ),
            SetupError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            SetupError::Surface(e) => write!(f, "Failed to obtain a window handle: {}", e),
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SetupError::Loader(e) => Some(e),
            SetupError::Api { result, .. } => Some(result),
            SetupError::ShaderRead { source, .. } => Some(source),
            SetupError::Surface(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ash::LoadingError> for SetupError {
    fn from(e: ash::LoadingError) -> Self {
        SetupError::Loader(e)
    }
}

impl From<raw_window_handle::HandleError> for SetupError {
    fn from(e: raw_window_handle::HandleError) -> Self {
        SetupError::Surface(e)
    }
}

impl SetupError {
    /// Shorthand used throughout the gpu modules to tag a failing call.
    pub(crate) fn api(call: &'static str) -> impl FnOnce(vk::Result) -> SetupError {
        move |result| SetupError::Api { call, result }
    }
}

/// Errors raised inside the frame loop.
///
/// The loop does not attempt partial recovery; the caller is expected to
/// drain in-flight work and exit.
#[derive(Debug)]
pub enum FrameError {
    /// Waiting on a frame slot's completion fence failed or timed out.
    SlotWait { slot: usize, result: vk::Result },
    /// Acquiring the next presentation image failed (includes out-of-date
    /// surfaces; swapchain recreation is out of scope).
    Acquire(vk::Result),
    /// A queue submission was rejected.
    Submit {
        /// Which queue the submission targeted, `"compute"` or `"graphics"`.
        queue: &'static str,
        result: vk::Result,
    },
    /// Presenting the rendered image failed.
    Present(vk::Result),
    /// Re-recording a command list failed.
    Record(vk::Result),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::SlotWait { slot, result } if *result == vk::Result::TIMEOUT => {
                write!(f, "Timed out waiting for frame slot {} to complete", slot)
            }
            FrameError::SlotWait { slot, result } => {
                write!(f, "Waiting on frame slot {} failed: {}", slot, result)
            }
            FrameError::Acquire(r) => write!(f, "Failed to acquire a presentation image: {}", r),
            FrameError::Submit { queue, result } => {
                write!(f, "Submission to the {} queue failed: {}", queue, result)
            }
            FrameError::Present(r) => write!(f, "Presentation failed: {}", r),
            FrameError::Record(r) => write!(f, "Command recording failed: {}", r),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameError::SlotWait { result, .. } => Some(result),
            FrameError::Acquire(r) => Some(r),
            FrameError::Submit { result, .. } => Some(result),
            FrameError::Present(r) => Some(r),
            FrameError::Record(r) => Some(r),
        }
    }
}

/// Top-level error for running a simulation.
#[derive(Debug)]
pub enum EngineError {
    /// Failed to create the event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create the window.
    Window(winit::error::OsError),
    /// Startup failed before the frame loop began.
    Setup(SetupError),
    /// A frame failed mid-loop.
    Frame(FrameError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            EngineError::Window(e) => write!(f, "Failed to create window: {}", e),
            EngineError::Setup(e) => write!(f, "Setup error: {}", e),
            EngineError::Frame(e) => write!(f, "Frame error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::EventLoop(e) => Some(e),
            EngineError::Window(e) => Some(e),
            EngineError::Setup(e) => Some(e),
            EngineError::Frame(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for EngineError {
    fn from(e: winit::error::EventLoopError) -> Self {
        EngineError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for EngineError {
    fn from(e: winit::error::OsError) -> Self {
        EngineError::Window(e)
    }
}

impl From<SetupError> for EngineError {
    fn from(e: SetupError) -> Self {
        EngineError::Setup(e)
    }
}

impl From<FrameError> for EngineError {
    fn from(e: FrameError) -> Self {
        EngineError::Frame(e)
    }
}
