//! The Vulkan backend.
//!
//! Module map:
//!
//! * [`context`]: instance, device and queue bootstrap
//! * [`swapchain`]: presentation images, acquire/present
//! * [`buffers`]: device memory and the particle buffer ring
//! * [`sync`]: fences, semaphores and the frame slot set
//! * [`shaders`]: SPIR-V blob loading
//! * [`pipeline`]: compute and graphics pipeline construction
//! * [`descriptors`]: the fixed per-slot binding pairs
//! * [`commands`]: command pools and per-slot command lists
//! * [`passes`]: pass planning (pure) and command recording

pub mod buffers;
pub mod commands;
pub mod context;
pub mod descriptors;
pub mod passes;
pub mod pipeline;
pub mod shaders;
pub mod swapchain;
pub mod sync;
