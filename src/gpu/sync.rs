//! Synchronization primitives and the frame slot set.
//!
//! Two kinds of signal keep the pipeline ordered:
//!
//! * a host-visible completion signal per slot (a fence) that bounds how far
//!   the CPU may run ahead of the GPU to at most N frames;
//! * two device-only ordering signals per slot (binary semaphores) that
//!   sequence surface acquisition, rendering and presentation without any
//!   host involvement.

use ash::{vk, Device};

use crate::error::{FrameError, SetupError};

/// Host-visible completion signal with RAII cleanup.
pub struct Fence {
    device: Device,
    raw: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled.
    pub fn new(device: &Device, signaled: bool) -> Result<Self, SetupError> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::default().flags(flags);
        let raw = unsafe { device.create_fence(&info, None) }
            .map_err(SetupError::api("vkCreateFence"))?;
        Ok(Self {
            device: device.clone(),
            raw,
        })
    }

    /// Block until signaled, up to `timeout_ns`. A timeout surfaces as
    /// `Err(vk::Result::TIMEOUT)`.
    pub fn wait(&self, timeout_ns: u64) -> Result<(), vk::Result> {
        unsafe { self.device.wait_for_fences(&[self.raw], true, timeout_ns) }
    }

    /// Return to the unsignaled state. Only legal once no submission still
    /// references the fence.
    pub fn reset(&self) -> Result<(), vk::Result> {
        unsafe { self.device.reset_fences(&[self.raw]) }
    }

    #[inline]
    pub fn raw(&self) -> vk::Fence {
        self.raw
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.raw, None);
        }
    }
}

/// Device-only ordering signal with RAII cleanup.
pub struct Semaphore {
    device: Device,
    raw: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: &Device) -> Result<Self, SetupError> {
        let info = vk::SemaphoreCreateInfo::default();
        let raw = unsafe { device.create_semaphore(&info, None) }
            .map_err(SetupError::api("vkCreateSemaphore"))?;
        Ok(Self {
            device: device.clone(),
            raw,
        })
    }

    #[inline]
    pub fn raw(&self) -> vk::Semaphore {
        self.raw
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.raw, None);
        }
    }
}

/// The signals owned by one rotation slot.
struct FrameSlot {
    completion: Fence,
    surface_acquired: Semaphore,
    render_finished: Semaphore,
}

/// All N frame slots, created together before the loop starts and destroyed
/// together after the shutdown drain.
pub struct FrameSlots {
    slots: Vec<FrameSlot>,
    /// Whether the slot's fence will (or did) signal. Cleared by
    /// [`FrameSlots::wait_and_reset`], set again once a submission carrying
    /// the fence is enqueued. A frame aborted between the two leaves the
    /// fence permanently unsignaled; the drain skips such slots instead of
    /// waiting on a signal that can never come.
    armed: Vec<bool>,
    timeout_ns: u64,
}

impl FrameSlots {
    /// Create `depth` slots. Completion fences start signaled so the first
    /// rotation through each slot does not block; ordering semaphores start
    /// unsignaled.
    pub fn create(device: &Device, depth: u32, timeout_ns: u64) -> Result<Self, SetupError> {
        let slots = (0..depth)
            .map(|_| {
                Ok(FrameSlot {
                    completion: Fence::new(device, true)?,
                    surface_acquired: Semaphore::new(device)?,
                    render_finished: Semaphore::new(device)?,
                })
            })
            .collect::<Result<Vec<_>, SetupError>>()?;
        let armed = vec![true; depth as usize];
        Ok(Self {
            slots,
            armed,
            timeout_ns,
        })
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Block until the slot's previous GPU work has finished, then rearm the
    /// fence. This is the only place the frame loop waits on the GPU.
    pub fn wait_and_reset(&mut self, slot: usize) -> Result<(), FrameError> {
        let fence = &self.slots[slot].completion;
        fence
            .wait(self.timeout_ns)
            .map_err(|result| FrameError::SlotWait { slot, result })?;
        fence
            .reset()
            .map_err(|result| FrameError::SlotWait { slot, result })?;
        self.armed[slot] = false;
        Ok(())
    }

    /// Record that a submission signaling this slot's fence is now in flight.
    pub fn mark_submitted(&mut self, slot: usize) {
        self.armed[slot] = true;
    }

    /// Wait for every in-flight slot's completion signal; used by the
    /// shutdown drain so no resource is destroyed while still referenced by
    /// in-flight work.
    pub fn wait_all(&self) -> Result<(), FrameError> {
        for (slot, frame) in self.slots.iter().enumerate() {
            if !self.armed[slot] {
                continue;
            }
            frame
                .completion
                .wait(self.timeout_ns)
                .map_err(|result| FrameError::SlotWait { slot, result })?;
        }
        Ok(())
    }

    #[inline]
    pub fn completion_fence(&self, slot: usize) -> vk::Fence {
        self.slots[slot].completion.raw()
    }

    #[inline]
    pub fn surface_acquired(&self, slot: usize) -> vk::Semaphore {
        self.slots[slot].surface_acquired.raw()
    }

    #[inline]
    pub fn render_finished(&self, slot: usize) -> vk::Semaphore {
        self.slots[slot].render_finished.raw()
    }
}
