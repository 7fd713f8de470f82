//! Queue synchronization primitives.
//!
//! This module provides the two synchronization objects the frame loop
//! needs:
//! - [`Semaphore`] - binary semaphore for GPU-to-GPU ordering (swapchain
//!   acquire and present)
//! - [`TimelineFence`] - a monotonically increasing counter semaphore for
//!   CPU-to-GPU synchronization: the CPU requests values by signaling and
//!   blocks until the GPU has worked through everything submitted ahead of
//!   a value
//!
//! # The fence protocol
//!
//! The timeline fence exposes two views of one counter: the *requested*
//! value (the last value handed out by [`TimelineFence::signal`] or
//! [`TimelineFence::signal_on_submit`]) and the *completed* value (the last
//! value the GPU has reached). The invariant `completed <= requested` holds
//! at all times, and GPU work associated with value `v` is guaranteed
//! finished once `completed >= v`.
//!
//! [`TimelineFence::flush`] is the coarse hammer: signal a new value, then
//! block until it completes. It is required before resizing the swapchain,
//! before destroying resources the GPU may still read, and at shutdown.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use glint_rhi::device::Device;
//! use glint_rhi::sync::TimelineFence;
//!
//! # fn example(device: Arc<Device>) -> Result<(), glint_rhi::RhiError> {
//! let mut fence = TimelineFence::new(device)?;
//!
//! // ... submit GPU work carrying fence.signal_on_submit() as its
//! // timeline signal value ...
//!
//! // Block until every prior submission has retired
//! fence.flush()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Vulkan binary semaphore wrapper.
///
/// Used for GPU-to-GPU ordering between queue operations: waiting for
/// swapchain image acquisition before rendering, and waiting for rendering
/// before presentation.
pub struct Semaphore {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new binary semaphore in the unsignaled state.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created binary semaphore");

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed binary semaphore");
    }
}

/// CPU-side bookkeeping for a monotonic fence counter.
///
/// Tracks the highest requested value and the highest completed value ever
/// observed, enforcing the protocol invariants regardless of what the
/// driver reports: the completed view never decreases and never exceeds
/// the requested view.
#[derive(Clone, Copy, Debug, Default)]
pub struct FenceCursor {
    requested: u64,
    completed: u64,
}

impl FenceCursor {
    /// Creates a cursor with both views at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next fence value, advancing the requested view.
    pub fn advance_requested(&mut self) -> u64 {
        self.requested += 1;
        self.requested
    }

    /// Folds a raw counter reading into the completed view.
    ///
    /// The stored value is clamped to the requested view and never moves
    /// backwards, so a stale or corrupt reading cannot violate
    /// `completed <= requested` or monotonicity.
    pub fn observe_completed(&mut self, raw: u64) -> u64 {
        self.completed = self.completed.max(raw.min(self.requested));
        self.completed
    }

    /// The last value handed out for signaling.
    #[inline]
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// The highest completed value observed so far.
    #[inline]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Whether work associated with `value` is known to have retired.
    #[inline]
    pub fn is_complete(&self, value: u64) -> bool {
        self.completed >= value
    }
}

/// Monotonic queue fence backed by a Vulkan timeline semaphore.
///
/// One instance guards one queue's submission stream. The owning shell
/// attaches a fresh value to every submission it makes and flushes before
/// any operation that reuses or destroys GPU-visible memory.
///
/// # Failure modes
///
/// Waits have no timeout: a hung driver manifests as an indefinite wait.
/// If a wait or counter query fails, or a wait returns without the counter
/// reaching the target, the error is [`RhiError::DeviceLost`] - fatal, not
/// retried.
pub struct TimelineFence {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan timeline semaphore handle.
    semaphore: vk::Semaphore,
    /// Requested/completed bookkeeping.
    cursor: FenceCursor,
}

impl TimelineFence {
    /// Creates a new timeline fence with its counter at zero.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);

        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        info!("Created timeline fence");

        Ok(Self {
            device,
            semaphore,
            cursor: FenceCursor::new(),
        })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// The last value handed out for signaling.
    #[inline]
    pub fn requested_value(&self) -> u64 {
        self.cursor.requested()
    }

    /// Reserves the next fence value for a submission the caller is about
    /// to make.
    ///
    /// The caller must include this fence's semaphore in that submission's
    /// timeline signal list with the returned value, and must actually
    /// submit; otherwise later waits on the value will never return.
    pub fn signal_on_submit(&mut self) -> u64 {
        self.cursor.advance_requested()
    }

    /// Increments the counter and enqueues a GPU-side signal of the new
    /// value on the graphics queue.
    ///
    /// The signal retires once the queue works through it, so waiting on
    /// the returned value waits for everything submitted before this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal submission fails; device loss is
    /// classified as [`RhiError::DeviceLost`].
    pub fn signal(&mut self) -> RhiResult<u64> {
        let value = self.cursor.advance_requested();

        let signal_semaphores = [self.semaphore];
        let signal_values = [value];

        let mut timeline_info =
            vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&signal_values);

        let submit_info = vk::SubmitInfo::default()
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        unsafe {
            self.device
                .submit_graphics(&[submit_info], vk::Fence::null())?;
        }

        Ok(value)
    }

    /// Reads the GPU's completed counter value.
    ///
    /// The returned value is monotone across calls and never exceeds the
    /// last requested value.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter query fails; device loss is
    /// classified.
    pub fn completed_value(&mut self) -> RhiResult<u64> {
        let raw = unsafe {
            self.device
                .handle()
                .get_semaphore_counter_value(self.semaphore)
                .map_err(|e| RhiError::from_queue_result(e, "fence counter query"))?
        };

        Ok(self.cursor.observe_completed(raw))
    }

    /// Whether work associated with `value` has retired.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter query fails.
    pub fn is_complete(&mut self, value: u64) -> RhiResult<bool> {
        if self.cursor.is_complete(value) {
            return Ok(true);
        }
        Ok(self.completed_value()? >= value)
    }

    /// Blocks the calling thread until the counter reaches `value`.
    ///
    /// The wait is infinite: there is no timeout and no cancellation.
    /// Callers needing either must not use this primitive directly.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::DeviceLost`] if the wait fails or returns
    /// without the counter having reached the target.
    pub fn wait_until(&mut self, value: u64) -> RhiResult<()> {
        if self.cursor.is_complete(value) {
            return Ok(());
        }

        let semaphores = [self.semaphore];
        let values = [value];

        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        unsafe {
            self.device
                .handle()
                .wait_semaphores(&wait_info, u64::MAX)
                .map_err(|e| RhiError::from_queue_result(e, "fence wait"))?;
        }

        // A wait that returns with the counter short of the target means
        // the device stopped making progress
        if self.completed_value()? < value {
            return Err(RhiError::DeviceLost("fence wait returned early"));
        }

        Ok(())
    }

    /// Signals a new value and blocks until the GPU reaches it.
    ///
    /// After this returns, every command submitted to the queue before the
    /// call has retired. Required before swapchain resize, before
    /// destroying GPU resources possibly still in use, and at shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal or the wait fails.
    pub fn flush(&mut self) -> RhiResult<()> {
        let value = self.signal()?;
        self.wait_until(value)
    }
}

impl Drop for TimelineFence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed timeline fence");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_requested_increments() {
        let mut cursor = FenceCursor::new();
        assert_eq!(cursor.advance_requested(), 1);
        assert_eq!(cursor.advance_requested(), 2);
        assert_eq!(cursor.requested(), 2);
    }

    #[test]
    fn test_cursor_completed_is_monotone() {
        let mut cursor = FenceCursor::new();
        cursor.advance_requested();
        cursor.advance_requested();
        cursor.advance_requested();

        assert_eq!(cursor.observe_completed(1), 1);
        assert_eq!(cursor.observe_completed(3), 3);
        // A stale reading must not move the completed view backwards
        assert_eq!(cursor.observe_completed(2), 3);
        assert_eq!(cursor.completed(), 3);
    }

    #[test]
    fn test_cursor_completed_never_exceeds_requested() {
        let mut cursor = FenceCursor::new();
        cursor.advance_requested();
        cursor.advance_requested();

        // A corrupt reading above the requested view is clamped
        assert_eq!(cursor.observe_completed(100), 2);
        assert_eq!(cursor.completed(), 2);
    }

    #[test]
    fn test_cursor_is_complete() {
        let mut cursor = FenceCursor::new();
        let v1 = cursor.advance_requested();
        let v2 = cursor.advance_requested();

        assert!(!cursor.is_complete(v1));
        cursor.observe_completed(v1);
        assert!(cursor.is_complete(v1));
        assert!(!cursor.is_complete(v2));

        cursor.observe_completed(v2);
        assert!(cursor.is_complete(v2));
    }

    #[test]
    fn test_cursor_random_observation_order() {
        // For any observation sequence, the completed view is
        // non-decreasing and bounded by the requested view
        let mut cursor = FenceCursor::new();
        for _ in 0..10 {
            cursor.advance_requested();
        }

        let readings = [3u64, 1, 7, 7, 2, 9, 25, 4];
        let mut last = 0;
        for &raw in &readings {
            let observed = cursor.observe_completed(raw);
            assert!(observed >= last);
            assert!(observed <= cursor.requested());
            last = observed;
        }
        assert_eq!(cursor.completed(), 10);
    }

    #[test]
    fn test_semaphore_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
    }

    #[test]
    fn test_timeline_fence_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<TimelineFence>();
    }
}
