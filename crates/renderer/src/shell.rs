//! The application shell: device ownership and the frame lifecycle.
//!
//! The [`Shell`] owns the GPU stack - instance, surface, device, queue
//! fence, command allocator and context, swapchain, depth buffer - and
//! drives the per-frame protocol:
//!
//! 1. Reset the command allocator (safe: the previous frame ended with a
//!    full queue flush)
//! 2. Acquire the next back buffer
//! 3. Record: transition to color-attachment, clear, let the application
//!    record its draws, transition back to present
//! 4. Submit, attaching the next queue-fence value as a timeline signal
//! 5. Present and advance the back-buffer ring
//! 6. Flush: block until the fence reaches the submitted value
//!
//! Step 6 fully serializes CPU and GPU. That is correct and simple, not
//! throughput-optimal; rotating [`FrameResources`](crate::FrameResources)
//! sets is the intended upgrade.
//!
//! Applications implement [`ShellApp`] and are handed to the shell by the
//! entry point - the shell is plain data constructed once and passed by
//! reference, never a global.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ash::vk;
use tracing::{error, info};

use glint_platform::{MouseButton, Surface, Window, required_surface_extensions};
use glint_rhi::command::{CommandBuffer, CommandPool};
use glint_rhi::device::Device;
use glint_rhi::instance::Instance;
use glint_rhi::physical_device::select_physical_device;
use glint_rhi::swapchain::Swapchain;
use glint_rhi::sync::{Semaphore, TimelineFence};
use glint_rhi::{RhiError, RhiResult};

use crate::depth_buffer::{DEFAULT_DEPTH_FORMAT, DepthBuffer};

/// Per-frame recording context handed to [`ShellApp::draw`].
///
/// Rendering has already been begun on the command buffer with the
/// current back buffer and depth buffer attached and cleared; the
/// application records pipeline binds and draws.
pub struct FrameContext<'a> {
    cmd: &'a CommandBuffer,
    extent: vk::Extent2D,
    back_buffer_index: u32,
}

impl FrameContext<'_> {
    /// The command buffer being recorded.
    #[inline]
    pub fn cmd(&self) -> &CommandBuffer {
        self.cmd
    }

    /// Render target dimensions.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Ring index of the back buffer being rendered into.
    #[inline]
    pub fn back_buffer_index(&self) -> u32 {
        self.back_buffer_index
    }
}

/// Lifecycle hooks a concrete application implements.
///
/// The windowing layer delivers resize and mouse events into these hooks;
/// the shell invokes `draw` once per frame between its barrier and
/// rendering bookkeeping. Implementations hold their own GPU resources
/// (pipelines, meshes, constant buffers) built during `setup`.
pub trait ShellApp {
    /// Build GPU resources. The shell's upload helpers
    /// ([`Shell::begin_upload`] / [`Shell::finish_upload`]) give access
    /// to a recording context whose commands are flushed before this
    /// returns to the caller.
    fn setup(&mut self, shell: &mut Shell) -> RhiResult<()>;

    /// Per-frame simulation step. Mutate constant-buffer contents here;
    /// the previous frame's flush guarantees the GPU is no longer
    /// reading them.
    fn update(&mut self, delta_time: f32, total_time: f32);

    /// Record this frame's draws.
    fn draw(&mut self, frame: &FrameContext<'_>) -> RhiResult<()>;

    /// The window's client area changed size.
    fn on_resize(&mut self, _width: u32, _height: u32) {}

    /// A mouse button went down at the given position.
    fn on_mouse_down(&mut self, _button: MouseButton, _x: f32, _y: f32) {}

    /// A mouse button was released at the given position.
    fn on_mouse_up(&mut self, _button: MouseButton, _x: f32, _y: f32) {}

    /// The cursor moved by the given delta while at the given position.
    fn on_mouse_move(&mut self, _x: f32, _y: f32, _dx: f32, _dy: f32) {}
}

/// Frame statistics accumulator: frames-per-second and milliseconds per
/// frame, averaged over one-second windows.
pub struct FrameStats {
    frames: u32,
    window_start: Instant,
}

impl FrameStats {
    /// Starts a fresh accumulation window.
    pub fn new() -> Self {
        Self {
            frames: 0,
            window_start: Instant::now(),
        }
    }

    /// Counts a rendered frame. Returns `Some((fps, ms_per_frame))` once
    /// per elapsed second, `None` otherwise.
    pub fn frame_rendered(&mut self) -> Option<(f32, f32)> {
        self.frames += 1;

        let elapsed = self.window_start.elapsed();
        if elapsed < Duration::from_secs(1) {
            return None;
        }

        let fps = self.frames as f32 / elapsed.as_secs_f32();
        let ms_per_frame = elapsed.as_secs_f32() * 1000.0 / self.frames as f32;

        self.frames = 0;
        self.window_start = Instant::now();

        Some((fps, ms_per_frame))
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner of the GPU stack and the frame lifecycle.
///
/// Field order is destruction order: everything device-derived drops
/// before the device's own `Arc` here, the surface drops before the
/// instance, and [`Shell::drop`] flushes the queue first so nothing is
/// destroyed while in flight.
pub struct Shell {
    depth_buffer: DepthBuffer,
    swapchain: Swapchain,
    /// One render-finished semaphore per back buffer; present for image
    /// `i` waits on entry `i`.
    render_finished: Vec<Semaphore>,
    /// Signaled by acquire, waited by the frame's submission. A single
    /// one suffices: the flush at frame end retires the submission that
    /// consumed it.
    acquire_semaphore: Semaphore,
    command_buffer: CommandBuffer,
    command_pool: CommandPool,
    fence: TimelineFence,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,
    /// Back buffers that have been presented at least once and are
    /// therefore in PRESENT_SRC layout rather than UNDEFINED.
    back_buffer_initialized: Vec<bool>,
    /// The depth image starts UNDEFINED after every (re)creation.
    depth_initialized: bool,
    stats: FrameStats,
    clear_color: [f32; 4],
}

impl Shell {
    /// Initializes the GPU stack against a window.
    ///
    /// Initialization order: instance, surface, physical device, logical
    /// device and queues, queue fence, command allocator and context,
    /// swapchain, depth buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails; nothing is retried.
    pub fn new(window: &Window) -> RhiResult<Self> {
        let display_handle = window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(format!("No display handle: {}", e)))?;
        let surface_extensions = required_surface_extensions(display_handle.as_raw())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let instance = Instance::new(cfg!(debug_assertions), &surface_extensions)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;

        let device = Device::new(&instance, &physical_device_info)?;

        let fence = TimelineFence::new(device.clone())?;

        let graphics_family = device.queue_families().graphics_family.unwrap();
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        let command_buffer = CommandBuffer::new(device.clone(), &command_pool)?;

        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            window.width(),
            window.height(),
        )?;

        let extent = swapchain.extent();
        let depth_buffer = DepthBuffer::new(
            device.clone(),
            extent.width,
            extent.height,
            DEFAULT_DEPTH_FORMAT,
        )?;

        let acquire_semaphore = Semaphore::new(device.clone())?;
        let render_finished = (0..swapchain.image_count())
            .map(|_| Semaphore::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;
        let back_buffer_initialized = vec![false; swapchain.image_count() as usize];

        info!(
            "Shell initialized: {}x{}, {} back buffers",
            extent.width,
            extent.height,
            swapchain.image_count()
        );

        Ok(Self {
            depth_buffer,
            swapchain,
            render_finished,
            acquire_semaphore,
            command_buffer,
            command_pool,
            fence,
            device,
            surface,
            instance,
            back_buffer_initialized,
            depth_initialized: false,
            stats: FrameStats::new(),
            clear_color: [0.68, 0.85, 0.90, 1.0],
        })
    }

    /// The logical device.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// The back-buffer format, needed for pipeline creation.
    #[inline]
    pub fn back_buffer_format(&self) -> vk::Format {
        self.swapchain.format()
    }

    /// The depth format, needed for pipeline creation.
    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_buffer.format()
    }

    /// Current render target dimensions.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Width over height of the render target.
    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.swapchain.extent();
        extent.width as f32 / extent.height as f32
    }

    /// Sets the color the back buffer is cleared to each frame.
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    /// Blocks until every command submitted so far has retired.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal or wait fails.
    pub fn flush_queue(&mut self) -> RhiResult<()> {
        self.fence.flush()
    }

    // =========================================================================
    // Setup uploads
    // =========================================================================

    /// Begins recording one-shot upload commands (mesh uploads during
    /// [`ShellApp::setup`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator reset or recording begin fails.
    pub fn begin_upload(&mut self) -> RhiResult<&CommandBuffer> {
        self.command_pool.reset()?;
        self.command_buffer.begin()?;
        Ok(&self.command_buffer)
    }

    /// Submits the recorded upload commands and blocks until they
    /// complete. After this returns, staging buffers may be disposed.
    ///
    /// # Errors
    ///
    /// Returns an error if submission or the flush fails.
    pub fn finish_upload(&mut self) -> RhiResult<()> {
        self.command_buffer.end()?;

        let value = self.submit_recorded(None, None)?;
        self.fence.wait_until(value)
    }

    // =========================================================================
    // Resize
    // =========================================================================

    /// Recreates the swapchain and depth buffer for a new client size.
    ///
    /// Flushes the queue first so nothing in flight references the old
    /// buffers. A zero dimension (minimized window) is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or recreation fails.
    pub fn resize(&mut self, width: u32, height: u32) -> RhiResult<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        self.fence.flush()?;

        self.swapchain
            .recreate(&self.instance, self.surface.handle(), width, height)?;

        let extent = self.swapchain.extent();
        self.depth_buffer = DepthBuffer::new(
            self.device.clone(),
            extent.width,
            extent.height,
            DEFAULT_DEPTH_FORMAT,
        )?;
        self.depth_initialized = false;

        // The image set may have changed; per-image state starts over
        self.render_finished = (0..self.swapchain.image_count())
            .map(|_| Semaphore::new(self.device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;
        self.back_buffer_initialized = vec![false; self.swapchain.image_count() as usize];

        Ok(())
    }

    // =========================================================================
    // Frame loop
    // =========================================================================

    /// Runs one frame: record, submit, present, flush.
    ///
    /// Returns `true` if the swapchain reported itself out of date or
    /// suboptimal and the caller should invoke [`Shell::resize`] with the
    /// current window size.
    ///
    /// # Errors
    ///
    /// Returns an error on any submission or synchronization failure;
    /// device loss surfaces as [`RhiError::DeviceLost`].
    pub fn draw_frame(&mut self, app: &mut dyn ShellApp) -> RhiResult<bool> {
        // The flush at the end of the previous frame makes this reset safe
        self.command_pool.reset()?;

        let (image_index, mut needs_resize) = match self
            .swapchain
            .acquire_next_image(self.acquire_semaphore.handle())
        {
            Ok(result) => result,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                return Ok(true);
            }
            Err(e) => return Err(RhiError::from_queue_result(e, "acquire")),
        };

        self.command_buffer.begin()?;
        self.record_frame(app, image_index)?;
        self.command_buffer.end()?;

        let render_finished = self.render_finished[image_index as usize].handle();
        let value = self.submit_recorded(
            Some((
                self.acquire_semaphore.handle(),
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            )),
            Some(render_finished),
        )?;
        self.back_buffer_initialized[image_index as usize] = true;

        needs_resize |= self.swapchain.present(
            self.device.present_queue(),
            image_index,
            render_finished,
        )?;

        // Serialize with the GPU before the allocator and constant
        // buffers are touched again
        self.fence.wait_until(value)?;

        if let Some((fps, ms_per_frame)) = self.stats.frame_rendered() {
            info!("{:.0} fps ({:.2} ms/frame)", fps, ms_per_frame);
        }

        Ok(needs_resize)
    }

    /// Records the frame's barriers, rendering scope, and application
    /// draws into the command buffer.
    fn record_frame(&mut self, app: &mut dyn ShellApp, image_index: u32) -> RhiResult<()> {
        let extent = self.swapchain.extent();
        let image = self.swapchain.image(image_index as usize);

        // Present target -> render target
        let old_layout = if self.back_buffer_initialized[image_index as usize] {
            vk::ImageLayout::PRESENT_SRC_KHR
        } else {
            vk::ImageLayout::UNDEFINED
        };

        let color_barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .old_layout(old_layout)
            .new_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(color_subresource_range());

        self.command_buffer.pipeline_barrier(
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            std::slice::from_ref(&color_barrier),
        );

        // Fresh depth image -> depth-write
        if !self.depth_initialized {
            let depth_barrier = vk::ImageMemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(
                    vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                )
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(self.depth_buffer.image())
                .subresource_range(depth_subresource_range());

            self.command_buffer.pipeline_barrier(
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                std::slice::from_ref(&depth_barrier),
            );

            self.depth_initialized = true;
        }

        // Back and depth buffers are cleared before every redraw
        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.swapchain.image_view(image_index as usize))
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            });

        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.depth_buffer.image_view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });

        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment))
            .depth_attachment(&depth_attachment);

        self.command_buffer.begin_rendering(&rendering_info);

        // Flipped viewport: positive Y up, matching the projection math
        let viewport = vk::Viewport {
            x: 0.0,
            y: extent.height as f32,
            width: extent.width as f32,
            height: -(extent.height as f32),
            min_depth: 0.0,
            max_depth: 1.0,
        };
        self.command_buffer.set_viewport(&viewport);

        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        self.command_buffer.set_scissor(&scissor);

        {
            let frame = FrameContext {
                cmd: &self.command_buffer,
                extent,
                back_buffer_index: image_index,
            };
            app.draw(&frame)?;
        }

        self.command_buffer.end_rendering();

        // Render target -> present target
        let present_barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dst_access_mask(vk::AccessFlags::empty())
            .old_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(color_subresource_range());

        self.command_buffer.pipeline_barrier(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            std::slice::from_ref(&present_barrier),
        );

        Ok(())
    }

    /// Submits the recorded command buffer, attaching the next fence
    /// value as a timeline signal. Returns that value.
    fn submit_recorded(
        &mut self,
        wait: Option<(vk::Semaphore, vk::PipelineStageFlags)>,
        signal_binary: Option<vk::Semaphore>,
    ) -> RhiResult<u64> {
        let value = self.fence.signal_on_submit();

        let mut wait_semaphores = Vec::with_capacity(1);
        let mut wait_stages = Vec::with_capacity(1);
        let mut wait_values = Vec::with_capacity(1);
        if let Some((semaphore, stage)) = wait {
            wait_semaphores.push(semaphore);
            wait_stages.push(stage);
            // Binary semaphore: the value slot is ignored but must exist
            wait_values.push(0);
        }

        let mut signal_semaphores = Vec::with_capacity(2);
        let mut signal_values = Vec::with_capacity(2);
        if let Some(semaphore) = signal_binary {
            signal_semaphores.push(semaphore);
            signal_values.push(0);
        }
        signal_semaphores.push(self.fence.handle());
        signal_values.push(value);

        let command_buffers = [self.command_buffer.handle()];

        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default()
            .wait_semaphore_values(&wait_values)
            .signal_semaphore_values(&signal_values);

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        unsafe {
            self.device
                .submit_graphics(&[submit_info], vk::Fence::null())?;
        }

        Ok(value)
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        // Nothing may be destroyed while the GPU could still touch it
        if let Err(e) = self.fence.flush() {
            error!("Final queue flush failed during shutdown: {:?}", e);
        }
        info!("Shell shut down");
    }
}

fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
}

fn depth_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::DEPTH)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_stats_accumulates_within_window() {
        let mut stats = FrameStats::new();
        // Well under a second: no report yet
        assert!(stats.frame_rendered().is_none());
        assert!(stats.frame_rendered().is_none());
        assert!(stats.frame_rendered().is_none());
    }

    #[test]
    fn test_subresource_ranges() {
        let color = color_subresource_range();
        assert_eq!(color.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(color.level_count, 1);

        let depth = depth_subresource_range();
        assert_eq!(depth.aspect_mask, vk::ImageAspectFlags::DEPTH);
        assert_eq!(depth.layer_count, 1);
    }
}
