//! Command recording.
//!
//! A [`CommandBuffer`] is acquired from the device, recorded into and then
//! submitted. Draws and uploads are recorded through passes nested inside
//! it: a [`RenderPass`] targets a fixed set of attachments, a [`CopyPass`]
//! moves staged data into device-local resources.
//!
//! Passes borrow the command buffer they were opened on, so the buffer
//! cannot be submitted while one is alive. Only one pass may be open at a
//! time; opening a second one is a usage error.
//!
//! Every resource recorded into a command buffer is pinned by it until
//! submission. Dropping a bound buffer or texture early only drops the
//! application's handle; the native object is released after the work that
//! uses it has been handed to the GPU.
//!
//! ```text
//! CommandBuffer (Open) ──submit()/drop──▶ (Submitted)
//!      │
//!      ├─ begin_render_pass() ─▶ RenderPass ──end()/drop──┐
//!      │                                                  │
//!      ◀──────────────────────────────────────────────────┘
//!      └─ begin_copy_pass()   ─▶ CopyPass   ──end()/drop──▶ back to the buffer
//! ```

mod copy_pass;
mod render_pass;
mod swapchain;

pub use copy_pass::{CopyPass, TextureUploadRegion};
pub use render_pass::{
    BufferBinding, ColorTargetInfo, DepthStencilTargetInfo, RenderPass, TextureSamplerBinding,
};
pub use swapchain::SwapchainTexture;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytemuck::Pod;

use crate::backend::{NativeColorTarget, NativeDepthStencilTarget};
use crate::device::GpuDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::handle::{NativeHandle, RawCommandBuffer, ResourceKind};
use crate::resources::retained::Pinned;
use crate::resources::Texture;
use crate::types::{Color, TextureUsage};
use crate::window::Window;

/// Lifecycle state of a [`CommandBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBufferState {
    /// Accepting commands.
    Open,
    /// Handed to the GPU. Nothing more may be recorded.
    Submitted,
}

/// Kind of pass currently open on a command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PassKind {
    Render,
    Copy,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render => f.write_str("render"),
            Self::Copy => f.write_str("copy"),
        }
    }
}

/// A unit of GPU work.
///
/// Call [`CommandBuffer::submit`] to hand the recorded work to the GPU. A
/// buffer that is still open when dropped is submitted automatically, so
/// recorded work is never leaked on early returns.
///
/// A command buffer is recorded from one thread at a time. It may be moved
/// to another thread but not shared.
///
/// # Example
///
/// ```ignore
/// let mut cmd = device.acquire_command_buffer()?;
/// if let Some(frame) = cmd.wait_and_acquire_swapchain_texture(&window)? {
///     cmd.render_pass(&[ColorTargetInfo::clear(&frame, Color::BLACK)], None, |pass| {
///         pass.bind_graphics_pipeline(&pipeline);
///         pass.bind_vertex_buffer(0, &vertices, 0);
///         pass.draw_primitives(3, 0);
///     })?;
/// }
/// cmd.submit()?;
/// ```
pub struct CommandBuffer {
    device: Arc<GpuDevice>,
    handle: NativeHandle<RawCommandBuffer>,
    state: CommandBufferState,
    open_pass: Cell<Option<PassKind>>,
    /// Resources referenced by recorded commands, keyed by address.
    pinned: RefCell<HashMap<usize, Pinned>>,
}

impl CommandBuffer {
    pub(crate) fn new(device: &Arc<GpuDevice>) -> GraphicsResult<Self> {
        let raw = device.backend().acquire_command_buffer(device.raw());
        let handle = device.wrap_native(raw, ResourceKind::CommandBuffer)?;
        log::trace!("Acquired command buffer");
        Ok(Self {
            device: Arc::clone(device),
            handle,
            state: CommandBufferState::Open,
            open_pass: Cell::new(None),
            pinned: RefCell::new(HashMap::new()),
        })
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GpuDevice> {
        &self.device
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    /// Whether a render or copy pass is open on this buffer.
    pub fn has_open_pass(&self) -> bool {
        self.open_pass.get().is_some()
    }

    /// Number of distinct resources pinned until submission.
    pub fn pinned_resource_count(&self) -> usize {
        self.pinned.borrow().len()
    }

    /// Submit the recorded work to the GPU.
    ///
    /// The buffer is consumed by the backend whether or not submission
    /// succeeds, and moves to [`CommandBufferState::Submitted`] either way.
    /// Resources pinned by the recorded work are let go afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::SubmitFailed`] if the backend rejects the
    /// submission.
    pub fn submit(&mut self) -> GraphicsResult<()> {
        gpu_assert!(
            self.state == CommandBufferState::Open,
            "command buffer submitted twice"
        );
        gpu_assert!(
            self.open_pass.get().is_none(),
            "command buffer submitted while a {} pass is open",
            self.open_pass.get().unwrap_or(PassKind::Render)
        );
        self.submit_native()
    }

    fn submit_native(&mut self) -> GraphicsResult<()> {
        let Some(raw) = self.handle.release() else {
            return Ok(());
        };
        self.state = CommandBufferState::Submitted;
        self.open_pass.set(None);

        let submitted = self.device.backend().submit_command_buffer(raw.as_ptr());
        self.unpin_all();
        if submitted {
            log::trace!("Submitted command buffer");
            Ok(())
        } else {
            let err = GraphicsError::SubmitFailed(self.device.last_error());
            log::error!("{}", err);
            Err(err)
        }
    }

    /// Open a render pass drawing into the given attachments.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::CreationFailed`] if the backend cannot begin
    /// the pass.
    pub fn begin_render_pass(
        &self,
        color_targets: &[ColorTargetInfo<'_>],
        depth_stencil_target: Option<&DepthStencilTargetInfo<'_>>,
    ) -> GraphicsResult<RenderPass<'_>> {
        self.assert_can_begin(PassKind::Render);
        for target in color_targets {
            gpu_assert!(
                target.texture.usage().contains(TextureUsage::COLOR_TARGET),
                "texture {:?} is not usable as a color target",
                target.texture.label()
            );
        }
        if let Some(target) = depth_stencil_target {
            gpu_assert!(
                target
                    .texture
                    .usage()
                    .contains(TextureUsage::DEPTH_STENCIL_TARGET),
                "texture {:?} is not usable as a depth-stencil target",
                target.texture.label()
            );
        }

        for target in color_targets {
            self.pin(target.texture.pinned());
        }
        if let Some(target) = depth_stencil_target {
            self.pin(target.texture.pinned());
        }

        let native_colors: Vec<NativeColorTarget> =
            color_targets.iter().map(ColorTargetInfo::to_native).collect();
        let native_depth: Option<NativeDepthStencilTarget> =
            depth_stencil_target.map(DepthStencilTargetInfo::to_native);

        let raw = self.device.backend().begin_render_pass(
            self.raw(),
            &native_colors,
            native_depth.as_ref(),
        );
        let handle = self.device.wrap_native(raw, ResourceKind::RenderPass)?;
        self.open_pass.set(Some(PassKind::Render));
        log::trace!(
            "Began render pass ({} color targets, depth: {})",
            color_targets.len(),
            depth_stencil_target.is_some()
        );
        Ok(RenderPass::new(self, handle))
    }

    /// Open a render pass that clears a single color target.
    pub fn begin_render_pass_clear<'a>(
        &'a self,
        target: &'a Texture,
        clear_color: Color,
    ) -> GraphicsResult<RenderPass<'a>> {
        self.begin_render_pass(&[ColorTargetInfo::clear(target, clear_color)], None)
    }

    /// Open a copy pass for uploading staged data.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::CreationFailed`] if the backend cannot begin
    /// the pass.
    pub fn begin_copy_pass(&self) -> GraphicsResult<CopyPass<'_>> {
        self.assert_can_begin(PassKind::Copy);
        let raw = self.device.backend().begin_copy_pass(self.raw());
        let handle = self.device.wrap_native(raw, ResourceKind::CopyPass)?;
        self.open_pass.set(Some(PassKind::Copy));
        log::trace!("Began copy pass");
        Ok(CopyPass::new(self, handle))
    }

    /// Record a render pass inside a closure.
    ///
    /// The pass is ended when the closure returns.
    pub fn render_pass<'a, R>(
        &'a self,
        color_targets: &[ColorTargetInfo<'_>],
        depth_stencil_target: Option<&DepthStencilTargetInfo<'_>>,
        record: impl FnOnce(&mut RenderPass<'a>) -> R,
    ) -> GraphicsResult<R> {
        let mut pass = self.begin_render_pass(color_targets, depth_stencil_target)?;
        let result = record(&mut pass);
        pass.end();
        Ok(result)
    }

    /// Record a copy pass inside a closure.
    ///
    /// The pass is ended when the closure returns.
    pub fn copy_pass<'a, R>(
        &'a self,
        record: impl FnOnce(&mut CopyPass<'a>) -> R,
    ) -> GraphicsResult<R> {
        let mut pass = self.begin_copy_pass()?;
        let result = record(&mut pass);
        pass.end();
        Ok(result)
    }

    /// Push uniform data for the vertex stage into the given slot.
    pub fn push_vertex_uniform_data(&self, slot: u32, data: &[u8]) {
        self.assert_recording();
        self.device
            .backend()
            .push_vertex_uniform_data(self.raw(), slot, data);
    }

    /// Push uniform data for the fragment stage into the given slot.
    pub fn push_fragment_uniform_data(&self, slot: u32, data: &[u8]) {
        self.assert_recording();
        self.device
            .backend()
            .push_fragment_uniform_data(self.raw(), slot, data);
    }

    /// Push a plain value as vertex stage uniform data.
    pub fn push_vertex_uniform<T: Pod>(&self, slot: u32, value: &T) {
        self.push_vertex_uniform_data(slot, bytemuck::bytes_of(value));
    }

    /// Push a plain value as fragment stage uniform data.
    pub fn push_fragment_uniform<T: Pod>(&self, slot: u32, value: &T) {
        self.push_fragment_uniform_data(slot, bytemuck::bytes_of(value));
    }

    /// Fill every mip level of `texture` from its base level.
    ///
    /// Must be recorded outside of any pass.
    pub fn generate_mipmaps(&self, texture: &Texture) {
        self.assert_recording();
        gpu_assert!(
            self.open_pass.get().is_none(),
            "mipmaps cannot be generated inside a pass"
        );
        gpu_assert!(
            texture.num_levels() > 1,
            "texture {:?} has a single mip level",
            texture.label()
        );
        gpu_assert!(
            texture
                .usage()
                .contains(TextureUsage::SAMPLER | TextureUsage::COLOR_TARGET),
            "mipmap generation needs a sampled color target, texture {:?} has {:?}",
            texture.label(),
            texture.usage()
        );
        self.pin(texture.pinned());
        self.device
            .backend()
            .generate_mipmaps(self.raw(), texture.raw());
    }

    /// Wait for the window's next swapchain texture.
    ///
    /// Returns `Ok(None)` when there is nothing to draw to, for example
    /// while the window is minimized. The returned texture belongs to the
    /// swapchain and borrows this buffer, so it must be dropped before the
    /// buffer is submitted. Dropping it does not release anything.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::SwapchainAcquireFailed`] if the backend
    /// cannot acquire a texture, for example because the window was never
    /// claimed.
    pub fn wait_and_acquire_swapchain_texture<W: Window + ?Sized>(
        &self,
        window: &W,
    ) -> GraphicsResult<Option<SwapchainTexture<'_>>> {
        self.assert_recording();
        let raw_window = window.window_handle()?.as_raw();
        let backend = self.device.backend();

        let Some(acquired) = backend.wait_and_acquire_swapchain_texture(self.raw(), raw_window)
        else {
            let err = GraphicsError::SwapchainAcquireFailed(self.device.last_error());
            log::error!("{}", err);
            return Err(err);
        };
        if acquired.texture.is_null() {
            log::trace!("No swapchain texture available");
            return Ok(None);
        }

        let drawable = window.drawable_size();
        if drawable != (acquired.width, acquired.height) {
            log::warn!(
                "Swapchain texture is {}x{} but the drawable is {}x{}",
                acquired.width,
                acquired.height,
                drawable.0,
                drawable.1
            );
        }

        let format = backend.swapchain_texture_format(self.device.raw(), raw_window);
        let handle = self.device.wrap_native(acquired.texture, ResourceKind::Texture)?;
        Ok(Some(SwapchainTexture::new(Texture::borrowed(
            &self.device,
            handle,
            acquired.width,
            acquired.height,
            format,
        ))))
    }

    pub(crate) fn raw(&self) -> *mut RawCommandBuffer {
        self.handle.as_ptr()
    }

    /// Keep a resource alive until this buffer is submitted.
    pub(crate) fn pin(&self, object: Pinned) {
        let key = Arc::as_ptr(&object).cast::<()>() as usize;
        self.pinned.borrow_mut().entry(key).or_insert(object);
    }

    fn unpin_all(&mut self) {
        let pinned = std::mem::take(self.pinned.get_mut());
        if !pinned.is_empty() {
            log::trace!("Releasing {} resources pinned by the command buffer", pinned.len());
        }
    }

    /// Called by a pass when it ends.
    pub(crate) fn pass_ended(&self) {
        self.open_pass.set(None);
    }

    fn assert_recording(&self) {
        gpu_assert!(
            self.state == CommandBufferState::Open && self.handle.is_valid(),
            "command buffer used after submission"
        );
    }

    fn assert_can_begin(&self, kind: PassKind) {
        self.assert_recording();
        gpu_assert!(
            self.open_pass.get().is_none(),
            "cannot begin a {} pass while a {} pass is open",
            kind,
            self.open_pass.get().unwrap_or(kind)
        );
    }
}

impl fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("handle", &self.handle)
            .field("state", &self.state)
            .field("open_pass", &self.open_pass.get())
            .field("pinned", &self.pinned.borrow().len())
            .finish()
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        if self.state != CommandBufferState::Open || !self.handle.is_valid() {
            return;
        }
        if let Some(kind) = self.open_pass.get() {
            log::warn!("Command buffer dropped with a {} pass still open", kind);
        }
        log::trace!("Submitting command buffer at end of scope");
        if let Err(err) = self.submit_native() {
            log::error!("Automatic command buffer submission failed: {}", err);
        }
    }
}

static_assertions::assert_impl_all!(CommandBuffer: Send);
static_assertions::assert_not_impl_any!(CommandBuffer: Sync);
