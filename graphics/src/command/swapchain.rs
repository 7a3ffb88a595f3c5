//! Swapchain textures lent to a command buffer.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

use crate::command::CommandBuffer;
use crate::resources::Texture;

/// The swapchain texture for the frame being recorded.
///
/// It borrows the command buffer that acquired it. The texture is only valid
/// until that buffer is submitted, and the borrow makes using it afterwards a
/// compile error:
///
/// ```compile_fail
/// use ignis_graphics::{GpuDevice, GraphicsResult, Window};
/// use std::sync::Arc;
///
/// fn present<W: Window>(device: &Arc<GpuDevice>, window: &W) -> GraphicsResult<()> {
///     let mut cmd = device.acquire_command_buffer()?;
///     let frame = cmd.wait_and_acquire_swapchain_texture(window)?;
///     cmd.submit()?;
///     drop(frame);
///     Ok(())
/// }
/// ```
///
/// Dropping it releases nothing; the swapchain keeps the native texture.
pub struct SwapchainTexture<'a> {
    texture: Texture,
    _command_buffer: PhantomData<&'a CommandBuffer>,
}

impl SwapchainTexture<'_> {
    pub(crate) fn new(texture: Texture) -> Self {
        Self {
            texture,
            _command_buffer: PhantomData,
        }
    }
}

impl Deref for SwapchainTexture<'_> {
    type Target = Texture;

    fn deref(&self) -> &Texture {
        &self.texture
    }
}

impl fmt::Debug for SwapchainTexture<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SwapchainTexture").field(&self.texture).finish()
    }
}
