//! # Ignis Graphics
//!
//! GPU resource ownership and command submission for the Ignis engine.
//!
//! ## Overview
//!
//! This crate sits directly on top of a native GPU API and provides:
//! - [`GpuDevice`] - Device context, shader format negotiation and resource factories
//! - [`RefCounted`] - Shared ownership with a single, deterministic teardown
//! - GPU resources: [`Buffer`], [`TransferBuffer`], [`Texture`], [`Sampler`],
//!   [`Shader`] and [`GraphicsPipeline`]
//! - [`CommandBuffer`] with scoped [`RenderPass`] and [`CopyPass`] recording
//! - [`GpuBackend`] - The native API seam, with a headless [`DummyBackend`]
//!
//! Every native object is owned by exactly one wrapper and released when that
//! wrapper drops. Usage errors (a second open pass, mapping a mapped buffer,
//! out-of-range copies) are checked with assertions in debug builds and with
//! the `strict-checks` feature.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ignis_graphics::{DeviceDescriptor, DummyBackend, GpuDevice};
//!
//! let device = GpuDevice::new(Arc::new(DummyBackend::new()), &DeviceDescriptor::default())?;
//! let vs = device.create_shader(&ShaderDescriptor::vertex(VS_SPIRV, "main"))?;
//! let fs = device.create_shader(&ShaderDescriptor::fragment(FS_SPIRV, "main"))?;
//! let pipeline = device.create_graphics_pipeline(&vs, &fs, &pipeline_desc)?;
//!
//! let mut cmd = device.acquire_command_buffer()?;
//! if let Some(frame) = cmd.wait_and_acquire_swapchain_texture(&window)? {
//!     let mut pass = cmd.begin_render_pass_clear(&frame, Color::BLACK)?;
//!     pass.bind_graphics_pipeline(&pipeline);
//!     pass.draw_primitives(3, 0);
//!     pass.end();
//! }
//! cmd.submit()?;
//! ```

#[macro_use]
mod debug;

pub mod backend;
pub mod command;
pub mod device;
pub mod error;
pub mod handle;
pub mod ref_counted;
pub mod resources;
pub mod types;
pub mod window;

pub use backend::dummy::DummyBackend;
pub use backend::GpuBackend;
pub use command::{
    BufferBinding, ColorTargetInfo, CommandBuffer, CommandBufferState, CopyPass,
    DepthStencilTargetInfo, RenderPass, SwapchainTexture, TextureSamplerBinding,
    TextureUploadRegion,
};
pub use debug::CHECKS_ENABLED;
pub use device::{negotiate_shader_format, DeviceDescriptor, GpuDevice, DEFAULT_FORMAT_PRIORITY};
pub use error::{GraphicsError, GraphicsResult};
pub use handle::{NativeHandle, ResourceKind};
pub use ref_counted::RefCounted;
pub use resources::{Buffer, GraphicsPipeline, Sampler, Shader, Texture, TransferBuffer};
pub use types::*;
pub use window::Window;

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
pub(crate) mod test_utils {
    use std::sync::Arc;

    use crate::backend::dummy::DummyBackend;
    use crate::backend::GpuBackend;
    use crate::device::{DeviceDescriptor, GpuDevice};

    /// A device on a fresh dummy backend, plus the backend for inspection.
    pub fn dummy_device() -> (Arc<DummyBackend>, Arc<GpuDevice>) {
        let backend = Arc::new(DummyBackend::new());
        let device = GpuDevice::new(
            backend.clone() as Arc<dyn GpuBackend>,
            &DeviceDescriptor::default().with_label("test"),
        )
        .expect("dummy device");
        (backend, device)
    }
}
