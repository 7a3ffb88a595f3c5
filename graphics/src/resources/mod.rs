//! GPU resources.
//!
//! This module contains the GPU resource types created against a [`GpuDevice`]:
//! - [`Buffer`] - device-local memory buffer
//! - [`TransferBuffer`] - host-visible staging buffer
//! - [`Texture`] - GPU texture, owned or borrowed from a swapchain
//! - [`Sampler`] - texture sampler
//! - [`Shader`] - precompiled shader blob
//! - [`GraphicsPipeline`] - shaders plus fixed-function state
//!
//! Each resource exclusively owns one native handle. It is released when the
//! resource is dropped, or later if a command buffer that recorded the
//! resource is still waiting to be submitted. Resources that should be shared, such as shaders used by several
//! pipelines, are wrapped in [`RefCounted`](crate::RefCounted).
//!
//! [`GpuDevice`]: crate::GpuDevice

mod buffer;
mod pipeline;
pub(crate) mod retained;
mod sampler;
mod shader;
mod texture;
mod transfer_buffer;

pub use buffer::Buffer;
pub use pipeline::GraphicsPipeline;
pub use sampler::Sampler;
pub use shader::Shader;
pub use texture::Texture;
pub use transfer_buffer::TransferBuffer;
