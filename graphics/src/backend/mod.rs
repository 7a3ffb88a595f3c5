//! GPU backend abstraction layer.
//!
//! [`GpuBackend`] is the native GPU API this crate wraps. It is deliberately
//! shaped like a C API: constructors return raw pointers that are null on
//! failure (with the diagnostic available from [`GpuBackend::last_error`]),
//! and every release or end call takes the pointer back. Nothing outside the
//! resource wrappers ever holds one of these pointers.
//!
//! # Available Backends
//!
//! - [`dummy`]: headless in-memory backend that validates usage like a strict
//!   driver and records everything it is asked to do.

pub mod dummy;

use std::ffi::CStr;
use std::fmt;

use raw_window_handle::RawWindowHandle;

use crate::handle::{
    RawBuffer, RawCommandBuffer, RawCopyPass, RawDevice, RawGraphicsPipeline, RawRenderPass,
    RawSampler, RawShader, RawTexture, RawTransferBuffer,
};
use crate::types::{
    BufferDescriptor, Color, GraphicsPipelineDescriptor, IndexElementSize, LoadOp,
    SamplerDescriptor, ScissorRect, ShaderFormat, ShaderStage, StoreOp, TextureDescriptor,
    TextureFormat, TransferBufferDescriptor, Viewport,
};

// ============================================================================
// Native call parameters
// ============================================================================

/// Parameters of a native shader creation call.
#[derive(Debug, Clone, Copy)]
pub struct ShaderCreateInfo<'a> {
    pub code: &'a [u8],
    pub entry_point: &'a CStr,
    pub format: ShaderFormat,
    pub stage: ShaderStage,
    pub num_samplers: u32,
    pub num_storage_textures: u32,
    pub num_storage_buffers: u32,
    pub num_uniform_buffers: u32,
}

/// Parameters of a native graphics pipeline creation call.
#[derive(Debug, Clone, Copy)]
pub struct PipelineCreateInfo<'a> {
    pub vertex_shader: *mut RawShader,
    pub fragment_shader: *mut RawShader,
    pub state: &'a GraphicsPipelineDescriptor,
}

/// A color attachment of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct NativeColorTarget {
    pub texture: *mut RawTexture,
    pub mip_level: u32,
    pub layer_or_depth_plane: u32,
    pub clear_color: Color,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub cycle: bool,
}

/// The depth-stencil attachment of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct NativeDepthStencilTarget {
    pub texture: *mut RawTexture,
    pub clear_depth: f32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub clear_stencil: u8,
    pub cycle: bool,
}

/// A buffer bound at a byte offset.
#[derive(Debug, Clone, Copy)]
pub struct NativeBufferBinding {
    pub buffer: *mut RawBuffer,
    pub offset: u32,
}

/// A texture paired with the sampler that reads it.
#[derive(Debug, Clone, Copy)]
pub struct NativeTextureSamplerBinding {
    pub texture: *mut RawTexture,
    pub sampler: *mut RawSampler,
}

/// Source of a buffer upload.
#[derive(Debug, Clone, Copy)]
pub struct TransferBufferLocation {
    pub transfer_buffer: *mut RawTransferBuffer,
    pub offset: u32,
}

/// Destination of a buffer upload.
#[derive(Debug, Clone, Copy)]
pub struct BufferRegion {
    pub buffer: *mut RawBuffer,
    pub offset: u32,
    pub size: u32,
}

/// Source of a texture upload.
#[derive(Debug, Clone, Copy)]
pub struct TextureTransferInfo {
    pub transfer_buffer: *mut RawTransferBuffer,
    pub offset: u32,
    /// Row length in texels; 0 means tightly packed.
    pub pixels_per_row: u32,
    /// Rows per layer; 0 means tightly packed.
    pub rows_per_layer: u32,
}

/// Destination of a texture upload.
#[derive(Debug, Clone, Copy)]
pub struct TextureRegion {
    pub texture: *mut RawTexture,
    pub mip_level: u32,
    pub layer: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub w: u32,
    pub h: u32,
    pub d: u32,
}

/// Result of a swapchain acquire.
#[derive(Debug, Clone, Copy)]
pub struct AcquiredSwapchainTexture {
    /// Null when no drawable is available (minimized window).
    pub texture: *mut RawTexture,
    pub width: u32,
    pub height: u32,
}

// ============================================================================
// Backend trait
// ============================================================================

/// The native GPU API.
///
/// Pointers passed into a backend are always ones the same backend returned
/// and the wrappers have not yet released. Backends may treat anything else
/// as a usage error.
///
/// # Safety
///
/// Implementors guarantee that a non-null pointer returned by
/// [`map_transfer_buffer`](GpuBackend::map_transfer_buffer) addresses at least
/// the transfer buffer's size in writable bytes, and stays valid and
/// unaliased by the backend until the matching
/// [`unmap_transfer_buffer`](GpuBackend::unmap_transfer_buffer) or release.
pub unsafe trait GpuBackend: Send + Sync + fmt::Debug {
    /// Backend name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Diagnostic message of the most recent failed call.
    fn last_error(&self) -> String;

    // ---- device ------------------------------------------------------------

    fn create_device(
        &self,
        requested_formats: ShaderFormat,
        debug_mode: bool,
        driver_name: Option<&str>,
    ) -> *mut RawDevice;

    fn destroy_device(&self, device: *mut RawDevice);

    /// Shader encodings the device accepts.
    fn shader_formats(&self, device: *mut RawDevice) -> ShaderFormat;

    /// Block until the device has finished all submitted work.
    fn wait_for_idle(&self, device: *mut RawDevice) -> bool;

    fn claim_window(&self, device: *mut RawDevice, window: RawWindowHandle) -> bool;

    fn release_window(&self, device: *mut RawDevice, window: RawWindowHandle);

    /// Format of the window's swapchain textures, `Invalid` if unclaimed.
    fn swapchain_texture_format(
        &self,
        device: *mut RawDevice,
        window: RawWindowHandle,
    ) -> TextureFormat;

    // ---- resources ---------------------------------------------------------

    fn create_buffer(&self, device: *mut RawDevice, desc: &BufferDescriptor) -> *mut RawBuffer;

    fn set_buffer_name(&self, device: *mut RawDevice, buffer: *mut RawBuffer, name: &str);

    fn release_buffer(&self, device: *mut RawDevice, buffer: *mut RawBuffer);

    fn create_transfer_buffer(
        &self,
        device: *mut RawDevice,
        desc: &TransferBufferDescriptor,
    ) -> *mut RawTransferBuffer;

    fn release_transfer_buffer(&self, device: *mut RawDevice, buffer: *mut RawTransferBuffer);

    /// Map a transfer buffer into host memory. Null on failure.
    ///
    /// With `cycle` set, a buffer still in use by the GPU is swapped for
    /// fresh memory instead of being overwritten.
    fn map_transfer_buffer(
        &self,
        device: *mut RawDevice,
        buffer: *mut RawTransferBuffer,
        cycle: bool,
    ) -> *mut u8;

    fn unmap_transfer_buffer(&self, device: *mut RawDevice, buffer: *mut RawTransferBuffer);

    fn create_texture(&self, device: *mut RawDevice, desc: &TextureDescriptor) -> *mut RawTexture;

    fn set_texture_name(&self, device: *mut RawDevice, texture: *mut RawTexture, name: &str);

    fn release_texture(&self, device: *mut RawDevice, texture: *mut RawTexture);

    fn create_sampler(&self, device: *mut RawDevice, desc: &SamplerDescriptor) -> *mut RawSampler;

    fn release_sampler(&self, device: *mut RawDevice, sampler: *mut RawSampler);

    fn create_shader(&self, device: *mut RawDevice, info: &ShaderCreateInfo<'_>) -> *mut RawShader;

    fn release_shader(&self, device: *mut RawDevice, shader: *mut RawShader);

    fn create_graphics_pipeline(
        &self,
        device: *mut RawDevice,
        info: &PipelineCreateInfo<'_>,
    ) -> *mut RawGraphicsPipeline;

    fn release_graphics_pipeline(&self, device: *mut RawDevice, pipeline: *mut RawGraphicsPipeline);

    // ---- command buffers ---------------------------------------------------

    fn acquire_command_buffer(&self, device: *mut RawDevice) -> *mut RawCommandBuffer;

    /// Hand the recorded work to the GPU. The command buffer is consumed
    /// whether or not this succeeds.
    fn submit_command_buffer(&self, command_buffer: *mut RawCommandBuffer) -> bool;

    /// Wait for and acquire the window's next swapchain texture.
    ///
    /// `None` on failure. On success the texture may be null when there is
    /// nothing to draw to. The texture belongs to the swapchain and must
    /// not be released.
    fn wait_and_acquire_swapchain_texture(
        &self,
        command_buffer: *mut RawCommandBuffer,
        window: RawWindowHandle,
    ) -> Option<AcquiredSwapchainTexture>;

    fn push_vertex_uniform_data(
        &self,
        command_buffer: *mut RawCommandBuffer,
        slot: u32,
        data: &[u8],
    );

    fn push_fragment_uniform_data(
        &self,
        command_buffer: *mut RawCommandBuffer,
        slot: u32,
        data: &[u8],
    );

    fn generate_mipmaps(&self, command_buffer: *mut RawCommandBuffer, texture: *mut RawTexture);

    // ---- render passes -----------------------------------------------------

    fn begin_render_pass(
        &self,
        command_buffer: *mut RawCommandBuffer,
        color_targets: &[NativeColorTarget],
        depth_stencil_target: Option<&NativeDepthStencilTarget>,
    ) -> *mut RawRenderPass;

    fn bind_graphics_pipeline(&self, pass: *mut RawRenderPass, pipeline: *mut RawGraphicsPipeline);

    fn bind_vertex_buffers(
        &self,
        pass: *mut RawRenderPass,
        first_slot: u32,
        bindings: &[NativeBufferBinding],
    );

    fn bind_index_buffer(
        &self,
        pass: *mut RawRenderPass,
        binding: &NativeBufferBinding,
        element_size: IndexElementSize,
    );

    fn bind_fragment_samplers(
        &self,
        pass: *mut RawRenderPass,
        first_slot: u32,
        bindings: &[NativeTextureSamplerBinding],
    );

    fn set_viewport(&self, pass: *mut RawRenderPass, viewport: &Viewport);

    fn set_scissor(&self, pass: *mut RawRenderPass, scissor: &ScissorRect);

    fn draw_primitives(
        &self,
        pass: *mut RawRenderPass,
        num_vertices: u32,
        num_instances: u32,
        first_vertex: u32,
        first_instance: u32,
    );

    fn draw_indexed_primitives(
        &self,
        pass: *mut RawRenderPass,
        num_indices: u32,
        num_instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    fn end_render_pass(&self, pass: *mut RawRenderPass);

    // ---- copy passes -------------------------------------------------------

    fn begin_copy_pass(&self, command_buffer: *mut RawCommandBuffer) -> *mut RawCopyPass;

    fn upload_to_buffer(
        &self,
        pass: *mut RawCopyPass,
        source: &TransferBufferLocation,
        destination: &BufferRegion,
        cycle: bool,
    );

    fn upload_to_texture(
        &self,
        pass: *mut RawCopyPass,
        source: &TextureTransferInfo,
        destination: &TextureRegion,
        cycle: bool,
    );

    fn end_copy_pass(&self, pass: *mut RawCopyPass);
}
