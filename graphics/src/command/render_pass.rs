//! Render pass recording.

use std::sync::Arc;

use crate::backend::{
    NativeBufferBinding, NativeColorTarget, NativeDepthStencilTarget, NativeTextureSamplerBinding,
};
use crate::command::CommandBuffer;
use crate::handle::{NativeHandle, RawRenderPass};
use crate::resources::{Buffer, GraphicsPipeline, Sampler, Texture};
use crate::types::{
    BufferUsage, Color, IndexElementSize, LoadOp, ScissorRect, StoreOp, TextureUsage, Viewport,
};

/// A color attachment of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct ColorTargetInfo<'a> {
    pub texture: &'a Texture,
    pub mip_level: u32,
    /// Array layer, or depth plane for 3D textures.
    pub layer_or_depth_plane: u32,
    /// Used when `load_op` is [`LoadOp::Clear`].
    pub clear_color: Color,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    /// Discard the previous contents if the GPU is still using them.
    pub cycle: bool,
}

impl<'a> ColorTargetInfo<'a> {
    /// Clear `texture` to `color` and store the result.
    pub fn clear(texture: &'a Texture, color: Color) -> Self {
        Self {
            texture,
            mip_level: 0,
            layer_or_depth_plane: 0,
            clear_color: color,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            cycle: false,
        }
    }

    /// Draw on top of the existing contents of `texture`.
    pub fn load(texture: &'a Texture) -> Self {
        Self {
            load_op: LoadOp::Load,
            ..Self::clear(texture, Color::TRANSPARENT)
        }
    }

    pub fn with_mip_level(mut self, mip_level: u32) -> Self {
        self.mip_level = mip_level;
        self
    }

    pub fn with_layer(mut self, layer_or_depth_plane: u32) -> Self {
        self.layer_or_depth_plane = layer_or_depth_plane;
        self
    }

    pub fn with_store_op(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self
    }

    pub fn with_cycle(mut self, cycle: bool) -> Self {
        self.cycle = cycle;
        self
    }

    pub(crate) fn to_native(&self) -> NativeColorTarget {
        NativeColorTarget {
            texture: self.texture.raw(),
            mip_level: self.mip_level,
            layer_or_depth_plane: self.layer_or_depth_plane,
            clear_color: self.clear_color,
            load_op: self.load_op,
            store_op: self.store_op,
            cycle: self.cycle,
        }
    }
}

/// The depth-stencil attachment of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct DepthStencilTargetInfo<'a> {
    pub texture: &'a Texture,
    pub clear_depth: f32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub clear_stencil: u8,
    pub cycle: bool,
}

impl<'a> DepthStencilTargetInfo<'a> {
    /// Clear depth to `depth` and stencil to zero. Depth is discarded at the
    /// end of the pass.
    pub fn clear(texture: &'a Texture, depth: f32) -> Self {
        Self {
            texture,
            clear_depth: depth,
            load_op: LoadOp::Clear,
            store_op: StoreOp::DontCare,
            stencil_load_op: LoadOp::Clear,
            stencil_store_op: StoreOp::DontCare,
            clear_stencil: 0,
            cycle: false,
        }
    }

    pub fn with_store_op(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self
    }

    pub fn with_stencil(mut self, load_op: LoadOp, store_op: StoreOp, clear: u8) -> Self {
        self.stencil_load_op = load_op;
        self.stencil_store_op = store_op;
        self.clear_stencil = clear;
        self
    }

    pub(crate) fn to_native(&self) -> NativeDepthStencilTarget {
        NativeDepthStencilTarget {
            texture: self.texture.raw(),
            clear_depth: self.clear_depth,
            load_op: self.load_op,
            store_op: self.store_op,
            stencil_load_op: self.stencil_load_op,
            stencil_store_op: self.stencil_store_op,
            clear_stencil: self.clear_stencil,
            cycle: self.cycle,
        }
    }
}

/// A buffer bound at a byte offset.
#[derive(Debug, Clone, Copy)]
pub struct BufferBinding<'a> {
    pub buffer: &'a Buffer,
    pub offset: u32,
}

impl<'a> BufferBinding<'a> {
    pub fn new(buffer: &'a Buffer, offset: u32) -> Self {
        Self { buffer, offset }
    }
}

/// A texture and the sampler that reads it.
#[derive(Debug, Clone, Copy)]
pub struct TextureSamplerBinding<'a> {
    pub texture: &'a Texture,
    pub sampler: &'a Sampler,
}

/// An open render pass.
///
/// Bound resources are pinned by the command buffer until it is submitted,
/// so they may be dropped as soon as the bind call returns. The pass ends
/// when [`RenderPass::end`] is called or when it goes out of scope, handing
/// the command buffer back.
pub struct RenderPass<'a> {
    command_buffer: &'a CommandBuffer,
    handle: NativeHandle<RawRenderPass>,
    pipeline_bound: bool,
    index_buffer_bound: bool,
}

impl<'a> RenderPass<'a> {
    pub(crate) fn new(command_buffer: &'a CommandBuffer, handle: NativeHandle<RawRenderPass>) -> Self {
        Self {
            command_buffer,
            handle,
            pipeline_bound: false,
            index_buffer_bound: false,
        }
    }

    /// Get the command buffer this pass records into.
    pub fn command_buffer(&self) -> &'a CommandBuffer {
        self.command_buffer
    }

    pub fn bind_graphics_pipeline(&mut self, pipeline: &GraphicsPipeline) {
        gpu_assert!(
            Arc::ptr_eq(pipeline.device(), self.command_buffer.device()),
            "pipeline {:?} belongs to another device",
            pipeline.label()
        );
        self.command_buffer.pin(pipeline.pinned());
        self.command_buffer
            .device()
            .backend()
            .bind_graphics_pipeline(self.handle.as_ptr(), pipeline.raw());
        self.pipeline_bound = true;
    }

    pub fn bind_vertex_buffer(&mut self, slot: u32, buffer: &Buffer, offset: u32) {
        self.bind_vertex_buffers(slot, &[BufferBinding::new(buffer, offset)]);
    }

    /// Bind consecutive vertex buffer slots starting at `first_slot`.
    pub fn bind_vertex_buffers(&mut self, first_slot: u32, bindings: &[BufferBinding<'_>]) {
        for binding in bindings {
            self.check_buffer(binding, BufferUsage::VERTEX);
            self.command_buffer.pin(binding.buffer.pinned());
        }
        let native: Vec<NativeBufferBinding> = bindings
            .iter()
            .map(|binding| NativeBufferBinding {
                buffer: binding.buffer.raw(),
                offset: binding.offset,
            })
            .collect();
        self.command_buffer
            .device()
            .backend()
            .bind_vertex_buffers(self.handle.as_ptr(), first_slot, &native);
    }

    pub fn bind_index_buffer(
        &mut self,
        buffer: &Buffer,
        offset: u32,
        element_size: IndexElementSize,
    ) {
        let binding = BufferBinding::new(buffer, offset);
        self.check_buffer(&binding, BufferUsage::INDEX);
        gpu_assert!(
            offset % element_size.bytes() == 0,
            "index buffer offset {} is not aligned to {} bytes",
            offset,
            element_size.bytes()
        );
        self.command_buffer.pin(buffer.pinned());
        self.command_buffer.device().backend().bind_index_buffer(
            self.handle.as_ptr(),
            &NativeBufferBinding {
                buffer: buffer.raw(),
                offset,
            },
            element_size,
        );
        self.index_buffer_bound = true;
    }

    pub fn bind_fragment_sampler(&mut self, slot: u32, texture: &Texture, sampler: &Sampler) {
        self.bind_fragment_samplers(slot, &[TextureSamplerBinding { texture, sampler }]);
    }

    /// Bind consecutive fragment sampler slots starting at `first_slot`.
    pub fn bind_fragment_samplers(
        &mut self,
        first_slot: u32,
        bindings: &[TextureSamplerBinding<'_>],
    ) {
        for binding in bindings {
            gpu_assert!(
                binding.texture.usage().contains(TextureUsage::SAMPLER),
                "texture {:?} is not usable by a sampler",
                binding.texture.label()
            );
            self.command_buffer.pin(binding.texture.pinned());
            self.command_buffer.pin(binding.sampler.pinned());
        }
        let native: Vec<NativeTextureSamplerBinding> = bindings
            .iter()
            .map(|binding| NativeTextureSamplerBinding {
                texture: binding.texture.raw(),
                sampler: binding.sampler.raw(),
            })
            .collect();
        self.command_buffer
            .device()
            .backend()
            .bind_fragment_samplers(self.handle.as_ptr(), first_slot, &native);
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) {
        self.command_buffer
            .device()
            .backend()
            .set_viewport(self.handle.as_ptr(), viewport);
    }

    pub fn set_scissor(&mut self, scissor: &ScissorRect) {
        self.command_buffer
            .device()
            .backend()
            .set_scissor(self.handle.as_ptr(), scissor);
    }

    /// Draw `num_vertices` vertices starting at `first_vertex`.
    pub fn draw_primitives(&mut self, num_vertices: u32, first_vertex: u32) {
        self.draw_primitives_instanced(num_vertices, 1, first_vertex, 0);
    }

    pub fn draw_primitives_instanced(
        &mut self,
        num_vertices: u32,
        num_instances: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        gpu_assert!(self.pipeline_bound, "draw without a bound graphics pipeline");
        self.command_buffer.device().backend().draw_primitives(
            self.handle.as_ptr(),
            num_vertices,
            num_instances,
            first_vertex,
            first_instance,
        );
    }

    /// Draw `num_indices` indices from the bound index buffer.
    pub fn draw_indexed_primitives(&mut self, num_indices: u32, first_index: u32, vertex_offset: i32) {
        self.draw_indexed_primitives_instanced(num_indices, 1, first_index, vertex_offset, 0);
    }

    pub fn draw_indexed_primitives_instanced(
        &mut self,
        num_indices: u32,
        num_instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        gpu_assert!(self.pipeline_bound, "draw without a bound graphics pipeline");
        gpu_assert!(self.index_buffer_bound, "indexed draw without a bound index buffer");
        self.command_buffer.device().backend().draw_indexed_primitives(
            self.handle.as_ptr(),
            num_indices,
            num_instances,
            first_index,
            vertex_offset,
            first_instance,
        );
    }

    /// End the pass.
    pub fn end(mut self) {
        self.finish();
    }

    fn check_buffer(&self, binding: &BufferBinding<'_>, usage: BufferUsage) {
        gpu_assert!(
            Arc::ptr_eq(binding.buffer.device(), self.command_buffer.device()),
            "buffer {:?} belongs to another device",
            binding.buffer.label()
        );
        gpu_assert!(
            binding.buffer.usage().contains(usage),
            "buffer {:?} is missing {:?} usage",
            binding.buffer.label(),
            usage
        );
        gpu_assert!(
            binding.offset < binding.buffer.size(),
            "offset {} is past the end of buffer {:?} ({} bytes)",
            binding.offset,
            binding.buffer.label(),
            binding.buffer.size()
        );
    }

    fn finish(&mut self) {
        if let Some(raw) = self.handle.release() {
            self.command_buffer
                .device()
                .backend()
                .end_render_pass(raw.as_ptr());
            self.command_buffer.pass_ended();
            log::trace!("Ended render pass");
        }
    }
}

impl std::fmt::Debug for RenderPass<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("handle", &self.handle)
            .field("pipeline_bound", &self.pipeline_bound)
            .field("index_buffer_bound", &self.index_buffer_bound)
            .finish()
    }
}

impl Drop for RenderPass<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
