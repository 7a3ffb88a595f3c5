//! Common types and descriptors for graphics resources.
//!
//! This module contains format enums, usage flags, descriptor structs and
//! fixed-function pipeline state used throughout the graphics system.

mod buffer;
mod common;
mod pipeline;
mod sampler;
mod shader;
mod texture;

pub use buffer::{
    BufferDescriptor, BufferUsage, IndexElementSize, TransferBufferDescriptor, TransferBufferUsage,
};
pub use common::{Color, LoadOp, ScissorRect, StoreOp, Viewport};
pub use pipeline::{
    BlendFactor, BlendOp, ColorComponents, ColorTargetBlendState, ColorTargetDescription,
    CullMode, DepthStencilState, FillMode, FrontFace, GraphicsPipelineDescriptor,
    GraphicsPipelineTargetInfo, MultisampleState, PrimitiveType, RasterizerState, StencilOp,
    StencilOpState, VertexAttribute, VertexBufferDescription, VertexElementFormat,
    VertexInputRate, VertexInputState,
};
pub use sampler::{AddressMode, CompareOp, Filter, MipmapMode, SamplerDescriptor};
pub use shader::{ShaderDescriptor, ShaderFormat, ShaderStage};
pub use texture::{
    SampleCount, TextureDescriptor, TextureFormat, TextureType, TextureUsage,
};
