//! Fixed-function pipeline state.
//!
//! Everything a [`GraphicsPipeline`](crate::GraphicsPipeline) bakes in at
//! creation time besides its two shaders: vertex input layout, primitive
//! topology, rasterizer, multisample and depth-stencil state, plus the formats
//! of the render targets the pipeline draws into.

use bitflags::bitflags;

use super::sampler::CompareOp;
use super::texture::{SampleCount, TextureFormat};
use crate::error::{GraphicsError, GraphicsResult};

// ============================================================================
// Vertex input
// ============================================================================

/// Format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexElementFormat {
    /// Single 32-bit float.
    Float,
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
    /// Single 32-bit signed integer.
    Int,
    /// Two 32-bit signed integers.
    Int2,
    /// Four 32-bit signed integers.
    Int4,
    /// Single 32-bit unsigned integer.
    Uint,
    /// Two 32-bit unsigned integers.
    Uint2,
    /// Four 32-bit unsigned integers.
    Uint4,
    /// Four 8-bit unsigned integers normalized to `[0, 1]`.
    Ubyte4Norm,
    /// Four 8-bit signed integers normalized to `[-1, 1]`.
    Byte4Norm,
    /// Two 16-bit floats.
    Half2,
    /// Four 16-bit floats.
    Half4,
}

impl VertexElementFormat {
    /// Size of one element in bytes.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::Uint => 4,
            Self::Float2 | Self::Int2 | Self::Uint2 => 8,
            Self::Float3 => 12,
            Self::Float4 | Self::Int4 | Self::Uint4 => 16,
            Self::Ubyte4Norm | Self::Byte4Norm | Self::Half2 => 4,
            Self::Half4 => 8,
        }
    }
}

/// How a vertex buffer advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexInputRate {
    /// Once per vertex.
    #[default]
    Vertex,
    /// Once per instance.
    Instance,
}

/// Describes one vertex buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBufferDescription {
    /// Binding slot.
    pub slot: u32,
    /// Byte stride between consecutive elements.
    pub pitch: u32,
    /// Per-vertex or per-instance stepping.
    pub input_rate: VertexInputRate,
}

impl VertexBufferDescription {
    /// Per-vertex buffer at `slot` with the given stride.
    pub fn per_vertex(slot: u32, pitch: u32) -> Self {
        Self {
            slot,
            pitch,
            input_rate: VertexInputRate::Vertex,
        }
    }

    /// Per-instance buffer at `slot` with the given stride.
    pub fn per_instance(slot: u32, pitch: u32) -> Self {
        Self {
            slot,
            pitch,
            input_rate: VertexInputRate::Instance,
        }
    }
}

/// A single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Vertex buffer slot the attribute reads from.
    pub buffer_slot: u32,
    /// Element format.
    pub format: VertexElementFormat,
    /// Byte offset within one element of the buffer.
    pub offset: u32,
}

impl VertexAttribute {
    pub fn new(location: u32, buffer_slot: u32, format: VertexElementFormat, offset: u32) -> Self {
        Self {
            location,
            buffer_slot,
            format,
            offset,
        }
    }
}

/// Complete vertex input layout of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexInputState {
    pub buffers: Vec<VertexBufferDescription>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexInputState {
    /// Layout with no vertex buffers (vertices generated in the shader).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a vertex buffer slot.
    pub fn with_buffer(mut self, buffer: VertexBufferDescription) -> Self {
        self.buffers.push(buffer);
        self
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Check that every attribute reads from a declared slot, fits inside
    /// its stride, and that locations are unique.
    pub fn validate(&self) -> GraphicsResult<()> {
        for (i, attribute) in self.attributes.iter().enumerate() {
            let buffer = self
                .buffers
                .iter()
                .find(|b| b.slot == attribute.buffer_slot)
                .ok_or_else(|| {
                    GraphicsError::InvalidParameter(format!(
                        "vertex attribute at location {} reads from undeclared buffer slot {}",
                        attribute.location, attribute.buffer_slot
                    ))
                })?;

            let end = attribute.offset.saturating_add(attribute.format.size());
            if buffer.pitch != 0 && end > buffer.pitch {
                return Err(GraphicsError::InvalidParameter(format!(
                    "vertex attribute at location {} ends at byte {end}, past the stride {} of slot {}",
                    attribute.location, buffer.pitch, buffer.slot
                )));
            }

            if self.attributes[..i]
                .iter()
                .any(|other| other.location == attribute.location)
            {
                return Err(GraphicsError::InvalidParameter(format!(
                    "vertex attribute location {} is declared twice",
                    attribute.location
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Rasterizer / multisample / depth-stencil
// ============================================================================

/// Primitive topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    #[default]
    TriangleList,
    TriangleStrip,
    LineList,
    LineStrip,
    PointList,
}

/// Polygon fill mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Fill,
    Line,
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
}

/// Winding order of front-facing triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// Rasterizer state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RasterizerState {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_bias_constant_factor: f32,
    pub depth_bias_clamp: f32,
    pub depth_bias_slope_factor: f32,
    pub enable_depth_bias: bool,
    pub enable_depth_clip: bool,
}

impl RasterizerState {
    /// Cull back faces with counter-clockwise front faces.
    pub fn cull_back() -> Self {
        Self {
            cull_mode: CullMode::Back,
            ..Default::default()
        }
    }
}

/// Multisample state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MultisampleState {
    pub sample_count: SampleCount,
    /// Coverage mask; only applied when `enable_mask` is set.
    pub sample_mask: u32,
    pub enable_mask: bool,
}

/// Operation applied to the stencil buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

/// Stencil behavior for one face orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StencilOpState {
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub compare_op: CompareOp,
}

/// Depth and stencil test state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DepthStencilState {
    pub compare_op: CompareOp,
    pub back_stencil_state: StencilOpState,
    pub front_stencil_state: StencilOpState,
    pub compare_mask: u8,
    pub write_mask: u8,
    pub enable_depth_test: bool,
    pub enable_depth_write: bool,
    pub enable_stencil_test: bool,
}

impl DepthStencilState {
    /// Standard depth testing: pass if less, write depth.
    pub fn depth_less() -> Self {
        Self {
            compare_op: CompareOp::Less,
            enable_depth_test: true,
            enable_depth_write: true,
            ..Default::default()
        }
    }
}

// ============================================================================
// Color targets and blending
// ============================================================================

/// Blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFactor {
    Zero,
    #[default]
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    SrcAlphaSaturate,
}

/// Blend operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

bitflags! {
    /// Color channels written by a color target.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorComponents: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
    }
}

impl Default for ColorComponents {
    fn default() -> Self {
        Self::all()
    }
}

/// Blend state of one color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetBlendState {
    pub src_color_blendfactor: BlendFactor,
    pub dst_color_blendfactor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_blendfactor: BlendFactor,
    pub dst_alpha_blendfactor: BlendFactor,
    pub alpha_blend_op: BlendOp,
    pub color_write_mask: ColorComponents,
    pub enable_blend: bool,
    pub enable_color_write_mask: bool,
}

impl Default for ColorTargetBlendState {
    fn default() -> Self {
        Self {
            src_color_blendfactor: BlendFactor::One,
            dst_color_blendfactor: BlendFactor::Zero,
            color_blend_op: BlendOp::Add,
            src_alpha_blendfactor: BlendFactor::One,
            dst_alpha_blendfactor: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
            color_write_mask: ColorComponents::all(),
            enable_blend: false,
            enable_color_write_mask: false,
        }
    }
}

impl ColorTargetBlendState {
    /// Standard "source over" alpha blending.
    pub fn alpha_blending() -> Self {
        Self {
            src_color_blendfactor: BlendFactor::SrcAlpha,
            dst_color_blendfactor: BlendFactor::OneMinusSrcAlpha,
            src_alpha_blendfactor: BlendFactor::One,
            dst_alpha_blendfactor: BlendFactor::OneMinusSrcAlpha,
            enable_blend: true,
            ..Default::default()
        }
    }

    /// Premultiplied alpha blending.
    pub fn premultiplied_alpha() -> Self {
        Self {
            src_color_blendfactor: BlendFactor::One,
            dst_color_blendfactor: BlendFactor::OneMinusSrcAlpha,
            src_alpha_blendfactor: BlendFactor::One,
            dst_alpha_blendfactor: BlendFactor::OneMinusSrcAlpha,
            enable_blend: true,
            ..Default::default()
        }
    }
}

/// Format and blending of one color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetDescription {
    pub format: TextureFormat,
    pub blend_state: ColorTargetBlendState,
}

impl ColorTargetDescription {
    /// Opaque target of the given format.
    pub fn new(format: TextureFormat) -> Self {
        Self {
            format,
            blend_state: ColorTargetBlendState::default(),
        }
    }

    /// Set the blend state.
    pub fn with_blend(mut self, blend_state: ColorTargetBlendState) -> Self {
        self.blend_state = blend_state;
        self
    }
}

/// Render target formats a pipeline is compatible with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GraphicsPipelineTargetInfo {
    pub color_targets: Vec<ColorTargetDescription>,
    pub depth_stencil_format: Option<TextureFormat>,
}

impl GraphicsPipelineTargetInfo {
    /// A single color target, no depth.
    pub fn single(format: TextureFormat) -> Self {
        Self {
            color_targets: vec![ColorTargetDescription::new(format)],
            depth_stencil_format: None,
        }
    }

    /// Add a color target.
    pub fn with_color_target(mut self, target: ColorTargetDescription) -> Self {
        self.color_targets.push(target);
        self
    }

    /// Set the depth-stencil format.
    pub fn with_depth_stencil(mut self, format: TextureFormat) -> Self {
        self.depth_stencil_format = Some(format);
        self
    }
}

/// Everything a graphics pipeline needs besides its shaders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphicsPipelineDescriptor {
    pub label: Option<String>,
    pub vertex_input: VertexInputState,
    pub primitive_type: PrimitiveType,
    pub rasterizer: RasterizerState,
    pub multisample: MultisampleState,
    pub depth_stencil: DepthStencilState,
    pub target_info: GraphicsPipelineTargetInfo,
}

impl GraphicsPipelineDescriptor {
    /// Pipeline drawing into targets described by `target_info`, with default state.
    pub fn new(target_info: GraphicsPipelineTargetInfo) -> Self {
        Self {
            target_info,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_vertex_input(mut self, vertex_input: VertexInputState) -> Self {
        self.vertex_input = vertex_input;
        self
    }

    pub fn with_primitive_type(mut self, primitive_type: PrimitiveType) -> Self {
        self.primitive_type = primitive_type;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: RasterizerState) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_multisample(mut self, multisample: MultisampleState) -> Self {
        self.multisample = multisample;
        self
    }

    pub fn with_depth_stencil(mut self, depth_stencil: DepthStencilState) -> Self {
        self.depth_stencil = depth_stencil;
        self
    }

    /// Validate state that can be checked without a backend.
    pub fn validate(&self) -> GraphicsResult<()> {
        self.vertex_input.validate()?;

        if let Some(target) = self
            .target_info
            .color_targets
            .iter()
            .find(|t| t.format.is_depth_stencil() || t.format == TextureFormat::Invalid)
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "{:?} cannot be used as a color target format",
                target.format
            )));
        }

        if let Some(format) = self.target_info.depth_stencil_format {
            if !format.is_depth_stencil() {
                return Err(GraphicsError::InvalidParameter(format!(
                    "{format:?} is not a depth-stencil format"
                )));
            }
        }

        if self.depth_stencil.enable_depth_test && self.target_info.depth_stencil_format.is_none() {
            return Err(GraphicsError::InvalidParameter(
                "depth testing enabled without a depth-stencil target".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interleaved() -> VertexInputState {
        VertexInputState::empty()
            .with_buffer(VertexBufferDescription::per_vertex(0, 20))
            .with_attribute(VertexAttribute::new(0, 0, VertexElementFormat::Float3, 0))
            .with_attribute(VertexAttribute::new(1, 0, VertexElementFormat::Float2, 12))
    }

    #[test]
    fn test_valid_vertex_layout() {
        assert!(interleaved().validate().is_ok());
        assert!(VertexInputState::empty().validate().is_ok());
    }

    #[test]
    fn test_attribute_past_stride_is_rejected() {
        let state = interleaved().with_attribute(VertexAttribute::new(
            2,
            0,
            VertexElementFormat::Float2,
            16,
        ));
        assert!(matches!(
            state.validate(),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_attribute_on_missing_slot_is_rejected() {
        let state = interleaved().with_attribute(VertexAttribute::new(
            2,
            3,
            VertexElementFormat::Float,
            0,
        ));
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_duplicate_location_is_rejected() {
        let state = interleaved().with_attribute(VertexAttribute::new(
            1,
            0,
            VertexElementFormat::Float,
            0,
        ));
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_depth_test_requires_depth_target() {
        let desc = GraphicsPipelineDescriptor::new(GraphicsPipelineTargetInfo::single(
            TextureFormat::B8g8r8a8Unorm,
        ))
        .with_depth_stencil(DepthStencilState::depth_less());
        assert!(desc.validate().is_err());

        let desc = GraphicsPipelineDescriptor {
            target_info: desc
                .target_info
                .clone()
                .with_depth_stencil(TextureFormat::D32Float),
            ..desc
        };
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn test_pipeline_descriptor_builders() {
        let instanced = interleaved()
            .with_buffer(VertexBufferDescription::per_instance(1, 16))
            .with_attribute(VertexAttribute::new(2, 1, VertexElementFormat::Float4, 0));
        let multisample = MultisampleState {
            sample_count: SampleCount::Four,
            ..Default::default()
        };
        let targets = GraphicsPipelineTargetInfo::single(TextureFormat::B8g8r8a8Unorm)
            .with_color_target(
                ColorTargetDescription::new(TextureFormat::R8g8b8a8Unorm)
                    .with_blend(ColorTargetBlendState::alpha_blending()),
            )
            .with_color_target(
                ColorTargetDescription::new(TextureFormat::R8g8b8a8Unorm)
                    .with_blend(ColorTargetBlendState::premultiplied_alpha()),
            );
        let desc = GraphicsPipelineDescriptor::new(targets)
            .with_vertex_input(instanced.clone())
            .with_primitive_type(PrimitiveType::TriangleStrip)
            .with_rasterizer(RasterizerState::cull_back())
            .with_multisample(multisample);

        assert!(desc.validate().is_ok());
        assert_eq!(desc.vertex_input, instanced);
        assert_eq!(
            desc.vertex_input.buffers[1].input_rate,
            VertexInputRate::Instance
        );
        assert_eq!(desc.primitive_type, PrimitiveType::TriangleStrip);
        assert_eq!(desc.rasterizer.cull_mode, CullMode::Back);
        assert_eq!(desc.rasterizer.front_face, FrontFace::CounterClockwise);
        assert_eq!(desc.multisample.sample_count, SampleCount::Four);

        let colors = &desc.target_info.color_targets;
        assert_eq!(colors.len(), 3);
        assert!(!colors[0].blend_state.enable_blend);
        assert_eq!(colors[1].blend_state.src_color_blendfactor, BlendFactor::SrcAlpha);
        assert_eq!(colors[2].blend_state.src_color_blendfactor, BlendFactor::One);
        for target in &colors[1..] {
            assert!(target.blend_state.enable_blend);
            assert_eq!(
                target.blend_state.dst_color_blendfactor,
                BlendFactor::OneMinusSrcAlpha
            );
        }
    }

    #[test]
    fn test_depth_format_as_color_target_is_rejected() {
        let desc =
            GraphicsPipelineDescriptor::new(GraphicsPipelineTargetInfo::single(TextureFormat::D16Unorm));
        assert!(desc.validate().is_err());
    }
}
