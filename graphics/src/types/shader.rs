//! Shader types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Shader binary encodings a backend can consume.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderFormat: u32 {
        /// Platform-private format (consoles).
        const PRIVATE = 1 << 0;
        /// SPIR-V intermediate representation.
        const SPIRV = 1 << 1;
        /// Direct3D bytecode (shader model 5).
        const DXBC = 1 << 2;
        /// Direct3D intermediate language (shader model 6).
        const DXIL = 1 << 3;
        /// Metal shading language source text.
        const MSL = 1 << 4;
        /// Precompiled Metal library.
        const METALLIB = 1 << 5;
    }
}

impl ShaderFormat {
    /// Human-readable name of a single format.
    pub fn name(self) -> &'static str {
        match self {
            Self::PRIVATE => "private",
            Self::SPIRV => "SPIR-V",
            Self::DXBC => "DXBC",
            Self::DXIL => "DXIL",
            Self::MSL => "MSL",
            Self::METALLIB => "metallib",
            _ => "mixed",
        }
    }
}

/// Programmable pipeline stage a shader runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Descriptor for wrapping a precompiled shader blob.
///
/// The blob must already be encoded in the device's negotiated
/// [`ShaderFormat`]; this layer does not compile shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderDescriptor<'a> {
    /// Encoded shader code.
    pub code: &'a [u8],
    /// Name of the entry point function.
    pub entry_point: &'a str,
    /// Stage the shader runs in.
    pub stage: ShaderStage,
    /// Number of texture-sampler pairs the shader declares.
    pub num_samplers: u32,
    /// Number of storage textures the shader declares.
    pub num_storage_textures: u32,
    /// Number of storage buffers the shader declares.
    pub num_storage_buffers: u32,
    /// Number of uniform buffers the shader declares.
    pub num_uniform_buffers: u32,
}

impl<'a> ShaderDescriptor<'a> {
    /// Describe a shader with no bound resources.
    pub fn new(code: &'a [u8], entry_point: &'a str, stage: ShaderStage) -> Self {
        Self {
            code,
            entry_point,
            stage,
            num_samplers: 0,
            num_storage_textures: 0,
            num_storage_buffers: 0,
            num_uniform_buffers: 0,
        }
    }

    /// Shorthand for a vertex shader.
    pub fn vertex(code: &'a [u8], entry_point: &'a str) -> Self {
        Self::new(code, entry_point, ShaderStage::Vertex)
    }

    /// Shorthand for a fragment shader.
    pub fn fragment(code: &'a [u8], entry_point: &'a str) -> Self {
        Self::new(code, entry_point, ShaderStage::Fragment)
    }

    /// Declare the resource bindings the shader uses.
    pub fn with_resources(
        mut self,
        num_samplers: u32,
        num_storage_textures: u32,
        num_storage_buffers: u32,
        num_uniform_buffers: u32,
    ) -> Self {
        self.num_samplers = num_samplers;
        self.num_storage_textures = num_storage_textures;
        self.num_storage_buffers = num_storage_buffers;
        self.num_uniform_buffers = num_uniform_buffers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!(ShaderFormat::SPIRV.name(), "SPIR-V");
        assert_eq!((ShaderFormat::DXIL | ShaderFormat::MSL).name(), "mixed");
    }

    #[test]
    fn test_descriptor_resources() {
        let desc = ShaderDescriptor::fragment(b"blob", "main").with_resources(2, 0, 1, 3);
        assert_eq!(desc.stage, ShaderStage::Fragment);
        assert_eq!(desc.num_samplers, 2);
        assert_eq!(desc.num_storage_buffers, 1);
        assert_eq!(desc.num_uniform_buffers, 3);
    }
}
