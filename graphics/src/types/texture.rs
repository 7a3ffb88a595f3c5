//! Texture types and descriptors.

use bitflags::bitflags;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// No format. Returned for windows that have not been claimed.
    Invalid,

    // 8-bit formats
    /// 8-bit alpha channel, unsigned normalized.
    A8Unorm,
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,

    // 16-bit formats
    /// 8-bit RG channels, unsigned normalized.
    R8g8Unorm,
    /// 16-bit red channel, float.
    R16Float,

    // 32-bit formats
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    R8g8b8a8Unorm,
    /// 8-bit RGBA channels, sRGB.
    R8g8b8a8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    B8g8r8a8Unorm,
    /// 8-bit BGRA channels, sRGB.
    B8g8r8a8UnormSrgb,
    /// 32-bit red channel, float.
    R32Float,

    // 64-bit formats
    /// 16-bit RGBA channels, float.
    R16g16b16a16Float,

    // 128-bit formats
    /// 32-bit RGBA channels, float.
    R32g32b32a32Float,

    // Depth/stencil formats
    /// 16-bit depth.
    D16Unorm,
    /// 24-bit depth.
    D24Unorm,
    /// 32-bit depth, float.
    D32Float,
    /// 24-bit depth with 8-bit stencil.
    D24UnormS8Uint,
    /// 32-bit depth float with 8-bit stencil.
    D32FloatS8Uint,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::D16Unorm
                | Self::D24Unorm
                | Self::D32Float
                | Self::D24UnormS8Uint
                | Self::D32FloatS8Uint
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::D24UnormS8Uint | Self::D32FloatS8Uint)
    }

    /// Returns the size in bytes per texel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::Invalid => 0,
            Self::A8Unorm | Self::R8Unorm => 1,
            Self::R8g8Unorm | Self::R16Float | Self::D16Unorm => 2,
            Self::R8g8b8a8Unorm
            | Self::R8g8b8a8UnormSrgb
            | Self::B8g8r8a8Unorm
            | Self::B8g8r8a8UnormSrgb
            | Self::R32Float
            | Self::D24Unorm
            | Self::D32Float
            | Self::D24UnormS8Uint => 4,
            Self::R16g16b16a16Float | Self::D32FloatS8Uint => 8,
            Self::R32g32b32a32Float => 16,
        }
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be sampled in a shader.
        const SAMPLER = 1 << 0;
        /// Texture can be a color render target.
        const COLOR_TARGET = 1 << 1;
        /// Texture can be a depth/stencil render target.
        const DEPTH_STENCIL_TARGET = 1 << 2;
        /// Texture can be read as storage from graphics stages.
        const GRAPHICS_STORAGE_READ = 1 << 3;
        /// Texture can be read as storage from compute stages.
        const COMPUTE_STORAGE_READ = 1 << 4;
        /// Texture can be written as storage from compute stages.
        const COMPUTE_STORAGE_WRITE = 1 << 5;
        /// Texture can be read and written by the same compute dispatch.
        const COMPUTE_STORAGE_SIMULTANEOUS_READ_WRITE = 1 << 6;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::SAMPLER
    }
}

/// Dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    /// Two-dimensional texture.
    #[default]
    D2,
    /// Array of two-dimensional textures.
    D2Array,
    /// Three-dimensional texture.
    D3,
    /// Cube map.
    Cube,
    /// Array of cube maps.
    CubeArray,
}

/// Number of samples per texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleCount {
    #[default]
    One,
    Two,
    Four,
    Eight,
}

impl SampleCount {
    /// Sample count as an integer.
    pub fn count(self) -> u32 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label, applied through the backend's texture naming call.
    pub label: Option<String>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Array layer count, or depth for 3D textures.
    pub layer_count_or_depth: u32,
    /// Number of mip levels.
    pub num_levels: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Dimensionality.
    pub texture_type: TextureType,
    /// Usage flags.
    pub usage: TextureUsage,
    /// Multisample count.
    pub sample_count: SampleCount,
}

impl TextureDescriptor {
    /// Describe a single-level, sampled 2D texture.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            width,
            height,
            layer_count_or_depth: 1,
            num_levels: 1,
            format,
            texture_type: TextureType::D2,
            usage: TextureUsage::SAMPLER,
            sample_count: SampleCount::One,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the usage flags.
    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Set the number of mip levels.
    pub fn with_levels(mut self, num_levels: u32) -> Self {
        self.num_levels = num_levels;
        self
    }

    /// Set the dimensionality and layer count (or depth).
    pub fn with_type(mut self, texture_type: TextureType, layer_count_or_depth: u32) -> Self {
        self.texture_type = texture_type;
        self.layer_count_or_depth = layer_count_or_depth;
        self
    }

    /// Set the multisample count.
    pub fn with_sample_count(mut self, sample_count: SampleCount) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Longest mip chain the dimensions allow, ending at 1x1x1.
    pub fn max_levels(&self) -> u32 {
        let largest = self.width.max(self.height).max(self.volume_depth());
        u32::BITS - largest.leading_zeros()
    }

    /// Width, height and depth (or layer count) of a mip level.
    ///
    /// Array layers are not reduced, only the depth of 3D textures is.
    pub fn level_extent(&self, mip_level: u32) -> (u32, u32, u32) {
        let shrink = |size: u32| size.checked_shr(mip_level).unwrap_or(0).max(1);
        let depth = if self.texture_type == TextureType::D3 {
            shrink(self.layer_count_or_depth)
        } else {
            self.layer_count_or_depth
        };
        (shrink(self.width), shrink(self.height), depth)
    }

    fn volume_depth(&self) -> u32 {
        if self.texture_type == TextureType::D3 {
            self.layer_count_or_depth
        } else {
            1
        }
    }

    /// Size in bytes of the base mip level of one layer.
    pub fn base_level_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * u64::from(self.format.block_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_formats() {
        assert!(TextureFormat::D32Float.is_depth_stencil());
        assert!(!TextureFormat::D32Float.has_stencil());
        assert!(TextureFormat::D24UnormS8Uint.has_stencil());
        assert!(!TextureFormat::R8g8b8a8Unorm.is_depth_stencil());
    }

    #[test]
    fn test_new_2d_defaults() {
        let desc = TextureDescriptor::new_2d(64, 32, TextureFormat::R8g8b8a8Unorm);
        assert_eq!(desc.texture_type, TextureType::D2);
        assert_eq!(desc.usage, TextureUsage::SAMPLER);
        assert_eq!(desc.num_levels, 1);
        assert_eq!(desc.base_level_size(), 64 * 32 * 4);
    }

    #[test]
    fn test_mip_chain_limits() {
        let desc = TextureDescriptor::new_2d(8, 8, TextureFormat::R8Unorm);
        assert_eq!(desc.max_levels(), 4);
        assert_eq!(desc.level_extent(3), (1, 1, 1));
        assert_eq!(desc.level_extent(35), (1, 1, 1));

        let wide = TextureDescriptor::new_2d(1920, 1080, TextureFormat::R8Unorm)
            .with_type(TextureType::D2Array, 6);
        assert_eq!(wide.max_levels(), 11);
        assert_eq!(wide.level_extent(1), (960, 540, 6));

        let volume = TextureDescriptor::new_2d(4, 4, TextureFormat::R8Unorm)
            .with_type(TextureType::D3, 16);
        assert_eq!(volume.max_levels(), 5);
        assert_eq!(volume.level_extent(2), (1, 1, 4));
    }

    #[test]
    fn test_builder_chain() {
        let desc = TextureDescriptor::new_2d(16, 16, TextureFormat::B8g8r8a8Unorm)
            .with_usage(TextureUsage::SAMPLER | TextureUsage::COLOR_TARGET)
            .with_levels(5)
            .with_type(TextureType::D2Array, 4)
            .with_label("atlas");
        assert_eq!(desc.num_levels, 5);
        assert_eq!(desc.layer_count_or_depth, 4);
        assert!(desc.usage.contains(TextureUsage::COLOR_TARGET));
        assert_eq!(desc.label.as_deref(), Some("atlas"));
    }
}
