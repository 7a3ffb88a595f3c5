//! GPU texture resource.

use std::sync::Arc;

use crate::device::GpuDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::handle::{NativeHandle, RawTexture, ResourceKind};
use crate::resources::retained::{pin, Pinned, Retained};
use crate::types::{
    SampleCount, TextureDescriptor, TextureFormat, TextureType, TextureUsage,
};

/// A GPU texture.
///
/// Most textures are created by [`GpuDevice::create_texture`] and owned by
/// the application. Swapchain textures come from
/// [`CommandBuffer::wait_and_acquire_swapchain_texture`] instead; they
/// belong to the presentation surface and dropping the wrapper leaves them
/// alone.
///
/// [`CommandBuffer::wait_and_acquire_swapchain_texture`]: crate::CommandBuffer::wait_and_acquire_swapchain_texture
///
/// # Example
///
/// ```ignore
/// let texture = device.create_texture(
///     &TextureDescriptor::new_2d(1920, 1080, TextureFormat::R8g8b8a8Unorm)
///         .with_usage(TextureUsage::SAMPLER | TextureUsage::COLOR_TARGET),
/// )?;
/// println!("Texture size: {}x{}", texture.width(), texture.height());
/// ```
pub struct Texture {
    shared: Arc<Retained<RawTexture>>,
    descriptor: TextureDescriptor,
}

impl Texture {
    /// Create a texture owned by this wrapper.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] for zero dimensions, more
    /// mip levels than the dimensions allow, or an invalid format. Returns
    /// [`GraphicsError::CreationFailed`] if the backend refuses the texture.
    pub fn new(device: &Arc<GpuDevice>, descriptor: &TextureDescriptor) -> GraphicsResult<Self> {
        if descriptor.width == 0
            || descriptor.height == 0
            || descriptor.layer_count_or_depth == 0
            || descriptor.num_levels == 0
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture dimensions must be non-zero, got {}x{}x{} with {} levels",
                descriptor.width,
                descriptor.height,
                descriptor.layer_count_or_depth,
                descriptor.num_levels
            )));
        }
        if descriptor.num_levels > descriptor.max_levels() {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} mip levels requested but a {}x{}x{} texture has at most {}",
                descriptor.num_levels,
                descriptor.width,
                descriptor.height,
                descriptor.layer_count_or_depth,
                descriptor.max_levels()
            )));
        }
        if descriptor.format == TextureFormat::Invalid {
            return Err(GraphicsError::InvalidParameter(
                "texture format cannot be Invalid".to_string(),
            ));
        }

        let backend = device.backend();
        let raw = backend.create_texture(device.raw(), descriptor);
        let handle = device.wrap_native(raw, ResourceKind::Texture)?;
        if let Some(label) = &descriptor.label {
            backend.set_texture_name(device.raw(), handle.as_ptr(), label);
        }

        log::trace!(
            "Created texture {:?} ({}x{}x{}, {:?})",
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.layer_count_or_depth,
            descriptor.format
        );

        Ok(Self {
            shared: Arc::new(Retained::owned(device, handle, descriptor.label.clone())),
            descriptor: descriptor.clone(),
        })
    }

    /// Wrap a swapchain texture lent for the current frame.
    pub(crate) fn borrowed(
        device: &Arc<GpuDevice>,
        handle: NativeHandle<RawTexture>,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Self {
        Self {
            shared: Arc::new(Retained::borrowed(device, handle)),
            descriptor: TextureDescriptor::new_2d(width, height, format)
                .with_usage(TextureUsage::COLOR_TARGET),
        }
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GpuDevice> {
        self.shared.device()
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Get the texture width.
    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    /// Get the texture height.
    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    /// Array layer count, or depth for 3D textures.
    pub fn layer_count_or_depth(&self) -> u32 {
        self.descriptor.layer_count_or_depth
    }

    /// Get the mip level count.
    pub fn num_levels(&self) -> u32 {
        self.descriptor.num_levels
    }

    /// Get the texture format.
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    pub fn texture_type(&self) -> TextureType {
        self.descriptor.texture_type
    }

    pub fn usage(&self) -> TextureUsage {
        self.descriptor.usage
    }

    pub fn sample_count(&self) -> SampleCount {
        self.descriptor.sample_count
    }

    /// Get the texture label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Whether dropping this wrapper destroys the native texture.
    ///
    /// `false` for swapchain textures.
    pub fn owns_data(&self) -> bool {
        self.shared.is_owned()
    }

    /// Width, height and depth (or layer count) of a mip level.
    pub fn level_extent(&self, mip_level: u32) -> (u32, u32, u32) {
        self.descriptor.level_extent(mip_level)
    }

    pub(crate) fn raw(&self) -> *mut RawTexture {
        self.shared.raw()
    }

    pub(crate) fn pinned(&self) -> Pinned {
        pin(&self.shared)
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.shared)
            .field("width", &self.descriptor.width)
            .field("height", &self.descriptor.height)
            .field("format", &self.descriptor.format)
            .field("usage", &self.descriptor.usage)
            .field("owned", &self.shared.is_owned())
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Texture is Send + Sync
static_assertions::assert_impl_all!(Texture: Send, Sync);
