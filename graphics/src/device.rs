//! Graphics device.
//!
//! The [`GpuDevice`] owns the native device context and is the entry point
//! for creating GPU resources. Every resource keeps an `Arc` to the device it
//! was created from, so the device outlives all of them.

use std::fmt;
use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::command::CommandBuffer;
use crate::error::{non_empty, GraphicsError, GraphicsResult};
use crate::handle::{NativeHandle, RawDevice, ResourceKind};
use crate::ref_counted::RefCounted;
use crate::resources::{Buffer, GraphicsPipeline, Sampler, Shader, Texture, TransferBuffer};
use crate::types::{
    BufferDescriptor, GraphicsPipelineDescriptor, SamplerDescriptor, ShaderDescriptor,
    ShaderFormat, TextureDescriptor, TextureFormat, TransferBufferDescriptor,
};
use crate::window::Window;

/// Shader format preference used when none is configured.
///
/// Binary intermediate representations come first, source text last.
pub const DEFAULT_FORMAT_PRIORITY: [ShaderFormat; 5] = [
    ShaderFormat::SPIRV,
    ShaderFormat::DXBC,
    ShaderFormat::DXIL,
    ShaderFormat::METALLIB,
    ShaderFormat::MSL,
];

/// Pick the first format in `priority` that the device supports.
///
/// Returns `None` when none of the preferred formats is supported.
pub fn negotiate_shader_format(
    supported: ShaderFormat,
    priority: &[ShaderFormat],
) -> Option<ShaderFormat> {
    priority
        .iter()
        .copied()
        .find(|format| !format.is_empty() && supported.contains(*format))
}

/// Configuration for creating a [`GpuDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Enable backend validation.
    pub debug_mode: bool,
    /// Force a specific backend driver.
    pub driver_name: Option<String>,
    /// Shader formats the application is able to supply.
    pub requested_formats: ShaderFormat,
    /// Order in which supported formats are preferred.
    pub format_priority: Vec<ShaderFormat>,
    /// Debug label, used in log messages.
    pub label: Option<String>,
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self {
            debug_mode: cfg!(debug_assertions),
            driver_name: None,
            requested_formats: DEFAULT_FORMAT_PRIORITY
                .iter()
                .fold(ShaderFormat::empty(), |acc, f| acc | *f),
            format_priority: DEFAULT_FORMAT_PRIORITY.to_vec(),
            label: None,
        }
    }
}

impl DeviceDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    pub fn with_driver(mut self, name: impl Into<String>) -> Self {
        self.driver_name = Some(name.into());
        self
    }

    pub fn with_requested_formats(mut self, formats: ShaderFormat) -> Self {
        self.requested_formats = formats;
        self
    }

    pub fn with_format_priority(mut self, priority: impl Into<Vec<ShaderFormat>>) -> Self {
        self.format_priority = priority.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A GPU device for creating resources and acquiring command buffers.
///
/// The shader format is negotiated once at creation and fixed for the
/// device's lifetime. All shaders created against the device must be
/// supplied in that format.
///
/// # Example
///
/// ```ignore
/// let backend = Arc::new(DummyBackend::new());
/// let device = GpuDevice::new(backend, &DeviceDescriptor::default())?;
///
/// let buffer = device.create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))?;
/// let mut cmd = device.acquire_command_buffer()?;
/// cmd.submit()?;
/// ```
pub struct GpuDevice {
    backend: Arc<dyn GpuBackend>,
    handle: NativeHandle<RawDevice>,
    shader_format: ShaderFormat,
    debug_mode: bool,
    label: Option<String>,
}

impl GpuDevice {
    /// Create a device and negotiate its shader format.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::CreationFailed`] if the backend cannot
    /// create a device, or if the device supports none of the formats in
    /// the descriptor's priority list.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        descriptor: &DeviceDescriptor,
    ) -> GraphicsResult<Arc<Self>> {
        let raw = backend.create_device(
            descriptor.requested_formats,
            descriptor.debug_mode,
            descriptor.driver_name.as_deref(),
        );
        let mut handle = NativeHandle::new(raw, || {
            GraphicsError::creation_failed(ResourceKind::Device, backend.last_error())
        })
        .inspect_err(|e| log::error!("{}", e))?;

        let supported = backend.shader_formats(handle.as_ptr());
        let Some(shader_format) = negotiate_shader_format(supported, &descriptor.format_priority)
        else {
            if let Some(raw) = handle.release() {
                backend.destroy_device(raw.as_ptr());
            }
            let err = GraphicsError::creation_failed(
                ResourceKind::Device,
                "no supported shader formats found for device",
            );
            log::error!("{} (backend supports {:?})", err, supported);
            return Err(err);
        };

        log::debug!(
            "Created device {:?} on {} backend: shader format {} (supported: {:?}, debug: {})",
            descriptor.label,
            backend.name(),
            shader_format.name(),
            supported,
            descriptor.debug_mode
        );

        Ok(Arc::new(Self {
            backend,
            handle,
            shader_format,
            debug_mode: descriptor.debug_mode,
            label: descriptor.label.clone(),
        }))
    }

    /// The shader format every shader for this device must use.
    pub fn shader_format(&self) -> ShaderFormat {
        self.shader_format
    }

    /// Whether backend validation was requested.
    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Name of the backend driving this device.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub(crate) fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    pub(crate) fn raw(&self) -> *mut RawDevice {
        self.handle.as_ptr()
    }

    /// Wrap a pointer returned by a native constructor, turning null into a
    /// logged creation failure.
    pub(crate) fn wrap_native<T>(
        &self,
        ptr: *mut T,
        kind: ResourceKind,
    ) -> GraphicsResult<NativeHandle<T>> {
        NativeHandle::new(ptr, || {
            GraphicsError::creation_failed(kind, self.backend.last_error())
        })
        .inspect_err(|e| log::error!("{}", e))
    }

    /// The backend's last error, never empty.
    pub(crate) fn last_error(&self) -> String {
        non_empty(self.backend.last_error())
    }

    /// Block until the GPU has finished all submitted work.
    pub fn wait_for_idle(&self) -> GraphicsResult<()> {
        if self.backend.wait_for_idle(self.raw()) {
            Ok(())
        } else {
            Err(GraphicsError::WaitFailed(self.last_error()))
        }
    }

    /// Take over presentation for a window.
    pub fn claim_window<W: Window + ?Sized>(&self, window: &W) -> GraphicsResult<()> {
        let raw = window.window_handle()?.as_raw();
        if !self.backend.claim_window(self.raw(), raw) {
            let err = GraphicsError::WindowClaimFailed(self.last_error());
            log::error!("{}", err);
            return Err(err);
        }
        log::debug!("Claimed window for device {:?}", self.label);
        Ok(())
    }

    /// Give back a window claimed with [`GpuDevice::claim_window`].
    pub fn release_window<W: Window + ?Sized>(&self, window: &W) -> GraphicsResult<()> {
        let raw = window.window_handle()?.as_raw();
        self.backend.release_window(self.raw(), raw);
        Ok(())
    }

    /// Pixel format of the window's swapchain textures.
    ///
    /// [`TextureFormat::Invalid`] if the window has not been claimed.
    pub fn swapchain_texture_format<W: Window + ?Sized>(
        &self,
        window: &W,
    ) -> GraphicsResult<TextureFormat> {
        let raw = window.window_handle()?.as_raw();
        Ok(self.backend.swapchain_texture_format(self.raw(), raw))
    }

    /// Acquire a command buffer to record work into.
    pub fn acquire_command_buffer(self: &Arc<Self>) -> GraphicsResult<CommandBuffer> {
        CommandBuffer::new(self)
    }

    /// Create a device-local buffer.
    pub fn create_buffer(self: &Arc<Self>, descriptor: &BufferDescriptor) -> GraphicsResult<Buffer> {
        Buffer::new(self, descriptor)
    }

    /// Create a host-visible staging buffer.
    pub fn create_transfer_buffer(
        self: &Arc<Self>,
        descriptor: &TransferBufferDescriptor,
    ) -> GraphicsResult<TransferBuffer> {
        TransferBuffer::new(self, descriptor)
    }

    /// Create a texture owned by the application.
    pub fn create_texture(
        self: &Arc<Self>,
        descriptor: &TextureDescriptor,
    ) -> GraphicsResult<Texture> {
        Texture::new(self, descriptor)
    }

    /// Create a sampler.
    pub fn create_sampler(
        self: &Arc<Self>,
        descriptor: &SamplerDescriptor,
    ) -> GraphicsResult<Sampler> {
        Sampler::new(self, descriptor)
    }

    /// Wrap a precompiled shader, ready to be shared between pipelines.
    pub fn create_shader(
        self: &Arc<Self>,
        descriptor: &ShaderDescriptor<'_>,
    ) -> GraphicsResult<RefCounted<Shader>> {
        Shader::new(self, descriptor).map(RefCounted::new)
    }

    /// Create a graphics pipeline sharing ownership of both shaders.
    pub fn create_graphics_pipeline(
        self: &Arc<Self>,
        vertex_shader: &RefCounted<Shader>,
        fragment_shader: &RefCounted<Shader>,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> GraphicsResult<GraphicsPipeline> {
        GraphicsPipeline::new(self, vertex_shader, fragment_shader, descriptor)
    }
}

impl fmt::Debug for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuDevice")
            .field("backend", &self.backend.name())
            .field("handle", &self.handle)
            .field("shader_format", &self.shader_format)
            .field("debug_mode", &self.debug_mode)
            .field("label", &self.label)
            .finish()
    }
}

impl Drop for GpuDevice {
    fn drop(&mut self) {
        if let Some(raw) = self.handle.release() {
            log::debug!("Destroying device {:?}", self.label);
            self.backend.destroy_device(raw.as_ptr());
        }
    }
}

static_assertions::assert_impl_all!(GpuDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;

    #[test]
    fn test_negotiation_follows_priority() {
        let priority = [ShaderFormat::DXBC, ShaderFormat::DXIL, ShaderFormat::MSL];
        assert_eq!(
            negotiate_shader_format(ShaderFormat::DXIL | ShaderFormat::MSL, &priority),
            Some(ShaderFormat::DXIL)
        );
        assert_eq!(negotiate_shader_format(ShaderFormat::empty(), &priority), None);
        assert_eq!(negotiate_shader_format(ShaderFormat::PRIVATE, &priority), None);
    }

    #[test]
    fn test_default_priority_puts_source_text_last() {
        assert_eq!(DEFAULT_FORMAT_PRIORITY[0], ShaderFormat::SPIRV);
        assert_eq!(DEFAULT_FORMAT_PRIORITY[4], ShaderFormat::MSL);
        assert_eq!(
            negotiate_shader_format(
                ShaderFormat::MSL | ShaderFormat::METALLIB,
                &DEFAULT_FORMAT_PRIORITY
            ),
            Some(ShaderFormat::METALLIB)
        );
    }

    #[test]
    fn test_descriptor_requests_every_prioritized_format() {
        let desc = DeviceDescriptor::default();
        for format in &desc.format_priority {
            assert!(desc.requested_formats.contains(*format));
        }
    }

    #[test]
    fn test_device_reports_backend_name() {
        let device = GpuDevice::new(Arc::new(DummyBackend::new()), &DeviceDescriptor::default())
            .unwrap();
        assert_eq!(device.backend_name(), "Dummy Backend");
        assert_eq!(device.shader_format(), ShaderFormat::SPIRV);
    }
}
