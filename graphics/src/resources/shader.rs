//! Precompiled shader resource.

use std::ffi::CString;
use std::sync::Arc;

use crate::backend::ShaderCreateInfo;
use crate::device::GpuDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::handle::{NativeHandle, RawShader, ResourceKind};
use crate::types::{ShaderDescriptor, ShaderFormat, ShaderStage};

/// A shader blob uploaded to the device.
///
/// The code must already be in the device's negotiated
/// [`ShaderFormat`]. Shaders are usually shared between pipelines through
/// [`RefCounted`](crate::RefCounted), which [`GpuDevice::create_shader`]
/// returns directly.
pub struct Shader {
    device: Arc<GpuDevice>,
    handle: NativeHandle<RawShader>,
    stage: ShaderStage,
    entry_point: String,
    format: ShaderFormat,
    num_samplers: u32,
    num_storage_textures: u32,
    num_storage_buffers: u32,
    num_uniform_buffers: u32,
}

impl Shader {
    /// Upload a precompiled shader in the device's shader format.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the code is empty or
    /// the entry point contains a NUL byte, and
    /// [`GraphicsError::CreationFailed`] if the backend rejects the blob.
    pub fn new(device: &Arc<GpuDevice>, descriptor: &ShaderDescriptor<'_>) -> GraphicsResult<Self> {
        if descriptor.code.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "shader code is empty".to_string(),
            ));
        }
        let entry_point = CString::new(descriptor.entry_point).map_err(|_| {
            GraphicsError::InvalidParameter(format!(
                "shader entry point {:?} contains a NUL byte",
                descriptor.entry_point
            ))
        })?;

        let format = device.shader_format();
        let info = ShaderCreateInfo {
            code: descriptor.code,
            entry_point: &entry_point,
            format,
            stage: descriptor.stage,
            num_samplers: descriptor.num_samplers,
            num_storage_textures: descriptor.num_storage_textures,
            num_storage_buffers: descriptor.num_storage_buffers,
            num_uniform_buffers: descriptor.num_uniform_buffers,
        };
        let raw = device.backend().create_shader(device.raw(), &info);
        let handle = device.wrap_native(raw, ResourceKind::Shader)?;

        log::trace!(
            "Created {:?} shader '{}' ({} bytes of {})",
            descriptor.stage,
            descriptor.entry_point,
            descriptor.code.len(),
            format.name()
        );

        Ok(Self {
            device: Arc::clone(device),
            handle,
            stage: descriptor.stage,
            entry_point: descriptor.entry_point.to_string(),
            format,
            num_samplers: descriptor.num_samplers,
            num_storage_textures: descriptor.num_storage_textures,
            num_storage_buffers: descriptor.num_storage_buffers,
            num_uniform_buffers: descriptor.num_uniform_buffers,
        })
    }

    pub fn device(&self) -> &Arc<GpuDevice> {
        &self.device
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Encoding of the uploaded code.
    pub fn format(&self) -> ShaderFormat {
        self.format
    }

    pub fn num_samplers(&self) -> u32 {
        self.num_samplers
    }

    pub fn num_storage_textures(&self) -> u32 {
        self.num_storage_textures
    }

    pub fn num_storage_buffers(&self) -> u32 {
        self.num_storage_buffers
    }

    pub fn num_uniform_buffers(&self) -> u32 {
        self.num_uniform_buffers
    }

    pub(crate) fn raw(&self) -> *mut RawShader {
        self.handle.as_ptr()
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("handle", &self.handle)
            .field("stage", &self.stage)
            .field("entry_point", &self.entry_point)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        if let Some(raw) = self.handle.release() {
            log::trace!("Releasing {:?} shader '{}'", self.stage, self.entry_point);
            self.device
                .backend()
                .release_shader(self.device.raw(), raw.as_ptr());
        }
    }
}

static_assertions::assert_impl_all!(Shader: Send, Sync);
