//! GPU buffer resource.

use std::sync::Arc;

use crate::device::GpuDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::handle::{RawBuffer, ResourceKind};
use crate::resources::retained::{pin, Pinned, Retained};
use crate::types::{BufferDescriptor, BufferUsage};

/// A device-local GPU buffer.
///
/// Buffers are filled through a [`CopyPass`](crate::CopyPass) from a
/// [`TransferBuffer`](crate::TransferBuffer). The native buffer is released
/// once the `Buffer` is dropped and every command buffer that recorded it
/// has been submitted.
///
/// # Example
///
/// ```ignore
/// let buffer = device.create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))?;
/// println!("Buffer size: {}", buffer.size());
/// ```
pub struct Buffer {
    shared: Arc<Retained<RawBuffer>>,
    descriptor: BufferDescriptor,
}

impl Buffer {
    /// Create a new buffer.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] for a zero size and
    /// [`GraphicsError::CreationFailed`] if the backend cannot allocate it.
    pub fn new(device: &Arc<GpuDevice>, descriptor: &BufferDescriptor) -> GraphicsResult<Self> {
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }

        let backend = device.backend();
        let raw = backend.create_buffer(device.raw(), descriptor);
        let handle = device.wrap_native(raw, ResourceKind::Buffer)?;
        if let Some(label) = &descriptor.label {
            backend.set_buffer_name(device.raw(), handle.as_ptr(), label);
        }

        log::trace!(
            "Created buffer {:?}, size={}, usage={:?}",
            descriptor.label,
            descriptor.size,
            descriptor.usage
        );

        Ok(Self {
            shared: Arc::new(Retained::owned(device, handle, descriptor.label.clone())),
            descriptor: descriptor.clone(),
        })
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GpuDevice> {
        self.shared.device()
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u32 {
        self.descriptor.size
    }

    /// Get the usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    pub(crate) fn raw(&self) -> *mut RawBuffer {
        self.shared.raw()
    }

    pub(crate) fn pinned(&self) -> Pinned {
        pin(&self.shared)
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.shared)
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Buffer is Send + Sync
static_assertions::assert_impl_all!(Buffer: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyEvent;
    use crate::test_utils::dummy_device;

    #[test]
    fn test_buffer_debug() {
        let (_, device) = dummy_device();
        let buffer = Buffer::new(&device, &BufferDescriptor::new(1024, BufferUsage::VERTEX)).unwrap();
        let debug = format!("{:?}", buffer);
        assert!(debug.contains("Buffer"));
        assert!(debug.contains("1024"));
    }

    #[test]
    fn test_zero_size_is_rejected_before_the_backend() {
        let (backend, device) = dummy_device();
        let result = Buffer::new(&device, &BufferDescriptor::new(0, BufferUsage::VERTEX));
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
        assert_eq!(backend.live_count(ResourceKind::Buffer), 0);
    }

    #[test]
    fn test_label_is_forwarded_and_drop_releases() {
        let (backend, device) = dummy_device();
        let buffer = Buffer::new(
            &device,
            &BufferDescriptor::new(64, BufferUsage::INDEX).with_label("indices"),
        )
        .unwrap();
        let id = backend.last_created(ResourceKind::Buffer).unwrap();
        assert!(backend.events().contains(&DummyEvent::Named {
            kind: ResourceKind::Buffer,
            id,
            name: "indices".to_string(),
        }));

        drop(buffer);
        assert!(!backend.is_live(id));
        assert!(backend.misuses().is_empty());
    }

    #[test]
    fn test_backend_failure_is_reported() {
        let (backend, device) = dummy_device();
        backend.fail_next(ResourceKind::Buffer, "out of device memory");
        let err = Buffer::new(&device, &BufferDescriptor::new(64, BufferUsage::VERTEX)).unwrap_err();
        assert_eq!(
            err,
            GraphicsError::CreationFailed {
                kind: ResourceKind::Buffer,
                message: "out of device memory".to_string(),
            }
        );
    }
}
