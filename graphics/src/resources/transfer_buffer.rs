//! Host-visible staging buffer.

use std::sync::Arc;

use bytemuck::Pod;

use crate::device::GpuDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::handle::{RawTransferBuffer, ResourceKind};
use crate::resources::retained::{pin, Pinned, Retained};
use crate::types::{TransferBufferDescriptor, TransferBufferUsage};

/// Staging memory used to move data between the host and device-only
/// resources.
///
/// A transfer buffer is either mapped (host may read and write it) or
/// unmapped (the GPU may use it). Mapping twice, unmapping an unmapped
/// buffer, and uploading from a mapped buffer are usage errors.
///
/// # Example
///
/// ```ignore
/// let mut staging = device.create_transfer_buffer(&TransferBufferDescriptor::upload(12))?;
/// staging.write(0, &[1.0f32, 2.0, 3.0])?;
/// cmd.copy_pass(|pass| pass.upload_buffer(&staging, &vertex_buffer))?;
/// ```
pub struct TransferBuffer {
    shared: Arc<Retained<RawTransferBuffer>>,
    descriptor: TransferBufferDescriptor,
    mapped: bool,
}

impl TransferBuffer {
    /// Create a new transfer buffer.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] for a zero size and
    /// [`GraphicsError::CreationFailed`] if the backend cannot allocate it.
    pub fn new(
        device: &Arc<GpuDevice>,
        descriptor: &TransferBufferDescriptor,
    ) -> GraphicsResult<Self> {
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "transfer buffer size cannot be zero".to_string(),
            ));
        }

        let raw = device
            .backend()
            .create_transfer_buffer(device.raw(), descriptor);
        let handle = device.wrap_native(raw, ResourceKind::TransferBuffer)?;

        log::trace!(
            "Created transfer buffer {:?}, size={}, usage={:?}",
            descriptor.label,
            descriptor.size,
            descriptor.usage
        );

        Ok(Self {
            shared: Arc::new(Retained::owned(device, handle, descriptor.label.clone())),
            descriptor: descriptor.clone(),
            mapped: false,
        })
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GpuDevice> {
        self.shared.device()
    }

    /// Size in bytes.
    pub fn size(&self) -> u32 {
        self.descriptor.size
    }

    /// Transfer direction.
    pub fn usage(&self) -> TransferBufferUsage {
        self.descriptor.usage
    }

    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Whether the buffer is currently mapped into host memory.
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Map the whole buffer into host memory.
    ///
    /// With `cycle` set, memory the GPU may still be reading is replaced
    /// instead of overwritten. The buffer stays mapped until
    /// [`TransferBuffer::unmap`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::MapFailed`] if the backend cannot map it.
    pub fn map(&mut self, cycle: bool) -> GraphicsResult<&mut [u8]> {
        gpu_assert!(
            !self.mapped,
            "transfer buffer {:?} is already mapped",
            self.descriptor.label
        );

        let device = self.shared.device();
        let ptr = device
            .backend()
            .map_transfer_buffer(device.raw(), self.shared.raw(), cycle);
        if ptr.is_null() {
            let err = GraphicsError::MapFailed(device.last_error());
            log::error!("{}", err);
            return Err(err);
        }
        self.mapped = true;

        // SAFETY: `GpuBackend` implementors guarantee a non-null mapping
        // addresses `size` writable bytes until unmap or release. Unmapping
        // needs `&mut self`, which the returned slice keeps borrowed, and the
        // native buffer is not released while this wrapper is alive.
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr, self.descriptor.size as usize) })
    }

    /// Unmap the buffer so the GPU may use it.
    pub fn unmap(&mut self) {
        gpu_assert!(
            self.mapped,
            "transfer buffer {:?} is not mapped",
            self.descriptor.label
        );
        let device = self.shared.device();
        device
            .backend()
            .unmap_transfer_buffer(device.raw(), self.shared.raw());
        self.mapped = false;
    }

    /// Copy `length` bytes of `data`, starting at `src_offset`, into the
    /// buffer at `dst_offset`.
    ///
    /// Both ranges are checked before anything is mapped, so an
    /// out-of-range request never copies partially. The buffer is mapped
    /// and unmapped around the copy.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::MapFailed`] if mapping fails, and
    /// [`GraphicsError::InvalidParameter`] for an out-of-range request when
    /// usage checks are compiled out.
    pub fn copy_in(
        &mut self,
        data: &[u8],
        src_offset: usize,
        dst_offset: u32,
        length: u32,
    ) -> GraphicsResult<()> {
        let src_end = src_offset.checked_add(length as usize);
        gpu_assert!(
            src_end.is_some_and(|end| end <= data.len()),
            "source range {}..{}+{} exceeds the {} bytes provided",
            src_offset,
            src_offset,
            length,
            data.len()
        );
        let dst_end = dst_offset.checked_add(length);
        gpu_assert!(
            dst_end.is_some_and(|end| end <= self.descriptor.size),
            "destination range {}..{}+{} exceeds the transfer buffer size {}",
            dst_offset,
            dst_offset,
            length,
            self.descriptor.size
        );

        let source = src_end.and_then(|end| data.get(src_offset..end));
        let (Some(source), Some(dst_end)) = (source, dst_end.filter(|end| *end <= self.size()))
        else {
            return Err(GraphicsError::InvalidParameter(format!(
                "copy of {length} bytes is out of range"
            )));
        };

        let mapped = self.map(false)?;
        mapped[dst_offset as usize..dst_end as usize].copy_from_slice(source);
        self.unmap();
        Ok(())
    }

    /// Copy a slice of plain values into the buffer at `dst_offset`.
    pub fn write<T: Pod>(&mut self, dst_offset: u32, values: &[T]) -> GraphicsResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let length = u32::try_from(bytes.len()).map_err(|_| {
            GraphicsError::InvalidParameter(format!(
                "{} bytes do not fit in a transfer buffer",
                bytes.len()
            ))
        })?;
        self.copy_in(bytes, 0, dst_offset, length)
    }

    pub(crate) fn raw(&self) -> *mut RawTransferBuffer {
        self.shared.raw()
    }

    pub(crate) fn pinned(&self) -> Pinned {
        pin(&self.shared)
    }
}

impl std::fmt::Debug for TransferBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferBuffer")
            .field("handle", &self.shared)
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("mapped", &self.mapped)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

impl Drop for TransferBuffer {
    fn drop(&mut self) {
        if self.mapped {
            log::warn!(
                "Transfer buffer {:?} dropped while mapped, unmapping",
                self.descriptor.label
            );
            self.unmap();
        }
    }
}

static_assertions::assert_impl_all!(TransferBuffer: Send, Sync);
