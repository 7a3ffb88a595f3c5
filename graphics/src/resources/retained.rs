//! Native objects shared between a resource and pending command buffers.
//!
//! A resource wrapper keeps its native handle in an [`Arc<Retained<T>>`].
//! Every command buffer that records a reference to the resource pins a
//! clone of that `Arc` until it is submitted, so the native object is only
//! released once both the wrapper and all pending work have let go of it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::device::GpuDevice;
use crate::handle::{
    NativeHandle, RawBuffer, RawDevice, RawGraphicsPipeline, RawSampler, RawTexture,
    RawTransferBuffer, ResourceKind,
};

/// A native object type with a backend release entry point.
pub(crate) trait Releasable: Sized {
    const KIND: ResourceKind;

    fn release(backend: &dyn GpuBackend, device: *mut RawDevice, object: *mut Self);
}

macro_rules! releasable {
    ($($raw:ty => $kind:ident, $release:ident;)*) => {
        $(
            impl Releasable for $raw {
                const KIND: ResourceKind = ResourceKind::$kind;

                fn release(backend: &dyn GpuBackend, device: *mut RawDevice, object: *mut Self) {
                    backend.$release(device, object);
                }
            }
        )*
    };
}

releasable! {
    RawBuffer => Buffer, release_buffer;
    RawTransferBuffer => TransferBuffer, release_transfer_buffer;
    RawTexture => Texture, release_texture;
    RawSampler => Sampler, release_sampler;
    RawGraphicsPipeline => GraphicsPipeline, release_graphics_pipeline;
}

/// Anything a command buffer keeps alive until submission.
pub(crate) type Pinned = Arc<dyn Any + Send + Sync>;

/// Sole owner of one native object.
pub(crate) struct Retained<T: Releasable> {
    device: Arc<GpuDevice>,
    handle: NativeHandle<T>,
    /// `false` for objects lent by the backend, such as swapchain textures.
    owned: bool,
    label: Option<String>,
}

impl<T: Releasable> Retained<T> {
    pub(crate) fn owned(
        device: &Arc<GpuDevice>,
        handle: NativeHandle<T>,
        label: Option<String>,
    ) -> Self {
        Self {
            device: Arc::clone(device),
            handle,
            owned: true,
            label,
        }
    }

    pub(crate) fn borrowed(device: &Arc<GpuDevice>, handle: NativeHandle<T>) -> Self {
        Self {
            device: Arc::clone(device),
            handle,
            owned: false,
            label: None,
        }
    }

    pub(crate) fn device(&self) -> &Arc<GpuDevice> {
        &self.device
    }

    pub(crate) fn raw(&self) -> *mut T {
        self.handle.as_ptr()
    }

    pub(crate) fn is_owned(&self) -> bool {
        self.owned
    }
}

impl<T: Releasable> fmt::Debug for Retained<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.handle, f)
    }
}

impl<T: Releasable> Drop for Retained<T> {
    fn drop(&mut self) {
        let Some(raw) = self.handle.release() else {
            return;
        };
        if self.owned {
            log::trace!("Releasing {} {:?}", T::KIND, self.label);
            T::release(self.device.backend(), self.device.raw(), raw.as_ptr());
        }
    }
}

/// Erase a shared native object so a command buffer can pin it.
pub(crate) fn pin<T: Any + Send + Sync>(object: &Arc<T>) -> Pinned {
    Arc::clone(object) as Pinned
}
