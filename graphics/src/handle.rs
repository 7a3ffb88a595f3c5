//! Native handle wrapper.
//!
//! Backends hand out raw pointers to opaque native objects. [`NativeHandle`]
//! is the only place those pointers are stored: it refuses null at
//! construction, so a live handle always refers to an object the backend
//! created. It does not free anything itself. The resource that owns the
//! handle calls the backend's release entry point and then clears it.

use std::fmt;
use std::marker::{PhantomData, PhantomPinned};
use std::ptr::{self, NonNull};

macro_rules! opaque_native_types {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[repr(C)]
            pub struct $name {
                _data: [u8; 0],
                _marker: PhantomData<(*mut u8, PhantomPinned)>,
            }
        )*
    };
}

opaque_native_types! {
    /// Native GPU device.
    RawDevice;
    /// Native device-local buffer.
    RawBuffer;
    /// Native host-visible staging buffer.
    RawTransferBuffer;
    /// Native texture.
    RawTexture;
    /// Native sampler.
    RawSampler;
    /// Native shader module.
    RawShader;
    /// Native graphics pipeline.
    RawGraphicsPipeline;
    /// Native command buffer.
    RawCommandBuffer;
    /// Native render pass encoder.
    RawRenderPass;
    /// Native copy pass encoder.
    RawCopyPass;
}

/// Kind of native object, used in errors and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Device,
    Buffer,
    TransferBuffer,
    Texture,
    Sampler,
    Shader,
    GraphicsPipeline,
    CommandBuffer,
    RenderPass,
    CopyPass,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Device => "device",
            Self::Buffer => "buffer",
            Self::TransferBuffer => "transfer buffer",
            Self::Texture => "texture",
            Self::Sampler => "sampler",
            Self::Shader => "shader",
            Self::GraphicsPipeline => "graphics pipeline",
            Self::CommandBuffer => "command buffer",
            Self::RenderPass => "render pass",
            Self::CopyPass => "copy pass",
        };
        f.write_str(name)
    }
}

/// Non-owning wrapper around one native pointer.
///
/// A handle is valid from construction until [`NativeHandle::release`] is
/// called. Passing an invalid handle to the backend is a programming error.
pub struct NativeHandle<T> {
    ptr: Option<NonNull<T>>,
}

impl<T> NativeHandle<T> {
    /// Wrap a pointer returned by a native constructor.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `on_null` if the pointer is null; no
    /// handle is created in that case.
    pub fn new<E>(ptr: *mut T, on_null: impl FnOnce() -> E) -> Result<Self, E> {
        match NonNull::new(ptr) {
            Some(ptr) => Ok(Self { ptr: Some(ptr) }),
            None => Err(on_null()),
        }
    }

    /// Whether the handle still refers to a native object.
    pub fn is_valid(&self) -> bool {
        self.ptr.is_some()
    }

    /// The raw pointer, for passing to a native call.
    pub fn as_ptr(&self) -> *mut T {
        gpu_assert!(self.ptr.is_some(), "native handle used after release");
        self.ptr.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// Clear the handle without freeing the native object.
    ///
    /// Returns the pointer that was held so ownership can be handed to
    /// whoever tears the object down.
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.ptr.take()
    }
}

impl<T> fmt::Debug for NativeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ptr {
            Some(ptr) => write!(f, "NativeHandle({:p})", ptr),
            None => f.write_str("NativeHandle(released)"),
        }
    }
}

// SAFETY: the handle never dereferences the pointer. It is an opaque token
// that is only ever passed back to a `GpuBackend`, and backends are required
// to be `Send + Sync`.
unsafe impl<T> Send for NativeHandle<T> {}
unsafe impl<T> Sync for NativeHandle<T> {}
