//! Shared ownership of GPU resources.
//!
//! A shader is typically used by several pipelines, and a buffer may be
//! referenced by several frames' worth of work. [`RefCounted`] lets each user
//! hold its own reference. The resource is torn down (its `Drop` runs, which
//! releases the native handle) exactly once, synchronously, on the thread
//! that releases the last reference.
//!
//! The count lives in an [`Arc`], so acquire and release are atomic and a
//! `RefCounted<T>` is `Send + Sync` whenever `T` is.
//!
//! # Example
//!
//! ```ignore
//! let shader = RefCounted::new(device.create_shader(&vertex_desc)?);
//! let pipeline_a = GraphicsPipeline::new(&device, &shader, &fragment, &state_a)?;
//! let pipeline_b = GraphicsPipeline::new(&device, &shader, &fragment, &state_b)?;
//! drop(shader); // still alive, both pipelines hold a reference
//! ```

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A counted reference to a shared resource, or nothing.
///
/// Every reference obtained through [`RefCounted::new`], [`RefCounted::acquire`]
/// or [`Clone`] is given back exactly once, either by [`RefCounted::release`]
/// or by dropping the wrapper. Accessing the resource through an empty
/// wrapper is a programming error and panics.
pub struct RefCounted<T> {
    inner: Option<Arc<T>>,
}

impl<T> RefCounted<T> {
    /// Take the first reference to a freshly created resource.
    pub fn new(resource: T) -> Self {
        Self {
            inner: Some(Arc::new(resource)),
        }
    }

    /// A wrapper that holds no resource.
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Take another reference to the same resource.
    ///
    /// Acquiring from an empty wrapper yields another empty wrapper.
    pub fn acquire(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }

    /// Give this reference back.
    ///
    /// If it was the last one, the resource is torn down before this returns.
    /// Afterwards the wrapper is empty; releasing an empty wrapper does nothing.
    pub fn release(&mut self) {
        if let Some(resource) = self.inner.take() {
            if Arc::strong_count(&resource) == 1 {
                log::trace!(
                    "RefCounted: releasing last reference to {}",
                    std::any::type_name::<T>()
                );
            }
            drop(resource);
        }
    }

    /// Point this wrapper at the resource held by `other`.
    ///
    /// The new reference is acquired before the old one is released, so
    /// re-setting a wrapper to the resource it already holds never tears it
    /// down.
    pub fn set(&mut self, other: &RefCounted<T>) {
        let acquired = other.inner.clone();
        let previous = std::mem::replace(&mut self.inner, acquired);
        drop(previous);
    }

    /// Replace the held reference with the first reference to a new resource.
    pub fn replace(&mut self, resource: T) {
        self.set(&RefCounted::new(resource));
    }

    /// Whether the wrapper currently holds a resource.
    pub fn is_set(&self) -> bool {
        self.inner.is_some()
    }

    /// Number of live references to the held resource, or 0 when empty.
    pub fn reference_count(&self) -> usize {
        self.inner.as_ref().map_or(0, Arc::strong_count)
    }

    /// The held resource.
    ///
    /// # Panics
    ///
    /// Panics if the wrapper is empty.
    #[track_caller]
    pub fn get(&self) -> &T {
        match &self.inner {
            Some(resource) => resource,
            None => crate::debug::assertion_failed(format_args!(
                "access to an empty RefCounted<{}>",
                std::any::type_name::<T>()
            )),
        }
    }

    /// The held resource, if any.
    pub fn try_get(&self) -> Option<&T> {
        self.inner.as_deref()
    }

    /// Whether two wrappers reference the same resource instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        match (&a.inner, &b.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T> Clone for RefCounted<T> {
    fn clone(&self) -> Self {
        self.acquire()
    }
}

impl<T> Default for RefCounted<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<T> for RefCounted<T> {
    fn from(resource: T) -> Self {
        Self::new(resource)
    }
}

impl<T> Deref for RefCounted<T> {
    type Target = T;

    #[track_caller]
    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T: fmt::Debug> fmt::Debug for RefCounted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(resource) => f
                .debug_struct("RefCounted")
                .field("references", &Arc::strong_count(resource))
                .field("resource", resource)
                .finish(),
            None => f.write_str("RefCounted(empty)"),
        }
    }
}

static_assertions::assert_impl_all!(RefCounted<u32>: Send, Sync);
