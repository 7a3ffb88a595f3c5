//! Window collaborator.
//!
//! The graphics layer does not create windows or poll events. It only needs a
//! native handle to present to and the current drawable size, which any
//! windowing library can provide through [`Window`].

use raw_window_handle::HasWindowHandle;

/// A platform window the device can present to.
pub trait Window: HasWindowHandle {
    /// Current size of the drawable area in physical pixels.
    fn drawable_size(&self) -> (u32, u32);
}

#[cfg(feature = "winit")]
impl Window for winit::window::Window {
    fn drawable_size(&self) -> (u32, u32) {
        let size = self.inner_size();
        (size.width, size.height)
    }
}

impl<W: Window + ?Sized> Window for &W {
    fn drawable_size(&self) -> (u32, u32) {
        (**self).drawable_size()
    }
}
