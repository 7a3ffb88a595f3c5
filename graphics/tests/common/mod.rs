//! Common utilities for integration tests.
//!
//! Every test runs against the in-memory [`DummyBackend`], which validates
//! usage like a strict driver and records what it was asked to do.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use raw_window_handle::{
    HandleError, HasWindowHandle, RawWindowHandle, WebWindowHandle, WindowHandle,
};

use ignis_graphics::{
    DeviceDescriptor, DummyBackend, GpuBackend, GpuDevice, GraphicsPipeline,
    GraphicsPipelineDescriptor, GraphicsPipelineTargetInfo, RefCounted, Shader, ShaderDescriptor,
    Texture, TextureDescriptor, TextureFormat, TextureUsage, Window,
};

/// Install a test logger once per process.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Test Context
// ============================================================================

/// A device on a dummy backend, with the backend kept for inspection.
pub struct TestContext {
    pub backend: Arc<DummyBackend>,
    pub device: Arc<GpuDevice>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_backend(DummyBackend::new())
    }

    pub fn with_backend(backend: DummyBackend) -> Self {
        init_logging();
        let backend = Arc::new(backend);
        let device = GpuDevice::new(
            backend.clone() as Arc<dyn GpuBackend>,
            &DeviceDescriptor::default().with_label("integration"),
        )
        .expect("failed to create dummy device");
        Self { backend, device }
    }

    pub fn vertex_shader(&self) -> RefCounted<Shader> {
        self.device
            .create_shader(&ShaderDescriptor::vertex(&[0x03, 0x02, 0x23, 0x07], "main"))
            .expect("failed to create vertex shader")
    }

    pub fn fragment_shader(&self) -> RefCounted<Shader> {
        self.device
            .create_shader(
                &ShaderDescriptor::fragment(&[0x03, 0x02, 0x23, 0x07], "main")
                    .with_resources(1, 0, 0, 1),
            )
            .expect("failed to create fragment shader")
    }

    pub fn pipeline(
        &self,
        vertex_shader: &RefCounted<Shader>,
        fragment_shader: &RefCounted<Shader>,
    ) -> GraphicsPipeline {
        self.device
            .create_graphics_pipeline(
                vertex_shader,
                fragment_shader,
                &GraphicsPipelineDescriptor::new(GraphicsPipelineTargetInfo::single(
                    TextureFormat::B8g8r8a8Unorm,
                ))
                .with_label("triangle"),
            )
            .expect("failed to create pipeline")
    }

    pub fn color_target(&self, width: u32, height: u32) -> Texture {
        self.device
            .create_texture(
                &TextureDescriptor::new_2d(width, height, TextureFormat::B8g8r8a8Unorm)
                    .with_usage(TextureUsage::COLOR_TARGET | TextureUsage::SAMPLER),
            )
            .expect("failed to create color target")
    }
}

// ============================================================================
// Test Window
// ============================================================================

/// A fake platform window identified by a web canvas id.
pub struct TestWindow {
    pub id: u32,
    pub size: (u32, u32),
}

impl TestWindow {
    pub fn new(id: u32, width: u32, height: u32) -> Self {
        Self {
            id,
            size: (width, height),
        }
    }
}

impl HasWindowHandle for TestWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        let raw = RawWindowHandle::Web(WebWindowHandle::new(self.id));
        // SAFETY: a web handle is a plain id that stays valid for as long as
        // the window value it was built from.
        Ok(unsafe { WindowHandle::borrow_raw(raw) })
    }
}

impl Window for TestWindow {
    fn drawable_size(&self) -> (u32, u32) {
        self.size
    }
}

// ============================================================================
// Mock Disposable
// ============================================================================

/// Counts how many times it has been torn down.
pub struct Disposable {
    teardowns: Arc<AtomicUsize>,
}

impl Disposable {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let teardowns = Arc::new(AtomicUsize::new(0));
        (
            Self {
                teardowns: Arc::clone(&teardowns),
            },
            teardowns,
        )
    }
}

impl Drop for Disposable {
    fn drop(&mut self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}
