//! Resource ownership integration tests.
//!
//! # Test Categories
//!
//! - **Shared ownership**: `RefCounted` tears its resource down exactly once
//! - **Pipelines**: a pipeline keeps its shaders alive
//! - **Native handles**: null pointers never produce a wrapper
//! - **Device creation**: shader format negotiation
//! - **Transfer buffers**: range checks happen before any copy

mod common;

use std::ptr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use rstest::rstest;

use common::{Disposable, TestContext};
use ignis_graphics::backend::dummy::DummyEvent;
use ignis_graphics::{
    negotiate_shader_format, BufferDescriptor, BufferUsage, DeviceDescriptor, DummyBackend,
    GpuBackend, GpuDevice, GraphicsError, GraphicsPipelineDescriptor, GraphicsPipelineTargetInfo,
    NativeHandle, RefCounted, ResourceKind, SamplerDescriptor, ShaderFormat, TextureDescriptor,
    TextureFormat, TransferBufferDescriptor, DEFAULT_FORMAT_PRIORITY,
};

// ============================================================================
// Shared Ownership
// ============================================================================

/// Teardown happens exactly once, on the release that balances the last
/// acquire, whatever order the references are released in.
#[rstest]
#[case::single(0, vec![0])]
#[case::in_order(3, vec![0, 1, 2, 3])]
#[case::reversed(3, vec![3, 2, 1, 0])]
#[case::interleaved(4, vec![2, 0, 4, 1, 3])]
fn test_teardown_runs_once_after_last_release(
    #[case] extra_acquires: usize,
    #[case] release_order: Vec<usize>,
) {
    let (resource, teardowns) = Disposable::new();
    let first = RefCounted::new(resource);
    let mut references = vec![first];
    for _ in 0..extra_acquires {
        let reference = references[0].acquire();
        references.push(reference);
    }
    assert_eq!(references[0].reference_count(), extra_acquires + 1);

    for (released, &index) in release_order.iter().enumerate() {
        assert_eq!(teardowns.load(Ordering::SeqCst), 0);
        references[index].release();
        assert!(!references[index].is_set());
        let expected = usize::from(released + 1 == release_order.len());
        assert_eq!(teardowns.load(Ordering::SeqCst), expected);
    }

    // Releasing an already released wrapper is a no-op.
    references[0].release();
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}

#[test]
fn test_set_to_same_resource_keeps_it_alive() {
    let (resource, teardowns) = Disposable::new();
    let mut shared = RefCounted::new(resource);
    let alias = shared.acquire();
    shared.set(&alias);
    drop(alias);
    assert_eq!(teardowns.load(Ordering::SeqCst), 0);
    drop(shared);
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}

#[test]
fn test_references_can_be_released_from_other_threads() {
    let (resource, teardowns) = Disposable::new();
    let shared = RefCounted::new(resource);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let mut reference = shared.acquire();
            std::thread::spawn(move || reference.release())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(shared.reference_count(), 1);
    assert_eq!(teardowns.load(Ordering::SeqCst), 0);
    drop(shared);
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Pipelines
// ============================================================================

#[test]
fn test_pipeline_keeps_shaders_alive() {
    let ctx = TestContext::new();
    let vs = ctx.vertex_shader();
    let vs_id = ctx.backend.last_created(ResourceKind::Shader).unwrap();
    let fs = ctx.fragment_shader();
    let fs_id = ctx.backend.last_created(ResourceKind::Shader).unwrap();

    let pipeline = ctx.pipeline(&vs, &fs);
    drop(vs);
    drop(fs);
    assert!(ctx.backend.is_live(vs_id));
    assert!(ctx.backend.is_live(fs_id));
    assert_eq!(pipeline.vertex_shader().reference_count(), 1);

    drop(pipeline);
    assert!(!ctx.backend.is_live(vs_id));
    assert!(!ctx.backend.is_live(fs_id));
}

#[test]
fn test_dropping_pipeline_spares_shaders_shared_elsewhere() {
    let ctx = TestContext::new();
    let vs = ctx.vertex_shader();
    let fs = ctx.fragment_shader();
    let fs_id = ctx.backend.last_created(ResourceKind::Shader).unwrap();

    let first = ctx.pipeline(&vs, &fs);
    let second = ctx.pipeline(&vs, &fs);
    drop(fs);
    assert_eq!(second.fragment_shader().reference_count(), 2);

    drop(first);
    assert!(ctx.backend.is_live(fs_id));
    assert_eq!(vs.reference_count(), 2);

    drop(second);
    assert!(!ctx.backend.is_live(fs_id));
    assert_eq!(vs.reference_count(), 1);
}

#[test]
fn test_failed_pipeline_takes_no_shader_references() {
    let ctx = TestContext::new();
    let vs = ctx.vertex_shader();
    let fs = ctx.fragment_shader();
    ctx.backend
        .fail_next(ResourceKind::GraphicsPipeline, "pipeline cache full");

    let err = ctx
        .device
        .create_graphics_pipeline(
            &vs,
            &fs,
            &GraphicsPipelineDescriptor::new(GraphicsPipelineTargetInfo::single(
                TextureFormat::B8g8r8a8Unorm,
            )),
        )
        .unwrap_err();
    assert_eq!(
        err,
        GraphicsError::creation_failed(ResourceKind::GraphicsPipeline, "pipeline cache full")
    );
    assert_eq!(vs.reference_count(), 1);
    assert_eq!(fs.reference_count(), 1);
}

// ============================================================================
// Native Handles
// ============================================================================

#[test]
fn test_native_handle_from_non_null_pointer_is_valid() {
    let mut value = 7u32;
    let mut handle =
        NativeHandle::new(&mut value as *mut u32, || GraphicsError::InvalidParameter("null".into()))
            .unwrap();
    assert!(handle.is_valid());
    assert_eq!(handle.as_ptr(), &mut value as *mut u32);
    assert!(handle.release().is_some());
    assert!(!handle.is_valid());
}

#[test]
fn test_native_handle_from_null_pointer_fails_construction() {
    let result = NativeHandle::new(ptr::null_mut::<u32>(), || {
        GraphicsError::creation_failed(ResourceKind::Buffer, "out of memory")
    });
    assert!(matches!(
        result,
        Err(GraphicsError::CreationFailed {
            kind: ResourceKind::Buffer,
            ..
        })
    ));
}

#[rstest]
#[case::buffer(ResourceKind::Buffer)]
#[case::texture(ResourceKind::Texture)]
#[case::sampler(ResourceKind::Sampler)]
#[case::transfer_buffer(ResourceKind::TransferBuffer)]
fn test_creation_failure_carries_backend_message(#[case] kind: ResourceKind) {
    let ctx = TestContext::new();
    ctx.backend.fail_next(kind, "device lost");

    let err = match kind {
        ResourceKind::Buffer => ctx
            .device
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::VERTEX))
            .map(drop),
        ResourceKind::Texture => ctx
            .device
            .create_texture(&TextureDescriptor::new_2d(4, 4, TextureFormat::R8Unorm))
            .map(drop),
        ResourceKind::Sampler => ctx
            .device
            .create_sampler(&SamplerDescriptor::new())
            .map(drop),
        _ => ctx
            .device
            .create_transfer_buffer(&TransferBufferDescriptor::upload(16))
            .map(drop),
    }
    .unwrap_err();

    assert_eq!(err, GraphicsError::creation_failed(kind, "device lost"));
    assert_eq!(ctx.backend.live_count(kind), 0);
}

// ============================================================================
// Device Creation
// ============================================================================

#[test]
fn test_device_selects_first_supported_format_in_priority_order() {
    let backend = DummyBackend::new().with_shader_formats(ShaderFormat::DXIL | ShaderFormat::MSL);
    let device = GpuDevice::new(
        Arc::new(backend),
        &DeviceDescriptor::default().with_format_priority(vec![
            ShaderFormat::DXBC,
            ShaderFormat::DXIL,
            ShaderFormat::MSL,
        ]),
    )
    .unwrap();
    assert_eq!(device.shader_format(), ShaderFormat::DXIL);
}

#[test]
fn test_device_without_supported_formats_fails() {
    let backend = Arc::new(DummyBackend::new().with_shader_formats(ShaderFormat::empty()));
    let err = GpuDevice::new(
        backend.clone() as Arc<dyn GpuBackend>,
        &DeviceDescriptor::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        GraphicsError::CreationFailed {
            kind: ResourceKind::Device,
            ..
        }
    ));
    // The half-built native device was destroyed.
    assert_eq!(backend.live_count(ResourceKind::Device), 0);
}

#[rstest]
#[case::spirv_only(ShaderFormat::SPIRV, Some(ShaderFormat::SPIRV))]
#[case::metal_both(ShaderFormat::MSL | ShaderFormat::METALLIB, Some(ShaderFormat::METALLIB))]
#[case::d3d(ShaderFormat::DXBC | ShaderFormat::DXIL, Some(ShaderFormat::DXBC))]
#[case::private_only(ShaderFormat::PRIVATE, None)]
fn test_default_priority(#[case] supported: ShaderFormat, #[case] expected: Option<ShaderFormat>) {
    assert_eq!(
        negotiate_shader_format(supported, &DEFAULT_FORMAT_PRIORITY),
        expected
    );
}

// ============================================================================
// Transfer Buffers
// ============================================================================

#[test]
fn test_copy_in_within_range_succeeds() {
    let ctx = TestContext::new();
    let mut staging = ctx
        .device
        .create_transfer_buffer(&TransferBufferDescriptor::upload(4))
        .unwrap();
    let id = ctx
        .backend
        .last_created(ResourceKind::TransferBuffer)
        .unwrap();
    staging.copy_in(&[5, 6, 7, 8], 0, 0, 4).unwrap();
    assert_eq!(
        ctx.backend.transfer_buffer_contents(id),
        Some(vec![5, 6, 7, 8])
    );
}

#[rstest]
#[case::source_overrun(2, 0, 3)]
#[case::destination_overrun(0, 2, 3)]
#[case::offset_overflow(usize::MAX, 0, 1)]
#[cfg_attr(not(any(debug_assertions, feature = "strict-checks")), ignore)]
fn test_copy_in_out_of_range_asserts_without_copying(
    #[case] src_offset: usize,
    #[case] dst_offset: u32,
    #[case] length: u32,
) {
    let ctx = TestContext::new();
    let mut staging = ctx
        .device
        .create_transfer_buffer(&TransferBufferDescriptor::upload(4))
        .unwrap();
    let id = ctx
        .backend
        .last_created(ResourceKind::TransferBuffer)
        .unwrap();
    ctx.backend.clear_events();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        staging.copy_in(&[1, 2, 3, 4], src_offset, dst_offset, length)
    }));

    assert!(result.is_err());
    assert!(!staging.is_mapped());
    assert_eq!(ctx.backend.transfer_buffer_contents(id), Some(vec![0; 4]));
    assert!(!ctx
        .backend
        .events()
        .iter()
        .any(|event| matches!(event, DummyEvent::Mapped { .. })));
}
