use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ignis_graphics::{
    BufferDescriptor, BufferUsage, Color, ColorTargetInfo, DeviceDescriptor, DummyBackend, GpuDevice,
    GraphicsPipelineDescriptor, GraphicsPipelineTargetInfo, RefCounted, ShaderDescriptor,
    TextureDescriptor, TextureFormat, TextureUsage, TransferBufferDescriptor, Viewport,
};

fn dummy_device() -> Arc<GpuDevice> {
    let _ = env_logger::builder().is_test(true).try_init();
    GpuDevice::new(Arc::new(DummyBackend::new()), &DeviceDescriptor::default())
        .expect("dummy device")
}

// ---------------------------------------------------------------------------
// Shared ownership
// ---------------------------------------------------------------------------

fn bench_ref_counted(c: &mut Criterion) {
    let shared = RefCounted::new([0u8; 64]);

    c.bench_function("ref_counted_acquire_release", |b| {
        b.iter(|| {
            let mut reference = black_box(&shared).acquire();
            reference.release();
        });
    });

    c.bench_function("ref_counted_acquire_release_16", |b| {
        b.iter(|| {
            let mut references: Vec<_> = (0..16).map(|_| shared.acquire()).collect();
            for reference in references.iter_mut().rev() {
                reference.release();
            }
            black_box(&references);
        });
    });
}

// ---------------------------------------------------------------------------
// Command recording
// ---------------------------------------------------------------------------

fn bench_render_pass_recording(c: &mut Criterion) {
    let device = dummy_device();
    let vs = device
        .create_shader(&ShaderDescriptor::vertex(b"vert", "main"))
        .expect("vertex shader");
    let fs = device
        .create_shader(&ShaderDescriptor::fragment(b"frag", "main"))
        .expect("fragment shader");
    let pipeline = device
        .create_graphics_pipeline(
            &vs,
            &fs,
            &GraphicsPipelineDescriptor::new(GraphicsPipelineTargetInfo::single(
                TextureFormat::B8g8r8a8Unorm,
            )),
        )
        .expect("pipeline");
    let target = device
        .create_texture(
            &TextureDescriptor::new_2d(256, 256, TextureFormat::B8g8r8a8Unorm)
                .with_usage(TextureUsage::COLOR_TARGET),
        )
        .expect("color target");
    let vertices = device
        .create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))
        .expect("vertex buffer");

    c.bench_function("record_render_pass_64_draws", |b| {
        b.iter(|| {
            let mut cmd = device.acquire_command_buffer().expect("command buffer");
            cmd.render_pass(
                &[ColorTargetInfo::clear(&target, Color::BLACK)],
                None,
                |pass| {
                    pass.bind_graphics_pipeline(&pipeline);
                    pass.set_viewport(&Viewport::from_dimensions(256, 256));
                    pass.bind_vertex_buffer(0, &vertices, 0);
                    for i in 0..64 {
                        pass.draw_primitives(3, i * 3);
                    }
                },
            )
            .expect("render pass");
            cmd.submit().expect("submit");
        });
    });
}

fn bench_staged_upload(c: &mut Criterion) {
    let device = dummy_device();
    let data = vec![0xABu8; 4096];
    let mut staging = device
        .create_transfer_buffer(&TransferBufferDescriptor::upload(4096))
        .expect("transfer buffer");
    let target = device
        .create_buffer(&BufferDescriptor::new(4096, BufferUsage::VERTEX))
        .expect("buffer");

    c.bench_function("staged_upload_4k", |b| {
        b.iter(|| {
            staging
                .copy_in(black_box(&data), 0, 0, 4096)
                .expect("copy in");
            let mut cmd = device.acquire_command_buffer().expect("command buffer");
            cmd.copy_pass(|pass| pass.upload_buffer(&staging, &target))
                .expect("copy pass");
            cmd.submit().expect("submit");
        });
    });
}

criterion_group!(
    benches,
    bench_ref_counted,
    bench_render_pass_recording,
    bench_staged_upload
);
criterion_main!(benches);
