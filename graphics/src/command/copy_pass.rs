//! Copy pass recording.

use crate::backend::{BufferRegion, TextureRegion, TextureTransferInfo, TransferBufferLocation};
use crate::command::CommandBuffer;
use crate::handle::{NativeHandle, RawCopyPass};
use crate::resources::{Buffer, Texture, TransferBuffer};
use crate::types::{TextureType, TransferBufferUsage};

/// Destination region of a texture upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureUploadRegion {
    pub mip_level: u32,
    pub layer: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl TextureUploadRegion {
    /// The whole base level of the first layer, or the whole volume of a
    /// 3D texture.
    pub fn whole(texture: &Texture) -> Self {
        let depth = if texture.texture_type() == TextureType::D3 {
            texture.layer_count_or_depth()
        } else {
            1
        };
        Self {
            width: texture.width(),
            height: texture.height(),
            depth,
            ..Self::default()
        }
    }

    pub fn with_mip_level(mut self, mip_level: u32) -> Self {
        self.mip_level = mip_level;
        self
    }

    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }

    /// Number of bytes a tightly packed source needs to fill the region.
    pub fn byte_size(&self, block_size: u32) -> u64 {
        u64::from(self.width)
            * u64::from(self.height)
            * u64::from(self.depth.max(1))
            * u64::from(block_size)
    }
}

/// An open copy pass.
///
/// Uploads move data from an unmapped upload [`TransferBuffer`] into
/// device-local buffers and textures. Source and destination ranges are
/// checked before anything reaches the backend. Both ends of an upload are
/// pinned by the command buffer until it is submitted.
pub struct CopyPass<'a> {
    command_buffer: &'a CommandBuffer,
    handle: NativeHandle<RawCopyPass>,
}

impl<'a> CopyPass<'a> {
    pub(crate) fn new(command_buffer: &'a CommandBuffer, handle: NativeHandle<RawCopyPass>) -> Self {
        Self {
            command_buffer,
            handle,
        }
    }

    /// Get the command buffer this pass records into.
    pub fn command_buffer(&self) -> &'a CommandBuffer {
        self.command_buffer
    }

    /// Upload the whole transfer buffer into the start of `target`.
    pub fn upload_buffer(&mut self, source: &TransferBuffer, target: &Buffer) {
        self.upload_buffer_region(source, 0, target, 0, source.size(), false);
    }

    /// Upload `size` bytes from `source` at `src_offset` into `target` at
    /// `dst_offset`.
    ///
    /// With `cycle` set, a target the GPU is still reading is replaced
    /// instead of overwritten.
    pub fn upload_buffer_region(
        &mut self,
        source: &TransferBuffer,
        src_offset: u32,
        target: &Buffer,
        dst_offset: u32,
        size: u32,
        cycle: bool,
    ) {
        self.check_source(source);
        gpu_assert!(size > 0, "buffer upload of zero bytes");
        gpu_assert!(
            u64::from(src_offset) + u64::from(size) <= u64::from(source.size()),
            "upload source range {}+{} exceeds transfer buffer {:?} ({} bytes)",
            src_offset,
            size,
            source.label(),
            source.size()
        );
        gpu_assert!(
            u64::from(dst_offset) + u64::from(size) <= u64::from(target.size()),
            "upload destination range {}+{} exceeds buffer {:?} ({} bytes)",
            dst_offset,
            size,
            target.label(),
            target.size()
        );

        self.command_buffer.pin(source.pinned());
        self.command_buffer.pin(target.pinned());
        self.command_buffer.device().backend().upload_to_buffer(
            self.handle.as_ptr(),
            &TransferBufferLocation {
                transfer_buffer: source.raw(),
                offset: src_offset,
            },
            &BufferRegion {
                buffer: target.raw(),
                offset: dst_offset,
                size,
            },
            cycle,
        );
    }

    /// Upload tightly packed texels from the start of `source` into the
    /// whole of [`TextureUploadRegion::whole`].
    pub fn upload_texture(&mut self, source: &TransferBuffer, target: &Texture, cycle: bool) {
        self.upload_texture_region(source, 0, target, &TextureUploadRegion::whole(target), cycle);
    }

    /// Upload tightly packed texels from `source` at `src_offset` into a
    /// region of `target`.
    pub fn upload_texture_region(
        &mut self,
        source: &TransferBuffer,
        src_offset: u32,
        target: &Texture,
        region: &TextureUploadRegion,
        cycle: bool,
    ) {
        self.check_source(source);
        gpu_assert!(
            target.owns_data(),
            "uploads into swapchain textures are not allowed"
        );
        gpu_assert!(
            region.mip_level < target.num_levels(),
            "mip level {} out of range for texture {:?} with {} levels",
            region.mip_level,
            target.label(),
            target.num_levels()
        );
        let (level_width, level_height, level_depth) = target.level_extent(region.mip_level);
        gpu_assert!(
            region.width > 0
                && region.height > 0
                && u64::from(region.x) + u64::from(region.width) <= u64::from(level_width)
                && u64::from(region.y) + u64::from(region.height) <= u64::from(level_height),
            "region {}x{} at ({}, {}) exceeds mip level {} of texture {:?} ({}x{})",
            region.width,
            region.height,
            region.x,
            region.y,
            region.mip_level,
            target.label(),
            level_width,
            level_height
        );
        gpu_assert!(
            u64::from(region.layer) + u64::from(region.z) + u64::from(region.depth.max(1))
                <= u64::from(level_depth),
            "layer {} with depth {} at z {} exceeds mip level {} of texture {:?} ({} layers or planes)",
            region.layer,
            region.depth,
            region.z,
            region.mip_level,
            target.label(),
            level_depth
        );
        let needed = region.byte_size(target.format().block_size());
        gpu_assert!(
            u64::from(src_offset) + needed <= u64::from(source.size()),
            "texture upload needs {} bytes at offset {} but transfer buffer {:?} has {}",
            needed,
            src_offset,
            source.label(),
            source.size()
        );

        self.command_buffer.pin(source.pinned());
        self.command_buffer.pin(target.pinned());
        self.command_buffer.device().backend().upload_to_texture(
            self.handle.as_ptr(),
            &TextureTransferInfo {
                transfer_buffer: source.raw(),
                offset: src_offset,
                pixels_per_row: 0,
                rows_per_layer: 0,
            },
            &TextureRegion {
                texture: target.raw(),
                mip_level: region.mip_level,
                layer: region.layer,
                x: region.x,
                y: region.y,
                z: region.z,
                w: region.width,
                h: region.height,
                d: region.depth.max(1),
            },
            cycle,
        );
    }

    /// End the pass.
    pub fn end(mut self) {
        self.finish();
    }

    fn check_source(&self, source: &TransferBuffer) {
        gpu_assert!(
            !source.is_mapped(),
            "transfer buffer {:?} is still mapped",
            source.label()
        );
        gpu_assert!(
            source.usage() == TransferBufferUsage::Upload,
            "transfer buffer {:?} is not an upload buffer",
            source.label()
        );
    }

    fn finish(&mut self) {
        if let Some(raw) = self.handle.release() {
            self.command_buffer
                .device()
                .backend()
                .end_copy_pass(raw.as_ptr());
            self.command_buffer.pass_ended();
            log::trace!("Ended copy pass");
        }
    }
}

impl std::fmt::Debug for CopyPass<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyPass")
            .field("handle", &self.handle)
            .finish()
    }
}

impl Drop for CopyPass<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ResourceKind;
    use crate::test_utils::dummy_device;
    use crate::types::{
        BufferDescriptor, BufferUsage, TextureDescriptor, TextureFormat, TransferBufferDescriptor,
    };

    #[test]
    fn test_buffer_upload_moves_bytes() {
        let (backend, device) = dummy_device();
        let mut staging = device
            .create_transfer_buffer(&TransferBufferDescriptor::upload(4))
            .unwrap();
        staging.copy_in(&[1, 2, 3, 4], 0, 0, 4).unwrap();
        let target = device
            .create_buffer(&BufferDescriptor::new(8, BufferUsage::VERTEX))
            .unwrap();
        let target_id = backend.last_created(ResourceKind::Buffer).unwrap();

        let cmd = device.acquire_command_buffer().unwrap();
        cmd.copy_pass(|pass| {
            pass.upload_buffer(&staging, &target);
            pass.upload_buffer_region(&staging, 2, &target, 6, 2, true);
        })
        .unwrap();

        assert_eq!(
            backend.buffer_contents(target_id),
            Some(vec![1, 2, 3, 4, 0, 0, 3, 4])
        );
        assert!(backend.misuses().is_empty());
    }

    #[test]
    fn test_texture_upload_fills_base_level() {
        let (backend, device) = dummy_device();
        let mut staging = device
            .create_transfer_buffer(&TransferBufferDescriptor::upload(4))
            .unwrap();
        staging.write(0, &[10u8, 20, 30, 40]).unwrap();
        let texture = device
            .create_texture(&TextureDescriptor::new_2d(2, 2, TextureFormat::R8Unorm))
            .unwrap();
        let texture_id = backend.last_created(ResourceKind::Texture).unwrap();

        let cmd = device.acquire_command_buffer().unwrap();
        let mut pass = cmd.begin_copy_pass().unwrap();
        pass.upload_texture(&staging, &texture, false);
        pass.end();

        assert_eq!(
            backend.texture_contents(texture_id),
            Some(vec![10, 20, 30, 40])
        );
    }

    #[test]
    fn test_whole_region_of_volume_covers_depth() {
        let (_, device) = dummy_device();
        let texture = device
            .create_texture(
                &TextureDescriptor::new_2d(4, 4, TextureFormat::R8g8b8a8Unorm)
                    .with_type(TextureType::D3, 8),
            )
            .unwrap();
        let region = TextureUploadRegion::whole(&texture);
        assert_eq!(region.depth, 8);
        assert_eq!(region.byte_size(4), 4 * 4 * 8 * 4);
    }

    #[test]
    #[cfg_attr(not(any(debug_assertions, feature = "strict-checks")), ignore)]
    #[should_panic(expected = "is still mapped")]
    fn test_upload_from_mapped_buffer_asserts() {
        let (_, device) = dummy_device();
        let mut staging = device
            .create_transfer_buffer(&TransferBufferDescriptor::upload(4))
            .unwrap();
        let target = device
            .create_buffer(&BufferDescriptor::new(4, BufferUsage::VERTEX))
            .unwrap();
        staging.map(false).unwrap();
        let cmd = device.acquire_command_buffer().unwrap();
        let mut pass = cmd.begin_copy_pass().unwrap();
        pass.upload_buffer(&staging, &target);
    }

    #[test]
    #[cfg_attr(not(any(debug_assertions, feature = "strict-checks")), ignore)]
    #[should_panic(expected = "exceeds buffer")]
    fn test_upload_past_destination_asserts() {
        let (_, device) = dummy_device();
        let staging = device
            .create_transfer_buffer(&TransferBufferDescriptor::upload(16))
            .unwrap();
        let target = device
            .create_buffer(&BufferDescriptor::new(8, BufferUsage::VERTEX))
            .unwrap();
        let cmd = device.acquire_command_buffer().unwrap();
        let mut pass = cmd.begin_copy_pass().unwrap();
        pass.upload_buffer(&staging, &target);
    }

    #[test]
    #[cfg_attr(not(any(debug_assertions, feature = "strict-checks")), ignore)]
    #[should_panic(expected = "exceeds mip level")]
    fn test_texture_region_out_of_bounds_asserts() {
        let (_, device) = dummy_device();
        let staging = device
            .create_transfer_buffer(&TransferBufferDescriptor::upload(1024))
            .unwrap();
        let texture = device
            .create_texture(
                &TextureDescriptor::new_2d(8, 8, TextureFormat::R8Unorm).with_levels(2),
            )
            .unwrap();
        let cmd = device.acquire_command_buffer().unwrap();
        let mut pass = cmd.begin_copy_pass().unwrap();
        let region = TextureUploadRegion::whole(&texture).with_mip_level(1);
        pass.upload_texture_region(&staging, 0, &texture, &region, false);
    }

    #[test]
    #[cfg_attr(not(any(debug_assertions, feature = "strict-checks")), ignore)]
    #[should_panic(expected = "mip level 35 out of range")]
    fn test_far_mip_level_asserts_instead_of_overflowing() {
        let (_, device) = dummy_device();
        let staging = device
            .create_transfer_buffer(&TransferBufferDescriptor::upload(64))
            .unwrap();
        let texture = device
            .create_texture(
                &TextureDescriptor::new_2d(8, 8, TextureFormat::R8Unorm).with_levels(4),
            )
            .unwrap();
        let cmd = device.acquire_command_buffer().unwrap();
        let mut pass = cmd.begin_copy_pass().unwrap();
        let region = TextureUploadRegion {
            width: 1,
            height: 1,
            depth: 1,
            ..TextureUploadRegion::default()
        }
        .with_mip_level(35);
        pass.upload_texture_region(&staging, 0, &texture, &region, false);
    }

    #[test]
    #[cfg_attr(not(any(debug_assertions, feature = "strict-checks")), ignore)]
    #[should_panic(expected = "exceeds mip level 1")]
    fn test_volume_region_is_bounded_by_level_depth() {
        let (_, device) = dummy_device();
        let staging = device
            .create_transfer_buffer(&TransferBufferDescriptor::upload(1024))
            .unwrap();
        let texture = device
            .create_texture(
                &TextureDescriptor::new_2d(4, 4, TextureFormat::R8Unorm)
                    .with_type(TextureType::D3, 8)
                    .with_levels(2),
            )
            .unwrap();
        let cmd = device.acquire_command_buffer().unwrap();
        let mut pass = cmd.begin_copy_pass().unwrap();
        let region = TextureUploadRegion {
            width: 2,
            height: 2,
            depth: 8,
            ..TextureUploadRegion::default()
        }
        .with_mip_level(1);
        pass.upload_texture_region(&staging, 0, &texture, &region, false);
    }

    #[test]
    fn test_volume_region_fits_level_depth() {
        let (backend, device) = dummy_device();
        let staging = device
            .create_transfer_buffer(&TransferBufferDescriptor::upload(1024))
            .unwrap();
        let texture = device
            .create_texture(
                &TextureDescriptor::new_2d(4, 4, TextureFormat::R8Unorm)
                    .with_type(TextureType::D3, 8)
                    .with_levels(2),
            )
            .unwrap();
        let cmd = device.acquire_command_buffer().unwrap();
        cmd.copy_pass(|pass| {
            let region = TextureUploadRegion {
                width: 2,
                height: 2,
                depth: 4,
                ..TextureUploadRegion::default()
            }
            .with_mip_level(1);
            pass.upload_texture_region(&staging, 0, &texture, &region, false);
        })
        .unwrap();
        assert!(backend.misuses().is_empty());
    }

    #[test]
    fn test_uploads_pin_both_ends_until_submit() {
        let (backend, device) = dummy_device();
        let staging = device
            .create_transfer_buffer(&TransferBufferDescriptor::upload(4))
            .unwrap();
        let staging_id = backend.last_created(ResourceKind::TransferBuffer).unwrap();
        let target = device
            .create_buffer(&BufferDescriptor::new(4, BufferUsage::VERTEX))
            .unwrap();
        let target_id = backend.last_created(ResourceKind::Buffer).unwrap();

        let mut cmd = device.acquire_command_buffer().unwrap();
        cmd.copy_pass(|pass| pass.upload_buffer(&staging, &target))
            .unwrap();
        drop(staging);
        drop(target);
        assert_eq!(cmd.pinned_resource_count(), 2);
        assert!(backend.is_live(staging_id));
        assert!(backend.is_live(target_id));

        cmd.submit().unwrap();
        assert!(!backend.is_live(staging_id));
        assert!(!backend.is_live(target_id));
        assert!(backend.misuses().is_empty());
    }
}
