//! GPU sampler resource.

use std::sync::Arc;

use crate::device::GpuDevice;
use crate::error::GraphicsResult;
use crate::handle::{RawSampler, ResourceKind};
use crate::resources::retained::{pin, Pinned, Retained};
use crate::types::SamplerDescriptor;

/// A GPU texture sampler.
///
/// Samplers are created by [`GpuDevice::create_sampler`] and bound next to a
/// texture with [`RenderPass::bind_fragment_sampler`].
///
/// [`RenderPass::bind_fragment_sampler`]: crate::RenderPass::bind_fragment_sampler
///
/// # Example
///
/// ```ignore
/// let sampler = device.create_sampler(&SamplerDescriptor::linear())?;
/// ```
pub struct Sampler {
    shared: Arc<Retained<RawSampler>>,
    descriptor: SamplerDescriptor,
}

impl Sampler {
    /// Create a new sampler.
    pub fn new(device: &Arc<GpuDevice>, descriptor: &SamplerDescriptor) -> GraphicsResult<Self> {
        gpu_assert!(
            !descriptor.enable_anisotropy || descriptor.max_anisotropy >= 1.0,
            "max anisotropy must be at least 1, got {}",
            descriptor.max_anisotropy
        );
        gpu_assert!(
            descriptor.min_lod <= descriptor.max_lod,
            "min LOD {} is greater than max LOD {}",
            descriptor.min_lod,
            descriptor.max_lod
        );

        let raw = device.backend().create_sampler(device.raw(), descriptor);
        let handle = device.wrap_native(raw, ResourceKind::Sampler)?;

        log::trace!(
            "Created sampler (min: {:?}, mag: {:?}, address: {:?})",
            descriptor.min_filter,
            descriptor.mag_filter,
            descriptor.address_mode_u
        );

        Ok(Self {
            shared: Arc::new(Retained::owned(device, handle, None)),
            descriptor: descriptor.clone(),
        })
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GpuDevice> {
        self.shared.device()
    }

    /// Get the sampler descriptor.
    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.descriptor
    }

    pub(crate) fn raw(&self) -> *mut RawSampler {
        self.shared.raw()
    }

    pub(crate) fn pinned(&self) -> Pinned {
        pin(&self.shared)
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("handle", &self.shared)
            .field("min_filter", &self.descriptor.min_filter)
            .field("mag_filter", &self.descriptor.mag_filter)
            .finish()
    }
}

// Ensure Sampler is Send + Sync
static_assertions::assert_impl_all!(Sampler: Send, Sync);
