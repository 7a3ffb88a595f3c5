//! Graphics pipeline resource.

use std::sync::Arc;

use crate::backend::PipelineCreateInfo;
use crate::device::GpuDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::handle::{RawGraphicsPipeline, ResourceKind};
use crate::ref_counted::RefCounted;
use crate::resources::retained::{pin, Pinned, Retained};
use crate::resources::Shader;
use crate::types::{GraphicsPipelineDescriptor, ShaderStage};

/// A vertex shader, a fragment shader and the fixed-function state they
/// run with.
///
/// The pipeline holds its own references to both shaders, so they stay
/// alive for as long as the pipeline does even if every other owner lets go.
/// Teardown releases the native pipeline first and its shader references
/// second. It happens when the pipeline is dropped, or once the last command
/// buffer that bound it is submitted.
///
/// # Example
///
/// ```ignore
/// let vs = device.create_shader(&ShaderDescriptor::vertex(VS_SPIRV, "main"))?;
/// let fs = device.create_shader(&ShaderDescriptor::fragment(FS_SPIRV, "main"))?;
/// let pipeline = device.create_graphics_pipeline(
///     &vs,
///     &fs,
///     &GraphicsPipelineDescriptor::new(GraphicsPipelineTargetInfo::single(format)),
/// )?;
/// ```
pub struct GraphicsPipeline {
    shared: Arc<PipelineShared>,
    descriptor: GraphicsPipelineDescriptor,
}

/// The part of a pipeline that pending command buffers keep alive.
///
/// Fields drop in declaration order: the native pipeline goes before the
/// shader references.
#[derive(Debug)]
struct PipelineShared {
    native: Retained<RawGraphicsPipeline>,
    vertex_shader: RefCounted<Shader>,
    fragment_shader: RefCounted<Shader>,
}

impl GraphicsPipeline {
    /// Create a pipeline sharing ownership of both shaders.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if a shader is missing or
    /// is bound to the wrong stage, or if the fixed-function state is
    /// inconsistent. Returns [`GraphicsError::CreationFailed`] if the
    /// backend rejects the pipeline.
    pub fn new(
        device: &Arc<GpuDevice>,
        vertex_shader: &RefCounted<Shader>,
        fragment_shader: &RefCounted<Shader>,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> GraphicsResult<Self> {
        check_stage(vertex_shader, ShaderStage::Vertex)?;
        check_stage(fragment_shader, ShaderStage::Fragment)?;
        descriptor.validate()?;

        let info = PipelineCreateInfo {
            vertex_shader: vertex_shader.get().raw(),
            fragment_shader: fragment_shader.get().raw(),
            state: descriptor,
        };
        let raw = device
            .backend()
            .create_graphics_pipeline(device.raw(), &info);
        let handle = device.wrap_native(raw, ResourceKind::GraphicsPipeline)?;

        log::trace!(
            "Created graphics pipeline {:?} ({} color targets, {:?})",
            descriptor.label,
            descriptor.target_info.color_targets.len(),
            descriptor.primitive_type
        );

        Ok(Self {
            shared: Arc::new(PipelineShared {
                native: Retained::owned(device, handle, descriptor.label.clone()),
                vertex_shader: vertex_shader.acquire(),
                fragment_shader: fragment_shader.acquire(),
            }),
            descriptor: descriptor.clone(),
        })
    }

    pub fn device(&self) -> &Arc<GpuDevice> {
        self.shared.native.device()
    }

    pub fn vertex_shader(&self) -> &RefCounted<Shader> {
        &self.shared.vertex_shader
    }

    pub fn fragment_shader(&self) -> &RefCounted<Shader> {
        &self.shared.fragment_shader
    }

    /// The fixed-function state the pipeline was built with.
    pub fn descriptor(&self) -> &GraphicsPipelineDescriptor {
        &self.descriptor
    }

    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    pub(crate) fn raw(&self) -> *mut RawGraphicsPipeline {
        self.shared.native.raw()
    }

    pub(crate) fn pinned(&self) -> Pinned {
        pin(&self.shared)
    }
}

fn check_stage(shader: &RefCounted<Shader>, expected: ShaderStage) -> GraphicsResult<()> {
    let Some(shader) = shader.try_get() else {
        return Err(GraphicsError::InvalidParameter(format!(
            "{expected:?} shader slot is empty"
        )));
    };
    if shader.stage() != expected {
        return Err(GraphicsError::InvalidParameter(format!(
            "{:?} shader '{}' passed as the {:?} shader",
            shader.stage(),
            shader.entry_point(),
            expected
        )));
    }
    Ok(())
}

impl std::fmt::Debug for GraphicsPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsPipeline")
            .field("handle", &self.shared.native)
            .field("vertex_shader", &self.shared.vertex_shader)
            .field("fragment_shader", &self.shared.fragment_shader)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsPipeline: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyEvent;
    use crate::test_utils::dummy_device;
    use crate::types::{GraphicsPipelineTargetInfo, ShaderDescriptor, TextureFormat};

    fn descriptor() -> GraphicsPipelineDescriptor {
        GraphicsPipelineDescriptor::new(GraphicsPipelineTargetInfo::single(
            TextureFormat::B8g8r8a8Unorm,
        ))
    }

    #[test]
    fn test_pipeline_releases_before_its_shaders() {
        let (backend, device) = dummy_device();
        let vs = device
            .create_shader(&ShaderDescriptor::vertex(b"vert", "main"))
            .unwrap();
        let fs = device
            .create_shader(&ShaderDescriptor::fragment(b"frag", "main"))
            .unwrap();
        let pipeline = GraphicsPipeline::new(&device, &vs, &fs, &descriptor()).unwrap();
        assert_eq!(vs.reference_count(), 2);

        drop(vs);
        drop(fs);
        assert_eq!(backend.live_count(ResourceKind::Shader), 2);

        backend.clear_events();
        drop(pipeline);
        let kinds: Vec<ResourceKind> = backend
            .events()
            .into_iter()
            .filter_map(|e| match e {
                DummyEvent::Released { kind, .. } => Some(kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::GraphicsPipeline,
                ResourceKind::Shader,
                ResourceKind::Shader
            ]
        );
    }

    #[test]
    fn test_swapped_stages_are_rejected() {
        let (backend, device) = dummy_device();
        let vs = device
            .create_shader(&ShaderDescriptor::vertex(b"vert", "main"))
            .unwrap();
        let fs = device
            .create_shader(&ShaderDescriptor::fragment(b"frag", "main"))
            .unwrap();
        let result = GraphicsPipeline::new(&device, &fs, &vs, &descriptor());
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
        assert_eq!(backend.live_count(ResourceKind::GraphicsPipeline), 0);
        assert_eq!(vs.reference_count(), 1);
    }

    #[test]
    fn test_empty_shader_slot_is_rejected() {
        let (_, device) = dummy_device();
        let fs = device
            .create_shader(&ShaderDescriptor::fragment(b"frag", "main"))
            .unwrap();
        let result = GraphicsPipeline::new(&device, &RefCounted::empty(), &fs, &descriptor());
        assert!(result.is_err());
    }
}
