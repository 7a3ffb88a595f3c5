//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't talk to a GPU. It keeps every object in memory,
//! validates calls the way a strict driver would, and records what it was
//! asked to do so tests can inspect the order of creations, releases,
//! passes and submissions.
//!
//! Native pointers handed out by the dummy are small integer ids cast to
//! pointers. They are never dereferenced, except for mapped transfer
//! buffers, which point at real host memory.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::ptr;

use parking_lot::Mutex;
use raw_window_handle::RawWindowHandle;

use super::{
    AcquiredSwapchainTexture, BufferRegion, GpuBackend, NativeBufferBinding, NativeColorTarget,
    NativeDepthStencilTarget, NativeTextureSamplerBinding, PipelineCreateInfo, ShaderCreateInfo,
    TextureRegion, TextureTransferInfo, TransferBufferLocation,
};
use crate::handle::{
    RawBuffer, RawCommandBuffer, RawCopyPass, RawDevice, RawGraphicsPipeline, RawRenderPass,
    RawSampler, RawShader, RawTexture, RawTransferBuffer, ResourceKind,
};
use crate::types::{
    BufferDescriptor, IndexElementSize, SamplerDescriptor, ScissorRect, ShaderFormat, ShaderStage,
    TextureDescriptor, TextureFormat, TransferBufferDescriptor, Viewport,
};

/// A call the dummy can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    /// Creation (or acquisition) of an object of this kind.
    Create(ResourceKind),
    /// Mapping a transfer buffer.
    Map,
    /// Submitting a command buffer.
    Submit,
    /// Acquiring a swapchain texture.
    SwapchainAcquire,
    /// Claiming a window.
    ClaimWindow,
    /// Waiting for the device to go idle.
    WaitForIdle,
}

impl From<ResourceKind> for FailurePoint {
    fn from(kind: ResourceKind) -> Self {
        Self::Create(kind)
    }
}

/// Something the dummy backend was asked to do.
///
/// Object ids are the integer values of the native pointers.
#[derive(Debug, Clone, PartialEq)]
pub enum DummyEvent {
    Created { kind: ResourceKind, id: usize },
    Released { kind: ResourceKind, id: usize },
    Named { kind: ResourceKind, id: usize, name: String },
    Mapped { id: usize, cycle: bool },
    Unmapped { id: usize },
    WindowClaimed,
    WindowReleased,
    RenderPassBegun {
        command_buffer: usize,
        color_targets: Vec<usize>,
        depth_target: Option<usize>,
    },
    RenderPassEnded { id: usize },
    CopyPassBegun { command_buffer: usize },
    CopyPassEnded { id: usize },
    PipelineBound { pipeline: usize },
    VertexBuffersBound { first_slot: u32, buffers: Vec<usize> },
    IndexBufferBound { buffer: usize, element_size: IndexElementSize },
    FragmentSamplersBound { first_slot: u32, count: usize },
    ViewportSet(Viewport),
    ScissorSet(ScissorRect),
    Draw {
        vertices: u32,
        instances: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        indices: u32,
        instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    BufferUploaded {
        transfer_buffer: usize,
        buffer: usize,
        dst_offset: u32,
        size: u32,
    },
    TextureUploaded {
        transfer_buffer: usize,
        texture: usize,
        mip_level: u32,
    },
    UniformsPushed { stage: ShaderStage, slot: u32, len: usize },
    MipmapsGenerated { texture: usize },
    SwapchainAcquired { texture: usize },
    Submitted { command_buffer: usize },
}

#[derive(Debug)]
struct Object {
    kind: ResourceKind,
    /// Host copy of buffer, transfer buffer and base-level texture contents.
    data: Vec<u8>,
    mapped: bool,
    swapchain: bool,
    /// Command buffer a pass or swapchain texture belongs to.
    owner: Option<usize>,
    open_pass: Option<usize>,
    /// Objects recorded into a command buffer that is not yet submitted.
    references: HashSet<usize>,
    pipeline_bound: bool,
    index_bound: bool,
    extent: (u32, u32, u32),
    block_size: u32,
    stage: Option<ShaderStage>,
    formats: ShaderFormat,
}

impl Object {
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            data: Vec::new(),
            mapped: false,
            swapchain: false,
            owner: None,
            open_pass: None,
            references: HashSet::new(),
            pipeline_bound: false,
            index_bound: false,
            extent: (0, 0, 0),
            block_size: 0,
            stage: None,
            formats: ShaderFormat::empty(),
        }
    }
}

#[derive(Debug)]
struct State {
    next_id: usize,
    objects: HashMap<usize, Object>,
    events: Vec<DummyEvent>,
    misuses: Vec<String>,
    last_error: String,
    failures: HashMap<FailurePoint, String>,
    shader_formats: ShaderFormat,
    swapchain_format: TextureFormat,
    swapchain_size: (u32, u32),
    minimized: bool,
    claimed_windows: HashSet<u64>,
}

impl State {
    fn insert(&mut self, object: Object) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    fn create(&mut self, object: Object) -> usize {
        let kind = object.kind;
        let id = self.insert(object);
        log::trace!("DummyBackend: created {} #{}", kind, id);
        self.events.push(DummyEvent::Created { kind, id });
        id
    }

    fn take_failure(&mut self, point: FailurePoint) -> bool {
        match self.failures.remove(&point) {
            Some(message) => {
                log::trace!("DummyBackend: injected failure at {:?}", point);
                self.last_error = message;
                true
            }
            None => false,
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.last_error = message.into();
    }

    fn misuse(&mut self, message: String) {
        log::error!("DummyBackend: {}", message);
        self.last_error = message.clone();
        self.misuses.push(message);
    }

    fn check(&mut self, id: usize, kind: ResourceKind) -> bool {
        match self.objects.get(&id).map(|o| o.kind) {
            Some(found) if found == kind => true,
            Some(found) => {
                self.misuse(format!("#{id} is a {found}, expected a {kind}"));
                false
            }
            None => {
                self.misuse(format!("unknown {kind} #{id}"));
                false
            }
        }
    }

    fn release(&mut self, id: usize, kind: ResourceKind) {
        if !self.check(id, kind) {
            return;
        }
        if self.objects.get(&id).is_some_and(|o| o.swapchain) {
            self.misuse(format!("swapchain texture #{id} released by the application"));
            return;
        }
        let pending = self
            .objects
            .iter()
            .find(|(_, o)| o.references.contains(&id))
            .map(|(&command_buffer, _)| command_buffer);
        if let Some(command_buffer) = pending {
            self.misuse(format!(
                "{kind} #{id} released while command buffer #{command_buffer} still references it"
            ));
        }
        self.objects.remove(&id);
        log::trace!("DummyBackend: released {} #{}", kind, id);
        self.events.push(DummyEvent::Released { kind, id });
    }

    /// Record that `command_buffer` uses `ids` until it is submitted.
    fn reference(&mut self, command_buffer: usize, ids: impl IntoIterator<Item = usize>) {
        if let Some(object) = self.objects.get_mut(&command_buffer) {
            object.references.extend(ids);
        }
    }

    /// The command buffer a live pass belongs to, if the pass is valid.
    fn pass_owner(&mut self, pass: usize, kind: ResourceKind) -> Option<usize> {
        if !self.check(pass, kind) {
            return None;
        }
        self.objects.get(&pass).and_then(|o| o.owner)
    }

    fn begin_pass(&mut self, command_buffer: usize, kind: ResourceKind) -> Option<usize> {
        if self.take_failure(kind.into()) || !self.check(command_buffer, ResourceKind::CommandBuffer)
        {
            return None;
        }
        if let Some(open) = self.objects.get(&command_buffer).and_then(|o| o.open_pass) {
            self.misuse(format!(
                "command buffer #{command_buffer} already has pass #{open} open"
            ));
            return None;
        }
        let pass = self.insert(Object {
            owner: Some(command_buffer),
            ..Object::new(kind)
        });
        if let Some(cb) = self.objects.get_mut(&command_buffer) {
            cb.open_pass = Some(pass);
        }
        log::trace!("DummyBackend: began {} #{}", kind, pass);
        Some(pass)
    }

    fn end_pass(&mut self, pass: usize, kind: ResourceKind) -> bool {
        let Some(owner) = self.pass_owner(pass, kind) else {
            return false;
        };
        self.objects.remove(&pass);
        if let Some(cb) = self.objects.get_mut(&owner) {
            cb.open_pass = None;
        }
        log::trace!("DummyBackend: ended {} #{}", kind, pass);
        true
    }
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    state: Mutex<State>,
}

impl DummyBackend {
    /// Create a new dummy backend that accepts SPIR-V shaders.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                objects: HashMap::new(),
                events: Vec::new(),
                misuses: Vec::new(),
                last_error: String::new(),
                failures: HashMap::new(),
                shader_formats: ShaderFormat::SPIRV,
                swapchain_format: TextureFormat::B8g8r8a8Unorm,
                swapchain_size: (800, 600),
                minimized: false,
                claimed_windows: HashSet::new(),
            }),
        }
    }

    /// Set the shader formats the backend supports.
    pub fn with_shader_formats(self, formats: ShaderFormat) -> Self {
        self.state.lock().shader_formats = formats;
        self
    }

    /// Set the format and size of swapchain textures.
    pub fn with_swapchain(self, format: TextureFormat, width: u32, height: u32) -> Self {
        {
            let mut state = self.state.lock();
            state.swapchain_format = format;
            state.swapchain_size = (width, height);
        }
        self
    }

    /// Simulate a minimized window: swapchain acquires succeed without a texture.
    pub fn set_minimized(&self, minimized: bool) {
        self.state.lock().minimized = minimized;
    }

    /// Make the next call at `point` fail with `message`.
    pub fn fail_next(&self, point: impl Into<FailurePoint>, message: impl Into<String>) {
        self.state.lock().failures.insert(point.into(), message.into());
    }

    /// Everything recorded so far, in call order.
    pub fn events(&self) -> Vec<DummyEvent> {
        self.state.lock().events.clone()
    }

    /// Forget the recorded events.
    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Usage errors detected so far.
    pub fn misuses(&self) -> Vec<String> {
        self.state.lock().misuses.clone()
    }

    /// Number of live objects of a kind.
    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.state
            .lock()
            .objects
            .values()
            .filter(|o| o.kind == kind)
            .count()
    }

    /// Whether the object with this id is still alive.
    pub fn is_live(&self, id: usize) -> bool {
        self.state.lock().objects.contains_key(&id)
    }

    /// Id of the most recently created object of a kind.
    pub fn last_created(&self, kind: ResourceKind) -> Option<usize> {
        self.state.lock().events.iter().rev().find_map(|e| match e {
            DummyEvent::Created { kind: k, id } if *k == kind => Some(*id),
            _ => None,
        })
    }

    /// Contents of a buffer.
    pub fn buffer_contents(&self, id: usize) -> Option<Vec<u8>> {
        self.contents(id, ResourceKind::Buffer)
    }

    /// Contents of a transfer buffer.
    pub fn transfer_buffer_contents(&self, id: usize) -> Option<Vec<u8>> {
        self.contents(id, ResourceKind::TransferBuffer)
    }

    /// Base mip level of a texture, all layers, tightly packed.
    pub fn texture_contents(&self, id: usize) -> Option<Vec<u8>> {
        self.contents(id, ResourceKind::Texture)
    }

    fn contents(&self, id: usize, kind: ResourceKind) -> Option<Vec<u8>> {
        let state = self.state.lock();
        state
            .objects
            .get(&id)
            .filter(|o| o.kind == kind)
            .map(|o| o.data.clone())
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn to_ptr<T>(id: usize) -> *mut T {
    id as *mut T
}

fn id_of<T>(ptr: *mut T) -> usize {
    ptr as usize
}

fn window_key(window: RawWindowHandle) -> u64 {
    let mut hasher = DefaultHasher::new();
    window.hash(&mut hasher);
    hasher.finish()
}

fn created<T>(id: Option<usize>) -> *mut T {
    id.map_or(ptr::null_mut(), to_ptr)
}

// SAFETY: mapped pointers address the transfer buffer's own `Vec<u8>`, which
// is allocated at the buffer's full size on creation and never resized. The
// backend does not touch that memory while the buffer is mapped (uploads
// from a mapped buffer are rejected), and the buffer is only freed on
// release.
unsafe impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn last_error(&self) -> String {
        self.state.lock().last_error.clone()
    }

    fn create_device(
        &self,
        requested_formats: ShaderFormat,
        debug_mode: bool,
        driver_name: Option<&str>,
    ) -> *mut RawDevice {
        let mut state = self.state.lock();
        if state.take_failure(ResourceKind::Device.into()) {
            return ptr::null_mut();
        }
        if let Some(name) = driver_name.filter(|name| *name != "dummy") {
            state.fail(format!("no GPU driver named {name:?}"));
            return ptr::null_mut();
        }
        log::trace!("DummyBackend: creating device (debug: {})", debug_mode);
        let formats = state.shader_formats & requested_formats;
        let id = state.create(Object {
            formats,
            ..Object::new(ResourceKind::Device)
        });
        to_ptr(id)
    }

    fn destroy_device(&self, device: *mut RawDevice) {
        let mut state = self.state.lock();
        let device = id_of(device);
        if !state.check(device, ResourceKind::Device) {
            return;
        }
        let leaked = state
            .objects
            .values()
            .filter(|o| o.kind != ResourceKind::Device)
            .count();
        if leaked > 0 {
            state.misuse(format!("device #{device} destroyed with {leaked} live objects"));
        }
        state.claimed_windows.clear();
        state.release(device, ResourceKind::Device);
    }

    fn shader_formats(&self, device: *mut RawDevice) -> ShaderFormat {
        let mut state = self.state.lock();
        let device = id_of(device);
        if !state.check(device, ResourceKind::Device) {
            return ShaderFormat::empty();
        }
        state
            .objects
            .get(&device)
            .map_or(ShaderFormat::empty(), |o| o.formats)
    }

    fn wait_for_idle(&self, device: *mut RawDevice) -> bool {
        let mut state = self.state.lock();
        state.check(id_of(device), ResourceKind::Device) && !state.take_failure(FailurePoint::WaitForIdle)
    }

    fn claim_window(&self, device: *mut RawDevice, window: RawWindowHandle) -> bool {
        let mut state = self.state.lock();
        if !state.check(id_of(device), ResourceKind::Device)
            || state.take_failure(FailurePoint::ClaimWindow)
        {
            return false;
        }
        if !state.claimed_windows.insert(window_key(window)) {
            state.fail("window has already been claimed");
            return false;
        }
        state.events.push(DummyEvent::WindowClaimed);
        true
    }

    fn release_window(&self, device: *mut RawDevice, window: RawWindowHandle) {
        let mut state = self.state.lock();
        if !state.check(id_of(device), ResourceKind::Device) {
            return;
        }
        if !state.claimed_windows.remove(&window_key(window)) {
            state.misuse("released a window that was never claimed".to_string());
            return;
        }
        state.events.push(DummyEvent::WindowReleased);
    }

    fn swapchain_texture_format(
        &self,
        device: *mut RawDevice,
        window: RawWindowHandle,
    ) -> TextureFormat {
        let mut state = self.state.lock();
        if !state.check(id_of(device), ResourceKind::Device)
            || !state.claimed_windows.contains(&window_key(window))
        {
            return TextureFormat::Invalid;
        }
        state.swapchain_format
    }

    fn create_buffer(&self, device: *mut RawDevice, desc: &BufferDescriptor) -> *mut RawBuffer {
        let mut state = self.state.lock();
        if !state.check(id_of(device), ResourceKind::Device)
            || state.take_failure(ResourceKind::Buffer.into())
        {
            return ptr::null_mut();
        }
        if desc.size == 0 {
            state.fail("buffer size must be greater than zero");
            return ptr::null_mut();
        }
        let id = state.create(Object {
            data: vec![0; desc.size as usize],
            ..Object::new(ResourceKind::Buffer)
        });
        to_ptr(id)
    }

    fn set_buffer_name(&self, _device: *mut RawDevice, buffer: *mut RawBuffer, name: &str) {
        let mut state = self.state.lock();
        let id = id_of(buffer);
        if state.check(id, ResourceKind::Buffer) {
            state.events.push(DummyEvent::Named {
                kind: ResourceKind::Buffer,
                id,
                name: name.to_string(),
            });
        }
    }

    fn release_buffer(&self, _device: *mut RawDevice, buffer: *mut RawBuffer) {
        self.state
            .lock()
            .release(id_of(buffer), ResourceKind::Buffer);
    }

    fn create_transfer_buffer(
        &self,
        device: *mut RawDevice,
        desc: &TransferBufferDescriptor,
    ) -> *mut RawTransferBuffer {
        let mut state = self.state.lock();
        if !state.check(id_of(device), ResourceKind::Device)
            || state.take_failure(ResourceKind::TransferBuffer.into())
        {
            return ptr::null_mut();
        }
        if desc.size == 0 {
            state.fail("transfer buffer size must be greater than zero");
            return ptr::null_mut();
        }
        let id = state.create(Object {
            data: vec![0; desc.size as usize],
            ..Object::new(ResourceKind::TransferBuffer)
        });
        to_ptr(id)
    }

    fn release_transfer_buffer(&self, _device: *mut RawDevice, buffer: *mut RawTransferBuffer) {
        self.state
            .lock()
            .release(id_of(buffer), ResourceKind::TransferBuffer);
    }

    fn map_transfer_buffer(
        &self,
        _device: *mut RawDevice,
        buffer: *mut RawTransferBuffer,
        cycle: bool,
    ) -> *mut u8 {
        let mut state = self.state.lock();
        let id = id_of(buffer);
        if !state.check(id, ResourceKind::TransferBuffer) || state.take_failure(FailurePoint::Map)
        {
            return ptr::null_mut();
        }
        if state.objects.get(&id).is_some_and(|o| o.mapped) {
            state.misuse(format!("transfer buffer #{id} is already mapped"));
            return ptr::null_mut();
        }
        state.events.push(DummyEvent::Mapped { id, cycle });
        match state.objects.get_mut(&id) {
            Some(object) => {
                object.mapped = true;
                object.data.as_mut_ptr()
            }
            None => ptr::null_mut(),
        }
    }

    fn unmap_transfer_buffer(&self, _device: *mut RawDevice, buffer: *mut RawTransferBuffer) {
        let mut state = self.state.lock();
        let id = id_of(buffer);
        if !state.check(id, ResourceKind::TransferBuffer) {
            return;
        }
        match state.objects.get_mut(&id) {
            Some(object) if object.mapped => object.mapped = false,
            _ => {
                state.misuse(format!("transfer buffer #{id} is not mapped"));
                return;
            }
        }
        state.events.push(DummyEvent::Unmapped { id });
    }

    fn create_texture(&self, device: *mut RawDevice, desc: &TextureDescriptor) -> *mut RawTexture {
        let mut state = self.state.lock();
        if !state.check(id_of(device), ResourceKind::Device)
            || state.take_failure(ResourceKind::Texture.into())
        {
            return ptr::null_mut();
        }
        if desc.format == TextureFormat::Invalid {
            state.fail("texture format is invalid");
            return ptr::null_mut();
        }
        if desc.width == 0 || desc.height == 0 || desc.layer_count_or_depth == 0 || desc.num_levels == 0
        {
            state.fail(format!(
                "texture dimensions must be non-zero (got {}x{}x{}, {} levels)",
                desc.width, desc.height, desc.layer_count_or_depth, desc.num_levels
            ));
            return ptr::null_mut();
        }
        let size = desc.base_level_size() * u64::from(desc.layer_count_or_depth);
        let id = state.create(Object {
            data: vec![0; size as usize],
            extent: (desc.width, desc.height, desc.layer_count_or_depth),
            block_size: desc.format.block_size(),
            ..Object::new(ResourceKind::Texture)
        });
        to_ptr(id)
    }

    fn set_texture_name(&self, _device: *mut RawDevice, texture: *mut RawTexture, name: &str) {
        let mut state = self.state.lock();
        let id = id_of(texture);
        if state.check(id, ResourceKind::Texture) {
            state.events.push(DummyEvent::Named {
                kind: ResourceKind::Texture,
                id,
                name: name.to_string(),
            });
        }
    }

    fn release_texture(&self, _device: *mut RawDevice, texture: *mut RawTexture) {
        self.state
            .lock()
            .release(id_of(texture), ResourceKind::Texture);
    }

    fn create_sampler(&self, device: *mut RawDevice, desc: &SamplerDescriptor) -> *mut RawSampler {
        let mut state = self.state.lock();
        if !state.check(id_of(device), ResourceKind::Device)
            || state.take_failure(ResourceKind::Sampler.into())
        {
            return ptr::null_mut();
        }
        if desc.enable_anisotropy && desc.max_anisotropy > 16.0 {
            state.fail(format!(
                "max anisotropy {} exceeds the device limit of 16",
                desc.max_anisotropy
            ));
            return ptr::null_mut();
        }
        let id = state.create(Object::new(ResourceKind::Sampler));
        to_ptr(id)
    }

    fn release_sampler(&self, _device: *mut RawDevice, sampler: *mut RawSampler) {
        self.state
            .lock()
            .release(id_of(sampler), ResourceKind::Sampler);
    }

    fn create_shader(&self, device: *mut RawDevice, info: &ShaderCreateInfo<'_>) -> *mut RawShader {
        let mut state = self.state.lock();
        let device = id_of(device);
        if !state.check(device, ResourceKind::Device)
            || state.take_failure(ResourceKind::Shader.into())
        {
            return ptr::null_mut();
        }
        let supported = state
            .objects
            .get(&device)
            .map_or(ShaderFormat::empty(), |o| o.formats);
        if !supported.contains(info.format) || info.format.is_empty() {
            state.fail(format!(
                "{} shaders are not supported by this device",
                info.format.name()
            ));
            return ptr::null_mut();
        }
        if info.code.is_empty() {
            state.fail("shader code is empty");
            return ptr::null_mut();
        }
        let id = state.create(Object {
            stage: Some(info.stage),
            ..Object::new(ResourceKind::Shader)
        });
        to_ptr(id)
    }

    fn release_shader(&self, _device: *mut RawDevice, shader: *mut RawShader) {
        self.state
            .lock()
            .release(id_of(shader), ResourceKind::Shader);
    }

    fn create_graphics_pipeline(
        &self,
        device: *mut RawDevice,
        info: &PipelineCreateInfo<'_>,
    ) -> *mut RawGraphicsPipeline {
        let mut state = self.state.lock();
        let (vertex, fragment) = (id_of(info.vertex_shader), id_of(info.fragment_shader));
        if !state.check(id_of(device), ResourceKind::Device)
            || !state.check(vertex, ResourceKind::Shader)
            || !state.check(fragment, ResourceKind::Shader)
            || state.take_failure(ResourceKind::GraphicsPipeline.into())
        {
            return ptr::null_mut();
        }
        let stage = |state: &State, id: usize| state.objects.get(&id).and_then(|o| o.stage);
        if stage(&state, vertex) != Some(ShaderStage::Vertex)
            || stage(&state, fragment) != Some(ShaderStage::Fragment)
        {
            state.fail("shader stages do not match their pipeline slots");
            return ptr::null_mut();
        }
        let id = state.create(Object::new(ResourceKind::GraphicsPipeline));
        to_ptr(id)
    }

    fn release_graphics_pipeline(&self, _device: *mut RawDevice, pipeline: *mut RawGraphicsPipeline) {
        self.state
            .lock()
            .release(id_of(pipeline), ResourceKind::GraphicsPipeline);
    }

    fn acquire_command_buffer(&self, device: *mut RawDevice) -> *mut RawCommandBuffer {
        let mut state = self.state.lock();
        if !state.check(id_of(device), ResourceKind::Device)
            || state.take_failure(ResourceKind::CommandBuffer.into())
        {
            return ptr::null_mut();
        }
        let id = state.create(Object::new(ResourceKind::CommandBuffer));
        to_ptr(id)
    }

    fn submit_command_buffer(&self, command_buffer: *mut RawCommandBuffer) -> bool {
        let mut state = self.state.lock();
        let id = id_of(command_buffer);
        if !state.check(id, ResourceKind::CommandBuffer) {
            return false;
        }
        let open_pass = state.objects.get(&id).and_then(|o| o.open_pass);

        // Submission consumes the command buffer, its passes and the
        // swapchain textures acquired through it.
        state.objects.retain(|_, o| o.owner != Some(id));
        state.objects.remove(&id);

        if let Some(pass) = open_pass {
            state.misuse(format!(
                "command buffer #{id} submitted while pass #{pass} is open"
            ));
            return false;
        }
        if state.take_failure(FailurePoint::Submit) {
            return false;
        }
        log::trace!("DummyBackend: submitted command buffer #{}", id);
        state.events.push(DummyEvent::Submitted { command_buffer: id });
        true
    }

    fn wait_and_acquire_swapchain_texture(
        &self,
        command_buffer: *mut RawCommandBuffer,
        window: RawWindowHandle,
    ) -> Option<AcquiredSwapchainTexture> {
        let mut state = self.state.lock();
        let command_buffer = id_of(command_buffer);
        if !state.check(command_buffer, ResourceKind::CommandBuffer)
            || state.take_failure(FailurePoint::SwapchainAcquire)
        {
            return None;
        }
        if !state.claimed_windows.contains(&window_key(window)) {
            state.fail("window has not been claimed by the device");
            return None;
        }
        if state.minimized {
            return Some(AcquiredSwapchainTexture {
                texture: ptr::null_mut(),
                width: 0,
                height: 0,
            });
        }

        let (width, height) = state.swapchain_size;
        let block_size = state.swapchain_format.block_size();
        let texture = state.insert(Object {
            data: vec![0; (width * height * block_size) as usize],
            swapchain: true,
            owner: Some(command_buffer),
            extent: (width, height, 1),
            block_size,
            ..Object::new(ResourceKind::Texture)
        });
        state.events.push(DummyEvent::SwapchainAcquired { texture });
        Some(AcquiredSwapchainTexture {
            texture: to_ptr(texture),
            width,
            height,
        })
    }

    fn push_vertex_uniform_data(
        &self,
        command_buffer: *mut RawCommandBuffer,
        slot: u32,
        data: &[u8],
    ) {
        let mut state = self.state.lock();
        if state.check(id_of(command_buffer), ResourceKind::CommandBuffer) {
            state.events.push(DummyEvent::UniformsPushed {
                stage: ShaderStage::Vertex,
                slot,
                len: data.len(),
            });
        }
    }

    fn push_fragment_uniform_data(
        &self,
        command_buffer: *mut RawCommandBuffer,
        slot: u32,
        data: &[u8],
    ) {
        let mut state = self.state.lock();
        if state.check(id_of(command_buffer), ResourceKind::CommandBuffer) {
            state.events.push(DummyEvent::UniformsPushed {
                stage: ShaderStage::Fragment,
                slot,
                len: data.len(),
            });
        }
    }

    fn generate_mipmaps(&self, command_buffer: *mut RawCommandBuffer, texture: *mut RawTexture) {
        let mut state = self.state.lock();
        let (command_buffer, texture) = (id_of(command_buffer), id_of(texture));
        if !state.check(command_buffer, ResourceKind::CommandBuffer)
            || !state.check(texture, ResourceKind::Texture)
        {
            return;
        }
        if let Some(pass) = state.objects.get(&command_buffer).and_then(|o| o.open_pass) {
            state.misuse(format!(
                "mipmaps generated while pass #{pass} is open"
            ));
            return;
        }
        state.reference(command_buffer, [texture]);
        state.events.push(DummyEvent::MipmapsGenerated { texture });
    }

    fn begin_render_pass(
        &self,
        command_buffer: *mut RawCommandBuffer,
        color_targets: &[NativeColorTarget],
        depth_stencil_target: Option<&NativeDepthStencilTarget>,
    ) -> *mut RawRenderPass {
        let mut state = self.state.lock();
        let command_buffer = id_of(command_buffer);
        let color_ids: Vec<usize> = color_targets.iter().map(|t| id_of(t.texture)).collect();
        let depth_id = depth_stencil_target.map(|t| id_of(t.texture));
        for &texture in color_ids.iter().chain(depth_id.iter()) {
            if !state.check(texture, ResourceKind::Texture) {
                return ptr::null_mut();
            }
        }
        let pass = state.begin_pass(command_buffer, ResourceKind::RenderPass);
        if pass.is_some() {
            state.reference(command_buffer, color_ids.iter().chain(depth_id.iter()).copied());
            state.events.push(DummyEvent::RenderPassBegun {
                command_buffer,
                color_targets: color_ids,
                depth_target: depth_id,
            });
        }
        created(pass)
    }

    fn bind_graphics_pipeline(&self, pass: *mut RawRenderPass, pipeline: *mut RawGraphicsPipeline) {
        let mut state = self.state.lock();
        let (pass, pipeline) = (id_of(pass), id_of(pipeline));
        let Some(owner) = state.pass_owner(pass, ResourceKind::RenderPass) else {
            return;
        };
        if !state.check(pipeline, ResourceKind::GraphicsPipeline) {
            return;
        }
        if let Some(object) = state.objects.get_mut(&pass) {
            object.pipeline_bound = true;
        }
        state.reference(owner, [pipeline]);
        state.events.push(DummyEvent::PipelineBound { pipeline });
    }

    fn bind_vertex_buffers(
        &self,
        pass: *mut RawRenderPass,
        first_slot: u32,
        bindings: &[NativeBufferBinding],
    ) {
        let mut state = self.state.lock();
        let Some(owner) = state.pass_owner(id_of(pass), ResourceKind::RenderPass) else {
            return;
        };
        let buffers: Vec<usize> = bindings.iter().map(|b| id_of(b.buffer)).collect();
        for &buffer in &buffers {
            if !state.check(buffer, ResourceKind::Buffer) {
                return;
            }
        }
        state.reference(owner, buffers.iter().copied());
        state.events.push(DummyEvent::VertexBuffersBound {
            first_slot,
            buffers,
        });
    }

    fn bind_index_buffer(
        &self,
        pass: *mut RawRenderPass,
        binding: &NativeBufferBinding,
        element_size: IndexElementSize,
    ) {
        let mut state = self.state.lock();
        let (pass, buffer) = (id_of(pass), id_of(binding.buffer));
        let Some(owner) = state.pass_owner(pass, ResourceKind::RenderPass) else {
            return;
        };
        if !state.check(buffer, ResourceKind::Buffer) {
            return;
        }
        if let Some(object) = state.objects.get_mut(&pass) {
            object.index_bound = true;
        }
        state.reference(owner, [buffer]);
        state.events.push(DummyEvent::IndexBufferBound {
            buffer,
            element_size,
        });
    }

    fn bind_fragment_samplers(
        &self,
        pass: *mut RawRenderPass,
        first_slot: u32,
        bindings: &[NativeTextureSamplerBinding],
    ) {
        let mut state = self.state.lock();
        let Some(owner) = state.pass_owner(id_of(pass), ResourceKind::RenderPass) else {
            return;
        };
        for binding in bindings {
            if !state.check(id_of(binding.texture), ResourceKind::Texture)
                || !state.check(id_of(binding.sampler), ResourceKind::Sampler)
            {
                return;
            }
        }
        state.reference(
            owner,
            bindings
                .iter()
                .flat_map(|b| [id_of(b.texture), id_of(b.sampler)]),
        );
        state.events.push(DummyEvent::FragmentSamplersBound {
            first_slot,
            count: bindings.len(),
        });
    }

    fn set_viewport(&self, pass: *mut RawRenderPass, viewport: &Viewport) {
        let mut state = self.state.lock();
        if state
            .pass_owner(id_of(pass), ResourceKind::RenderPass)
            .is_some()
        {
            state.events.push(DummyEvent::ViewportSet(*viewport));
        }
    }

    fn set_scissor(&self, pass: *mut RawRenderPass, scissor: &ScissorRect) {
        let mut state = self.state.lock();
        if state
            .pass_owner(id_of(pass), ResourceKind::RenderPass)
            .is_some()
        {
            state.events.push(DummyEvent::ScissorSet(*scissor));
        }
    }

    fn draw_primitives(
        &self,
        pass: *mut RawRenderPass,
        num_vertices: u32,
        num_instances: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        let mut state = self.state.lock();
        let pass = id_of(pass);
        if state.pass_owner(pass, ResourceKind::RenderPass).is_none() {
            return;
        }
        if !state.objects.get(&pass).is_some_and(|o| o.pipeline_bound) {
            state.misuse(format!("draw in render pass #{pass} without a bound pipeline"));
            return;
        }
        state.events.push(DummyEvent::Draw {
            vertices: num_vertices,
            instances: num_instances,
            first_vertex,
            first_instance,
        });
    }

    fn draw_indexed_primitives(
        &self,
        pass: *mut RawRenderPass,
        num_indices: u32,
        num_instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        let mut state = self.state.lock();
        let pass = id_of(pass);
        if state.pass_owner(pass, ResourceKind::RenderPass).is_none() {
            return;
        }
        let (pipeline_bound, index_bound) = state
            .objects
            .get(&pass)
            .map_or((false, false), |o| (o.pipeline_bound, o.index_bound));
        if !pipeline_bound || !index_bound {
            state.misuse(format!(
                "indexed draw in render pass #{pass} without a bound pipeline and index buffer"
            ));
            return;
        }
        state.events.push(DummyEvent::DrawIndexed {
            indices: num_indices,
            instances: num_instances,
            first_index,
            vertex_offset,
            first_instance,
        });
    }

    fn end_render_pass(&self, pass: *mut RawRenderPass) {
        let mut state = self.state.lock();
        let id = id_of(pass);
        if state.end_pass(id, ResourceKind::RenderPass) {
            state.events.push(DummyEvent::RenderPassEnded { id });
        }
    }

    fn begin_copy_pass(&self, command_buffer: *mut RawCommandBuffer) -> *mut RawCopyPass {
        let mut state = self.state.lock();
        let command_buffer = id_of(command_buffer);
        let pass = state.begin_pass(command_buffer, ResourceKind::CopyPass);
        if pass.is_some() {
            state
                .events
                .push(DummyEvent::CopyPassBegun { command_buffer });
        }
        created(pass)
    }

    fn upload_to_buffer(
        &self,
        pass: *mut RawCopyPass,
        source: &TransferBufferLocation,
        destination: &BufferRegion,
        _cycle: bool,
    ) {
        let mut state = self.state.lock();
        let (src, dst) = (id_of(source.transfer_buffer), id_of(destination.buffer));
        let Some(owner) = state.pass_owner(id_of(pass), ResourceKind::CopyPass) else {
            return;
        };
        if !state.check(src, ResourceKind::TransferBuffer) || !state.check(dst, ResourceKind::Buffer) {
            return;
        }

        let Some(source_object) = state.objects.get(&src) else {
            return;
        };
        if source_object.mapped {
            state.misuse(format!("upload from transfer buffer #{src} while it is mapped"));
            return;
        }
        let size = u64::from(destination.size);
        let src_range = u64::from(source.offset)..u64::from(source.offset) + size;
        let dst_range = u64::from(destination.offset)..u64::from(destination.offset) + size;
        let dst_len = state.objects.get(&dst).map_or(0, |o| o.data.len()) as u64;
        if src_range.end > source_object.data.len() as u64 || dst_range.end > dst_len {
            state.misuse(format!(
                "upload of {size} bytes from transfer buffer #{src} offset {} into buffer #{dst} offset {} is out of range",
                source.offset, destination.offset
            ));
            return;
        }

        let bytes = source_object.data[src_range.start as usize..src_range.end as usize].to_vec();
        if let Some(target) = state.objects.get_mut(&dst) {
            target.data[dst_range.start as usize..dst_range.end as usize].copy_from_slice(&bytes);
        }
        state.reference(owner, [src, dst]);
        state.events.push(DummyEvent::BufferUploaded {
            transfer_buffer: src,
            buffer: dst,
            dst_offset: destination.offset,
            size: destination.size,
        });
    }

    fn upload_to_texture(
        &self,
        pass: *mut RawCopyPass,
        source: &TextureTransferInfo,
        destination: &TextureRegion,
        _cycle: bool,
    ) {
        let mut state = self.state.lock();
        let (src, dst) = (id_of(source.transfer_buffer), id_of(destination.texture));
        let Some(owner) = state.pass_owner(id_of(pass), ResourceKind::CopyPass) else {
            return;
        };
        if !state.check(src, ResourceKind::TransferBuffer) || !state.check(dst, ResourceKind::Texture) {
            return;
        }
        let Some(source_object) = state.objects.get(&src) else {
            return;
        };
        let Some(target) = state.objects.get(&dst) else {
            return;
        };
        if source_object.mapped {
            state.misuse(format!("upload from transfer buffer #{src} while it is mapped"));
            return;
        }

        let (width, height, layers) = target.extent;
        let mip = destination.mip_level;
        let shrink = |size: u32| size.checked_shr(mip).unwrap_or(0).max(1);
        let (level_width, level_height) = (shrink(width), shrink(height));
        let block = u64::from(target.block_size);
        let slice = u64::from(destination.layer) + u64::from(destination.z);
        let (w, h, d) = (
            u64::from(destination.w),
            u64::from(destination.h),
            u64::from(destination.d.max(1)),
        );
        let row = u64::from(if source.pixels_per_row == 0 {
            destination.w
        } else {
            source.pixels_per_row
        });
        let rows = u64::from(if source.rows_per_layer == 0 {
            destination.h
        } else {
            source.rows_per_layer
        });
        let needed = u64::from(source.offset) + row * rows * d * block;
        if u64::from(destination.x) + w > u64::from(level_width)
            || u64::from(destination.y) + h > u64::from(level_height)
            || slice + d > u64::from(layers)
            || row < w
            || rows < h
            || needed > source_object.data.len() as u64
        {
            state.misuse(format!(
                "upload from transfer buffer #{src} into texture #{dst} mip {mip} is out of range"
            ));
            return;
        }

        // Only the base level is backed by host memory.
        if mip == 0 {
            let mut writes = Vec::new();
            for z in 0..d {
                for y in 0..h {
                    let src_offset = u64::from(source.offset) + ((z * rows + y) * row) * block;
                    let dst_offset = (((slice + z) * u64::from(height)
                        + u64::from(destination.y)
                        + y)
                        * u64::from(width)
                        + u64::from(destination.x))
                        * block;
                    let len = (w * block) as usize;
                    let start = src_offset as usize;
                    writes.push((
                        dst_offset as usize,
                        source_object.data[start..start + len].to_vec(),
                    ));
                }
            }
            if let Some(target) = state.objects.get_mut(&dst) {
                for (offset, bytes) in writes {
                    target.data[offset..offset + bytes.len()].copy_from_slice(&bytes);
                }
            }
        }
        state.reference(owner, [src, dst]);
        state.events.push(DummyEvent::TextureUploaded {
            transfer_buffer: src,
            texture: dst,
            mip_level: mip,
        });
    }

    fn end_copy_pass(&self, pass: *mut RawCopyPass) {
        let mut state = self.state.lock();
        let id = id_of(pass);
        if state.end_pass(id, ResourceKind::CopyPass) {
            state.events.push(DummyEvent::CopyPassEnded { id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(backend: &DummyBackend) -> *mut RawDevice {
        backend.create_device(ShaderFormat::all(), true, None)
    }

    #[test]
    fn test_device_formats_are_intersected_with_requested() {
        let backend = DummyBackend::new().with_shader_formats(ShaderFormat::SPIRV | ShaderFormat::MSL);
        let device = backend.create_device(ShaderFormat::MSL | ShaderFormat::DXIL, false, None);
        assert_eq!(backend.shader_formats(device), ShaderFormat::MSL);
        backend.destroy_device(device);
        assert!(backend.misuses().is_empty());
    }

    #[test]
    fn test_injected_failure_sets_last_error_once() {
        let backend = DummyBackend::new();
        let device = device(&backend);
        let desc = BufferDescriptor::new(16, Default::default());
        backend.fail_next(ResourceKind::Buffer, "out of memory");
        assert!(backend.create_buffer(device, &desc).is_null());
        assert_eq!(backend.last_error(), "out of memory");
        let buffer = backend.create_buffer(device, &desc);
        assert!(!buffer.is_null());
        backend.release_buffer(device, buffer);
    }

    #[test]
    fn test_double_release_is_a_misuse() {
        let backend = DummyBackend::new();
        let device = device(&backend);
        let sampler = backend.create_sampler(device, &SamplerDescriptor::default());
        backend.release_sampler(device, sampler);
        backend.release_sampler(device, sampler);
        assert_eq!(backend.misuses().len(), 1);
    }

    #[test]
    fn test_second_pass_on_command_buffer_is_rejected() {
        let backend = DummyBackend::new();
        let device = device(&backend);
        let cb = backend.acquire_command_buffer(device);
        let first = backend.begin_copy_pass(cb);
        assert!(!first.is_null());
        assert!(backend.begin_copy_pass(cb).is_null());
        backend.end_copy_pass(first);
        let second = backend.begin_copy_pass(cb);
        assert!(!second.is_null());
        backend.end_copy_pass(second);
        assert!(backend.submit_command_buffer(cb));
        assert_eq!(backend.misuses().len(), 1);
    }

    #[test]
    fn test_mapped_memory_is_uploaded() {
        let backend = DummyBackend::new();
        let device = device(&backend);
        let staging = backend.create_transfer_buffer(device, &TransferBufferDescriptor::upload(4));
        let buffer = backend.create_buffer(device, &BufferDescriptor::new(8, Default::default()));

        let mapped = backend.map_transfer_buffer(device, staging, false);
        assert!(!mapped.is_null());
        // SAFETY: the dummy maps the full four bytes of the transfer buffer.
        unsafe { std::slice::from_raw_parts_mut(mapped, 4) }.copy_from_slice(&[1, 2, 3, 4]);
        backend.unmap_transfer_buffer(device, staging);

        let cb = backend.acquire_command_buffer(device);
        let pass = backend.begin_copy_pass(cb);
        backend.upload_to_buffer(
            pass,
            &TransferBufferLocation {
                transfer_buffer: staging,
                offset: 0,
            },
            &BufferRegion {
                buffer,
                offset: 4,
                size: 4,
            },
            false,
        );
        backend.end_copy_pass(pass);
        assert!(backend.submit_command_buffer(cb));

        assert_eq!(
            backend.buffer_contents(id_of(buffer)),
            Some(vec![0, 0, 0, 0, 1, 2, 3, 4])
        );
        assert!(backend.misuses().is_empty());
    }

    #[test]
    fn test_swapchain_texture_cannot_be_released() {
        let backend = DummyBackend::new();
        let device = device(&backend);
        let window = RawWindowHandle::Web(raw_window_handle::WebWindowHandle::new(1));
        assert!(backend.claim_window(device, window));
        let cb = backend.acquire_command_buffer(device);
        let acquired = backend
            .wait_and_acquire_swapchain_texture(cb, window)
            .expect("acquire");
        backend.release_texture(device, acquired.texture);
        assert_eq!(backend.misuses().len(), 1);
        assert!(backend.submit_command_buffer(cb));
        assert!(!backend.is_live(id_of(acquired.texture)));
    }
    #[test]
    fn test_release_while_referenced_by_pending_work_is_a_misuse() {
        let backend = DummyBackend::new();
        let device = device(&backend);
        let staging = backend.create_transfer_buffer(device, &TransferBufferDescriptor::upload(4));
        let buffer = backend.create_buffer(device, &BufferDescriptor::new(4, Default::default()));

        let cb = backend.acquire_command_buffer(device);
        let pass = backend.begin_copy_pass(cb);
        backend.upload_to_buffer(
            pass,
            &TransferBufferLocation {
                transfer_buffer: staging,
                offset: 0,
            },
            &BufferRegion {
                buffer,
                offset: 0,
                size: 4,
            },
            false,
        );
        backend.end_copy_pass(pass);
        backend.release_buffer(device, buffer);
        let misuses = backend.misuses();
        assert_eq!(misuses.len(), 1);
        assert!(misuses[0].contains("still references it"));

        assert!(backend.submit_command_buffer(cb));
        backend.release_transfer_buffer(device, staging);
        assert_eq!(backend.misuses().len(), 1);
    }
}
