//! wgpu engine backend.
//!
//! Programs are compiled to WGSL modules with a generated prelude (uniform
//! block, vertex input struct, texture and sampler bindings) and draw into
//! whichever framebuffer was last bound for rendering.

mod program;
mod resources;

use std::cell::RefCell;
use std::rc::Rc;

use crate::buffer::{AttributeBuffer, FrameBuffer, RenderBuffer, Texture};
use crate::engine::{Engine, RedrawRequest, ShaderLibrary};
use crate::error::{RenderError, RenderResult};
use crate::shader::{ShaderProgram, ShaderStageSpecification};
use crate::types::{DrawMode, RenderBufferType, RenderDataType, TextureDimension, TextureFormat};

pub use program::generate_prelude;
pub use resources::{WgpuAttributeBuffer, WgpuFrameBuffer, WgpuRenderBuffer, WgpuTexture};

/// Views of the framebuffer draws currently go to.
pub(crate) struct RenderTarget {
    pub color: Vec<(wgpu::TextureView, wgpu::TextureFormat)>,
    pub depth: Option<(wgpu::TextureView, wgpu::TextureFormat)>,
}

/// Device state shared by every resource the engine creates.
pub(crate) struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub target: RefCell<Option<RenderTarget>>,
}

impl GpuContext {
    /// Blocks until a mapped readback completes and returns its bytes.
    pub fn read_buffer(&self, buffer: &wgpu::Buffer, size: u64) -> RenderResult<Vec<u8>> {
        let slice = buffer.slice(..size);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|e| RenderError::BufferMapFailed(e.to_string()))?
            .map_err(|e| RenderError::BufferMapFailed(e.to_string()))?;
        let bytes = slice.get_mapped_range().to_vec();
        buffer.unmap();
        Ok(bytes)
    }
}

/// Engine backed by a wgpu device.
pub struct WgpuEngine {
    ctx: Rc<GpuContext>,
    library: ShaderLibrary,
    redraw: RedrawRequest,
}

impl WgpuEngine {
    /// Creates an engine on a new device with no window surface.
    pub fn new_headless() -> RenderResult<Self> {
        pollster::block_on(Self::create())
    }

    async fn create() -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("geoscope device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await
            .map_err(|e| RenderError::DeviceCreationFailed(e.to_string()))?;

        log::info!("wgpu engine on {}", adapter.get_info().name);

        Ok(Self::from_device(device, queue))
    }

    /// Wraps an existing device, e.g. one shared with a windowing layer.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            ctx: Rc::new(GpuContext {
                device,
                queue,
                target: RefCell::new(None),
            }),
            library: ShaderLibrary::with_defaults(),
            redraw: RedrawRequest::default(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.ctx.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.ctx.queue
    }
}

impl Engine for WgpuEngine {
    fn backend_name(&self) -> &'static str {
        "wgpu"
    }

    fn generate_attribute_buffer(
        &self,
        data_type: RenderDataType,
        array_count: usize,
    ) -> Rc<dyn AttributeBuffer> {
        Rc::new(WgpuAttributeBuffer::new(self.ctx.clone(), data_type, array_count))
    }

    fn generate_texture(
        &self,
        dimension: TextureDimension,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> RenderResult<Rc<dyn Texture>> {
        Ok(Rc::new(WgpuTexture::new(
            self.ctx.clone(),
            dimension,
            format,
            width,
            height,
        )?))
    }

    fn generate_render_buffer(
        &self,
        kind: RenderBufferType,
        width: u32,
        height: u32,
    ) -> RenderResult<Rc<dyn RenderBuffer>> {
        Ok(Rc::new(WgpuRenderBuffer::new(self.ctx.clone(), kind, width, height)?))
    }

    fn generate_frame_buffer(&self, width: u32, height: u32) -> RenderResult<Rc<dyn FrameBuffer>> {
        Ok(Rc::new(WgpuFrameBuffer::new(self.ctx.clone(), width, height)))
    }

    fn compile_program(
        &self,
        name: &str,
        stages: &[ShaderStageSpecification],
        draw_mode: DrawMode,
    ) -> RenderResult<ShaderProgram> {
        let backend = program::WgpuProgram::compile(self.ctx.clone(), name, stages, draw_mode)?;
        ShaderProgram::new(name, stages, draw_mode, Box::new(backend))
    }

    fn shader_library(&self) -> &ShaderLibrary {
        &self.library
    }

    fn redraw_request(&self) -> &RedrawRequest {
        &self.redraw
    }

    fn push_error_scope(&self) {
        self.ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
    }

    fn pop_error_scope(&self) -> RenderResult<()> {
        match pollster::block_on(self.ctx.device.pop_error_scope()) {
            Some(error) => Err(RenderError::ValidationFailed(error.to_string())),
            None => Ok(()),
        }
    }
}
