//! CPU-memory engine backend.
//!
//! Every resource lives in host memory and draws are recorded instead of
//! rasterized. Uniform and attribute locations follow the same rule a real
//! compiler applies: a declared name that the composed source never uses is
//! treated as optimized out. Useful for tests and for running structures
//! without a GPU.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec4;

use crate::buffer::{
    element_count, texture_byte_len, Attachment, AttributeBuffer, FrameBuffer, RenderBuffer,
    Texture,
};
use crate::engine::{Engine, RedrawRequest, ShaderLibrary};
use crate::error::{RenderError, RenderResult};
use crate::shader::{is_referenced, ProgramBackend, ShaderProgram, ShaderStageSpecification, UniformValue};
use crate::types::{
    DrawMode, FilterMode, RenderBufferType, RenderDataType, TextureDimension, TextureFormat,
};

/// Host-memory attribute buffer that counts uploads.
pub struct HeadlessAttributeBuffer {
    data_type: RenderDataType,
    array_count: usize,
    bytes: RefCell<Option<Vec<u8>>>,
    uploads: Cell<usize>,
}

impl HeadlessAttributeBuffer {
    pub fn new(data_type: RenderDataType, array_count: usize) -> Self {
        Self {
            data_type,
            array_count,
            bytes: RefCell::new(None),
            uploads: Cell::new(0),
        }
    }

    fn stride(&self) -> usize {
        self.data_type.size_bytes() * self.array_count
    }
}

impl AttributeBuffer for HeadlessAttributeBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn data_type(&self) -> RenderDataType {
        self.data_type
    }

    fn array_count(&self) -> usize {
        self.array_count
    }

    fn is_set(&self) -> bool {
        self.bytes.borrow().is_some()
    }

    fn data_size(&self) -> usize {
        self.bytes
            .borrow()
            .as_ref()
            .map_or(0, |bytes| bytes.len() / self.stride())
    }

    fn set_data_raw(&self, bytes: &[u8]) -> RenderResult<()> {
        element_count(self.data_type, self.array_count, bytes.len())?;
        *self.bytes.borrow_mut() = Some(bytes.to_vec());
        self.uploads.set(self.uploads.get() + 1);
        Ok(())
    }

    fn read_raw(&self, start: usize, count: usize) -> RenderResult<Vec<u8>> {
        let bytes = self.bytes.borrow();
        let bytes = bytes.as_deref().unwrap_or_default();
        let len = bytes.len() / self.stride();
        if start + count > len {
            return Err(RenderError::IndexOutOfRange {
                name: "attribute buffer".to_string(),
                index: start + count - 1,
                len,
            });
        }
        let stride = self.stride();
        Ok(bytes[start * stride..(start + count) * stride].to_vec())
    }

    fn upload_count(&self) -> usize {
        self.uploads.get()
    }
}

/// Host-memory texture.
pub struct HeadlessTexture {
    dimension: TextureDimension,
    format: TextureFormat,
    size: Cell<(u32, u32)>,
    filter: Cell<FilterMode>,
    bytes: RefCell<Option<Vec<u8>>>,
}

impl HeadlessTexture {
    pub fn new(dimension: TextureDimension, format: TextureFormat, width: u32, height: u32) -> Self {
        let height = match dimension {
            TextureDimension::D1 => 1,
            TextureDimension::D2 => height,
        };
        Self {
            dimension,
            format,
            size: Cell::new((width, height)),
            filter: Cell::new(FilterMode::default()),
            bytes: RefCell::new(None),
        }
    }
}

impl Texture for HeadlessTexture {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dimension(&self) -> TextureDimension {
        self.dimension
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn size(&self) -> (u32, u32) {
        self.size.get()
    }

    fn is_set(&self) -> bool {
        self.bytes.borrow().is_some()
    }

    fn filter_mode(&self) -> FilterMode {
        self.filter.get()
    }

    fn set_filter_mode(&self, mode: FilterMode) {
        self.filter.set(mode);
    }

    fn resize(&self, width: u32, height: u32) -> RenderResult<()> {
        let height = if self.dimension == TextureDimension::D1 { 1 } else { height };
        self.size.set((width, height));
        *self.bytes.borrow_mut() = None;
        Ok(())
    }

    fn set_data_raw(&self, bytes: &[u8]) -> RenderResult<()> {
        let (width, height) = self.size.get();
        let expected = texture_byte_len(self.format, width, height);
        if bytes.len() != expected {
            return Err(RenderError::TextureCreationFailed(format!(
                "expected {expected} bytes for a {width}x{height} texture, got {}",
                bytes.len()
            )));
        }
        *self.bytes.borrow_mut() = Some(bytes.to_vec());
        Ok(())
    }

    fn read_data_raw(&self) -> RenderResult<Vec<u8>> {
        self.bytes
            .borrow()
            .clone()
            .ok_or_else(|| RenderError::InternalConsistency("texture has no contents".into()))
    }
}

pub struct HeadlessRenderBuffer {
    kind: RenderBufferType,
    size: Cell<(u32, u32)>,
}

impl RenderBuffer for HeadlessRenderBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn kind(&self) -> RenderBufferType {
        self.kind
    }

    fn size(&self) -> (u32, u32) {
        self.size.get()
    }

    fn resize(&self, width: u32, height: u32) -> RenderResult<()> {
        self.size.set((width, height));
        Ok(())
    }
}

/// Framebuffer whose color contents are a plain pixel array.
pub struct HeadlessFrameBuffer {
    size: Cell<(u32, u32)>,
    color: RefCell<Vec<Attachment>>,
    depth: RefCell<Option<Attachment>>,
    clear_color: Cell<Vec4>,
    pixels: RefCell<Vec<Vec4>>,
    bound: Cell<bool>,
}

impl HeadlessFrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Cell::new((width, height)),
            color: RefCell::new(Vec::new()),
            depth: RefCell::new(None),
            clear_color: Cell::new(Vec4::new(1.0, 1.0, 1.0, 0.0)),
            pixels: RefCell::new(vec![Vec4::ZERO; width as usize * height as usize]),
            bound: Cell::new(false),
        }
    }

    /// Whether this framebuffer is the current draw target.
    pub fn is_bound(&self) -> bool {
        self.bound.get()
    }

    fn check_attachment_size(&self, attachment: &Attachment) -> RenderResult<()> {
        if attachment.size() != self.size.get() {
            return Err(RenderError::TextureCreationFailed(format!(
                "attachment is {:?}, framebuffer is {:?}",
                attachment.size(),
                self.size.get()
            )));
        }
        Ok(())
    }
}

impl FrameBuffer for HeadlessFrameBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn size(&self) -> (u32, u32) {
        self.size.get()
    }

    fn resize(&self, width: u32, height: u32) -> RenderResult<()> {
        for attachment in self.color.borrow().iter().chain(self.depth.borrow().iter()) {
            attachment.resize(width, height)?;
        }
        self.size.set((width, height));
        *self.pixels.borrow_mut() = vec![Vec4::ZERO; width as usize * height as usize];
        Ok(())
    }

    fn add_color_buffer(&self, attachment: Attachment) -> RenderResult<()> {
        self.check_attachment_size(&attachment)?;
        if attachment.is_depth() {
            return Err(RenderError::type_mismatch("color attachment", "color", "depth"));
        }
        self.color.borrow_mut().push(attachment);
        Ok(())
    }

    fn add_depth_buffer(&self, attachment: Attachment) -> RenderResult<()> {
        self.check_attachment_size(&attachment)?;
        if !attachment.is_depth() {
            return Err(RenderError::type_mismatch("depth attachment", "depth", "color"));
        }
        *self.depth.borrow_mut() = Some(attachment);
        Ok(())
    }

    fn set_clear_color(&self, color: Vec4) {
        self.clear_color.set(color);
    }

    fn clear_color(&self) -> Vec4 {
        self.clear_color.get()
    }

    fn clear(&self) -> RenderResult<()> {
        let color = self.clear_color.get();
        self.pixels.borrow_mut().fill(color);
        Ok(())
    }

    fn bind_for_rendering(&self) -> RenderResult<()> {
        if self.color.borrow().is_empty() {
            return Err(RenderError::IncompleteBinding {
                program: "framebuffer".to_string(),
                slot: "color attachment".to_string(),
            });
        }
        self.bound.set(true);
        Ok(())
    }

    fn read_float4(&self, x: u32, y: u32) -> RenderResult<Vec4> {
        let (width, height) = self.size.get();
        if x >= width || y >= height {
            return Err(RenderError::IndexOutOfRange {
                name: "framebuffer pixel".to_string(),
                index: (y as usize) * width as usize + x as usize,
                len: width as usize * height as usize,
            });
        }
        Ok(self.pixels.borrow()[(y as usize) * width as usize + x as usize])
    }
}

/// One recorded draw call.
#[derive(Clone)]
pub struct DrawRecord {
    pub program: String,
    pub mode: DrawMode,
    pub vertex_count: usize,
    pub index_count: usize,
    pub instance_count: u32,
    pub uniforms: Vec<(String, UniformValue)>,
    pub attributes: Vec<(String, Rc<dyn AttributeBuffer>)>,
    pub textures: Vec<String>,
}

impl DrawRecord {
    /// The buffer bound to `name` at draw time.
    pub fn attribute(&self, name: &str) -> Option<&Rc<dyn AttributeBuffer>> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, buffer)| buffer)
    }

    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| *value)
    }
}

impl std::fmt::Debug for DrawRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawRecord")
            .field("program", &self.program)
            .field("mode", &self.mode)
            .field("vertex_count", &self.vertex_count)
            .field("index_count", &self.index_count)
            .finish_non_exhaustive()
    }
}

struct HeadlessProgram {
    uniforms: HashMap<String, u32>,
    attributes: HashMap<String, u32>,
    textures: HashMap<String, u32>,
    log: Rc<RefCell<Vec<DrawRecord>>>,
}

impl HeadlessProgram {
    fn new(stages: &[ShaderStageSpecification], log: Rc<RefCell<Vec<DrawRecord>>>) -> Self {
        fn live<'a>(
            stages: &[ShaderStageSpecification],
            names: impl Iterator<Item = &'a String>,
        ) -> HashMap<String, u32> {
            let mut locations = HashMap::new();
            for name in names {
                if !locations.contains_key(name) && is_referenced(stages, name) {
                    let next = u32::try_from(locations.len()).unwrap_or(u32::MAX);
                    locations.insert(name.clone(), next);
                }
            }
            locations
        }

        Self {
            uniforms: live(stages, stages.iter().flat_map(|s| s.uniforms.iter().map(|u| &u.name))),
            attributes: live(
                stages,
                stages.iter().flat_map(|s| s.attributes.iter().map(|a| &a.name)),
            ),
            textures: live(stages, stages.iter().flat_map(|s| s.textures.iter().map(|t| &t.name))),
            log,
        }
    }
}

impl ProgramBackend for HeadlessProgram {
    fn uniform_location(&self, name: &str) -> Option<u32> {
        self.uniforms.get(name).copied()
    }

    fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    fn texture_location(&self, name: &str) -> Option<u32> {
        self.textures.get(name).copied()
    }

    fn create_attribute_buffer(
        &self,
        data_type: RenderDataType,
        array_count: usize,
    ) -> Rc<dyn AttributeBuffer> {
        Rc::new(HeadlessAttributeBuffer::new(data_type, array_count))
    }

    fn create_texture(
        &self,
        dimension: TextureDimension,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> RenderResult<Rc<dyn Texture>> {
        Ok(Rc::new(HeadlessTexture::new(dimension, format, width, height)))
    }

    fn draw(&self, program: &ShaderProgram) -> RenderResult<()> {
        let vertex_count = program.vertex_count();
        let mut index_count = 0;

        if program.draw_mode().is_indexed() {
            if let Some(index) = program.index_buffer() {
                let indices = index.get_data::<u32>()?;
                index_count = indices.len();
                let restart = program.primitive_restart_index();
                if let Some(&bad) = indices
                    .iter()
                    .find(|&&i| Some(i) != restart && i as usize >= vertex_count)
                {
                    return Err(RenderError::IndexOutOfRange {
                        name: format!("{} index", program.name()),
                        index: bad as usize,
                        len: vertex_count,
                    });
                }
            }
        }

        self.log.borrow_mut().push(DrawRecord {
            program: program.name().to_string(),
            mode: program.draw_mode(),
            vertex_count,
            index_count,
            instance_count: program.instance_count(),
            uniforms: program
                .uniforms()
                .iter()
                .filter_map(|u| u.value.map(|v| (u.name.clone(), v)))
                .collect(),
            attributes: program
                .attributes()
                .iter()
                .filter_map(|a| a.buffer.clone().map(|b| (a.name.clone(), b)))
                .collect(),
            textures: program
                .textures()
                .iter()
                .filter(|t| t.texture.is_some())
                .map(|t| t.name.clone())
                .collect(),
        });
        Ok(())
    }
}

/// Engine backend that keeps everything in host memory.
pub struct HeadlessEngine {
    library: ShaderLibrary,
    redraw: RedrawRequest,
    log: Rc<RefCell<Vec<DrawRecord>>>,
    compiled: Cell<usize>,
    open_scopes: Cell<usize>,
    checked_scopes: Cell<usize>,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessEngine {
    /// Creates an engine with the built-in shader library.
    pub fn new() -> Self {
        Self {
            library: ShaderLibrary::with_defaults(),
            redraw: RedrawRequest::default(),
            log: Rc::new(RefCell::new(Vec::new())),
            compiled: Cell::new(0),
            open_scopes: Cell::new(0),
            checked_scopes: Cell::new(0),
        }
    }

    /// Draw calls issued since creation or the last [`Self::clear_draw_log`].
    pub fn draw_log(&self) -> Vec<DrawRecord> {
        self.log.borrow().clone()
    }

    pub fn clear_draw_log(&self) {
        self.log.borrow_mut().clear();
    }

    /// Number of programs compiled so far.
    pub fn compile_count(&self) -> usize {
        self.compiled.get()
    }

    /// Number of error scopes opened and closed so far.
    pub fn checked_scope_count(&self) -> usize {
        self.checked_scopes.get()
    }
}

impl Engine for HeadlessEngine {
    fn backend_name(&self) -> &'static str {
        "headless"
    }

    fn generate_attribute_buffer(
        &self,
        data_type: RenderDataType,
        array_count: usize,
    ) -> Rc<dyn AttributeBuffer> {
        Rc::new(HeadlessAttributeBuffer::new(data_type, array_count))
    }

    fn generate_texture(
        &self,
        dimension: TextureDimension,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> RenderResult<Rc<dyn Texture>> {
        Ok(Rc::new(HeadlessTexture::new(dimension, format, width, height)))
    }

    fn generate_render_buffer(
        &self,
        kind: RenderBufferType,
        width: u32,
        height: u32,
    ) -> RenderResult<Rc<dyn RenderBuffer>> {
        Ok(Rc::new(HeadlessRenderBuffer {
            kind,
            size: Cell::new((width, height)),
        }))
    }

    fn generate_frame_buffer(&self, width: u32, height: u32) -> RenderResult<Rc<dyn FrameBuffer>> {
        Ok(Rc::new(HeadlessFrameBuffer::new(width, height)))
    }

    fn push_error_scope(&self) {
        self.open_scopes.set(self.open_scopes.get() + 1);
    }

    // Headless draws validate eagerly, so a scope only has to be balanced.
    fn pop_error_scope(&self) -> RenderResult<()> {
        let open = self.open_scopes.get();
        if open == 0 {
            return Err(RenderError::InternalConsistency(
                "error scope popped without a matching push".to_string(),
            ));
        }
        self.open_scopes.set(open - 1);
        self.checked_scopes.set(self.checked_scopes.get() + 1);
        Ok(())
    }

    fn compile_program(
        &self,
        name: &str,
        stages: &[ShaderStageSpecification],
        draw_mode: DrawMode,
    ) -> RenderResult<ShaderProgram> {
        self.compiled.set(self.compiled.get() + 1);
        let backend = HeadlessProgram::new(stages, self.log.clone());
        ShaderProgram::new(name, stages, draw_mode, Box::new(backend))
    }

    fn shader_library(&self) -> &ShaderLibrary {
        &self.library
    }

    fn redraw_request(&self) -> &RedrawRequest {
        &self.redraw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test upload counting and readback.
    #[test]
    fn test_attribute_buffer_uploads() {
        let engine = HeadlessEngine::new();
        let buffer = engine.generate_attribute_buffer(RenderDataType::Float, 1);
        assert!(!buffer.is_set());
        assert_eq!(buffer.data_size(), 0);

        buffer.set_data(&[1.0_f32, 2.0, 3.0]).unwrap();
        assert_eq!(buffer.upload_count(), 1);
        assert_eq!(buffer.data_size(), 3);
        assert_eq!(buffer.get_value::<f32>(2).unwrap(), 3.0);
        assert!(buffer.get_value::<f32>(3).is_err());
        assert!(buffer.set_data(&[glam::Vec2::ZERO]).is_err());
        assert_eq!(buffer.upload_count(), 1);
    }

    /// Test framebuffer clear and attachment checks.
    #[test]
    fn test_frame_buffer_clear() {
        let engine = HeadlessEngine::new();
        let fb = engine.generate_frame_buffer(4, 2).unwrap();
        assert!(fb.bind_for_rendering().is_err());

        let color = engine
            .generate_render_buffer(RenderBufferType::Float4, 4, 2)
            .unwrap();
        let depth = engine
            .generate_render_buffer(RenderBufferType::Depth, 4, 2)
            .unwrap();
        assert!(fb.add_color_buffer(Attachment::RenderBuffer(depth.clone())).is_err());
        fb.add_color_buffer(Attachment::RenderBuffer(color.clone())).unwrap();
        fb.add_depth_buffer(Attachment::RenderBuffer(depth)).unwrap();
        fb.bind_for_rendering().unwrap();

        fb.set_clear_color(Vec4::new(0.1, 0.2, 0.3, 1.0));
        fb.clear().unwrap();
        assert_eq!(fb.read_float4(3, 1).unwrap(), Vec4::new(0.1, 0.2, 0.3, 1.0));
        assert!(fb.read_float4(4, 0).is_err());

        fb.resize(8, 8).unwrap();
        assert_eq!(color.size(), (8, 8));
    }

    /// Test that error scopes must be balanced.
    #[test]
    fn test_error_scopes() {
        let engine = HeadlessEngine::new();
        assert!(engine.pop_error_scope().is_err());
        engine.push_error_scope();
        engine.push_error_scope();
        engine.pop_error_scope().unwrap();
        engine.pop_error_scope().unwrap();
        assert_eq!(engine.checked_scope_count(), 2);
        assert!(engine.pop_error_scope().is_err());
    }

    /// Test texture upload size checking.
    #[test]
    fn test_texture_upload_size() {
        let engine = HeadlessEngine::new();
        let texture = engine
            .generate_texture(TextureDimension::D1, TextureFormat::R32F, 4, 7)
            .unwrap();
        assert_eq!(texture.size(), (4, 1));
        assert!(texture.set_data_raw(&[0u8; 12]).is_err());
        texture.set_data_raw(&[0u8; 16]).unwrap();
        assert!(texture.is_set());
    }
}
