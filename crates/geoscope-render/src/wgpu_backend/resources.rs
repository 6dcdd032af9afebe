use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glam::Vec4;
use wgpu::util::DeviceExt;

use super::{GpuContext, RenderTarget};
use crate::buffer::{
    element_count, texture_byte_len, Attachment, AttributeBuffer, FrameBuffer, RenderBuffer,
    Texture,
};
use crate::error::{RenderError, RenderResult};
use crate::types::{FilterMode, RenderBufferType, RenderDataType, TextureDimension, TextureFormat};

/// Attribute buffer living in device memory.
///
/// The device buffer is reused while new contents fit and reallocated otherwise.
pub struct WgpuAttributeBuffer {
    ctx: Rc<GpuContext>,
    data_type: RenderDataType,
    array_count: usize,
    buffer: RefCell<Option<wgpu::Buffer>>,
    len: Cell<usize>,
    uploads: Cell<usize>,
}

impl WgpuAttributeBuffer {
    pub(crate) fn new(ctx: Rc<GpuContext>, data_type: RenderDataType, array_count: usize) -> Self {
        Self {
            ctx,
            data_type,
            array_count,
            buffer: RefCell::new(None),
            len: Cell::new(0),
            uploads: Cell::new(0),
        }
    }

    fn stride(&self) -> usize {
        self.data_type.size_bytes() * self.array_count
    }

    /// The device buffer, once data has been uploaded.
    pub fn raw(&self) -> std::cell::Ref<'_, Option<wgpu::Buffer>> {
        self.buffer.borrow()
    }
}

impl AttributeBuffer for WgpuAttributeBuffer {
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
        self.buffer.borrow().is_some()
    }

    fn data_size(&self) -> usize {
        self.len.get()
    }

    fn set_data_raw(&self, bytes: &[u8]) -> RenderResult<()> {
        let count = element_count(self.data_type, self.array_count, bytes.len())?;
        let mut slot = self.buffer.borrow_mut();
        match slot.as_ref() {
            Some(buffer) if !bytes.is_empty() && buffer.size() >= bytes.len() as u64 => {
                self.ctx.queue.write_buffer(buffer, 0, bytes);
            }
            _ => {
                // Zero-sized buffers cannot be bound, keep one padding element.
                let padding = [0u8; 4];
                let contents = if bytes.is_empty() { &padding[..] } else { bytes };
                *slot = Some(self.ctx.device.create_buffer_init(
                    &wgpu::util::BufferInitDescriptor {
                        label: Some("geoscope attribute buffer"),
                        contents,
                        usage: wgpu::BufferUsages::VERTEX
                            | wgpu::BufferUsages::INDEX
                            | wgpu::BufferUsages::COPY_DST
                            | wgpu::BufferUsages::COPY_SRC,
                    },
                ));
            }
        }
        self.len.set(count);
        self.uploads.set(self.uploads.get() + 1);
        Ok(())
    }

    fn read_raw(&self, start: usize, count: usize) -> RenderResult<Vec<u8>> {
        let len = self.len.get();
        if start + count > len {
            return Err(RenderError::IndexOutOfRange {
                name: "attribute buffer".to_string(),
                index: start + count - 1,
                len,
            });
        }
        if count == 0 {
            return Ok(Vec::new());
        }
        let slot = self.buffer.borrow();
        let buffer = slot
            .as_ref()
            .ok_or_else(|| RenderError::InternalConsistency("buffer has no storage".into()))?;

        let size = (count * self.stride()) as u64;
        let staging = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("geoscope readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("geoscope readback encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, (start * self.stride()) as u64, &staging, 0, size);
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        self.ctx.read_buffer(&staging, size)
    }

    fn upload_count(&self) -> usize {
        self.uploads.get()
    }
}

pub(crate) fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::R32F => wgpu::TextureFormat::R32Float,
        // No three-channel formats on the device, pad to four.
        TextureFormat::Rgb32F | TextureFormat::Rgba32F => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::Depth32F => wgpu::TextureFormat::Depth32Float,
    }
}

fn device_texel_bytes(format: TextureFormat) -> usize {
    match format {
        TextureFormat::Rgb32F => 16,
        other => other.texel_bytes(),
    }
}

fn pad_rgb32(bytes: &[u8]) -> Vec<u8> {
    let one = 1.0_f32.to_ne_bytes();
    bytes
        .chunks_exact(12)
        .flat_map(|texel| texel.iter().copied().chain(one))
        .collect()
}

fn unpad_rgba32(bytes: &[u8]) -> Vec<u8> {
    bytes
        .chunks_exact(16)
        .flat_map(|texel| texel[..12].iter().copied())
        .collect()
}

fn create_texture(
    ctx: &GpuContext,
    dimension: TextureDimension,
    format: TextureFormat,
    width: u32,
    height: u32,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("geoscope texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: match dimension {
            TextureDimension::D1 => wgpu::TextureDimension::D1,
            TextureDimension::D2 => wgpu::TextureDimension::D2,
        },
        format: wgpu_format(format),
        usage,
        view_formats: &[],
    })
}

fn texture_usage(dimension: TextureDimension, format: TextureFormat) -> wgpu::TextureUsages {
    if format == TextureFormat::Depth32F {
        return wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    }
    let usage = wgpu::TextureUsages::TEXTURE_BINDING
        | wgpu::TextureUsages::COPY_DST
        | wgpu::TextureUsages::COPY_SRC;
    match dimension {
        TextureDimension::D1 => usage,
        TextureDimension::D2 => usage | wgpu::TextureUsages::RENDER_ATTACHMENT,
    }
}

/// Copies a region of a texture back to the host, dropping row padding.
pub(crate) fn read_texture_region(
    ctx: &GpuContext,
    texture: &wgpu::Texture,
    origin: (u32, u32),
    size: (u32, u32),
    texel_bytes: usize,
) -> RenderResult<Vec<u8>> {
    let row = size.0 as usize * texel_bytes;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    let padded_row = row.div_ceil(align) * align;
    let total = (padded_row * size.1 as usize) as u64;

    let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("geoscope texture readback"),
        size: total,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("geoscope texture readback encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: origin.0,
                y: origin.1,
                z: 0,
            },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row as u32),
                rows_per_image: Some(size.1),
            },
        },
        wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let padded = ctx.read_buffer(&staging, total)?;
    Ok(padded
        .chunks_exact(padded_row)
        .flat_map(|r| r[..row].iter().copied())
        .collect())
}

pub struct WgpuTexture {
    ctx: Rc<GpuContext>,
    dimension: TextureDimension,
    format: TextureFormat,
    size: Cell<(u32, u32)>,
    filter: Cell<FilterMode>,
    texture: RefCell<wgpu::Texture>,
    set: Cell<bool>,
}

impl WgpuTexture {
    pub(crate) fn new(
        ctx: Rc<GpuContext>,
        dimension: TextureDimension,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        if dimension == TextureDimension::D1 && format == TextureFormat::Depth32F {
            return Err(RenderError::TextureCreationFailed(
                "1D depth textures are not supported".into(),
            ));
        }
        let height = if dimension == TextureDimension::D1 { 1 } else { height };
        let texture = create_texture(
            &ctx,
            dimension,
            format,
            width,
            height,
            texture_usage(dimension, format),
        );
        Ok(Self {
            ctx,
            dimension,
            format,
            size: Cell::new((width, height)),
            filter: Cell::new(FilterMode::default()),
            texture: RefCell::new(texture),
            set: Cell::new(false),
        })
    }

    pub fn raw(&self) -> std::cell::Ref<'_, wgpu::Texture> {
        self.texture.borrow()
    }
}

impl Texture for WgpuTexture {
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
        self.set.get()
    }

    fn filter_mode(&self) -> FilterMode {
        self.filter.get()
    }

    fn set_filter_mode(&self, mode: FilterMode) {
        self.filter.set(mode);
    }

    fn resize(&self, width: u32, height: u32) -> RenderResult<()> {
        let height = if self.dimension == TextureDimension::D1 { 1 } else { height };
        *self.texture.borrow_mut() = create_texture(
            &self.ctx,
            self.dimension,
            self.format,
            width,
            height,
            texture_usage(self.dimension, self.format),
        );
        self.size.set((width, height));
        self.set.set(false);
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
        let padded;
        let data = if self.format == TextureFormat::Rgb32F {
            padded = pad_rgb32(bytes);
            &padded[..]
        } else {
            bytes
        };
        self.ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture.borrow(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * device_texel_bytes(self.format) as u32),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.set.set(true);
        Ok(())
    }

    fn read_data_raw(&self) -> RenderResult<Vec<u8>> {
        let bytes = read_texture_region(
            &self.ctx,
            &self.texture.borrow(),
            (0, 0),
            self.size.get(),
            device_texel_bytes(self.format),
        )?;
        Ok(if self.format == TextureFormat::Rgb32F {
            unpad_rgba32(&bytes)
        } else {
            bytes
        })
    }
}

pub struct WgpuRenderBuffer {
    ctx: Rc<GpuContext>,
    kind: RenderBufferType,
    size: Cell<(u32, u32)>,
    texture: RefCell<wgpu::Texture>,
}

impl WgpuRenderBuffer {
    pub(crate) fn new(
        ctx: Rc<GpuContext>,
        kind: RenderBufferType,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let texture = Self::allocate(&ctx, kind, width, height);
        Ok(Self {
            ctx,
            kind,
            size: Cell::new((width, height)),
            texture: RefCell::new(texture),
        })
    }

    fn allocate(ctx: &GpuContext, kind: RenderBufferType, width: u32, height: u32) -> wgpu::Texture {
        create_texture(
            ctx,
            TextureDimension::D2,
            kind.format(),
            width,
            height,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        )
    }
}

impl RenderBuffer for WgpuRenderBuffer {
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
        *self.texture.borrow_mut() = Self::allocate(&self.ctx, self.kind, width, height);
        self.size.set((width, height));
        Ok(())
    }
}

/// Runs `f` with the device texture behind an attachment and its host format.
fn with_attachment<R>(
    attachment: &Attachment,
    f: impl FnOnce(&wgpu::Texture, TextureFormat) -> R,
) -> RenderResult<R> {
    match attachment {
        Attachment::RenderBuffer(buffer) => buffer
            .as_any()
            .downcast_ref::<WgpuRenderBuffer>()
            .map(|b| f(&b.texture.borrow(), b.kind.format())),
        Attachment::Texture(texture) => texture
            .as_any()
            .downcast_ref::<WgpuTexture>()
            .map(|t| f(&t.texture.borrow(), t.format)),
    }
    .ok_or_else(|| RenderError::InternalConsistency("attachment from another backend".into()))
}

fn attachment_view(attachment: &Attachment) -> RenderResult<(wgpu::TextureView, wgpu::TextureFormat)> {
    with_attachment(attachment, |texture, format| {
        (
            texture.create_view(&wgpu::TextureViewDescriptor::default()),
            wgpu_format(format),
        )
    })
}

pub struct WgpuFrameBuffer {
    ctx: Rc<GpuContext>,
    size: Cell<(u32, u32)>,
    color: RefCell<Vec<Attachment>>,
    depth: RefCell<Option<Attachment>>,
    clear_color: Cell<Vec4>,
}

impl WgpuFrameBuffer {
    pub(crate) fn new(ctx: Rc<GpuContext>, width: u32, height: u32) -> Self {
        Self {
            ctx,
            size: Cell::new((width, height)),
            color: RefCell::new(Vec::new()),
            depth: RefCell::new(None),
            clear_color: Cell::new(Vec4::new(1.0, 1.0, 1.0, 0.0)),
        }
    }

    fn target(&self) -> RenderResult<RenderTarget> {
        let color = self
            .color
            .borrow()
            .iter()
            .map(attachment_view)
            .collect::<RenderResult<Vec<_>>>()?;
        let depth = self.depth.borrow().as_ref().map(attachment_view).transpose()?;
        Ok(RenderTarget { color, depth })
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

impl FrameBuffer for WgpuFrameBuffer {
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
        let target = self.target()?;
        let c = self.clear_color.get();
        let clear = wgpu::Color {
            r: f64::from(c.x),
            g: f64::from(c.y),
            b: f64::from(c.z),
            a: f64::from(c.w),
        };
        let color_attachments: Vec<_> = target
            .color
            .iter()
            .map(|(view, _)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("geoscope clear encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("geoscope clear pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: target.depth.as_ref().map(|(view, _)| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                ..Default::default()
            });
        }
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn bind_for_rendering(&self) -> RenderResult<()> {
        if self.color.borrow().is_empty() {
            return Err(RenderError::IncompleteBinding {
                program: "framebuffer".to_string(),
                slot: "color attachment".to_string(),
            });
        }
        let target = self.target()?;
        *self.ctx.target.borrow_mut() = Some(target);
        Ok(())
    }

    fn read_float4(&self, x: u32, y: u32) -> RenderResult<Vec4> {
        let (width, height) = self.size.get();
        if x >= width || y >= height {
            return Err(RenderError::IndexOutOfRange {
                name: "framebuffer pixel".to_string(),
                index: y as usize * width as usize + x as usize,
                len: width as usize * height as usize,
            });
        }
        let colors = self.color.borrow();
        let first = colors.first().ok_or_else(|| RenderError::IncompleteBinding {
            program: "framebuffer".to_string(),
            slot: "color attachment".to_string(),
        })?;
        let (bytes, format) = with_attachment(first, |texture, format| {
            read_texture_region(
                &self.ctx,
                texture,
                (x, y),
                (1, 1),
                device_texel_bytes(format),
            )
            .map(|bytes| (bytes, format))
        })??;
        Ok(match format {
            TextureFormat::Rgba8 => {
                Vec4::from_array([bytes[0], bytes[1], bytes[2], bytes[3]].map(|b| f32::from(b) / 255.0))
            }
            TextureFormat::R32F | TextureFormat::Depth32F => {
                Vec4::new(bytemuck::pod_read_unaligned(&bytes[..4]), 0.0, 0.0, 1.0)
            }
            TextureFormat::Rgb32F | TextureFormat::Rgba32F => {
                Vec4::from_array(bytemuck::pod_read_unaligned(&bytes[..16]))
            }
        })
    }
}
