use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use super::resources::{WgpuAttributeBuffer, WgpuTexture};
use super::GpuContext;
use crate::buffer::{AttributeBuffer, Texture};
use crate::error::{RenderError, RenderResult};
use crate::shader::{is_referenced, ProgramBackend, ShaderProgram, ShaderStageSpecification};
use crate::types::{DrawMode, RenderDataType, TextureDimension, TextureFormat};

/// Declarations generated in front of the stage sources, plus where each
/// live name ended up.
#[derive(Debug, Clone, Default)]
pub struct Prelude {
    pub source: String,
    /// Uniform name, type, and byte offset inside the uniform block.
    pub uniforms: Vec<(String, RenderDataType, u64)>,
    pub uniform_size: u64,
    /// Attribute name, type, array count, and first shader location.
    pub attributes: Vec<(String, RenderDataType, usize, u32)>,
    /// Texture name, dimension, and binding index. The sampler follows at `binding + 1`.
    pub textures: Vec<(String, TextureDimension, u32)>,
}

const UNIFORM_ALIGN: u64 = 16;

fn vertex_format(data_type: RenderDataType) -> RenderResult<wgpu::VertexFormat> {
    Ok(match data_type {
        RenderDataType::Float => wgpu::VertexFormat::Float32,
        RenderDataType::Vector2Float => wgpu::VertexFormat::Float32x2,
        RenderDataType::Vector3Float => wgpu::VertexFormat::Float32x3,
        RenderDataType::Vector4Float => wgpu::VertexFormat::Float32x4,
        RenderDataType::Int => wgpu::VertexFormat::Sint32,
        RenderDataType::UInt => wgpu::VertexFormat::Uint32,
        RenderDataType::Vector2UInt => wgpu::VertexFormat::Uint32x2,
        RenderDataType::Vector3UInt => wgpu::VertexFormat::Uint32x3,
        RenderDataType::Vector4UInt => wgpu::VertexFormat::Uint32x4,
        RenderDataType::Matrix44Float => {
            return Err(RenderError::ShaderCompilationFailed(
                "matrix vertex attributes are not supported".into(),
            ))
        }
    })
}

/// Builds the WGSL declarations for every declared name the stages reference.
///
/// Uniforms are packed into one block at group 0 binding 0 with each member
/// aligned to 16 bytes. Attributes become fields of `VertexInput`; array
/// attributes are expanded into `name_0`, `name_1`, ... fields.
pub fn generate_prelude(stages: &[ShaderStageSpecification]) -> RenderResult<Prelude> {
    let mut prelude = Prelude::default();

    let mut seen = Vec::new();
    for u in stages.iter().flat_map(|s| &s.uniforms) {
        if seen.contains(&&u.name) || !is_referenced(stages, &u.name) {
            continue;
        }
        seen.push(&u.name);
        prelude
            .uniforms
            .push((u.name.clone(), u.data_type, prelude.uniform_size));
        prelude.uniform_size += (u.data_type.size_bytes() as u64).div_ceil(UNIFORM_ALIGN) * UNIFORM_ALIGN;
    }

    let mut location = 0;
    for a in stages.iter().flat_map(|s| &s.attributes) {
        if prelude.attributes.iter().any(|(n, ..)| n == &a.name) || !is_referenced(stages, &a.name) {
            continue;
        }
        vertex_format(a.data_type)?;
        prelude
            .attributes
            .push((a.name.clone(), a.data_type, a.array_count, location));
        location += a.array_count as u32;
    }

    let mut binding = 1;
    for t in stages.iter().flat_map(|s| &s.textures) {
        if prelude.textures.iter().any(|(n, ..)| n == &t.name) || !is_referenced(stages, &t.name) {
            continue;
        }
        prelude.textures.push((t.name.clone(), t.dimension, binding));
        binding += 2;
    }

    let src = &mut prelude.source;
    if !prelude.uniforms.is_empty() {
        src.push_str("struct Uniforms {\n");
        for (name, data_type, _) in &prelude.uniforms {
            let _ = writeln!(src, "    @align(16) {name}: {},", data_type.wgsl());
        }
        src.push_str("};\n@group(0) @binding(0) var<uniform> u: Uniforms;\n");
    }
    src.push_str("struct VertexInput {\n");
    for (name, data_type, count, first) in &prelude.attributes {
        if *count == 1 {
            let _ = writeln!(src, "    @location({first}) {name}: {},", data_type.wgsl());
        } else {
            for k in 0..*count {
                let _ = writeln!(
                    src,
                    "    @location({}) {name}_{k}: {},",
                    first + k as u32,
                    data_type.wgsl()
                );
            }
        }
    }
    if prelude.attributes.is_empty() {
        src.push_str("    @builtin(vertex_index) vertex_index: u32,\n");
    }
    src.push_str("};\n");
    for (name, dimension, binding) in &prelude.textures {
        let dim = match dimension {
            TextureDimension::D1 => "texture_1d<f32>",
            TextureDimension::D2 => "texture_2d<f32>",
        };
        let _ = writeln!(src, "@group(0) @binding({binding}) var {name}: {dim};");
        let _ = writeln!(
            src,
            "@group(0) @binding({}) var {name}_sampler: sampler;",
            binding + 1
        );
    }
    Ok(prelude)
}

/// Formats of the bound render target, used to key cached pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TargetFormats {
    color: Vec<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureFormat>,
}

/// Compiled WGSL module plus lazily built pipelines.
///
/// Textures are bound as unfilterable floats with nearest samplers, so every
/// texture format can be sampled regardless of its filter mode.
pub(crate) struct WgpuProgram {
    ctx: Rc<GpuContext>,
    label: String,
    draw_mode: DrawMode,
    prelude: Prelude,
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: RefCell<HashMap<TargetFormats, Rc<wgpu::RenderPipeline>>>,
}

impl WgpuProgram {
    pub fn compile(
        ctx: Rc<GpuContext>,
        name: &str,
        stages: &[ShaderStageSpecification],
        draw_mode: DrawMode,
    ) -> RenderResult<Self> {
        let prelude = generate_prelude(stages)?;
        let mut source = prelude.source.clone();
        for stage in stages {
            source.push_str(&stage.src);
        }

        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(err) = pollster::block_on(ctx.device.pop_error_scope()) {
            log::error!("program {name} failed to compile: {err}");
            return Err(RenderError::ShaderCompilationFailed(err.to_string()));
        }

        let mut entries = Vec::new();
        if !prelude.uniforms.is_empty() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }
        for (_, dimension, binding) in &prelude.textures {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: *binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: match dimension {
                        TextureDimension::D1 => wgpu::TextureViewDimension::D1,
                        TextureDimension::D2 => wgpu::TextureViewDimension::D2,
                    },
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: binding + 1,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            });
        }
        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(name),
                    entries: &entries,
                });
        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(name),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        log::debug!("compiled wgpu program {name}");
        Ok(Self {
            ctx,
            label: name.to_string(),
            draw_mode,
            prelude,
            module,
            bind_group_layout,
            pipeline_layout,
            pipelines: RefCell::new(HashMap::new()),
        })
    }

    fn pipeline(&self, formats: &TargetFormats) -> RenderResult<Rc<wgpu::RenderPipeline>> {
        if let Some(pipeline) = self.pipelines.borrow().get(formats) {
            return Ok(pipeline.clone());
        }

        let vertex_attributes = self
            .prelude
            .attributes
            .iter()
            .map(|(_, data_type, count, first)| {
                let format = vertex_format(*data_type)?;
                Ok((0..*count)
                    .map(|k| wgpu::VertexAttribute {
                        format,
                        offset: (k * data_type.size_bytes()) as u64,
                        shader_location: first + k as u32,
                    })
                    .collect::<Vec<_>>())
            })
            .collect::<RenderResult<Vec<_>>>()?;
        let buffers: Vec<wgpu::VertexBufferLayout> = self
            .prelude
            .attributes
            .iter()
            .zip(&vertex_attributes)
            .map(|((_, data_type, count, _), attributes)| wgpu::VertexBufferLayout {
                array_stride: (data_type.size_bytes() * count) as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        // Only the first target receives the fragment output.
        let targets: Vec<Option<wgpu::ColorTargetState>> = formats
            .color
            .iter()
            .enumerate()
            .map(|(i, format)| {
                Some(wgpu::ColorTargetState {
                    format: *format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: if i == 0 {
                        wgpu::ColorWrites::ALL
                    } else {
                        wgpu::ColorWrites::empty()
                    },
                })
            })
            .collect();

        let topology = match self.draw_mode {
            DrawMode::Points => wgpu::PrimitiveTopology::PointList,
            DrawMode::Lines | DrawMode::IndexedLines => wgpu::PrimitiveTopology::LineList,
            DrawMode::Triangles | DrawMode::IndexedTriangles => {
                wgpu::PrimitiveTopology::TriangleList
            }
        };

        let pipeline = self
            .ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&self.label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &self.module,
                    entry_point: Some("vs_main"),
                    buffers: &buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &self.module,
                    entry_point: Some("fs_main"),
                    targets: &targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: formats.depth.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        let pipeline = Rc::new(pipeline);
        self.pipelines
            .borrow_mut()
            .insert(formats.clone(), pipeline.clone());
        Ok(pipeline)
    }

    fn uniform_bytes(&self, program: &ShaderProgram) -> Vec<u8> {
        let mut bytes = vec![0u8; self.prelude.uniform_size as usize];
        for (name, _, offset) in &self.prelude.uniforms {
            if let Some(value) = program.uniform_value(name) {
                let data = value.to_bytes();
                let start = *offset as usize;
                bytes[start..start + data.len()].copy_from_slice(&data);
            }
        }
        bytes
    }

    fn incomplete(&self, slot: &str) -> RenderError {
        RenderError::IncompleteBinding {
            program: self.label.clone(),
            slot: slot.to_string(),
        }
    }
}

fn downcast_buffer<'a>(
    buffer: &'a Rc<dyn AttributeBuffer>,
    program: &str,
) -> RenderResult<&'a WgpuAttributeBuffer> {
    buffer
        .as_any()
        .downcast_ref::<WgpuAttributeBuffer>()
        .ok_or_else(|| {
            RenderError::InternalConsistency(format!(
                "program {program} was given a buffer from another backend"
            ))
        })
}

impl ProgramBackend for WgpuProgram {
    fn uniform_location(&self, name: &str) -> Option<u32> {
        self.prelude
            .uniforms
            .iter()
            .position(|(n, ..)| n == name)
            .map(|i| i as u32)
    }

    fn attribute_location(&self, name: &str) -> Option<u32> {
        self.prelude
            .attributes
            .iter()
            .find(|(n, ..)| n == name)
            .map(|(.., location)| *location)
    }

    fn texture_location(&self, name: &str) -> Option<u32> {
        self.prelude
            .textures
            .iter()
            .find(|(n, ..)| n == name)
            .map(|(.., binding)| *binding)
    }

    fn create_attribute_buffer(
        &self,
        data_type: RenderDataType,
        array_count: usize,
    ) -> Rc<dyn AttributeBuffer> {
        Rc::new(WgpuAttributeBuffer::new(self.ctx.clone(), data_type, array_count))
    }

    fn create_texture(
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

    fn draw(&self, program: &ShaderProgram) -> RenderResult<()> {
        let target_slot = self.ctx.target.borrow();
        let target = target_slot
            .as_ref()
            .ok_or_else(|| self.incomplete("render target"))?;
        let formats = TargetFormats {
            color: target.color.iter().map(|(_, f)| *f).collect(),
            depth: target.depth.as_ref().map(|(_, f)| *f),
        };
        let pipeline = self.pipeline(&formats)?;

        let device = &self.ctx.device;
        let uniform_buffer = (!self.prelude.uniforms.is_empty()).then(|| {
            wgpu::util::DeviceExt::create_buffer_init(
                device,
                &wgpu::util::BufferInitDescriptor {
                    label: Some("geoscope uniforms"),
                    contents: &self.uniform_bytes(program),
                    usage: wgpu::BufferUsages::UNIFORM,
                },
            )
        });

        let mut views = Vec::new();
        for (name, _, binding) in &self.prelude.textures {
            let texture = program
                .textures()
                .iter()
                .find(|t| &t.name == name)
                .and_then(|t| t.texture.clone())
                .ok_or_else(|| self.incomplete(name))?;
            let texture = texture
                .as_any()
                .downcast_ref::<WgpuTexture>()
                .ok_or_else(|| {
                    RenderError::InternalConsistency(format!("texture {name} from another backend"))
                })?
                .raw()
                .create_view(&wgpu::TextureViewDescriptor::default());
            views.push((*binding, texture));
        }
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("geoscope sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut entries = Vec::new();
        if let Some(buffer) = &uniform_buffer {
            entries.push(wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            });
        }
        for (binding, view) in &views {
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: binding + 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&self.label),
            layout: &self.bind_group_layout,
            entries: &entries,
        });

        let mut vertex_buffers = Vec::new();
        for (name, ..) in &self.prelude.attributes {
            let buffer = program
                .attribute_buffer(name)
                .ok_or_else(|| self.incomplete(name))?;
            vertex_buffers.push(buffer);
        }
        let vertex_storage = vertex_buffers
            .iter()
            .map(|b| downcast_buffer(b, &self.label).map(WgpuAttributeBuffer::raw))
            .collect::<RenderResult<Vec<_>>>()?;
        let index_buffer = program.index_buffer().cloned();
        let index_storage = index_buffer
            .as_ref()
            .filter(|_| self.draw_mode.is_indexed())
            .map(|b| downcast_buffer(b, &self.label).map(WgpuAttributeBuffer::raw))
            .transpose()?;

        let color_attachments: Vec<_> = target
            .color
            .iter()
            .map(|(view, _)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&self.label),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&self.label),
                color_attachments: &color_attachments,
                depth_stencil_attachment: target.depth.as_ref().map(|(view, _)| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                ..Default::default()
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            for (slot, storage) in vertex_storage.iter().enumerate() {
                let buffer = storage.as_ref().ok_or_else(|| self.incomplete("vertex buffer"))?;
                pass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }

            let instances = 0..program.instance_count();
            match &index_storage {
                Some(storage) => {
                    let buffer = storage.as_ref().ok_or_else(|| self.incomplete("index"))?;
                    let count = index_buffer.as_ref().map_or(0, |b| b.data_size()) as u32;
                    pass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..count, 0, instances);
                }
                None => {
                    let count = if self.prelude.attributes.is_empty() {
                        0
                    } else {
                        program.vertex_count() as u32
                    };
                    pass.draw(0..count, instances);
                }
            }
        }
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}
