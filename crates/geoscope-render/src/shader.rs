//! Shader stage sources, replacement rules, and the program binding table.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use glam::{Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};

use crate::buffer::{
    describe, pack, texture_byte_len, AttributeBuffer, BufferElement, Texture,
};
use crate::color_maps::ColorMap;
use crate::error::{RenderError, RenderResult};
use crate::types::{DrawMode, RenderDataType, TextureDimension, TextureFormat};

/// Number of texels used when a color map is uploaded as a 1D texture.
pub const COLORMAP_TEXTURE_SAMPLES: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStageType {
    Vertex,
    Fragment,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderSpecUniform {
    pub name: String,
    pub data_type: RenderDataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderSpecAttribute {
    pub name: String,
    pub data_type: RenderDataType,
    pub array_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderSpecTexture {
    pub name: String,
    pub dimension: TextureDimension,
}

/// One stage of a shader program: its source and the names it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStageSpecification {
    pub stage: ShaderStageType,
    pub uniforms: Vec<ShaderSpecUniform>,
    pub attributes: Vec<ShaderSpecAttribute>,
    pub textures: Vec<ShaderSpecTexture>,
    pub src: String,
}

impl ShaderStageSpecification {
    pub fn new(stage: ShaderStageType, src: impl Into<String>) -> Self {
        Self {
            stage,
            uniforms: Vec::new(),
            attributes: Vec::new(),
            textures: Vec::new(),
            src: src.into(),
        }
    }

    pub fn with_uniform(mut self, name: &str, data_type: RenderDataType) -> Self {
        self.uniforms.push(ShaderSpecUniform {
            name: name.to_string(),
            data_type,
        });
        self
    }

    pub fn with_attribute(self, name: &str, data_type: RenderDataType) -> Self {
        self.with_array_attribute(name, data_type, 1)
    }

    pub fn with_array_attribute(
        mut self,
        name: &str,
        data_type: RenderDataType,
        array_count: usize,
    ) -> Self {
        self.attributes.push(ShaderSpecAttribute {
            name: name.to_string(),
            data_type,
            array_count,
        });
        self
    }

    pub fn with_texture(mut self, name: &str, dimension: TextureDimension) -> Self {
        self.textures.push(ShaderSpecTexture {
            name: name.to_string(),
            dimension,
        });
        self
    }
}

/// A named source-level patch applied to a base program.
///
/// Each replacement splices text into every `${ TAG }$` marker with a matching
/// tag. The rule's declarations are added to the patched stages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderReplacementRule {
    pub name: String,
    pub replacements: Vec<(String, String)>,
    pub uniforms: Vec<ShaderSpecUniform>,
    pub attributes: Vec<ShaderSpecAttribute>,
    pub textures: Vec<ShaderSpecTexture>,
}

impl ShaderReplacementRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn replace(mut self, tag: &str, text: &str) -> Self {
        self.replacements.push((tag.to_string(), text.to_string()));
        self
    }

    pub fn with_uniform(mut self, name: &str, data_type: RenderDataType) -> Self {
        self.uniforms.push(ShaderSpecUniform {
            name: name.to_string(),
            data_type,
        });
        self
    }

    pub fn with_attribute(mut self, name: &str, data_type: RenderDataType) -> Self {
        self.attributes.push(ShaderSpecAttribute {
            name: name.to_string(),
            data_type,
            array_count: 1,
        });
        self
    }

    pub fn with_texture(mut self, name: &str, dimension: TextureDimension) -> Self {
        self.textures.push(ShaderSpecTexture {
            name: name.to_string(),
            dimension,
        });
        self
    }
}

/// Which built-in rules are prepended to the caller's rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShaderReplacementDefaults {
    /// Lit rendering of scene geometry.
    #[default]
    SceneObject,
    /// Flat, unlit output of pick colors.
    Pick,
    /// Plain passes with no default rules.
    Process,
}

/// Applies rules, in order, to every stage.
///
/// The text spliced into a tag is the concatenation of every rule's text for
/// that tag, in rule order. Tags no rule mentions are removed.
pub fn apply_shader_replacements(
    stages: &[ShaderStageSpecification],
    rules: &[&ShaderReplacementRule],
) -> Vec<ShaderStageSpecification> {
    let mut replacements: HashMap<&str, String> = HashMap::new();
    for rule in rules {
        for (tag, text) in &rule.replacements {
            let entry = replacements.entry(tag.as_str()).or_default();
            entry.push_str(text);
            entry.push('\n');
        }
    }

    stages
        .iter()
        .map(|stage| {
            let mut patched = stage.clone();
            patched.src = splice_tags(&stage.src, &replacements);
            for rule in rules {
                patched.uniforms.extend(rule.uniforms.iter().cloned());
                patched.textures.extend(rule.textures.iter().cloned());
                if stage.stage == ShaderStageType::Vertex {
                    patched.attributes.extend(rule.attributes.iter().cloned());
                }
            }
            patched
        })
        .collect()
}

fn splice_tags(src: &str, replacements: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}$") else {
            out.push_str(&rest[start..]);
            return out;
        };
        if let Some(text) = replacements.get(after[..end].trim()) {
            out.push_str(text);
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

/// Whether `name` appears as a whole identifier in any stage source.
pub fn is_referenced(stages: &[ShaderStageSpecification], name: &str) -> bool {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    stages.iter().any(|stage| {
        stage.src.match_indices(name).any(|(pos, _)| {
            let before = stage.src[..pos].chars().next_back();
            let after = stage.src[pos + name.len()..].chars().next();
            !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
        })
    })
}

/// A value that can be assigned to a uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    UVec2(UVec2),
    UVec3(UVec3),
    UVec4(UVec4),
}

impl UniformValue {
    pub fn data_type(&self) -> RenderDataType {
        match self {
            Self::Float(_) => RenderDataType::Float,
            Self::Int(_) => RenderDataType::Int,
            Self::UInt(_) => RenderDataType::UInt,
            Self::Vec2(_) => RenderDataType::Vector2Float,
            Self::Vec3(_) => RenderDataType::Vector3Float,
            Self::Vec4(_) => RenderDataType::Vector4Float,
            Self::Mat4(_) => RenderDataType::Matrix44Float,
            Self::UVec2(_) => RenderDataType::Vector2UInt,
            Self::UVec3(_) => RenderDataType::Vector3UInt,
            Self::UVec4(_) => RenderDataType::Vector4UInt,
        }
    }

    /// Packed bytes in the same layout as an attribute element.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Float(v) => pack(&[*v]),
            Self::Int(v) => pack(&[*v]),
            Self::UInt(v) => pack(&[*v]),
            Self::Vec2(v) => pack(&[*v]),
            Self::Vec3(v) => pack(&[*v]),
            Self::Vec4(v) => pack(&[*v]),
            Self::Mat4(v) => pack(&[*v]),
            Self::UVec2(v) => pack(&[*v]),
            Self::UVec3(v) => pack(&[*v]),
            Self::UVec4(v) => pack(&[*v]),
        }
    }
}

macro_rules! uniform_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for UniformValue {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        }
    };
}

uniform_from!(f32, Float);
uniform_from!(i32, Int);
uniform_from!(u32, UInt);
uniform_from!(Vec2, Vec2);
uniform_from!(Vec3, Vec3);
uniform_from!(Vec4, Vec4);
uniform_from!(Mat4, Mat4);
uniform_from!(UVec2, UVec2);
uniform_from!(UVec3, UVec3);
uniform_from!(UVec4, UVec4);

impl From<f64> for UniformValue {
    #[allow(clippy::cast_possible_truncation)]
    fn from(value: f64) -> Self {
        Self::Float(value as f32)
    }
}

/// A uniform slot. `location` is `None` when the compiled program dropped it.
#[derive(Debug, Clone)]
pub struct ShaderUniform {
    pub name: String,
    pub data_type: RenderDataType,
    pub location: Option<u32>,
    pub value: Option<UniformValue>,
}

/// A vertex attribute slot and the buffer bound to it.
#[derive(Clone)]
pub struct ShaderAttribute {
    pub name: String,
    pub data_type: RenderDataType,
    pub array_count: usize,
    pub location: Option<u32>,
    pub buffer: Option<Rc<dyn AttributeBuffer>>,
}

impl fmt::Debug for ShaderAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderAttribute")
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("array_count", &self.array_count)
            .field("location", &self.location)
            .field("bound", &self.buffer.is_some())
            .finish()
    }
}

/// A texture slot and the texture bound to it.
#[derive(Clone)]
pub struct ShaderTexture {
    pub name: String,
    pub dimension: TextureDimension,
    pub location: Option<u32>,
    pub texture: Option<Rc<dyn Texture>>,
}

/// The backend half of a compiled program.
///
/// Resolves which declared names survived compilation, allocates resources for
/// slots the program owns, and issues validated draws.
pub trait ProgramBackend {
    fn uniform_location(&self, name: &str) -> Option<u32>;

    fn attribute_location(&self, name: &str) -> Option<u32>;

    fn texture_location(&self, name: &str) -> Option<u32>;

    fn create_attribute_buffer(
        &self,
        data_type: RenderDataType,
        array_count: usize,
    ) -> Rc<dyn AttributeBuffer>;

    fn create_texture(
        &self,
        dimension: TextureDimension,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> RenderResult<Rc<dyn Texture>>;

    /// Issues the draw. The program has already been validated.
    fn draw(&self, program: &ShaderProgram) -> RenderResult<()>;
}

/// A compiled program plus its binding table.
pub struct ShaderProgram {
    name: String,
    draw_mode: DrawMode,
    uniforms: Vec<ShaderUniform>,
    attributes: Vec<ShaderAttribute>,
    textures: Vec<ShaderTexture>,
    index_buffer: Option<Rc<dyn AttributeBuffer>>,
    primitive_restart_index: Option<u32>,
    instance_count: u32,
    backend: Box<dyn ProgramBackend>,
}

impl ShaderProgram {
    /// Builds the binding table for `stages` and resolves every declared name.
    ///
    /// Names declared by several stages are merged; conflicting declarations fail.
    pub fn new(
        name: impl Into<String>,
        stages: &[ShaderStageSpecification],
        draw_mode: DrawMode,
        backend: Box<dyn ProgramBackend>,
    ) -> RenderResult<Self> {
        let mut uniforms: Vec<ShaderUniform> = Vec::new();
        let mut attributes: Vec<ShaderAttribute> = Vec::new();
        let mut textures: Vec<ShaderTexture> = Vec::new();

        for stage in stages {
            for u in &stage.uniforms {
                match uniforms.iter().find(|e| e.name == u.name) {
                    Some(e) if e.data_type != u.data_type => {
                        return Err(RenderError::type_mismatch(&u.name, e.data_type, u.data_type));
                    }
                    Some(_) => {}
                    None => uniforms.push(ShaderUniform {
                        name: u.name.clone(),
                        data_type: u.data_type,
                        location: backend.uniform_location(&u.name),
                        value: None,
                    }),
                }
            }
            for a in &stage.attributes {
                match attributes.iter().find(|e| e.name == a.name) {
                    Some(e) if e.data_type != a.data_type || e.array_count != a.array_count => {
                        return Err(RenderError::type_mismatch(
                            &a.name,
                            describe(e.data_type, e.array_count),
                            describe(a.data_type, a.array_count),
                        ));
                    }
                    Some(_) => {}
                    None => attributes.push(ShaderAttribute {
                        name: a.name.clone(),
                        data_type: a.data_type,
                        array_count: a.array_count,
                        location: backend.attribute_location(&a.name),
                        buffer: None,
                    }),
                }
            }
            for t in &stage.textures {
                match textures.iter().find(|e| e.name == t.name) {
                    Some(e) if e.dimension != t.dimension => {
                        return Err(RenderError::type_mismatch(&t.name, e.dimension, t.dimension));
                    }
                    Some(_) => {}
                    None => textures.push(ShaderTexture {
                        name: t.name.clone(),
                        dimension: t.dimension,
                        location: backend.texture_location(&t.name),
                        texture: None,
                    }),
                }
            }
        }

        Ok(Self {
            name: name.into(),
            draw_mode,
            uniforms,
            attributes,
            textures,
            index_buffer: None,
            primitive_restart_index: None,
            instance_count: 1,
            backend,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn draw_mode(&self) -> DrawMode {
        self.draw_mode
    }

    pub fn uniforms(&self) -> &[ShaderUniform] {
        &self.uniforms
    }

    pub fn attributes(&self) -> &[ShaderAttribute] {
        &self.attributes
    }

    pub fn textures(&self) -> &[ShaderTexture] {
        &self.textures
    }

    pub fn index_buffer(&self) -> Option<&Rc<dyn AttributeBuffer>> {
        self.index_buffer.as_ref()
    }

    pub fn primitive_restart_index(&self) -> Option<u32> {
        self.primitive_restart_index
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    // === Uniforms

    /// Whether the program declares `name` and kept it after compilation.
    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms
            .iter()
            .any(|u| u.name == name && u.location.is_some())
    }

    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> RenderResult<()> {
        let value = value.into();
        let program = &self.name;
        let uniform = self
            .uniforms
            .iter_mut()
            .find(|u| u.name == name)
            .ok_or_else(|| RenderError::UniformNotFound {
                program: program.clone(),
                name: name.to_string(),
            })?;
        if uniform.data_type != value.data_type() {
            return Err(RenderError::type_mismatch(
                name,
                uniform.data_type,
                value.data_type(),
            ));
        }
        if uniform.location.is_some() {
            uniform.value = Some(value);
        }
        Ok(())
    }

    pub fn uniform_value(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms
            .iter()
            .find(|u| u.name == name)
            .and_then(|u| u.value.as_ref())
    }

    // === Attributes

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes
            .iter()
            .any(|a| a.name == name && a.location.is_some())
    }

    pub fn attribute_is_set(&self, name: &str) -> bool {
        self.attributes
            .iter()
            .any(|a| a.name == name && a.buffer.as_ref().is_some_and(|b| b.is_set()))
    }

    pub fn attribute_buffer(&self, name: &str) -> Option<Rc<dyn AttributeBuffer>> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.buffer.clone())
    }

    fn attribute_mut(&mut self, name: &str) -> RenderResult<&mut ShaderAttribute> {
        let program = &self.name;
        self.attributes
            .iter_mut()
            .find(|a| a.name == name)
            .ok_or_else(|| RenderError::AttributeNotFound {
                program: program.clone(),
                name: name.to_string(),
            })
    }

    /// Uploads data into a buffer owned by this program, creating it on first use.
    pub fn set_attribute<T: BufferElement>(&mut self, name: &str, data: &[T]) -> RenderResult<()> {
        let attribute = self.attribute_mut(name)?;
        if attribute.data_type != T::DATA_TYPE || attribute.array_count != T::ARRAY_COUNT {
            return Err(RenderError::type_mismatch(
                name,
                describe(attribute.data_type, attribute.array_count),
                describe(T::DATA_TYPE, T::ARRAY_COUNT),
            ));
        }
        if attribute.location.is_none() {
            log::trace!("attribute '{name}' was optimized out, skipping upload");
            return Ok(());
        }
        let (data_type, array_count) = (attribute.data_type, attribute.array_count);
        let buffer = match attribute.buffer.clone() {
            Some(buffer) => buffer,
            None => {
                let buffer = self.backend.create_attribute_buffer(data_type, array_count);
                self.attribute_mut(name)?.buffer = Some(buffer.clone());
                buffer
            }
        };
        buffer.set_data(data)
    }

    /// Binds a buffer owned elsewhere, sharing it without a copy.
    pub fn set_external_buffer(
        &mut self,
        name: &str,
        buffer: Rc<dyn AttributeBuffer>,
    ) -> RenderResult<()> {
        let attribute = self.attribute_mut(name)?;
        if attribute.data_type != buffer.data_type() || attribute.array_count != buffer.array_count()
        {
            return Err(RenderError::type_mismatch(
                name,
                describe(attribute.data_type, attribute.array_count),
                describe(buffer.data_type(), buffer.array_count()),
            ));
        }
        if attribute.location.is_some() {
            attribute.buffer = Some(buffer);
        }
        Ok(())
    }

    // === Indices

    pub fn set_index(&mut self, indices: &[u32]) -> RenderResult<()> {
        let buffer = match self.index_buffer.clone() {
            Some(buffer) => buffer,
            None => {
                let buffer = self.backend.create_attribute_buffer(RenderDataType::UInt, 1);
                self.index_buffer = Some(buffer.clone());
                buffer
            }
        };
        buffer.set_data(indices)
    }

    /// Shares an existing `UInt` buffer as the index buffer.
    pub fn set_index_buffer(&mut self, buffer: Rc<dyn AttributeBuffer>) -> RenderResult<()> {
        if buffer.data_type() != RenderDataType::UInt || buffer.array_count() != 1 {
            return Err(RenderError::type_mismatch(
                "index",
                RenderDataType::UInt,
                describe(buffer.data_type(), buffer.array_count()),
            ));
        }
        self.index_buffer = Some(buffer);
        Ok(())
    }

    pub fn set_primitive_restart_index(&mut self, index: u32) {
        self.primitive_restart_index = Some(index);
    }

    pub fn set_instance_count(&mut self, count: u32) {
        self.instance_count = count;
    }

    // === Textures

    pub fn has_texture(&self, name: &str) -> bool {
        self.textures
            .iter()
            .any(|t| t.name == name && t.location.is_some())
    }

    pub fn texture_is_set(&self, name: &str) -> bool {
        self.textures
            .iter()
            .any(|t| t.name == name && t.texture.as_ref().is_some_and(|t| t.is_set()))
    }

    fn texture_mut(&mut self, name: &str) -> RenderResult<&mut ShaderTexture> {
        let program = &self.name;
        self.textures
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| RenderError::TextureNotFound {
                program: program.clone(),
                name: name.to_string(),
            })
    }

    pub fn set_texture(&mut self, name: &str, texture: Rc<dyn Texture>) -> RenderResult<()> {
        let slot = self.texture_mut(name)?;
        if slot.dimension != texture.dimension() {
            return Err(RenderError::type_mismatch(
                name,
                slot.dimension,
                texture.dimension(),
            ));
        }
        if slot.location.is_some() {
            slot.texture = Some(texture);
        }
        Ok(())
    }

    /// Creates a texture owned by this program from packed texel data.
    pub fn set_texture_from_buffer(
        &mut self,
        name: &str,
        format: TextureFormat,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> RenderResult<()> {
        let dimension = self.texture_mut(name)?.dimension;
        let texture = self.backend.create_texture(dimension, format, width, height)?;
        texture.set_data_raw(data)?;
        self.set_texture(name, texture)
    }

    /// Uploads a sampled color map into a 1D texture slot as 8-bit RGBA.
    pub fn set_texture_from_colormap(&mut self, name: &str, color_map: &ColorMap) -> RenderResult<()> {
        let samples = COLORMAP_TEXTURE_SAMPLES;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        let bytes: Vec<u8> = (0..samples)
            .flat_map(|i| {
                let c = color_map.sample(i as f32 / (samples - 1) as f32);
                [to_byte(c.x), to_byte(c.y), to_byte(c.z), u8::MAX]
            })
            .collect();
        debug_assert_eq!(bytes.len(), texture_byte_len(TextureFormat::Rgba8, samples, 1));
        self.set_texture_from_buffer(name, TextureFormat::Rgba8, samples, 1, &bytes)
    }

    // === Drawing

    /// Number of vertices a draw will consume, before indexing.
    pub fn vertex_count(&self) -> usize {
        self.attributes
            .iter()
            .filter(|a| a.location.is_some())
            .find_map(|a| a.buffer.as_ref().map(|b| b.data_size()))
            .unwrap_or(0)
    }

    /// Confirms every live slot is bound and consistently sized.
    pub fn validate(&self) -> RenderResult<()> {
        let incomplete = |slot: String| RenderError::IncompleteBinding {
            program: self.name.clone(),
            slot,
        };

        for u in self.uniforms.iter().filter(|u| u.location.is_some()) {
            if u.value.is_none() {
                return Err(incomplete(format!("uniform {}", u.name)));
            }
        }

        let mut expected: Option<(usize, &str)> = None;
        for a in self.attributes.iter().filter(|a| a.location.is_some()) {
            let Some(buffer) = a.buffer.as_ref().filter(|b| b.is_set()) else {
                return Err(incomplete(format!("attribute {}", a.name)));
            };
            match expected {
                None => expected = Some((buffer.data_size(), a.name.as_str())),
                Some((size, _)) if size != buffer.data_size() => {
                    return Err(RenderError::AttributeSizeMismatch {
                        program: self.name.clone(),
                        name: a.name.clone(),
                        expected: size,
                        actual: buffer.data_size(),
                    });
                }
                Some(_) => {}
            }
        }

        for t in self.textures.iter().filter(|t| t.location.is_some()) {
            if !t.texture.as_ref().is_some_and(|t| t.is_set()) {
                return Err(incomplete(format!("texture {}", t.name)));
            }
        }

        if self.draw_mode.is_indexed() && !self.index_buffer.as_ref().is_some_and(|b| b.is_set()) {
            return Err(incomplete("index".to_string()));
        }

        Ok(())
    }

    /// Validates the binding table, then draws.
    pub fn draw(&self) -> RenderResult<()> {
        self.validate()?;
        self.backend.draw(self)
    }
}

impl fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("name", &self.name)
            .field("draw_mode", &self.draw_mode)
            .field("uniforms", &self.uniforms)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(src: &str) -> ShaderStageSpecification {
        ShaderStageSpecification::new(ShaderStageType::Vertex, src)
    }

    /// Test that rule text for a tag is concatenated in rule order.
    #[test]
    fn test_replacements_concatenate_in_order() {
        let a = ShaderReplacementRule::new("A").replace("BODY", "first();");
        let b = ShaderReplacementRule::new("B").replace("BODY", "second();");
        let stages = [stage("fn f() { ${ BODY }$ }")];

        let ab = apply_shader_replacements(&stages, &[&a, &b]);
        let ba = apply_shader_replacements(&stages, &[&b, &a]);

        assert_eq!(ab[0].src, "fn f() { first();\nsecond();\n }");
        assert_eq!(ba[0].src, "fn f() { second();\nfirst();\n }");
    }

    /// Test that tags no rule fills are removed.
    #[test]
    fn test_unfilled_tags_removed() {
        let stages = [stage("a ${ NOTHING }$b")];
        let out = apply_shader_replacements(&stages, &[]);
        assert_eq!(out[0].src, "a b");
    }

    /// Test that rule attributes only land on vertex stages.
    #[test]
    fn test_rule_attributes_on_vertex_stage() {
        let rule = ShaderReplacementRule::new("R")
            .with_attribute("a_value", RenderDataType::Float)
            .with_uniform("u_scale", RenderDataType::Float);
        let stages = [
            stage("v"),
            ShaderStageSpecification::new(ShaderStageType::Fragment, "f"),
        ];
        let out = apply_shader_replacements(&stages, &[&rule]);
        assert_eq!(out[0].attributes.len(), 1);
        assert!(out[1].attributes.is_empty());
        assert_eq!(out[1].uniforms.len(), 1);
    }

    /// Test whole-identifier matching.
    #[test]
    fn test_is_referenced() {
        let stages = [stage("let x = input.a_value2 + u.u_scale;")];
        assert!(is_referenced(&stages, "u_scale"));
        assert!(is_referenced(&stages, "a_value2"));
        assert!(!is_referenced(&stages, "a_value"));
        assert!(!is_referenced(&stages, "scale"));
    }
}
