//! Backend-independent descriptions of render data.

use std::fmt;

/// The element type stored in an attribute buffer or declared for a shader slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderDataType {
    Float,
    Vector2Float,
    Vector3Float,
    Vector4Float,
    Matrix44Float,
    Int,
    UInt,
    Vector2UInt,
    Vector3UInt,
    Vector4UInt,
}

impl RenderDataType {
    /// Number of 32-bit components in one element.
    pub fn components(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::UInt => 1,
            Self::Vector2Float | Self::Vector2UInt => 2,
            Self::Vector3Float | Self::Vector3UInt => 3,
            Self::Vector4Float | Self::Vector4UInt => 4,
            Self::Matrix44Float => 16,
        }
    }

    /// Size of one tightly packed element in bytes.
    pub fn size_bytes(self) -> usize {
        self.components() * 4
    }

    /// The WGSL spelling of this type.
    pub fn wgsl(self) -> &'static str {
        match self {
            Self::Float => "f32",
            Self::Vector2Float => "vec2<f32>",
            Self::Vector3Float => "vec3<f32>",
            Self::Vector4Float => "vec4<f32>",
            Self::Matrix44Float => "mat4x4<f32>",
            Self::Int => "i32",
            Self::UInt => "u32",
            Self::Vector2UInt => "vec2<u32>",
            Self::Vector3UInt => "vec3<u32>",
            Self::Vector4UInt => "vec4<u32>",
        }
    }
}

impl fmt::Display for RenderDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Float => "float",
            Self::Vector2Float => "vec2",
            Self::Vector3Float => "vec3",
            Self::Vector4Float => "vec4",
            Self::Matrix44Float => "mat4",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Vector2UInt => "uvec2",
            Self::Vector3UInt => "uvec3",
            Self::Vector4UInt => "uvec4",
        };
        f.write_str(s)
    }
}

/// Pixel formats supported for textures and render buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    R32F,
    Rgb32F,
    Rgba32F,
    Depth32F,
}

impl TextureFormat {
    /// Bytes per texel in the tightly packed host representation.
    pub fn texel_bytes(self) -> usize {
        match self {
            Self::Rgba8 | Self::R32F | Self::Depth32F => 4,
            Self::Rgb32F => 12,
            Self::Rgba32F => 16,
        }
    }
}

/// Texture dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D1,
    D2,
}

impl fmt::Display for TextureDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::D1 => f.write_str("1D texture"),
            Self::D2 => f.write_str("2D texture"),
        }
    }
}

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// How a program assembles its vertices into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Points,
    Lines,
    Triangles,
    IndexedLines,
    IndexedTriangles,
}

impl DrawMode {
    /// Whether draws in this mode read an index buffer.
    pub fn is_indexed(self) -> bool {
        matches!(self, Self::IndexedLines | Self::IndexedTriangles)
    }

    /// Number of vertices per primitive.
    pub fn vertices_per_primitive(self) -> usize {
        match self {
            Self::Points => 1,
            Self::Lines | Self::IndexedLines => 2,
            Self::Triangles | Self::IndexedTriangles => 3,
        }
    }
}

/// Purpose of a render buffer attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderBufferType {
    Color,
    ColorAlpha,
    Depth,
    Float4,
}

impl RenderBufferType {
    /// The pixel format backing this kind of render buffer.
    pub fn format(self) -> TextureFormat {
        match self {
            Self::Color | Self::ColorAlpha => TextureFormat::Rgba8,
            Self::Depth => TextureFormat::Depth32F,
            Self::Float4 => TextureFormat::Rgba32F,
        }
    }
}
