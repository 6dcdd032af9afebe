//! Render resource handles.
//!
//! Attribute buffers, textures, render buffers, and framebuffers are owned by an
//! engine backend and shared through `Rc`. A handle can be held by the quantity
//! that produced its data and bound into any number of shader program slots at
//! the same time; the backend resource is released when the last holder drops.
//! All methods take `&self` and backends use interior mutability, since the
//! whole render layer is single-threaded.

use std::any::Any;
use std::rc::Rc;

use glam::{DVec2, DVec3, DVec4, Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};

use crate::error::{RenderError, RenderResult};
use crate::types::{
    FilterMode, RenderBufferType, RenderDataType, TextureDimension, TextureFormat,
};

/// A host type that can be marshalled into an attribute buffer.
///
/// Double-precision types are narrowed to `f32` on the way in and widened on
/// the way out, so `Vec<f64>` and `Vec<f32>` both target `Float` buffers.
pub trait BufferElement: Copy + 'static {
    /// The declared buffer type this element is stored as.
    const DATA_TYPE: RenderDataType;
    /// Number of `DATA_TYPE` values per element (greater than one for array attributes).
    const ARRAY_COUNT: usize = 1;

    /// Appends the packed bytes of this element.
    fn write_bytes(&self, out: &mut Vec<u8>);

    /// Decodes one element from exactly `stride::<Self>()` bytes.
    fn read_bytes(bytes: &[u8]) -> Self;
}

/// Size of one packed element in bytes.
pub fn stride<T: BufferElement>() -> usize {
    T::DATA_TYPE.size_bytes() * T::ARRAY_COUNT
}

/// Packs a slice of elements into tightly laid out bytes.
pub fn pack<T: BufferElement>(data: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * stride::<T>());
    for value in data {
        value.write_bytes(&mut out);
    }
    out
}

/// Unpacks bytes produced by [`pack`].
pub fn unpack<T: BufferElement>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(stride::<T>()).map(T::read_bytes).collect()
}

macro_rules! pod_element {
    ($ty:ty, $data_type:expr) => {
        impl BufferElement for $ty {
            const DATA_TYPE: RenderDataType = $data_type;

            fn write_bytes(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(bytemuck::bytes_of(self));
            }

            fn read_bytes(bytes: &[u8]) -> Self {
                bytemuck::pod_read_unaligned(bytes)
            }
        }
    };
}

pod_element!(f32, RenderDataType::Float);
pod_element!(i32, RenderDataType::Int);
pod_element!(u32, RenderDataType::UInt);
pod_element!(Vec2, RenderDataType::Vector2Float);
pod_element!(Vec3, RenderDataType::Vector3Float);
pod_element!(Vec4, RenderDataType::Vector4Float);
pod_element!(Mat4, RenderDataType::Matrix44Float);
pod_element!(UVec2, RenderDataType::Vector2UInt);
pod_element!(UVec3, RenderDataType::Vector3UInt);
pod_element!(UVec4, RenderDataType::Vector4UInt);

macro_rules! narrowed_element {
    ($ty:ty, $narrow:ty, $data_type:expr, $to:ident, $from:ident) => {
        impl BufferElement for $ty {
            const DATA_TYPE: RenderDataType = $data_type;

            fn write_bytes(&self, out: &mut Vec<u8>) {
                let narrow: $narrow = self.$to();
                out.extend_from_slice(bytemuck::bytes_of(&narrow));
            }

            fn read_bytes(bytes: &[u8]) -> Self {
                let narrow: $narrow = bytemuck::pod_read_unaligned(bytes);
                narrow.$from()
            }
        }
    };
}

narrowed_element!(DVec2, Vec2, RenderDataType::Vector2Float, as_vec2, as_dvec2);
narrowed_element!(DVec3, Vec3, RenderDataType::Vector3Float, as_vec3, as_dvec3);
narrowed_element!(DVec4, Vec4, RenderDataType::Vector4Float, as_vec4, as_dvec4);

impl BufferElement for f64 {
    const DATA_TYPE: RenderDataType = RenderDataType::Float;

    #[allow(clippy::cast_possible_truncation)]
    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(*self as f32).to_ne_bytes());
    }

    fn read_bytes(bytes: &[u8]) -> Self {
        f64::from(bytemuck::pod_read_unaligned::<f32>(bytes))
    }
}

impl<T: BufferElement, const N: usize> BufferElement for [T; N] {
    const DATA_TYPE: RenderDataType = T::DATA_TYPE;
    const ARRAY_COUNT: usize = N * T::ARRAY_COUNT;

    fn write_bytes(&self, out: &mut Vec<u8>) {
        for value in self {
            value.write_bytes(out);
        }
    }

    fn read_bytes(bytes: &[u8]) -> Self {
        let inner = stride::<T>();
        std::array::from_fn(|i| T::read_bytes(&bytes[i * inner..(i + 1) * inner]))
    }
}

/// Checks that `bytes` holds a whole number of elements and returns the count.
pub fn element_count(
    data_type: RenderDataType,
    array_count: usize,
    bytes: usize,
) -> RenderResult<usize> {
    let stride = data_type.size_bytes() * array_count;
    if stride == 0 || bytes % stride != 0 {
        return Err(RenderError::MalformedData { data_type, bytes });
    }
    Ok(bytes / stride)
}

/// A typed, backend-owned vertex attribute array.
pub trait AttributeBuffer {
    /// Returns a reference to self as `Any` for backend downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Declared element type.
    fn data_type(&self) -> RenderDataType;

    /// Values per element; 1 unless this backs an array attribute.
    fn array_count(&self) -> usize;

    /// Whether data has ever been uploaded.
    fn is_set(&self) -> bool;

    /// Element count of the current contents, zero when unset.
    fn data_size(&self) -> usize;

    /// Replaces the contents with packed element bytes.
    fn set_data_raw(&self, bytes: &[u8]) -> RenderResult<()>;

    /// Reads `count` elements starting at `start`.
    fn read_raw(&self, start: usize, count: usize) -> RenderResult<Vec<u8>>;

    /// How many times contents have been uploaded to this buffer.
    fn upload_count(&self) -> usize;
}

impl dyn AttributeBuffer {
    fn check_element<T: BufferElement>(&self) -> RenderResult<()> {
        if T::DATA_TYPE != self.data_type() || T::ARRAY_COUNT != self.array_count() {
            return Err(RenderError::type_mismatch(
                "attribute buffer",
                describe(self.data_type(), self.array_count()),
                describe(T::DATA_TYPE, T::ARRAY_COUNT),
            ));
        }
        Ok(())
    }

    /// Uploads typed data, replacing the previous contents.
    pub fn set_data<T: BufferElement>(&self, data: &[T]) -> RenderResult<()> {
        self.check_element::<T>()?;
        self.set_data_raw(&pack(data))
    }

    /// Reads back a single element.
    pub fn get_value<T: BufferElement>(&self, index: usize) -> RenderResult<T> {
        self.check_element::<T>()?;
        let len = self.data_size();
        if index >= len {
            return Err(RenderError::IndexOutOfRange {
                name: "attribute buffer".to_string(),
                index,
                len,
            });
        }
        let bytes = self.read_raw(index, 1)?;
        Ok(T::read_bytes(&bytes))
    }

    /// Reads back the whole buffer.
    pub fn get_data<T: BufferElement>(&self) -> RenderResult<Vec<T>> {
        self.check_element::<T>()?;
        let bytes = self.read_raw(0, self.data_size())?;
        Ok(unpack(&bytes))
    }
}

pub(crate) fn describe(data_type: RenderDataType, array_count: usize) -> String {
    if array_count == 1 {
        data_type.to_string()
    } else {
        format!("{data_type}[{array_count}]")
    }
}

/// A 1D or 2D image resource.
pub trait Texture {
    /// Returns a reference to self as `Any` for backend downcasting.
    fn as_any(&self) -> &dyn Any;

    fn dimension(&self) -> TextureDimension;

    fn format(&self) -> TextureFormat;

    /// Width and height; height is 1 for 1D textures.
    fn size(&self) -> (u32, u32);

    fn is_set(&self) -> bool;

    fn filter_mode(&self) -> FilterMode;

    fn set_filter_mode(&self, mode: FilterMode);

    /// Reallocates storage, discarding the contents.
    fn resize(&self, width: u32, height: u32) -> RenderResult<()>;

    /// Uploads exactly `width * height` texels.
    fn set_data_raw(&self, bytes: &[u8]) -> RenderResult<()>;

    fn read_data_raw(&self) -> RenderResult<Vec<u8>>;
}

/// Number of bytes a full upload to a texture must contain.
pub fn texture_byte_len(format: TextureFormat, width: u32, height: u32) -> usize {
    format.texel_bytes() * width as usize * height as usize
}

/// An offscreen image that can only be rendered into.
pub trait RenderBuffer {
    fn as_any(&self) -> &dyn Any;

    fn kind(&self) -> RenderBufferType;

    fn size(&self) -> (u32, u32);

    fn resize(&self, width: u32, height: u32) -> RenderResult<()>;
}

/// Something a framebuffer can render into.
#[derive(Clone)]
pub enum Attachment {
    RenderBuffer(Rc<dyn RenderBuffer>),
    Texture(Rc<dyn Texture>),
}

impl Attachment {
    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::RenderBuffer(buffer) => buffer.size(),
            Self::Texture(texture) => texture.size(),
        }
    }

    pub fn resize(&self, width: u32, height: u32) -> RenderResult<()> {
        match self {
            Self::RenderBuffer(buffer) => buffer.resize(width, height),
            Self::Texture(texture) => texture.resize(width, height),
        }
    }

    pub fn is_depth(&self) -> bool {
        match self {
            Self::RenderBuffer(buffer) => buffer.kind() == RenderBufferType::Depth,
            Self::Texture(texture) => texture.format() == TextureFormat::Depth32F,
        }
    }
}

/// A set of color and depth attachments that draws are directed into.
pub trait FrameBuffer {
    fn as_any(&self) -> &dyn Any;

    fn size(&self) -> (u32, u32);

    /// Resizes the framebuffer and every attachment.
    fn resize(&self, width: u32, height: u32) -> RenderResult<()>;

    fn add_color_buffer(&self, attachment: Attachment) -> RenderResult<()>;

    fn add_depth_buffer(&self, attachment: Attachment) -> RenderResult<()>;

    fn set_clear_color(&self, color: Vec4);

    fn clear_color(&self) -> Vec4;

    /// Fills the color attachments with the clear color and resets depth.
    fn clear(&self) -> RenderResult<()>;

    /// Makes this the target of subsequent draws.
    fn bind_for_rendering(&self) -> RenderResult<()>;

    /// Reads one pixel of the first color attachment as RGBA floats.
    fn read_float4(&self, x: u32, y: u32) -> RenderResult<Vec4>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that double-precision data narrows to float buffers.
    #[test]
    fn test_f64_narrows_to_float() {
        assert_eq!(<f64 as BufferElement>::DATA_TYPE, RenderDataType::Float);
        let bytes = pack(&[1.5_f64, -2.0]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(unpack::<f64>(&bytes), vec![1.5, -2.0]);
    }

    /// Test that array elements report their arity.
    #[test]
    fn test_array_element_stride() {
        assert_eq!(<[Vec3; 2] as BufferElement>::ARRAY_COUNT, 2);
        assert_eq!(stride::<[Vec3; 2]>(), 24);
        let data = [[Vec3::X, Vec3::Y], [Vec3::Z, Vec3::ONE]];
        assert_eq!(unpack::<[Vec3; 2]>(&pack(&data)), data.to_vec());
    }

    /// Test that partial elements are rejected.
    #[test]
    fn test_element_count_rejects_partial() {
        assert_eq!(element_count(RenderDataType::Vector3Float, 1, 24), Ok(2));
        assert!(matches!(
            element_count(RenderDataType::Vector3Float, 1, 20),
            Err(RenderError::MalformedData { .. })
        ));
    }
}
