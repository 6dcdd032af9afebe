//! Render resource layer for geoscope.
//!
//! This crate provides the backend-neutral pieces structures draw through:
//! - Attribute buffers, textures, render buffers, and framebuffers
//! - Shader programs with a validated binding table
//! - Source-level replacement rules and the composed program cache
//! - The [`Engine`] trait plus a host-memory backend and an optional wgpu backend

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Element counts and GPU sizes move between usize, u32, and u64 constantly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

pub mod buffer;
pub mod color_maps;
pub mod engine;
pub mod error;
pub mod headless;
pub mod pick;
pub mod shader;
pub mod shaders;
pub mod types;
#[cfg(feature = "wgpu")]
pub mod wgpu_backend;

pub use buffer::{
    Attachment, AttributeBuffer, BufferElement, FrameBuffer, RenderBuffer, Texture,
};
pub use color_maps::{ColorMap, ColorMapRegistry};
pub use engine::{ComposedProgram, Engine, RedrawRequest, ShaderLibrary};
pub use error::{RenderError, RenderResult};
pub use headless::{DrawRecord, HeadlessEngine};
pub use pick::{color_to_index, index_to_color, MAX_PICK_INDEX};
pub use shader::{
    ShaderProgram, ShaderReplacementDefaults, ShaderReplacementRule, ShaderStageSpecification,
    ShaderStageType, UniformValue,
};
pub use types::{
    DrawMode, FilterMode, RenderBufferType, RenderDataType, TextureDimension, TextureFormat,
};
#[cfg(feature = "wgpu")]
pub use wgpu_backend::WgpuEngine;

use glam::Mat4;

/// Render context passed to structures during drawing.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    /// The engine that owns every resource and program.
    pub engine: &'a dyn Engine,
    /// World to view transform of the current camera.
    pub view: Mat4,
    /// The current projection matrix.
    pub projection: Mat4,
    /// The color map registry.
    pub color_maps: &'a ColorMapRegistry,
}

impl RenderContext<'_> {
    /// Model-view matrix for geometry placed by `transform`.
    pub fn model_view(&self, transform: Mat4) -> Mat4 {
        self.view * transform
    }
}
