//! geoscope: structures, quantities, and lazily uploaded render data for
//! visualizing geometric data.
//!
//! # Quick Start
//!
//! ```
//! use geoscope::*;
//!
//! fn main() -> Result<()> {
//!     let mut session = Session::headless();
//!
//!     let vertices = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)];
//!     let mesh = session.register_surface_mesh("quad", vertices, &[[0u32, 1, 3, 2]])?;
//!     mesh.add_vertex_scalar_quantity("height", vec![0.0, 1.0, 2.0, 3.0])?;
//!
//!     session.draw()?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! A **structure** is a geometric object in the scene (surface mesh, point
//! cloud). A **quantity** is data attached to one of its elements (scalar
//! field, colors, vectors). Every array is held in a [`ManagedBuffer`] that
//! keeps host data and uploads it to the engine only when a draw needs it.
//!
//! All state lives in a [`Session`]; there are no globals.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

mod session;

pub use session::Session;

pub use geoscope_core::{
    bounds_of, check_size, Context, DataType, ElementKind, GeoscopeError, ManagedBuffer, Options,
    Permutation, PickRange, PickResult, Quantity, QuantityKind, QuantityMap, RecordingUi, Registry,
    Residency, Result, Structure, StructureBase, StructureKind, UiBuilder, UiEvent,
};
pub use geoscope_core::{Mat4, UVec3, Vec2, Vec3, Vec4};

pub use geoscope_render::{
    AttributeBuffer, ColorMap, ColorMapRegistry, DrawMode, DrawRecord, Engine, HeadlessEngine,
    RenderContext, RenderDataType, RenderError, ShaderProgram, ShaderReplacementDefaults,
    UniformValue,
};
#[cfg(feature = "wgpu")]
pub use geoscope_render::WgpuEngine;

pub use geoscope_structures::{
    BackfacePolicy, DerivedArray, MeshColorQuantity, MeshIntrinsicVectorQuantity,
    MeshParameterizationQuantity, MeshQuantity, MeshScalarQuantity, MeshStyle, MeshVectorQuantity,
    ParamCoordsType, ParamStyle, ParamVizStyle, PointCloud, PointCloudColorQuantity,
    PointCloudQuantity, PointCloudScalarQuantity, PointCloudVectorQuantity, ScalarColoring,
    ShadeStyle, SurfaceMesh, VectorStyle, VectorType,
};

pub use geoscope_ui::{build_pick_panel, EguiUi};

/// Installs the `env_logger` backend for the `log` facade at `info` level.
///
/// Safe to call more than once; later calls do nothing.
pub fn init_logging() {
    init_logging_with_level(log::LevelFilter::Info);
}

/// Installs the `env_logger` backend, defaulting to `level` when `RUST_LOG` is unset.
pub fn init_logging_with_level(level: log::LevelFilter) {
    let env = env_logger::Env::default().default_filter_or(level.as_str());
    let _ = env_logger::Builder::from_env(env).try_init();
}
