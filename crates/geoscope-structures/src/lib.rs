//! Structure implementations for geoscope.
//!
//! This crate provides concrete implementations of geometric structures:
//! - Surface meshes (triangles, polygons) with element permutations
//! - Point clouds
//!
//! Quantity behavior shared across structures (scalar colormapping, color
//! shading, vector glyphs) lives in [`capabilities`] and is composed into each
//! quantity type rather than inherited.

// Graphics code intentionally uses casts for indices, colors, and coordinates
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod capabilities;
pub mod point_cloud;
pub mod surface_mesh;

pub use capabilities::{ScalarColoring, VectorStyle, VectorType};
pub use point_cloud::{
    PointCloud, PointCloudColorQuantity, PointCloudKind, PointCloudQuantity,
    PointCloudScalarQuantity, PointCloudVectorQuantity,
};
pub use surface_mesh::{
    BackfacePolicy, DerivedArray, MeshColorQuantity, MeshIntrinsicVectorQuantity,
    MeshParameterizationQuantity, MeshQuantity, MeshScalarQuantity, MeshStyle, MeshVectorQuantity,
    ParamCoordsType, ParamStyle, ParamVizStyle, ShadeStyle, SurfaceMesh, SurfaceMeshKind,
};
