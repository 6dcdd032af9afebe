//! Core abstractions for geoscope.
//!
//! This crate provides the fundamental traits and types used throughout geoscope:
//! - [`ManagedBuffer`], the lazy host/device value cache behind every array
//! - [`Structure`] trait for geometric objects (meshes, point clouds, etc.)
//! - [`Quantity`] trait and [`QuantityMap`] for data attached to structures
//! - Element permutations, the structure registry, and per-session state
//! - Configuration options and the [`UiBuilder`] toolkit boundary

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Element counts move between usize and u32 for pick indices and GPU sizes
#![allow(clippy::cast_possible_truncation)]

pub mod error;
pub mod indexing;
pub mod managed_buffer;
pub mod options;
pub mod quantity;
pub mod registry;
pub mod state;
pub mod structure;
pub mod types;
pub mod ui;

pub use error::{GeoscopeError, Result};
pub use indexing::{check_size, expected_size, Permutation};
pub use managed_buffer::{ManagedBuffer, Residency};
pub use options::Options;
pub use quantity::{Quantity, QuantityBase, QuantityMap, StructureKind};
pub use registry::Registry;
pub use state::{Context, PickRange, PickResult};
pub use structure::{bounds_of, Structure, StructureBase};
pub use types::{DataType, ElementKind, QuantityKind};
pub use ui::{RecordingUi, UiBuilder, UiEvent};

// Re-export glam types for convenience
pub use glam::{Mat4, UVec3, Vec2, Vec3, Vec4};
