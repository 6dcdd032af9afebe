//! Small enums shared by structures and quantities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of mesh element a quantity is defined on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    Vertex,
    Face,
    Edge,
    Halfedge,
    Corner,
}

impl ElementKind {
    pub const ALL: [ElementKind; 5] = [
        Self::Vertex,
        Self::Face,
        Self::Edge,
        Self::Halfedge,
        Self::Corner,
    ];
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Face => "face",
            Self::Edge => "edge",
            Self::Halfedge => "halfedge",
            Self::Corner => "corner",
        })
    }
}

/// What the meaningful range of scalar values is, used to pick an initial colormap range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    /// Any value; zero has no special meaning (e.g. a coordinate).
    #[default]
    Standard,
    /// Any value; the range is made symmetric about zero (e.g. profit and loss).
    Symmetric,
    /// Non-negative; the range starts at zero (e.g. a length).
    Magnitude,
}

/// The kind of quantity (for categorization and UI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantityKind {
    /// Scalar values (single float per element).
    Scalar,
    /// Vector values (Vec3 per element).
    Vector,
    /// Color values (RGB per element).
    Color,
    /// Parameterization values (UV coordinates).
    Parameterization,
    /// Other/custom quantity type.
    Other,
}
