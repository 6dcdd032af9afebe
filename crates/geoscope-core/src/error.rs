//! Error types for geoscope.

use geoscope_render::RenderError;
use thiserror::Error;

use crate::types::ElementKind;

/// The main error type for geoscope operations.
#[derive(Error, Debug)]
pub enum GeoscopeError {
    /// A structure with the given name already exists.
    #[error("structure '{0}' already exists")]
    StructureExists(String),

    /// A structure with the given name was not found.
    #[error("structure '{0}' not found")]
    StructureNotFound(String),

    /// A quantity with the given name was not found.
    #[error("quantity '{0}' not found on structure '{1}'")]
    QuantityNotFound(String, String),

    /// A color map with the given name is not registered.
    #[error("color map '{0}' not found")]
    ColorMapNotFound(String),

    /// Mesh connectivity is malformed (short faces, out-of-range vertex indices).
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// Caller-supplied data does not have the expected number of elements.
    #[error("data size mismatch for '{name}': expected {expected}, got {actual}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A permutation does not describe a valid element ordering.
    #[error("invalid {element} permutation: {reason}")]
    InvalidPermutation { element: ElementKind, reason: String },

    /// A host-side computation needs data that currently lives only on the device.
    #[error("'{0}' is only resident in its render buffer; host data is unavailable")]
    HostDataUnavailable(String),

    /// The render buffer was expected to exist but was never allocated.
    #[error("'{0}' has no render buffer")]
    RenderBufferNotAllocated(String),

    /// An internal invariant was violated. Indicates a library bug.
    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),

    /// Rendering error.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GeoscopeError {
    /// Whether this error signals a broken internal invariant rather than bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InternalConsistency(_) | Self::Render(RenderError::InternalConsistency(_))
        )
    }

    /// Logs and builds an internal consistency error.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("internal consistency violation: {message}");
        Self::InternalConsistency(message)
    }
}

/// A specialized Result type for geoscope operations.
pub type Result<T> = std::result::Result<T, GeoscopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that only invariant violations are fatal.
    #[test]
    fn test_is_fatal() {
        assert!(GeoscopeError::InternalConsistency("x".into()).is_fatal());
        assert!(GeoscopeError::Render(RenderError::InternalConsistency("x".into())).is_fatal());
        assert!(!GeoscopeError::StructureExists("x".into()).is_fatal());
        assert!(!GeoscopeError::SizeMismatch {
            name: "x".into(),
            expected: 1,
            actual: 2
        }
        .is_fatal());
    }
}
