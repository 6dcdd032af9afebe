//! Rendering error types.

use thiserror::Error;

use crate::types::RenderDataType;

/// Errors that can occur while creating, binding, or drawing render resources.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// No base shader program is registered under this name.
    #[error("shader program '{0}' not found")]
    ProgramNotFound(String),

    /// No shader rule is registered under this name.
    #[error("shader rule '{0}' not found")]
    RuleNotFound(String),

    /// The program does not declare a uniform with this name.
    #[error("uniform '{name}' is not declared by program '{program}'")]
    UniformNotFound { program: String, name: String },

    /// The program does not declare an attribute with this name.
    #[error("attribute '{name}' is not declared by program '{program}'")]
    AttributeNotFound { program: String, name: String },

    /// The program does not declare a texture with this name.
    #[error("texture '{name}' is not declared by program '{program}'")]
    TextureNotFound { program: String, name: String },

    /// A value, buffer, or texture does not match the declared slot type.
    #[error("type mismatch for '{name}': expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Bound attribute buffers disagree on their element count.
    #[error("attribute '{name}' of program '{program}' has {actual} elements, expected {expected}")]
    AttributeSizeMismatch {
        program: String,
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A required slot has nothing bound to it.
    #[error("program '{program}' cannot draw: '{slot}' has not been set")]
    IncompleteBinding { program: String, slot: String },

    /// An element index is outside the buffer.
    #[error("index {index} out of range for '{name}' with {len} elements")]
    IndexOutOfRange {
        name: String,
        index: usize,
        len: usize,
    },

    /// Raw data could not be interpreted as whole elements of the buffer type.
    #[error("{bytes} bytes is not a whole number of {data_type} elements")]
    MalformedData {
        data_type: RenderDataType,
        bytes: usize,
    },

    /// A render resource is in a state that should be unreachable.
    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),

    /// Failed to create a graphics adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create a graphics device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(String),

    /// Shader compilation failed.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    /// Texture creation failed.
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),

    /// Mapping a buffer for readback failed.
    #[error("buffer readback failed: {0}")]
    BufferMapFailed(String),

    /// The backend reported an error inside a checked draw.
    #[error("render validation failed: {0}")]
    ValidationFailed(String),
}

impl RenderError {
    pub(crate) fn type_mismatch(
        name: &str,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::TypeMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
