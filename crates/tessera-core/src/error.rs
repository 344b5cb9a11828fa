//! Error types for tensor compression operations.

use thiserror::Error;

/// Result type alias for compression layer operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Compression layer error types.
///
/// Every variant is fatal for the operation that produced it. The layer never
/// retries, reallocates or substitutes a default value.
#[derive(Debug, Error)]
pub enum Error {
    /// No codec is registered under the requested name.
    #[error("unknown codec: {name}")]
    UnknownCodec { name: String },

    /// A codec parameter is missing, of the wrong kind or out of range.
    #[error("invalid config for {codec}: {message}")]
    InvalidConfig { codec: String, message: String },

    /// A copy to or from accelerator memory failed, or no accelerator exists.
    #[error("device transfer failed: {message}")]
    DeviceTransfer { message: String },

    /// The payload does not fit into the preallocated scratch buffer.
    #[error("buffer overflow: need {required} bytes, scratch capacity is {capacity}")]
    BufferOverflow { required: usize, capacity: usize },

    /// A byte or element count does not match the tensor layout.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Codec-specific failure.
    #[error("{codec} error: {message}")]
    Codec {
        codec: &'static str,
        message: String,
    },

    /// I/O error while loading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Error {
    /// Create an unknown codec error.
    pub fn unknown_codec(name: impl Into<String>) -> Self {
        Error::UnknownCodec { name: name.into() }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(codec: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            codec: codec.into(),
            message: message.into(),
        }
    }

    /// Create a device transfer error.
    pub fn device_transfer(message: impl Into<String>) -> Self {
        Error::DeviceTransfer {
            message: message.into(),
        }
    }

    /// Create a buffer overflow error.
    pub fn buffer_overflow(required: usize, capacity: usize) -> Self {
        Error::BufferOverflow { required, capacity }
    }

    /// Create a shape mismatch error.
    pub fn shape_mismatch(expected: usize, actual: usize) -> Self {
        Error::ShapeMismatch { expected, actual }
    }

    /// Create a codec-specific error.
    pub fn codec(codec: &'static str, message: impl Into<String>) -> Self {
        Error::Codec {
            codec,
            message: message.into(),
        }
    }

    /// Whether the error can only be raised while constructing a layer.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownCodec { .. } | Error::InvalidConfig { .. } | Error::Parse(_)
        )
    }

    /// Get error category for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Error::UnknownCodec { .. } => "unknown_codec",
            Error::InvalidConfig { .. } => "invalid_config",
            Error::DeviceTransfer { .. } => "device_transfer",
            Error::BufferOverflow { .. } => "buffer_overflow",
            Error::ShapeMismatch { .. } => "shape_mismatch",
            Error::Codec { .. } => "codec_error",
            Error::Io(_) => "io_error",
            Error::Parse(_) => "parse_error",
        }
    }
}
