//! Error types for archive resolution and opening.

use thiserror::Error;

/// Main error type for open operations.
#[derive(Debug, Error)]
pub enum OpenError {
    /// No registered format matched the stream.
    #[error("No matching archive format")]
    FormatNotFound,

    /// The stream matched a container format that cannot be browsed on its
    /// own (an executable without a recognizable embedded archive).
    #[error("No archive format available for {0} stream")]
    NoFormatAvailable(String),

    /// The archive requires a password but none (or a wrong one) was provided.
    #[error("Password required")]
    PasswordRequired,

    /// The external engine failed; the original code is kept intact.
    #[error("Engine error: {0}")]
    Engine(EngineError),

    /// The nesting chain exceeded the fixed depth limit.
    #[error("Archive nesting exceeds {limit} levels")]
    TooDeeplyNested {
        /// Maximum number of nested levels
        limit: usize,
    },

    /// A volume of a split archive could not be located.
    #[error("Volume not found: {0}")]
    VolumeNotFound(String),

    /// The format registry document could not be parsed.
    #[error("Registry parse error: {0}")]
    Registry(#[from] serde_json::Error),

    /// The format registry document parsed but is not usable.
    #[error("Invalid registry: {0}")]
    InvalidRegistry(String),

    /// An I/O error occurred on the underlying stream.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for OpenError {
    fn from(e: EngineError) -> Self {
        if e.code == EngineError::E_NEED_PASSWORD {
            OpenError::PasswordRequired
        } else {
            OpenError::Engine(e)
        }
    }
}

/// Opaque failure reported by the codec engine.
///
/// `code` follows the HRESULT convention of the engines this crate fronts, so
/// callers that already know those codes can match on them directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (0x{code:08X})")]
pub struct EngineError {
    /// Raw engine status code
    pub code: u32,

    /// Human readable description
    pub message: String,
}

impl EngineError {
    /// Unspecified failure.
    pub const E_FAIL: u32 = 0x8000_4005;
    /// Capability not implemented.
    pub const E_NOT_IMPLEMENTED: u32 = 0x8000_4001;
    /// The engine has no handler class for the requested identifier.
    pub const E_CLASS_NOT_AVAILABLE: u32 = 0x8004_0111;
    /// A password is needed to continue.
    pub const E_NEED_PASSWORD: u32 = 0x8004_0001;
    /// Malformed or oversized data.
    pub const E_DATA: u32 = 0x8004_0002;

    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(Self::E_FAIL, message)
    }

    pub fn need_password() -> Self {
        Self::new(Self::E_NEED_PASSWORD, "password needed")
    }

    pub fn not_implemented(what: impl Into<String>) -> Self {
        Self::new(Self::E_NOT_IMPLEMENTED, what)
    }

    pub fn class_not_available(class_id: impl std::fmt::Display) -> Self {
        Self::new(
            Self::E_CLASS_NOT_AVAILABLE,
            format!("no handler class {}", class_id),
        )
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(Self::E_DATA, message)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self::data(e.to_string())
    }
}
