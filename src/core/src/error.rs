use crate::field::BuildField;
use thiserror::Error;

/// PixelProps error types
#[derive(Error, Debug)]
pub enum PropsError {
    /// The identity store refused a field write
    #[error("Field write rejected: {field} - {reason}")]
    FieldRejected { field: BuildField, reason: String },

    /// The field is read-only on this platform
    #[error("Field is read-only: {0}")]
    ReadOnlyField(BuildField),

    /// Foreground task observer failure (register, unregister, query)
    #[error("Task observer error: {0}")]
    ObserverError(String),

    /// Key attestation blocked for a privileged caller
    #[error("Key attestation blocked (gms={gms}, store={store})")]
    AttestationBlocked { gms: bool, store: bool },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PropsError {
    /// Whether this error must halt the calling operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PropsError::AttestationBlocked { .. })
    }
}

impl From<serde_json::Error> for PropsError {
    fn from(err: serde_json::Error) -> Self {
        PropsError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for PropsError {
    fn from(err: serde_yaml::Error) -> Self {
        PropsError::SerializationError(err.to_string())
    }
}

/// Result type alias for PixelProps operations
pub type Result<T> = std::result::Result<T, PropsError>;
