//! Device store error types

/// Result alias for fallible store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures inside the device store
///
/// None of these reach provider-facing operations: stale or unknown input is
/// dropped silently and transport failures are logged. They are surfaced by
/// the wire codec and by configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Encoding a replication message failed
    #[error("failed to encode {what}: {reason}")]
    Encode {
        /// Message kind being encoded
        what: &'static str,
        /// Codec error
        reason: String,
    },
    /// Decoding a replication message failed
    #[error("failed to decode replication message: {reason}")]
    Decode {
        /// Codec error
        reason: String,
    },
    /// A peer speaks a different wire schema
    #[error("unsupported wire schema version {found} (expected {expected})")]
    SchemaMismatch {
        /// Version carried by the message
        found: u16,
        /// Version this node speaks
        expected: u16,
    },
    /// Configuration could not be loaded or is invalid
    #[error("invalid configuration: {reason}")]
    Config {
        /// What is wrong
        reason: String,
    },
}

impl StoreError {
    /// Create an encode error
    pub fn encode(what: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Encode {
            what,
            reason: reason.to_string(),
        }
    }

    /// Create a decode error
    pub fn decode(reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            reason: reason.to_string(),
        }
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}
