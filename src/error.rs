//! Error types for commswire.

use thiserror::Error;

/// Main error type for all commswire operations.
///
/// Garbage bytes, invalid frames and transport failures are not errors at
/// this level: they are turned into Invalid messages or error callbacks.
/// `CommsError` covers misuse and failures that concern a single call.
#[derive(Debug, Error)]
pub enum CommsError {
    /// JSON serialization/deserialization error (message lists, extra info).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Hex payload in a persisted message list could not be decoded.
    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Outgoing message could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),

    /// A send run is already in progress.
    #[error("Send already in progress")]
    AlreadySending,

    /// A required pipeline component is not attached.
    #[error("No {0} attached")]
    NotAttached(&'static str),

    /// Transport refused an operation.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The socket is not connected.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using CommsError.
pub type Result<T> = std::result::Result<T, CommsError>;
