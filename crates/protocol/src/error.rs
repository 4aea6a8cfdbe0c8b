use thiserror::Error;

/// Failure to decode or encode a wire message
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload is not JSON, or does not match any known message shape
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Payload is a JSON object without a string `type` tag
    #[error("message has no type tag")]
    MissingType,

    /// Payload carries a `type` tag this client does not understand
    #[error("unknown message type `{0}`")]
    UnknownType(String),
}
