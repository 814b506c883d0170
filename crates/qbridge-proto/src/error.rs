//! Error types for the wire protocol.

use thiserror::Error;

/// Errors raised while encoding, decoding or validating frames.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtoError {
    /// The frame is not valid JSON or does not match the schema.
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame is empty after trimming.
    #[error("Empty frame")]
    Empty,

    /// A reply arrived for a different request than the one in flight.
    #[error("Reply id {got} does not match in-flight request {expected}")]
    IdMismatch { expected: u64, got: u64 },

    /// A reply does not answer the request kind that was sent.
    #[error("Unexpected '{got}' reply to a '{request}' request")]
    UnexpectedReply {
        request: &'static str,
        got: &'static str,
    },
}

/// Result type for protocol operations.
pub type ProtoResult<T> = Result<T, ProtoError>;
