//! Error types for the sink contract and the pusher itself.

use std::fmt;

/// Typed errors a [`crate::sink::SinkClient`] may return.
///
/// Mirrors the small set of CloudWatch Logs error codes the pusher knows how
/// to react to; anything else collapses into `Other`.
#[derive(Debug, Clone)]
pub enum SinkError {
    /// The destination log group or stream does not exist yet.
    ResourceNotFound,
    /// The sequence token presented did not match the stream's current one.
    /// The sink may hand back the token it expected, which lets the caller
    /// retry immediately instead of giving up.
    InvalidSequenceToken { expected: Option<String> },
    /// A `CreateLogGroup`/`CreateLogStream` call raced with an existing
    /// resource. Callers generally treat this the same as success.
    ResourceAlreadyExists,
    /// Any other sink-reported failure, opaque beyond its message.
    Other(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::ResourceNotFound => write!(f, "log group or stream does not exist"),
            SinkError::InvalidSequenceToken { expected: Some(tok) } => {
                write!(f, "invalid sequence token, expected {tok}")
            }
            SinkError::InvalidSequenceToken { expected: None } => {
                write!(f, "invalid sequence token, no expected token returned")
            }
            SinkError::ResourceAlreadyExists => write!(f, "resource already exists"),
            SinkError::Other(msg) => write!(f, "sink error: {msg}"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Errors that can occur within the pusher itself, as opposed to sink-typed
/// errors returned from a `SinkClient` call.
#[derive(Debug)]
pub enum PushError {
    /// The worker did not finish draining and exit before the shutdown-drain
    /// deadline; its task keeps running in the background past `stop()`.
    ShutdownTimeout,
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::ShutdownTimeout => write!(f, "shutdown drain timed out"),
        }
    }
}

impl std::error::Error for PushError {}
