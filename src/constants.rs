//! Numeric limits imposed by the remote log sink, plus the admission and
//! batching windows derived from them.

/// Maximum size in bytes of a single `PutLogEvents` request payload.
pub const REQ_SIZE_LIMIT: usize = 1_048_576;

/// Maximum number of events in a single `PutLogEvents` request.
pub const REQ_EVENTS_LIMIT: usize = 10_000;

/// Per-event overhead added to the message length when computing batch size.
pub const EVENT_HEADER_SIZE: usize = 26;

/// Maximum message length accepted by the sink; longer messages are truncated.
pub const MSG_SIZE_LIMIT: usize = 262_144;

/// Appended to a message truncated down to `MSG_SIZE_LIMIT`.
pub const TRUNCATED_SUFFIX: &str = "[Truncated...]";

/// Maximum span between the oldest and newest event timestamp in one batch.
pub const MAX_BATCH_SPAN_MS: i64 = 24 * 60 * 60 * 1000;

/// Events older than this many hours are rejected at ingress.
pub const ADMISSION_MAX_AGE_HOURS: f64 = 24.0 * 14.0;

/// Events more than this many hours in the future are rejected at ingress.
pub const ADMISSION_MAX_FUTURE_HOURS: f64 = 2.0;
