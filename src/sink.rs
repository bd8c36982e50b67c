//! The `SinkClient` contract: the three CloudWatch Logs-style operations a
//! pusher needs from its remote collaborator, and the request/response
//! shapes that flow across it.
//!
//! Credential resolution, endpoint selection, and transport are the
//! collaborator's concern; this crate only depends on the trait below.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::event::WireEvent;

/// A `(group, stream)` pair identifying a destination in the sink. Immutable
/// for a pusher's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub group: String,
    pub stream: String,
}

impl Target {
    pub fn new(group: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            stream: stream.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PutLogEventsRequest {
    pub group: String,
    pub stream: String,
    pub events: Vec<WireEvent>,
    pub sequence_token: Option<String>,
}

/// Sub-ranges of a batch the sink accepted the request for but dropped on
/// the floor, reported back instead of rejecting the whole call.
#[derive(Debug, Clone, Default)]
pub struct RejectedLogEventsInfo {
    pub too_old_log_event_end_index: Option<usize>,
    pub too_new_log_event_start_index: Option<usize>,
    pub expired_log_event_end_index: Option<usize>,
}

impl RejectedLogEventsInfo {
    pub fn is_empty(&self) -> bool {
        self.too_old_log_event_end_index.is_none()
            && self.too_new_log_event_start_index.is_none()
            && self.expired_log_event_end_index.is_none()
    }

    /// Best-effort count of events covered by the reported sub-ranges, for
    /// the warning log line. The three ranges describe disjoint prefixes and
    /// suffixes of the batch in the real API, so a plain sum is a reasonable
    /// approximation even though pathological overlapping ranges could
    /// double-count.
    pub fn approximate_count(&self, total_events: usize) -> usize {
        let mut count = 0;
        if let Some(end) = self.too_old_log_event_end_index {
            count += end.saturating_add(1);
        }
        if let Some(start) = self.too_new_log_event_start_index {
            count += total_events.saturating_sub(start);
        }
        if let Some(end) = self.expired_log_event_end_index {
            count += end.saturating_add(1);
        }
        count
    }
}

#[derive(Debug, Clone, Default)]
pub struct PutLogEventsResponse {
    pub next_sequence_token: Option<String>,
    pub rejected_info: Option<RejectedLogEventsInfo>,
}

/// The remote append-only log sink a pusher forwards batches to.
///
/// Implementations must be safe to call concurrently: the sink client is
/// shared across every pusher in a process, even though each pusher only
/// ever has one call to it in flight at a time.
#[async_trait]
pub trait SinkClient: Send + Sync {
    async fn put_log_events(
        &self,
        req: PutLogEventsRequest,
    ) -> Result<PutLogEventsResponse, SinkError>;

    async fn create_log_group(&self, group: &str) -> Result<(), SinkError>;

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), SinkError>;
}
