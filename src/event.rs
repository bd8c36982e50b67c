//! Event types and the conversion from a producer's [`LogEvent`] to the
//! sink's [`WireEvent`].

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{MSG_SIZE_LIMIT, TRUNCATED_SUFFIX};

/// A one-shot completion callback, invoked after an event has been accepted
/// (or otherwise resolved) by the sink. Never invoked more than once.
pub struct Callback(Option<Box<dyn FnOnce() + Send>>);

impl Callback {
    /// Wrap an arbitrary closure as a completion callback.
    pub fn new<F: FnOnce() + Send + 'static>(f: F) -> Self {
        Self(Some(Box::new(f)))
    }

    /// A callback that does nothing when invoked.
    pub fn noop() -> Self {
        Self(None)
    }

    /// Invoke the callback. Safe to call on an already-invoked or no-op
    /// callback; it simply does nothing the second time.
    pub fn invoke(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback")
            .field(&self.0.is_some())
            .finish()
    }
}

impl From<tokio::sync::oneshot::Sender<()>> for Callback {
    fn from(tx: tokio::sync::oneshot::Sender<()>) -> Self {
        Callback::new(move || {
            let _ = tx.send(());
        })
    }
}

/// An incoming event from a producer, before it has been converted to the
/// sink's wire format.
pub struct LogEvent {
    pub message: String,
    /// Wall-clock instant the event occurred. `None` stands in for the "zero
    /// instant" of the spec: the time is unknown and must be assigned by the
    /// converter.
    pub time: Option<SystemTime>,
    pub done: Callback,
}

impl LogEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            time: None,
            done: Callback::noop(),
        }
    }

    pub fn with_time(mut self, time: SystemTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_callback<F: FnOnce() + Send + 'static>(mut self, f: F) -> Self {
        self.done = Callback::new(f);
        self
    }
}

/// The event shape the sink accepts: a message within its size limit and an
/// integer-millisecond timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireEvent {
    pub message: String,
    pub timestamp: i64,
}

/// Truncate `message` to `MSG_SIZE_LIMIT` bytes, signaling truncation with
/// `TRUNCATED_SUFFIX` inside that limit. The cut point always falls on a
/// UTF-8 character boundary.
pub fn truncate_message(message: &str) -> String {
    if message.len() <= MSG_SIZE_LIMIT {
        return message.to_string();
    }

    let mut boundary = MSG_SIZE_LIMIT.saturating_sub(TRUNCATED_SUFFIX.len());
    while boundary > 0 && !message.is_char_boundary(boundary) {
        boundary -= 1;
    }

    let mut out = String::with_capacity(boundary + TRUNCATED_SUFFIX.len());
    out.push_str(&message[..boundary]);
    out.push_str(TRUNCATED_SUFFIX);
    out
}

fn to_millis(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

fn now_ms() -> i64 {
    to_millis(SystemTime::now())
}

/// Normalizes incoming events into wire events. Carries the last timestamp
/// it assigned so that a run of events with unknown time inherit a
/// consistent, monotonically-informed value rather than each independently
/// sampling the wall clock.
#[derive(Debug, Default)]
pub struct EventConverter {
    last_valid_time_ms: Option<i64>,
}

impl EventConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a producer event into its wire form. Pure other than the
    /// `last_valid_time_ms` carry, which this call both reads and updates.
    pub fn convert(&mut self, event: &LogEvent) -> WireEvent {
        let message = truncate_message(&event.message);
        let timestamp = match event.time {
            Some(t) => {
                let ms = to_millis(t);
                self.last_valid_time_ms = Some(ms);
                ms
            }
            None => self.last_valid_time_ms.unwrap_or_else(now_ms),
        };
        WireEvent { message, timestamp }
    }
}
