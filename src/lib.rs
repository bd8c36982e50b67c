//! Log Pusher
//!
//! A per-destination log batching component that buffers events from
//! producers and forwards them in batches to a remote append-only log sink,
//! trading off throughput, latency, and correctness under the sink's own
//! constraints (size and count limits, a 24-hour batch span cap, timestamp
//! admission windows, and sequence-token-ordered writes).
//!
//! - **config**: environment-based configuration for flush cadence, retry
//!   ceiling, ingress capacity, and shutdown drain deadline
//! - **event**: producer-facing [`event::LogEvent`] and its conversion to
//!   the sink's [`event::WireEvent`]
//! - **admission**: the timestamp-range filter applied at ingress
//! - **buffer**: per-target batch accumulation and batching-policy queries
//! - **ingress**: the bounded, evictable queue between producers and a
//!   target's worker
//! - **sink**: the [`sink::SinkClient`] contract a pusher forwards batches to
//! - **pusher**: the worker loop and the [`pusher::Pusher`] handle producers use
//! - **mock**: an in-memory `SinkClient` for tests and the demo harness
//! - **demo**: a synthetic log source used only by `main`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use logpusher::config::Config;
//! use logpusher::event::LogEvent;
//! use logpusher::mock::MockSinkClient;
//! use logpusher::pusher::Pusher;
//! use logpusher::sink::Target;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("failed to load config");
//!     let sink = Arc::new(MockSinkClient::new());
//!     let pusher = Pusher::spawn(Target::new("my-app", "host-1"), sink, &config);
//!
//!     pusher.add_event(LogEvent::new("hello")).await;
//!     pusher.stop().await;
//! }
//! ```

pub mod admission;
pub mod buffer;
pub mod config;
pub mod constants;
pub mod demo;
pub mod error;
pub mod event;
pub mod ingress;
pub mod mock;
pub mod pusher;
pub mod sink;

pub use config::{Config, ConfigError};
pub use error::{PushError, SinkError};
pub use event::{Callback, EventConverter, LogEvent, WireEvent};
pub use pusher::Pusher;
pub use sink::{PutLogEventsRequest, PutLogEventsResponse, RejectedLogEventsInfo, SinkClient, Target};
