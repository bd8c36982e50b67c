//! The dispatcher loop: one task per target, owning that target's buffer,
//! sequence token, and flush timer, and the only task allowed to call the
//! sink for that target.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::admission::{has_valid_time, log_rejected};
use crate::buffer::BatchBuffer;
use crate::config::Config;
use crate::error::{PushError, SinkError};
use crate::event::{EventConverter, LogEvent, WireEvent};
use crate::ingress::Ingress;
use crate::sink::{PutLogEventsRequest, SinkClient, Target};

/// Base delay for exponential backoff between recoverable-error retries.
const BASE_RETRY_DELAY_MS: u64 = 200;

/// Cap on the backoff delay, regardless of attempt number.
const MAX_RETRY_DELAY_MS: u64 = 10_000;

/// A deadline-based flush timer, armed only on an empty-to-non-empty buffer
/// transition. `tick()` builds a fresh sleep future each call rather than
/// holding a pinned one, which keeps re-arming a matter of replacing an
/// `Option<Instant>`.
struct FlushTimer {
    deadline: Option<Instant>,
    period: Duration,
}

impl FlushTimer {
    fn new(period: Duration) -> Self {
        Self {
            deadline: None,
            period,
        }
    }

    fn arm(&mut self) {
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.period);
        }
    }

    fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Resolves when the timer fires. Never resolves while disarmed.
    async fn tick(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

/// Owns one target's buffer and is the sole caller of its `SinkClient`.
struct Worker {
    target: Target,
    sink: Arc<dyn SinkClient>,
    ingress: Arc<Ingress>,
    buffer: BatchBuffer,
    converter: EventConverter,
    timer: FlushTimer,
    sequence_token: Option<String>,
    max_retries: u32,
    shutdown: tokio::sync::mpsc::Receiver<()>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.ingress.pop() => {
                    self.handle_event(event).await;
                }
                _ = self.timer.tick() => {
                    self.flush().await;
                }
                _ = self.shutdown.recv() => {
                    self.drain_ingress().await;
                    self.flush().await;
                    return;
                }
            }
        }
    }

    /// Pull any events still sitting in the ingress queue without waiting,
    /// converting and admitting them the same way the run loop would. Used
    /// on shutdown so a burst that arrived just before `stop()` isn't lost.
    async fn drain_ingress(&mut self) {
        while let Some(event) = self.ingress.try_pop() {
            self.handle_event(event).await;
        }
    }

    async fn handle_event(&mut self, event: LogEvent) {
        let wire = self.converter.convert(&event);

        if self.would_overflow(&wire) {
            self.flush().await;
        }

        // flush() can return with the buffer retained (recoverable-error
        // retries exhausted, or an invalid-sequence-token response with no
        // expected token offered). Appending now would carry this event in
        // the very batch that just failed to fit under REQ_EVENTS_LIMIT,
        // REQ_SIZE_LIMIT, or the 24h span cap, so it has to wait for a
        // later trigger instead.
        if self.would_overflow(&wire) {
            error!(
                group = %self.target.group,
                stream = %self.target.stream,
                "dropping event: batch limits still exceeded after pre-flush; buffer retained from an earlier failed flush"
            );
            return;
        }

        let was_empty = self.buffer.is_empty();
        self.buffer.append(wire, event.done);
        if was_empty {
            self.timer.arm();
        }
    }

    /// Would admitting `wire` into the current buffer push it over the
    /// request size/count limit or the 24-hour span cap?
    fn would_overflow(&self, wire: &WireEvent) -> bool {
        self.buffer.would_exceed_size(wire.message.len() + crate::constants::EVENT_HEADER_SIZE)
            || self.buffer.is_at_count_limit()
            || self.buffer.would_exceed_span(wire.timestamp)
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            self.timer.disarm();
            return;
        }

        if self.buffer.need_sort() {
            self.buffer.sort_by_timestamp();
        }

        let mut attempt: u32 = 0;
        loop {
            let req = PutLogEventsRequest {
                group: self.target.group.clone(),
                stream: self.target.stream.clone(),
                events: self.buffer.events().to_vec(),
                sequence_token: self.sequence_token.clone(),
            };
            let event_count = req.events.len();

            match self.sink.put_log_events(req).await {
                Ok(resp) => {
                    self.sequence_token = resp.next_sequence_token;
                    if let Some(rejected) = resp.rejected_info.filter(|r| !r.is_empty()) {
                        warn!(
                            group = %self.target.group,
                            stream = %self.target.stream,
                            approx_rejected = rejected.approximate_count(event_count),
                            "sink rejected a sub-range of the batch"
                        );
                    }
                    for cb in self.buffer.take_callbacks() {
                        cb.invoke();
                    }
                    self.buffer.clear();
                    self.timer.disarm();
                    return;
                }
                Err(SinkError::ResourceNotFound) => {
                    if attempt >= self.max_retries {
                        self.give_up("resource not found, retries exhausted").await;
                        return;
                    }
                    if let Err(e) = self.sink.create_log_group(&self.target.group).await {
                        if !matches!(e, SinkError::ResourceAlreadyExists) {
                            error!(error = %e, group = %self.target.group, "failed to create log group");
                        }
                    }
                    if let Err(e) = self
                        .sink
                        .create_log_stream(&self.target.group, &self.target.stream)
                        .await
                    {
                        if !matches!(e, SinkError::ResourceAlreadyExists) {
                            error!(error = %e, stream = %self.target.stream, "failed to create log stream");
                            self.timer.arm();
                            return;
                        }
                    }
                    self.backoff(attempt).await;
                    attempt += 1;
                    self.timer.arm();
                }
                Err(SinkError::InvalidSequenceToken { expected: Some(tok) }) => {
                    if attempt >= self.max_retries {
                        self.give_up("invalid sequence token, retries exhausted").await;
                        return;
                    }
                    self.sequence_token = Some(tok);
                    self.backoff(attempt).await;
                    attempt += 1;
                    self.timer.arm();
                }
                Err(e @ SinkError::InvalidSequenceToken { expected: None }) => {
                    error!(
                        group = %self.target.group,
                        stream = %self.target.stream,
                        error = %e,
                        "invalid sequence token with no expected token offered; buffer retained"
                    );
                    self.timer.arm();
                    return;
                }
                Err(e) => {
                    error!(
                        group = %self.target.group,
                        stream = %self.target.stream,
                        error = %e,
                        "non-recoverable sink error, dropping batch"
                    );
                    self.buffer.drop_callbacks();
                    self.buffer.clear();
                    self.timer.disarm();
                    return;
                }
            }
        }
    }

    async fn give_up(&mut self, reason: &str) {
        error!(
            group = %self.target.group,
            stream = %self.target.stream,
            reason,
            "exhausted retries for this flush; buffer retained for the next trigger"
        );
        self.timer.arm();
    }

    async fn backoff(&self, attempt: u32) {
        let exp = BASE_RETRY_DELAY_MS.saturating_mul(1u64 << attempt.min(10));
        let jitter = rand::thread_rng().gen_range(0..=(exp / 4 + 1));
        let delay = exp.saturating_add(jitter).min(MAX_RETRY_DELAY_MS);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

/// Handle producers use to submit events for a target and to stop that
/// target's worker.
pub struct Pusher {
    target: Target,
    ingress: Arc<Ingress>,
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
    shutdown_timeout: Duration,
}

impl Pusher {
    /// Spawn a worker for `target`, forwarding batches to `sink`.
    pub fn spawn(target: Target, sink: Arc<dyn SinkClient>, config: &Config) -> Self {
        let ingress = Arc::new(Ingress::new(config.ingress_capacity));
        let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel(1);

        let worker = Worker {
            target: target.clone(),
            sink,
            ingress: ingress.clone(),
            buffer: BatchBuffer::new(config.ingress_capacity),
            converter: EventConverter::new(),
            timer: FlushTimer::new(config.flush_interval),
            sequence_token: None,
            max_retries: config.max_retries,
            shutdown: shutdown_rx,
        };

        let handle = tokio::spawn(worker.run());

        Self {
            target,
            ingress,
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Submit an event, waiting for ingress capacity if the queue is full.
    /// Events outside the admission window are rejected and logged, never
    /// reaching the worker.
    pub async fn add_event(&self, event: LogEvent) {
        if !has_valid_time(event.time) {
            log_rejected(&self.target.group, &self.target.stream, &event);
            return;
        }
        self.ingress.push_blocking(event).await;
    }

    /// Submit an event without blocking, evicting the oldest not-yet-dispatched
    /// event if the queue is full. Events outside the admission window are
    /// rejected the same way as `add_event`.
    pub fn add_event_non_blocking(&self, event: LogEvent) {
        if !has_valid_time(event.time) {
            log_rejected(&self.target.group, &self.target.stream, &event);
            return;
        }
        self.ingress.push_evicting(event);
    }

    /// Signal the worker to drain its ingress queue, flush what remains, and
    /// exit, waiting up to the configured shutdown timeout.
    ///
    /// Returns `Err(PushError::ShutdownTimeout)` if the drain did not finish
    /// in time; the worker task is left running rather than aborted, since
    /// aborting mid-flush could leave a sink call half-completed.
    pub async fn stop(&self) -> Result<(), PushError> {
        let _ = self.shutdown_tx.send(()).await;
        let handle = self.handle.lock().await.take();
        let Some(handle) = handle else {
            return Ok(());
        };
        match tokio::time::timeout(self.shutdown_timeout, handle).await {
            Ok(Ok(())) => {
                info!(group = %self.target.group, stream = %self.target.stream, "pusher stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "pusher worker task panicked during shutdown");
                Ok(())
            }
            Err(_) => {
                warn!(
                    group = %self.target.group,
                    stream = %self.target.stream,
                    timeout_ms = self.shutdown_timeout.as_millis(),
                    "shutdown drain timed out"
                );
                Err(PushError::ShutdownTimeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::mock::MockSinkClient;
    use crate::sink::PutLogEventsResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config() -> Config {
        Config {
            flush_interval: Duration::from_millis(50),
            max_retries: 3,
            ingress_capacity: 16,
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_flush_fires_after_interval() {
        let sink = Arc::new(MockSinkClient::new());
        let pusher = Pusher::spawn(Target::new("g", "s"), sink.clone(), &test_config());

        pusher.add_event(LogEvent::new("hello")).await;
        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;

        pusher.stop().await;
        assert_eq!(sink.puts().len(), 1);
        assert_eq!(sink.puts()[0].event_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn count_limit_triggers_immediate_flush() {
        let sink = Arc::new(MockSinkClient::new());
        let config = Config {
            flush_interval: Duration::from_secs(300),
            ..test_config()
        };
        let pusher = Pusher::spawn(Target::new("g", "s"), sink.clone(), &config);

        for i in 0..crate::constants::REQ_EVENTS_LIMIT {
            pusher
                .add_event(LogEvent::new(format!("msg-{i}")))
                .await;
        }
        tokio::task::yield_now().await;

        pusher.stop().await;
        let puts = sink.puts();
        assert!(!puts.is_empty());
        assert_eq!(puts[0].event_count, crate::constants::REQ_EVENTS_LIMIT);
    }

    #[tokio::test(start_paused = true)]
    async fn resource_not_found_creates_resources_then_retries() {
        let sink = Arc::new(MockSinkClient::new());
        sink.push_put_result(Err(SinkError::ResourceNotFound));
        sink.push_put_result(Ok(PutLogEventsResponse {
            next_sequence_token: Some("tok-1".to_string()),
            rejected_info: None,
        }));

        let pusher = Pusher::spawn(Target::new("g", "s"), sink.clone(), &test_config());
        pusher.add_event(LogEvent::new("hi")).await;
        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;

        pusher.stop().await;
        assert_eq!(sink.created_groups(), vec!["g".to_string()]);
        assert_eq!(sink.created_streams(), vec![("g".to_string(), "s".to_string())]);
        assert_eq!(sink.puts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_sequence_token_adopts_expected_and_retries() {
        let sink = Arc::new(MockSinkClient::new());
        sink.push_put_result(Err(SinkError::InvalidSequenceToken {
            expected: Some("expected-tok".to_string()),
        }));
        sink.push_put_result(Ok(PutLogEventsResponse {
            next_sequence_token: Some("tok-2".to_string()),
            rejected_info: None,
        }));

        let pusher = Pusher::spawn(Target::new("g", "s"), sink.clone(), &test_config());
        pusher.add_event(LogEvent::new("hi")).await;
        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;

        pusher.stop().await;
        let puts = sink.puts();
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[1].sequence_token, Some("expected-tok".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn non_recoverable_error_drops_batch_without_firing_callbacks() {
        let sink = Arc::new(MockSinkClient::new());
        sink.push_put_result(Err(SinkError::Other("boom".to_string())));

        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let pusher = Pusher::spawn(Target::new("g", "s"), sink.clone(), &test_config());
        pusher
            .add_event(LogEvent::new("hi").with_callback(move || {
                f.fetch_add(1, Ordering::SeqCst);
            }))
            .await;
        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;

        pusher.stop().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn non_blocking_submission_evicts_oldest_pending_event() {
        let sink = Arc::new(MockSinkClient::new());
        let config = Config {
            flush_interval: Duration::from_secs(300),
            ingress_capacity: 2,
            ..test_config()
        };
        let pusher = Pusher::spawn(Target::new("g", "s"), sink.clone(), &config);

        // Fill the worker's select! loop artificially by pushing faster than
        // it can drain: use the queue directly via three rapid non-blocking
        // submissions before yielding control to the worker task.
        pusher.add_event_non_blocking(LogEvent::new("a"));
        pusher.add_event_non_blocking(LogEvent::new("b"));
        pusher.add_event_non_blocking(LogEvent::new("c"));
        tokio::task::yield_now().await;

        pusher.stop().await;
        // With capacity 2 and no flush trigger, at most the last two
        // submitted events should ever have been observable in the queue;
        // exactly how many the worker drained before eviction occurred is
        // timing dependent, so we only assert no panic and a sane upper bound.
        let total: usize = sink.puts().iter().map(|p| p.event_count).sum();
        assert!(total <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drains_pending_events() {
        let sink = Arc::new(MockSinkClient::new());
        let config = Config {
            flush_interval: Duration::from_secs(300),
            ..test_config()
        };
        let pusher = Pusher::spawn(Target::new("g", "s"), sink.clone(), &config);

        pusher.add_event(LogEvent::new("a")).await;
        pusher.add_event(LogEvent::new("b")).await;
        pusher.stop().await;

        let total: usize = sink.puts().iter().map(|p| p.event_count).sum();
        assert_eq!(total, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn size_limit_flushes_before_appending_the_overflowing_event() {
        let sink = Arc::new(MockSinkClient::new());
        let config = Config {
            flush_interval: Duration::from_secs(300),
            ..test_config()
        };
        let pusher = Pusher::spawn(Target::new("g", "s"), sink.clone(), &config);

        // Each message is 500_000 bytes; two fit under REQ_SIZE_LIMIT, a
        // third would not, so it must trigger a flush of the first two
        // before being buffered itself.
        let big = "x".repeat(500_000);
        pusher.add_event(LogEvent::new(big.clone())).await;
        pusher.add_event(LogEvent::new(big.clone())).await;
        pusher.add_event(LogEvent::new(big)).await;
        tokio::task::yield_now().await;

        pusher.stop().await;
        let puts = sink.puts();
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0].event_count, 2);
        assert_eq!(puts[1].event_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn span_exceeding_24h_flushes_before_appending_the_new_event() {
        use std::time::{Duration as StdDuration, SystemTime};

        let sink = Arc::new(MockSinkClient::new());
        let config = Config {
            flush_interval: Duration::from_secs(300),
            ..test_config()
        };
        let pusher = Pusher::spawn(Target::new("g", "s"), sink.clone(), &config);

        // Both timestamps sit within the admission window; only their
        // mutual 25h gap matters for this test.
        let t0 = SystemTime::now() - StdDuration::from_secs(10 * 24 * 3600);
        let t1 = t0 + StdDuration::from_secs(25 * 3600);

        pusher.add_event(LogEvent::new("first").with_time(t0)).await;
        pusher.add_event(LogEvent::new("second").with_time(t1)).await;
        tokio::task::yield_now().await;

        pusher.stop().await;
        let puts = sink.puts();
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0].event_count, 1);
        assert_eq!(puts[1].event_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_retry_ceiling_gives_up_and_retains_buffer() {
        let sink = Arc::new(MockSinkClient::new());
        sink.always_fail_put(SinkError::InvalidSequenceToken {
            expected: Some("still-wrong".to_string()),
        });

        let config = Config {
            flush_interval: Duration::from_millis(50),
            max_retries: 3,
            ..test_config()
        };
        let pusher = Pusher::spawn(Target::new("g", "s"), sink.clone(), &config);

        pusher.add_event(LogEvent::new("hi")).await;
        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        // Let every retry's backoff elapse.
        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(30)).await;
            tokio::task::yield_now().await;
        }

        // Exactly max_retries + 1 attempts for this flush cycle, then the
        // worker gives up without crashing or looping forever.
        assert_eq!(sink.puts().len(), config.max_retries as usize + 1);

        pusher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_event_is_dropped_when_pre_flush_leaves_buffer_retained() {
        let sink = Arc::new(MockSinkClient::new());
        sink.always_fail_put(SinkError::InvalidSequenceToken { expected: None });

        let config = Config {
            flush_interval: Duration::from_secs(300),
            ..test_config()
        };
        let pusher = Pusher::spawn(Target::new("g", "s"), sink.clone(), &config);

        // Two events fill the buffer just under REQ_SIZE_LIMIT; the sink
        // never accepts a flush, so the third event's pre-flush leaves the
        // buffer retained with the first two still in it.
        let big = "x".repeat(500_000);
        pusher.add_event(LogEvent::new(big.clone())).await;
        pusher.add_event(LogEvent::new(big.clone())).await;

        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        pusher
            .add_event(LogEvent::new(big).with_callback(move || {
                f.fetch_add(1, Ordering::SeqCst);
            }))
            .await;
        tokio::task::yield_now().await;

        pusher.stop().await;

        // Every attempted PutLogEvents call, including the shutdown-drain
        // flush, must stay at or under the pre-overflow count; the third
        // event is dropped rather than ever riding along in a batch that
        // would violate the size limit.
        for put in sink.puts() {
            assert!(put.event_count <= 2);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_creation_failure_returns_without_retrying_put() {
        let sink = Arc::new(MockSinkClient::new());
        sink.push_put_result(Err(SinkError::ResourceNotFound));
        sink.push_create_stream_result(Err(SinkError::Other("stream create failed".to_string())));

        let config = Config {
            flush_interval: Duration::from_secs(300),
            ..test_config()
        };
        let pusher = Pusher::spawn(Target::new("g", "s"), sink.clone(), &config);

        pusher.add_event(LogEvent::new("hi")).await;
        pusher.stop().await;

        // The failed create_log_stream must stop the retry loop right
        // away instead of falling through to another put_log_events call.
        assert_eq!(sink.puts().len(), 1);
        assert_eq!(sink.created_groups().len(), 1);
        assert_eq!(sink.created_streams().len(), 1);
    }
}
