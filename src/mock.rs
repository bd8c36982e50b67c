//! An in-memory [`SinkClient`] used by the test suite and the demo harness.
//! Records every call it receives so tests can assert on what a pusher sent,
//! and lets a test script the error a given call should return.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::sink::{PutLogEventsRequest, PutLogEventsResponse, SinkClient};

#[derive(Debug, Clone)]
pub struct RecordedPut {
    pub group: String,
    pub stream: String,
    pub event_count: usize,
    pub sequence_token: Option<String>,
}

#[derive(Default)]
struct State {
    puts: Vec<RecordedPut>,
    created_groups: Vec<String>,
    created_streams: Vec<(String, String)>,
    put_script: VecDeque<Result<PutLogEventsResponse, SinkError>>,
    create_group_script: VecDeque<Result<(), SinkError>>,
    create_stream_script: VecDeque<Result<(), SinkError>>,
    /// Overrides the default success behavior for every call beyond the
    /// scripted queue, instead of falling back to success. Used to simulate
    /// a sink that never recovers, to exercise a bounded retry ceiling.
    always_fail_put: Option<SinkError>,
}

/// A `SinkClient` double. With no scripted responses queued, `put_log_events`
/// succeeds and hands back a monotonically incrementing sequence token;
/// `create_log_group`/`create_log_stream` always succeed.
pub struct MockSinkClient {
    state: Mutex<State>,
}

impl Default for MockSinkClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSinkClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Queue the result of the next `put_log_events` call. Calls beyond the
    /// queued set fall back to the default success behavior.
    pub fn push_put_result(&self, result: Result<PutLogEventsResponse, SinkError>) {
        self.state.lock().unwrap().put_script.push_back(result);
    }

    pub fn push_create_group_result(&self, result: Result<(), SinkError>) {
        self.state.lock().unwrap().create_group_script.push_back(result);
    }

    pub fn push_create_stream_result(&self, result: Result<(), SinkError>) {
        self.state.lock().unwrap().create_stream_script.push_back(result);
    }

    /// Make every `put_log_events` call beyond the scripted queue fail with
    /// `error`, instead of defaulting to success.
    pub fn always_fail_put(&self, error: SinkError) {
        self.state.lock().unwrap().always_fail_put = Some(error);
    }

    pub fn puts(&self) -> Vec<RecordedPut> {
        self.state.lock().unwrap().puts.clone()
    }

    pub fn created_groups(&self) -> Vec<String> {
        self.state.lock().unwrap().created_groups.clone()
    }

    pub fn created_streams(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().created_streams.clone()
    }
}

#[async_trait]
impl SinkClient for MockSinkClient {
    async fn put_log_events(
        &self,
        req: PutLogEventsRequest,
    ) -> Result<PutLogEventsResponse, SinkError> {
        let mut state = self.state.lock().unwrap();
        let next_token = format!("token-{}", state.puts.len() + 1);
        state.puts.push(RecordedPut {
            group: req.group,
            stream: req.stream,
            event_count: req.events.len(),
            sequence_token: req.sequence_token,
        });
        if let Some(scripted) = state.put_script.pop_front() {
            return scripted;
        }
        match &state.always_fail_put {
            Some(error) => Err(error.clone()),
            None => Ok(PutLogEventsResponse {
                next_sequence_token: Some(next_token),
                rejected_info: None,
            }),
        }
    }

    async fn create_log_group(&self, group: &str) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        state.created_groups.push(group.to_string());
        state.create_group_script.pop_front().unwrap_or(Ok(()))
    }

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        state
            .created_streams
            .push((group.to_string(), stream.to_string()));
        state.create_stream_script.pop_front().unwrap_or(Ok(()))
    }
}
