//! Accumulates pending wire events and their completion callbacks, tracking
//! enough state to answer the dispatcher's batching-policy questions without
//! it having to walk the buffer itself.

use crate::constants::{EVENT_HEADER_SIZE, MAX_BATCH_SPAN_MS, REQ_EVENTS_LIMIT, REQ_SIZE_LIMIT};
use crate::event::{Callback, WireEvent};

/// Shrink the backing `Vec`s once their capacity outgrows the configured
/// batch size by this factor. Rust's allocator has no "release to OS" hint
/// the way some GC runtimes expose; re-sizing the buffer after a burst is
/// the idiomatic analogue.
const SHRINK_FACTOR: usize = 4;

pub struct BatchBuffer {
    events: Vec<WireEvent>,
    callbacks: Vec<Callback>,
    buffered_bytes: usize,
    min_t: Option<i64>,
    max_t: Option<i64>,
    need_sort: bool,
    batch_size_hint: usize,
}

impl BatchBuffer {
    pub fn new(batch_size_hint: usize) -> Self {
        Self {
            events: Vec::with_capacity(batch_size_hint),
            callbacks: Vec::with_capacity(batch_size_hint),
            buffered_bytes: 0,
            min_t: None,
            max_t: None,
            need_sort: false,
            batch_size_hint,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    pub fn min_t(&self) -> Option<i64> {
        self.min_t
    }

    pub fn max_t(&self) -> Option<i64> {
        self.max_t
    }

    pub fn need_sort(&self) -> bool {
        self.need_sort
    }

    pub fn events(&self) -> &[WireEvent] {
        &self.events
    }

    /// Would appending `additional` bytes push the buffer over the request
    /// size limit?
    pub fn would_exceed_size(&self, additional: usize) -> bool {
        self.buffered_bytes + additional > REQ_SIZE_LIMIT
    }

    /// Has the buffer already reached the per-request event count limit?
    pub fn is_at_count_limit(&self) -> bool {
        self.events.len() >= REQ_EVENTS_LIMIT
    }

    /// Would admitting an event timestamped `ts` widen the batch's time span
    /// beyond the 24-hour cap? Always `false` while the buffer is empty.
    pub fn would_exceed_span(&self, ts: i64) -> bool {
        match (self.min_t, self.max_t) {
            (Some(min), Some(max)) => ts - min > MAX_BATCH_SPAN_MS || max - ts > MAX_BATCH_SPAN_MS,
            _ => false,
        }
    }

    /// Append an event and its callback. Flags the buffer for a pre-send
    /// sort if this breaks non-decreasing timestamp order.
    pub fn append(&mut self, event: WireEvent, callback: Callback) {
        if let Some(last) = self.events.last() {
            if event.timestamp < last.timestamp {
                self.need_sort = true;
            }
        }
        self.min_t = Some(self.min_t.map_or(event.timestamp, |m| m.min(event.timestamp)));
        self.max_t = Some(self.max_t.map_or(event.timestamp, |m| m.max(event.timestamp)));
        self.buffered_bytes += event.message.len() + EVENT_HEADER_SIZE;
        self.events.push(event);
        self.callbacks.push(callback);
    }

    /// Stably sort events by timestamp, carrying each event's callback along
    /// with it so that "callback K fires for event K" still holds after the
    /// sort (see DESIGN.md on the resolved callback-pairing question).
    pub fn sort_by_timestamp(&mut self) {
        let mut paired: Vec<(WireEvent, Callback)> =
            self.events.drain(..).zip(self.callbacks.drain(..)).collect();
        paired.sort_by_key(|(e, _)| e.timestamp);
        for (event, callback) in paired {
            self.events.push(event);
            self.callbacks.push(callback);
        }
        self.need_sort = false;
    }

    /// Take ownership of the callbacks in wire order, leaving the buffer's
    /// callback list empty. Used on a successful or partially-rejected flush.
    pub fn take_callbacks(&mut self) -> Vec<Callback> {
        std::mem::take(&mut self.callbacks)
    }

    /// Drop all callbacks without invoking them. Used when a non-recoverable
    /// sink error means the batch's producers will observe no completion.
    pub fn drop_callbacks(&mut self) {
        self.callbacks.clear();
    }

    /// Reset to empty, retaining backing capacity unless it has grown far
    /// beyond what this buffer typically holds.
    pub fn clear(&mut self) {
        self.events.clear();
        self.callbacks.clear();
        if self.events.capacity() > self.batch_size_hint * SHRINK_FACTOR {
            self.events.shrink_to(self.batch_size_hint);
        }
        if self.callbacks.capacity() > self.batch_size_hint * SHRINK_FACTOR {
            self.callbacks.shrink_to(self.batch_size_hint);
        }
        self.buffered_bytes = 0;
        self.min_t = None;
        self.max_t = None;
        self.need_sort = false;
    }
}
