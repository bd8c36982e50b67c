//! The bounded queue standing between producer tasks and the worker loop
//! that owns a target's buffer.
//!
//! Plain `tokio::sync::mpsc` can't express the non-blocking submission
//! policy's "evict the oldest pending item" behavior, since a receiver can't
//! pop from the front of an `mpsc` channel's internal queue out of band. A
//! `Mutex`-guarded `VecDeque` plus a pair of `Notify`s gets both submission
//! modes from the same backing queue.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::event::LogEvent;

pub struct Ingress {
    queue: Mutex<VecDeque<LogEvent>>,
    capacity: usize,
    item_ready: Notify,
    space_ready: Notify,
}

impl Ingress {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            item_ready: Notify::new(),
            space_ready: Notify::new(),
        }
    }

    /// Push `event`, waiting for free capacity if the queue is full.
    ///
    /// `Notify::notified()` only buffers a single permit, but since this is
    /// the only blocking producer path and `pop` calls `space_ready.notify_one()`
    /// on every successful dequeue, a waiter that misses one notification
    /// will simply loop back around and find space already free.
    pub async fn push_blocking(&self, event: LogEvent) {
        let mut event = Some(event);
        loop {
            {
                let mut queue = self.queue.lock().unwrap();
                if queue.len() < self.capacity {
                    queue.push_back(event.take().unwrap());
                    drop(queue);
                    self.item_ready.notify_one();
                    return;
                }
            }
            self.space_ready.notified().await;
        }
    }

    /// Push `event`, evicting the oldest not-yet-dispatched event if the
    /// queue is at capacity. The evicted event's callback is never invoked;
    /// eviction is silent data loss by design, not a completion signal.
    pub fn push_evicting(&self, event: LogEvent) {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(event);
        drop(queue);
        self.item_ready.notify_one();
    }

    /// Pop the oldest event, waiting until one is available.
    pub async fn pop(&self) -> LogEvent {
        loop {
            {
                let mut queue = self.queue.lock().unwrap();
                if let Some(event) = queue.pop_front() {
                    drop(queue);
                    self.space_ready.notify_one();
                    return event;
                }
            }
            self.item_ready.notified().await;
        }
    }

    /// Pop the oldest event if one is immediately available, without waiting.
    pub fn try_pop(&self) -> Option<LogEvent> {
        let mut queue = self.queue.lock().unwrap();
        let event = queue.pop_front();
        if event.is_some() {
            drop(queue);
            self.space_ready.notify_one();
        }
        event
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
