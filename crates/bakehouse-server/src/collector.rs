//! In-memory store of collected activity events.

use bakehouse_activity_types::ActivityEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;

struct LogInner {
    events: VecDeque<ActivityEvent>,
    total: u64,
}

/// Bounded log of the most recently collected events.
///
/// Once `capacity` events are held, each new event drops the oldest one.
pub struct ActivityLog {
    capacity: usize,
    inner: Mutex<LogInner>,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(LogInner {
                events: VecDeque::with_capacity(capacity.min(1024)),
                total: 0,
            }),
        }
    }

    /// Append events in arrival order.
    pub fn record(&self, events: impl IntoIterator<Item = ActivityEvent>) {
        let mut inner = self.inner.lock();
        for event in events {
            if inner.events.len() == self.capacity {
                inner.events.pop_front();
            }
            inner.events.push_back(event);
            inner.total += 1;
        }
    }

    /// Up to `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ActivityEvent> {
        self.inner
            .lock()
            .events
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events collected since start, including dropped ones.
    pub fn total(&self) -> u64 {
        self.inner.lock().total
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
