//! Shared sliding-window admission state.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

/// Window used by [`RateWindow::check_default`].
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Accepted attempts per key used by [`RateWindow::check_default`].
pub const DEFAULT_MAX_REQUESTS: u32 = 5;

/// Outcome of one admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the attempt was accepted and recorded.
    pub allowed: bool,
    /// Configured maximum for the window.
    pub limit: u32,
    /// Attempts still available to the key after this decision.
    pub remaining: u32,
    /// Time until the oldest recorded attempt of the key leaves the window.
    pub retry_after: Duration,
}

impl RateDecision {
    /// Whole seconds until a retry can succeed, rounded up and at least one.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs() + u64::from(self.retry_after.subsec_nanos() > 0);
        secs.max(1)
    }
}

#[derive(Default)]
struct Rows {
    // (key, sequence) -> instant of one accepted attempt
    attempts: BTreeMap<(String, u64), Instant>,
    next_seq: u64,
}

/// Sliding-window rate limiter keyed by arbitrary strings.
///
/// Each accepted attempt is stored as its own row. A check purges every row
/// older than the window (for all keys), counts the rows of the exact key,
/// and records a new row only when the count is below the limit. The whole
/// sequence runs under one lock, so concurrent callers on the same key
/// cannot both slip past the limit.
#[derive(Default)]
pub struct RateWindow {
    rows: Mutex<Rows>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and records the attempt if `key` has fewer than
    /// `max_requests` accepted attempts within the trailing `window`.
    pub fn check(&self, key: &str, window: Duration, max_requests: u32) -> bool {
        self.decide(key, window, max_requests).allowed
    }

    /// [`check`](Self::check) with a 60 second window and 5 attempts.
    pub fn check_default(&self, key: &str) -> bool {
        self.check(key, DEFAULT_WINDOW, DEFAULT_MAX_REQUESTS)
    }

    /// Same as [`check`](Self::check), also reporting header values.
    pub fn decide(&self, key: &str, window: Duration, max_requests: u32) -> RateDecision {
        let now = Instant::now();
        let mut rows = self.rows.lock();

        rows.attempts
            .retain(|_, at| now.saturating_duration_since(*at) < window);

        let (count, oldest) = rows
            .attempts
            .range((key.to_string(), 0)..=(key.to_string(), u64::MAX))
            .fold((0u32, None::<Instant>), |(count, oldest), (_, at)| {
                let oldest = Some(oldest.map_or(*at, |o| o.min(*at)));
                (count.saturating_add(1), oldest)
            });

        let allowed = count < max_requests;
        let oldest = if allowed {
            let seq = rows.next_seq;
            rows.next_seq += 1;
            rows.attempts.insert((key.to_string(), seq), now);
            Some(oldest.unwrap_or(now))
        } else {
            oldest
        };

        let used = if allowed { count + 1 } else { count };
        let retry_after = oldest
            .map(|at| window.saturating_sub(now.saturating_duration_since(at)))
            .unwrap_or(Duration::ZERO);

        RateDecision {
            allowed,
            limit: max_requests,
            remaining: max_requests.saturating_sub(used),
            retry_after,
        }
    }

    /// Number of stored rows across all keys.
    pub fn len(&self) -> usize {
        self.rows.lock().attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
