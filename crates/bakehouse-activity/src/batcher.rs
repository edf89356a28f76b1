//! Batched activity collection and delivery.

use crate::config::BatcherConfig;
use crate::context::PageContext;
use crate::error::ActivityError;
use crate::transport::{ActivityTransport, HttpTransport};
use bakehouse_activity_types::{sanitize_details, ActivityAction, ActivityEvent, Details};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Result of a flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued.
    Idle,
    /// The batch was accepted by the transport.
    Delivered(usize),
    /// Delivery failed; the batch is back at the head of the queue.
    Requeued(usize),
}

/// Handle to the activity pipeline.
///
/// Cloning is cheap and every clone feeds the same queue. The periodic timer
/// and teardown hook stop once the last clone is dropped.
#[derive(Clone)]
pub struct ActivityBatcher {
    inner: Arc<Inner>,
}

struct Inner {
    batch_size: usize,
    flush_interval: Duration,
    enabled: AtomicBool,
    queue: Mutex<VecDeque<ActivityEvent>>,
    page: Mutex<PageContext>,
    transport: Arc<dyn ActivityTransport>,
    hooks: Mutex<Hooks>,
}

#[derive(Default)]
struct Hooks {
    timer: Option<JoinHandle<()>>,
    teardown: Option<JoinHandle<()>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let hooks = self.hooks.get_mut();
        for task in [hooks.timer.take(), hooks.teardown.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

impl ActivityBatcher {
    /// Create a batcher delivering through `transport`.
    pub fn new(config: BatcherConfig, transport: Arc<dyn ActivityTransport>) -> Result<Self, ActivityError> {
        config.validate()?;

        let page = PageContext {
            user_agent: Some(config.http.user_agent.clone()),
            ..PageContext::default()
        };

        Ok(Self {
            inner: Arc::new(Inner {
                batch_size: config.batch_size,
                flush_interval: config.flush_interval,
                enabled: AtomicBool::new(config.enabled),
                queue: Mutex::new(VecDeque::new()),
                page: Mutex::new(page),
                transport,
                hooks: Mutex::new(Hooks::default()),
            }),
        })
    }

    /// Create a batcher with an HTTP transport built from `config`.
    ///
    /// The transport is returned as well so the caller can drain teardown
    /// beacons before the runtime shuts down.
    pub fn connect(config: BatcherConfig) -> Result<(Self, Arc<HttpTransport>), ActivityError> {
        let transport = Arc::new(HttpTransport::from_config(&config)?);
        let batcher = Self::new(config, transport.clone())?;
        Ok((batcher, transport))
    }

    /// Enable or disable tracking. Already queued events are kept.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
        debug!(enabled, "Activity tracking toggled");
    }

    /// Whether tracking is enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Number of events waiting for delivery.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Replace the page context.
    pub fn set_page_context(&self, context: PageContext) {
        *self.inner.page.lock() = context;
    }

    /// Current page context.
    pub fn page_context(&self) -> PageContext {
        self.inner.page.lock().clone()
    }

    pub(crate) fn update_page_context(&self, update: impl FnOnce(&mut PageContext)) {
        update(&mut self.inner.page.lock());
    }

    /// Record an event (non-blocking).
    ///
    /// Critical actions and a full batch schedule a flush on the current
    /// runtime. Outside a runtime the events simply stay queued.
    pub fn track(
        &self,
        action: impl Into<ActivityAction>,
        resource: impl Into<String>,
        resource_id: Option<String>,
        details: Option<Details>,
    ) {
        if !self.is_enabled() {
            return;
        }

        let mut event = ActivityEvent::new(action, resource);
        event.resource_id = resource_id;
        event.details = details.map(sanitize_details);
        let critical = event.action.is_critical();

        let queued = {
            let mut queue = self.inner.queue.lock();
            queue.push_back(event);
            queue.len()
        };

        if critical || queued >= self.inner.batch_size {
            self.schedule_flush();
        }
    }

    /// Record a page view with the current page context.
    pub fn track_page_view(&self, page: impl Into<String>) {
        let details = self.inner.page.lock().to_details();
        self.track(ActivityAction::View, page, None, Some(details));
    }

    /// Record a form submission. Sensitive fields are redacted.
    pub fn track_form_submission(&self, form: impl Into<String>, form_data: Option<Details>) {
        self.track(ActivityAction::Submit, form, None, form_data);
    }

    /// Record a button click.
    pub fn track_button_click(&self, button: impl Into<String>, context: Option<Details>) {
        self.track(ActivityAction::Click, button, None, context);
    }

    /// Record a data operation such as CREATE or DELETE on a resource.
    pub fn track_data_operation(
        &self,
        operation: impl Into<ActivityAction>,
        resource: impl Into<String>,
        resource_id: Option<String>,
    ) {
        self.track(operation, resource, resource_id, None);
    }

    /// Record an error with its source chain.
    pub fn track_error(&self, error: &(dyn std::error::Error + 'static), context: Option<Details>) {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(Value::String(cause.to_string()));
            source = cause.source();
        }

        let mut details = Details::new();
        details.insert("message".to_string(), Value::String(error.to_string()));
        details.insert("causes".to_string(), Value::Array(causes));
        if let Some(context) = context {
            details.insert("context".to_string(), Value::Object(sanitize_details(context)));
        }
        if let Some(url) = self.inner.page.lock().url.clone() {
            details.insert("url".to_string(), Value::String(url));
        }

        self.track(ActivityAction::Error, "application", None, Some(details));
    }

    fn schedule_flush(&self) {
        match Handle::try_current() {
            Ok(handle) => {
                let batcher = self.clone();
                handle.spawn(async move {
                    batcher.flush().await;
                });
            }
            Err(_) => debug!("No runtime for activity flush, keeping events queued"),
        }
    }

    /// Deliver everything queued as one batch.
    ///
    /// The queue is swapped out before sending, so concurrent flushes never
    /// send the same event twice. A failed batch is put back ahead of events
    /// queued while it was in flight.
    pub async fn flush(&self) -> FlushOutcome {
        let batch: Vec<ActivityEvent> = std::mem::take(&mut *self.inner.queue.lock()).into();
        if batch.is_empty() {
            return FlushOutcome::Idle;
        }

        let count = batch.len();
        match self.inner.transport.deliver(&batch).await {
            Ok(()) => {
                debug!(count, "Activity batch delivered");
                FlushOutcome::Delivered(count)
            }
            Err(e) => {
                warn!(error = %e, count, "Activity delivery failed, re-queueing batch");
                self.requeue(batch);
                FlushOutcome::Requeued(count)
            }
        }
    }

    fn requeue(&self, batch: Vec<ActivityEvent>) {
        let mut queue = self.inner.queue.lock();
        let newer = std::mem::take(&mut *queue);
        let mut restored = VecDeque::from(batch);
        restored.extend(newer);
        *queue = restored;
    }

    /// Start the periodic flush timer, replacing any running one.
    pub fn start(&self) -> Result<(), ActivityError> {
        let handle = Handle::try_current().map_err(|_| ActivityError::NoRuntime)?;
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.flush_interval;

        let timer = handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                ActivityBatcher { inner }.flush().await;
            }
        });

        if let Some(previous) = self.inner.hooks.lock().timer.replace(timer) {
            previous.abort();
        }
        debug!(interval_ms = period.as_millis() as u64, "Activity flush timer started");
        Ok(())
    }

    /// Stop the periodic flush timer.
    pub fn stop(&self) {
        if let Some(timer) = self.inner.hooks.lock().timer.take() {
            timer.abort();
        }
    }

    /// Whether the periodic flush timer is running.
    pub fn is_running(&self) -> bool {
        self.inner
            .hooks
            .lock()
            .timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Final delivery before the process or page goes away.
    ///
    /// Stops the timer and hands the whole queue to the transport's
    /// fire-and-forget path. If even that refuses the batch, the events stay
    /// queued.
    pub fn teardown(&self) -> FlushOutcome {
        self.stop();

        let batch: Vec<ActivityEvent> = std::mem::take(&mut *self.inner.queue.lock()).into();
        if batch.is_empty() {
            return FlushOutcome::Idle;
        }

        let count = batch.len();
        match self.inner.transport.beacon(&batch) {
            Ok(()) => {
                debug!(count, "Activity batch handed off on teardown");
                FlushOutcome::Delivered(count)
            }
            Err(e) => {
                warn!(error = %e, count, "Activity teardown delivery refused");
                self.requeue(batch);
                FlushOutcome::Requeued(count)
            }
        }
    }

    /// Run [`teardown`](Self::teardown) once `signal` resolves.
    ///
    /// Installing a new hook replaces the previous one.
    pub fn flush_on<F>(&self, signal: F) -> Result<(), ActivityError>
    where
        F: Future + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|_| ActivityError::NoRuntime)?;
        let weak = Arc::downgrade(&self.inner);

        let hook = handle.spawn(async move {
            signal.await;
            if let Some(inner) = weak.upgrade() {
                ActivityBatcher { inner }.teardown();
            }
        });

        if let Some(previous) = self.inner.hooks.lock().teardown.replace(hook) {
            previous.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub delivered: Mutex<Vec<Vec<ActivityEvent>>>,
        pub beacons: Mutex<Vec<Vec<ActivityEvent>>>,
        pub attempts: AtomicUsize,
        pub failing: AtomicBool,
    }

    impl RecordingTransport {
        pub fn delivered_resources(&self) -> Vec<Vec<String>> {
            self.delivered
                .lock()
                .iter()
                .map(|batch| batch.iter().map(|e| e.resource.clone()).collect())
                .collect()
        }
    }

    #[async_trait]
    impl ActivityTransport for RecordingTransport {
        async fn deliver(&self, events: &[ActivityEvent]) -> Result<(), TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(TransportError::Status {
                    status: 503,
                    body: String::new(),
                });
            }
            self.delivered.lock().push(events.to_vec());
            Ok(())
        }

        fn beacon(&self, events: &[ActivityEvent]) -> Result<(), TransportError> {
            self.beacons.lock().push(events.to_vec());
            Ok(())
        }
    }

    pub(crate) fn batcher_with(config: BatcherConfig) -> (ActivityBatcher, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let batcher = ActivityBatcher::new(config, transport.clone()).unwrap();
        (batcher, transport)
    }

    pub(crate) async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn attempts(transport: &RecordingTransport) -> usize {
        transport.attempts.load(Ordering::SeqCst)
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_below_threshold_wait_for_flush() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());

        for page in ["/orders", "/recipes", "/units"] {
            batcher.track(ActivityAction::View, page, None, None);
        }
        settle().await;
        assert_eq!(attempts(&transport), 0);
        assert_eq!(batcher.pending(), 3);

        assert_eq!(batcher.flush().await, FlushOutcome::Delivered(3));
        assert_eq!(
            transport.delivered_resources(),
            vec![vec!["/orders", "/recipes", "/units"]]
        );
        assert_eq!(batcher.flush().await, FlushOutcome::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_batch_triggers_flush() {
        let (batcher, transport) = batcher_with(BatcherConfig::default().with_batch_size(3));

        batcher.track(ActivityAction::Click, "a", None, None);
        batcher.track(ActivityAction::Click, "b", None, None);
        settle().await;
        assert_eq!(attempts(&transport), 0);

        batcher.track(ActivityAction::Click, "c", None, None);
        settle().await;
        assert_eq!(transport.delivered_resources(), vec![vec!["a", "b", "c"]]);
        assert_eq!(batcher.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_action_flushes_immediately() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());

        batcher.track(ActivityAction::Delete, "recipe", Some("17".into()), None);
        settle().await;

        let delivered = transport.delivered.lock();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0][0].action, ActivityAction::Delete);
        assert_eq!(delivered[0][0].resource_id.as_deref(), Some("17"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_is_retried_in_order_without_duplicates() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());
        transport.failing.store(true, Ordering::SeqCst);

        batcher.track(ActivityAction::View, "first", None, None);
        batcher.track(ActivityAction::View, "second", None, None);
        assert_eq!(batcher.flush().await, FlushOutcome::Requeued(2));

        batcher.track(ActivityAction::View, "third", None, None);
        transport.failing.store(false, Ordering::SeqCst);

        assert_eq!(batcher.flush().await, FlushOutcome::Delivered(3));
        assert_eq!(batcher.flush().await, FlushOutcome::Idle);
        assert_eq!(
            transport.delivered_resources(),
            vec![vec!["first", "second", "third"]]
        );
        assert_eq!(attempts(&transport), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_flushes_do_not_double_send() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());
        for page in ["a", "b", "c"] {
            batcher.track(ActivityAction::View, page, None, None);
        }

        let (left, right) = tokio::join!(batcher.flush(), batcher.flush());
        let mut outcomes = [left, right];
        outcomes.sort_by_key(|o| matches!(o, FlushOutcome::Idle));

        assert_eq!(outcomes, [FlushOutcome::Delivered(3), FlushOutcome::Idle]);
        assert_eq!(transport.delivered.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_timer_flushes_partial_batches() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());
        batcher.start().unwrap();
        assert!(batcher.is_running());

        batcher.track(ActivityAction::View, "/pricing", None, None);
        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(attempts(&transport), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.delivered_resources(), vec![vec!["/pricing"]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarting_timer_does_not_duplicate_it() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());
        transport.failing.store(true, Ordering::SeqCst);
        batcher.start().unwrap();
        batcher.start().unwrap();

        batcher.track(ActivityAction::View, "/orders", None, None);
        tokio::time::sleep(Duration::from_millis(5100)).await;

        // A second timer would have retried the requeued batch right away.
        assert_eq!(attempts(&transport), 1);
        assert_eq!(batcher.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());
        batcher.start().unwrap();
        batcher.stop();
        assert!(!batcher.is_running());

        batcher.track(ActivityAction::View, "/orders", None, None);
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(attempts(&transport), 0);
        assert_eq!(batcher.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_tracking_is_noop_and_keeps_queue() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());
        batcher.track(ActivityAction::View, "/orders", None, None);

        batcher.set_enabled(false);
        batcher.track(ActivityAction::Delete, "recipe", None, None);
        settle().await;

        assert!(!batcher.is_enabled());
        assert_eq!(batcher.pending(), 1);
        assert_eq!(attempts(&transport), 0);

        batcher.set_enabled(true);
        batcher.track(ActivityAction::Logout, "session", None, None);
        settle().await;
        assert_eq!(transport.delivered_resources(), vec![vec!["/orders", "session"]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_can_start_disabled() {
        let (batcher, _transport) = batcher_with(BatcherConfig::default().disabled());
        batcher.track(ActivityAction::View, "/orders", None, None);
        assert_eq!(batcher.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_uses_beacon() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());
        batcher.start().unwrap();
        batcher.track(ActivityAction::View, "/orders", None, None);
        batcher.track(ActivityAction::Click, "checkout", None, None);

        assert_eq!(batcher.teardown(), FlushOutcome::Delivered(2));
        assert!(!batcher.is_running());
        assert_eq!(batcher.pending(), 0);
        assert_eq!(transport.beacons.lock().len(), 1);
        assert_eq!(attempts(&transport), 0);

        assert_eq!(batcher.teardown(), FlushOutcome::Idle);
        assert_eq!(transport.beacons.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_on_signal_runs_teardown() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        batcher.flush_on(rx).unwrap();

        batcher.track(ActivityAction::View, "/orders", None, None);
        settle().await;
        assert!(transport.beacons.lock().is_empty());

        tx.send(()).unwrap();
        settle().await;
        assert_eq!(transport.beacons.lock().len(), 1);
        assert_eq!(batcher.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinstalling_flush_on_replaces_previous_hook() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());
        let (first_tx, first_rx) = tokio::sync::oneshot::channel::<()>();
        let (second_tx, second_rx) = tokio::sync::oneshot::channel::<()>();
        batcher.flush_on(first_rx).unwrap();
        batcher.flush_on(second_rx).unwrap();

        batcher.track(ActivityAction::View, "/orders", None, None);
        // The replaced hook is gone; its receiver may already be dropped.
        let _ = first_tx.send(());
        settle().await;
        assert!(transport.beacons.lock().is_empty());
        assert_eq!(batcher.pending(), 1);

        second_tx.send(()).unwrap();
        settle().await;
        assert_eq!(transport.beacons.lock().len(), 1);
        assert_eq!(batcher.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_last_handle_cancels_timer_and_hook() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        batcher.start().unwrap();
        batcher.flush_on(rx).unwrap();
        batcher.track(ActivityAction::View, "/orders", None, None);

        let inner = Arc::downgrade(&batcher.inner);
        drop(batcher);
        settle().await;

        // Neither task keeps the batcher alive, and the aborted hook
        // released its receiver.
        assert!(inner.upgrade().is_none());
        assert!(tx.is_closed());
        assert!(tx.send(()).is_err());

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(attempts(&transport), 0);
        assert!(transport.beacons.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_form_submission_is_sanitized() {
        let (batcher, _transport) = batcher_with(BatcherConfig::default());
        let form = match json!({"username": "baker", "password": "rye-bread", "apiKey": "k"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        batcher.track_form_submission("login-form", Some(form));
        let event = batcher.inner.queue.lock()[0].clone();

        assert_eq!(event.action, ActivityAction::Submit);
        let details = event.details.unwrap();
        assert_eq!(details["username"], "baker");
        assert_eq!(details["password"], "[REDACTED]");
        assert_eq!(details["apiKey"], "[REDACTED]");
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_view_reports_page_context() {
        let (batcher, _transport) = batcher_with(BatcherConfig::default());
        batcher.set_page_context(
            PageContext::new("https://bakery.example/orders")
                .with_referrer("https://bakery.example/")
                .with_user_agent("kiosk/2.1"),
        );

        batcher.track_page_view("/orders");
        let event = batcher.inner.queue.lock()[0].clone();

        assert_eq!(event.action, ActivityAction::View);
        assert_eq!(
            Value::Object(event.details.unwrap()),
            json!({
                "url": "https://bakery.example/orders",
                "referrer": "https://bakery.example/",
                "userAgent": "kiosk/2.1"
            })
        );
    }

    #[derive(Debug, thiserror::Error)]
    #[error("order could not be saved")]
    struct SaveError(#[source] std::io::Error);

    #[tokio::test(start_paused = true)]
    async fn test_track_error_records_cause_chain_and_flushes() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());
        let error = SaveError(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));

        batcher.track_error(&error, None);
        settle().await;

        let delivered = transport.delivered.lock();
        let event = &delivered[0][0];
        assert_eq!(event.action, ActivityAction::Error);
        assert_eq!(event.resource, "application");
        let details = event.details.as_ref().unwrap();
        assert_eq!(details["message"], "order could not be saved");
        assert_eq!(details["causes"], json!(["disk full"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_operation_uses_operation_as_action() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());
        batcher.track_data_operation("UPDATE", "category", Some("bread".into()));
        batcher.track_data_operation(ActivityAction::Create, "category", Some("pastry".into()));
        settle().await;

        let delivered = transport.delivered.lock();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0][0].action, ActivityAction::Update);
        assert_eq!(delivered[0][1].action, ActivityAction::Create);
    }

    #[test]
    fn test_track_without_runtime_keeps_events() {
        let (batcher, transport) = batcher_with(BatcherConfig::default());
        batcher.track(ActivityAction::Delete, "recipe", None, None);

        assert_eq!(batcher.pending(), 1);
        assert_eq!(attempts(&transport), 0);
        assert!(matches!(batcher.start(), Err(ActivityError::NoRuntime)));
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let transport = Arc::new(RecordingTransport::default());
        let result = ActivityBatcher::new(BatcherConfig::default().with_batch_size(0), transport);
        assert!(matches!(result, Err(ActivityError::InvalidConfig { .. })));
    }
}
