use crate::config::MonitorConfig;
use crate::control::ControlPanel;
use crate::dashboard::{Dashboard, DashboardView};
use crate::retry::RetryPolicy;
use crate::source::SnapshotSource;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    /// Out-of-band cycle requested after an operator command.
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Applied { seq: u64 },
    /// A newer cycle finished first; the result was dropped.
    Stale { seq: u64 },
    /// A scheduled cycle was still outstanding.
    Skipped,
    Failed { seq: u64 },
}

/// Asks the poller for an immediate extra cycle. Requests made while one is
/// already queued are coalesced.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Returns false when nothing is listening for requests any more.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => {
                log::debug!("Refresh requested");
                true
            }
            Err(TrySendError::Full(())) => {
                log::debug!("Refresh already queued");
                true
            }
            Err(TrySendError::Closed(())) => {
                log::warn!("Poller stopped; refresh dropped");
                false
            }
        }
    }
}

#[derive(Debug)]
pub struct RefreshRequests {
    rx: mpsc::Receiver<()>,
}

impl RefreshRequests {
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Consumes a queued request, if any.
    pub fn try_take(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

pub fn refresh_channel() -> (RefreshHandle, RefreshRequests) {
    let (tx, rx) = mpsc::channel(1);
    (RefreshHandle { tx }, RefreshRequests { rx })
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    pub window: usize,
    pub retry: RetryPolicy,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            window: crate::metrics::series::DEFAULT_WINDOW,
            retry: RetryPolicy::none(),
        }
    }
}

impl From<&MonitorConfig> for PollerSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            window: config.window,
            retry: config.retry.clone(),
        }
    }
}

/// Applied views buffered per subscriber before the slowest one starts
/// losing the oldest.
pub const APPLIED_BACKLOG: usize = 64;

/// Held while a scheduled cycle is outstanding.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Poller {
    source: Arc<dyn SnapshotSource>,
    settings: PollerSettings,
    dashboard: Mutex<Dashboard>,
    panel: ControlPanel,
    views: watch::Sender<DashboardView>,
    applied: broadcast::Sender<DashboardView>,
    in_flight: AtomicBool,
    next_seq: AtomicU64,
}

impl Poller {
    pub fn new(source: Arc<dyn SnapshotSource>, mut settings: PollerSettings, panel: ControlPanel) -> Self {
        if settings.interval.is_zero() {
            let fallback = PollerSettings::default().interval;
            log::warn!(
                "Poll interval of zero is not allowed; using {}ms",
                fallback.as_millis()
            );
            settings.interval = fallback;
        }

        let (views, _) = watch::channel(DashboardView::default());
        let (applied, _) = broadcast::channel(APPLIED_BACKLOG);
        Self {
            source,
            dashboard: Mutex::new(Dashboard::new(settings.window)),
            settings,
            panel,
            views,
            applied,
            in_flight: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Latest view only; intermediate views may be skipped.
    pub fn watch_view(&self) -> watch::Receiver<DashboardView> {
        self.views.subscribe()
    }

    /// Every view applied after this call, in cycle order.
    pub fn subscribe_applied(&self) -> broadcast::Receiver<DashboardView> {
        self.applied.subscribe()
    }

    pub fn settings(&self) -> &PollerSettings {
        &self.settings
    }

    pub async fn view(&self) -> DashboardView {
        self.dashboard.lock().await.view()
    }

    pub fn panel(&self) -> &ControlPanel {
        &self.panel
    }

    /// Runs one fetch-and-apply cycle.
    ///
    /// Scheduled cycles are skipped while another scheduled cycle is in
    /// flight. Refresh cycles always run; sequence numbers make sure a slow
    /// response never overwrites a newer one.
    pub async fn poll_once(&self, trigger: Trigger) -> CycleOutcome {
        let _token = match trigger {
            Trigger::Scheduled => match InFlight::acquire(&self.in_flight) {
                Some(token) => Some(token),
                None => {
                    log::debug!("Skipping scheduled poll: previous cycle still in flight");
                    return CycleOutcome::Skipped;
                }
            },
            Trigger::Refresh => None,
        };

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let source = &self.source;
        let snapshot = match self.settings.retry.run(move || source.fetch()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Stats fetch for cycle #{} failed: {}", seq, e);
                return CycleOutcome::Failed { seq };
            }
        };

        let mut dashboard = self.dashboard.lock().await;
        match dashboard.apply(seq, snapshot, Utc::now()) {
            Some(status) => {
                log::debug!(
                    "Cycle #{} ({:?}): {} / {} | pending={} crawled={}",
                    seq,
                    trigger,
                    status.label,
                    status.pause_label,
                    snapshot.pending,
                    snapshot.crawled
                );
                self.panel.apply_derived(status.buttons);
                let view = dashboard.view();
                // No subscribers is fine.
                let _ = self.applied.send(view.clone());
                self.views.send_replace(view);
                CycleOutcome::Applied { seq }
            }
            None => CycleOutcome::Stale { seq },
        }
    }

    /// Polls forever: once immediately, then every interval, plus one extra
    /// cycle per refresh request.
    pub async fn run(self: Arc<Self>, mut refresh: RefreshRequests) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!(
            "Polling every {}ms (window {}, {} retries)",
            self.settings.interval.as_millis(),
            self.settings.window,
            self.settings.retry.max_retries
        );

        loop {
            let trigger = tokio::select! {
                _ = ticker.tick() => Trigger::Scheduled,
                Some(()) = refresh.recv() => Trigger::Refresh,
            };

            let poller = self.clone();
            tokio::spawn(async move {
                poller.poll_once(trigger).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::metrics::snapshot::Snapshot;
    use crate::status::ButtonState;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    /// Hands out canned results, optionally holding each one until its gate opens.
    struct ScriptedSource {
        script: Mutex<VecDeque<(Option<oneshot::Receiver<()>>, Result<Snapshot>)>>,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
            }
        }

        async fn push(&self, result: Result<Snapshot>) {
            self.script.lock().await.push_back((None, result));
        }

        async fn push_gated(&self, result: Result<Snapshot>) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.script.lock().await.push_back((Some(rx), result));
            tx
        }
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        async fn fetch(&self) -> Result<Snapshot> {
            let (gate, result) = self
                .script
                .lock()
                .await
                .pop_front()
                .expect("script exhausted");
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            result
        }
    }

    fn snapshot(pending: u64, crawled: u64, is_running: bool, is_paused: bool) -> Snapshot {
        Snapshot {
            pending,
            crawled,
            is_running,
            is_paused,
            ..Snapshot::default()
        }
    }

    fn poller(source: Arc<ScriptedSource>) -> Poller {
        Poller::new(source, PollerSettings::default(), ControlPanel::new())
    }

    #[tokio::test]
    async fn applied_cycle_publishes_view_and_buttons() {
        let source = Arc::new(ScriptedSource::new());
        source.push(Ok(snapshot(10, 100, true, false))).await;
        let poller = poller(source);
        let mut views = poller.watch_view();

        assert_eq!(poller.poll_once(Trigger::Scheduled).await, CycleOutcome::Applied { seq: 1 });
        assert!(views.has_changed().unwrap());
        let view = views.borrow_and_update().clone();
        assert_eq!(view.snapshot.unwrap().crawled, 100);
        assert_eq!(
            poller.panel().current(),
            ButtonState { pause_enabled: true, resume_enabled: false }
        );
    }

    #[tokio::test]
    async fn failed_fetch_leaves_dashboard_untouched() {
        let source = Arc::new(ScriptedSource::new());
        source.push(Ok(snapshot(1, 1, true, false))).await;
        source
            .push(Err(Error::Status {
                url: "http://test/admin/stats".into(),
                status: StatusCode::INTERNAL_SERVER_ERROR,
            }))
            .await;
        source.push(Ok(snapshot(1, 2, true, false))).await;
        let poller = poller(source);

        poller.poll_once(Trigger::Scheduled).await;
        assert_eq!(poller.poll_once(Trigger::Scheduled).await, CycleOutcome::Failed { seq: 2 });
        assert_eq!(poller.view().await.seq, 1);

        assert_eq!(poller.poll_once(Trigger::Scheduled).await, CycleOutcome::Applied { seq: 3 });
        assert_eq!(poller.view().await.series.crawled.len(), 2);
    }

    #[tokio::test]
    async fn derived_state_overrides_optimistic_disable() {
        let source = Arc::new(ScriptedSource::new());
        source.push(Ok(snapshot(5, 10, true, false))).await;
        let poller = poller(source);
        poller.panel().set_pause_enabled(false);

        poller.poll_once(Trigger::Scheduled).await;
        assert!(poller.panel().current().pause_enabled);
    }

    #[tokio::test]
    async fn overlapping_scheduled_cycle_is_skipped() {
        let source = Arc::new(ScriptedSource::new());
        let gate = source.push_gated(Ok(snapshot(3, 3, true, false))).await;
        let poller = poller(source);

        let (first, second, _) = tokio::join!(
            poller.poll_once(Trigger::Scheduled),
            poller.poll_once(Trigger::Scheduled),
            async move {
                let _ = gate.send(());
            }
        );

        assert_eq!(first, CycleOutcome::Applied { seq: 1 });
        assert_eq!(second, CycleOutcome::Skipped);
    }

    #[tokio::test]
    async fn slower_older_cycle_is_discarded() {
        let source = Arc::new(ScriptedSource::new());
        let old_gate = source.push_gated(Ok(snapshot(10, 100, true, false))).await;
        let new_gate = source.push_gated(Ok(snapshot(10, 100, false, true))).await;
        let poller = poller(source);
        let mut views = poller.watch_view();

        let (old, new, _) = tokio::join!(
            poller.poll_once(Trigger::Scheduled),
            poller.poll_once(Trigger::Refresh),
            async move {
                let _ = new_gate.send(());
                let _ = views.changed().await;
                let _ = old_gate.send(());
            }
        );

        assert_eq!(new, CycleOutcome::Applied { seq: 2 });
        assert_eq!(old, CycleOutcome::Stale { seq: 1 });
        let view = poller.view().await;
        assert!(view.snapshot.unwrap().is_paused);
        assert_eq!(
            poller.panel().current(),
            ButtonState { pause_enabled: false, resume_enabled: true }
        );
    }

    #[tokio::test]
    async fn back_to_back_cycles_each_reach_applied_subscribers() {
        let source = Arc::new(ScriptedSource::new());
        source.push(Ok(snapshot(10, 100, true, false))).await;
        source.push(Ok(snapshot(8, 110, true, false))).await;
        let poller = poller(source);
        let mut applied = poller.subscribe_applied();

        poller.poll_once(Trigger::Scheduled).await;
        poller.poll_once(Trigger::Refresh).await;

        assert_eq!(applied.try_recv().unwrap().seq, 1);
        assert_eq!(applied.try_recv().unwrap().seq, 2);
        assert!(applied.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_cycle_is_not_broadcast() {
        let source = Arc::new(ScriptedSource::new());
        let old_gate = source.push_gated(Ok(snapshot(1, 1, true, false))).await;
        let new_gate = source.push_gated(Ok(snapshot(2, 2, true, false))).await;
        let poller = poller(source);
        let mut applied = poller.subscribe_applied();
        let mut views = poller.watch_view();

        tokio::join!(
            poller.poll_once(Trigger::Scheduled),
            poller.poll_once(Trigger::Refresh),
            async move {
                let _ = new_gate.send(());
                let _ = views.changed().await;
                let _ = old_gate.send(());
            }
        );

        assert_eq!(applied.try_recv().unwrap().seq, 2);
        assert!(applied.try_recv().is_err());
    }

    #[test]
    fn zero_interval_falls_back_to_default() {
        let settings = PollerSettings {
            interval: Duration::ZERO,
            ..PollerSettings::default()
        };
        let poller = Poller::new(Arc::new(ScriptedSource::new()), settings, ControlPanel::new());
        assert_eq!(poller.settings().interval, Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn refresh_request_reports_a_closed_channel() {
        let (handle, requests) = refresh_channel();
        assert!(handle.request());
        drop(requests);
        assert!(!handle.request());
    }

    #[tokio::test]
    async fn refresh_requests_are_coalesced() {
        let (handle, mut requests) = refresh_channel();
        handle.request();
        handle.request();
        assert!(requests.try_take());
        assert!(!requests.try_take());
    }
}
