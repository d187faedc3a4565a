//! Collection loop: `Idle -> Running -> Draining -> Finished`
//!
//! Each tick fetches once, records the price or skips the tick, then sleeps the
//! full interval. Cadence drifts by the fetch latency; there is no catch-up.

use crate::api::PriceFetcher;
use crate::models::{RunConfig, RunSummary, TrackerState};
use crate::services::report_service::Reporter;
use crate::services::storage_service::SampleStore;
use crate::utils::errors::TrackerError;
use crate::utils::format_usd;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument, Span};

pub struct Tracker<F, R> {
    config: RunConfig,
    fetcher: F,
    reporter: R,
    store: SampleStore,
    state: TrackerState,
    span: Span,
}

/// Resolves once `stop` reads `true`. A dropped sender never stops the run.
async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl<F, R> Tracker<F, R>
where
    F: PriceFetcher,
    R: Reporter,
{
    /// Everything the run logs is recorded inside `span`
    pub fn new(config: RunConfig, fetcher: F, reporter: R, span: Span) -> Self {
        Self {
            config,
            fetcher,
            reporter,
            store: SampleStore::new(),
            state: TrackerState::Idle,
            span,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Samples collected so far (all of them once the run is finished)
    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    fn transition(&mut self, next: TrackerState) {
        debug!("Tracker state: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Start the run and drive it to `Finished`.
    ///
    /// Sending `true` on `stop` ends the ticking at the next tick boundary and
    /// drains whatever was collected. Per-tick failures never surface here.
    pub async fn run(&mut self, stop: watch::Receiver<bool>) -> Result<RunSummary, TrackerError> {
        if self.state != TrackerState::Idle {
            return Err(TrackerError::AlreadyStarted(self.state.as_str()));
        }

        let span = self.span.clone();
        Ok(self.collect_and_drain(stop).instrument(span).await)
    }

    async fn collect_and_drain(&mut self, mut stop: watch::Receiver<bool>) -> RunSummary {
        self.transition(TrackerState::Running);
        let started = Instant::now();
        let interval = self.config.tick_interval;

        info!(
            "Starting price tracking: {} ticks planned, every {}s for {} minutes",
            self.config.planned_ticks(),
            interval.as_secs(),
            self.config.duration.as_secs() / 60
        );

        let mut ticks: u32 = 0;
        let mut failed_ticks: u32 = 0;
        let mut stopped_early = false;

        loop {
            if started.elapsed() >= self.config.duration {
                break;
            }
            if *stop.borrow() {
                stopped_early = true;
                break;
            }

            ticks += 1;
            match self.fetcher.fetch().await {
                Some(price) => {
                    let now = chrono::Local::now().naive_local();
                    match self.store.record(now, price) {
                        Ok(()) => info!("Tick {}: recorded {}", ticks, format_usd(price)),
                        Err(e) => {
                            failed_ticks += 1;
                            warn!("Tick {}: skipping storage: {}", ticks, e);
                        }
                    }
                }
                None => {
                    failed_ticks += 1;
                    warn!("Tick {}: skipping storage due to fetch error", ticks);
                }
            }

            debug!("Waiting {}s for next tick", interval.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = wait_for_stop(&mut stop) => {
                    stopped_early = true;
                    break;
                }
            }
        }

        if stopped_early {
            warn!("Stop requested after {} ticks, draining collected data", ticks);
        }

        self.transition(TrackerState::Draining);
        let summary = self.drain(ticks, failed_ticks, stopped_early).await;
        self.transition(TrackerState::Finished);

        info!(
            "Price tracking finished: {} ticks, {} samples, {} failed",
            summary.ticks, summary.samples, summary.failed_ticks
        );
        summary
    }

    async fn drain(&self, ticks: u32, failed_ticks: u32, stopped_early: bool) -> RunSummary {
        // Blocking file I/O; persist a snapshot on the blocking pool
        let snapshot = self.store.clone();
        let samples_path = self.config.samples_path.clone();
        let persist = tokio::task::spawn_blocking(move || snapshot.persist(&samples_path));
        let persisted = match persist.await {
            Ok(result) => result.is_ok(),
            Err(e) => {
                error!("Persist task failed: {}", e);
                false
            }
        };
        let max_price = self.store.max_price();

        let mut chart_path = None;
        let mut email_sent = false;

        match max_price {
            None => warn!("No data collected. Skipping graph and email steps."),
            Some(max) => {
                info!("Maximum price recorded: {}", format_usd(max));
                chart_path = self.reporter.render_chart(self.store.all()).await;

                match self.config.email.as_ref() {
                    Some(email) => {
                        match self
                            .reporter
                            .send_report(&email.recipient_email, max, chart_path.as_deref())
                            .await
                        {
                            Ok(()) => email_sent = true,
                            Err(e) => error!(severity = "critical", "Failed to send email: {}", e),
                        }
                    }
                    None => info!("Email reporting disabled, skipping email"),
                }
            }
        }

        RunSummary {
            ticks,
            failed_ticks,
            samples: self.store.len(),
            max_price,
            stopped_early,
            persisted,
            chart_path,
            email_sent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailConfig, Sample};
    use crate::utils::errors::ReportError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const INTERVAL: Duration = Duration::from_secs(60);

    /// Returns queued outcomes in order, then `None` forever
    struct ScriptedFetcher {
        outcomes: Mutex<VecDeque<Option<f64>>>,
        calls: Arc<AtomicU32>,
    }

    impl ScriptedFetcher {
        fn new(outcomes: &[Option<f64>]) -> (Self, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            let fetcher = Self {
                outcomes: Mutex::new(outcomes.iter().copied().collect()),
                calls: calls.clone(),
            };
            (fetcher, calls)
        }
    }

    #[async_trait]
    impl PriceFetcher for ScriptedFetcher {
        async fn fetch(&self) -> Option<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes.lock().unwrap().pop_front().flatten()
        }
    }

    #[derive(Default)]
    struct Calls {
        rendered: Vec<Vec<f64>>,
        sent: Vec<(String, f64, Option<PathBuf>)>,
    }

    struct RecordingReporter {
        calls: Arc<Mutex<Calls>>,
        fail_send: bool,
    }

    impl RecordingReporter {
        fn new(fail_send: bool) -> (Self, Arc<Mutex<Calls>>) {
            let calls = Arc::new(Mutex::new(Calls::default()));
            (
                Self {
                    calls: calls.clone(),
                    fail_send,
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Reporter for RecordingReporter {
        async fn render_chart(&self, samples: &[Sample]) -> Option<PathBuf> {
            let prices = samples.iter().map(|s| s.price).collect();
            self.calls.lock().unwrap().rendered.push(prices);
            Some(PathBuf::from("chart.png"))
        }

        async fn send_report(
            &self,
            recipient: &str,
            max_price: f64,
            chart_path: Option<&Path>,
        ) -> Result<(), ReportError> {
            self.calls.lock().unwrap().sent.push((
                recipient.to_string(),
                max_price,
                chart_path.map(Path::to_path_buf),
            ));
            if self.fail_send {
                Err(ReportError::Disabled)
            } else {
                Ok(())
            }
        }
    }

    fn test_config(ticks: u32, email: bool) -> RunConfig {
        let dir = std::env::temp_dir().join(format!("price-tracker-{}", uuid::Uuid::new_v4()));
        RunConfig {
            api_url: "http://localhost/spot".to_string(),
            asset_name: "Bitcoin".to_string(),
            tick_interval: INTERVAL,
            request_timeout: Duration::from_secs(10),
            duration: INTERVAL * ticks,
            samples_path: dir.join("prices.json"),
            chart_path: dir.join("graph.png"),
            email: email.then(|| EmailConfig {
                smtp_server: "smtp.example.com".to_string(),
                smtp_port: 587,
                sender_email: "tracker@example.com".to_string(),
                sender_password: "secret".to_string(),
                recipient_email: "me@example.com".to_string(),
            }),
        }
    }

    fn read_persisted(config: &RunConfig) -> Vec<Sample> {
        let text = std::fs::read_to_string(&config.samples_path).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    fn cleanup(config: &RunConfig) {
        if let Some(dir) = config.samples_path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_between_successes_does_not_stop_the_run() {
        let config = test_config(3, true);
        let (fetcher, calls) = ScriptedFetcher::new(&[Some(100.0), None, Some(110.0)]);
        let (reporter, reports) = RecordingReporter::new(false);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let mut tracker = Tracker::new(config.clone(), fetcher, reporter, Span::none());
        let summary = tracker.run(stop_rx).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.failed_ticks, 1);
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.max_price, Some(110.0));
        assert!(summary.persisted);
        assert!(summary.email_sent);
        assert!(!summary.stopped_early);
        assert_eq!(tracker.state(), TrackerState::Finished);

        let prices: Vec<f64> = tracker.store().all().iter().map(|s| s.price).collect();
        assert_eq!(prices, vec![100.0, 110.0]);

        let calls = reports.lock().unwrap();
        assert_eq!(calls.rendered, vec![vec![100.0, 110.0]]);
        assert_eq!(
            calls.sent,
            vec![("me@example.com".to_string(), 110.0, Some(PathBuf::from("chart.png")))]
        );

        assert_eq!(read_persisted(&config), tracker.store().all());
        cleanup(&config);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_holds_only_successful_fetches() {
        let outcomes = [Some(100.0), None, Some(120.0), Some(90.0), None, Some(95.5), None];
        let config = test_config(outcomes.len() as u32, false);
        let (fetcher, _) = ScriptedFetcher::new(&outcomes);
        let (reporter, _) = RecordingReporter::new(false);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let mut tracker = Tracker::new(config.clone(), fetcher, reporter, Span::none());
        let summary = tracker.run(stop_rx).await.unwrap();

        let successes: Vec<f64> = outcomes.iter().flatten().copied().collect();
        assert_eq!(summary.ticks, 7);
        assert_eq!(summary.failed_ticks, 3);
        assert_eq!(tracker.store().len(), successes.len());
        assert_eq!(summary.max_price, Some(120.0));
        cleanup(&config);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_of_two_intervals_runs_two_ticks() {
        let config = test_config(2, false);
        let (fetcher, calls) = ScriptedFetcher::new(&[Some(1.0), Some(2.0), Some(3.0)]);
        let (reporter, _) = RecordingReporter::new(false);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let mut tracker = Tracker::new(config.clone(), fetcher, reporter, Span::none());
        let summary = tracker.run(stop_rx).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.samples, 2);
        cleanup(&config);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_signal_drains_partial_data() {
        let config = test_config(5, true);
        let (fetcher, calls) = ScriptedFetcher::new(&[Some(100.0); 5]);
        let (reporter, reports) = RecordingReporter::new(false);
        let (stop_tx, stop_rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(INTERVAL / 2).await;
            let _ = stop_tx.send(true);
        });

        let started = Instant::now();
        let mut tracker = Tracker::new(config.clone(), fetcher, reporter, Span::none());
        let summary = tracker.run(stop_rx).await.unwrap();

        assert!(started.elapsed() < INTERVAL);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(summary.stopped_early);
        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.samples, 1);
        assert!(summary.persisted);
        assert_eq!(read_persisted(&config).len(), 1);
        assert_eq!(reports.lock().unwrap().rendered, vec![vec![100.0]]);
        assert_eq!(tracker.state(), TrackerState::Finished);
        cleanup(&config);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_start_collects_nothing() {
        let config = test_config(5, true);
        let (fetcher, calls) = ScriptedFetcher::new(&[Some(100.0)]);
        let (reporter, reports) = RecordingReporter::new(false);
        let (_stop_tx, stop_rx) = watch::channel(true);

        let mut tracker = Tracker::new(config.clone(), fetcher, reporter, Span::none());
        let summary = tracker.run(stop_rx).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(summary.stopped_early);
        assert_eq!(summary.samples, 0);
        assert!(reports.lock().unwrap().rendered.is_empty());
        cleanup(&config);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_run_skips_reporting() {
        let config = test_config(3, true);
        let (fetcher, _) = ScriptedFetcher::new(&[None, None, None]);
        let (reporter, reports) = RecordingReporter::new(false);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let mut tracker = Tracker::new(config.clone(), fetcher, reporter, Span::none());
        let summary = tracker.run(stop_rx).await.unwrap();

        assert_eq!(summary.samples, 0);
        assert_eq!(summary.max_price, None);
        assert!(summary.persisted);
        assert!(summary.chart_path.is_none());
        assert!(!summary.email_sent);
        assert!(read_persisted(&config).is_empty());

        let calls = reports.lock().unwrap();
        assert!(calls.rendered.is_empty());
        assert!(calls.sent.is_empty());
        cleanup(&config);
    }

    #[tokio::test(start_paused = true)]
    async fn test_email_disabled_still_renders_chart() {
        let config = test_config(1, false);
        let (fetcher, _) = ScriptedFetcher::new(&[Some(42.0)]);
        let (reporter, reports) = RecordingReporter::new(false);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let mut tracker = Tracker::new(config.clone(), fetcher, reporter, Span::none());
        let summary = tracker.run(stop_rx).await.unwrap();

        assert_eq!(summary.chart_path, Some(PathBuf::from("chart.png")));
        assert!(!summary.email_sent);

        let calls = reports.lock().unwrap();
        assert_eq!(calls.rendered.len(), 1);
        assert!(calls.sent.is_empty());
        cleanup(&config);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_email_does_not_fail_the_run() {
        let config = test_config(1, true);
        let (fetcher, _) = ScriptedFetcher::new(&[Some(42.0)]);
        let (reporter, reports) = RecordingReporter::new(true);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let mut tracker = Tracker::new(config.clone(), fetcher, reporter, Span::none());
        let summary = tracker.run(stop_rx).await.unwrap();

        assert!(!summary.email_sent);
        assert!(summary.persisted);
        assert_eq!(reports.lock().unwrap().sent.len(), 1);
        assert_eq!(tracker.state(), TrackerState::Finished);
        cleanup(&config);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_failure_still_reports() {
        let mut config = test_config(1, true);
        let blocker = config.samples_path.with_file_name("blocker");
        std::fs::create_dir_all(blocker.parent().unwrap()).unwrap();
        std::fs::write(&blocker, b"x").unwrap();
        config.samples_path = blocker.join("prices.json");

        let (fetcher, _) = ScriptedFetcher::new(&[Some(42.0)]);
        let (reporter, reports) = RecordingReporter::new(false);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let mut tracker = Tracker::new(config.clone(), fetcher, reporter, Span::none());
        let summary = tracker.run(stop_rx).await.unwrap();

        assert!(!summary.persisted);
        assert_eq!(summary.samples, 1);
        assert!(summary.email_sent);
        assert_eq!(reports.lock().unwrap().rendered.len(), 1);

        let _ = std::fs::remove_dir_all(blocker.parent().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cannot_run_twice() {
        let config = test_config(1, false);
        let (fetcher, calls) = ScriptedFetcher::new(&[Some(1.0), Some(2.0)]);
        let (reporter, _) = RecordingReporter::new(false);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let mut tracker = Tracker::new(config.clone(), fetcher, reporter, Span::none());
        tracker.run(stop_rx.clone()).await.unwrap();

        let second = tracker.run(stop_rx).await;
        assert!(matches!(second, Err(TrackerError::AlreadyStarted("finished"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        cleanup(&config);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_stop_sender_does_not_stop_the_run() {
        let config = test_config(3, false);
        let (fetcher, calls) = ScriptedFetcher::new(&[Some(1.0), Some(2.0), Some(3.0)]);
        let (reporter, _) = RecordingReporter::new(false);
        let (stop_tx, stop_rx) = watch::channel(false);
        drop(stop_tx);

        let mut tracker = Tracker::new(config.clone(), fetcher, reporter, Span::none());
        let summary = tracker.run(stop_rx).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!summary.stopped_early);
        cleanup(&config);
    }
}
