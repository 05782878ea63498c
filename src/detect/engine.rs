use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info};

use super::classifier::describe;
use super::{resolver, AlertEmitter, CooldownTracker, DetectError, Thresholds, ThreatStore};
use crate::config::ThreatConfig;
use crate::scheduler::PeriodicTask;

/// Outcome counters for one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub locations_seen: usize,
    pub alerts_emitted: usize,
    pub suppressed: usize,
    pub failures: usize,
}

/// The threat-detection loop body: resolve, classify, gate, emit.
pub struct ThreatEngine {
    store: Arc<dyn ThreatStore>,
    emitter: AlertEmitter,
    thresholds: Thresholds,
    cooldown: CooldownTracker,
    sample_window: usize,
}

impl ThreatEngine {
    pub fn new(
        store: Arc<dyn ThreatStore>,
        emitter: AlertEmitter,
        thresholds: Thresholds,
        cooldown: Duration,
        sample_window: usize,
    ) -> Self {
        Self {
            store,
            emitter,
            thresholds,
            cooldown: CooldownTracker::new(cooldown),
            sample_window,
        }
    }

    pub fn from_config(store: Arc<dyn ThreatStore>, emitter: AlertEmitter, cfg: &ThreatConfig) -> Self {
        Self::new(
            store,
            emitter,
            cfg.thresholds(),
            cfg.cooldown(),
            cfg.sample_window,
        )
    }

    pub fn cooldown(&self) -> &CooldownTracker {
        &self.cooldown
    }

    /// Run one tick as if the wall clock read `now`.
    ///
    /// Only a failed sample read aborts the tick; a failed alert write is
    /// counted and the next location is processed.
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> Result<TickReport, DetectError> {
        let store = self.store.clone();
        let limit = self.sample_window;
        let window = tokio::task::spawn_blocking(move || store.recent_samples(limit))
            .await
            .map_err(|e| DetectError::ReadSamples(e.into()))?
            .map_err(DetectError::ReadSamples)?;
        let latest = resolver::latest_per_location(window);

        let mut report = TickReport {
            locations_seen: latest.len(),
            ..TickReport::default()
        };

        for (location, sample) in latest {
            let level = self.thresholds.classify(sample.density);
            if !level.is_alert() {
                continue;
            }

            if !self.cooldown.allow(&location, now) {
                debug!(
                    location = %location,
                    remaining_secs = self.cooldown.remaining(&location, now).num_seconds(),
                    "Location is in cooldown, skipping alert"
                );
                report.suppressed += 1;
                continue;
            }

            let details = describe(&location, sample.density, level);
            match self
                .emitter
                .emit(&location, sample.latitude, sample.longitude, level, &details)
                .await
            {
                Ok(_) => {
                    self.cooldown.record(&location, now);
                    report.alerts_emitted += 1;
                }
                Err(e) => {
                    error!(location = %location, error = %e, "Failed to record threat alert");
                    report.failures += 1;
                }
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl PeriodicTask for ThreatEngine {
    fn name(&self) -> &'static str {
        "threat-detection"
    }

    async fn tick(&mut self) {
        match self.tick_at(Utc::now()).await {
            Ok(report) if report.alerts_emitted > 0 || report.failures > 0 => {
                info!(
                    locations = report.locations_seen,
                    alerts = report.alerts_emitted,
                    suppressed = report.suppressed,
                    failures = report.failures,
                    "Threat scan complete"
                );
            }
            Ok(report) => {
                debug!(locations = report.locations_seen, suppressed = report.suppressed, "Threat scan complete");
            }
            Err(e) => error!(error = %e, "Threat scan failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::testing::{FakeStore, RecordingChannel};
    use crate::detect::{SmsRoute, ThreatLevel};

    fn engine(store: Arc<FakeStore>, channel: Option<Arc<RecordingChannel>>) -> ThreatEngine {
        let sms = channel.map(|c| SmsRoute {
            channel: c,
            to: "+15550001".into(),
            from: "+15559999".into(),
        });
        let emitter = AlertEmitter::new(store.clone(), sms);
        ThreatEngine::new(store, emitter, Thresholds::default(), Duration::seconds(120), 20)
    }

    #[tokio::test]
    async fn test_repeat_high_within_cooldown_alerts_once() {
        let store = Arc::new(FakeStore::default());
        let channel = Arc::new(RecordingChannel::default());
        let mut engine = engine(store.clone(), Some(channel.clone()));
        let t0 = Utc::now();

        store.push_sample("MG Road", 0.85);
        let first = engine.tick_at(t0).await.unwrap();
        assert_eq!(first.alerts_emitted, 1);

        store.push_sample("MG Road", 0.90);
        let second = engine.tick_at(t0 + Duration::seconds(30)).await.unwrap();
        assert_eq!(second.alerts_emitted, 0);
        assert_eq!(second.suppressed, 1);

        let alerts = store.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].threat_level, ThreatLevel::High);
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_low_density_is_silent() {
        let store = Arc::new(FakeStore::default());
        let channel = Arc::new(RecordingChannel::default());
        let mut engine = engine(store.clone(), Some(channel.clone()));

        store.push_sample("Cubbon Park", 0.5);
        let report = engine.tick_at(Utc::now()).await.unwrap();
        assert_eq!(report.locations_seen, 1);
        assert_eq!(report.alerts_emitted, 0);
        assert!(store.alerts().is_empty());
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_locations_cool_down_independently() {
        let store = Arc::new(FakeStore::default());
        let channel = Arc::new(RecordingChannel::default());
        let mut engine = engine(store.clone(), Some(channel.clone()));
        let t0 = Utc::now();

        store.push_sample("MG Road", 0.85);
        store.push_sample("Electronic City", 0.85);
        let report = engine.tick_at(t0).await.unwrap();
        assert_eq!(report.alerts_emitted, 2);
        assert_eq!(channel.sent().len(), 2);
        assert_eq!(engine.cooldown().tracked(), 2);

        store.push_sample("Cubbon Park", 0.95);
        let report = engine.tick_at(t0 + Duration::seconds(10)).await.unwrap();
        assert_eq!(report.alerts_emitted, 1);
        assert_eq!(report.suppressed, 2);
    }

    #[tokio::test]
    async fn test_medium_persists_without_notification() {
        let store = Arc::new(FakeStore::default());
        let channel = Arc::new(RecordingChannel::default());
        let mut engine = engine(store.clone(), Some(channel.clone()));

        store.push_sample("Koramangala 5th Block", 0.7);
        engine.tick_at(Utc::now()).await.unwrap();
        let alerts = store.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].threat_level, ThreatLevel::Medium);
        assert!(alerts[0].details.contains("moderate crowd density"));
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_medium_blocks_high_within_window() {
        let store = Arc::new(FakeStore::default());
        let mut engine = engine(store.clone(), None);
        let t0 = Utc::now();

        store.push_sample("MG Road", 0.65);
        engine.tick_at(t0).await.unwrap();
        store.push_sample("MG Road", 0.95);
        let report = engine.tick_at(t0 + Duration::seconds(60)).await.unwrap();
        assert_eq!(report.suppressed, 1);

        let report = engine.tick_at(t0 + Duration::seconds(120)).await.unwrap();
        assert_eq!(report.alerts_emitted, 1);
        assert_eq!(store.alerts()[1].threat_level, ThreatLevel::High);
    }

    #[tokio::test]
    async fn test_failed_write_skips_cooldown_and_continues() {
        let store = Arc::new(FakeStore::default());
        let mut engine = engine(store.clone(), None);
        let t0 = Utc::now();

        store.push_sample("MG Road", 0.9);
        store.push_sample("Majestic Bus Stand", 0.9);
        store.fail_alerts_for("MG Road");

        let report = engine.tick_at(t0).await.unwrap();
        assert_eq!(report.failures, 1);
        assert_eq!(report.alerts_emitted, 1);
        assert!(engine.cooldown().allow("MG Road", t0));
        assert!(!engine.cooldown().allow("Majestic Bus Stand", t0));
    }

    #[tokio::test]
    async fn test_failed_notification_keeps_alert() {
        let store = Arc::new(FakeStore::default());
        let channel = Arc::new(RecordingChannel::failing());
        let mut engine = engine(store.clone(), Some(channel.clone()));

        store.push_sample("MG Road", 0.99);
        let report = engine.tick_at(Utc::now()).await.unwrap();
        assert_eq!(report.alerts_emitted, 1);
        assert_eq!(store.alerts().len(), 1);
        assert_eq!(channel.sent().len(), 1, "one attempt was made");
    }

    #[tokio::test]
    async fn test_read_failure_aborts_tick() {
        let store = Arc::new(FakeStore::default());
        store.fail_reads();
        let mut engine = engine(store, None);
        assert!(matches!(
            engine.tick_at(Utc::now()).await,
            Err(DetectError::ReadSamples(_))
        ));
    }

    #[tokio::test]
    async fn test_emit_twice_writes_two_records() {
        let store = Arc::new(FakeStore::default());
        let emitter = AlertEmitter::new(store.clone(), None);
        let a = emitter
            .emit("MG Road", None, None, ThreatLevel::High, "x")
            .await
            .unwrap();
        let b = emitter
            .emit("MG Road", None, None, ThreatLevel::High, "x")
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(store.alerts().len(), 2);
    }

    #[tokio::test]
    async fn test_sms_body_format() {
        let store = Arc::new(FakeStore::default());
        let channel = Arc::new(RecordingChannel::default());
        let mut engine = engine(store.clone(), Some(channel.clone()));

        store.push_sample("MG Road", 0.85);
        engine.tick_at(Utc::now()).await.unwrap();
        let sent = channel.sent();
        assert_eq!(sent[0].0, "+15550001");
        assert_eq!(sent[0].1, "+15559999");
        assert_eq!(
            sent[0].2,
            "URGENT City Alert: Crowd Density Alert at MG Road. Level: HIGH. Details: \
             Simulated density at MG Road is 0.85. This indicates a critical crowd density."
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_store_calls_leave_the_executor_thread() {
        let store = Arc::new(FakeStore::default());
        let mut engine = engine(store.clone(), None);

        store.push_sample("MG Road", 0.85);
        let report = engine.tick_at(Utc::now()).await.unwrap();
        assert_eq!(report.alerts_emitted, 1);

        let executor = std::thread::current().id();
        let threads = store.threads();
        assert_eq!(threads.len(), 2, "one read and one write");
        assert!(threads.iter().all(|t| *t != executor));
    }

    #[test]
    fn test_from_config_caps_huge_cooldown() {
        let store = Arc::new(FakeStore::default());
        let emitter = AlertEmitter::new(store.clone(), None);
        let cfg = ThreatConfig {
            cooldown_secs: 10_000_000_000_000_000,
            ..ThreatConfig::default()
        };
        let engine = ThreatEngine::from_config(store, emitter, &cfg);
        assert_eq!(
            engine.cooldown().window(),
            Duration::seconds(crate::config::MAX_COOLDOWN_SECS as i64)
        );
    }
}
