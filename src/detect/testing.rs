//! In-memory doubles for the threat engine's collaborators.

use std::collections::HashSet;
use std::sync::Mutex;
use std::thread::ThreadId;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::{AlertId, ThreatStore};
use crate::notify::{NotificationChannel, NotifyError};
use crate::storage::records::{NewAlert, Sample};

#[derive(Default)]
pub(crate) struct FakeStore {
    samples: Mutex<Vec<Sample>>,
    alerts: Mutex<Vec<NewAlert>>,
    failing_locations: Mutex<HashSet<String>>,
    fail_reads: Mutex<bool>,
    threads: Mutex<Vec<ThreadId>>,
}

impl FakeStore {
    /// Append a sample that is newer than every sample before it.
    pub fn push_sample(&self, name: &str, density: f64) {
        let mut samples = self.samples.lock().unwrap();
        let id = samples.len() as i64 + 1;
        samples.push(Sample {
            id,
            location_name: name.to_string(),
            density,
            latitude: Some(12.97),
            longitude: Some(77.60),
            timestamp: Utc::now() + Duration::milliseconds(id),
        });
    }

    pub fn alerts(&self) -> Vec<NewAlert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn fail_alerts_for(&self, name: &str) {
        self.failing_locations.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_reads(&self) {
        *self.fail_reads.lock().unwrap() = true;
    }

    /// Threads that served each read and write, in call order.
    pub fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().unwrap().clone()
    }

    fn note_thread(&self) {
        self.threads.lock().unwrap().push(std::thread::current().id());
    }
}

impl ThreatStore for FakeStore {
    fn recent_samples(&self, limit: usize) -> anyhow::Result<Vec<Sample>> {
        self.note_thread();
        if *self.fail_reads.lock().unwrap() {
            anyhow::bail!("store unreachable");
        }
        let samples = self.samples.lock().unwrap();
        Ok(samples.iter().rev().take(limit).cloned().collect())
    }

    fn append_alert(&self, alert: &NewAlert) -> anyhow::Result<AlertId> {
        self.note_thread();
        if self
            .failing_locations
            .lock()
            .unwrap()
            .contains(&alert.location_name)
        {
            anyhow::bail!("write rejected");
        }
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(uuid::Uuid::new_v4())
    }
}

#[derive(Default)]
pub(crate) struct RecordingChannel {
    sent: Mutex<Vec<(String, String, String)>>,
    fail: bool,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, to: &str, from: &str, body: &str) -> Result<String, NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), from.to_string(), body.to_string()));
        if self.fail {
            return Err(NotifyError::Rejected {
                status: 400,
                body: "invalid 'To' number".into(),
            });
        }
        Ok(format!("SM{}", self.sent.lock().unwrap().len()))
    }
}
