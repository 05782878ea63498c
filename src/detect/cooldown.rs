use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Per-key debounce gate: one last-alert timestamp per key.
///
/// In memory only; state is lost on restart.
#[derive(Debug)]
pub struct CooldownTracker {
    window: Duration,
    last_alert: HashMap<String, DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_alert: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// True when `key` has never alerted or its window has fully elapsed.
    pub fn allow(&self, key: &str, now: DateTime<Utc>) -> bool {
        match self.last_alert.get(key) {
            None => true,
            Some(last) => now - *last >= self.window,
        }
    }

    /// Overwrite the last alert time for `key`.
    pub fn record(&mut self, key: &str, now: DateTime<Utc>) {
        self.last_alert.insert(key.to_string(), now);
    }

    /// Seconds until `key` may alert again, zero if it already may.
    pub fn remaining(&self, key: &str, now: DateTime<Utc>) -> Duration {
        match self.last_alert.get(key) {
            Some(last) => (*last + self.window - now).max(Duration::zero()),
            None => Duration::zero(),
        }
    }

    pub fn tracked(&self) -> usize {
        self.last_alert.len()
    }
}
