//! Crowd threat detection: classification, alert suppression, alert emission.
//!
//! One [`engine::ThreatEngine`] per process owns the only
//! [`cooldown::CooldownTracker`], so the per-location state needs no locking.

pub mod classifier;
pub mod cooldown;
pub mod emitter;
pub mod engine;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::records::{NewAlert, Sample};

pub use self::classifier::Thresholds;
pub use self::cooldown::CooldownTracker;
pub use self::emitter::{AlertEmitter, SmsRoute};
pub use self::engine::{ThreatEngine, TickReport};

/// Identifier assigned to every persisted alert.
pub type AlertId = uuid::Uuid;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("failed to read recent samples: {0:#}")]
    ReadSamples(#[source] anyhow::Error),
    #[error("failed to persist alert for {location}: {source:#}")]
    PersistAlert {
        location: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Severity tier derived from a density value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::High => "HIGH",
        }
    }

    /// Whether this tier produces an alert at all.
    pub fn is_alert(&self) -> bool {
        *self != ThreatLevel::Low
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown threat level '{0}'")]
pub struct ParseThreatLevelError(String);

impl FromStr for ThreatLevel {
    type Err = ParseThreatLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(ThreatLevel::Low),
            "MEDIUM" => Ok(ThreatLevel::Medium),
            "HIGH" => Ok(ThreatLevel::High),
            other => Err(ParseThreatLevelError(other.to_string())),
        }
    }
}

/// The slice of the document store the threat engine needs.
pub trait ThreatStore: Send + Sync {
    /// Most recent samples first, at most `limit`.
    fn recent_samples(&self, limit: usize) -> anyhow::Result<Vec<Sample>>;

    /// Append an alert and return its id. The store assigns the timestamp.
    fn append_alert(&self, alert: &NewAlert) -> anyhow::Result<AlertId>;
}
