use serde::{Deserialize, Serialize};

use super::ThreatLevel;

pub const DEFAULT_MEDIUM_THRESHOLD: f64 = 0.6;
pub const DEFAULT_HIGH_THRESHOLD: f64 = 0.8;

/// Density cut-offs for the two alerting tiers. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub medium: f64,
    pub high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            medium: DEFAULT_MEDIUM_THRESHOLD,
            high: DEFAULT_HIGH_THRESHOLD,
        }
    }
}

impl Thresholds {
    /// Map a density to its tier. Out-of-range values are taken at face value;
    /// NaN is LOW.
    pub fn classify(&self, density: f64) -> ThreatLevel {
        if density >= self.high {
            ThreatLevel::High
        } else if density >= self.medium {
            ThreatLevel::Medium
        } else {
            ThreatLevel::Low
        }
    }
}

/// Classify with the default thresholds.
pub fn classify(density: f64) -> ThreatLevel {
    Thresholds::default().classify(density)
}

/// Human-readable alert details for a classified sample.
pub fn describe(location: &str, density: f64, level: ThreatLevel) -> String {
    let mut details = format!("Simulated density at {} is {:.2}.", location, density);
    match level {
        ThreatLevel::High => details.push_str(" This indicates a critical crowd density."),
        ThreatLevel::Medium => details.push_str(" This indicates a moderate crowd density."),
        ThreatLevel::Low => {}
    }
    details
}
