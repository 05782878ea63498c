use std::collections::BTreeMap;

use crate::storage::records::Sample;

/// Reduce a most-recent-first window to the newest sample per location.
///
/// The first occurrence of each name wins. Locations missing from the
/// window are simply absent.
pub fn latest_per_location(window: Vec<Sample>) -> BTreeMap<String, Sample> {
    let mut latest = BTreeMap::new();
    for sample in window {
        if !latest.contains_key(&sample.location_name) {
            latest.insert(sample.location_name.clone(), sample);
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn sample(id: i64, name: &str, density: f64, age_secs: i64) -> Sample {
        Sample {
            id,
            location_name: name.to_string(),
            density,
            latitude: None,
            longitude: None,
            timestamp: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_first_occurrence_wins() {
        let window = vec![
            sample(3, "A", 0.9, 0),
            sample(2, "B", 0.5, 5),
            sample(1, "A", 0.1, 10),
        ];
        let latest = latest_per_location(window);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest["A"].id, 3);
        assert_eq!(latest["B"].id, 2);
    }

    #[test]
    fn test_empty_window() {
        assert!(latest_per_location(Vec::new()).is_empty());
    }
}
