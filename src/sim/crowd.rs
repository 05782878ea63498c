use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info};

use super::{Location, CROWD_LOCATIONS};
use crate::scheduler::PeriodicTask;
use crate::storage::records::NewSample;
use crate::storage::Store;

/// One synthetic reading: density in [0.1, 1.0] to two decimals, with the
/// coordinates jittered by up to 0.005 degrees.
pub fn generate_sample<R: Rng>(rng: &mut R, location: &Location) -> NewSample {
    let density = (rng.gen_range(0.1..=1.0_f64) * 100.0).round() / 100.0;
    NewSample {
        location_name: location.name.to_string(),
        density,
        latitude: Some(location.lat + rng.gen_range(-0.005..=0.005)),
        longitude: Some(location.lon + rng.gen_range(-0.005..=0.005)),
    }
}

/// Writes one density sample per location every tick.
pub struct CrowdSimulator {
    store: Store,
    rng: StdRng,
}

impl CrowdSimulator {
    pub fn new(store: Store) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    pub fn with_rng(store: Store, rng: StdRng) -> Self {
        Self { store, rng }
    }

    /// Append a round of samples; returns how many were written.
    pub fn generate_round(&mut self) -> usize {
        let mut written = 0;
        for location in &CROWD_LOCATIONS {
            let sample = generate_sample(&mut self.rng, location);
            match self.store.append_sample(&sample) {
                Ok(_) => {
                    info!(location = location.name, density = sample.density, "Generated crowd data");
                    written += 1;
                }
                Err(e) => {
                    error!(location = location.name, error = %e, "Failed to store crowd data");
                }
            }
        }
        written
    }
}

#[async_trait]
impl PeriodicTask for CrowdSimulator {
    fn name(&self) -> &'static str {
        "crowd-simulator"
    }

    async fn tick(&mut self) {
        self.generate_round();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_values_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for location in &CROWD_LOCATIONS {
            for _ in 0..50 {
                let s = generate_sample(&mut rng, location);
                assert!((0.1..=1.0).contains(&s.density));
                assert_eq!((s.density * 100.0).round() / 100.0, s.density);
                assert!((s.latitude.unwrap() - location.lat).abs() <= 0.005 + 1e-9);
                assert!((s.longitude.unwrap() - location.lon).abs() <= 0.005 + 1e-9);
            }
        }
    }

    #[test]
    fn test_round_covers_every_location() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("sim.db").to_str().unwrap()).unwrap();
        let mut sim = CrowdSimulator::with_rng(store.clone(), StdRng::seed_from_u64(1));
        assert_eq!(sim.generate_round(), CROWD_LOCATIONS.len());

        let latest = crate::detect::resolver::latest_per_location(store.recent_samples(20).unwrap());
        assert_eq!(latest.len(), CROWD_LOCATIONS.len());
    }
}
