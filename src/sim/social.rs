use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{error, info};

use super::SOCIAL_LOCATIONS;
use crate::scheduler::PeriodicTask;
use crate::storage::records::NewPost;
use crate::storage::Store;

const PLACEHOLDER: &str = "[LOCATION]";

pub const POST_TEMPLATES: [&str; 13] = [
    "Traffic is terrible on [LOCATION] today! Stuck for ages. 😠 #BengaluruTraffic",
    "Amazing weather in [LOCATION], perfect for a stroll! 😊 #Bengaluru",
    "Just saw a street performance at [LOCATION] - so lively! 🎶",
    "Construction noise near [LOCATION] is so annoying. Can't work. 😤",
    "Enjoying some great food at [LOCATION]. Highly recommend! 😋",
    "Too many people near [LOCATION] today, feels a bit overwhelming. 🚶‍♂️🚶‍♀️",
    "Peaceful morning at [LOCATION]. Feeling calm and refreshed. ✨",
    "Heard a loud commotion near [LOCATION]. Hope it's nothing serious. 🚨",
    "My favorite cafe at [LOCATION] just launched new pastries! 🍰🤤",
    "Power cut again in [LOCATION]! Frustrating! #BengaluruPower",
    "Excited for the weekend market at [LOCATION]! 🛍️",
    "Just finished a run at [LOCATION], feeling great!",
    "Heavy rains near [LOCATION], drive safe everyone! 🌧️",
];

/// A random post from a random location, coordinates jittered by up to
/// 0.001 degrees.
pub fn generate_post<R: Rng>(rng: &mut R) -> NewPost {
    let location = SOCIAL_LOCATIONS
        .choose(rng)
        .copied()
        .unwrap_or(SOCIAL_LOCATIONS[0]);
    let template = POST_TEMPLATES.choose(rng).copied().unwrap_or(POST_TEMPLATES[0]);
    NewPost {
        location_name: location.name.to_string(),
        latitude: Some(location.lat + rng.gen_range(-0.001..=0.001)),
        longitude: Some(location.lon + rng.gen_range(-0.001..=0.001)),
        text_content: template.replace(PLACEHOLDER, location.name),
    }
}

/// Writes one unprocessed social post every tick.
pub struct SocialSimulator {
    store: Store,
    rng: StdRng,
}

impl SocialSimulator {
    pub fn new(store: Store) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    pub fn with_rng(store: Store, rng: StdRng) -> Self {
        Self { store, rng }
    }

    pub fn generate_one(&mut self) -> Option<i64> {
        let post = generate_post(&mut self.rng);
        match self.store.append_post(&post) {
            Ok(id) => {
                info!(location = %post.location_name, "Generated social post: '{}'", post.text_content);
                Some(id)
            }
            Err(e) => {
                error!(location = %post.location_name, error = %e, "Failed to store social post");
                None
            }
        }
    }
}

#[async_trait]
impl PeriodicTask for SocialSimulator {
    fn name(&self) -> &'static str {
        "social-simulator"
    }

    async fn tick(&mut self) {
        self.generate_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posts_name_their_location() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let post = generate_post(&mut rng);
            assert!(!post.text_content.contains(PLACEHOLDER));
            assert!(post.text_content.contains(&post.location_name));
            assert!(SOCIAL_LOCATIONS.iter().any(|l| l.name == post.location_name));
        }
    }

    #[test]
    fn test_generated_posts_await_processing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("sim.db").to_str().unwrap()).unwrap();
        let mut sim = SocialSimulator::with_rng(store.clone(), StdRng::seed_from_u64(3));
        assert!(sim.generate_one().is_some());
        assert!(sim.generate_one().is_some());
        assert_eq!(store.unprocessed_posts(10).unwrap().len(), 2);
    }
}
