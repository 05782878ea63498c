//! Synthetic data generators for demos.

pub mod crowd;
pub mod social;

pub use self::crowd::CrowdSimulator;
pub use self::social::SocialSimulator;

/// A named point of interest.
#[derive(Debug, Clone, Copy)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

const fn loc(name: &'static str, lat: f64, lon: f64) -> Location {
    Location { name, lat, lon }
}

/// Locations with crowd-density sensors.
pub const CROWD_LOCATIONS: [Location; 6] = [
    loc("MG Road", 12.9750, 77.6090),
    loc("Majestic Bus Stand", 12.9774, 77.5700),
    loc("Koramangala 5th Block", 12.9345, 77.6180),
    loc("Indiranagar 100 Feet Rd", 12.9700, 77.6400),
    loc("Electronic City", 12.8468, 77.6601),
    loc("Cubbon Park", 12.9758, 77.5922),
];

/// Locations social posts are attributed to.
pub const SOCIAL_LOCATIONS: [Location; 10] = [
    CROWD_LOCATIONS[0],
    CROWD_LOCATIONS[1],
    CROWD_LOCATIONS[2],
    CROWD_LOCATIONS[3],
    CROWD_LOCATIONS[4],
    CROWD_LOCATIONS[5],
    loc("Marathahalli", 12.9569, 77.7011),
    loc("Kr puram", 13.0170, 77.7044),
    loc("Bhanashankari", 12.9255, 77.5468),
    loc("yeswanthpur", 13.0250, 77.5340),
];
