use std::path::PathBuf;

use crate::config::Config;
use crate::storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    /// How many recent samples `/crowd/latest` resolves over.
    pub sample_window: usize,
    pub media_dir: PathBuf,
}

impl AppState {
    pub fn new(store: Store, config: &Config) -> Self {
        Self {
            store,
            sample_window: config.threat.sample_window,
            media_dir: config.camera.media_dir.clone(),
        }
    }
}
