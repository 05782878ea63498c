use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

use crate::config::CameraConfig;
use crate::detect::{CooldownTracker, ThreatLevel};
use crate::llm::ImageModel;
use crate::scheduler::PeriodicTask;
use crate::storage::records::{Alert, CameraFeed};
use crate::storage::Store;

const IMAGE_COOLDOWN_KEY: &str = "camera-feed";
const NORMAL_SCENE_PROMPT: &str = "A normal, moderately busy street scene in Bengaluru, sunny day, \
     people walking casually, urban environment, daytime.";

/// What the next camera image should show.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePlan {
    pub prompt: String,
    /// Used to name the image file.
    pub image_label: String,
    pub feed_location: String,
    pub level: ThreatLevel,
    pub details: String,
}

/// Pick a crowded scene for a fresh HIGH alert, otherwise a normal one.
pub fn plan_scene(latest_high: Option<&Alert>, now: DateTime<Utc>, active_for: Duration) -> ScenePlan {
    match latest_high {
        Some(alert) if now - alert.timestamp < active_for => {
            let prompt = if alert.details.contains("extremely dense") {
                format!(
                    "An extremely dense crowd forming in Bengaluru near {}, people looking anxious \
                     or confused, realistic photo, urban environment, daytime, wide angle.",
                    alert.location_name
                )
            } else {
                format!(
                    "A very crowded street scene in Bengaluru near {}, showing signs of high \
                     density, realistic photo, urban environment, daytime.",
                    alert.location_name
                )
            };
            ScenePlan {
                prompt,
                image_label: alert.location_name.clone(),
                feed_location: alert.location_name.clone(),
                level: alert.threat_level,
                details: alert.details.clone(),
            }
        }
        _ => ScenePlan {
            prompt: NORMAL_SCENE_PROMPT.to_string(),
            image_label: "Bengaluru City".to_string(),
            feed_location: "Bengaluru City (Normal)".to_string(),
            level: ThreatLevel::Low,
            details: "Normal city activity.".to_string(),
        },
    }
}

/// `camera_feeds/{slug}_{unix}.png`, relative to the media root.
pub fn image_path(label: &str, now: DateTime<Utc>) -> PathBuf {
    let slug = label.replace(' ', "_").to_lowercase();
    Path::new("camera_feeds").join(format!("{}_{}.png", slug, now.timestamp()))
}

/// Keeps the dashboard camera panel in step with the latest HIGH alert.
pub struct CameraAgent {
    store: Store,
    images: Arc<dyn ImageModel>,
    cfg: CameraConfig,
    cooldown: CooldownTracker,
}

impl CameraAgent {
    pub fn new(store: Store, images: Arc<dyn ImageModel>, cfg: CameraConfig) -> Self {
        let cooldown = CooldownTracker::new(cfg.cooldown());
        Self {
            store,
            images,
            cfg,
            cooldown,
        }
    }

    /// One update as of `now`. Returns the new feed, or `None` while the
    /// image cooldown is running.
    pub async fn update_at(&mut self, now: DateTime<Utc>) -> Result<Option<CameraFeed>> {
        let latest_high = self
            .store
            .blocking(|s| s.latest_alert_at_level(ThreatLevel::High))
            .await?;
        let plan = plan_scene(
            latest_high.as_ref(),
            now,
            self.cfg.active_alert_window(),
        );

        if !self.cooldown.allow(IMAGE_COOLDOWN_KEY, now) {
            info!(
                next_in_secs = self.cooldown.remaining(IMAGE_COOLDOWN_KEY, now).num_seconds(),
                "Image generation is in cooldown"
            );
            return Ok(None);
        }

        info!(location = %plan.feed_location, level = %plan.level, "Generating camera image");
        let bytes = self
            .images
            .generate_image(&plan.prompt)
            .await
            .context("image generation failed")?;
        self.cooldown.record(IMAGE_COOLDOWN_KEY, now);

        let relative = image_path(&plan.image_label, now);
        let target = self.cfg.media_dir.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&target, &bytes)
            .await
            .with_context(|| format!("failed to write {}", target.display()))?;

        let image_url = format!(
            "{}/{}",
            self.cfg.public_base_url.trim_end_matches('/'),
            relative.to_string_lossy().replace('\\', "/")
        );
        let feed = CameraFeed {
            image_url,
            location_name: plan.feed_location,
            alert_level: plan.level,
            details: plan.details,
            timestamp: now,
        };
        let stored = feed.clone();
        self.store.blocking(move |s| s.upsert_camera_feed(&stored)).await?;
        info!(url = %feed.image_url, location = %feed.location_name, "Updated camera feed");
        Ok(Some(feed))
    }
}

#[async_trait]
impl PeriodicTask for CameraAgent {
    fn name(&self) -> &'static str {
        "camera-feed"
    }

    async fn tick(&mut self) {
        if let Err(e) = self.update_at(Utc::now()).await {
            error!("Camera feed update failed: {:#}", e);
        }
    }
}
