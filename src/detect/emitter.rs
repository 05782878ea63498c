use std::sync::Arc;

use tracing::{error, info, warn};

use super::{AlertId, DetectError, ThreatLevel, ThreatStore};
use crate::notify::NotificationChannel;
use crate::storage::records::{NewAlert, CROWD_DENSITY_ALERT};

/// Where HIGH alerts are texted: a channel plus both phone numbers.
#[derive(Clone)]
pub struct SmsRoute {
    pub channel: Arc<dyn NotificationChannel>,
    pub to: String,
    pub from: String,
}

/// Persists alerts and escalates HIGH ones to SMS.
pub struct AlertEmitter {
    store: Arc<dyn ThreatStore>,
    sms: Option<SmsRoute>,
}

impl AlertEmitter {
    pub fn new(store: Arc<dyn ThreatStore>, sms: Option<SmsRoute>) -> Self {
        Self { store, sms }
    }

    pub fn notifies(&self) -> bool {
        self.sms.is_some()
    }

    /// Append one alert record; for HIGH, also attempt a text message.
    ///
    /// A failed send is logged and never affects the stored alert. Each call
    /// writes a new record.
    pub async fn emit(
        &self,
        location: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
        level: ThreatLevel,
        details: &str,
    ) -> Result<AlertId, DetectError> {
        let alert =
            NewAlert::crowd_density(location, latitude, longitude, level, details.to_string());
        let store = self.store.clone();
        let id = tokio::task::spawn_blocking(move || store.append_alert(&alert))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|written| written)
            .map_err(|source| DetectError::PersistAlert {
                location: location.to_string(),
                source,
            })?;
        warn!(alert_id = %id, location, level = %level, "🚨 ALERT: {}", details);

        if level == ThreatLevel::High {
            self.escalate(location, level, details).await;
        }
        Ok(id)
    }

    async fn escalate(&self, location: &str, level: ThreatLevel, details: &str) {
        let Some(route) = &self.sms else {
            return;
        };
        let body = format!(
            "URGENT City Alert: {} at {}. Level: {}. Details: {}",
            CROWD_DENSITY_ALERT, location, level, details
        );
        match route.channel.send(&route.to, &route.from, &body).await {
            Ok(message_id) => {
                info!(channel = route.channel.name(), %message_id, location, "SMS alert sent");
            }
            Err(e) => {
                error!(channel = route.channel.name(), location, error = %e, "Failed to send SMS alert");
            }
        }
    }
}
