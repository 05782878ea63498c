//! Typed records for each collection, and the row translation layer.
//!
//! Raw rows come out of SQLite with every optional column as `Option`. The
//! `*Row::into_*` conversions are the only place missing fields get defaulted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::parse_timestamp;
use crate::detect::{AlertId, ThreatLevel};

/// `threat_type` written on every crowd alert.
pub const CROWD_DENSITY_ALERT: &str = "Crowd Density Alert";

// ---------------------------------------------------------------------------
// crowd_data
// ---------------------------------------------------------------------------

/// A density sample for one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub id: i64,
    pub location_name: String,
    pub density: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSample {
    pub location_name: String,
    pub density: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

pub(crate) struct SampleRow {
    pub id: i64,
    pub location_name: Option<String>,
    pub density: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: String,
}

impl SampleRow {
    pub(crate) fn into_sample(self) -> Option<Sample> {
        let location_name = match self.location_name {
            Some(name) if !name.is_empty() => name,
            _ => {
                debug!(row_id = self.id, "Dropping crowd sample without a location name");
                return None;
            }
        };
        let timestamp = parse_timestamp(&self.created_at)?;
        Some(Sample {
            id: self.id,
            location_name,
            density: self.density.unwrap_or(0.0),
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp,
        })
    }
}

// ---------------------------------------------------------------------------
// threat_alerts
// ---------------------------------------------------------------------------

/// An alert as written to the alert log.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: AlertId,
    pub location_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub threat_type: String,
    pub threat_level: ThreatLevel,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// An alert before the store has assigned its id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub location_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub threat_type: String,
    pub threat_level: ThreatLevel,
    pub details: String,
}

impl NewAlert {
    pub fn crowd_density(
        location_name: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
        threat_level: ThreatLevel,
        details: String,
    ) -> Self {
        Self {
            location_name: location_name.to_string(),
            latitude,
            longitude,
            threat_type: CROWD_DENSITY_ALERT.to_string(),
            threat_level,
            details,
        }
    }
}

pub(crate) struct AlertRow {
    pub id: String,
    pub location_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub threat_type: String,
    pub threat_level: String,
    pub details: String,
    pub created_at: String,
}

impl AlertRow {
    pub(crate) fn into_alert(self) -> Option<Alert> {
        Some(Alert {
            id: uuid::Uuid::parse_str(&self.id).ok()?,
            threat_level: self.threat_level.parse().ok()?,
            timestamp: parse_timestamp(&self.created_at)?,
            location_name: self.location_name,
            latitude: self.latitude,
            longitude: self.longitude,
            threat_type: self.threat_type,
            details: self.details,
        })
    }
}

// ---------------------------------------------------------------------------
// social_media_feeds / sentiment_data
// ---------------------------------------------------------------------------

/// Sentiment label attached to a social post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    /// The classifier call itself failed.
    Error,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "POSITIVE",
            Sentiment::Negative => "NEGATIVE",
            Sentiment::Neutral => "NEUTRAL",
            Sentiment::Error => "ERROR",
        }
    }

    /// Read a model reply. Anything outside the three labels is NEUTRAL.
    pub fn from_reply(reply: &str) -> Self {
        match reply.trim().to_uppercase().as_str() {
            "POSITIVE" => Sentiment::Positive,
            "NEGATIVE" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "ERROR" {
            return Ok(Sentiment::Error);
        }
        Ok(Sentiment::from_reply(s))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SocialPost {
    pub id: i64,
    pub location_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub text_content: String,
    pub processed: bool,
    pub sentiment_raw: Option<Sentiment>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub location_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub text_content: String,
}

pub(crate) struct SocialPostRow {
    pub id: i64,
    pub location_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub text_content: Option<String>,
    pub processed: i64,
    pub sentiment_raw: Option<String>,
    pub created_at: String,
}

impl SocialPostRow {
    pub(crate) fn into_post(self) -> SocialPost {
        SocialPost {
            id: self.id,
            location_name: self
                .location_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            latitude: self.latitude,
            longitude: self.longitude,
            text_content: self.text_content.unwrap_or_default(),
            processed: self.processed != 0,
            sentiment_raw: self.sentiment_raw.and_then(|s| s.parse().ok()),
            timestamp: parse_timestamp(&self.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// One analysed post, as stored in `sentiment_data`.
#[derive(Debug, Clone, Serialize)]
pub struct SentimentRecord {
    pub location_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub text_content: String,
    pub sentiment: Sentiment,
    pub timestamp: DateTime<Utc>,
}

impl SentimentRecord {
    /// Build the record for `post`, carrying over its location and timestamp.
    pub fn for_post(post: &SocialPost, sentiment: Sentiment) -> Self {
        Self {
            location_name: post.location_name.clone(),
            latitude: post.latitude,
            longitude: post.longitude,
            text_content: post.text_content.clone(),
            sentiment,
            timestamp: post.timestamp,
        }
    }
}

pub(crate) struct SentimentRow {
    pub location_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub text_content: String,
    pub sentiment: String,
    pub created_at: String,
}

impl SentimentRow {
    pub(crate) fn into_record(self) -> Option<SentimentRecord> {
        Some(SentimentRecord {
            timestamp: parse_timestamp(&self.created_at)?,
            sentiment: self.sentiment.parse().unwrap_or(Sentiment::Neutral),
            location_name: self.location_name,
            latitude: self.latitude,
            longitude: self.longitude,
            text_content: self.text_content,
        })
    }
}

// ---------------------------------------------------------------------------
// city_insights / camera_feeds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CityInsight {
    pub id: i64,
    pub summary: String,
    pub generated_by_agent: String,
    pub model_used: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInsight {
    pub summary: String,
    pub generated_by_agent: String,
    pub model_used: String,
}

pub(crate) struct InsightRow {
    pub id: i64,
    pub summary: String,
    pub generated_by_agent: String,
    pub model_used: String,
    pub created_at: String,
}

impl InsightRow {
    pub(crate) fn into_insight(self) -> Option<CityInsight> {
        Some(CityInsight {
            timestamp: parse_timestamp(&self.created_at)?,
            id: self.id,
            summary: self.summary,
            generated_by_agent: self.generated_by_agent,
            model_used: self.model_used,
        })
    }
}

/// The image shown on the dashboard's camera panel.
#[derive(Debug, Clone, Serialize)]
pub struct CameraFeed {
    pub image_url: String,
    pub location_name: String,
    pub alert_level: ThreatLevel,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

pub(crate) struct CameraFeedRow {
    pub image_url: String,
    pub location_name: String,
    pub alert_level: String,
    pub details: String,
    pub updated_at: String,
}

impl CameraFeedRow {
    pub(crate) fn into_feed(self) -> Option<CameraFeed> {
        Some(CameraFeed {
            alert_level: self.alert_level.parse().ok()?,
            timestamp: parse_timestamp(&self.updated_at)?,
            image_url: self.image_url,
            location_name: self.location_name,
            details: self.details,
        })
    }
}
