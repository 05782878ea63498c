use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info};

use super::truncate_chars;
use crate::config::InsightsConfig;
use crate::llm::TextModel;
use crate::scheduler::PeriodicTask;
use crate::storage::records::{Alert, NewInsight, Sample, SentimentRecord};
use crate::storage::Store;

pub const AGENT_NAME: &str = "City Insights Agent";

/// Build the summarisation prompt from recent records, newest first.
pub fn insights_prompt(crowd: &[Sample], sentiment: &[SentimentRecord], alerts: &[Alert]) -> String {
    let crowd_summary = if crowd.is_empty() {
        "No recent crowd data.".to_string()
    } else {
        crowd
            .iter()
            .map(|s| {
                format!(
                    "- {}: Density {:.2} at {}",
                    s.location_name,
                    s.density,
                    s.timestamp.format("%H:%M")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let sentiment_summary = if sentiment.is_empty() {
        "No recent sentiment data.".to_string()
    } else {
        sentiment
            .iter()
            .map(|r| {
                format!(
                    "- {}: {} ('{}...') at {}",
                    r.location_name,
                    r.sentiment,
                    truncate_chars(&r.text_content, 50),
                    r.timestamp.format("%H:%M")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let alerts_summary = if alerts.is_empty() {
        "No recent alerts.".to_string()
    } else {
        alerts
            .iter()
            .map(|a| {
                format!(
                    "- {} at {} (Level: {}): {}",
                    a.threat_type, a.location_name, a.threat_level, a.details
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Analyze the following recent city data from Bengaluru and provide actionable insights \
         and recommendations for city authorities.\n\
         Focus on:\n\
         1. Summarizing key trends (crowd density, sentiment).\n\
         2. Identifying potential issues or areas needing attention.\n\
         3. Suggesting proactive measures or resource allocation.\n\n\
         Recent Crowd Data (latest first):\n{}\n\n\
         Recent Sentiment Data (latest first):\n{}\n\n\
         Recent Alerts (latest first):\n{}\n\n\
         Provide the insights in a concise paragraph followed by 2-3 bullet-point recommendations.",
        crowd_summary, sentiment_summary, alerts_summary
    )
}

/// Periodically summarises crowd, sentiment and alert data into an insight.
pub struct InsightsAgent {
    store: Store,
    model: Arc<dyn TextModel>,
    cfg: InsightsConfig,
}

impl InsightsAgent {
    pub fn new(store: Store, model: Arc<dyn TextModel>, cfg: InsightsConfig) -> Self {
        Self { store, model, cfg }
    }

    /// Generate and store one insight from records newer than the window.
    pub async fn generate_at(&self, now: DateTime<Utc>) -> Result<i64> {
        let window = self.cfg.window();
        let fresh = |ts: DateTime<Utc>| now - ts < window;

        let (crowd_limit, sentiment_limit, alert_limit) =
            (self.cfg.crowd_limit, self.cfg.sentiment_limit, self.cfg.alert_limit);
        let (mut crowd, mut sentiment, mut alerts) = self
            .store
            .blocking(move |s| {
                Ok((
                    s.recent_samples(crowd_limit)?,
                    s.recent_sentiment(sentiment_limit)?,
                    s.recent_alerts(alert_limit)?,
                ))
            })
            .await?;
        crowd.retain(|s| fresh(s.timestamp));
        sentiment.retain(|r| fresh(r.timestamp));
        alerts.retain(|a| fresh(a.timestamp));

        let prompt = insights_prompt(&crowd, &sentiment, &alerts);
        let summary = self
            .model
            .generate(&prompt)
            .await
            .context("insight generation failed")?;

        let insight = NewInsight {
            summary: summary.clone(),
            generated_by_agent: AGENT_NAME.to_string(),
            model_used: self.model.model_name().to_string(),
        };
        let id = self.store.blocking(move |s| s.append_insight(&insight)).await?;
        info!(insight_id = id, "Stored new city insight: {}...", truncate_chars(&summary, 200));
        Ok(id)
    }
}

#[async_trait]
impl PeriodicTask for InsightsAgent {
    fn name(&self) -> &'static str {
        "city-insights"
    }

    async fn tick(&mut self) {
        info!("Generating new city insights");
        if let Err(e) = self.generate_at(Utc::now()).await {
            error!("Failed to generate or store city insight: {:#}", e);
        }
    }
}
