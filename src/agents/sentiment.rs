use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info};

use super::truncate_chars;
use crate::config::SentimentConfig;
use crate::llm::TextModel;
use crate::scheduler::PeriodicTask;
use crate::storage::records::{Sentiment, SentimentRecord};
use crate::storage::Store;

pub fn sentiment_prompt(text: &str) -> String {
    format!(
        "Analyze the sentiment of the following text and return ONLY one word: \
         'POSITIVE', 'NEGATIVE', or 'NEUTRAL'. Text: '{}'",
        text
    )
}

/// Label `text`. A failed model call yields [`Sentiment::Error`].
pub async fn analyze(model: &dyn TextModel, text: &str) -> Sentiment {
    match model.generate(&sentiment_prompt(text)).await {
        Ok(reply) => Sentiment::from_reply(&reply),
        Err(e) => {
            error!(model = model.model_name(), text = truncate_chars(text, 50), error = %e, "Sentiment call failed");
            Sentiment::Error
        }
    }
}

/// Labels unprocessed social posts and copies them into `sentiment_data`.
pub struct SentimentAgent {
    store: Store,
    model: Arc<dyn TextModel>,
    batch_size: usize,
    request_delay: Duration,
}

impl SentimentAgent {
    pub fn new(store: Store, model: Arc<dyn TextModel>, cfg: &SentimentConfig) -> Self {
        Self {
            store,
            model,
            batch_size: cfg.batch_size,
            request_delay: Duration::from_millis(cfg.request_delay_ms),
        }
    }

    /// Process one batch; returns how many posts were picked up.
    pub async fn process_batch(&self) -> Result<usize> {
        let limit = self.batch_size;
        let posts = self.store.blocking(move |s| s.unprocessed_posts(limit)).await?;
        if posts.is_empty() {
            info!("No new social media posts to process for sentiment");
            return Ok(0);
        }

        for post in &posts {
            if post.text_content.is_empty() {
                debug!(post_id = post.id, "Post has no text, marking processed");
                let id = post.id;
                if let Err(e) = self.store.blocking(move |s| s.mark_post_processed(id, None)).await {
                    error!(post_id = post.id, error = %e, "Failed to mark post processed");
                }
                continue;
            }

            let sentiment = analyze(self.model.as_ref(), &post.text_content).await;

            let id = post.id;
            let record = SentimentRecord::for_post(post, sentiment);
            let stored = self
                .store
                .blocking(move |s| {
                    s.mark_post_processed(id, Some(sentiment))?;
                    s.append_sentiment(&record)
                })
                .await;
            match stored {
                Ok(_) => info!(
                    post_id = post.id,
                    location = %post.location_name,
                    %sentiment,
                    "Processed sentiment for '{}...'",
                    truncate_chars(&post.text_content, 50)
                ),
                Err(e) => error!(post_id = post.id, error = %e, "Failed to store sentiment result"),
            }

            if !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        Ok(posts.len())
    }
}

#[async_trait]
impl PeriodicTask for SentimentAgent {
    fn name(&self) -> &'static str {
        "sentiment-analysis"
    }

    async fn tick(&mut self) {
        if let Err(e) = self.process_batch().await {
            error!(error = %e, "Sentiment batch failed");
        }
    }
}
