//! Outbound notification channels.
//!
//! A channel is fire-and-forget from the alerting side: the caller logs a
//! failed send and moves on.

pub mod twilio;

use async_trait::async_trait;
use thiserror::Error;

pub use self::twilio::{TwilioCredentials, TwilioSms};

/// Errors that can occur when sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status
    #[error("send rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A text-message channel (SMS today).
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Send `body` to `to` from `from`; returns the provider's message id.
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<String, NotifyError>;
}
