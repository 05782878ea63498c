use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{NotificationChannel, NotifyError};

/// Twilio account credentials, read from the environment.
#[derive(Debug, Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
}

impl TwilioCredentials {
    /// `None` unless both `TWILIO_ACCOUNT_SID` and `TWILIO_AUTH_TOKEN` are set.
    pub fn from_env() -> Option<Self> {
        let account_sid = non_empty_env("TWILIO_ACCOUNT_SID")?;
        let auth_token = non_empty_env("TWILIO_AUTH_TOKEN")?;
        Some(Self {
            account_sid,
            auth_token,
        })
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// SMS over the Twilio Messages REST API.
pub struct TwilioSms {
    client: Client,
    base_url: String,
    credentials: TwilioCredentials,
}

#[derive(Deserialize)]
struct MessageResponse {
    sid: String,
}

impl TwilioSms {
    pub fn new(
        base_url: &str,
        credentials: TwilioCredentials,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.credentials.account_sid
        )
    }
}

#[async_trait]
impl NotificationChannel for TwilioSms {
    fn name(&self) -> &'static str {
        "twilio-sms"
    }

    async fn send(&self, to: &str, from: &str, body: &str) -> Result<String, NotifyError> {
        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .form(&[("To", to), ("From", from), ("Body", body)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let message: MessageResponse = resp.json().await?;
        debug!(sid = %message.sid, "Twilio accepted message");
        Ok(message.sid)
    }
}
