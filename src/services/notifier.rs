//! Telegram notification channel

use std::time::Duration;

use crate::{
    config::NotifierConfig,
    error::{AppError, AppResult},
};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Best-effort notification channel. Delivery failures are logged and
/// never propagated, so business flows cannot fail on a notification.
#[derive(Clone)]
pub struct Notifier {
    http: reqwest::Client,
    credentials: Option<(String, String)>,
}

impl Notifier {
    pub fn new(config: &NotifierConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let credentials = match (config.bot_token.as_deref(), config.chat_id.as_deref()) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                Some((token.to_string(), chat_id.to_string()))
            }
            _ => {
                tracing::warn!("No notification credentials configured, running with notifications disabled");
                None
            }
        };

        Ok(Self { http, credentials })
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// Send a message to the configured chat
    pub async fn send(&self, text: &str) {
        let Some((token, chat_id)) = &self.credentials else {
            tracing::debug!(message = text, "notifications disabled, dropping message");
            return;
        };

        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, token);
        let result = self
            .http
            .get(&url)
            .query(&[("chat_id", chat_id.as_str()), ("text", text)])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("notification delivered");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "notification rejected by channel");
            }
            Err(e) => {
                tracing::warn!(error = %e, "notification delivery failed");
            }
        }
    }
}
