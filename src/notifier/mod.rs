//! Transactional email. Every call site is best-effort: a failed send is
//! logged and never fails the surrounding workflow.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("email request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("email provider returned {status}: {message}")]
    Provider { status: u16, message: String },
}

/// One key line in a delivery email.
#[derive(Debug, Clone, Serialize)]
pub struct KeyDelivery {
    pub game_title: String,
    pub key: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Welcome email after registration.
    async fn user_registered(
        &self,
        email: &str,
        display_name: &str,
    ) -> Result<(), NotificationError>;

    /// Key-delivery email after checkout fulfillment.
    async fn keys_delivered(
        &self,
        email: &str,
        order_id: &str,
        keys: &[KeyDelivery],
    ) -> Result<(), NotificationError>;
}

#[derive(Debug, Serialize)]
struct EmailMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: String,
    text: String,
}

/// Sends through an HTTP email provider (single JSON endpoint, bearer
/// API key).
pub struct EmailNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl EmailNotifier {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client construction cannot fail with static options"),
            api_url,
            api_key,
            from,
        }
    }

    /// Builds a notifier from configuration; falls back to
    /// [`NullNotifier`] behavior when the provider is not configured.
    pub fn from_config(cfg: &AppConfig) -> Option<Self> {
        match (&cfg.email_api_url, &cfg.email_api_key) {
            (Some(url), Some(key)) => {
                Some(Self::new(url.clone(), key.clone(), cfg.email_from.clone()))
            }
            _ => None,
        }
    }

    async fn deliver(&self, message: &EmailMessage<'_>) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Provider {
                status: status.as_u16(),
                message: body,
            });
        }

        info!(to = %message.to, subject = %message.subject, "email sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    #[instrument(skip(self))]
    async fn user_registered(
        &self,
        email: &str,
        display_name: &str,
    ) -> Result<(), NotificationError> {
        let message = EmailMessage {
            from: &self.from,
            to: email,
            subject: "Welcome to PlayVault".to_string(),
            text: format!(
                "Hi {display_name},\n\nYour PlayVault account is ready. Top up your \
                 balance and start building your library.\n"
            ),
        };
        self.deliver(&message).await
    }

    #[instrument(skip(self, keys), fields(key_count = keys.len()))]
    async fn keys_delivered(
        &self,
        email: &str,
        order_id: &str,
        keys: &[KeyDelivery],
    ) -> Result<(), NotificationError> {
        let mut text = format!("Your keys for order {order_id}:\n\n");
        for delivery in keys {
            text.push_str(&format!("{}: {}\n", delivery.game_title, delivery.key));
        }
        text.push_str("\nKeys are also available under your account at any time.\n");

        let message = EmailMessage {
            from: &self.from,
            to: email,
            subject: format!("Your game keys ({order_id})"),
            text,
        };
        self.deliver(&message).await
    }
}

/// No-op notifier used when email is not configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn user_registered(
        &self,
        email: &str,
        _display_name: &str,
    ) -> Result<(), NotificationError> {
        debug!(to = %email, "email disabled; skipping welcome message");
        Ok(())
    }

    async fn keys_delivered(
        &self,
        email: &str,
        order_id: &str,
        keys: &[KeyDelivery],
    ) -> Result<(), NotificationError> {
        debug!(to = %email, order_id = %order_id, key_count = keys.len(), "email disabled; skipping key delivery message");
        Ok(())
    }
}
