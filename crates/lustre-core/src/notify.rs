//! Fire-and-forget completion notifications.
//!
//! A notifier never fails the pipeline: delivery errors are logged and
//! dropped.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::NotificationConfig;

/// How long a webhook delivery may take.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str);
}

/// Writes notifications to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, message: &str) {
        tracing::info!(target: "lustre::notify", "{title}: {message}");
    }
}

/// POSTs `{"title": ..., "message": ...}` to a URL.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    message: &'a str,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, title: &str, message: &str) {
        let result = self
            .client
            .post(&self.url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(&WebhookPayload { title, message })
            .send()
            .await
            .and_then(|resp| resp.error_for_status());
        if let Err(e) = result {
            tracing::warn!("Notification to {} failed: {e}", self.url);
        }
    }
}

/// The configured notifier, or `None` when notifications are off.
pub fn notifier_from_config(config: &NotificationConfig) -> Option<Arc<dyn Notifier>> {
    if !config.enabled {
        return None;
    }
    match config.webhook_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Some(Arc::new(WebhookNotifier::new(url))),
        _ => Some(Arc::new(LogNotifier)),
    }
}

/// Deliver on a background task without waiting for it.
pub fn notify_detached(notifier: &Arc<dyn Notifier>, title: &str, message: String) {
    let notifier = Arc::clone(notifier);
    let title = title.to_string();
    tokio::spawn(async move {
        notifier.notify(&title, &message).await;
    });
}
