//! Push-notification egress with per-key cooldowns.
//!
//! Endpoints are Apprise-compatible: each configured URL receives a JSON
//! `{title, body, notify_type}` POST (an Apprise API gateway fans out to
//! telegram/pushover/discord from there). A per-key cooldown keeps a
//! persistent condition from flooding the operator's phone.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing::{debug, info, warn};

use crate::notifications_repo::NotificationLogRepository;

/// Apprise notification classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyType {
    Info,
    Warning,
    Failure,
}

impl NotifyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyType::Info => "info",
            NotifyType::Warning => "warning",
            NotifyType::Failure => "failure",
        }
    }

    /// Map a rule/event priority onto a notification class.
    pub fn from_priority(priority: &str) -> Self {
        match priority {
            "critical" | "emergency" => NotifyType::Failure,
            "warning" => NotifyType::Warning,
            _ => NotifyType::Info,
        }
    }
}

/// One queued send
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub notify_type: NotifyType,
    /// Cooldown key, e.g. `safety:squawk_emergency:A12345`
    pub key: String,
    pub icao: Option<String>,
}

pub struct Notifier {
    client: Client,
    urls: Vec<String>,
    cooldown: Duration,
    enabled: bool,
    last_sent: Mutex<HashMap<String, DateTime<Utc>>>,
    log_repo: Option<NotificationLogRepository>,
}

impl Notifier {
    pub fn new(urls: Vec<String>, cooldown_seconds: u64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Notifier {
            client,
            enabled: !urls.is_empty(),
            urls,
            cooldown: Duration::seconds(cooldown_seconds as i64),
            last_sent: Mutex::new(HashMap::new()),
            log_repo: None,
        }
    }

    pub fn with_log_repo(mut self, repo: NotificationLogRepository) -> Self {
        self.log_repo = Some(repo);
        self
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Cooldown check-and-record. Returns false while the key is cooling.
    fn should_send(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut last_sent = self.last_sent.lock().expect("notifier lock poisoned");
        if let Some(last) = last_sent.get(key)
            && now.signed_duration_since(*last) < self.cooldown
        {
            return false;
        }
        last_sent.insert(key.to_string(), now);
        true
    }

    /// Deliver one notification to every configured endpoint. Failures are
    /// logged per endpoint and never propagate.
    pub async fn send(&self, request: NotificationRequest) {
        if !self.enabled {
            return;
        }
        if !self.should_send(&request.key, Utc::now()) {
            debug!("Notification for '{}' suppressed by cooldown", request.key);
            metrics::counter!("notifications.suppressed_total").increment(1);
            return;
        }

        let payload = json!({
            "title": request.title,
            "body": request.body,
            "notify_type": request.notify_type.as_str(),
        });

        let mut delivered = false;
        for url in &self.urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                // Raw apprise:// style schemes need an Apprise API gateway;
                // configure its HTTP endpoint instead
                debug!("Skipping non-HTTP notification endpoint {}", url);
                continue;
            }
            match self.client.post(url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    delivered = true;
                }
                Ok(response) => {
                    warn!("Notification endpoint {} returned {}", url, response.status());
                }
                Err(e) => {
                    warn!("Notification to {} failed: {}", url, e);
                }
            }
        }

        metrics::counter!("notifications.sent_total").increment(1);

        if let Some(repo) = &self.log_repo
            && let Err(e) = repo
                .insert(
                    &request.title,
                    &request.body,
                    request.notify_type.as_str(),
                    &request.key,
                    request.icao.as_deref(),
                    delivered,
                )
                .await
        {
            warn!("Failed to log notification: {}", e);
        }
    }
}

/// Background worker draining the notification queue, so slow endpoints
/// never stall the pipeline.
pub fn start_worker(
    notifier: std::sync::Arc<Notifier>,
    shutdown: CancellationToken,
) -> flume::Sender<NotificationRequest> {
    let (tx, rx) = flume::bounded::<NotificationRequest>(256);

    tokio::spawn(
        async move {
            info!("Notification worker started");
            loop {
                tokio::select! {
                    request = rx.recv_async() => {
                        match request {
                            Ok(request) => notifier.send(request).await,
                            Err(_) => break,
                        }
                    }
                    _ = shutdown.cancelled() => {
                        // Drain whatever is already queued, then stop
                        while let Ok(request) = rx.try_recv() {
                            notifier.send(request).await;
                        }
                        break;
                    }
                }
            }
            info!("Notification worker stopped");
        }
        .instrument(tracing::info_span!("notification_worker")),
    );

    tx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_type_from_priority() {
        assert_eq!(NotifyType::from_priority("critical"), NotifyType::Failure);
        assert_eq!(NotifyType::from_priority("emergency"), NotifyType::Failure);
        assert_eq!(NotifyType::from_priority("warning"), NotifyType::Warning);
        assert_eq!(NotifyType::from_priority("info"), NotifyType::Info);
        assert_eq!(NotifyType::from_priority("anything"), NotifyType::Info);
    }

    #[test]
    fn test_cooldown_per_key() {
        let notifier = Notifier::new(vec!["http://localhost:9999/notify".to_string()], 300);
        let now = Utc::now();

        assert!(notifier.should_send("safety:tcas_ra:A12345", now));
        assert!(!notifier.should_send("safety:tcas_ra:A12345", now + Duration::seconds(30)));
        // A different key is not throttled
        assert!(notifier.should_send("safety:tcas_ra:B67890", now + Duration::seconds(30)));
        // Past the cooldown the key clears
        assert!(notifier.should_send("safety:tcas_ra:A12345", now + Duration::seconds(301)));
    }

    #[test]
    fn test_disabled_without_urls() {
        let notifier = Notifier::new(Vec::new(), 300);
        assert!(!notifier.enabled());
    }
}
