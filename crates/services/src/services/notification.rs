//! Non-blocking toast surface. Notifications are logged and kept in memory
//! for the presentation layer to drain.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tokio::sync::RwLock;
use tracing::{info, warn};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct NotificationService {
    inner: Arc<RwLock<Vec<Notification>>>,
}

impl NotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notify(&self, title: &str, message: &str) {
        info!(title, message, "notification");
        self.push(NotificationLevel::Info, title, message).await;
    }

    pub async fn warn(&self, title: &str, message: &str) {
        warn!(title, message, "notification");
        self.push(NotificationLevel::Warning, title, message).await;
    }

    async fn push(&self, level: NotificationLevel, title: &str, message: &str) {
        self.inner.write().await.push(Notification {
            level,
            title: title.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
        });
    }

    pub async fn recent(&self) -> Vec<Notification> {
        self.inner.read().await.clone()
    }

    /// Hand the queued notifications to the caller and clear the queue.
    pub async fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.inner.write().await)
    }
}
