//! User-visible notifications
//!
//! Outcomes of user-triggered operations, queued for the presentation layer
//! to show and drain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::Mutex;
use uuid::Uuid;

const MAX_PENDING: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub level: NotificationLevel,
    /// Error kind for failures, e.g. "entitlement"
    pub kind: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

pub struct NotificationCenter {
    pending: Mutex<VecDeque<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn push(&self, level: NotificationLevel, kind: Option<&str>, message: impl Into<String>) {
        let mut pending = self.pending.lock().await;
        if pending.len() == MAX_PENDING {
            pending.pop_front();
        }
        pending.push_back(Notification {
            id: Uuid::new_v4(),
            level,
            kind: kind.map(str::to_string),
            message: message.into(),
            created_at: Utc::now(),
        });
    }

    /// Take everything queued so far, oldest first
    pub async fn drain(&self) -> Vec<Notification> {
        self.pending.lock().await.drain(..).collect()
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}
