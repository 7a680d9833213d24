//! Proactive notifications: the user-facing output stream.

use chrono::{DateTime, Utc};
use neuromesh_core::MessagePriority;
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::{broadcast, Mutex};

/// Rolling history bound, enforced on every append.
pub const NOTIFICATION_HISTORY_LIMIT: usize = 100;

/// One user-facing message from the runtime.
#[derive(Clone, Debug, Serialize)]
pub struct Notification {
    pub message: String,
    pub priority: MessagePriority,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// Broadcast stream plus a bounded, order-preserving history that any
/// presentation layer can replay.
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
    history: Mutex<VecDeque<Notification>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            tx,
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub async fn notify(
        &self,
        message: impl Into<String>,
        priority: MessagePriority,
        source: impl Into<String>,
    ) {
        let notification = Notification {
            message: message.into(),
            priority,
            source: source.into(),
            timestamp: Utc::now(),
        };
        let mut history = self.history.lock().await;
        history.push_back(notification.clone());
        while history.len() > NOTIFICATION_HISTORY_LIMIT {
            history.pop_front();
        }
        drop(history);
        let _ = self.tx.send(notification);
    }

    /// Notification history, oldest first.
    pub async fn history(&self) -> Vec<Notification> {
        self.history.lock().await.iter().cloned().collect()
    }
}
