//! Nullable notification sink: record notifications instead of sending them.

use crate::lock;
use async_trait::async_trait;
use chama_groups::{Notification, NotificationSink, NotifyError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct NullNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl NullNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent delivery fail (after recording it).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All notifications handed to the sink, in order.
    pub fn sent(&self) -> Vec<Notification> {
        lock(&self.sent).clone()
    }

    /// Titles of all notifications, in order.
    pub fn titles(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|n| n.title.clone()).collect()
    }
}

#[async_trait]
impl NotificationSink for NullNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        lock(&self.sent).push(notification.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Unreachable("null notifier set to fail".into()));
        }
        Ok(())
    }
}
