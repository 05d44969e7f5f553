//! In-process notification tray
//!
//! Keeps the live notifications of a headless run and writes each post to the
//! log. Posting an id that is already live replaces it.

use crate::error::Result;
use crate::services::notifications::{Notification, NotificationChannel, NotificationId, Notifier};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct TrayNotifier {
    live: Mutex<BTreeMap<NotificationId, Notification>>,
    channels: Mutex<BTreeMap<String, NotificationChannel>>,
}

impl TrayNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications currently shown, ordered by id
    pub fn active(&self) -> Vec<Notification> {
        lock(&self.live).values().cloned().collect()
    }

    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        lock(&self.live).get(&id).cloned()
    }

    pub fn channel(&self, id: &str) -> Option<NotificationChannel> {
        lock(&self.channels).get(id).cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Notifier for TrayNotifier {
    fn ensure_channel(&self, channel: &NotificationChannel) -> Result<()> {
        let mut channels = lock(&self.channels);
        if channels.get(&channel.id) != Some(channel) {
            tracing::debug!("Notification channel '{}' registered", channel.id);
            channels.insert(channel.id.clone(), channel.clone());
        }
        Ok(())
    }

    fn post(&self, notification: Notification) -> Result<()> {
        let actions: Vec<&str> = notification.actions.iter().map(|a| a.label.as_str()).collect();
        tracing::info!(
            "[notification {}] {} - {} {:?}",
            notification.id,
            notification.title,
            notification.body,
            actions
        );

        if lock(&self.live).insert(notification.id, notification).is_some() {
            tracing::debug!("Replaced an existing notification");
        }
        Ok(())
    }

    fn cancel(&self, id: NotificationId) -> Result<()> {
        if lock(&self.live).remove(&id).is_some() {
            tracing::debug!("Notification {} cancelled", id);
        }
        Ok(())
    }
}
