//! Notification presenter
//!
//! Builds the actionable reminder notification when an alarm fires, and the
//! short confirmation shown after the user taps Take or Snooze. Each slot
//! maps to one notification id, so a re-fired reminder replaces the one
//! already in the tray.

use crate::config;
use crate::error::{AppError, Result};
use crate::services::reminders::PillAction;
use crate::services::scheduler::{AlarmPayload, AlarmSlot};
use crate::services::settings::ReminderSettings;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Tray identity of a posted notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NotificationId(pub i32);

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Importance {
    Default,
    High,
}

/// Channel metadata, registered before every post
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub description: String,
    pub importance: Importance,
    pub vibration_pattern: Option<Vec<u64>>,
    pub lights_color: String,
    pub show_badge: bool,
    pub public_on_lockscreen: bool,
}

/// A button on a reminder notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub action: PillAction,
    pub label: String,
    pub payload: AlarmPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub channel_id: String,
    pub title: String,
    pub body: String,
    pub big_text: Option<String>,
    pub actions: Vec<NotificationAction>,
    pub importance: Importance,
    pub accent_color: String,
    pub vibration_pattern: Option<Vec<u64>>,
    pub auto_cancel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfirmationKind {
    Taken,
    Snoozed,
}

/// External notification service
pub trait Notifier: Send + Sync {
    /// Create or update a channel; repeating this is harmless
    fn ensure_channel(&self, channel: &NotificationChannel) -> Result<()>;

    /// Show a notification, replacing any live one with the same id
    fn post(&self, notification: Notification) -> Result<()>;

    /// Remove a notification; unknown ids are ignored
    fn cancel(&self, id: NotificationId) -> Result<()>;
}

/// Keeps the device awake. Acquisitions time out on their own after `timeout`.
pub trait WakeLock: Send + Sync {
    fn acquire(&self, tag: &str, timeout: Duration) -> Result<()>;

    fn release(&self, tag: &str);
}

/// Held wake lock, released when dropped
pub struct WakeGuard<'a> {
    lock: &'a dyn WakeLock,
    tag: &'a str,
}

impl<'a> WakeGuard<'a> {
    pub fn acquire(lock: &'a dyn WakeLock, tag: &'a str, timeout: Duration) -> Result<Self> {
        lock.acquire(tag, timeout)?;
        Ok(Self { lock, tag })
    }
}

impl Drop for WakeGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(self.tag);
    }
}

pub struct NotificationPresenter {
    notifier: Arc<dyn Notifier>,
    wake_lock: Arc<dyn WakeLock>,
    settings: RwLock<ReminderSettings>,
}

impl NotificationPresenter {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        wake_lock: Arc<dyn WakeLock>,
        settings: ReminderSettings,
    ) -> Self {
        Self {
            notifier,
            wake_lock,
            settings: RwLock::new(settings),
        }
    }

    pub fn update_settings(&self, settings: ReminderSettings) {
        match self.settings.write() {
            Ok(mut current) => *current = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
    }

    fn settings(&self) -> ReminderSettings {
        match self.settings.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Post the reminder for a fired alarm, keeping the device awake meanwhile
    pub fn present(&self, payload: &AlarmPayload) -> Result<NotificationId> {
        let _guard = match WakeGuard::acquire(
            self.wake_lock.as_ref(),
            config::WAKE_LOCK_TAG,
            config::WAKE_LOCK_TIMEOUT,
        ) {
            Ok(guard) => Some(guard),
            Err(e) => {
                tracing::warn!("Posting reminder without wake lock: {}", e);
                None
            }
        };

        let settings = self.settings();
        self.notifier.ensure_channel(&reminder_channel(&settings))?;

        let notification = build_reminder(payload, &settings);
        let id = notification.id;
        self.notifier.post(notification)?;

        tracing::info!("Reminder posted for {} ({}) as {}", payload.pill_name, payload.slot, id);
        Ok(id)
    }

    /// Remove the reminder notification of a slot
    pub fn dismiss(&self, slot: AlarmSlot) -> Result<()> {
        self.notifier.cancel(slot.notification_id())
    }

    /// Short-lived confirmation after an action; never collides with reminder ids
    pub fn present_confirmation(&self, pill_name: &str, kind: ConfirmationKind) -> Result<()> {
        let settings = self.settings();
        if !settings.confirmations_enabled {
            return Ok(());
        }

        self.notifier.ensure_channel(&reminder_channel(&settings))?;

        let (title, body, accent) = match kind {
            ConfirmationKind::Taken => (
                "✅ Pill Taken!".to_string(),
                format!("{} marked as taken", pill_name),
                config::TAKEN_ACCENT_COLOR,
            ),
            ConfirmationKind::Snoozed => (
                "⏰ Pill Snoozed".to_string(),
                format!("{} reminder in {} minutes", pill_name, settings.snooze_minutes),
                config::SNOOZED_ACCENT_COLOR,
            ),
        };

        self.notifier.post(Notification {
            id: NotificationId(config::CONFIRMATION_NOTIFICATION_ID),
            channel_id: config::CHANNEL_ID.to_string(),
            title,
            body,
            big_text: None,
            actions: Vec::new(),
            importance: Importance::Default,
            accent_color: accent.to_string(),
            vibration_pattern: None,
            auto_cancel: true,
        })
    }

    /// Immediate notification to check that the tray works at all
    pub fn present_test_notification(&self) -> Result<()> {
        let settings = self.settings();
        self.notifier.ensure_channel(&reminder_channel(&settings))?;

        self.notifier
            .post(Notification {
                id: NotificationId(config::TEST_NOTIFICATION_ID),
                channel_id: config::CHANNEL_ID.to_string(),
                title: "💊 My Pills - Test Notification".to_string(),
                body: "This is a test notification from your pill reminder app!".to_string(),
                big_text: Some(
                    "If you can see this, notifications are working correctly. \
                     Future pill reminders will appear like this."
                        .to_string(),
                ),
                actions: Vec::new(),
                importance: Importance::Default,
                accent_color: config::REMINDER_ACCENT_COLOR.to_string(),
                vibration_pattern: None,
                auto_cancel: true,
            })
            .map_err(|e| AppError::Notification(format!("Test notification failed: {}", e)))
    }
}

fn reminder_channel(settings: &ReminderSettings) -> NotificationChannel {
    NotificationChannel {
        id: config::CHANNEL_ID.to_string(),
        name: config::CHANNEL_NAME.to_string(),
        description: config::CHANNEL_DESCRIPTION.to_string(),
        importance: Importance::High,
        vibration_pattern: settings
            .vibration_enabled
            .then(|| config::VIBRATION_PATTERN_MS.to_vec()),
        lights_color: config::REMINDER_ACCENT_COLOR.to_string(),
        show_badge: settings.show_badge,
        public_on_lockscreen: true,
    }
}

fn build_reminder(payload: &AlarmPayload, settings: &ReminderSettings) -> Notification {
    let snooze_label = format!("⏰ Snooze {}m", settings.snooze_minutes);

    Notification {
        id: payload.slot.notification_id(),
        channel_id: config::CHANNEL_ID.to_string(),
        title: format!("💊 Time for {}", payload.pill_name),
        body: format!("Take {} now", payload.dosage),
        big_text: Some(format!(
            "It's time to take your {} ({}). Tap 'Take' to mark as taken or 'Snooze' to remind later.",
            payload.pill_name, payload.dosage
        )),
        actions: vec![
            NotificationAction {
                action: PillAction::Take,
                label: "✓ Take".to_string(),
                payload: payload.clone(),
            },
            NotificationAction {
                action: PillAction::Snooze,
                label: snooze_label,
                payload: payload.clone(),
            },
        ],
        importance: Importance::High,
        accent_color: config::REMINDER_ACCENT_COLOR.to_string(),
        vibration_pattern: settings
            .vibration_enabled
            .then(|| config::VIBRATION_PATTERN_MS.to_vec()),
        auto_cancel: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTray {
        live: Mutex<BTreeMap<NotificationId, Notification>>,
        channels: Mutex<usize>,
        fail_post: bool,
    }

    impl Notifier for FakeTray {
        fn ensure_channel(&self, _channel: &NotificationChannel) -> Result<()> {
            *self.channels.lock().unwrap() += 1;
            Ok(())
        }

        fn post(&self, notification: Notification) -> Result<()> {
            if self.fail_post {
                return Err(AppError::Notification("tray unavailable".to_string()));
            }
            self.live.lock().unwrap().insert(notification.id, notification);
            Ok(())
        }

        fn cancel(&self, id: NotificationId) -> Result<()> {
            self.live.lock().unwrap().remove(&id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingWakeLock {
        held: Mutex<i32>,
        acquired: Mutex<Vec<Duration>>,
    }

    impl WakeLock for CountingWakeLock {
        fn acquire(&self, _tag: &str, timeout: Duration) -> Result<()> {
            *self.held.lock().unwrap() += 1;
            self.acquired.lock().unwrap().push(timeout);
            Ok(())
        }

        fn release(&self, _tag: &str) {
            *self.held.lock().unwrap() -= 1;
        }
    }

    fn payload() -> AlarmPayload {
        AlarmPayload {
            pill_id: 11,
            pill_name: "Vitamin D".to_string(),
            dosage: "1000 IU".to_string(),
            slot: AlarmSlot::for_pill(11),
        }
    }

    fn create_test_presenter(
        tray: Arc<FakeTray>,
        lock: Arc<CountingWakeLock>,
    ) -> NotificationPresenter {
        NotificationPresenter::new(tray, lock, ReminderSettings::default())
    }

    #[test]
    fn test_present_posts_actionable_reminder() {
        let tray = Arc::new(FakeTray::default());
        let lock = Arc::new(CountingWakeLock::default());
        let presenter = create_test_presenter(tray.clone(), lock.clone());

        let id = presenter.present(&payload()).unwrap();
        assert_eq!(id, payload().slot.notification_id());

        let live = tray.live.lock().unwrap();
        let notification = &live[&id];
        assert_eq!(notification.title, "💊 Time for Vitamin D");
        assert_eq!(notification.body, "Take 1000 IU now");
        assert_eq!(notification.importance, Importance::High);
        assert_eq!(notification.vibration_pattern.as_deref(), Some(config::VIBRATION_PATTERN_MS));

        let actions: Vec<(PillAction, &str)> = notification
            .actions
            .iter()
            .map(|a| (a.action, a.label.as_str()))
            .collect();
        assert_eq!(
            actions,
            vec![(PillAction::Take, "✓ Take"), (PillAction::Snooze, "⏰ Snooze 10m")]
        );
        assert!(notification.actions.iter().all(|a| a.payload == payload()));
    }

    #[test]
    fn test_refire_replaces_instead_of_stacking() {
        let tray = Arc::new(FakeTray::default());
        let presenter = create_test_presenter(tray.clone(), Arc::new(CountingWakeLock::default()));

        presenter.present(&payload()).unwrap();
        presenter.present(&payload()).unwrap();

        assert_eq!(tray.live.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_wake_lock_released_on_success_and_failure() {
        let lock = Arc::new(CountingWakeLock::default());

        let ok = create_test_presenter(Arc::new(FakeTray::default()), lock.clone());
        ok.present(&payload()).unwrap();
        assert_eq!(*lock.held.lock().unwrap(), 0);

        let failing_tray = Arc::new(FakeTray {
            fail_post: true,
            ..Default::default()
        });
        let failing = create_test_presenter(failing_tray, lock.clone());
        assert!(failing.present(&payload()).is_err());
        assert_eq!(*lock.held.lock().unwrap(), 0);

        let timeouts = lock.acquired.lock().unwrap();
        assert_eq!(timeouts.len(), 2);
        assert!(timeouts.iter().all(|t| *t <= config::WAKE_LOCK_TIMEOUT));
    }

    #[test]
    fn test_dismiss_removes_reminder() {
        let tray = Arc::new(FakeTray::default());
        let presenter = create_test_presenter(tray.clone(), Arc::new(CountingWakeLock::default()));

        presenter.present(&payload()).unwrap();
        presenter.dismiss(payload().slot).unwrap();
        assert!(tray.live.lock().unwrap().is_empty());
    }

    #[test]
    fn test_confirmation_uses_sentinel_id() {
        let tray = Arc::new(FakeTray::default());
        let presenter = create_test_presenter(tray.clone(), Arc::new(CountingWakeLock::default()));

        presenter.present(&payload()).unwrap();
        presenter
            .present_confirmation("Vitamin D", ConfirmationKind::Snoozed)
            .unwrap();

        let live = tray.live.lock().unwrap();
        assert_eq!(live.len(), 2);
        let confirmation = &live[&NotificationId(config::CONFIRMATION_NOTIFICATION_ID)];
        assert_eq!(confirmation.title, "⏰ Pill Snoozed");
        assert_eq!(confirmation.body, "Vitamin D reminder in 10 minutes");
        assert!(confirmation.actions.is_empty());
    }

    #[test]
    fn test_settings_shape_notifications() {
        let tray = Arc::new(FakeTray::default());
        let presenter = create_test_presenter(tray.clone(), Arc::new(CountingWakeLock::default()));
        presenter.update_settings(ReminderSettings {
            snooze_minutes: 15,
            vibration_enabled: false,
            confirmations_enabled: false,
            ..ReminderSettings::default()
        });

        let id = presenter.present(&payload()).unwrap();
        presenter
            .present_confirmation("Vitamin D", ConfirmationKind::Taken)
            .unwrap();

        let live = tray.live.lock().unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[&id].vibration_pattern, None);
        assert_eq!(live[&id].actions[1].label, "⏰ Snooze 15m");
    }
}
