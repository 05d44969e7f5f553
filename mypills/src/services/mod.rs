//! Services module
//!
//! Reminder logic that sits between the pill store and the OS alarm and
//! notification services.

pub mod actions;
pub mod events;
pub mod notifications;
pub mod reminders;
pub mod scheduler;
pub mod settings;
pub mod time_parser;

pub use actions::ActionReceiver;
pub use events::{PillEvent, SystemEvent, WakeEvent};
pub use notifications::{
    ConfirmationKind, Notification, NotificationAction, NotificationChannel, NotificationId,
    NotificationPresenter, Notifier, WakeGuard, WakeLock,
};
pub use reminders::{PillAction, PillActionEvent, PillState, ReminderStateMachine};
pub use scheduler::{
    AlarmKind, AlarmPayload, AlarmRequest, AlarmScheduler, AlarmService, AlarmSlot, RequestCode,
    ScheduleOutcome, ScheduleReport,
};
pub use settings::{AppSettings, ReminderSettings, SettingsService};
