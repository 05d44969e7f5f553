//! Application configuration constants
//!
//! Central location for storage keys, alarm request-code ranges,
//! notification metadata and validation boundaries.

use std::time::Duration;

// ===== Storage =====

/// Key holding the JSON array of pills in the key-value store
pub const PILLS_KEY: &str = "saved_pills";

/// File name of the key-value store inside the data directory
pub const PREFERENCES_FILE: &str = "preferences.json";

/// File name of the user settings inside the data directory
pub const SETTINGS_FILE: &str = "settings.json";

// ===== Alarm Request Codes =====
//
// A pill's slot lives in [0, ALARM_SLOT_SPACE). Each derived id space
// is shifted by a whole slot space so the ranges never overlap.

/// Number of distinct alarm slots
pub const ALARM_SLOT_SPACE: i32 = 1_000_000;

/// Slot reserved for the background test reminder
pub const TEST_REMINDER_SLOT: i32 = ALARM_SLOT_SPACE - 1;

/// Offset from a slot to the id of its reminder notification
pub const NOTIFICATION_ID_OFFSET: i32 = 1_000_000;

/// Offset from a slot to the request code of its snooze one-shot
pub const SNOOZE_REQUEST_OFFSET: i32 = 2_000_000;

/// Notification id shared by all take/snooze confirmations
pub const CONFIRMATION_NOTIFICATION_ID: i32 = 9_999;

/// Notification id used by the immediate test notification
pub const TEST_NOTIFICATION_ID: i32 = 1;

/// Standing reminders repeat every day
pub const REPEAT_INTERVAL_DAYS: u32 = 1;

// ===== Reminder Behavior =====

/// Default snooze length in minutes
pub const DEFAULT_SNOOZE_MINUTES: u32 = 10;

/// Minimum snooze length in minutes
pub const MIN_SNOOZE_MINUTES: u32 = 1;

/// Maximum snooze length in minutes (2 hours; longer belongs in a new reminder)
pub const MAX_SNOOZE_MINUTES: u32 = 120;

/// Upper bound on how long a wake lock may be held while posting a reminder
pub const WAKE_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Wake lock tag used around reminder delivery
pub const WAKE_LOCK_TAG: &str = "MyPills:PillReminder";

/// Default delay for the background test reminder
pub const TEST_REMINDER_DELAY_SECS: i64 = 10;

// ===== Notification Channel =====

pub const CHANNEL_ID: &str = "pill_reminders";
pub const CHANNEL_NAME: &str = "Pill Reminders";
pub const CHANNEL_DESCRIPTION: &str = "Notifications for pill reminders";

/// Vibration pattern in milliseconds: wait, buzz, pause, buzz
pub const VIBRATION_PATTERN_MS: &[u64] = &[0, 500, 200, 500];

/// Accent colour for reminder notifications and channel lights
pub const REMINDER_ACCENT_COLOR: &str = "#6366F1";

/// Accent colour for the "taken" confirmation
pub const TAKEN_ACCENT_COLOR: &str = "#10B981";

/// Accent colour for the "snoozed" confirmation
pub const SNOOZED_ACCENT_COLOR: &str = "#F59E0B";

// ===== Validation Limits =====

/// Maximum length of a pill name
pub const MAX_PILL_NAME_LENGTH: usize = 100;

/// Maximum length of a dosage string
pub const MAX_DOSAGE_LENGTH: usize = 50;
