//! Platform services
//!
//! In-process stand-ins for the OS alarm, notification and power services,
//! used when the app runs as a headless daemon.

pub mod alarms;
pub mod tray;
pub mod wake_lock;

pub use alarms::CronAlarmService;
pub use tray::TrayNotifier;
pub use wake_lock::ProcessWakeLock;
