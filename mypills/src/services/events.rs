//! Events crossing the boundary between the app and the OS services

use crate::services::reminders::PillActionEvent;
use crate::services::scheduler::AlarmPayload;
use serde::{Deserialize, Serialize};

/// System broadcasts after which alarm state must be rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemEvent {
    AppStarted,
    BootCompleted,
    PackageReplaced,
}

/// Everything that can wake the app up, each handled as an isolated unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WakeEvent {
    AlarmFired(AlarmPayload),
    Action(PillActionEvent),
    System { event: SystemEvent },
}

/// In-process signal so a live UI can refresh without re-reading storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PillEvent {
    Taken { pill_id: i64 },
    Snoozed { pill_id: i64 },
}
