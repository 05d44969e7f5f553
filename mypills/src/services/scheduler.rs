//! Alarm scheduling
//!
//! Turns pills into wake requests on the external alarm service. Every pill
//! owns a slot derived from its id; the slot addresses its standing daily
//! alarm, its snooze one-shot and its notification, so scheduling the same
//! pill again overwrites its earlier registration instead of adding one.
//!
//! Alarm state is never persisted here. It is recomputed from the pill list
//! whenever the app starts, the device boots or the package is replaced.

use crate::clock::Clock;
use crate::config;
use crate::error::Result;
use crate::services::notifications::NotificationId;
use crate::services::time_parser::{self, TimeParseError};
use crate::storage::Pill;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Scheduling identity of one pill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlarmSlot(i32);

impl AlarmSlot {
    /// Stable slot for a pill id. Independent of the pill's list position.
    pub fn for_pill(id: i64) -> Self {
        let digest = Sha256::digest(id.to_be_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        // The last slot is reserved for the test reminder
        let space = (config::ALARM_SLOT_SPACE - 1) as u64;
        Self((u64::from_be_bytes(prefix) % space) as i32)
    }

    /// Slot used by the background test reminder
    pub const fn test_reminder() -> Self {
        Self(config::TEST_REMINDER_SLOT)
    }

    pub fn value(self) -> i32 {
        self.0
    }

    /// Request code of the standing daily alarm
    pub fn standing_code(self) -> RequestCode {
        RequestCode(self.0)
    }

    /// Request code of the snooze one-shot
    pub fn snooze_code(self) -> RequestCode {
        RequestCode(self.0 + config::SNOOZE_REQUEST_OFFSET)
    }

    /// Id of the reminder notification posted for this slot
    pub fn notification_id(self) -> NotificationId {
        NotificationId(self.0 + config::NOTIFICATION_ID_OFFSET)
    }
}

impl std::fmt::Display for AlarmSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// Key of an independently schedulable and cancelable alarm registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestCode(pub i32);

impl std::fmt::Display for RequestCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Data delivered back with a fired alarm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmPayload {
    pub pill_id: i64,
    pub pill_name: String,
    pub dosage: String,
    pub slot: AlarmSlot,
}

impl AlarmPayload {
    pub fn for_pill(pill: &Pill) -> Self {
        Self {
            pill_id: pill.id,
            pill_name: pill.name.clone(),
            dosage: pill.dosage.clone(),
            slot: AlarmSlot::for_pill(pill.id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlarmKind {
    /// Fires once at the trigger instant, even in power-saving modes
    Exact,
    /// Fires at the trigger instant and then every interval
    Repeating,
}

/// One registration with the alarm service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmRequest {
    pub request_code: RequestCode,
    pub trigger_at: DateTime<Local>,
    pub exact: bool,
    pub repeat_interval_days: Option<u32>,
    pub payload: AlarmPayload,
}

impl AlarmRequest {
    pub fn exact(request_code: RequestCode, trigger_at: DateTime<Local>, payload: AlarmPayload) -> Self {
        Self {
            request_code,
            trigger_at,
            exact: true,
            repeat_interval_days: None,
            payload,
        }
    }

    pub fn daily(request_code: RequestCode, trigger_at: DateTime<Local>, payload: AlarmPayload) -> Self {
        Self {
            request_code,
            trigger_at,
            exact: false,
            repeat_interval_days: Some(config::REPEAT_INTERVAL_DAYS),
            payload,
        }
    }

    pub fn kind(&self) -> AlarmKind {
        if self.repeat_interval_days.is_some() {
            AlarmKind::Repeating
        } else {
            AlarmKind::Exact
        }
    }
}

/// External alarm service.
///
/// A registration is identified by its request code and kind: registering the
/// same pair again replaces the earlier one. Cancelling a request code drops
/// every kind registered under it.
#[async_trait]
pub trait AlarmService: Send + Sync {
    async fn register(&self, request: AlarmRequest) -> Result<()>;

    async fn cancel(&self, request_code: RequestCode) -> Result<()>;
}

/// Result of scheduling a single pill
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled { at: DateTime<Local> },
    InvalidTime(TimeParseError),
    Failed(String),
}

/// Totals from a full reschedule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub scheduled: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Registers and cancels pill alarms. Failures are logged, never returned.
#[derive(Clone)]
pub struct AlarmScheduler {
    alarms: Arc<dyn AlarmService>,
    clock: Arc<dyn Clock>,
}

impl AlarmScheduler {
    pub fn new(alarms: Arc<dyn AlarmService>, clock: Arc<dyn Clock>) -> Self {
        Self { alarms, clock }
    }

    /// Register every pill's daily reminder. Safe to call any number of times.
    pub async fn schedule_all(&self, pills: &[Pill]) -> ScheduleReport {
        let mut report = ScheduleReport::default();

        for pill in pills {
            match self.schedule_one(pill).await {
                ScheduleOutcome::Scheduled { .. } => report.scheduled += 1,
                ScheduleOutcome::InvalidTime(_) => report.skipped += 1,
                ScheduleOutcome::Failed(_) => report.failed += 1,
            }
        }

        tracing::info!(
            "Rescheduled {} pills: {} scheduled, {} skipped, {} failed",
            pills.len(),
            report.scheduled,
            report.skipped,
            report.failed
        );
        report
    }

    /// Register the exact and daily-repeating alarms for one pill
    pub async fn schedule_one(&self, pill: &Pill) -> ScheduleOutcome {
        let now = self.clock.now();
        let trigger_at = match time_parser::parse(&pill.time, &now) {
            Ok(at) => at,
            Err(e) => {
                tracing::warn!("Not scheduling pill {} ({}): {}", pill.id, pill.name, e);
                return ScheduleOutcome::InvalidTime(e);
            }
        };

        let payload = AlarmPayload::for_pill(pill);
        let code = payload.slot.standing_code();

        let mut failures = Vec::new();
        for request in [
            AlarmRequest::exact(code, trigger_at, payload.clone()),
            AlarmRequest::daily(code, trigger_at, payload.clone()),
        ] {
            let kind = request.kind();
            if let Err(e) = self.alarms.register(request).await {
                tracing::error!("Failed to register {:?} alarm for pill {}: {}", kind, pill.id, e);
                failures.push(e.to_string());
            }
        }

        if !failures.is_empty() {
            return ScheduleOutcome::Failed(failures.join("; "));
        }

        tracing::debug!(
            "Scheduled pill {} ({}) at {} under code {}",
            pill.id,
            pill.name,
            trigger_at,
            code
        );
        ScheduleOutcome::Scheduled { at: trigger_at }
    }

    /// Drop the standing exact and repeating alarms of a slot
    pub async fn cancel(&self, slot: AlarmSlot) -> bool {
        self.cancel_code(slot.standing_code()).await
    }

    /// Drop a pending snooze one-shot of a slot
    pub async fn cancel_snooze(&self, slot: AlarmSlot) -> bool {
        self.cancel_code(slot.snooze_code()).await
    }

    /// Register a one-shot exact alarm `minutes` from now under the slot's snooze code
    pub async fn schedule_snooze(&self, payload: &AlarmPayload, minutes: u32) -> Option<DateTime<Local>> {
        let at = self.clock.now() + Duration::minutes(i64::from(minutes));
        let code = payload.slot.snooze_code();

        self.cancel_code(code).await;

        match self
            .alarms
            .register(AlarmRequest::exact(code, at, payload.clone()))
            .await
        {
            Ok(()) => {
                tracing::info!("Snoozed pill {} until {}", payload.pill_id, at);
                Some(at)
            }
            Err(e) => {
                tracing::error!("Failed to schedule snooze for pill {}: {}", payload.pill_id, e);
                None
            }
        }
    }

    /// One-shot reminder on the reserved test slot, used to check background delivery
    pub async fn schedule_test_reminder(&self, delay: Duration) -> Option<DateTime<Local>> {
        let at = self.clock.now() + delay;
        let slot = AlarmSlot::test_reminder();
        let payload = AlarmPayload {
            pill_id: 0,
            pill_name: "Test Background Pill".to_string(),
            dosage: "1 tablet".to_string(),
            slot,
        };

        match self
            .alarms
            .register(AlarmRequest::exact(slot.standing_code(), at, payload))
            .await
        {
            Ok(()) => {
                tracing::info!("Test reminder scheduled for {}", at);
                Some(at)
            }
            Err(e) => {
                tracing::error!("Failed to schedule test reminder: {}", e);
                None
            }
        }
    }

    async fn cancel_code(&self, code: RequestCode) -> bool {
        match self.alarms.cancel(code).await {
            Ok(()) => {
                tracing::debug!("Cancelled alarms under code {}", code);
                true
            }
            Err(e) => {
                tracing::error!("Failed to cancel alarms under code {}: {}", code, e);
                false
            }
        }
    }
}
