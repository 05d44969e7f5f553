//! Reminder state machine
//!
//! Per pill and day: `Pending -> Taken` on an explicit take, `Taken ->
//! Pending` on an explicit untake, and `Pending -> Snoozed -> Pending` when a
//! snooze moves the next wake up. Snoozing only touches the alarm service;
//! the persisted record changes on take/untake alone, and no transition
//! deletes or recreates a pill.

use crate::error::Result;
use crate::services::scheduler::{AlarmPayload, AlarmScheduler};
use crate::storage::{Pill, ReminderStore};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// What the user did with a reminder notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PillAction {
    Take,
    Snooze,
    /// Swiped away without choosing
    Dismiss,
}

impl PillAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PillAction::Take => "take",
            PillAction::Snooze => "snooze",
            PillAction::Dismiss => "dismiss",
        }
    }
}

impl std::str::FromStr for PillAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "take" => Ok(PillAction::Take),
            "snooze" => Ok(PillAction::Snooze),
            "dismiss" => Ok(PillAction::Dismiss),
            other => Err(format!("Unknown pill action '{}'", other)),
        }
    }
}

/// A notification action, as delivered back to the app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillActionEvent {
    pub action: PillAction,
    pub payload: AlarmPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PillState {
    Pending,
    Taken,
    Snoozed { until: DateTime<Local> },
}

impl PillState {
    pub fn of(pill: &Pill) -> Self {
        if pill.taken {
            PillState::Taken
        } else {
            PillState::Pending
        }
    }
}

pub struct ReminderStateMachine {
    store: ReminderStore,
    scheduler: AlarmScheduler,
    snooze_minutes: AtomicU32,
}

impl ReminderStateMachine {
    pub fn new(store: ReminderStore, scheduler: AlarmScheduler, snooze_minutes: u32) -> Self {
        Self {
            store,
            scheduler,
            snooze_minutes: AtomicU32::new(snooze_minutes),
        }
    }

    pub fn set_snooze_minutes(&self, minutes: u32) {
        self.snooze_minutes.store(minutes, Ordering::Relaxed);
    }

    pub fn snooze_minutes(&self) -> u32 {
        self.snooze_minutes.load(Ordering::Relaxed)
    }

    /// Current state of a pill, `None` if it no longer exists
    pub async fn state_of(&self, id: i64) -> Result<Option<PillState>> {
        Ok(self.store.get(id).await?.as_ref().map(PillState::of))
    }

    /// Pending -> Taken. `None` when the pill is gone.
    pub async fn mark_taken(&self, id: i64) -> Result<Option<Pill>> {
        let pill = self.store.set_taken(id, true).await?;
        match &pill {
            Some(p) => tracing::info!("Pill {} ({}) marked as taken", p.id, p.name),
            None => tracing::debug!("Take ignored, pill {} not found", id),
        }
        Ok(pill)
    }

    /// Taken -> Pending. `None` when the pill is gone.
    pub async fn mark_not_taken(&self, id: i64) -> Result<Option<Pill>> {
        let pill = self.store.set_taken(id, false).await?;
        match &pill {
            Some(p) => tracing::info!("Pill {} ({}) marked as not taken", p.id, p.name),
            None => tracing::debug!("Untake ignored, pill {} not found", id),
        }
        Ok(pill)
    }

    /// Snooze a stored pill. `None` when the pill is gone.
    pub async fn snooze(&self, id: i64) -> Result<Option<PillState>> {
        let Some(pill) = self.store.get(id).await? else {
            tracing::debug!("Snooze ignored, pill {} not found", id);
            return Ok(None);
        };
        Ok(Some(self.snooze_payload(&AlarmPayload::for_pill(&pill)).await))
    }

    /// Move the next wake of `payload`'s slot to now + snooze length.
    ///
    /// Works from the alarm payload alone so reminders without a stored pill
    /// (the test reminder) can be snoozed too. Falls back to `Pending` when
    /// the alarm service rejects the one-shot.
    pub async fn snooze_payload(&self, payload: &AlarmPayload) -> PillState {
        match self
            .scheduler
            .schedule_snooze(payload, self.snooze_minutes())
            .await
        {
            Some(until) => PillState::Snoozed { until },
            None => PillState::Pending,
        }
    }

    /// Apply a notification action. `None` when the pill is gone.
    pub async fn apply(&self, event: &PillActionEvent) -> Result<Option<PillState>> {
        match event.action {
            PillAction::Take => Ok(self
                .mark_taken(event.payload.pill_id)
                .await?
                .as_ref()
                .map(PillState::of)),
            PillAction::Snooze => Ok(Some(self.snooze_payload(&event.payload).await)),
            PillAction::Dismiss => self.state_of(event.payload.pill_id).await,
        }
    }
}
