//! Pill list controller
//!
//! Owns the list a UI observes. Every mutation goes to the store first and
//! then publishes the fresh list on a watch channel, so subscribers only ever
//! see persisted state. Reminder services never touch this; they broadcast
//! `PillEvent`s which the controller turns into a reload.

use crate::config;
use crate::error::Result;
use crate::services::events::PillEvent;
use crate::services::notifications::NotificationPresenter;
use crate::services::reminders::{PillState, ReminderStateMachine};
use crate::services::scheduler::{AlarmPayload, AlarmScheduler, AlarmSlot, ScheduleOutcome};
use crate::storage::{CreatePillRequest, Pill, PillSummary, ReminderStore, UpdatePillRequest};
use chrono::{DateTime, Duration, Local};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

pub struct PillController {
    store: ReminderStore,
    scheduler: AlarmScheduler,
    presenter: Arc<NotificationPresenter>,
    state_machine: Arc<ReminderStateMachine>,
    pills: watch::Sender<Vec<Pill>>,
}

impl PillController {
    pub fn new(
        store: ReminderStore,
        scheduler: AlarmScheduler,
        presenter: Arc<NotificationPresenter>,
        state_machine: Arc<ReminderStateMachine>,
    ) -> Self {
        let (pills, _) = watch::channel(Vec::new());
        Self {
            store,
            scheduler,
            presenter,
            state_machine,
            pills,
        }
    }

    /// Snapshot of the observed list
    pub fn pills(&self) -> Vec<Pill> {
        self.pills.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Pill>> {
        self.pills.subscribe()
    }

    pub fn summary(&self) -> PillSummary {
        PillSummary::from_pills(&self.pills.borrow())
    }

    /// Reload the list from storage and publish it
    pub async fn refresh(&self) -> Result<Vec<Pill>> {
        let pills = self.store.list().await?;
        self.pills.send_replace(pills.clone());
        Ok(pills)
    }

    /// Add a pill and schedule its daily reminder.
    ///
    /// An unparseable time is not an error: the pill is kept and simply
    /// has no reminder until it is edited.
    pub async fn add_pill(&self, req: CreatePillRequest) -> Result<Pill> {
        req.validate()?;

        let pill = self.store.add(req).await?;
        tracing::info!("Added pill {} ({}) at {}", pill.id, pill.name, pill.time);

        if let ScheduleOutcome::InvalidTime(e) = self.scheduler.schedule_one(&pill).await {
            tracing::warn!("Pill {} saved without a reminder: {}", pill.id, e);
        }

        self.refresh().await?;
        Ok(pill)
    }

    /// Edit a pill. Returns `None` when it no longer exists.
    pub async fn update_pill(&self, req: UpdatePillRequest) -> Result<Option<Pill>> {
        let Some(current) = self.store.get(req.id).await? else {
            tracing::debug!("Edit ignored, pill {} not found", req.id);
            return Ok(None);
        };

        let updated = req.apply_to(&current)?;
        if !self.store.update(&updated).await? {
            return Ok(None);
        }

        if req.changes_schedule() {
            match self.scheduler.schedule_one(&updated).await {
                ScheduleOutcome::Scheduled { .. } => {}
                ScheduleOutcome::InvalidTime(_) => {
                    // The old time's alarms would keep firing otherwise
                    self.scheduler.cancel(AlarmSlot::for_pill(updated.id)).await;
                }
                ScheduleOutcome::Failed(reason) => {
                    tracing::warn!("Pill {} edited but not rescheduled: {}", updated.id, reason);
                }
            }
        }

        self.refresh().await?;
        Ok(Some(updated))
    }

    /// Delete a pill along with its alarms and any reminder still on screen
    pub async fn delete_pill(&self, id: i64) -> Result<Option<Pill>> {
        let removed = self.store.remove(id).await?;

        if let Some(pill) = &removed {
            let slot = AlarmSlot::for_pill(pill.id);
            self.scheduler.cancel(slot).await;
            self.scheduler.cancel_snooze(slot).await;
            if let Err(e) = self.presenter.dismiss(slot) {
                tracing::warn!("Failed to dismiss reminder of deleted pill {}: {}", id, e);
            }
            tracing::info!("Deleted pill {} ({})", pill.id, pill.name);
        }

        self.refresh().await?;
        Ok(removed)
    }

    pub async fn mark_taken(&self, id: i64) -> Result<Option<Pill>> {
        let pill = self.state_machine.mark_taken(id).await?;
        self.refresh().await?;
        Ok(pill)
    }

    pub async fn mark_not_taken(&self, id: i64) -> Result<Option<Pill>> {
        let pill = self.state_machine.mark_not_taken(id).await?;
        self.refresh().await?;
        Ok(pill)
    }

    /// Snooze a pill from the list, clearing its reminder from the tray
    pub async fn snooze(&self, id: i64) -> Result<Option<PillState>> {
        let state = self.state_machine.snooze(id).await?;
        if state.is_some() {
            if let Err(e) = self.presenter.dismiss(AlarmSlot::for_pill(id)) {
                tracing::warn!("Failed to dismiss reminder of snoozed pill {}: {}", id, e);
            }
        }
        Ok(state)
    }

    /// Show the reminder of a random pill that has not been taken yet
    pub fn trigger_demo_notification(&self) -> Result<Option<Pill>> {
        let pending: Vec<Pill> = self.pills().into_iter().filter(|p| !p.taken).collect();

        let Some(pill) = pending.choose(&mut rand::thread_rng()).cloned() else {
            tracing::info!("No pending pills to demo");
            return Ok(None);
        };

        self.presenter.present(&AlarmPayload::for_pill(&pill))?;
        Ok(Some(pill))
    }

    pub fn send_test_notification(&self) -> Result<()> {
        self.presenter.present_test_notification()
    }

    /// Schedule the background test reminder a few seconds out
    pub async fn schedule_test_reminder(&self) -> Option<DateTime<Local>> {
        self.scheduler
            .schedule_test_reminder(Duration::seconds(config::TEST_REMINDER_DELAY_SECS))
            .await
    }

    /// Reload the list whenever a reminder action changes a pill
    pub fn spawn_event_listener(
        self: Arc<Self>,
        mut events: broadcast::Receiver<PillEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        tracing::debug!("Pill event {:?}, reloading list", event);
                        if let Err(e) = self.refresh().await {
                            tracing::error!("Failed to reload pills: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::debug!("Missed {} pill events, reloading list", missed);
                        if let Err(e) = self.refresh().await {
                            tracing::error!("Failed to reload pills: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
