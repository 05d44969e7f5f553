//! Notification action receiver
//!
//! Runs when the user taps Take or Snooze on a reminder (or swipes it away).
//! Each step is best-effort: a failure is logged and the remaining steps
//! still run, so the worst outcome is a missing confirmation.

use crate::services::events::PillEvent;
use crate::services::notifications::{ConfirmationKind, NotificationPresenter};
use crate::services::reminders::{PillAction, PillActionEvent, PillState, ReminderStateMachine};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct ActionReceiver {
    presenter: Arc<NotificationPresenter>,
    state_machine: Arc<ReminderStateMachine>,
    events: broadcast::Sender<PillEvent>,
}

impl ActionReceiver {
    pub fn new(
        presenter: Arc<NotificationPresenter>,
        state_machine: Arc<ReminderStateMachine>,
        events: broadcast::Sender<PillEvent>,
    ) -> Self {
        Self {
            presenter,
            state_machine,
            events,
        }
    }

    /// Handle one action. Returns the pill's resulting state when known.
    pub async fn handle(&self, event: &PillActionEvent) -> Option<PillState> {
        let payload = &event.payload;
        tracing::info!(
            "Notification action {} for pill {} ({})",
            event.action.as_str(),
            payload.pill_id,
            payload.slot
        );

        if let Err(e) = self.presenter.dismiss(payload.slot) {
            tracing::warn!("Failed to cancel reminder notification for {}: {}", payload.slot, e);
        }

        match event.action {
            PillAction::Take => self.take(event).await,
            PillAction::Snooze => self.snooze(event).await,
            PillAction::Dismiss => match self.state_machine.apply(event).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("Failed to read pill {} after dismiss: {}", payload.pill_id, e);
                    None
                }
            },
        }
    }

    async fn take(&self, event: &PillActionEvent) -> Option<PillState> {
        let payload = &event.payload;

        let state = match self.state_machine.apply(event).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!("Failed to mark pill {} as taken: {}", payload.pill_id, e);
                return None;
            }
        };

        if state.is_none() {
            tracing::info!("Take for unknown pill {} ignored", payload.pill_id);
            return None;
        }

        if let Err(e) = self
            .presenter
            .present_confirmation(&payload.pill_name, ConfirmationKind::Taken)
        {
            tracing::warn!("Failed to show taken confirmation: {}", e);
        }

        // No receivers just means no UI is running
        let _ = self.events.send(PillEvent::Taken {
            pill_id: payload.pill_id,
        });

        state
    }

    async fn snooze(&self, event: &PillActionEvent) -> Option<PillState> {
        let payload = &event.payload;

        let state = self.state_machine.snooze_payload(payload).await;
        if !matches!(state, PillState::Snoozed { .. }) {
            return Some(state);
        }

        if let Err(e) = self
            .presenter
            .present_confirmation(&payload.pill_name, ConfirmationKind::Snoozed)
        {
            tracing::warn!("Failed to show snooze confirmation: {}", e);
        }

        let _ = self.events.send(PillEvent::Snoozed {
            pill_id: payload.pill_id,
        });

        Some(state)
    }
}
