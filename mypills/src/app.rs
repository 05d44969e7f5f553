//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.
//! Wake events from the alarm service, notification actions and system
//! broadcasts all end up in `AppState::handle_wake_event`.

use crate::clock::{Clock, SystemClock};
use crate::config;
use crate::controller::PillController;
use crate::error::Result;
use crate::platform::{CronAlarmService, ProcessWakeLock, TrayNotifier};
use crate::services::{
    ActionReceiver, AlarmPayload, AlarmScheduler, AlarmService, AlarmSlot, NotificationPresenter,
    Notifier, PillEvent, ReminderSettings, ReminderStateMachine, ScheduleReport, SettingsService,
    SystemEvent, WakeEvent, WakeLock,
};
use crate::storage::{FileStore, KeyValueStore, ReminderStore};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Capacity of the in-process pill event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// External services the app runs against
pub struct Platform {
    pub kv: Arc<dyn KeyValueStore>,
    pub alarms: Arc<dyn AlarmService>,
    pub notifier: Arc<dyn Notifier>,
    pub wake_lock: Arc<dyn WakeLock>,
    pub clock: Arc<dyn Clock>,
}

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub store: ReminderStore,
    pub scheduler: AlarmScheduler,
    pub presenter: Arc<NotificationPresenter>,
    pub state_machine: Arc<ReminderStateMachine>,
    pub actions: ActionReceiver,
    pub controller: Arc<PillController>,
    pub settings_service: SettingsService,
    pub events: broadcast::Sender<PillEvent>,
}

impl AppState {
    pub fn new(app_data_dir: PathBuf, platform: Platform, settings: ReminderSettings) -> Self {
        let store = ReminderStore::new(platform.kv);
        let scheduler = AlarmScheduler::new(platform.alarms, platform.clock);
        let presenter = Arc::new(NotificationPresenter::new(
            platform.notifier,
            platform.wake_lock,
            settings.clone(),
        ));
        let state_machine = Arc::new(ReminderStateMachine::new(
            store.clone(),
            scheduler.clone(),
            settings.snooze_minutes,
        ));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let actions = ActionReceiver::new(presenter.clone(), state_machine.clone(), events.clone());
        let controller = Arc::new(PillController::new(
            store.clone(),
            scheduler.clone(),
            presenter.clone(),
            state_machine.clone(),
        ));

        Self {
            settings_service: SettingsService::new(app_data_dir.clone()),
            app_data_dir,
            store,
            scheduler,
            presenter,
            state_machine,
            actions,
            controller,
            events,
        }
    }

    /// Handle one wake event to completion. Failures are logged, never returned.
    pub async fn handle_wake_event(&self, event: WakeEvent) {
        match event {
            WakeEvent::AlarmFired(payload) => self.on_alarm_fired(payload).await,
            WakeEvent::Action(action) => {
                self.actions.handle(&action).await;
            }
            WakeEvent::System { event } => {
                tracing::info!("System event {:?}, rebuilding alarms", event);
                self.reschedule_all().await;
                if event == SystemEvent::AppStarted {
                    if let Err(e) = self.controller.refresh().await {
                        tracing::error!("Failed to load pills for display: {}", e);
                    }
                }
            }
        }
    }

    async fn on_alarm_fired(&self, payload: AlarmPayload) {
        if payload.slot == AlarmSlot::test_reminder() {
            if let Err(e) = self.presenter.present(&payload) {
                tracing::error!("Failed to show test reminder: {}", e);
            }
            return;
        }

        // Stored fields win over the payload, which may predate an edit
        let payload = match self.store.get(payload.pill_id).await {
            Ok(Some(pill)) => {
                // Re-anchor tomorrow's alarm at the local time in effect then
                self.scheduler.schedule_one(&pill).await;
                AlarmPayload::for_pill(&pill)
            }
            Ok(None) => {
                tracing::info!(
                    "Alarm fired for deleted pill {}, cancelling {}",
                    payload.pill_id,
                    payload.slot
                );
                self.scheduler.cancel(payload.slot).await;
                self.scheduler.cancel_snooze(payload.slot).await;
                return;
            }
            Err(e) => {
                tracing::warn!("Could not load pill {}, using alarm payload: {}", payload.pill_id, e);
                payload
            }
        };

        if let Err(e) = self.presenter.present(&payload) {
            tracing::error!("Failed to show reminder for pill {}: {}", payload.pill_id, e);
        }
    }

    /// Register the alarms of every stored pill again
    pub async fn reschedule_all(&self) -> ScheduleReport {
        match self.store.list().await {
            Ok(pills) => self.scheduler.schedule_all(&pills).await,
            Err(e) => {
                tracing::error!("Failed to load pills for rescheduling: {}", e);
                ScheduleReport::default()
            }
        }
    }

    /// Persist new reminder settings and apply them to running services
    pub async fn update_reminder_settings(&self, settings: ReminderSettings) -> Result<()> {
        self.settings_service.update_reminders(settings.clone()).await?;
        self.state_machine.set_snooze_minutes(settings.snooze_minutes);
        self.presenter.update_settings(settings);
        tracing::info!("Reminder settings updated");
        Ok(())
    }

    /// Dispatch wake events until every sender is gone
    pub async fn run(&self, mut wake_rx: mpsc::UnboundedReceiver<WakeEvent>) {
        while let Some(event) = wake_rx.recv().await {
            self.handle_wake_event(event).await;
        }
        tracing::info!("Wake event channel closed");
    }
}

/// Running reminder daemon backed by the in-process platform services
pub struct Daemon {
    pub state: AppState,
    pub alarms: Arc<CronAlarmService>,
    pub tray: Arc<TrayNotifier>,
    pub wake_tx: mpsc::UnboundedSender<WakeEvent>,
    wake_rx: mpsc::UnboundedReceiver<WakeEvent>,
}

impl Daemon {
    /// Handle wake events until `shutdown` completes, then stop the alarm service
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Daemon {
            state,
            alarms,
            wake_tx,
            wake_rx,
            ..
        } = self;

        alarms.start().await?;
        let listener = state
            .controller
            .clone()
            .spawn_event_listener(state.events.subscribe());

        if wake_tx
            .send(WakeEvent::System {
                event: SystemEvent::AppStarted,
            })
            .is_err()
        {
            tracing::warn!("Wake dispatcher gone before start");
        }

        tokio::select! {
            _ = state.run(wake_rx) => {}
            _ = shutdown => tracing::info!("Shutdown requested"),
        }

        listener.abort();
        alarms.shutdown().await
    }
}

/// Stored reminder settings, or the defaults when they are unreadable or out of range
async fn load_reminder_settings(service: &SettingsService) -> ReminderSettings {
    let reminders = match service.load().await {
        Ok(settings) => settings.reminders,
        Err(e) => {
            tracing::warn!("Using default reminder settings: {}", e);
            return ReminderSettings::default();
        }
    };

    match reminders.validate() {
        Ok(()) => reminders,
        Err(e) => {
            tracing::warn!("Ignoring stored reminder settings: {}", e);
            ReminderSettings::default()
        }
    }
}

/// Application setup - called once on startup
pub async fn setup(app_data_dir: PathBuf) -> Result<Daemon> {
    tracing::info!("Initializing application");
    tracing::info!("App data directory: {:?}", app_data_dir);

    // Create necessary directories
    tokio::fs::create_dir_all(&app_data_dir).await?;

    let settings = load_reminder_settings(&SettingsService::new(app_data_dir.clone())).await;

    let (wake_tx, wake_rx) = mpsc::unbounded_channel();
    let alarms = Arc::new(CronAlarmService::new(wake_tx.clone()).await?);
    let tray = Arc::new(TrayNotifier::new());

    let platform = Platform {
        kv: Arc::new(FileStore::new(app_data_dir.join(config::PREFERENCES_FILE))),
        alarms: alarms.clone(),
        notifier: tray.clone(),
        wake_lock: Arc::new(ProcessWakeLock::new()),
        clock: Arc::new(SystemClock),
    };

    let state = AppState::new(app_data_dir, platform, settings);

    tracing::info!("Application initialized successfully");

    Ok(Daemon {
        state,
        alarms,
        tray,
        wake_tx,
        wake_rx,
    })
}
