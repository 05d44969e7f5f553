//! In-process alarm service
//!
//! Backs `AlarmService` with tokio-cron-scheduler jobs. Exact requests become
//! one-shot jobs, daily requests become cron jobs anchored at the trigger
//! time. A fired job sends `WakeEvent::AlarmFired` to the wake dispatcher.
//!
//! Jobs live only as long as the process, like OS alarms that are lost on
//! reboot; the app rebuilds them from the pill list on start.

use crate::config;
use crate::error::{AppError, Result};
use crate::services::events::WakeEvent;
use crate::services::scheduler::{AlarmKind, AlarmPayload, AlarmRequest, AlarmService, RequestCode};
use async_trait::async_trait;
use chrono::{DateTime, Local, Timelike, Utc};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

struct Registration {
    job_id: Uuid,
    request: AlarmRequest,
}

pub struct CronAlarmService {
    scheduler: Arc<RwLock<JobScheduler>>,
    registrations: Mutex<BTreeMap<(RequestCode, AlarmKind), Registration>>,
    wake_tx: mpsc::UnboundedSender<WakeEvent>,
}

impl CronAlarmService {
    /// Create the service; fired alarms are delivered on `wake_tx`
    pub async fn new(wake_tx: mpsc::UnboundedSender<WakeEvent>) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduling(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            registrations: Mutex::new(BTreeMap::new()),
            wake_tx,
        })
    }

    /// Start delivering alarms
    pub async fn start(&self) -> Result<()> {
        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduling(format!("Failed to start scheduler: {}", e)))?;
        tracing::info!("Alarm service started");
        Ok(())
    }

    /// Shutdown scheduler gracefully
    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Scheduling(format!("Failed to shutdown scheduler: {}", e)))?;
        tracing::info!("Alarm service shutdown");
        Ok(())
    }

    /// Requests currently registered, ordered by request code
    pub async fn registrations(&self) -> Vec<AlarmRequest> {
        self.registrations
            .lock()
            .await
            .values()
            .map(|r| r.request.clone())
            .collect()
    }

    fn build_job(&self, request: &AlarmRequest) -> Result<Job> {
        let tx = self.wake_tx.clone();
        let payload = request.payload.clone();
        let code = request.request_code;

        let job = match request.repeat_interval_days {
            None => {
                let delay = (request.trigger_at - Local::now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);
                Job::new_one_shot_async(delay, move |_uuid, _l| {
                    alarm_fired(tx.clone(), payload.clone(), code)
                })
            }
            Some(days) if days == config::REPEAT_INTERVAL_DAYS => {
                Job::new_async(daily_cron(&request.trigger_at), move |_uuid, _l| {
                    alarm_fired(tx.clone(), payload.clone(), code)
                })
            }
            Some(days) => {
                return Err(AppError::Scheduling(format!(
                    "Alarm {} repeats every {} days, only daily repeats are supported",
                    code, days
                )))
            }
        };
        job.map_err(|e| AppError::Scheduling(format!("Failed to create alarm job {}: {}", code, e)))
    }
}

fn alarm_fired(
    tx: mpsc::UnboundedSender<WakeEvent>,
    payload: AlarmPayload,
    code: RequestCode,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        tracing::debug!("Alarm {} fired for pill {}", code, payload.pill_id);
        if tx.send(WakeEvent::AlarmFired(payload)).is_err() {
            tracing::warn!("Alarm {} fired with no wake dispatcher running", code);
        }
    })
}

/// Cron expression (with seconds, UTC) firing daily at `trigger_at`'s time of day.
///
/// The UTC offset is the one in effect at `trigger_at`. Across a DST change
/// the job drifts by the offset difference, so the app re-registers a pill's
/// daily alarm every time it fires.
pub fn daily_cron(trigger_at: &DateTime<Local>) -> String {
    let utc = trigger_at.with_timezone(&Utc);
    format!("{} {} {} * * *", utc.second(), utc.minute(), utc.hour())
}

#[async_trait]
impl AlarmService for CronAlarmService {
    async fn register(&self, request: AlarmRequest) -> Result<()> {
        let key = (request.request_code, request.kind());
        let job = self.build_job(&request)?;

        let mut registrations = self.registrations.lock().await;
        let scheduler = self.scheduler.read().await;

        if let Some(previous) = registrations.remove(&key) {
            scheduler.remove(&previous.job_id).await.map_err(|e| {
                AppError::Scheduling(format!("Failed to replace alarm {}: {}", request.request_code, e))
            })?;
        }

        let job_id = scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Scheduling(format!("Failed to add alarm {}: {}", request.request_code, e)))?;

        tracing::debug!(
            "Registered {:?} alarm {} at {}",
            key.1,
            request.request_code,
            request.trigger_at
        );
        registrations.insert(key, Registration { job_id, request });
        Ok(())
    }

    async fn cancel(&self, request_code: RequestCode) -> Result<()> {
        let mut registrations = self.registrations.lock().await;
        let scheduler = self.scheduler.read().await;

        for kind in [AlarmKind::Exact, AlarmKind::Repeating] {
            if let Some(registration) = registrations.remove(&(request_code, kind)) {
                scheduler.remove(&registration.job_id).await.map_err(|e| {
                    AppError::Scheduling(format!("Failed to cancel alarm {}: {}", request_code, e))
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scheduler::AlarmSlot;
    use chrono::{Duration, TimeZone};

    fn payload() -> AlarmPayload {
        AlarmPayload {
            pill_id: 3,
            pill_name: "Iron".to_string(),
            dosage: "65mg".to_string(),
            slot: AlarmSlot::for_pill(3),
        }
    }

    #[test]
    fn test_daily_cron_uses_offset_of_trigger() {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 14, 30, 5).unwrap().with_timezone(&Local);
        assert_eq!(daily_cron(&at), "5 30 14 * * *");
    }

    #[tokio::test]
    async fn test_non_daily_repeat_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let service = CronAlarmService::new(tx).await.unwrap();
        let mut request = AlarmRequest::daily(
            payload().slot.standing_code(),
            Local::now() + Duration::hours(1),
            payload(),
        );
        request.repeat_interval_days = Some(3);

        assert!(matches!(
            service.register(request).await,
            Err(AppError::Scheduling(_))
        ));
        assert!(service.registrations().await.is_empty());
    }

    #[tokio::test]
    async fn test_register_replaces_same_code_and_kind() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let service = CronAlarmService::new(tx).await.unwrap();
        let code = payload().slot.standing_code();
        let at = Local::now() + Duration::hours(1);

        service
            .register(AlarmRequest::exact(code, at, payload()))
            .await
            .unwrap();
        service
            .register(AlarmRequest::daily(code, at, payload()))
            .await
            .unwrap();
        service
            .register(AlarmRequest::daily(code, at, payload()))
            .await
            .unwrap();

        assert_eq!(service.registrations().await.len(), 2);

        service.cancel(code).await.unwrap();
        assert!(service.registrations().await.is_empty());
    }

    #[tokio::test]
    async fn test_due_one_shot_is_delivered() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = CronAlarmService::new(tx).await.unwrap();
        service.start().await.unwrap();

        let at = Local::now() - Duration::seconds(1);
        service
            .register(AlarmRequest::exact(payload().slot.snooze_code(), at, payload()))
            .await
            .unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, WakeEvent::AlarmFired(payload()));

        service.shutdown().await.unwrap();
    }
}
