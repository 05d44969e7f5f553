//! Process-level wake lock bookkeeping
//!
//! A headless process has no power manager to ask, so this only tracks who
//! holds the lock and until when. Holds expire on their own at the requested
//! timeout, which is capped at `config::WAKE_LOCK_TIMEOUT`.

use crate::config;
use crate::error::{AppError, Result};
use crate::services::notifications::WakeLock;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct ProcessWakeLock {
    // tag -> expiry of each outstanding hold
    holds: Mutex<HashMap<String, Vec<Instant>>>,
}

impl ProcessWakeLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `tag` has an unexpired hold
    pub fn is_held(&self, tag: &str) -> bool {
        let now = Instant::now();
        match self.holds.lock() {
            Ok(holds) => holds
                .get(tag)
                .is_some_and(|expiries| expiries.iter().any(|e| *e > now)),
            Err(_) => false,
        }
    }
}

impl WakeLock for ProcessWakeLock {
    fn acquire(&self, tag: &str, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(AppError::Generic("Wake lock timeout must be positive".to_string()));
        }

        let timeout = timeout.min(config::WAKE_LOCK_TIMEOUT);
        let now = Instant::now();

        let mut holds = self
            .holds
            .lock()
            .map_err(|_| AppError::Generic("Wake lock state poisoned".to_string()))?;
        let expiries = holds.entry(tag.to_string()).or_default();
        expiries.retain(|e| *e > now);
        expiries.push(now + timeout);

        tracing::debug!("Wake lock '{}' acquired for {:?}", tag, timeout);
        Ok(())
    }

    fn release(&self, tag: &str) {
        let Ok(mut holds) = self.holds.lock() else {
            return;
        };
        if let Some(expiries) = holds.get_mut(tag) {
            // Drop the hold closest to expiring; expired holds are gone already
            if let Some(idx) = expiries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| **e)
                .map(|(i, _)| i)
            {
                expiries.remove(idx);
            }
            if expiries.is_empty() {
                holds.remove(tag);
            }
        }
        tracing::debug!("Wake lock '{}' released", tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notifications::WakeGuard;

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = ProcessWakeLock::new();
        {
            let _guard = WakeGuard::acquire(&lock, "tag", Duration::from_secs(5)).unwrap();
            assert!(lock.is_held("tag"));
        }
        assert!(!lock.is_held("tag"));
    }

    #[test]
    fn test_nested_holds() {
        let lock = ProcessWakeLock::new();
        lock.acquire("tag", Duration::from_secs(5)).unwrap();
        lock.acquire("tag", Duration::from_secs(5)).unwrap();
        lock.release("tag");
        assert!(lock.is_held("tag"));
        lock.release("tag");
        assert!(!lock.is_held("tag"));
    }

    #[test]
    fn test_hold_expires_at_timeout() {
        let lock = ProcessWakeLock::new();
        lock.acquire("tag", Duration::from_millis(1)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(!lock.is_held("tag"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let lock = ProcessWakeLock::new();
        assert!(lock.acquire("tag", Duration::ZERO).is_err());
    }
}
