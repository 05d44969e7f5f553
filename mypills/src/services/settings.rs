//! Settings service
//!
//! Manages reminder preferences persisted as a JSON file in the data directory.

use crate::config;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Reminder notification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSettings {
    /// How far a snooze pushes the reminder, in minutes
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: u32,
    /// Whether reminders vibrate
    #[serde(default = "default_true")]
    pub vibration_enabled: bool,
    /// Whether the launcher icon shows a badge for pending reminders
    #[serde(default = "default_true")]
    pub show_badge: bool,
    /// Whether to show the short "taken"/"snoozed" confirmation
    #[serde(default = "default_true")]
    pub confirmations_enabled: bool,
}

fn default_snooze_minutes() -> u32 {
    config::DEFAULT_SNOOZE_MINUTES
}

fn default_true() -> bool {
    true
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            snooze_minutes: default_snooze_minutes(),
            vibration_enabled: true,
            show_badge: true,
            confirmations_enabled: true,
        }
    }
}

impl ReminderSettings {
    pub fn validate(&self) -> Result<()> {
        if !(config::MIN_SNOOZE_MINUTES..=config::MAX_SNOOZE_MINUTES).contains(&self.snooze_minutes) {
            return Err(AppError::Settings(format!(
                "Snooze must be between {} and {} minutes",
                config::MIN_SNOOZE_MINUTES,
                config::MAX_SNOOZE_MINUTES
            )));
        }
        Ok(())
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub reminders: ReminderSettings,
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join(config::SETTINGS_FILE),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !fs::try_exists(&self.settings_path).await? {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Settings(format!("Failed to parse settings: {}", e)))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Settings(format!("Failed to serialize settings: {}", e)))?;

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    /// Get reminder settings
    pub async fn get_reminders(&self) -> Result<ReminderSettings> {
        let settings = self.load().await?;
        Ok(settings.reminders)
    }

    /// Validate and store reminder settings
    pub async fn update_reminders(&self, reminders: ReminderSettings) -> Result<()> {
        reminders.validate()?;
        let mut settings = self.load().await?;
        settings.reminders = reminders;
        self.save(&settings).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_service() -> (SettingsService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let service = SettingsService::new(temp_dir.path().to_path_buf());
        (service, temp_dir)
    }

    #[tokio::test]
    async fn test_default_settings_created_on_load() {
        let (service, temp) = create_test_service();

        let settings = service.load().await.unwrap();

        assert_eq!(settings.reminders.snooze_minutes, 10);
        assert!(settings.reminders.vibration_enabled);
        assert!(settings.reminders.show_badge);
        assert!(settings.reminders.confirmations_enabled);
        assert!(temp.path().join(config::SETTINGS_FILE).exists());
    }

    #[tokio::test]
    async fn test_settings_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().to_path_buf();

        // Create service, update settings, drop it
        {
            let service = SettingsService::new(settings_path.clone());
            let updated = ReminderSettings {
                snooze_minutes: 15,
                vibration_enabled: false,
                ..ReminderSettings::default()
            };
            service.update_reminders(updated).await.unwrap();
        }

        // Create new service, verify settings were persisted
        {
            let service = SettingsService::new(settings_path);
            let loaded = service.get_reminders().await.unwrap();
            assert_eq!(loaded.snooze_minutes, 15);
            assert!(!loaded.vibration_enabled);
            assert!(loaded.show_badge);
        }
    }

    #[tokio::test]
    async fn test_out_of_range_snooze_rejected() {
        let (service, _temp) = create_test_service();

        let result = service
            .update_reminders(ReminderSettings {
                snooze_minutes: 0,
                ..ReminderSettings::default()
            })
            .await;
        assert!(matches!(result, Err(AppError::Settings(_))));

        let loaded = service.get_reminders().await.unwrap();
        assert_eq!(loaded.snooze_minutes, config::DEFAULT_SNOOZE_MINUTES);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: AppSettings = serde_json::from_str(r#"{"reminders":{"snooze_minutes":5}}"#).unwrap();
        assert_eq!(settings.reminders.snooze_minutes, 5);
        assert!(settings.reminders.confirmations_enabled);

        let empty: AppSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, AppSettings::default());
    }
}
