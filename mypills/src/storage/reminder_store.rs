//! Reminder store
//!
//! Owns the durable pill list. Every call loads the full list from the
//! key-value store, applies one change, and writes the full list back before
//! returning. There is no cache: wake handlers in other execution contexts
//! always see the latest write.

use super::kv::KeyValueStore;
use super::models::{CreatePillRequest, Pill, PillColor};
use crate::config;
use crate::error::{AppError, Result};
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct ReminderStore {
    kv: Arc<dyn KeyValueStore>,
}

impl ReminderStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// All pills in insertion order. Seeds the sample pills on first run.
    pub async fn list(&self) -> Result<Vec<Pill>> {
        self.load().await
    }

    /// Find a pill by id
    pub async fn get(&self, id: i64) -> Result<Option<Pill>> {
        Ok(self.load().await?.into_iter().find(|p| p.id == id))
    }

    /// Append a pill, assigning a fresh id unless the request carries an unused one
    pub async fn add(&self, req: CreatePillRequest) -> Result<Pill> {
        let mut pills = self.load().await?;

        let id = match req.id {
            Some(id) if !pills.iter().any(|p| p.id == id) => id,
            _ => next_id(&pills),
        };

        let pill = Pill {
            id,
            name: req.name,
            dosage: req.dosage,
            time: req.time,
            color: req.color,
            taken: req.taken,
        };

        pills.push(pill.clone());
        self.save(&pills).await?;

        tracing::debug!("Added pill {} ({})", pill.id, pill.name);
        Ok(pill)
    }

    /// Replace the pill with the same id. Returns false when no such pill exists.
    pub async fn update(&self, pill: &Pill) -> Result<bool> {
        let mut pills = self.load().await?;

        let Some(existing) = pills.iter_mut().find(|p| p.id == pill.id) else {
            tracing::debug!("Update skipped, pill {} not found", pill.id);
            return Ok(false);
        };
        *existing = pill.clone();

        self.save(&pills).await?;
        tracing::debug!("Updated pill {}", pill.id);
        Ok(true)
    }

    /// Delete a pill. Returns the removed record, if there was one.
    pub async fn remove(&self, id: i64) -> Result<Option<Pill>> {
        let mut pills = self.load().await?;

        let Some(position) = pills.iter().position(|p| p.id == id) else {
            tracing::debug!("Remove skipped, pill {} not found", id);
            return Ok(None);
        };
        let removed = pills.remove(position);

        self.save(&pills).await?;
        tracing::debug!("Removed pill {}", id);
        Ok(Some(removed))
    }

    /// Set the daily taken flag. Returns the updated pill, if it exists.
    pub async fn set_taken(&self, id: i64, taken: bool) -> Result<Option<Pill>> {
        let mut pills = self.load().await?;

        let Some(pill) = pills.iter_mut().find(|p| p.id == id) else {
            tracing::debug!("Set taken skipped, pill {} not found", id);
            return Ok(None);
        };
        pill.taken = taken;
        let updated = pill.clone();

        self.save(&pills).await?;
        tracing::debug!("Pill {} taken={}", id, taken);
        Ok(Some(updated))
    }

    async fn load(&self) -> Result<Vec<Pill>> {
        let raw = match self.kv.get(config::PILLS_KEY).await {
            Ok(raw) => raw,
            Err(AppError::StorageCorrupt(reason)) => {
                tracing::warn!("Preferences unreadable, reseeding sample pills: {}", reason);
                return self.seed().await;
            }
            Err(e) => return Err(e),
        };

        match raw.as_deref().map(str::trim) {
            None | Some("") => {
                tracing::info!("No saved pills found, seeding sample pills");
                self.seed().await
            }
            Some(json) => match parse_pills(json) {
                Ok(mut pills) => {
                    if reassign_duplicate_ids(&mut pills) > 0 {
                        self.save(&pills).await?;
                    }
                    Ok(pills)
                }
                Err(e) => {
                    tracing::warn!("Saved pills are corrupt, reseeding sample pills: {}", e);
                    self.seed().await
                }
            },
        }
    }

    async fn save(&self, pills: &[Pill]) -> Result<()> {
        let json = encode_pills(pills)?;
        self.kv.set(config::PILLS_KEY, &json).await
    }

    async fn seed(&self) -> Result<Vec<Pill>> {
        let pills = sample_pills(next_id(&[]));
        self.save(&pills).await?;
        Ok(pills)
    }
}

/// Serialize the full pill list to its persisted JSON array
pub fn encode_pills(pills: &[Pill]) -> Result<String> {
    Ok(serde_json::to_string(pills)?)
}

/// Parse the persisted JSON array. Records sharing an id are all kept;
/// the later ones get fresh ids.
pub fn decode_pills(json: &str) -> Result<Vec<Pill>> {
    let mut pills = parse_pills(json)?;
    reassign_duplicate_ids(&mut pills);
    Ok(pills)
}

fn parse_pills(json: &str) -> Result<Vec<Pill>> {
    serde_json::from_str(json).map_err(|e| AppError::StorageCorrupt(e.to_string()))
}

/// Give every repeated id after its first occurrence a fresh one.
/// Returns how many records were renumbered.
fn reassign_duplicate_ids(pills: &mut [Pill]) -> usize {
    let mut renumbered = 0;
    for i in 1..pills.len() {
        if pills[..i].iter().any(|p| p.id == pills[i].id) {
            let fresh = next_id(pills);
            tracing::warn!(
                "Pill '{}' shares id {} with another pill, renumbered to {}",
                pills[i].name,
                pills[i].id,
                fresh
            );
            pills[i].id = fresh;
            renumbered += 1;
        }
    }
    renumbered
}

/// Clock-derived id that is also larger than every id already in use
fn next_id(pills: &[Pill]) -> i64 {
    let now = Utc::now().timestamp_millis();
    let max_existing = pills.iter().map(|p| p.id).max().unwrap_or(i64::MIN);
    now.max(max_existing.saturating_add(1))
}

fn sample_pills(first_id: i64) -> Vec<Pill> {
    [
        ("Vitamin D", "1000 IU", "8:00 AM", PillColor::Blue),
        ("Blood Pressure", "5mg", "2:00 PM", PillColor::Red),
        ("Multivitamin", "1 tablet", "6:00 PM", PillColor::Green),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (name, dosage, time, color))| Pill {
        id: first_id + i as i64,
        name: name.to_string(),
        dosage: dosage.to_string(),
        time: time.to_string(),
        color,
        taken: false,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use tempfile::TempDir;

    fn create_test_store() -> (ReminderStore, Arc<MemoryStore>) {
        let kv = Arc::new(MemoryStore::new());
        (ReminderStore::new(kv.clone()), kv)
    }

    async fn empty_store() -> ReminderStore {
        let kv = Arc::new(MemoryStore::new());
        kv.set(config::PILLS_KEY, "[]").await.unwrap();
        ReminderStore::new(kv)
    }

    #[tokio::test]
    async fn test_first_run_seeds_three_samples() {
        let (store, kv) = create_test_store();

        let pills = store.list().await.unwrap();
        let names: Vec<&str> = pills.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Vitamin D", "Blood Pressure", "Multivitamin"]);
        assert!(pills.iter().all(|p| !p.taken));

        // The seed itself is persisted
        let raw = kv.get(config::PILLS_KEY).await.unwrap().unwrap();
        assert_eq!(decode_pills(&raw).unwrap(), pills);
    }

    #[tokio::test]
    async fn test_seed_is_not_repeated_after_restart() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("preferences.json");

        let first = ReminderStore::new(Arc::new(FileStore::new(path.clone())))
            .list()
            .await
            .unwrap();

        // A new store over the same file simulates a process restart
        let second = ReminderStore::new(Arc::new(FileStore::new(path)))
            .list()
            .await
            .unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_seed_ids_are_unique() {
        let (store, _kv) = create_test_store();
        let pills = store.list().await.unwrap();
        assert_ne!(pills[0].id, pills[1].id);
        assert_ne!(pills[1].id, pills[2].id);
    }

    #[tokio::test]
    async fn test_corrupt_blob_falls_back_to_seed() {
        let (store, kv) = create_test_store();
        kv.set(config::PILLS_KEY, "[{\"id\": oops").await.unwrap();

        let pills = store.list().await.unwrap();
        assert_eq!(pills.len(), 3);

        let raw = kv.get(config::PILLS_KEY).await.unwrap().unwrap();
        assert!(decode_pills(&raw).is_ok());
    }

    #[tokio::test]
    async fn test_add_assigns_id_and_appends() {
        let store = empty_store().await;

        let first = store
            .add(CreatePillRequest::new("Aspirin", "81mg", "9:00 PM", PillColor::Red))
            .await
            .unwrap();
        let second = store
            .add(CreatePillRequest::new("Iron", "65mg", "7:30 AM", PillColor::Orange))
            .await
            .unwrap();

        assert!(second.id > first.id);

        let pills = store.list().await.unwrap();
        assert_eq!(pills, vec![first.clone(), second]);
        assert_eq!(pills[0].name, "Aspirin");
        assert_eq!(pills[0].dosage, "81mg");
        assert_eq!(pills[0].time, "9:00 PM");
        assert_eq!(pills[0].color, PillColor::Red);
        assert!(!pills[0].taken);
    }

    #[tokio::test]
    async fn test_add_keeps_unused_id_and_replaces_duplicate() {
        let store = empty_store().await;

        let mut req = CreatePillRequest::new("A", "1", "8:00", PillColor::Blue);
        req.id = Some(7);
        let kept = store.add(req.clone()).await.unwrap();
        assert_eq!(kept.id, 7);

        let reassigned = store.add(req).await.unwrap();
        assert_ne!(reassigned.id, 7);
    }

    #[tokio::test]
    async fn test_update_and_set_taken_on_missing_id_are_noops() {
        let store = empty_store().await;
        let pill = store
            .add(CreatePillRequest::new("A", "1", "8:00", PillColor::Blue))
            .await
            .unwrap();

        let mut ghost = pill.clone();
        ghost.id = pill.id + 1000;
        assert!(!store.update(&ghost).await.unwrap());
        assert_eq!(store.set_taken(ghost.id, true).await.unwrap(), None);
        assert_eq!(store.remove(ghost.id).await.unwrap(), None);

        assert_eq!(store.list().await.unwrap(), vec![pill]);
    }

    #[tokio::test]
    async fn test_set_taken_persists() {
        let store = empty_store().await;
        let pill = store
            .add(CreatePillRequest::new("A", "1", "8:00", PillColor::Blue))
            .await
            .unwrap();

        let updated = store.set_taken(pill.id, true).await.unwrap().unwrap();
        assert!(updated.taken);
        assert!(store.get(pill.id).await.unwrap().unwrap().taken);
    }

    #[tokio::test]
    async fn test_remove_drops_record() {
        let store = empty_store().await;
        let keep = store
            .add(CreatePillRequest::new("Keep", "1", "8:00", PillColor::Blue))
            .await
            .unwrap();
        let drop = store
            .add(CreatePillRequest::new("Drop", "1", "9:00", PillColor::Red))
            .await
            .unwrap();

        let removed = store.remove(drop.id).await.unwrap();
        assert_eq!(removed, Some(drop.clone()));
        assert_eq!(store.list().await.unwrap(), vec![keep]);
        assert_eq!(store.get(drop.id).await.unwrap(), None);
    }

    #[test]
    fn test_encode_decode_reproduces_list() {
        let pills = sample_pills(1_700_000_000_000);
        let decoded = decode_pills(&encode_pills(&pills).unwrap()).unwrap();
        assert_eq!(decoded, pills);
    }

    #[test]
    fn test_decode_renumbers_duplicate_ids() {
        let mut pills = sample_pills(1);
        pills[2].id = pills[0].id;
        let json = encode_pills(&pills).unwrap();

        let decoded = decode_pills(&json).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].id, 1);
        assert_ne!(decoded[2].id, decoded[0].id);
        assert_ne!(decoded[2].id, decoded[1].id);
        assert_eq!(decoded[2].name, "Multivitamin");
    }

    #[tokio::test]
    async fn test_duplicate_ids_keep_every_pill() {
        let (store, kv) = create_test_store();
        kv.set(
            config::PILLS_KEY,
            r#"[{"id":5,"name":"Warfarin","dosage":"5mg","time":"8:00 PM","color":"red","taken":false},
               {"id":5,"name":"Insulin","dosage":"10u","time":"7:00 AM","color":"blue","taken":true}]"#,
        )
        .await
        .unwrap();

        let pills = store.list().await.unwrap();
        let names: Vec<&str> = pills.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Warfarin", "Insulin"]);
        assert_eq!(pills[0].id, 5);
        assert_ne!(pills[1].id, 5);
        assert!(pills[1].taken);

        // The renumbering is persisted, so ids stay stable across loads
        let raw = kv.get(config::PILLS_KEY).await.unwrap().unwrap();
        assert_eq!(decode_pills(&raw).unwrap(), pills);
        assert_eq!(store.list().await.unwrap(), pills);
    }
}
