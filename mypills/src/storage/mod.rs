//! Storage module
//!
//! Key-value persistence and the pill list built on top of it.

pub mod file_store;
pub mod kv;
pub mod models;
pub mod reminder_store;

pub use file_store::FileStore;
pub use kv::{KeyValueStore, MemoryStore};
pub use models::*;
pub use reminder_store::ReminderStore;
