//! MyPills library
//!
//! Daily medication reminders: pill storage, alarm scheduling, reminder
//! notifications and the take/snooze state machine. Exposed as a library for
//! testing and for embedding behind a UI.

pub mod app;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod platform;
pub mod services;
pub mod storage;
