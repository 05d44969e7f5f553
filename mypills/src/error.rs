//! Error types for MyPills
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized for a presentation layer.

use crate::services::time_parser::TimeParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid reminder time: {0}")]
    TimeParse(#[from] TimeParseError),

    #[error("Stored pills are unreadable: {0}")]
    StorageCorrupt(String),

    #[error("Scheduling error: {0}")]
    Scheduling(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("{0}")]
    Validation(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Generic(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
