use std::path::PathBuf;
use thiserror::Error;

/// Startup errors. Any of these keeps the tracker from ever starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("Invalid value for {key} ({value:?}): {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Sample store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Price must be a finite number, got {0}")]
    NonFinitePrice(f64),
    #[error("Failed to serialize samples: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Email report errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Email reporting is disabled")]
    Disabled,
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("Invalid attachment: {0}")]
    Attachment(String),
    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Collection loop errors
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Tracker already started (state: {0})")]
    AlreadyStarted(&'static str),
}
