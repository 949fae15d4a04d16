//! Error types for the kcal_core library.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for kcal_core operations.
///
/// Every variant is fatal to the pipeline that raised it. Per-entry problems
/// in the log are not errors: the aggregator skips them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Biometric profile is missing a field or holds an unusable value
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    /// The summary store was never initialized
    #[error("Summary store not initialized: {0}")]
    StoreNotInitialized(String),

    /// A collection the pipeline reads from does not exist
    #[error("Missing collection: {0}")]
    MissingCollection(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Stable classification of an [`Error`], reported to callers alongside the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidProfile,
    StoreNotInitialized,
    MissingCollection,
    Config,
    Storage,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidProfile => "invalid_profile",
            ErrorKind::StoreNotInitialized => "store_not_initialized",
            ErrorKind::MissingCollection => "missing_collection",
            ErrorKind::Config => "config",
            ErrorKind::Storage => "storage",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidProfile(_) => ErrorKind::InvalidProfile,
            Error::StoreNotInitialized(_) => ErrorKind::StoreNotInitialized,
            Error::MissingCollection(_) => ErrorKind::MissingCollection,
            Error::Config(_) | Error::Toml(_) => ErrorKind::Config,
            Error::Io(_) | Error::Json(_) | Error::Csv(_) => ErrorKind::Storage,
            Error::Other(_) => ErrorKind::Other,
        }
    }
}

/// Structured failure handed to the display layer: error kind plus message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for Failure {
    fn from(err: &Error) -> Self {
        Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error[{}]: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_carries_kind_and_message() {
        let err = Error::StoreNotInitialized("summary".into());
        let failure = Failure::from(&err);

        assert_eq!(failure.kind, ErrorKind::StoreNotInitialized);
        assert_eq!(failure.message, "Summary store not initialized: summary");
        assert_eq!(
            failure.to_string(),
            "error[store_not_initialized]: Summary store not initialized: summary"
        );
    }

    #[test]
    fn test_failure_serializes_snake_case_kind() {
        let failure = Failure::from(&Error::InvalidProfile("weight_kg is missing".into()));
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "invalid_profile");
    }
}
