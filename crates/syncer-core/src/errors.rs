//! Error types surfaced by the synchronization flows.

use std::time::Duration;

use thiserror::Error;

use crate::store::StoreError;

/// Result type for syncer operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Snapshot, copy, compression or decompression failure.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Object storage put/get failure.
    #[error("transfer failed: {0}")]
    Transfer(#[from] StoreError),

    /// Import archive missing from the exports bucket.
    #[error("packet not found in object storage: {key}")]
    NotFound { key: String },

    /// Reachability probe exhausted its attempts.
    #[error("database unreachable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },

    /// Replication did not confirm within the configured bound.
    #[error("replication did not converge within {timeout:?}")]
    ConvergenceTimeout { timeout: Duration },

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("service {service}: {action} failed: {message}")]
    Service {
        service: String,
        action: String,
        message: String,
    },

    /// Export compensation could not restart the main service.
    #[error("{original}; additionally failed to restore main service: {secondary}")]
    Compensation {
        original: Box<SyncError>,
        secondary: Box<SyncError>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl SyncError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SyncError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn service(
        service: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SyncError::Service {
            service: service.into(),
            action: action.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::ConvergenceTimeout { .. }
        )
    }

    /// Suggested exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => 2,
            Self::Unavailable { .. } | Self::ConvergenceTimeout { .. } => 3,
            Self::Config(_) => 4,
            Self::Compensation { original, .. } => original.exit_code(),
            _ => 1,
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(e: rusqlite::Error) -> Self {
        SyncError::Ledger(e.to_string())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        SyncError::Ledger(e.to_string())
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        SyncError::Task(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(SyncError::NotFound { key: "k".into() }.exit_code(), 2);
        assert_eq!(
            SyncError::Unavailable {
                attempts: 10,
                last_error: "refused".into()
            }
            .exit_code(),
            3
        );
        assert_eq!(SyncError::Config("x".into()).exit_code(), 4);
        assert_eq!(SyncError::Ledger("x".into()).exit_code(), 1);
    }

    #[test]
    fn compensation_keeps_original_classification() {
        let err = SyncError::Compensation {
            original: Box::new(SyncError::NotFound { key: "k".into() }),
            secondary: Box::new(SyncError::service("main", "start", "boom")),
        };
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("failed to restore main service"));
    }
}
