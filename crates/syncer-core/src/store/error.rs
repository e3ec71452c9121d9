//! Failures while moving packets in and out of the bucket.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Packets are immutable; a second upload under the same name is refused.
    #[error("packet already exists: {key}")]
    AlreadyExists { key: String },

    #[error("packet not found: {key}")]
    NotFound { key: String },

    #[error("access denied: {message}")]
    AccessDenied { message: String },

    #[error("invalid store url '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("object store error: {0}")]
    ObjectStore(object_store::Error),
}

impl StoreError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => 2,
            Self::AccessDenied { .. } => 3,
            Self::InvalidSpec { .. } => 4,
            Self::AlreadyExists { .. } | Self::Io { .. } | Self::ObjectStore(_) => 1,
        }
    }

    /// Classify a backend error for the packet named `key`.
    pub fn from_object_store(err: object_store::Error, key: &str) -> Self {
        use object_store::Error as E;

        let key = key.to_string();
        match err {
            E::NotFound { .. } => Self::NotFound { key },
            // `PutMode::Create` reports a taken key as either of these.
            E::AlreadyExists { .. } | E::Precondition { .. } => Self::AlreadyExists { key },
            E::PermissionDenied { .. } | E::Unauthenticated { .. } => Self::AccessDenied {
                message: err.to_string(),
            },
            other => Self::ObjectStore(other),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_keep_the_packet_name() {
        let missing = object_store::Error::NotFound {
            path: "bucket/IES1.4.tgz".into(),
            source: "no such key".into(),
        };
        let err = StoreError::from_object_store(missing, "IES1.4.tgz");
        assert!(matches!(&err, StoreError::NotFound { key } if key == "IES1.4.tgz"));
        assert_eq!(err.exit_code(), 2);

        let taken = object_store::Error::AlreadyExists {
            path: "bucket/IES1.4.tgz".into(),
            source: "exists".into(),
        };
        let err = StoreError::from_object_store(taken, "IES1.4.tgz");
        assert!(matches!(&err, StoreError::AlreadyExists { key } if key == "IES1.4.tgz"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn denied_and_unknown_errors() {
        let denied = object_store::Error::PermissionDenied {
            path: "IES1.4.tgz".into(),
            source: "forbidden".into(),
        };
        let err = StoreError::from_object_store(denied, "IES1.4.tgz");
        assert!(matches!(err, StoreError::AccessDenied { .. }));
        assert_eq!(err.exit_code(), 3);

        let other = object_store::Error::Generic {
            store: "S3",
            source: "connection reset".into(),
        };
        let err = StoreError::from_object_store(other, "IES1.4.tgz");
        assert!(matches!(err, StoreError::ObjectStore(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn io_errors_convert() {
        let err: StoreError = std::io::Error::other("disk full").into();
        assert!(matches!(&err, StoreError::Io { message } if message.contains("disk full")));
    }
}
