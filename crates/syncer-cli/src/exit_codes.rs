//! Process exit codes. Part of the public contract for wrapper scripts.

use syncer_core::{StoreError, SyncError};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1; // Any flow, ledger or service failure
pub const NOT_FOUND: i32 = 2; // Packet absent from the exports bucket
pub const UNAVAILABLE: i32 = 3; // Database unreachable or replication timeout
pub const CONFIG_ERROR: i32 = 4;

/// Map an error chain to an exit code, using the first typed error found.
pub fn from_error(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<SyncError>() {
            return e.exit_code();
        }
        if let Some(e) = cause.downcast_ref::<StoreError>() {
            return e.exit_code();
        }
    }
    FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn typed_errors_keep_their_code() {
        let err = anyhow::Error::new(SyncError::NotFound {
            key: "IES1.1.tgz".into(),
        })
        .context("import failed");
        assert_eq!(from_error(&err), NOT_FOUND);

        let err: anyhow::Result<()> =
            Err(SyncError::Config("bad".into())).context("loading config");
        assert_eq!(from_error(&err.unwrap_err()), CONFIG_ERROR);
    }

    #[test]
    fn untyped_errors_are_generic_failures() {
        assert_eq!(from_error(&anyhow::anyhow!("boom")), FAILURE);
    }

    #[test]
    fn timeouts_are_unavailable() {
        let err = anyhow::Error::new(SyncError::ConvergenceTimeout {
            timeout: std::time::Duration::from_secs(1),
        });
        assert_eq!(from_error(&err), UNAVAILABLE);
    }
}
