//! Control over the externally managed services (main db, sync db, application).
//!
//! The flows only ever see "stopped", "running" and "reachable". Every
//! call must be idempotent with respect to already-satisfied state:
//! stopping a stopped service is not an error, and export compensation
//! relies on that.

pub mod docker;

use std::path::PathBuf;

use async_trait::async_trait;

pub use docker::DockerCli;

use crate::errors::SyncResult;

/// Captured output of a command run inside a service.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait ServiceController: Send + Sync {
    async fn stop(&self, service: &str) -> SyncResult<()>;

    async fn start(&self, service: &str) -> SyncResult<()>;

    async fn restart(&self, service: &str) -> SyncResult<()>;

    /// Run `argv` inside the service. A non-zero exit is an error.
    async fn run_command(&self, service: &str, argv: &[String]) -> SyncResult<CommandOutput>;

    /// Host path backing `container_path` inside the service.
    async fn volume_mountpoint(&self, service: &str, container_path: &str)
        -> SyncResult<PathBuf>;
}
