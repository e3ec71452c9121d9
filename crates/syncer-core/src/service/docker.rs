//! `ServiceController` backed by the `docker` CLI.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::{CommandOutput, ServiceController};
use crate::errors::{SyncError, SyncResult};

#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

/// Subset of `docker inspect` mount fields we need.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Mount {
    source: String,
    destination: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, service: &str, action: &str, args: &[&str]) -> SyncResult<CommandOutput> {
        tracing::debug!(service, action, ?args, "docker");
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                SyncError::service(service, action, format!("failed to spawn {}: {}", self.binary, e))
            })?;

        let result = CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.status.success() {
            return Err(SyncError::service(
                service,
                action,
                format!("exit status {}: {}", result.status, result.stderr.trim()),
            ));
        }
        Ok(result)
    }
}

fn find_mount(service: &str, inspect_json: &str, container_path: &str) -> SyncResult<PathBuf> {
    let mounts: Vec<Mount> = serde_json::from_str(inspect_json.trim()).map_err(|e| {
        SyncError::service(service, "inspect", format!("unexpected inspect output: {}", e))
    })?;

    let wanted = container_path.trim_end_matches('/');
    mounts
        .into_iter()
        .find(|m| m.destination.trim_end_matches('/') == wanted)
        .map(|m| PathBuf::from(m.source))
        .ok_or_else(|| {
            SyncError::service(
                service,
                "inspect",
                format!("no volume mounted at {}", container_path),
            )
        })
}

#[async_trait]
impl ServiceController for DockerCli {
    async fn stop(&self, service: &str) -> SyncResult<()> {
        self.run(service, "stop", &["stop", service]).await?;
        Ok(())
    }

    async fn start(&self, service: &str) -> SyncResult<()> {
        self.run(service, "start", &["start", service]).await?;
        Ok(())
    }

    async fn restart(&self, service: &str) -> SyncResult<()> {
        self.run(service, "restart", &["restart", service]).await?;
        Ok(())
    }

    async fn run_command(&self, service: &str, argv: &[String]) -> SyncResult<CommandOutput> {
        let mut args = vec!["exec", service];
        args.extend(argv.iter().map(String::as_str));
        self.run(service, "exec", &args).await
    }

    async fn volume_mountpoint(
        &self,
        service: &str,
        container_path: &str,
    ) -> SyncResult<PathBuf> {
        let out = self
            .run(
                service,
                "inspect",
                &["inspect", "--format", "{{json .Mounts}}", service],
            )
            .await?;
        find_mount(service, &out.stdout, container_path)
    }
}
