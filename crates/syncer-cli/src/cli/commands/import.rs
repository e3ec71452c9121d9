//! `syncer import` - Run the import flow for this deployment.

use anyhow::{Context as _, Result};
use syncer_core::SyncError;

use super::context::Context;
use crate::exit_codes::{NOT_FOUND, SUCCESS};

pub async fn run(ctx: &Context) -> Result<i32> {
    let orchestrator = ctx.orchestrator().await?;
    match orchestrator.import().await {
        Ok(report) => {
            println!("{}", report.packet);
            Ok(SUCCESS)
        }
        Err(SyncError::NotFound { key }) => {
            eprintln!("No packet to import: {key}");
            Ok(NOT_FOUND)
        }
        Err(e) => Err(e).context("import failed"),
    }
}
