//! `syncer export` - Run the export flow for this deployment.

use anyhow::{Context as _, Result};

use super::context::Context;
use crate::exit_codes::SUCCESS;

pub async fn run(ctx: &Context) -> Result<i32> {
    let orchestrator = ctx.orchestrator().await?;
    let report = orchestrator.export().await.context("export failed")?;

    // Packet name on stdout for scripts; progress went to the log.
    println!("{}", report.packet);
    Ok(SUCCESS)
}
