//! `syncer init` - Create the ledger table without doing anything else.

use anyhow::Result;

use super::context::Context;
use crate::exit_codes::SUCCESS;

pub async fn run(ctx: &Context) -> Result<i32> {
    ctx.ledger().await?;
    eprintln!("Ledger ready");
    Ok(SUCCESS)
}
