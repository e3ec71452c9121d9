//! `syncer next` - Print the iteration the next flow would assign.

use anyhow::Result;

use super::context::Context;
use crate::cli::args::NextArgs;
use crate::exit_codes::SUCCESS;

pub async fn run(ctx: &Context, args: NextArgs) -> Result<i32> {
    let instance = ctx.config.instance_code()?;
    let ledger = ctx.ledger().await?;
    let next = ledger.next_iteration(&instance, args.operation.into()).await?;
    println!("{next}");
    Ok(SUCCESS)
}
