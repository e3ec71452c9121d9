use super::args::*;

pub mod context;
pub mod export;
pub mod fetch;
pub mod import;
pub mod init;
pub mod list;
pub mod next;

use crate::exit_codes::SUCCESS;
use context::Context;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    if matches!(cli.cmd, Command::Version) {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let ctx = Context::load(&cli)?;
    match cli.cmd {
        Command::Init => init::run(&ctx).await,
        Command::Export => export::run(&ctx).await,
        Command::Import => import::run(&ctx).await,
        Command::Next(args) => next::run(&ctx, args).await,
        Command::List(args) => list::run(&ctx, args).await,
        Command::Fetch(args) => fetch::run(&ctx, args).await,
        Command::Version => Ok(SUCCESS),
    }
}
