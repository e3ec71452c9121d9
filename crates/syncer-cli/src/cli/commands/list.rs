//! `syncer list` - Show ledger records for an instance.

use anyhow::{Context as _, Result};
use syncer_core::{InstanceCode, Operation};

use super::context::Context;
use crate::cli::args::{ListArgs, ListFormat};
use crate::exit_codes::SUCCESS;

pub async fn run(ctx: &Context, args: ListArgs) -> Result<i32> {
    let instance = match &args.of {
        Some(code) => InstanceCode::new(code.clone())?,
        None => ctx.config.instance_code()?,
    };
    let operation: Operation = args.operation.into();

    let mut records = ctx
        .ledger()
        .await?
        .list_records(&instance, operation)
        .await
        .with_context(|| format!("failed to list {operation} records for {instance}"))?;
    // The ledger returns rows in no particular order.
    records.sort_by_key(|r| (r.iteration, r.id));

    match args.format {
        ListFormat::Plain => {
            for r in &records {
                println!(
                    "{}\t{}\t{}\t{}",
                    r.instance,
                    r.iteration,
                    r.operation.code(),
                    r.created.to_rfc3339()
                );
            }
            if records.is_empty() {
                eprintln!("(no records found)");
            }
        }
        ListFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(SUCCESS)
}
