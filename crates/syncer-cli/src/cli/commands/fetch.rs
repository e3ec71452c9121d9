//! `syncer fetch` - Download a packet from the exports bucket.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use futures::TryStreamExt;
use syncer_core::{InstanceCode, PacketName, StoreError};
use tokio::io::AsyncWriteExt;

use super::context::Context;
use crate::cli::args::FetchArgs;
use crate::exit_codes::{NOT_FOUND, SUCCESS};

pub async fn run(ctx: &Context, args: FetchArgs) -> Result<i32> {
    let instance = InstanceCode::new(args.from.clone())?;
    anyhow::ensure!(args.iteration > 0, "iteration must be positive");
    let key = PacketName::new(instance, args.iteration).to_string();

    let store = ctx.store()?;
    eprintln!("Downloading: {key}");
    let mut stream = match store.get_stream(&key).await {
        Ok(s) => s,
        Err(StoreError::NotFound { .. }) => {
            eprintln!("Packet not found: {key}");
            return Ok(NOT_FOUND);
        }
        Err(e) => return Err(e).context("failed to download packet"),
    };

    let out_path = output_path(&args.out, &key);
    let mut file = tokio::fs::File::create(&out_path)
        .await
        .with_context(|| format!("failed to create output file: {}", out_path.display()))?;

    let mut written = 0u64;
    while let Some(chunk) = stream.try_next().await.context("failed to download packet")? {
        file.write_all(&chunk)
            .await
            .context("failed to write packet")?;
        written += chunk.len() as u64;
    }
    file.flush().await.context("failed to write packet")?;

    eprintln!("Downloaded {} bytes to: {}", written, out_path.display());
    Ok(SUCCESS)
}

fn output_path(out: &Path, key: &str) -> PathBuf {
    if out.is_dir() {
        out.join(key)
    } else {
        out.to_path_buf()
    }
}
