use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "syncer",
    version,
    about = "Export and import database + file store snapshots between deployments"
)]
pub struct Cli {
    /// Path to syncer.yaml (a missing file means defaults)
    #[arg(long, global = true, env = "SYNCER_CONFIG", default_value = "syncer.yaml")]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub cmd: Command,
}

/// Values that take precedence over the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// 4-character code of this deployment
    #[arg(long, global = true, env = "SYNCER_INSTANCE")]
    pub instance: Option<String>,

    /// Main database URL (ledger and replication probe)
    #[arg(long, global = true, env = "SYNCER_LEDGER_URL")]
    pub ledger_url: Option<String>,

    /// Exports bucket URL (e.g., s3://bucket/prefix, file:///path)
    #[arg(long, global = true, env = "SYNCER_STORE_URL")]
    pub store_url: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the ledger table if it does not exist
    Init,
    /// Snapshot this instance and upload the next packet
    Export,
    /// Download and apply the next expected packet for this instance
    Import,
    /// Print the iteration the next flow would use
    Next(NextArgs),
    /// List ledger records for an instance
    List(ListArgs),
    /// Download a packet without touching any service
    Fetch(FetchArgs),
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OperationArg {
    Clone,
    Export,
    Import,
}

impl From<OperationArg> for syncer_core::Operation {
    fn from(op: OperationArg) -> Self {
        match op {
            OperationArg::Clone => Self::Clone,
            OperationArg::Export => Self::Export,
            OperationArg::Import => Self::Import,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct NextArgs {
    #[arg(long, value_enum, default_value = "export")]
    pub operation: OperationArg,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Instance to list (defaults to this deployment)
    #[arg(long = "of", value_name = "INSTANCE")]
    pub of: Option<String>,

    #[arg(long, value_enum, default_value = "export")]
    pub operation: OperationArg,

    /// Output format
    #[arg(long, value_enum, default_value = "plain")]
    pub format: ListFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ListFormat {
    /// One record per line (machine-friendly)
    Plain,
    /// JSON array
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Instance that produced the packet
    #[arg(long = "from", value_name = "INSTANCE")]
    pub from: String,

    #[arg(long)]
    pub iteration: u32,

    /// Output file or directory
    #[arg(long, short = 'o', default_value = ".")]
    pub out: PathBuf,
}
