use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use vms_config::SyncConfig;

/// Top-level CLI parser for the `vmsync` binary.
#[derive(Debug, Parser)]
#[command(
    name = "vmsync",
    version,
    about = "Reconcile a vCenter VM inventory into a database"
)]
pub struct Cli {
    /// Defaults to `sync` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to ./vmsync.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format: json, text
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one discovery, fetch, upsert and delete cycle
    Sync(SyncArgs),
    /// Print stored records for a scope
    List(ListArgs),
    /// Load and validate configuration, then print it with secrets masked
    CheckConfig,
}

#[derive(Debug, Default, Args)]
pub struct SyncArgs {
    /// Identifiers per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Batches processed concurrently
    #[arg(long)]
    pub workers: Option<usize>,

    /// Scope tag for stored rows (defaults to the vCenter host)
    #[arg(long)]
    pub scope: Option<String>,
}

impl SyncArgs {
    /// Layer the command-line overrides over the loaded sync section.
    pub fn apply(&self, sync: &mut SyncConfig) {
        if let Some(batch_size) = self.batch_size {
            sync.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            sync.workers = workers;
        }
        if let Some(scope) = &self.scope {
            sync.scope.clone_from(scope);
        }
    }
}

#[derive(Debug, Default, Args)]
pub struct ListArgs {
    /// Scope to list (defaults to the configured scope)
    #[arg(long)]
    pub scope: Option<String>,

    /// List every scope with its row count instead of records
    #[arg(long, conflicts_with = "scope")]
    pub scopes: bool,
}
