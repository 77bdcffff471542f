use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vellum",
    about = "Vellum: document checkpoints and crash recovery",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Storage root (defaults to `.vellum`, or the config file's `root`)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Record the current content of a file as a checkpoint
    Checkpoint(CheckpointArgs),
    /// Record a named checkpoint that retention never prunes
    Bookmark(BookmarkArgs),
    /// List a document's checkpoints
    List(KeyArgs),
    /// Print (or write out) the content of a checkpoint
    Restore(RestoreArgs),
    /// Show line changes between two checkpoints, or a checkpoint and a file
    Compare(CompareArgs),
    /// Set or clear a checkpoint's label and description
    Label(LabelArgs),
    /// Delete a checkpoint
    Delete(CheckpointRefArgs),
    /// Apply retention and delete unreferenced blobs
    Gc(GcArgs),
    /// Show storage usage
    Stats,
    /// Reconstruct every checkpoint and report failures
    Verify(VerifyArgs),
    /// List unsaved content left behind by a crashed session
    Recover(RecoverArgs),
    /// Drop a recovery entry without restoring it
    Discard(KeyArgs),
    /// Maintain a document's recovery log by hand
    Wal(WalArgs),
}

#[derive(Args)]
pub struct CheckpointArgs {
    /// File to read the content from
    pub path: PathBuf,
    /// Document key (defaults to the path as given)
    #[arg(long)]
    pub key: Option<String>,
    #[arg(long, default_value = "manual")]
    pub trigger: String,
}

#[derive(Args)]
pub struct BookmarkArgs {
    pub path: PathBuf,
    #[arg(short, long)]
    pub label: String,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(long)]
    pub key: Option<String>,
}

#[derive(Args)]
pub struct KeyArgs {
    /// Document key
    pub key: String,
}

#[derive(Args)]
pub struct CheckpointRefArgs {
    pub key: String,
    /// Checkpoint id or unique prefix
    pub id: String,
}

#[derive(Args)]
pub struct RestoreArgs {
    pub key: String,
    pub id: String,
    /// Write the content here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompareArgs {
    pub key: String,
    /// Old side: checkpoint id or prefix
    pub from: String,
    /// New side: checkpoint id or prefix
    #[arg(conflicts_with = "file")]
    pub to: Option<String>,
    /// New side: current content of this file
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct LabelArgs {
    pub key: String,
    pub id: String,
    #[arg(short, long)]
    pub label: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct GcArgs {
    /// Extra blob hashes to keep (content referenced outside checkpoints)
    #[arg(long = "keep")]
    pub keep: Vec<String>,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Only this document (default: all)
    pub key: Option<String>,
}

#[derive(Args)]
pub struct RecoverArgs {
    /// Print the recovered content too
    #[arg(long)]
    pub show: bool,
}

#[derive(Args)]
pub struct WalArgs {
    #[command(subcommand)]
    pub action: WalAction,
}

#[derive(Subcommand)]
pub enum WalAction {
    /// Begin logging a document with the file's current content
    Start { key: String, path: PathBuf },
    /// Replace the logged content with the file's current content
    Update { key: String, path: PathBuf },
    /// Remove the log after a clean save
    Stop { key: String },
}
