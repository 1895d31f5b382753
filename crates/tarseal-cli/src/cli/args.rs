use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "tarseal",
    version,
    about = "Deterministic, content-addressed tar+gzip archives"
)]
pub struct Cli {
    /// JSON file with build settings (compression_level, default_mode, follow_links)
    #[arg(long, global = true, env = "TARSEAL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Archive files and directories into a .tar.gz
    Pack(PackArgs),
    /// List the entries of an archive
    Inspect(InspectArgs),
    /// Print the SHA-256 fingerprint of a file or of base64 content
    Fingerprint(FingerprintArgs),
    /// Build or rebuild archive state from a JSON list of sources
    Apply(ApplyArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PackArgs {
    /// Files or directories to archive, in order
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output archive path (.tar.gz)
    #[arg(long, short)]
    pub output: PathBuf,

    /// Entry timestamp in unix milliseconds (default: now)
    #[arg(long)]
    pub timestamp_ms: Option<i64>,

    /// Print the build summary as JSON instead of digest lines
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Archive to list (.tar.gz)
    pub archive: PathBuf,

    /// Print one JSON object per entry
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FingerprintArgs {
    /// Input file, or "-" for stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// Treat the input as base64 text and fingerprint the decoded bytes
    #[arg(long)]
    pub base64: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    /// JSON array of sources: [{"base64": "...", "location": "...", "perm": 420}]
    #[arg(long)]
    pub sources: PathBuf,

    /// Stored state file; read if present and rewritten with the new state
    #[arg(long)]
    pub state: PathBuf,

    /// Also write the decoded archive here
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Build timestamp in unix milliseconds for changed sources (default: now)
    #[arg(long)]
    pub timestamp_ms: Option<i64>,
}
