use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "taxpacket",
    version,
    about = "Assemble per-person tax packets from filing documents and wage statements"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Index(IndexArgs),
    Merge(MergeArgs),
    Combine(CombineArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IoArgs {
    #[arg(long, default_value_t = 1)]
    pub io_retries: u32,

    #[arg(long, default_value_t = 60_000)]
    pub io_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    #[arg(long)]
    pub w2_dir: PathBuf,

    #[arg(long, default_value_t = false)]
    pub show_entries: bool,

    #[command(flatten)]
    pub io: IoArgs,
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[arg(long)]
    pub company_dir: PathBuf,

    #[arg(long)]
    pub w2_dir: PathBuf,

    #[arg(long)]
    pub people_dir: PathBuf,

    #[arg(long)]
    pub output_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = SuffixPolicy::Random)]
    pub suffix_policy: SuffixPolicy,

    #[arg(long, default_value_t = 1)]
    pub jobs: usize,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[command(flatten)]
    pub io: IoArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CombineArgs {
    #[arg(long)]
    pub merged_dir: PathBuf,

    #[arg(long)]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = 30)]
    pub bundle_size: usize,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[command(flatten)]
    pub io: IoArgs,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SuffixPolicy {
    Random,
    Unique,
}

impl SuffixPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Unique => "unique",
        }
    }
}
