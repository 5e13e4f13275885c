use clap::{Args, Parser, Subcommand, ValueEnum};
use pokeapi_pipeline::{FetchMode, PipelineVariant};
use std::path::PathBuf;

/// pokeapi-pipeline - fetch Pokémon type data and save it per type
///
/// Each type key is fetched from PokeAPI, reduced to member names or member
/// forms, and written to `<output-dir>/type_<key>.txt` as one JSON value.
#[derive(Parser, Debug)]
#[command(name = "pokeapi-pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Staged, cached fetch pipeline for PokeAPI type data", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments shared by every command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Config file path (TOML)
    #[arg(short = 'c', long, env = "POKEAPI_PIPELINE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Cache directory
    #[arg(long, env = "POKEAPI_PIPELINE_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (trace|debug|info|warn|error)
    #[arg(long, env = "POKEAPI_PIPELINE_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline for one or more type keys
    Run(RunArgs),

    /// Inspect or clean the response cache
    Cache(CacheArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Type keys to process (1-16)
    #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
    pub keys: Vec<i64>,

    /// What to save for each type
    #[arg(long, value_enum, env = "POKEAPI_PIPELINE_VARIANT")]
    pub variant: Option<VariantArg>,

    /// How member sub-resources are fetched
    #[arg(long, value_enum, env = "POKEAPI_PIPELINE_MODE")]
    pub mode: Option<ModeArg>,

    /// API base URL
    #[arg(long, env = "POKEAPI_PIPELINE_BASE_URL")]
    pub base_url: Option<String>,

    /// Output directory (created if missing)
    #[arg(short = 'o', long, env = "POKEAPI_PIPELINE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum in-flight member requests in concurrent mode
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Bypass the response cache
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum CacheCommand {
    /// Show entry counts and size
    Stats,
    /// Remove expired entries
    Purge,
    /// Remove every entry
    Clear,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantArg {
    /// Member names
    Names,
    /// Member forms
    Forms,
}

impl From<VariantArg> for PipelineVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Names => PipelineVariant::Names,
            VariantArg::Forms => PipelineVariant::Forms,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// One request at a time, no retry
    Sequential,
    /// All requests at once, one retry per URL
    Concurrent,
}

impl From<ModeArg> for FetchMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Sequential => FetchMode::Sequential,
            ModeArg::Concurrent => FetchMode::Concurrent,
        }
    }
}
