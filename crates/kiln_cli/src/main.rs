//! Kiln CLI — command-line access to the local artifact cache.
//!
//! Provides `kiln fetch` to copy a cached artifact out, `kiln store` to add
//! one, `kiln trim` to run an eviction pass, and `kiln stat` to inspect the
//! cache root.

#![warn(missing_docs)]

mod fetch;
mod settings;
mod stat;
mod store;
mod trim;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use kiln_cache::DirArtifactCache;
use kiln_common::{ByteSize, CacheKey};
use tracing_subscriber::EnvFilter;

/// Kiln — a local, size-bounded build artifact cache.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln local artifact cache")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (`-v` info, `-vv` debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to a custom `kiln.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the cache root directory.
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Override the maximum cache size (e.g. "10GB", "512MiB").
    #[arg(long, global = true)]
    pub max_size: Option<ByteSize>,

    /// Never write to the cache.
    #[arg(long, global = true)]
    pub read_only: bool,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy a cached artifact to a destination path.
    Fetch(FetchArgs),
    /// Store a file in the cache.
    Store(StoreArgs),
    /// Evict least recently used files if the cache is over its maximum size.
    Trim,
    /// Show what the cache root holds.
    Stat(StatArgs),
}

/// Arguments for the `kiln fetch` subcommand.
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Cache key of the artifact.
    pub key: CacheKey,

    /// Where to write the artifact. Its parent directory must exist.
    pub dest: PathBuf,
}

/// Arguments for the `kiln store` subcommand.
#[derive(Parser, Debug)]
pub struct StoreArgs {
    /// File to store.
    pub source: PathBuf,

    /// Key to store under; repeatable. Defaults to the content hash of the file.
    #[arg(short, long = "key")]
    pub keys: Vec<CacheKey>,

    /// Metadata entry as `name=value`; repeatable.
    #[arg(short, long = "meta", value_parser = parse_meta)]
    pub meta: Vec<(String, String)>,
}

/// Arguments for the `kiln stat` subcommand.
#[derive(Parser, Debug)]
pub struct StatArgs {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Optional path to a custom config file.
    pub config: Option<PathBuf>,
    /// Cache root override.
    pub cache_dir: Option<PathBuf>,
    /// Maximum size override.
    pub max_size: Option<ByteSize>,
    /// Whether storing is disabled from the command line.
    pub read_only: bool,
}

/// Parses a `name=value` metadata argument.
fn parse_meta(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{s}'")),
    }
}

/// Returns the default log filter for the given verbosity flags.
fn log_filter(quiet: bool, verbose: u8) -> String {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    format!("kiln={level}")
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.quiet, cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let global = GlobalArgs {
        quiet: cli.quiet,
        config: cli.config,
        cache_dir: cli.cache_dir,
        max_size: cli.max_size,
        read_only: cli.read_only,
    };

    match run(cli.command, &global) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

fn run(command: Command, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let settings = settings::resolve(global)?;

    match command {
        Command::Stat(ref args) => stat::run(&settings, args),
        Command::Trim => Ok(trim::run(&DirArtifactCache::open(settings)?, global)),
        // Fetch and store end with the final pass a build makes on shutdown.
        Command::Fetch(ref args) => {
            let cache = DirArtifactCache::open(settings)?;
            let code = fetch::run(&cache, args, global);
            cache.close();
            Ok(code)
        }
        Command::Store(ref args) => {
            let cache = DirArtifactCache::open(settings)?;
            let code = store::run(&cache, args, global)?;
            cache.close();
            Ok(code)
        }
    }
}
