//! Reference CLI for issuing, verifying, and conformance-testing PEAC
//! receipts. Not part of the core library surface — a thin shell over
//! `peac_core`'s public API, kept here so the core never depends on an
//! argument-parsing crate.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

mod conformance_cmd;
mod dir_cmd;
mod samples_cmd;
mod verify_cmd;

const EXIT_PASS: u8 = 0;
const EXIT_VERIFY_FAIL: u8 = 1;
const EXIT_BAD_INPUT: u8 = 2;
const EXIT_IO_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "peac", version, about = "PEAC receipt issuer/verifier reference CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (equivalent to `RUST_LOG=debug`).
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify a receipt.
    Verify {
        #[command(subcommand)]
        action: VerifyAction,
    },
    /// Directory (policy discovery) operations.
    Dir {
        #[command(subcommand)]
        action: DirAction,
    },
    /// Run the conformance fixture suite.
    Conformance {
        #[command(subcommand)]
        action: ConformanceAction,
    },
    /// Inspect and generate sample receipts.
    Samples {
        #[command(subcommand)]
        action: SamplesAction,
    },
}

#[derive(Subcommand, Debug)]
enum VerifyAction {
    /// Verify a compact JWS, read from a file path or passed literally.
    Receipt {
        /// A compact JWS string, or a path to a file containing one.
        jws_or_file: String,
        /// Path to a JWKS document to seed as trust anchors.
        #[arg(long)]
        keys: Option<PathBuf>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        out: OutputFormat,
    },
}

#[derive(Subcommand, Debug)]
enum DirAction {
    /// Fetch and print a resource's policy descriptors.
    Get {
        /// The resource URL to discover policy descriptors for.
        url: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConformanceAction {
    /// Run fixtures under a suite directory.
    Run {
        /// Root directory holding per-category fixture subdirectories.
        #[arg(long, default_value = "conformance")]
        dir: PathBuf,
        /// Restrict to a conformance level subdirectory, if present.
        #[arg(long, value_enum, default_value_t = Level::Full)]
        level: Level,
        /// Restrict to a single category name.
        #[arg(long)]
        category: Option<String>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        output: ReportFormat,
    },
}

#[derive(Subcommand, Debug)]
enum SamplesAction {
    /// List the built-in sample scenarios.
    List,
    /// Show one sample scenario's description.
    Show {
        /// Sample id, as printed by `samples list`.
        id: String,
    },
    /// Generate sample fixture files to a directory.
    Generate {
        /// Output directory.
        #[arg(short, long)]
        out: PathBuf,
        /// Fixed `iat` to generate samples at (Unix seconds). Defaults to
        /// the current time.
        #[arg(long)]
        now: Option<i64>,
        /// Key id to sign samples under.
        #[arg(long, default_value = "sample-k1")]
        kid: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Level {
    Basic,
    Standard,
    Full,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Full => "full",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            EXIT_IO_ERROR
        }
    };
    ExitCode::from(code)
}

async fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Verify { action: VerifyAction::Receipt { jws_or_file, keys, out } } => {
            verify_cmd::run(&jws_or_file, keys.as_deref(), out).await
        }
        Commands::Dir { action: DirAction::Get { url } } => dir_cmd::run(&url).await,
        Commands::Conformance { action: ConformanceAction::Run { dir, level, category, output } } => {
            conformance_cmd::run(&dir, level.as_str(), category.as_deref(), output)
        }
        Commands::Samples { action } => match action {
            SamplesAction::List => samples_cmd::list(),
            SamplesAction::Show { id } => samples_cmd::show(&id),
            SamplesAction::Generate { out, now, kid } => samples_cmd::generate(&out, now, &kid).await,
        },
    }
}

pub(crate) fn read_input(path_or_literal: &str) -> Result<String> {
    let path = PathBuf::from(path_or_literal);
    if path.is_file() {
        std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))
            .map(|s| s.trim().to_string())
    } else {
        Ok(path_or_literal.trim().to_string())
    }
}
