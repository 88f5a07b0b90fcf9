//! # xopt-cli: Join-Graph Driver for the Cascades Search
//!
//! Reads a join graph (tables with statistics plus equi-join edges) as JSON, runs
//! the search with the built-in xforms and a cardinality cost model, and prints
//! the chosen join tree as JSON on stdout.
//!
//! ```text
//! xopt-cli --input graph.json [--config search.json] [--timeout-ms N]
//! ```
//!
//! Logging is controlled by `RUST_LOG` (defaults to `info` for the xopt crates)
//! and goes to stderr.

mod cost;
mod error;
mod join_graph;

use clap::Parser;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;
use xopt_core::config::SearchConfig;

use crate::error::CliError;
use crate::join_graph::{optimize_join_graph, JoinGraphRequest};

const DEFAULT_LOG_FILTER: &str = "xopt_core=info,xopt_xforms=info,xopt_cli=info";

#[derive(Debug, Parser)]
#[command(name = "xopt-cli", version, about = "Optimize the join order of a join graph")]
struct Cli {
    /// Join graph JSON file.
    #[arg(short, long)]
    input: PathBuf,
    /// Search configuration JSON file; missing fields keep their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Cancel the search after this many milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Compute xform alternatives on the rayon pool.
    #[arg(long)]
    parallel: bool,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn run(cli: Cli) -> Result<(), CliError> {
    let request: JoinGraphRequest = read_json(&cli.input)?;
    let mut config = match &cli.config {
        Some(path) => read_json::<SearchConfig>(path)?,
        None => SearchConfig::default(),
    };
    config.parallel |= cli.parallel;
    let timeout = cli.timeout_ms.map(Duration::from_millis);

    let response = optimize_join_graph(&request, config, timeout)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn main() -> ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
