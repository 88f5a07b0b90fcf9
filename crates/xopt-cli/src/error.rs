use std::path::PathBuf;
use xopt_core::OptError;

/// Everything that can stop the CLI.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid join graph: {0}")]
    InvalidGraph(String),
    #[error(transparent)]
    Optimize(#[from] OptError),
    #[error("no physical plan found for the join graph")]
    NoPlan,
    #[error("unexpected operator in optimized plan: {0}")]
    UnexpectedOperator(String),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}
