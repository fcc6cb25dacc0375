//! Rendering adapters for the package graph.
//!
//! Text exporters (DOT, Mermaid, JSON) live in [`export`]; [`graphviz`]
//! hands DOT to the Graphviz `dot` binary for raster output.

pub mod export;
pub mod graphviz;

use std::path::PathBuf;

/// Errors from exporting or rendering a graph.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to serialize graph: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("graphviz `dot` not found on PATH; install graphviz or export DOT instead")]
    GraphvizMissing,
    #[error("failed to run graphviz: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("graphviz exited with {status}: {stderr}")]
    Graphviz { status: String, stderr: String },
}
