//! Error types for typegraph.

use std::path::PathBuf;

use crate::model::TypeIdentity;

/// Error type returned by caller-supplied delegates, filters and factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort a graph build, a gather call or a workspace load.
#[derive(Debug, thiserror::Error)]
pub enum TypegraphError {
    #[error("declaration group filter failed in {unit}: {source}")]
    GroupFilter { unit: PathBuf, source: BoxError },

    #[error("declaration filter failed for {name} in {unit}: {source}")]
    DeclFilter {
        unit: PathBuf,
        name: String,
        source: BoxError,
    },

    #[error("match predicate failed for {identity}: {source}")]
    Predicate {
        identity: TypeIdentity,
        source: BoxError,
    },

    #[error("private data parser failed for {identity}: {source}")]
    PrivateData {
        identity: TypeIdentity,
        source: BoxError,
    },

    #[error("malformed declaration group in {unit}: {reason}")]
    MalformedDecl { unit: PathBuf, reason: String },

    #[error("cannot resolve imports of {unit}: {source}")]
    ImportResolution { unit: PathBuf, source: BoxError },

    #[error("unsupported source file: {0}")]
    UnsupportedFile(PathBuf),

    #[error("failed to initialise parser for {0}: {1}")]
    ParserInit(PathBuf, String),

    #[error("tree-sitter failed to parse {0}")]
    ParseFailed(PathBuf),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = TypegraphError> = std::result::Result<T, E>;
