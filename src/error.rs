//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::ast::NodeId;

/// A model handed in from outside (for example a decoded query) broke a
/// structural invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("model has no root groups")]
    NoRootGroups,
    #[error("group {0} has no children")]
    EmptyGroup(NodeId),
    #[error("node id {0} appears more than once")]
    DuplicateId(NodeId),
}

/// Failure loading the field/operator catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("cannot read catalog file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse catalog file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown table: {0}")]
    UnknownTable(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Strict encoding refused the model; the caller asks the user to
    /// complete these conditions.
    #[error("{} condition(s) are missing a field or operator", .0.len())]
    IncompleteConditions(Vec<NodeId>),
    #[error("invalid model: {0}")]
    Model(#[from] ModelError),
    #[error("invalid model document: {0}")]
    Document(#[from] serde_json::Error),
    #[error("query execution failed: {0}")]
    Executor(#[source] Box<dyn std::error::Error + Send + Sync>),
}
