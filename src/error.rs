//! Error types for the cairn language server.

use std::path::PathBuf;

/// Main error type for server operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A handler other than `initialize`/`shutdown` ran before `initialize`.
    #[error("server has not been initialized")]
    NotInitialized,

    /// `initialize` could not resolve any workspace folder.
    #[error("no workspace folder, root URI or root path was provided")]
    NoWorkspace,

    /// The input was not a valid absolute `file://` URI or filesystem path.
    #[error("invalid document path: {0}")]
    BadPath(String),

    /// Filesystem read failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation targeted a document not tracked by any folder.
    #[error("unknown document: {}", .0.display())]
    UnknownDocument(PathBuf),

    /// An edit batch violated the sorted/non-overlapping contract.
    #[error("invalid edit batch: {0}")]
    InvalidEdit(String),
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for tower_lsp::jsonrpc::Error {
    fn from(err: Error) -> Self {
        let mut rpc = tower_lsp::jsonrpc::Error::internal_error();
        rpc.message = err.to_string().into();
        rpc
    }
}
