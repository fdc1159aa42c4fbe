use thiserror::Error;

/// Failures of the durable key-value capability.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded")]
    Quota,

    #[error("storage backend failed: {0}")]
    Backend(String),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Why a backstage pass could not be redeemed. Only ever logged; callers see
/// [`PassError::Invalid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassFailure {
    Malformed,
    UnknownPrefix,
    NotFound,
    Corrupt,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassError {
    #[error("Invalid Backstage Pass. Please check your ticket!")]
    Invalid,
}

/// Restoring a saved session from a continuation code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
    #[error("Invalid code or expired session.")]
    NotFound,

    #[error("Corrupted save data.")]
    Corrupt,
}

/// Loading a bundled script catalog.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script file '{0}' not found")]
    Missing(String),

    #[error("script file '{0}' is not valid utf-8")]
    Encoding(String),

    #[error("invalid script file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("act {0} has no exercises")]
    Empty(u32),
}
