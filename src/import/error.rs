use std::path::PathBuf;

/// Everything that can stop a catalog import, from locating the dataset to
/// committing the merge.
///
/// `Display` is the text stored in the job's `error` field, so every variant
/// renders as a single human-readable line.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("read data directory {}: {source}", path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no .json.gz files found in {}", path.display())]
    NoDatasetFound { path: PathBuf },

    #[error("open import file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {reason}")]
    Decode { line: u64, reason: String },

    #[error("line {line}: {reason}")]
    Validation { line: u64, reason: String },

    #[error("line {line}: exceeds maximum line length of {limit} bytes")]
    LineTooLong { line: u64, limit: usize },

    #[error("{context}: {reason}")]
    Store {
        context: &'static str,
        reason: String,
    },

    #[error("line {line}: copy to staging table failed: {reason}")]
    Load { line: u64, reason: String },

    #[error("merge staging table into movie_ids: {reason}")]
    Merge { reason: String },

    #[error("commit transaction: {reason}")]
    Commit { reason: String },

    #[error("movie import is already running")]
    Conflict,

    #[error("movie import cancelled")]
    Cancelled,

    #[error("decode worker stopped unexpectedly: {0}")]
    Worker(String),
}

impl ImportError {
    pub(crate) fn store(context: &'static str, err: anyhow::Error) -> Self {
        Self::Store {
            context,
            reason: format!("{err:#}"),
        }
    }

    /// Locator failures that mean "nothing to import" rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoDatasetFound { .. })
    }
}

pub type ImportResult<T> = Result<T, ImportError>;
