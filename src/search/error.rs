//! Error types for search operations

use crate::error::AppError;
use tracing::error;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during index and search operations
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Index initialization failed
    #[error("index initialization failed: {0}")]
    IndexInitFailed(String),

    /// The index has been closed
    #[error("index is closed")]
    IndexClosed,

    /// Search execution failed; the message never carries backend detail
    #[error("search failed: {0}")]
    SearchFailed(String),

    /// Document indexing failed
    #[error("document indexing failed: {0}")]
    IndexingFailed(String),

    /// Schema error
    #[error("schema error: {0}")]
    SchemaError(String),

    /// A stored document could not be decoded
    #[error("corrupt search document {id}: {reason}")]
    CorruptDocument { id: String, reason: String },
}

impl SearchError {
    /// Map a backend error to a generic search failure, logging the detail
    pub(crate) fn backend<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> Self {
        move |err| {
            error!(error = %err, context, "search backend failure");
            SearchError::SearchFailed(context.to_string())
        }
    }

    /// Map a backend error raised while writing
    pub(crate) fn indexing<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> Self {
        move |err| SearchError::IndexingFailed(format!("{}: {}", context, err))
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::SearchFailed(_) => AppError::Search(err.to_string()),
            _ => AppError::Internal(err.to_string()),
        }
    }
}
