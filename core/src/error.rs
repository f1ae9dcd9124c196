use std::path::PathBuf;
use thiserror::Error;

use crate::DocId;

/// Reasons a rebuild did not complete. The previously published index is left untouched.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("document {doc_id} is not valid UTF-8: {source}")]
    InvalidEncoding {
        doc_id: DocId,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("too many documents: {0}")]
    TooManyDocuments(usize),

    #[error("invalid index options: {0}")]
    InvalidOptions(String),

    #[error("failed to create worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Failures of the JSON configuration / answers collaborator.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file is missing: {0}")]
    Missing(PathBuf),

    #[error("config file is empty")]
    Empty,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = IndexError::TooManyDocuments(5);
        assert_eq!(err.to_string(), "too many documents: 5");
        assert_eq!(ConfigError::Empty.to_string(), "config file is empty");
    }
}
