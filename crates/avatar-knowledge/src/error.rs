use thiserror::Error;

/// Errors raised while loading a knowledge base.
///
/// Any of these leaves the previously loaded index (if any) in service.
#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("failed to read knowledge base {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed knowledge base: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid knowledge base record {index}: {reason}")]
    Invalid { index: usize, reason: String },
}
