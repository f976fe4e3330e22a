//! Error types for requote-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in requote-core
#[derive(Debug, Error)]
pub enum Error {
    /// Input bytes are not valid for the declared encoding
    #[error("invalid {encoding} byte sequence in record {record} at byte offset {offset}")]
    Encoding {
        encoding: String,
        record: usize,
        offset: usize,
    },

    /// A character cannot be represented in the output encoding
    #[error("record {record}: character {ch:?} cannot be encoded as {encoding}")]
    Unencodable {
        record: usize,
        ch: char,
        encoding: String,
    },

    /// Structural violation in the delimited input
    #[error("malformed input at record {record} (line {line}, byte offset {offset}): {message}")]
    Malformed {
        record: usize,
        line: usize,
        offset: usize,
        message: String,
    },

    /// A field cannot be written under the configured quoting policy
    #[error("record {record}, field {field} (output byte offset {offset}): value cannot be written without quoting and no escape character is configured")]
    UnquotableField {
        record: usize,
        field: usize,
        offset: usize,
    },

    /// Record field count differs from the header
    #[error("record {record} (line {line}, byte offset {offset}) has {found} fields, header has {expected}")]
    RaggedRecord {
        record: usize,
        line: usize,
        offset: usize,
        expected: usize,
        found: usize,
    },

    /// Delimiter/quote/escape combination is unusable
    #[error("invalid dialect: {0}")]
    InvalidDialect(String),

    /// Encoding label not recognized
    #[error("unknown encoding '{0}'")]
    UnknownEncoding(String),

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors caused by the content of the data rather than the environment
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Error::Encoding { .. }
                | Error::Unencodable { .. }
                | Error::Malformed { .. }
                | Error::UnquotableField { .. }
                | Error::RaggedRecord { .. }
        )
    }
}
