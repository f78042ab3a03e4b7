//! Error types for keystroke-flux

use crate::types::StatisticKind;
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, FluxError>;

/// Errors that can occur while decoding logs or building grapheme tables
#[derive(Debug, Error)]
pub enum FluxError {
    #[error("Truncated input at byte {offset} while reading {field}")]
    TruncatedInput { offset: usize, field: String },

    #[error("Invalid UTF-8 in field {field}: {source}")]
    Encoding {
        field: String,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Session {session}: {array} has {actual} entries, expected {expected}")]
    ArrayLengthMismatch {
        session: usize,
        array: StatisticKind,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot take combinations of empty content")]
    EmptyInput,

    #[error("Empty grapheme list for order {0}")]
    EmptyGraphemeList(usize),

    #[error("Empty {0} list")]
    EmptyStatisticList(StatisticKind),

    #[error("Unsupported window size: {0} (supported: 1 to 3)")]
    UnsupportedWindowSize(usize),

    #[error("Window of {window} is larger than content of length {len}")]
    WindowTooLarge { window: usize, len: usize },

    #[error("Unsupported grapheme order: {0} (use 2 for digraphs or 3 for trigraphs)")]
    UnsupportedGraphemeOrder(usize),

    #[error("Column {column} has {actual} rows, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid combination kind: {0}")]
    InvalidKind(String),

    #[error("Field {field} is {len} bytes, maximum is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl FluxError {
    pub(crate) fn truncated(offset: usize, field: &str) -> Self {
        FluxError::TruncatedInput {
            offset,
            field: field.to_string(),
        }
    }
}
