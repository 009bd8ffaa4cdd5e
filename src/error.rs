//! Crate-wide error type.
//!
//! Only configuration and load-time failures surface as errors. Query-time
//! conditions (out-of-vocabulary words, spans with no corpus hits) are not
//! errors: the query succeeds with fewer rules.

use thiserror::Error;

/// Errors raised during configuration, corpus compilation, and index load.
#[derive(Debug, Error)]
pub enum SabreError {
    /// Invalid configuration value, rejected before any work is done.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Underlying file I/O failure while reading or writing an index.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The index file or bitext violates a structural invariant.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),
}

impl SabreError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        SabreError::Config(msg.into())
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        SabreError::CorruptIndex(msg.into())
    }
}
