//! Error types for the fallible edges of the crate.
//!
//! Packing itself never fails: a record that does not fit is truncated and
//! the caller is not told. The errors below only cover configuration
//! (parsing level names and directives) and reading packed records back.

use std::io;

use thiserror::Error;

/// Errors raised while parsing levels or level directives.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A level name that does not match any [`Level`](crate::Level).
    #[error("unknown log level `{0}`")]
    UnknownLevel(String),

    /// A severity name that does not match any [`Severity`](crate::Severity).
    #[error("unknown severity `{0}`")]
    UnknownSeverity(String),

    /// A directive that is not of the form `component=level` or `level`.
    #[error("malformed level directive `{0}`")]
    MalformedDirective(String),

    /// The directives file could not be read.
    #[error("failed to read level directives from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Errors raised while decoding a packed record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload ended in the middle of a value.
    #[error("payload truncated at offset {offset}: needed {needed} more bytes")]
    UnexpectedEnd { offset: usize, needed: usize },

    /// A descriptor claims more sub-entries than the table holds.
    #[error("type table is inconsistent at descriptor {index}")]
    InvalidTypeTable { index: usize },

    /// A leaf descriptor with an element width the reader cannot interpret.
    #[error("unsupported element width {width} for `{type_name}`")]
    UnsupportedWidth { type_name: String, width: usize },
}

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
