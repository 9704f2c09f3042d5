use std::io;

use thiserror::Error;

/// Everything that can go wrong between reading the exports and writing the
/// import files.
#[derive(Debug, Error)]
pub enum RegistrarError {
    /// A roster name that does not follow `Surname1 [Surname2], GivenName`.
    /// The engine turns this into a [`crate::Diagnostic`] and keeps going.
    #[error("malformed name '{raw}': {reason}")]
    MalformedName { raw: String, reason: &'static str },
    #[error("no organizational unit configured for group '{0}'")]
    UnknownGroup(String),
    #[error("group '{0}' appears more than once in the mapping")]
    DuplicateGroup(String),
    #[error("give exactly one of --mapping FILE or --manual GROUP PATH")]
    AssignmentMode,
    #[error("group '{0}' not found in the roster")]
    GroupNotInRoster(String),
    #[error("{file}, row {row}: missing column '{column}'")]
    MissingColumn {
        file: String,
        row: u64,
        column: &'static str,
    },
    #[error("error during CSV processing: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, RegistrarError>;
