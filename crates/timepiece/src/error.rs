//! Error types for time specification parsing and evaluation.

use thiserror::Error;

use crate::capability::Specifies;
use crate::grammar::ParseError;
use crate::value::Provenance;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimepieceError {
    #[error("Unknown section type '{name}' at {path} (available: {})", .available.join(", "))]
    UnknownSectionKind {
        path: Provenance,
        name: String,
        available: Vec<String>,
    },

    #[error("Missing field '{field}' for section '{section}' at {path}")]
    MissingField {
        path: Provenance,
        section: String,
        field: String,
    },

    #[error("Bad value for field '{field}' at {path}: expected {expected}, got {got}")]
    BadFieldType {
        path: Provenance,
        field: String,
        expected: String,
        got: String,
    },

    #[error("Sorry, can't do {left} {op} {right} at {path}")]
    UnsupportedCombination {
        path: Provenance,
        op: &'static str,
        left: String,
        right: String,
    },

    #[error("Invalid time specification '{text}': {source}")]
    InvalidSpecification {
        text: String,
        #[source]
        source: ParseError,
    },

    #[error("No specification was given")]
    EmptySpecification,

    #[error(
        "Time spec is invalid, it must be able to specify a start with an optional interval (got: {got})"
    )]
    IncompleteSpecification { got: Specifies },

    #[error(
        "The value for '{field}' at {path} is a list with the wrong number of items: got {got_length} in '{got}', wanted {min_length}..={max_length}"
    )]
    MalformedListValue {
        path: Provenance,
        field: String,
        got: String,
        got_length: usize,
        min_length: usize,
        max_length: usize,
    },

    #[error("Invalid ISO 8601 {kind} '{value}' at {path}")]
    InvalidIso8601 {
        path: Provenance,
        kind: String,
        value: String,
    },

    #[error("Invalid timezone: '{0}'")]
    InvalidTimezone(String),
}

impl TimepieceError {
    /// Attach a provenance path to errors raised without one.
    ///
    /// Combination errors come out of `combine_with`/`or_with`, which know
    /// nothing about where in a parse they were called from.
    pub fn located(mut self, at: &Provenance) -> Self {
        match &mut self {
            TimepieceError::UnknownSectionKind { path, .. }
            | TimepieceError::MissingField { path, .. }
            | TimepieceError::BadFieldType { path, .. }
            | TimepieceError::UnsupportedCombination { path, .. }
            | TimepieceError::MalformedListValue { path, .. }
            | TimepieceError::InvalidIso8601 { path, .. } => {
                if path.is_root() {
                    *path = at.clone();
                }
            }
            TimepieceError::InvalidSpecification { .. }
            | TimepieceError::EmptySpecification
            | TimepieceError::IncompleteSpecification { .. }
            | TimepieceError::InvalidTimezone(_) => {}
        }
        self
    }

    /// The provenance path this error points at, if it has one.
    pub fn path(&self) -> Option<&Provenance> {
        match self {
            TimepieceError::UnknownSectionKind { path, .. }
            | TimepieceError::MissingField { path, .. }
            | TimepieceError::BadFieldType { path, .. }
            | TimepieceError::UnsupportedCombination { path, .. }
            | TimepieceError::MalformedListValue { path, .. }
            | TimepieceError::InvalidIso8601 { path, .. } => Some(path),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TimepieceError>;
