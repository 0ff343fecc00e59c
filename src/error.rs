// This module defines the crate-level error type for pshufb-const using the thiserror crate.
// GenError wraps the component errors (scanner, snippet evaluation, array selection, block
// options and table emission) and adds the location of the offending comment: the path of
// the source file and the line of the block's opening marker. Every variant is fatal for
// the file being processed; nothing is downgraded to a warning. GenResult<T> is the
// convenience alias used by the generator and the binary.

//! Error types for the table generator.

use thiserror::Error;

use crate::emit::EmitError;
use crate::options::OptionError;
use crate::snippet::{SelectError, SnippetError};

/// Main error type for a generator run.
#[derive(Error, Debug)]
pub enum GenError {
    #[error("{path}: cannot read file: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: comment block is not closed")]
    UnclosedComment { path: String, line: usize },

    #[error("{path}:{line}: invalid block option: {source}")]
    InvalidOption {
        path: String,
        line: usize,
        #[source]
        source: OptionError,
    },

    #[error("{path}:{line}: cannot evaluate program: {source}")]
    Evaluation {
        path: String,
        line: usize,
        #[source]
        source: SnippetError,
    },

    #[error("{path}:{line}: {source}")]
    Qualification {
        path: String,
        line: usize,
        #[source]
        source: SelectError,
    },

    #[error("{path}:{line}: {source}")]
    Tiling {
        path: String,
        line: usize,
        #[source]
        source: EmitError,
    },

    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),
}

impl GenError {
    /// Line of the comment block the error refers to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            GenError::UnclosedComment { line, .. }
            | GenError::InvalidOption { line, .. }
            | GenError::Evaluation { line, .. }
            | GenError::Qualification { line, .. }
            | GenError::Tiling { line, .. } => Some(*line),
            GenError::Read { .. } | GenError::Output(_) => None,
        }
    }
}

/// Result type alias for generator operations.
pub type GenResult<T> = Result<T, GenError>;
