//! Error taxonomy for the filtering pipeline.

use thiserror::Error;

use crate::token::Symbol;

/// Errors that can terminate the pipeline. `skip-node` and `filtered-item`
/// are deliberately absent here: they are recoverable control signals and
/// are modeled as return values (`Action`, `TableDmlDecision`, `bool`)
/// rather than as error variants.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No tokenization rule matched the current line.
    #[error("no rule matched line {line_no} (offset {offset}): {line:?}")]
    Tokenization {
        line: String,
        line_no: u64,
        offset: u64,
    },

    /// The grouper received a token it has no transition for in its current
    /// state (for example a bare `SetVariable` not following a
    /// `TIME_ZONE` conditional comment).
    #[error("no grouper transition for token {symbol:?} with {queue_len} queued tokens")]
    CannotHandleToken { symbol: Symbol, queue_len: usize },

    /// An empty-section comment block didn't name a recognized section.
    #[error("cannot categorize comment block: {0:?}")]
    CannotCategorizeComment(String),

    /// A rewriter looked up a token by symbol that the node doesn't carry.
    #[error("node has no token with symbol {0:?}")]
    LookupError(Symbol),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Process exit code for this error: I/O failures exit 1, every other
    /// variant is a dump we couldn't parse and exits 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Io(_) => 1,
            _ => 2,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
