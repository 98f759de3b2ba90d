//! Error types shared by every engine layer.

use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors produced by document, run and history operations.
///
/// Index and range errors are contract violations: the engine never clamps an
/// out-of-range argument, it reports it.
pub enum EngineError {
    #[error("index {index} out of range (length {len})")]
    /// A single index lies outside `0..=len` (insertion) or `0..len` (access).
    IndexOutOfRange {
        /// Offending index.
        index: usize,
        /// Length of the sequence it was applied to.
        len: usize,
    },

    #[error("range {start}+{length} out of bounds (length {len})")]
    /// A `(start, length)` pair reaches past the end of a sequence.
    RangeOutOfBounds {
        /// Start index of the range.
        start: usize,
        /// Number of elements in the range.
        length: usize,
        /// Length of the sequence it was applied to.
        len: usize,
    },

    #[error("invalid range: end precedes start")]
    /// A document range whose end position precedes its start position.
    InvalidRange,

    #[error("unknown paragraph {0}")]
    /// No paragraph with this id exists in the chain.
    UnknownParagraph(usize),

    #[error("the last paragraph has no successor to join with")]
    /// `join_with_next` was called on the tail paragraph.
    CannotJoinLast,

    #[error("unknown paragraph style {0:?}")]
    /// No style with this name exists in the document's collection.
    UnknownStyle(String),

    #[error("nothing to undo")]
    /// The undo stack is empty.
    NothingToUndo,

    #[error("nothing to redo")]
    /// The redo stack is empty.
    NothingToRedo,

    #[error("configuration error: {0}")]
    /// Engine configuration could not be parsed or failed validation.
    Config(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}
