//! Errors surfaced by the evaluation and engine layers.

use whale_core::PositionError;

/// Failure while reading or assembling an NNUE network.
#[derive(Debug, thiserror::Error)]
pub enum NnueError {
    /// The underlying reader failed, including a file that ends early.
    #[error("failed to read network: {0}")]
    Io(#[from] std::io::Error),

    /// A parameter block has the wrong number of values.
    #[error("{block}: expected {expected} values, found {found}")]
    DimensionMismatch {
        block: &'static str,
        expected: usize,
        found: usize,
    },

    /// The architecture string length in the header is implausible.
    #[error("architecture description of {0} bytes is too long")]
    ArchitectureTooLong(u32),
}

/// Failure in the engine front.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Position(#[from] PositionError),

    #[error("failed to spawn the search thread: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// The search thread is gone, typically after `quit`.
    #[error("the search thread is not running")]
    SearchThreadGone,

    #[error(transparent)]
    Nnue(#[from] NnueError),
}
