//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum KestrelError {
    /// A stored frame could not be restored to its original size.
    ///
    /// This indicates broken bookkeeping of the replay store and is not recoverable.
    #[error("Corrupt frame encoding: {0}")]
    DecodeCorruption(String),

    /// An action index outside of the configured action set.
    #[error("Invalid action index {index}, the action set has {n_actions} actions")]
    InvalidActionIndex {
        /// Requested index.
        index: usize,
        /// Size of the action set.
        n_actions: usize,
    },

    /// A frame does not have the configured size.
    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize {
        /// Configured frame size in bytes.
        expected: usize,
        /// Size of the given frame.
        actual: usize,
    },

    /// A frame could not be compressed.
    #[error("Frame encoding failed: {0}")]
    FrameEncoding(String),

    /// The cursor was advanced before the frame of the transition was stored.
    #[error("Transition committed without a frame")]
    IncompleteTransition,

    /// A slot that holds no transition was read.
    #[error("Slot {0} holds no transition")]
    EmptySlot(usize),

    /// The next frame of the newest transition was requested.
    #[error("Slot {0} holds the newest transition, its next frame is not stored yet")]
    NoNextFrame(usize),

    /// Inconsistent configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
