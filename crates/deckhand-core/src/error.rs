//! Error types for deck orchestration

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::LoadTicket;

/// Errors that can occur while driving a deck
///
/// None of these are fatal. A failed or superseded load leaves the deck
/// empty, and a malformed loop cue simply isn't restored.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeckError {
    /// The engine could not open or decode the track
    #[error("Couldn't load track {location:?}: {reason}")]
    LoadFailure { location: PathBuf, reason: String },

    /// A completion arrived for a request that a newer load superseded
    #[error("Stale load completion for ticket {ticket} (pending: {pending:?})")]
    StaleCompletion {
        ticket: LoadTicket,
        pending: Option<LoadTicket>,
    },

    /// Loop window is unset, misaligned or inverted
    #[error("Invalid loop window {start}..{end}")]
    InvalidLoopWindow { start: i64, end: i64 },

    /// The engine's command channel is closed
    #[error("Buffer engine disconnected")]
    EngineDisconnected,
}

/// Result type for deck operations
pub type DeckResult<T> = Result<T, DeckError>;
