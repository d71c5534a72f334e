//! Deckhand Core - Track lifecycle orchestration for DJ decks
//!
//! Owns "what track is loaded on this deck and what metadata describes it":
//! the asynchronous load/unload protocol, loop window persistence across
//! track swaps, and the shared control values read by the audio path and UI.

pub mod config;
pub mod control;
pub mod deck;
pub mod engine;
pub mod error;
pub mod loops;
pub mod metadata;
pub mod now_playing;
pub mod track;
pub mod types;

pub use types::*;
