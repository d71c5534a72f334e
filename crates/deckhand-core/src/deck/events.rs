//! Deck state and lifecycle notifications

use crate::engine::LoadTicket;
use crate::error::DeckError;
use crate::track::TrackPointer;

/// Where a deck is in its load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeckState {
    /// No track
    #[default]
    Empty,
    /// Request dispatched to the engine, waiting for its completion
    Loading { ticket: LoadTicket },
    /// Metadata finalized, track active
    Loaded,
}

/// What an engine event did to the deck
#[derive(Debug, Clone, PartialEq)]
pub enum DeckTransition {
    /// The pending load finished
    Loaded,
    /// The pending load failed; the deck is empty
    Failed(DeckError),
    /// The engine released the loaded track; the deck is empty
    Ejected,
    /// The event didn't concern the deck's current track
    Ignored,
}

/// Broadcast to deck subscribers
#[derive(Debug, Clone)]
pub enum DeckEvent {
    LoadRequested { group: String, track: TrackPointer },
    TrackLoaded { group: String, track: TrackPointer },
    UnloadingTrack { group: String, track: TrackPointer },
    /// User-facing load error
    LoadFailed {
        group: String,
        track: TrackPointer,
        reason: String,
    },
    Ejected { group: String },
}

impl DeckEvent {
    /// Control group of the deck that emitted the event
    pub fn group(&self) -> &str {
        match self {
            Self::LoadRequested { group, .. }
            | Self::TrackLoaded { group, .. }
            | Self::UnloadingTrack { group, .. }
            | Self::LoadFailed { group, .. }
            | Self::Ejected { group } => group,
        }
    }
}

/// Typed callbacks registered on a deck
///
/// Callbacks run synchronously on the deck's control thread, in
/// registration order, before the matching [`DeckEvent`] is broadcast.
pub trait DeckListener: Send {
    fn on_load_requested(&mut self, _track: &TrackPointer) {}
    fn on_track_loaded(&mut self, _track: &TrackPointer) {}
    fn on_unloading_track(&mut self, _track: &TrackPointer) {}
    fn on_load_failed(&mut self, _track: &TrackPointer, _reason: &str) {}
}
