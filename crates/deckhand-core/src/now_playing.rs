//! Now-playing directory
//!
//! Downstream consumers (stream metadata, scrobblers, the UI's deck
//! headers) ask "what is loaded on which deck". Decks publish into a
//! [`NowPlaying`] implementation they are handed at construction, so there
//! is no process-global state.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::track::TrackPointer;

/// Receives "deck group → track" updates
pub trait NowPlaying: Send + Sync {
    /// Record the track now on `group`, or `None` if the deck was emptied
    fn set_track_info(&self, group: &str, track: Option<TrackPointer>);
}

/// In-memory now-playing directory
#[derive(Default)]
pub struct PlayerInfo {
    tracks: RwLock<HashMap<String, TrackPointer>>,
}

impl PlayerInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track currently loaded on `group`
    pub fn track_info(&self, group: &str) -> Option<TrackPointer> {
        self.tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(group)
            .cloned()
    }

    /// Groups with a track loaded, sorted
    pub fn loaded_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self
            .tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        groups.sort();
        groups
    }
}

impl NowPlaying for PlayerInfo {
    fn set_track_info(&self, group: &str, track: Option<TrackPointer>) {
        let mut tracks = self.tracks.write().unwrap_or_else(PoisonError::into_inner);
        match track {
            Some(track) => {
                tracks.insert(group.to_string(), track);
            }
            None => {
                tracks.remove(group);
            }
        }
    }
}
