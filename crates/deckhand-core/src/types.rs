//! Common types and constants for Deckhand

/// Default number of decks in a mixing session
pub const NUM_DECKS: usize = 4;

/// Channels per frame. Sample positions are interleaved offsets, so a valid
/// frame boundary is always a multiple of this.
pub const CHANNELS: i64 = 2;

/// Sample rate assumed for tracks whose header has not been parsed yet
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Sentinel stored in position controls (cue point, loop in/out) when unset
pub const EMPTY_POSITION: f64 = -1.0;

/// Deck identifier (0-based index into the session)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeckId(pub usize);

impl DeckId {
    /// Get the deck number (1-based, for display and group names)
    pub fn display_number(&self) -> usize {
        self.0 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deck_display_number() {
        assert_eq!(DeckId(0).display_number(), 1);
        assert_eq!(DeckId(3).display_number(), 4);
    }
}
