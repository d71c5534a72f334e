//! Cue points stored on a track

use serde::{Deserialize, Serialize};

/// Kind of marker a cue point represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueType {
    /// Hot cue placed by the user
    #[default]
    Regular,
    /// The deck's main (CDJ-style) cue
    Main,
    /// Saved loop window; `length` is the loop length
    Loop,
    /// Jump marker
    Jump,
}

/// Identifier of a cue point, unique within its track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CueId(pub u64);

/// A marked point (and optional length) in a track's timeline
///
/// Positions and lengths are interleaved sample offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuePoint {
    pub id: CueId,
    pub cue_type: CueType,
    pub position: i64,
    pub length: i64,
}

impl CuePoint {
    /// End of the cue's span (`position + length`)
    pub fn end(&self) -> i64 {
        self.position.saturating_add(self.length)
    }

    pub fn is_loop(&self) -> bool {
        self.cue_type == CueType::Loop
    }
}
