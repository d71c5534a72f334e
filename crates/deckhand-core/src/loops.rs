//! Loop window persistence across track swaps
//!
//! A deck's loop in/out points are ephemeral control state. The only way a
//! loop survives the track being swapped out and back in is the write-back
//! into the track's own cue list:
//!
//! - on unload, [`save_loop_window`] stores the deck's window in the track's
//!   first `Loop` cue (creating one if needed);
//! - on load, [`find_loop_window`] picks the first valid `Loop` cue in
//!   insertion order.
//!
//! Both sides agree on "first `Loop` cue", so a saved window is exactly the
//! one restored on the next load.

use crate::error::{DeckError, DeckResult};
use crate::track::{CueId, CuePoint, CueType, Track};
use crate::types::CHANNELS;

/// A restorable `[start, end)` loop range in interleaved samples
///
/// Both points are non-negative, frame aligned, and `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopWindow {
    start: i64,
    end: i64,
}

/// Whether a sample offset lies on a stereo frame boundary
#[inline]
pub fn is_frame_aligned(position: i64) -> bool {
    position % CHANNELS == 0
}

impl LoopWindow {
    /// Validate a pair of loop points
    pub fn from_points(start: i64, end: i64) -> DeckResult<Self> {
        let valid = start >= 0
            && end >= 0
            && is_frame_aligned(start)
            && is_frame_aligned(end)
            && start <= end;
        if valid {
            Ok(Self { start, end })
        } else {
            Err(DeckError::InvalidLoopWindow { start, end })
        }
    }

    /// Validate loop points read from control values
    ///
    /// Controls hold `f64`; anything that isn't a whole number (including the
    /// -1 sentinel and NaN) is rejected.
    pub fn from_controls(start: f64, end: f64) -> DeckResult<Self> {
        let whole = |v: f64| v.is_finite() && v.fract() == 0.0;
        if !whole(start) || !whole(end) {
            return Err(DeckError::InvalidLoopWindow {
                start: start as i64,
                end: end as i64,
            });
        }
        Self::from_points(start as i64, end as i64)
    }

    /// Window described by a stored cue (`position`, `position + length`)
    pub fn from_cue(cue: &CuePoint) -> DeckResult<Self> {
        Self::from_points(cue.position, cue.end())
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn length(&self) -> i64 {
        self.end - self.start
    }
}

/// First valid loop window among a track's cues
///
/// Invalid `Loop` cues are skipped, not repaired.
pub fn find_loop_window(cues: &[CuePoint]) -> Option<LoopWindow> {
    for cue in cues.iter().filter(|cue| cue.is_loop()) {
        match LoopWindow::from_cue(cue) {
            Ok(window) => return Some(window),
            Err(e) => log::debug!("Skipping loop cue {:?}: {}", cue.id, e),
        }
    }
    None
}

/// Persist a loop window into the track's first `Loop` cue
pub fn save_loop_window(track: &Track, window: LoopWindow) -> CueId {
    track.upsert_first_cue(CueType::Loop, window.start(), window.length())
}
