//! Track entity shared between the library layer and the decks
//!
//! A [`Track`] is always handled through a [`TrackPointer`] (`Arc<Track>`).
//! The library keeps one reference, and whichever deck currently holds the
//! track keeps another, so the track outlives a deck's load/unload cycle.
//!
//! Mutable fields live behind a single `RwLock`, which makes `Track`
//! `Send + Sync` and safe to hand to the loader thread.
//!
//! # Metadata sinks
//!
//! Background analysis may update a track's tempo or replay gain while it is
//! loaded. A deck binds its `file_bpm` / `replaygain` controls to the track
//! with [`Track::bind_metadata`], and every later [`Track::set_bpm`] /
//! [`Track::set_replay_gain`] is forwarded to the bound controls until the
//! deck calls [`Track::unbind_metadata`].

mod cue;

pub use cue::{CueId, CuePoint, CueType};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::control::ControlValue;
use crate::types::DEFAULT_SAMPLE_RATE;

/// Shared handle to a track
pub type TrackPointer = Arc<Track>;

static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique track identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

/// Handle returned by [`Track::bind_metadata`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

struct MetadataSink {
    id: SinkId,
    bpm: Arc<ControlValue>,
    replay_gain: Arc<ControlValue>,
}

#[derive(Debug, Clone)]
struct TrackState {
    location: PathBuf,
    /// Duration in milliseconds
    duration: f64,
    bpm: f64,
    replay_gain: f64,
    sample_rate: u32,
    header_parsed: bool,
    times_played: u32,
    /// Main cue position, -1 when unset
    cue_point: f64,
    cues: Vec<CuePoint>,
    next_cue_id: u64,
    visual_resample_rate: f64,
    loaded: bool,
    /// Set on every mutation, cleared by the storage layer after a flush
    dirty: bool,
}

/// A track known to the library
pub struct Track {
    id: TrackId,
    state: RwLock<TrackState>,
    sinks: Mutex<Vec<MetadataSink>>,
}

impl Track {
    /// Create a track for the file at `location` with empty metadata
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            id: TrackId(NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed)),
            state: RwLock::new(TrackState {
                location: location.into(),
                duration: 0.0,
                bpm: 0.0,
                replay_gain: 0.0,
                sample_rate: DEFAULT_SAMPLE_RATE,
                header_parsed: false,
                times_played: 0,
                cue_point: -1.0,
                cues: Vec::new(),
                next_cue_id: 0,
                visual_resample_rate: 0.0,
                loaded: false,
                dirty: false,
            }),
            sinks: Mutex::new(Vec::new()),
        }
    }

    /// Create a shared track
    pub fn shared(location: impl Into<PathBuf>) -> TrackPointer {
        Arc::new(Self::new(location))
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackState> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.dirty = true;
        state
    }

    fn sinks(&self) -> std::sync::MutexGuard<'_, Vec<MetadataSink>> {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn location(&self) -> PathBuf {
        self.read().location.clone()
    }

    /// File name for display
    pub fn filename(&self) -> String {
        self.read()
            .location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    // --- Header metadata ---

    /// Duration in milliseconds
    pub fn duration(&self) -> f64 {
        self.read().duration
    }

    pub fn set_duration(&self, duration_ms: f64) {
        self.write().duration = duration_ms;
    }

    pub fn bpm(&self) -> f64 {
        self.read().bpm
    }

    /// Update the tempo and forward it to every bound deck
    pub fn set_bpm(&self, bpm: f64) {
        self.write().bpm = bpm;
        for sink in self.sinks().iter() {
            sink.bpm.set(bpm);
        }
    }

    pub fn replay_gain(&self) -> f64 {
        self.read().replay_gain
    }

    /// Update the replay gain and forward it to every bound deck
    pub fn set_replay_gain(&self, gain: f64) {
        self.write().replay_gain = gain;
        for sink in self.sinks().iter() {
            sink.replay_gain.set(gain);
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.read().sample_rate
    }

    pub fn set_sample_rate(&self, sample_rate: u32) {
        self.write().sample_rate = sample_rate;
    }

    pub fn header_parsed(&self) -> bool {
        self.read().header_parsed
    }

    pub fn set_header_parsed(&self, parsed: bool) {
        self.write().header_parsed = parsed;
    }

    // --- Play statistics and display ---

    pub fn times_played(&self) -> u32 {
        self.read().times_played
    }

    pub fn inc_times_played(&self) {
        self.write().times_played += 1;
    }

    pub fn visual_resample_rate(&self) -> f64 {
        self.read().visual_resample_rate
    }

    pub fn set_visual_resample_rate(&self, rate: f64) {
        self.write().visual_resample_rate = rate;
    }

    // --- Loaded / dirty flags ---

    /// Whether a deck currently has this track loaded
    pub fn is_loaded(&self) -> bool {
        self.read().loaded
    }

    /// Mark the track as (no longer) loaded
    ///
    /// Clearing the flag is the storage layer's cue to flush the track.
    pub fn set_loaded(&self, loaded: bool) {
        self.write().loaded = loaded;
    }

    /// Whether the track changed since the storage layer last flushed it
    pub fn is_dirty(&self) -> bool {
        self.read().dirty
    }

    /// Called by the storage layer after persisting the track
    pub fn mark_clean(&self) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).dirty = false;
    }

    // --- Cue points ---

    /// Main cue position (-1 when unset)
    pub fn cue_point(&self) -> f64 {
        self.read().cue_point
    }

    pub fn set_cue_point(&self, position: f64) {
        self.write().cue_point = position;
    }

    /// Snapshot of all cue points in insertion order
    pub fn cue_points(&self) -> Vec<CuePoint> {
        self.read().cues.clone()
    }

    /// Append a cue point and return its id
    pub fn add_cue(&self, cue_type: CueType, position: i64, length: i64) -> CueId {
        let mut state = self.write();
        let id = CueId(state.next_cue_id);
        state.next_cue_id += 1;
        state.cues.push(CuePoint {
            id,
            cue_type,
            position,
            length,
        });
        id
    }

    /// Move an existing cue point. Returns false if `id` doesn't exist.
    pub fn update_cue(&self, id: CueId, position: i64, length: i64) -> bool {
        let mut state = self.write();
        match state.cues.iter_mut().find(|cue| cue.id == id) {
            Some(cue) => {
                cue.position = position;
                cue.length = length;
                true
            }
            None => false,
        }
    }

    /// Overwrite the first cue of `cue_type`, appending one if the track has none
    ///
    /// Runs under a single write lock so a concurrent editor can't slip a
    /// second cue of the same type in between lookup and insert.
    pub fn upsert_first_cue(&self, cue_type: CueType, position: i64, length: i64) -> CueId {
        let mut state = self.write();
        if let Some(cue) = state.cues.iter_mut().find(|cue| cue.cue_type == cue_type) {
            cue.position = position;
            cue.length = length;
            return cue.id;
        }

        let id = CueId(state.next_cue_id);
        state.next_cue_id += 1;
        state.cues.push(CuePoint {
            id,
            cue_type,
            position,
            length,
        });
        id
    }

    /// Remove a cue point. Returns false if `id` doesn't exist.
    pub fn remove_cue(&self, id: CueId) -> bool {
        let mut state = self.write();
        let before = state.cues.len();
        state.cues.retain(|cue| cue.id != id);
        state.cues.len() != before
    }

    // --- Metadata bindings ---

    /// Forward future tempo / replay gain updates to the given controls
    pub fn bind_metadata(&self, bpm: Arc<ControlValue>, replay_gain: Arc<ControlValue>) -> SinkId {
        let id = SinkId(NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed));
        self.sinks().push(MetadataSink {
            id,
            bpm,
            replay_gain,
        });
        id
    }

    /// Stop forwarding updates to a previously bound pair of controls
    pub fn unbind_metadata(&self, id: SinkId) -> bool {
        let mut sinks = self.sinks();
        let before = sinks.len();
        sinks.retain(|sink| sink.id != id);
        sinks.len() != before
    }

    /// Number of decks currently bound to this track's metadata
    pub fn bound_sink_count(&self) -> usize {
        self.sinks().len()
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("location", &state.location)
            .field("bpm", &state.bpm)
            .field("loaded", &state.loaded)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

/// Whether two handles point at the same track
pub fn same_track(a: &TrackPointer, b: &TrackPointer) -> bool {
    Arc::ptr_eq(a, b)
}

/// Path helper used by parsers that look next to the audio file
pub(crate) fn with_appended_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
