//! Buffer engine interface
//!
//! The buffer engine decodes tracks and plays them on the real-time thread.
//! Decks never call into it directly; they talk to it over channels:
//!
//! ```text
//! ┌──────────────┐  EngineCommand (Load / Eject)   ┌────────────────┐
//! │     Deck     │ ──────────────────────────────► │  BufferEngine  │
//! │ (control     │                                  │ (loader thread │
//! │  thread)     │ ◄────────────────────────────── │  + audio path) │
//! └──────────────┘  EngineEvent (Loaded / Failed /  └────────────────┘
//!        │                       Unloaded)                  ▲
//!        │  ControlNotification (rtrb ring per stage)       │ process()
//!        └──────────────────────────────────────► EngineControl stages
//! ```
//!
//! Every load request carries a [`LoadTicket`] and the engine echoes it on
//! completion. The deck uses the ticket to tell a completion for its
//! current request apart from a late one for a request it already
//! superseded.

mod threaded;

#[cfg(test)]
pub(crate) mod testing;

pub use threaded::{FileCheckDecoder, ThreadedEngine, TrackDecoder};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender};

use crate::error::{DeckError, DeckResult};
use crate::track::{TrackId, TrackPointer};

/// Sequence number of a load request, unique per deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LoadTicket(pub u64);

impl LoadTicket {
    /// The ticket following this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for LoadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Request to decode a track for a deck
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// Control group of the requesting deck, e.g. `[Channel1]`
    pub group: String,
    pub ticket: LoadTicket,
    pub track: TrackPointer,
    /// Seek to the track's saved position once decoded
    pub resume_from_saved_position: bool,
    /// Where the engine reports the outcome
    pub reply: Sender<EngineEvent>,
}

/// Commands sent from a deck to the engine
#[derive(Debug)]
pub enum EngineCommand {
    /// Decode a track and make it the group's playing buffer
    Load(LoadRequest),
    /// Release the group's buffers
    Eject { group: String },
    /// Stop the engine's loader thread
    Shutdown,
}

/// Reports from the engine back to a deck
///
/// The engine sends exactly one of `Loaded` / `LoadFailed` per `Load`.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Loaded {
        ticket: LoadTicket,
        track: TrackPointer,
    },
    LoadFailed {
        ticket: LoadTicket,
        track: TrackPointer,
        reason: String,
    },
    /// The engine released a track's buffers
    Unloaded { track: TrackPointer },
}

/// Sending half of the engine's command channel
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: Sender<EngineCommand>,
}

impl EngineHandle {
    pub fn new(tx: Sender<EngineCommand>) -> Self {
        Self { tx }
    }

    /// Queue a load (non-blocking)
    pub fn load(&self, request: LoadRequest) -> DeckResult<()> {
        self.tx
            .send(EngineCommand::Load(request))
            .map_err(|_| DeckError::EngineDisconnected)
    }

    /// Ask the engine to release a group's buffers (non-blocking)
    pub fn eject(&self, group: &str) -> DeckResult<()> {
        self.tx
            .send(EngineCommand::Eject {
                group: group.to_string(),
            })
            .map_err(|_| DeckError::EngineDisconnected)
    }

    pub(crate) fn shutdown(&self) -> DeckResult<()> {
        self.tx
            .send(EngineCommand::Shutdown)
            .map_err(|_| DeckError::EngineDisconnected)
    }
}

/// Create an engine command channel
pub fn engine_channel() -> (EngineHandle, Receiver<EngineCommand>) {
    let (tx, rx) = crossbeam::channel::unbounded();
    (EngineHandle::new(tx), rx)
}

/// Per-buffer state the engine passes to its processing stages
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineFrame {
    /// Play position in interleaved samples
    pub position: f64,
}

/// A processing stage plugged into the engine for one deck
///
/// Stages run on the audio thread. They must not block or allocate in
/// `process`.
pub trait EngineControl: Send {
    /// Control group of the deck this stage belongs to
    fn group(&self) -> &str;

    /// Called once per audio buffer
    fn process(&mut self, frame: &EngineFrame);

    /// False once the owning deck is gone
    ///
    /// Engines skip detached stages and drop them from the control thread in
    /// [`BufferEngine::remove_detached`].
    fn is_attached(&self) -> bool {
        true
    }
}

/// An engine that decks can load tracks into
pub trait BufferEngine {
    /// Command channel for load and eject requests
    fn handle(&self) -> EngineHandle;

    /// Install a processing stage
    fn add_control(&mut self, control: Box<dyn EngineControl>);

    /// Drop every stage whose deck has gone away, returning how many
    fn remove_detached(&mut self) -> usize;
}

/// Liveness flag shared between a deck and the stages it installed
#[derive(Debug, Clone)]
pub struct StageLink(Arc<AtomicBool>);

impl StageLink {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Mark every stage holding this link as detached
    pub fn detach(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_attached(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for StageLink {
    fn default() -> Self {
        Self::new()
    }
}

/// Track lifecycle notifications forwarded to engine-side stages
///
/// Everything a stage needs is resolved on the control thread, so stages
/// never lock a track or hold the last reference to one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlNotification {
    TrackLoaded {
        track: TrackId,
        /// Main cue position, 0 when the track has none
        main_cue: f64,
        sample_rate: u32,
    },
    UnloadingTrack {
        track: TrackId,
    },
}

/// Capacity of each stage's notification ring
///
/// A deck sends at most two notifications per load, so this only fills up
/// if the engine stops calling `process` entirely.
pub const NOTIFICATION_QUEUE_CAPACITY: usize = 64;

/// Create a notification ring for one engine stage
pub fn notification_channel(
    capacity: usize,
) -> (
    rtrb::Producer<ControlNotification>,
    rtrb::Consumer<ControlNotification>,
) {
    rtrb::RingBuffer::new(capacity)
}
