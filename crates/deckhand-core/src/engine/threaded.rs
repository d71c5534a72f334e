//! Thread-backed buffer engine
//!
//! Runs a [`TrackDecoder`] on a dedicated loader thread so decoding never
//! blocks the control thread. Each request's outcome is sent back on the
//! reply channel carried by the request, in the order requests arrived.
//!
//! Processing stages installed with [`BufferEngine::add_control`] are run by
//! whoever drives the audio callback, through [`ThreadedEngine::process`].

use std::collections::HashMap;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{Receiver, Sender};

use super::{
    engine_channel, BufferEngine, EngineCommand, EngineControl, EngineEvent, EngineFrame,
    EngineHandle,
};
use crate::track::{Track, TrackPointer};

/// Turns a track's file into playable buffers
pub trait TrackDecoder: Send + 'static {
    /// Decode the track, or explain why it can't be played
    fn decode(&self, track: &Track) -> Result<(), String>;
}

/// Decoder that only checks the file exists and can be opened
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCheckDecoder;

impl TrackDecoder for FileCheckDecoder {
    fn decode(&self, track: &Track) -> Result<(), String> {
        let location = track.location();
        let metadata = std::fs::metadata(&location)
            .map_err(|e| format!("The file '{}' could not be found: {}", location.display(), e))?;
        if !metadata.is_file() {
            return Err(format!("'{}' is not a file", location.display()));
        }
        std::fs::File::open(&location)
            .map(|_| ())
            .map_err(|e| format!("The file '{}' could not be opened: {}", location.display(), e))
    }
}

/// A buffer engine whose decoding happens on a background thread
pub struct ThreadedEngine {
    handle: EngineHandle,
    controls: Vec<Box<dyn EngineControl>>,
    thread: Option<JoinHandle<()>>,
}

impl ThreadedEngine {
    /// Spawn the loader thread
    pub fn spawn<D: TrackDecoder>(decoder: D) -> io::Result<Self> {
        let (handle, rx) = engine_channel();

        let thread = thread::Builder::new()
            .name("track-loader".to_string())
            .spawn(move || loader_thread(rx, decoder))?;

        log::info!("ThreadedEngine spawned");

        Ok(Self {
            handle,
            controls: Vec::new(),
            thread: Some(thread),
        })
    }

    /// Run every attached processing stage installed for `group`
    pub fn process(&mut self, group: &str, frame: &EngineFrame) {
        for control in self
            .controls
            .iter_mut()
            .filter(|c| c.group() == group && c.is_attached())
        {
            control.process(frame);
        }
    }

    /// Number of attached processing stages
    pub fn control_count(&self) -> usize {
        self.controls.iter().filter(|c| c.is_attached()).count()
    }

    /// Stop the loader thread and wait for it to exit
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            if self.handle.shutdown().is_err() {
                log::warn!("Loader thread already gone");
            }
            if thread.join().is_err() {
                log::error!("Loader thread panicked");
            }
        }
    }
}

impl BufferEngine for ThreadedEngine {
    fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    fn add_control(&mut self, control: Box<dyn EngineControl>) {
        self.remove_detached();
        log::debug!("Installing engine control for {}", control.group());
        self.controls.push(control);
    }

    fn remove_detached(&mut self) -> usize {
        let before = self.controls.len();
        self.controls.retain(|c| c.is_attached());
        let removed = before - self.controls.len();
        if removed > 0 {
            log::debug!("Removed {} detached engine controls", removed);
        }
        removed
    }
}

impl Drop for ThreadedEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Track currently held by the engine for a group
struct LoadedBuffer {
    reply: Sender<EngineEvent>,
    track: TrackPointer,
}

fn loader_thread<D: TrackDecoder>(rx: Receiver<EngineCommand>, decoder: D) {
    log::info!("Track loader thread started");

    let mut loaded: HashMap<String, LoadedBuffer> = HashMap::new();

    while let Ok(command) = rx.recv() {
        match command {
            EngineCommand::Load(request) => {
                let start = Instant::now();
                let event = match decoder.decode(&request.track) {
                    Ok(()) => {
                        log::info!(
                            "Loader: {} decoded '{}' in {:?}",
                            request.group,
                            request.track.filename(),
                            start.elapsed()
                        );
                        loaded.insert(
                            request.group.clone(),
                            LoadedBuffer {
                                reply: request.reply.clone(),
                                track: request.track.clone(),
                            },
                        );
                        EngineEvent::Loaded {
                            ticket: request.ticket,
                            track: request.track,
                        }
                    }
                    Err(reason) => {
                        log::error!("Failed to load track: {}", reason);
                        loaded.remove(&request.group);
                        EngineEvent::LoadFailed {
                            ticket: request.ticket,
                            track: request.track,
                            reason,
                        }
                    }
                };
                if request.reply.send(event).is_err() {
                    log::debug!("Loader: deck {} went away before completion", request.group);
                }
            }
            EngineCommand::Eject { group } => {
                if let Some(buffer) = loaded.remove(&group) {
                    let _ = buffer.reply.send(EngineEvent::Unloaded {
                        track: buffer.track,
                    });
                }
            }
            EngineCommand::Shutdown => break,
        }
    }

    log::info!("Track loader thread shutting down");
}
