//! Hand-driven engine and collaborators for deck tests

use std::sync::Mutex;

use crossbeam::channel::Receiver;

use super::{
    engine_channel, BufferEngine, EngineCommand, EngineControl, EngineEvent, EngineFrame,
    EngineHandle, LoadRequest,
};
use crate::metadata::{MetadataError, MetadataParser};
use crate::now_playing::NowPlaying;
use crate::track::{Track, TrackId, TrackPointer};

/// Engine that never decodes anything on its own
///
/// Tests pop the requests a deck dispatched and answer them explicitly, in
/// whatever order the scenario needs.
pub(crate) struct ManualEngine {
    handle: EngineHandle,
    commands: Receiver<EngineCommand>,
    controls: Vec<Box<dyn EngineControl>>,
    pub ejected: Vec<String>,
}

impl ManualEngine {
    pub fn new() -> Self {
        let (handle, commands) = engine_channel();
        Self {
            handle,
            commands,
            controls: Vec::new(),
            ejected: Vec::new(),
        }
    }

    /// Next load request, recording any ejects queued before it
    pub fn next_load(&mut self) -> Option<LoadRequest> {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                EngineCommand::Load(request) => return Some(request),
                EngineCommand::Eject { group } => self.ejected.push(group),
                EngineCommand::Shutdown => {}
            }
        }
        None
    }

    pub fn complete(request: &LoadRequest) {
        request
            .reply
            .send(EngineEvent::Loaded {
                ticket: request.ticket,
                track: request.track.clone(),
            })
            .unwrap();
    }

    pub fn fail(request: &LoadRequest, reason: &str) {
        request
            .reply
            .send(EngineEvent::LoadFailed {
                ticket: request.ticket,
                track: request.track.clone(),
                reason: reason.to_string(),
            })
            .unwrap();
    }

    pub fn process(&mut self, frame: &EngineFrame) {
        for control in self.controls.iter_mut().filter(|c| c.is_attached()) {
            control.process(frame);
        }
    }

    pub fn control_count(&self) -> usize {
        self.controls.iter().filter(|c| c.is_attached()).count()
    }

    /// Installed stages, attached or not
    pub fn installed_count(&self) -> usize {
        self.controls.len()
    }
}

impl BufferEngine for ManualEngine {
    fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    fn add_control(&mut self, control: Box<dyn EngineControl>) {
        self.remove_detached();
        self.controls.push(control);
    }

    fn remove_detached(&mut self) -> usize {
        let before = self.controls.len();
        self.controls.retain(|c| c.is_attached());
        before - self.controls.len()
    }
}

/// Now-playing directory that records every update
#[derive(Default)]
pub(crate) struct RecordingNowPlaying {
    pub updates: Mutex<Vec<(String, Option<TrackId>)>>,
}

impl RecordingNowPlaying {
    pub fn updates(&self) -> Vec<(String, Option<TrackId>)> {
        self.updates.lock().unwrap().clone()
    }
}

impl NowPlaying for RecordingNowPlaying {
    fn set_track_info(&self, group: &str, track: Option<TrackPointer>) {
        self.updates
            .lock()
            .unwrap()
            .push((group.to_string(), track.map(|t| t.id())));
    }
}

/// Parser that counts calls and optionally fills in a tempo
#[derive(Default)]
pub(crate) struct CountingParser {
    pub calls: Mutex<u32>,
    pub bpm: Option<f64>,
}

impl MetadataParser for CountingParser {
    fn parse_header(&self, track: &Track) -> Result<(), MetadataError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(bpm) = self.bpm {
            track.set_bpm(bpm);
        }
        Ok(())
    }
}
