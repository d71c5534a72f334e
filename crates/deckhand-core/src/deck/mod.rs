//! Deck orchestrator
//!
//! A [`Deck`] owns "what is loaded on this deck". It drives the asynchronous
//! load protocol against a [`BufferEngine`], keeps the deck's control values
//! in step with the loaded track, and persists the loop window into the
//! track's cues whenever the track is swapped out.
//!
//! ```text
//!            request_load            Loaded (pending ticket)
//!   Empty ─────────────────► Loading ─────────────────────► Loaded
//!     ▲                         │  ▲                           │
//!     │     LoadFailed          │  │ request_load              │
//!     ├─────────────────────────┘  └───────────────────────────┤
//!     │                   eject / engine Unloaded               │
//!     └─────────────────────────────────────────────────────────┘
//! ```
//!
//! A deck lives on one control thread. Completions arrive on the deck's own
//! channel and are applied by [`Deck::process_pending`] (or one at a time via
//! [`Deck::handle_engine_event`]); anything carrying a ticket other than the
//! pending one is stale and dropped.

mod clock_control;
mod controls;
mod cue_control;
mod events;

pub use clock_control::ClockControl;
pub use controls::{
    DeckControls, BEAT_ACTIVE, CUE_POINT, DURATION, FILE_BPM, LOOP_END_POSITION,
    LOOP_START_POSITION, PLAY_POSITION, REPLAY_GAIN, VISUAL_RESAMPLE,
};
pub use cue_control::{main_cue_position, save_main_cue, CueControl, PublishedCue};
pub use events::{DeckEvent, DeckListener, DeckState, DeckTransition};

use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender, TrySendError};

use crate::config::DeckhandConfig;
use crate::control::ControlRegistry;
use crate::engine::{
    notification_channel, BufferEngine, ControlNotification, EngineEvent, EngineHandle,
    LoadRequest, LoadTicket, StageLink,
};
use crate::error::{DeckError, DeckResult};
use crate::loops::{find_loop_window, save_loop_window, LoopWindow};
use crate::metadata::MetadataParser;
use crate::now_playing::NowPlaying;
use crate::track::{same_track, SinkId, TrackPointer};
use crate::types::EMPTY_POSITION;

/// Session-wide collaborators shared by every deck
#[derive(Clone)]
pub struct DeckServices {
    pub controls: Arc<ControlRegistry>,
    pub now_playing: Arc<dyn NowPlaying>,
    pub parser: Arc<dyn MetadataParser>,
}

/// One playback deck
pub struct Deck {
    group: String,
    state: DeckState,
    /// Current track, loaded or pending
    loaded_track: Option<TrackPointer>,
    metadata_sink: Option<SinkId>,
    last_ticket: LoadTicket,
    controls: DeckControls,
    engine: EngineHandle,
    completion_tx: Sender<EngineEvent>,
    completion_rx: Receiver<EngineEvent>,
    now_playing: Arc<dyn NowPlaying>,
    parser: Arc<dyn MetadataParser>,
    /// Rings to the engine-side controls (cue, clock)
    control_notifications: Vec<rtrb::Producer<ControlNotification>>,
    /// Cleared on drop so the engine retires this deck's controls
    stages: StageLink,
    published_cue: PublishedCue,
    listeners: Vec<Box<dyn DeckListener>>,
    subscribers: Vec<Sender<DeckEvent>>,
    event_capacity: usize,
}

impl Deck {
    /// Create a deck for `group` and install its engine-side controls
    ///
    /// Channel capacities below 1 are raised to 1.
    pub fn new(
        group: impl Into<String>,
        services: &DeckServices,
        engine: &mut dyn BufferEngine,
        config: &DeckhandConfig,
    ) -> Self {
        let group = group.into();
        let controls =
            DeckControls::create(&services.controls, &group, config.visual_resample_rate);

        let stages = StageLink::new();
        let published_cue = PublishedCue::new();
        let notification_capacity = config.notification_capacity.max(1);

        let (cue_tx, cue_rx) = notification_channel(notification_capacity);
        engine.add_control(Box::new(CueControl::new(
            group.clone(),
            cue_rx,
            controls.cue_point.clone(),
            published_cue.clone(),
            stages.clone(),
        )));

        let (clock_tx, clock_rx) = notification_channel(notification_capacity);
        engine.add_control(Box::new(ClockControl::new(
            group.clone(),
            clock_rx,
            controls.bpm.clone(),
            controls.beat_active.clone(),
            config.beat_window_ms,
            stages.clone(),
        )));

        let (completion_tx, completion_rx) = crossbeam::channel::unbounded();

        log::info!("Deck {} created", group);

        Self {
            group,
            state: DeckState::Empty,
            loaded_track: None,
            metadata_sink: None,
            last_ticket: LoadTicket::default(),
            controls,
            engine: engine.handle(),
            completion_tx,
            completion_rx,
            now_playing: services.now_playing.clone(),
            parser: services.parser.clone(),
            control_notifications: vec![cue_tx, clock_tx],
            stages,
            published_cue,
            listeners: Vec::new(),
            subscribers: Vec::new(),
            event_capacity: config.event_capacity.max(1),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn state(&self) -> DeckState {
        self.state
    }

    /// The current track, whether loaded or still pending
    pub fn loaded_track(&self) -> Option<&TrackPointer> {
        self.loaded_track.as_ref()
    }

    pub fn controls(&self) -> &DeckControls {
        &self.controls
    }

    /// Channel the engine reports this deck's completions on
    ///
    /// Useful for `select!`ing over several decks; feed whatever arrives to
    /// [`Deck::handle_engine_event`].
    pub fn completions(&self) -> &Receiver<EngineEvent> {
        &self.completion_rx
    }

    pub fn add_listener(&mut self, listener: Box<dyn DeckListener>) {
        self.listeners.push(listener);
    }

    /// Receive every [`DeckEvent`] emitted from now on
    ///
    /// Events are dropped (with a warning) for a subscriber that falls more
    /// than `event_capacity` events behind.
    pub fn subscribe(&mut self) -> Receiver<DeckEvent> {
        let (tx, rx) = crossbeam::channel::bounded(self.event_capacity);
        self.subscribers.push(tx);
        rx
    }

    /// Start loading `track`, replacing whatever the deck holds
    ///
    /// Returns as soon as the request is queued. The outcome arrives later as
    /// an [`EngineEvent`] on [`Deck::completions`].
    pub fn request_load(&mut self, track: TrackPointer, resume_from_saved_position: bool) {
        self.release_current();

        self.metadata_sink = Some(track.bind_metadata(
            self.controls.bpm.clone(),
            self.controls.replay_gain.clone(),
        ));
        self.loaded_track = Some(track.clone());

        let ticket = self.last_ticket.next();
        self.last_ticket = ticket;
        self.state = DeckState::Loading { ticket };

        log::info!(
            "Deck {}: loading '{}' (ticket {})",
            self.group,
            track.filename(),
            ticket
        );

        for listener in &mut self.listeners {
            listener.on_load_requested(&track);
        }
        self.broadcast(DeckEvent::LoadRequested {
            group: self.group.clone(),
            track: track.clone(),
        });

        let request = LoadRequest {
            group: self.group.clone(),
            ticket,
            track: track.clone(),
            resume_from_saved_position,
            reply: self.completion_tx.clone(),
        };
        if let Err(e) = self.engine.load(request) {
            log::error!("Deck {}: {}", self.group, e);
            self.apply_load_failure(&track, e.to_string());
        }
    }

    /// Clear the deck
    ///
    /// Saves the loop window, zeroes the track metadata controls and clears
    /// the deck's now-playing entry. Does nothing on an empty deck.
    pub fn eject(&mut self) {
        if self.eject_current() {
            if let Err(e) = self.engine.eject(&self.group) {
                log::warn!("Deck {}: couldn't release engine buffers: {}", self.group, e);
            }
        }
    }

    /// Apply a single engine report
    pub fn handle_engine_event(&mut self, event: EngineEvent) -> DeckResult<DeckTransition> {
        match event {
            EngineEvent::Loaded { ticket, track } => {
                self.check_pending(ticket, &track)?;
                self.finish_loading(&track);
                Ok(DeckTransition::Loaded)
            }
            EngineEvent::LoadFailed {
                ticket,
                track,
                reason,
            } => {
                self.check_pending(ticket, &track)?;
                let error = self.apply_load_failure(&track, reason);
                Ok(DeckTransition::Failed(error))
            }
            EngineEvent::Unloaded { track } => {
                let is_loaded = self.state == DeckState::Loaded
                    && self
                        .loaded_track
                        .as_ref()
                        .is_some_and(|current| same_track(current, &track));
                if is_loaded {
                    self.eject_current();
                    Ok(DeckTransition::Ejected)
                } else {
                    log::debug!(
                        "Deck {}: ignoring unload of '{}'",
                        self.group,
                        track.filename()
                    );
                    Ok(DeckTransition::Ignored)
                }
            }
        }
    }

    /// Apply every completion received so far
    ///
    /// Stale completions are logged and skipped; the rest are returned in
    /// arrival order.
    pub fn process_pending(&mut self) -> Vec<DeckTransition> {
        let mut transitions = Vec::new();
        while let Ok(event) = self.completion_rx.try_recv() {
            match self.handle_engine_event(event) {
                Ok(transition) => transitions.push(transition),
                Err(e) => log::debug!("Deck {}: {}", self.group, e),
            }
        }
        transitions
    }

    fn pending_ticket(&self) -> Option<LoadTicket> {
        match self.state {
            DeckState::Loading { ticket } => Some(ticket),
            _ => None,
        }
    }

    fn check_pending(&self, ticket: LoadTicket, track: &TrackPointer) -> DeckResult<()> {
        let pending = self.pending_ticket();
        let current = pending == Some(ticket)
            && self
                .loaded_track
                .as_ref()
                .is_some_and(|loaded| same_track(loaded, track));
        if current {
            Ok(())
        } else {
            Err(DeckError::StaleCompletion { ticket, pending })
        }
    }

    /// Unload sub-protocol: save the loop and main cue, unbind, notify
    ///
    /// Control values are left alone. Returns the released track.
    fn release_current(&mut self) -> Option<TrackPointer> {
        let track = self.loaded_track.take()?;

        // While loading, the loop controls still describe the previous track
        if self.state == DeckState::Loaded {
            match LoopWindow::from_controls(
                self.controls.loop_in.get(),
                self.controls.loop_out.get(),
            ) {
                Ok(window) => {
                    save_loop_window(&track, window);
                    log::debug!(
                        "Deck {}: saved loop {}..{} to '{}'",
                        self.group,
                        window.start(),
                        window.end(),
                        track.filename()
                    );
                }
                Err(e) => log::debug!("Deck {}: not saving loop: {}", self.group, e),
            }
        }

        if save_main_cue(&track, &self.published_cue, &self.controls.cue_point) {
            log::debug!(
                "Deck {}: saved main cue {} to '{}'",
                self.group,
                track.cue_point(),
                track.filename()
            );
        }

        if let Some(sink) = self.metadata_sink.take() {
            track.unbind_metadata(sink);
        }
        track.set_loaded(false);
        self.state = DeckState::Empty;

        log::info!("Deck {}: unloading '{}'", self.group, track.filename());

        for listener in &mut self.listeners {
            listener.on_unloading_track(&track);
        }
        self.notify_controls(ControlNotification::UnloadingTrack { track: track.id() });
        self.broadcast(DeckEvent::UnloadingTrack {
            group: self.group.clone(),
            track: track.clone(),
        });

        Some(track)
    }

    /// Release the current track and zero everything describing it
    fn eject_current(&mut self) -> bool {
        if self.release_current().is_none() {
            return false;
        }

        self.controls.reset_track_metadata();
        self.controls.play_position.set(0.0);
        self.now_playing.set_track_info(&self.group, None);

        log::info!("Deck {}: ejected", self.group);
        self.broadcast(DeckEvent::Ejected {
            group: self.group.clone(),
        });
        true
    }

    fn finish_loading(&mut self, track: &TrackPointer) {
        if !track.header_parsed() {
            match self.parser.parse_header(track) {
                Ok(()) => track.set_header_parsed(true),
                Err(e) => log::warn!("Deck {}: {}", self.group, e),
            }
        }

        track.inc_times_played();
        track.set_visual_resample_rate(self.controls.visual_resample.get());

        self.controls.duration.set(track.duration());
        self.controls.bpm.set(track.bpm());
        self.controls.replay_gain.set(track.replay_gain());

        self.controls.reset_loop();
        if let Some(window) = find_loop_window(&track.cue_points()) {
            self.controls.loop_in.set(window.start() as f64);
            self.controls.loop_out.set(window.end() as f64);
        }

        track.set_loaded(true);
        self.now_playing
            .set_track_info(&self.group, Some(track.clone()));
        self.state = DeckState::Loaded;

        log::info!(
            "Deck {}: loaded '{}' ({:.1} BPM)",
            self.group,
            track.filename(),
            track.bpm()
        );

        for listener in &mut self.listeners {
            listener.on_track_loaded(track);
        }
        self.notify_controls(ControlNotification::TrackLoaded {
            track: track.id(),
            main_cue: main_cue_position(track),
            sample_rate: track.sample_rate(),
        });
        self.broadcast(DeckEvent::TrackLoaded {
            group: self.group.clone(),
            track: track.clone(),
        });
    }

    /// Drop a pending track the engine couldn't load
    ///
    /// Controls and the now-playing entry are left untouched.
    fn apply_load_failure(&mut self, track: &TrackPointer, reason: String) -> DeckError {
        if let Some(sink) = self.metadata_sink.take() {
            track.unbind_metadata(sink);
        }
        track.set_loaded(false);
        self.loaded_track = None;
        self.state = DeckState::Empty;

        let error = DeckError::LoadFailure {
            location: track.location(),
            reason: reason.clone(),
        };
        log::warn!("Deck {}: {}", self.group, error);

        for listener in &mut self.listeners {
            listener.on_load_failed(track, &reason);
        }
        self.broadcast(DeckEvent::LoadFailed {
            group: self.group.clone(),
            track: track.clone(),
            reason,
        });
        error
    }

    fn notify_controls(&mut self, notification: ControlNotification) {
        for producer in &mut self.control_notifications {
            if producer.push(notification).is_err() {
                log::warn!("Deck {}: engine control queue full", self.group);
            }
        }
    }

    fn broadcast(&mut self, event: DeckEvent) {
        self.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Deck event subscriber lagging, dropped {:?}", event);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

impl Drop for Deck {
    fn drop(&mut self) {
        self.release_current();

        // The engine stops running our controls from here on, so clear what
        // they would have cleared on unload
        self.stages.detach();
        self.controls.cue_point.set(EMPTY_POSITION);
        self.controls.beat_active.set(0.0);
        log::debug!("Deck {} dropped", self.group);
    }
}
