//! Beat indicator driven by the loaded track's tempo

use std::sync::Arc;

use crate::control::ControlValue;
use crate::engine::{ControlNotification, EngineControl, EngineFrame, StageLink};
use crate::track::TrackId;
use crate::types::CHANNELS;

/// Sets `beat_active` for a short window after every beat
///
/// Tempo is read from the deck's `file_bpm` control on every buffer so live
/// tempo updates take effect immediately. The sample rate comes with the
/// track-loaded notification.
pub struct ClockControl {
    group: String,
    notifications: rtrb::Consumer<ControlNotification>,
    bpm: Arc<ControlValue>,
    beat_active: Arc<ControlValue>,
    beat_window_ms: f64,
    track: Option<TrackId>,
    sample_rate: u32,
    link: StageLink,
}

impl ClockControl {
    pub fn new(
        group: impl Into<String>,
        notifications: rtrb::Consumer<ControlNotification>,
        bpm: Arc<ControlValue>,
        beat_active: Arc<ControlValue>,
        beat_window_ms: f64,
        link: StageLink,
    ) -> Self {
        Self {
            group: group.into(),
            notifications,
            bpm,
            beat_active,
            beat_window_ms,
            track: None,
            sample_rate: 0,
            link,
        }
    }

    fn drain_notifications(&mut self) {
        while let Ok(notification) = self.notifications.pop() {
            match notification {
                ControlNotification::TrackLoaded {
                    track, sample_rate, ..
                } => {
                    self.track = Some(track);
                    self.sample_rate = sample_rate;
                }
                ControlNotification::UnloadingTrack { track } => {
                    if self.track == Some(track) {
                        self.track = None;
                        self.sample_rate = 0;
                    }
                }
            }
        }
    }

    /// Whether `position` (interleaved samples) falls inside a beat window
    fn on_beat(&self, position: f64) -> bool {
        let bpm = self.bpm.get();
        if self.track.is_none() || self.sample_rate == 0 || bpm <= 0.0 || position < 0.0 {
            return false;
        }

        let samples_per_second = f64::from(self.sample_rate) * CHANNELS as f64;
        let samples_per_beat = samples_per_second * 60.0 / bpm;
        let window = samples_per_second * self.beat_window_ms / 1000.0;
        position.rem_euclid(samples_per_beat) < window
    }
}

impl EngineControl for ClockControl {
    fn group(&self) -> &str {
        &self.group
    }

    fn process(&mut self, frame: &EngineFrame) {
        self.drain_notifications();
        let active = if self.on_beat(frame.position) { 1.0 } else { 0.0 };
        self.beat_active.set_realtime(active);
    }

    fn is_attached(&self) -> bool {
        self.link.is_attached()
    }
}
