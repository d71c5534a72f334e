//! Main cue handling on the engine side

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::control::ControlValue;
use crate::engine::{ControlNotification, EngineControl, EngineFrame, StageLink};
use crate::track::{CueType, Track, TrackId};
use crate::types::EMPTY_POSITION;

/// Which track's main cue is currently on the deck's `cue_point` control
///
/// Written by [`CueControl`] on the audio thread, read by the deck when it
/// unloads a track. Track ids start at 1, so 0 means none.
#[derive(Debug, Clone, Default)]
pub struct PublishedCue(Arc<AtomicU64>);

impl PublishedCue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_published(&self, track: TrackId) -> bool {
        self.0.load(Ordering::Acquire) == track.0
    }

    fn publish(&self, track: Option<TrackId>) {
        self.0.store(track.map_or(0, |id| id.0), Ordering::Release);
    }
}

/// Publishes a track's main cue while it is loaded and clears it on unload
pub struct CueControl {
    group: String,
    notifications: rtrb::Consumer<ControlNotification>,
    cue_point: Arc<ControlValue>,
    published: PublishedCue,
    link: StageLink,
}

impl CueControl {
    pub fn new(
        group: impl Into<String>,
        notifications: rtrb::Consumer<ControlNotification>,
        cue_point: Arc<ControlValue>,
        published: PublishedCue,
        link: StageLink,
    ) -> Self {
        Self {
            group: group.into(),
            notifications,
            cue_point,
            published,
            link,
        }
    }
}

/// Main cue of a track, falling back to its first `Main` cue point, then 0
pub fn main_cue_position(track: &Track) -> f64 {
    let position = track.cue_point();
    if position >= 0.0 {
        return position;
    }
    track
        .cue_points()
        .iter()
        .find(|cue| cue.cue_type == CueType::Main)
        .map(|cue| cue.position as f64)
        .unwrap_or(0.0)
}

/// Store the deck's cue point as the track's main cue
///
/// Only applies while the cue stage is showing this track's cue; before
/// that, `cue_point` still holds whatever the previous track left. Returns
/// whether the track was updated.
pub fn save_main_cue(track: &Track, published: &PublishedCue, cue_point: &ControlValue) -> bool {
    if !published.is_published(track.id()) {
        return false;
    }
    let position = cue_point.get();
    if position < 0.0 {
        return false;
    }
    track.set_cue_point(position);
    true
}

impl EngineControl for CueControl {
    fn group(&self) -> &str {
        &self.group
    }

    fn process(&mut self, _frame: &EngineFrame) {
        while let Ok(notification) = self.notifications.pop() {
            match notification {
                ControlNotification::TrackLoaded {
                    track, main_cue, ..
                } => {
                    self.cue_point.set_realtime(main_cue);
                    self.published.publish(Some(track));
                }
                ControlNotification::UnloadingTrack { track } => {
                    // Ignore tracks whose load we never applied
                    if self.published.is_published(track) {
                        self.published.publish(None);
                        self.cue_point.set_realtime(EMPTY_POSITION);
                    }
                }
            }
        }
    }

    fn is_attached(&self) -> bool {
        self.link.is_attached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlKey;
    use crate::engine::notification_channel;

    struct Harness {
        control: CueControl,
        tx: rtrb::Producer<ControlNotification>,
        cue_point: Arc<ControlValue>,
        published: PublishedCue,
    }

    fn harness() -> Harness {
        let (tx, rx) = notification_channel(8);
        let cue_point = Arc::new(ControlValue::new(
            ControlKey::new("[Channel1]", "cue_point"),
            EMPTY_POSITION,
        ));
        let published = PublishedCue::new();
        let control = CueControl::new(
            "[Channel1]",
            rx,
            cue_point.clone(),
            published.clone(),
            StageLink::new(),
        );
        Harness {
            control,
            tx,
            cue_point,
            published,
        }
    }

    fn loaded(track: &Track) -> ControlNotification {
        ControlNotification::TrackLoaded {
            track: track.id(),
            main_cue: main_cue_position(track),
            sample_rate: track.sample_rate(),
        }
    }

    #[test]
    fn test_publishes_main_cue_on_load() {
        let mut h = harness();
        let track = Track::new("/music/a.flac");
        track.set_cue_point(4410.0);

        h.tx.push(loaded(&track)).unwrap();
        assert_eq!(h.cue_point.get(), EMPTY_POSITION);
        assert!(!h.published.is_published(track.id()));

        h.control.process(&EngineFrame::default());
        assert_eq!(h.cue_point.get(), 4410.0);
        assert!(h.published.is_published(track.id()));
    }

    #[test]
    fn test_main_cue_falls_back_to_cue_list_then_zero() {
        let with_cue = Track::new("/music/a.flac");
        with_cue.add_cue(CueType::Main, 882, 0);
        assert_eq!(main_cue_position(&with_cue), 882.0);

        assert_eq!(main_cue_position(&Track::new("/music/b.flac")), 0.0);
    }

    #[test]
    fn test_save_and_clear_on_unload() {
        let mut h = harness();
        let track = Track::new("/music/a.flac");

        h.tx.push(loaded(&track)).unwrap();
        h.control.process(&EngineFrame::default());
        h.cue_point.set(8820.0);

        assert!(save_main_cue(&track, &h.published, &h.cue_point));
        assert_eq!(track.cue_point(), 8820.0);

        h.tx.push(ControlNotification::UnloadingTrack { track: track.id() })
            .unwrap();
        h.control.process(&EngineFrame::default());
        assert_eq!(h.cue_point.get(), EMPTY_POSITION);
        assert!(!h.published.is_published(track.id()));
    }

    #[test]
    fn test_unpublished_track_is_not_saved() {
        let mut h = harness();
        let previous = Track::new("/music/a.flac");
        let pending = Track::new("/music/b.flac");

        h.tx.push(loaded(&previous)).unwrap();
        h.control.process(&EngineFrame::default());
        h.cue_point.set(1234.0);

        // The stage hasn't seen `pending` load yet
        assert!(!save_main_cue(&pending, &h.published, &h.cue_point));
        assert_eq!(pending.cue_point(), EMPTY_POSITION);
    }

    #[test]
    fn test_ignores_unload_of_other_track() {
        let mut h = harness();
        let current = Track::new("/music/a.flac");
        let other = Track::new("/music/b.flac");

        h.tx.push(loaded(&current)).unwrap();
        h.tx.push(ControlNotification::UnloadingTrack { track: other.id() })
            .unwrap();
        h.control.process(&EngineFrame::default());

        assert_eq!(h.cue_point.get(), 0.0);
        assert!(h.published.is_published(current.id()));
    }
}
