//! Control values owned by a deck

use std::sync::Arc;

use crate::control::{ControlKey, ControlRegistry, ControlValue};
use crate::types::EMPTY_POSITION;

pub const CUE_POINT: &str = "cue_point";
pub const LOOP_START_POSITION: &str = "loop_start_position";
pub const LOOP_END_POSITION: &str = "loop_end_position";
pub const PLAY_POSITION: &str = "playposition";
pub const DURATION: &str = "duration";
pub const FILE_BPM: &str = "file_bpm";
pub const REPLAY_GAIN: &str = "replaygain";
pub const VISUAL_RESAMPLE: &str = "VisualResample";
pub const BEAT_ACTIVE: &str = "beat_active";

/// The control values of one deck's group
///
/// Loop points and the cue point default to -1 (unset), everything else to 0.
#[derive(Debug, Clone)]
pub struct DeckControls {
    pub cue_point: Arc<ControlValue>,
    pub loop_in: Arc<ControlValue>,
    pub loop_out: Arc<ControlValue>,
    pub play_position: Arc<ControlValue>,
    pub duration: Arc<ControlValue>,
    pub bpm: Arc<ControlValue>,
    pub replay_gain: Arc<ControlValue>,
    pub visual_resample: Arc<ControlValue>,
    pub beat_active: Arc<ControlValue>,
}

impl DeckControls {
    /// Create (or look up) the group's controls in the registry
    pub fn create(registry: &ControlRegistry, group: &str, visual_resample_rate: f64) -> Self {
        let control = |item: &str, default: f64| {
            registry.get_or_create(ControlKey::new(group, item), default)
        };
        Self {
            cue_point: control(CUE_POINT, EMPTY_POSITION),
            loop_in: control(LOOP_START_POSITION, EMPTY_POSITION),
            loop_out: control(LOOP_END_POSITION, EMPTY_POSITION),
            play_position: control(PLAY_POSITION, 0.0),
            duration: control(DURATION, 0.0),
            bpm: control(FILE_BPM, 0.0),
            replay_gain: control(REPLAY_GAIN, 0.0),
            visual_resample: control(VISUAL_RESAMPLE, visual_resample_rate),
            beat_active: control(BEAT_ACTIVE, 0.0),
        }
    }

    /// Clear the loop window to the unset sentinel
    pub fn reset_loop(&self) {
        self.loop_in.set(EMPTY_POSITION);
        self.loop_out.set(EMPTY_POSITION);
    }

    /// Zero the metadata published for a loaded track
    pub fn reset_track_metadata(&self) {
        self.duration.set(0.0);
        self.bpm.set(0.0);
        self.replay_gain.set(0.0);
        self.reset_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controls_are_addressable_by_group() {
        let registry = ControlRegistry::new();
        let controls = DeckControls::create(&registry, "[Channel1]", 2.0);

        let loop_in = registry
            .get(&ControlKey::new("[Channel1]", LOOP_START_POSITION))
            .unwrap();
        assert!(Arc::ptr_eq(&loop_in, &controls.loop_in));
        assert_eq!(loop_in.get(), EMPTY_POSITION);
        assert_eq!(controls.visual_resample.get(), 2.0);
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn test_reset_track_metadata() {
        let registry = ControlRegistry::new();
        let controls = DeckControls::create(&registry, "[Channel1]", 1.0);
        controls.duration.set(180000.0);
        controls.bpm.set(128.0);
        controls.loop_in.set(100.0);

        controls.reset_track_metadata();
        assert_eq!(controls.duration.get(), 0.0);
        assert_eq!(controls.bpm.get(), 0.0);
        assert_eq!(controls.loop_in.get(), EMPTY_POSITION);
        assert_eq!(controls.loop_out.get(), EMPTY_POSITION);
    }
}
