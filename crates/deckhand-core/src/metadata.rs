//! Header metadata parsing
//!
//! Decks parse a track's header lazily, the first time the track finishes
//! loading. The track's header-parsed flag keeps this to once per track.
//!
//! [`SidecarParser`] reads tags from a YAML file next to the audio file
//! (`track.flac` → `track.flac.yaml`):
//!
//! ```yaml
//! duration_ms: 180000
//! bpm: 128.0
//! replay_gain: 0.9
//! sample_rate: 44100
//! cues:
//!   - type: main
//!     position: 4410
//!   - type: loop
//!     position: 88200
//!     length: 44100
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::track::{with_appended_extension, CueType, Track};

/// Errors raised while reading track tags
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to read tags from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse tags in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Extracts header metadata into a track
pub trait MetadataParser: Send + Sync {
    /// Fill in the track's header fields
    ///
    /// Callers mark the header as parsed once this returns `Ok`.
    fn parse_header(&self, track: &Track) -> Result<(), MetadataError>;
}

/// Tag document stored next to an audio file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackTags {
    pub duration_ms: Option<f64>,
    pub bpm: Option<f64>,
    pub replay_gain: Option<f64>,
    pub sample_rate: Option<u32>,
    pub cues: Vec<TaggedCue>,
}

/// A cue as written in a tag document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedCue {
    #[serde(rename = "type")]
    pub cue_type: CueType,
    pub position: i64,
    #[serde(default)]
    pub length: i64,
}

/// Reads [`TrackTags`] from `<audio file>.<extension>`
#[derive(Debug, Clone)]
pub struct SidecarParser {
    extension: String,
}

impl Default for SidecarParser {
    fn default() -> Self {
        Self::new("yaml")
    }
}

impl SidecarParser {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    /// Path of the tag document for a track
    pub fn sidecar_path(&self, track: &Track) -> PathBuf {
        with_appended_extension(&track.location(), &self.extension)
    }

    /// Read the tag document, `None` if the track has none
    pub fn read_tags(&self, track: &Track) -> Result<Option<TrackTags>, MetadataError> {
        let path = self.sidecar_path(track);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| MetadataError::Io {
            path: path.clone(),
            source,
        })?;
        serde_yaml::from_str(&contents)
            .map(Some)
            .map_err(|source| MetadataError::Parse { path, source })
    }
}

impl MetadataParser for SidecarParser {
    fn parse_header(&self, track: &Track) -> Result<(), MetadataError> {
        let Some(tags) = self.read_tags(track)? else {
            log::debug!("No tags for {:?}", track.location());
            return Ok(());
        };

        if let Some(duration) = tags.duration_ms {
            track.set_duration(duration);
        }
        if let Some(bpm) = tags.bpm {
            track.set_bpm(bpm);
        }
        if let Some(gain) = tags.replay_gain {
            track.set_replay_gain(gain);
        }
        if let Some(rate) = tags.sample_rate {
            track.set_sample_rate(rate);
        }

        // Cues already on the track came from the library and win
        if track.cue_points().is_empty() {
            for cue in &tags.cues {
                if cue.cue_type == CueType::Main {
                    track.set_cue_point(cue.position as f64);
                }
                track.add_cue(cue.cue_type, cue.position, cue.length);
            }
        }

        log::info!("Parsed tags for '{}'", track.filename());
        Ok(())
    }
}
