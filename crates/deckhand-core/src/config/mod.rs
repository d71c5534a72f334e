//! Deckhand configuration
//!
//! - Generic YAML config loading/saving
//! - Default config path
//! - [`DeckhandConfig`], the settings decks are built from
//!
//! # Usage
//!
//! ```ignore
//! use deckhand_core::config::{default_config_path, load_config, DeckhandConfig};
//!
//! let config: DeckhandConfig = load_config(&default_config_path());
//! for group in config.groups() {
//!     println!("{}", group);
//! }
//! ```

mod io;
mod paths;

pub use io::{load_config, read_config, save_config};
pub use paths::{default_config_dir, default_config_path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::NOTIFICATION_QUEUE_CAPACITY;
use crate::types::NUM_DECKS;

/// Placeholder in [`DeckhandConfig::group_template`] replaced by the deck number
pub const DECK_NUMBER_PLACEHOLDER: &str = "{n}";

/// A setting that decks can't be built from
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("At least one deck is required")]
    NoDecks,
    #[error("{field} must be at least 1")]
    ZeroCapacity { field: &'static str },
    #[error("group_template {template:?} has no {{n}}, so all {deck_count} decks share one group")]
    SharedGroup { template: String, deck_count: usize },
    #[error("beat_window_ms must be a non-negative number, got {0}")]
    InvalidBeatWindow(f64),
}

/// Session-wide deck settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckhandConfig {
    /// Number of decks to create
    pub deck_count: usize,
    /// Control group name for each deck, `{n}` is the 1-based deck number
    pub group_template: String,
    /// Initial value of each deck's `VisualResample` control
    pub visual_resample_rate: f64,
    /// Capacity of each deck event subscription channel
    pub event_capacity: usize,
    /// Capacity of the notification ring to each engine stage
    pub notification_capacity: usize,
    /// How long after a beat the clock's `beat_active` indicator stays lit
    pub beat_window_ms: f64,
}

impl Default for DeckhandConfig {
    fn default() -> Self {
        Self {
            deck_count: NUM_DECKS,
            group_template: "[Channel{n}]".to_string(),
            visual_resample_rate: 1.0,
            event_capacity: 256,
            notification_capacity: NOTIFICATION_QUEUE_CAPACITY,
            beat_window_ms: 50.0,
        }
    }
}

impl DeckhandConfig {
    /// Control group of the deck at `index` (0-based)
    pub fn group_name(&self, index: usize) -> String {
        self.group_template
            .replace(DECK_NUMBER_PLACEHOLDER, &(index + 1).to_string())
    }

    /// Check the settings describe a usable set of decks
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deck_count == 0 {
            return Err(ConfigError::NoDecks);
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroCapacity {
                field: "event_capacity",
            });
        }
        if self.notification_capacity == 0 {
            return Err(ConfigError::ZeroCapacity {
                field: "notification_capacity",
            });
        }
        if self.deck_count > 1 && !self.group_template.contains(DECK_NUMBER_PLACEHOLDER) {
            return Err(ConfigError::SharedGroup {
                template: self.group_template.clone(),
                deck_count: self.deck_count,
            });
        }
        if !(self.beat_window_ms.is_finite() && self.beat_window_ms >= 0.0) {
            return Err(ConfigError::InvalidBeatWindow(self.beat_window_ms));
        }
        Ok(())
    }

    /// Control groups of all configured decks, in order
    pub fn groups(&self) -> Vec<String> {
        (0..self.deck_count).map(|i| self.group_name(i)).collect()
    }
}
