//! Deckhand - headless deck runner
//!
//! Loads the tracks named on the command line onto consecutive decks, waits
//! for the loader to settle every deck and prints what ended up where.
//!
//! ## Usage
//!
//! ```text
//! deckhand [--config PATH] [--decks N] [--write-config] TRACK...
//! ```
//!
//! - `--config PATH`: config file (default: `~/.config/deckhand/config.yaml`)
//! - `--decks N`: override the configured deck count
//! - `--write-config`: save the effective config to the config path
//!
//! More tracks than decks wrap around, so a later track replaces an earlier
//! one on the same deck.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossbeam::channel::{Receiver, Select};

use deckhand_core::config::{default_config_path, load_config, save_config, DeckhandConfig};
use deckhand_core::control::ControlRegistry;
use deckhand_core::deck::{Deck, DeckEvent, DeckServices, DeckState};
use deckhand_core::engine::{EngineFrame, FileCheckDecoder, ThreadedEngine};
use deckhand_core::metadata::SidecarParser;
use deckhand_core::now_playing::PlayerInfo;
use deckhand_core::track::Track;
use deckhand_core::DeckId;

/// How long to wait for all decks to settle
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

struct Args {
    config_path: Option<PathBuf>,
    deck_count: Option<usize>,
    write_config: bool,
    tracks: Vec<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config_path: None,
        deck_count: None,
        write_config: false,
        tracks: Vec::new(),
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config requires a path")?;
                args.config_path = Some(PathBuf::from(path));
            }
            "--decks" => {
                let count = iter.next().context("--decks requires a number")?;
                args.deck_count = Some(
                    count
                        .parse()
                        .with_context(|| format!("Invalid deck count '{}'", count))?,
                );
            }
            "--write-config" => args.write_config = true,
            flag if flag.starts_with("--") => bail!("Unknown flag '{}'", flag),
            track => args.tracks.push(PathBuf::from(track)),
        }
    }

    Ok(args)
}

fn describe(event: &DeckEvent) -> String {
    match event {
        DeckEvent::LoadRequested { track, .. } => format!("load requested: {}", track.filename()),
        DeckEvent::TrackLoaded { track, .. } => format!("loaded: {}", track.filename()),
        DeckEvent::UnloadingTrack { track, .. } => format!("unloading: {}", track.filename()),
        DeckEvent::LoadFailed { track, reason, .. } => {
            format!("load failed: {} ({})", track.filename(), reason)
        }
        DeckEvent::Ejected { .. } => "ejected".to_string(),
    }
}

/// Apply engine completions until no deck is loading or the timeout expires
fn settle(decks: &mut [Deck]) -> Result<()> {
    let deadline = Instant::now() + SETTLE_TIMEOUT;

    while decks
        .iter()
        .any(|deck| matches!(deck.state(), DeckState::Loading { .. }))
    {
        let (index, event) = {
            let mut select = Select::new();
            for deck in decks.iter() {
                select.recv(deck.completions());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Ok(operation) = select.select_timeout(remaining) else {
                log::warn!("Gave up waiting for the loader after {:?}", SETTLE_TIMEOUT);
                break;
            };
            let index = operation.index();
            let event = operation
                .recv(decks[index].completions())
                .context("Deck completion channel closed")?;
            (index, event)
        };

        let deck = &mut decks[index];
        match deck.handle_engine_event(event) {
            Ok(transition) => log::debug!("{}: {:?}", deck.group(), transition),
            Err(e) => log::debug!("{}: {}", deck.group(), e),
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;

    let config_path = args.config_path.unwrap_or_else(default_config_path);
    let mut config: DeckhandConfig = load_config(&config_path);
    if let Some(count) = args.deck_count {
        config.deck_count = count;
    }
    config
        .validate()
        .with_context(|| format!("Invalid config {}", config_path.display()))?;

    if args.write_config {
        save_config(&config, &config_path)?;
    }

    if args.tracks.is_empty() {
        println!("Usage: deckhand [--config PATH] [--decks N] [--write-config] TRACK...");
        return Ok(());
    }

    log::info!("deckhand starting with {} decks", config.deck_count);

    let player_info = Arc::new(PlayerInfo::new());
    let services = DeckServices {
        controls: Arc::new(ControlRegistry::new()),
        now_playing: player_info.clone(),
        parser: Arc::new(SidecarParser::default()),
    };

    let mut engine =
        ThreadedEngine::spawn(FileCheckDecoder).context("Failed to start track loader")?;

    let mut decks: Vec<Deck> = config
        .groups()
        .into_iter()
        .map(|group| Deck::new(group, &services, &mut engine, &config))
        .collect();
    let subscriptions: Vec<Receiver<DeckEvent>> =
        decks.iter_mut().map(|deck| deck.subscribe()).collect();

    for (i, path) in args.tracks.iter().enumerate() {
        let deck = &mut decks[i % config.deck_count];
        deck.request_load(Track::shared(path), false);
    }

    settle(&mut decks)?;

    // One engine pass so the per-deck controls pick up the final state
    for deck in &decks {
        engine.process(deck.group(), &EngineFrame::default());
    }

    for events in &subscriptions {
        for event in events.try_iter() {
            log::info!("{}: {}", event.group(), describe(&event));
        }
    }

    println!();
    for (i, deck) in decks.iter().enumerate() {
        let controls = deck.controls();
        let track = player_info
            .track_info(deck.group())
            .map(|track| track.filename())
            .unwrap_or_else(|| "(empty)".to_string());
        println!(
            "Deck {} {}: {}",
            DeckId(i).display_number(),
            deck.group(),
            track
        );
        if deck.state() == DeckState::Loaded {
            println!(
                "    duration {:.0} ms, {:.2} BPM, gain {:.2}, cue {:.0}, loop {:.0}..{:.0}",
                controls.duration.get(),
                controls.bpm.get(),
                controls.replay_gain.get(),
                controls.cue_point.get(),
                controls.loop_in.get(),
                controls.loop_out.get()
            );
        }
    }

    Ok(())
}
