//! Per-deck state shared between the control console and the poller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio::decoder::TrackSource;
use crate::audio::mixer::Mixer;
use crate::audio::player::{Player, PlayerOptions};
use crate::audio::types::{DeckId, TrackRef};
use crate::error::LoadError;

/// The waveform/position view of a deck. The core calls it, never the reverse.
pub trait DeckDisplay: Send {
    /// Show a newly bound track, or `None` for "No track loaded".
    fn show_track(&mut self, track: Option<&TrackRef>);

    fn set_position_relative(&mut self, position: f64);
}

/// Display that reports to the log.
pub struct LogDisplay {
    deck: DeckId,
    /// Last position logged, in whole percent.
    last_percent: Option<u32>,
}

impl LogDisplay {
    pub fn new(deck: DeckId) -> Self {
        Self {
            deck,
            last_percent: None,
        }
    }
}

impl DeckDisplay for LogDisplay {
    fn show_track(&mut self, track: Option<&TrackRef>) {
        match track {
            Some(track) => log::info!("Deck {}: {}", self.deck, track.display_name()),
            None => log::info!("Deck {}: No track loaded", self.deck),
        }
        self.last_percent = None;
    }

    fn set_position_relative(&mut self, position: f64) {
        let percent = (position * 100.0) as u32;
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            log::trace!("Deck {}: {}%", self.deck, percent);
        }
    }
}

/// One deck: its player, loop flag and display.
pub struct Deck {
    player: Arc<Player>,
    looping: AtomicBool,
    display: Mutex<Box<dyn DeckDisplay>>,
}

impl Deck {
    pub fn new(player: Arc<Player>, display: Box<dyn DeckDisplay>) -> Self {
        Self {
            player,
            looping: AtomicBool::new(false),
            display: Mutex::new(display),
        }
    }

    pub fn id(&self) -> DeckId {
        self.player.deck()
    }

    pub fn player(&self) -> &Arc<Player> {
        &self.player
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Release);
        log::debug!("Deck {}: Loop {}", self.id(), if looping { "on" } else { "off" });
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Acquire)
    }

    /// Load `track` into the player and refresh the display.
    ///
    /// On failure the display shows whatever the player still has bound.
    pub fn load(&self, track: TrackRef) -> Result<(), LoadError> {
        let result = self.player.load(track);
        if let Err(e) = &result {
            log::warn!("Deck {}: Load failed: {}", self.id(), e);
        }

        // Read the binding under the display lock so the last writer shows the last load
        let mut display = self.display.lock();
        let bound = self.player.track();
        display.show_track(bound.as_ref());
        display.set_position_relative(self.player.position_relative());
        result
    }

    /// Push the current position to the display.
    pub fn refresh_position(&self) {
        let position = self.player.position_relative();
        self.display.lock().set_position_relative(position);
    }
}

/// Both decks, constructed once at startup.
#[derive(Clone)]
pub struct Decks {
    decks: [Arc<Deck>; 2],
}

impl Decks {
    /// Build two decks reading from `source`.
    pub fn new<F>(source: Arc<dyn TrackSource>, options: PlayerOptions, mut display: F) -> Self
    where
        F: FnMut(DeckId) -> Box<dyn DeckDisplay>,
    {
        let make = |id: DeckId, display: Box<dyn DeckDisplay>| {
            let player = Arc::new(Player::new(id, Arc::clone(&source), options));
            Arc::new(Deck::new(player, display))
        };
        let one = make(DeckId::One, display(DeckId::One));
        let two = make(DeckId::Two, display(DeckId::Two));
        Self { decks: [one, two] }
    }

    pub fn get(&self, id: DeckId) -> &Arc<Deck> {
        &self.decks[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Deck>> {
        self.decks.iter()
    }

    /// A mixer with both players as inputs.
    pub fn mixer(&self) -> Mixer {
        let mut mixer = Mixer::new();
        for deck in &self.decks {
            mixer.add_input(Arc::clone(deck.player()));
        }
        mixer
    }
}
