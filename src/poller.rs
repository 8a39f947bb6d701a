//! Low-frequency transport poller.
//!
//! Runs off the audio thread. Each tick it applies the end-of-track policy
//! to every deck, pushes positions to the displays, and services the
//! playlist mailbox.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{select, Receiver, Sender};

use crate::audio::types::TransportState;
use crate::deck::{Deck, Decks};
use crate::mailbox::PlaylistMailbox;

pub struct TransportPoller {
    decks: Decks,
    mailbox: Option<Box<dyn PlaylistMailbox>>,
}

impl TransportPoller {
    pub fn new(decks: Decks) -> Self {
        Self {
            decks,
            mailbox: None,
        }
    }

    pub fn with_mailbox(mut self, mailbox: Box<dyn PlaylistMailbox>) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    /// One poll: loop/stop policy, display refresh, then the mailbox.
    pub fn tick(&mut self) {
        for deck in self.decks.iter() {
            apply_end_policy(deck);
            deck.refresh_position();
        }

        let Some(request) = self.mailbox.as_mut().and_then(|m| m.take()) else {
            return;
        };
        log::info!(
            "Playlist: loading {} onto deck {}",
            request.track,
            request.deck
        );
        // Failures are logged by the deck; the request is consumed either way
        let _ = self.decks.get(request.deck).load(request.track);
    }

    /// Tick every `interval` until `shutdown` fires or disconnects.
    pub fn run(mut self, interval: Duration, shutdown: Receiver<()>) {
        let ticker = crossbeam_channel::tick(interval);
        loop {
            select! {
                recv(ticker) -> _ => self.tick(),
                recv(shutdown) -> _ => break,
            }
        }
        log::debug!("Transport poller stopped");
    }

    /// Run on a dedicated thread.
    pub fn spawn(self, interval: Duration) -> std::io::Result<PollerHandle> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let join = thread::Builder::new()
            .name("transport-poller".into())
            .spawn(move || self.run(interval, shutdown_rx))?;
        Ok(PollerHandle {
            shutdown: shutdown_tx,
            join,
        })
    }
}

/// Handle to a poller thread.
pub struct PollerHandle {
    shutdown: Sender<()>,
    join: JoinHandle<()>,
}

impl PollerHandle {
    pub fn stop(self) {
        let _ = self.shutdown.send(());
        if self.join.join().is_err() {
            log::error!("Transport poller thread panicked");
        }
    }
}

/// Rewind a deck that reached the end, then restart or stop it per its loop flag.
///
/// Returns the state the deck was moved to, or `None` if it was not at the end.
/// The rewind moves the position off the end, so a second call is a no-op.
pub fn apply_end_policy(deck: &Deck) -> Option<TransportState> {
    let player = deck.player();
    if player.transport_state() != TransportState::AtEnd {
        return None;
    }

    player.set_position_relative(0.0);
    if deck.is_looping() {
        player.start();
        log::debug!("Deck {}: End reached, looping", deck.id());
        Some(TransportState::Playing)
    } else {
        player.stop();
        log::debug!("Deck {}: End reached, stopping", deck.id());
        Some(TransportState::Stopped)
    }
}
