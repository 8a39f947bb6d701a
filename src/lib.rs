//! Two-deck DJ playback core.
//!
//! Two [`Player`]s, each a resampling transport with gain, are summed by a
//! [`Mixer`] that an audio driver pulls on its own schedule. A
//! [`TransportPoller`] on the control side applies loop/stop policy at the
//! end of a track and picks up playlist handoffs.

pub mod audio;
pub mod config;
pub mod control;
pub mod deck;
pub mod error;
pub mod mailbox;
pub mod poller;

pub use audio::decoder::{MemorySource, SymphoniaSource, TrackSource};
pub use audio::engine::{start_output, OfflineDriver, OutputStream};
pub use audio::mixer::Mixer;
pub use audio::player::{Player, PlayerOptions};
pub use audio::types::{AudioData, DeckId, SpeedMode, StreamSpec, TrackRef, TransportState};
pub use config::Config;
pub use control::{ControlEvent, Controller, DeckCommand, Reply};
pub use deck::{Deck, DeckDisplay, Decks, LogDisplay};
pub use error::{ConfigError, ControlError, EngineError, LoadError};
pub use mailbox::{FileMailbox, HandoffRequest, PlaylistMailbox, SlotMailbox};
pub use poller::TransportPoller;
