//! Control-thread events and their single dispatcher.
//!
//! Each user action becomes a [`ControlEvent`]; [`Controller::dispatch`] is
//! the one place that turns events into player calls.

use std::fmt;
use std::str::FromStr;

use crate::audio::types::{DeckId, TrackRef};
use crate::deck::Decks;
use crate::error::{ControlError, LoadError};

/// An action on one deck.
#[derive(Debug, Clone, PartialEq)]
pub enum DeckCommand {
    Play,
    Stop,
    Load(TrackRef),
    Gain(f64),
    Speed(f64),
    Position(f64),
    Loop(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    Deck(DeckId, DeckCommand),
    Status,
    Quit,
}

impl FromStr for ControlEvent {
    type Err = ControlError;

    /// Parse `<deck> <command> [arg]`, `status` or `quit`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (head, rest) = split_word(line);
        match head.to_ascii_lowercase().as_str() {
            "" => return Err(ControlError::Empty),
            "status" => return Ok(ControlEvent::Status),
            "quit" | "exit" => return Ok(ControlEvent::Quit),
            _ => {}
        }

        let deck = head
            .parse::<i64>()
            .ok()
            .and_then(DeckId::from_number)
            .ok_or_else(|| ControlError::UnknownDeck(head.to_string()))?;

        let (command, arg) = split_word(rest);
        let command = match command.to_ascii_lowercase().as_str() {
            "play" | "start" => DeckCommand::Play,
            "stop" | "pause" => DeckCommand::Stop,
            "load" => {
                if arg.is_empty() {
                    return Err(ControlError::MissingArgument("load"));
                }
                DeckCommand::Load(TrackRef::parse(arg))
            }
            "gain" | "vol" => DeckCommand::Gain(number("gain", arg)?),
            "speed" => DeckCommand::Speed(number("speed", arg)?),
            "pos" | "seek" => DeckCommand::Position(number("pos", arg)?),
            "loop" => match arg.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => DeckCommand::Loop(true),
                "off" | "false" | "0" => DeckCommand::Loop(false),
                "" => return Err(ControlError::MissingArgument("loop")),
                other => return Err(ControlError::InvalidToggle(other.to_string())),
            },
            "" => return Err(ControlError::MissingArgument("command")),
            other => return Err(ControlError::UnknownCommand(other.to_string())),
        };
        Ok(ControlEvent::Deck(deck, command))
    }
}

fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (s, ""),
    }
}

fn number(name: &'static str, arg: &str) -> Result<f64, ControlError> {
    if arg.is_empty() {
        return Err(ControlError::MissingArgument(name));
    }
    arg.parse()
        .map_err(|_| ControlError::InvalidNumber(arg.to_string()))
}

/// Snapshot of one deck for the status command.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckStatus {
    pub deck: DeckId,
    pub track: Option<String>,
    pub playing: bool,
    pub looping: bool,
    pub gain: f32,
    pub speed: f64,
    pub position: f64,
}

impl fmt::Display for DeckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deck {}: {} [{}] pos {:.3} gain {:.2} speed {:.2} loop {}",
            self.deck,
            self.track.as_deref().unwrap_or("No track loaded"),
            if self.playing { "playing" } else { "stopped" },
            self.position,
            self.gain,
            self.speed,
            if self.looping { "on" } else { "off" }
        )
    }
}

/// What the caller should do after an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Done,
    Status(Vec<DeckStatus>),
    Quit,
}

pub struct Controller {
    decks: Decks,
}

impl Controller {
    pub fn new(decks: Decks) -> Self {
        Self { decks }
    }

    pub fn dispatch(&self, event: ControlEvent) -> Result<Reply, LoadError> {
        let (id, command) = match event {
            ControlEvent::Status => return Ok(Reply::Status(self.status())),
            ControlEvent::Quit => return Ok(Reply::Quit),
            ControlEvent::Deck(id, command) => (id, command),
        };

        let deck = self.decks.get(id);
        let player = deck.player();
        match command {
            DeckCommand::Play => player.start(),
            DeckCommand::Stop => player.stop(),
            DeckCommand::Load(track) => deck.load(track)?,
            DeckCommand::Gain(g) => player.set_gain(g),
            DeckCommand::Speed(r) => player.set_speed(r),
            DeckCommand::Position(p) => {
                player.set_position_relative(p);
                deck.refresh_position();
            }
            DeckCommand::Loop(on) => deck.set_looping(on),
        }
        Ok(Reply::Done)
    }

    pub fn status(&self) -> Vec<DeckStatus> {
        self.decks
            .iter()
            .map(|deck| {
                let player = deck.player();
                DeckStatus {
                    deck: deck.id(),
                    track: player.track().map(|t| t.display_name()),
                    playing: player.is_playing(),
                    looping: deck.is_looping(),
                    gain: player.gain(),
                    speed: player.speed(),
                    position: player.position_relative(),
                }
            })
            .collect()
    }
}
