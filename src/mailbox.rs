//! Playlist-to-deck handoff.
//!
//! A mailbox holds at most one request. Writing over an unconsumed request
//! replaces it, so two handoffs inside one poll interval lose the first.
//! That is acceptable only because a person picking tracks is slower than
//! the poller.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio::types::{DeckId, TrackRef};

/// A request to load `track` onto `deck`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffRequest {
    pub track: TrackRef,
    pub deck: DeckId,
}

pub trait PlaylistMailbox: Send {
    /// Return the pending request, if any, and mark it consumed.
    fn take(&mut self) -> Option<HandoffRequest>;
}

/// Parse the two-line record: track path, then deck selector (0 = none).
///
/// Anything malformed reads as "no pending request".
pub fn parse_record(text: &str) -> Option<HandoffRequest> {
    let mut lines = text.lines();
    let track = lines.next()?;
    let selector: i64 = lines.next()?.trim().parse().ok()?;
    let deck = DeckId::from_number(selector)?;
    Some(HandoffRequest {
        track: TrackRef::parse(track),
        deck,
    })
}

/// Render a record in the two-line format.
pub fn format_record(track: &str, selector: u8) -> String {
    format!("{}\n{}\n", track, selector)
}

/// Mailbox persisted as a two-line text file shared with the playlist.
#[derive(Debug, Clone)]
pub struct FileMailbox {
    path: PathBuf,
}

impl FileMailbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write a request, replacing whatever was there.
    pub fn post(&self, track: &str, deck: DeckId) -> io::Result<()> {
        std::fs::write(&self.path, format_record(track, deck.number()))
    }

    fn reset(&self) -> io::Result<()> {
        std::fs::write(&self.path, format_record("", 0))
    }
}

impl PlaylistMailbox for FileMailbox {
    fn take(&mut self) -> Option<HandoffRequest> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::debug!("Mailbox {:?} unreadable: {}", self.path, e);
                return None;
            }
        };

        let request = parse_record(&text)?;
        // Only hand out what we could mark consumed; otherwise it would reload every tick
        if let Err(e) = self.reset() {
            log::warn!("Mailbox {:?}: failed to mark consumed: {}", self.path, e);
            return None;
        }
        log::debug!(
            "Mailbox: {} -> deck {}",
            request.track,
            request.deck
        );
        Some(request)
    }
}

/// In-process single-slot mailbox.
#[derive(Debug, Clone, Default)]
pub struct SlotMailbox {
    slot: Arc<Mutex<Option<HandoffRequest>>>,
}

impl SlotMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a request, replacing any unconsumed one.
    pub fn post(&self, request: HandoffRequest) {
        if let Some(dropped) = self.slot.lock().replace(request) {
            log::debug!(
                "Mailbox: unconsumed request for deck {} ({}) replaced",
                dropped.deck,
                dropped.track
            );
        }
    }
}

impl PlaylistMailbox for SlotMailbox {
    fn take(&mut self) -> Option<HandoffRequest> {
        self.slot.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record() {
        assert_eq!(
            parse_record("track.wav\n1\n"),
            Some(HandoffRequest {
                track: TrackRef::new("track.wav"),
                deck: DeckId::One,
            })
        );
        assert_eq!(
            parse_record("C:\\music\\b.mp3\r\n2\r\n").map(|r| r.deck),
            Some(DeckId::Two)
        );
    }

    #[test]
    fn test_malformed_is_no_request() {
        assert_eq!(parse_record(""), None);
        assert_eq!(parse_record("track.wav"), None);
        assert_eq!(parse_record("track.wav\n"), None);
        assert_eq!(parse_record("track.wav\none\n"), None);
        assert_eq!(parse_record("track.wav\n3\n"), None);
        assert_eq!(parse_record("\n0\n"), None);
    }

    #[test]
    fn test_file_mailbox_consumes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlist.txt");
        let mut mailbox = FileMailbox::new(&path);

        assert_eq!(mailbox.take(), None);

        mailbox.post("track.wav", DeckId::Two).unwrap();
        let request = mailbox.take().unwrap();
        assert_eq!(request.deck, DeckId::Two);
        assert_eq!(request.track, TrackRef::new("track.wav"));

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "\n0\n");
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn test_file_mailbox_leaves_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlist.txt");
        std::fs::write(&path, "track.wav\nabc\n").unwrap();

        let mut mailbox = FileMailbox::new(&path);
        assert_eq!(mailbox.take(), None);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "track.wav\nabc\n");
    }

    #[test]
    fn test_slot_overwrite_loses_earlier_request() {
        let mailbox = SlotMailbox::new();
        let mut reader = mailbox.clone();
        mailbox.post(HandoffRequest {
            track: TrackRef::new("first.wav"),
            deck: DeckId::One,
        });
        mailbox.post(HandoffRequest {
            track: TrackRef::new("second.wav"),
            deck: DeckId::Two,
        });

        let request = reader.take().unwrap();
        assert_eq!(request.track, TrackRef::new("second.wav"));
        assert_eq!(reader.take(), None);
    }
}
