//! End-to-end playback through decoded files, the offline driver and the
//! file mailbox.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use dualdeck::poller::apply_end_policy;
use dualdeck::{
    DeckDisplay, DeckId, Decks, FileMailbox, OfflineDriver, PlayerOptions, StreamSpec,
    SymphoniaSource, TrackRef, TrackSource, TransportPoller,
};

/// Write a 16-bit PCM WAV file holding `frames` copies of `value` per channel.
fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize, value: i16) {
    let data_len = (frames * channels as usize * 2) as u32;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
    bytes.extend_from_slice(&(channels * 2).to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for _ in 0..frames * channels as usize {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    std::fs::write(path, bytes).unwrap();
}

#[derive(Clone, Default)]
struct CountingDisplay {
    shown: Arc<Mutex<Vec<Option<String>>>>,
}

impl DeckDisplay for CountingDisplay {
    fn show_track(&mut self, track: Option<&TrackRef>) {
        self.shown.lock().push(track.map(|t| t.display_name()));
    }

    fn set_position_relative(&mut self, _position: f64) {}
}

fn decks() -> (Decks, CountingDisplay) {
    let display = CountingDisplay::default();
    let decks = Decks::new(Arc::new(SymphoniaSource), PlayerOptions::default(), |_| {
        Box::new(display.clone())
    });
    (decks, display)
}

fn spec() -> StreamSpec {
    StreamSpec {
        sample_rate: 1000,
        block_size: 100,
        channels: 2,
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    half: PathBuf,
    quarter: PathBuf,
    slow: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let half = dir.path().join("half.wav");
    let quarter = dir.path().join("quarter.wav");
    let slow = dir.path().join("slow.wav");
    write_wav(&half, 1000, 2, 1000, 16384);
    write_wav(&quarter, 1000, 1, 500, 8192);
    write_wav(&slow, 500, 1, 1000, 8192);
    Fixture {
        _dir: dir,
        half,
        quarter,
        slow,
    }
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn test_decodes_wav_file() {
    let fx = fixture();
    let data = SymphoniaSource.open(&TrackRef::new(&fx.half)).unwrap();
    assert_eq!(data.sample_rate, 1000);
    assert_eq!(data.channels, 2);
    assert_eq!(data.num_frames(), 1000);
    assert!((data.duration - 1.0).abs() < 1e-9);
    assert!(data.samples.iter().all(|&s| close(s, 0.5)));
}

#[test]
fn test_two_decks_sum() {
    let fx = fixture();
    let (decks, _) = decks();
    let one = decks.get(DeckId::One);
    let two = decks.get(DeckId::Two);
    one.load(TrackRef::new(&fx.half)).unwrap();
    two.load(TrackRef::new(&fx.quarter)).unwrap();
    one.player().start();
    two.player().start();

    let mut driver = OfflineDriver::new(decks.mixer(), spec());
    assert!(driver.next_block().iter().all(|&s| close(s, 0.75)));

    two.player().stop();
    assert!(driver.next_block().iter().all(|&s| close(s, 0.5)));

    one.player().set_gain(0.5);
    two.player().start();
    assert!(driver.next_block().iter().all(|&s| close(s, 0.5)));

    let mixer = driver.finish();
    assert!(!mixer.is_prepared());
}

#[test]
fn test_source_rate_is_corrected() {
    let fx = fixture();
    let (decks, _) = decks();
    let deck = decks.get(DeckId::One);
    deck.load(TrackRef::new(&fx.slow)).unwrap();
    deck.player().start();

    // 500 Hz source into a 1000 Hz stream advances half a frame per output frame
    let mut driver = OfflineDriver::new(decks.mixer(), spec());
    driver.advance(10);
    assert!((deck.player().position_relative() - 0.5).abs() < 1e-9);
}

#[test]
fn test_looping_deck_restarts_after_end() {
    let fx = fixture();
    let (decks, _) = decks();
    let deck = decks.get(DeckId::Two);
    deck.load(TrackRef::new(&fx.quarter)).unwrap();
    deck.set_looping(true);
    deck.player().start();

    let mut driver = OfflineDriver::new(decks.mixer(), spec());
    driver.advance(5);
    assert_eq!(deck.player().position_relative(), 1.0);
    assert!(driver.next_block().iter().all(|&s| s == 0.0));

    apply_end_policy(deck);
    assert!(deck.player().is_playing());
    assert!(driver.next_block().iter().all(|&s| close(s, 0.25)));
}

#[test]
fn test_file_mailbox_hands_track_to_deck() {
    let fx = fixture();
    let (decks, display) = decks();
    let mailbox_path = fx._dir.path().join("playlist.txt");
    let uri = format!("file://{}", fx.half.display());
    std::fs::write(&mailbox_path, format!("{}\n2\n", uri)).unwrap();

    let mut poller =
        TransportPoller::new(decks.clone()).with_mailbox(Box::new(FileMailbox::new(&mailbox_path)));
    poller.tick();

    assert_eq!(
        decks.get(DeckId::Two).player().track(),
        Some(TrackRef::new(&fx.half))
    );
    assert_eq!(decks.get(DeckId::One).player().track(), None);
    assert_eq!(std::fs::read_to_string(&mailbox_path).unwrap(), "\n0\n");

    poller.tick();
    assert_eq!(*display.shown.lock(), vec![Some("half.wav".to_string())]);
}

#[test]
fn test_unreadable_mailbox_track_leaves_deck_empty() {
    let fx = fixture();
    let (decks, display) = decks();
    let mailbox_path = fx._dir.path().join("playlist.txt");
    let mailbox = FileMailbox::new(&mailbox_path);
    mailbox.post("/no/such/track.wav", DeckId::One).unwrap();

    let mut poller = TransportPoller::new(decks.clone()).with_mailbox(Box::new(mailbox));
    poller.tick();
    poller.tick();

    assert_eq!(decks.get(DeckId::One).player().track(), None);
    assert_eq!(*display.shown.lock(), vec![None]);
    assert_eq!(std::fs::read_to_string(&mailbox_path).unwrap(), "\n0\n");
}
