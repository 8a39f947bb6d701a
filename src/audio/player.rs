//! Per-deck player: a resampling transport plus gain, remote-controlled
//! from the control thread while the audio thread pulls blocks.
//!
//! Scalar controls (gain, speed, play flag) are plain atomics read once per
//! block. Seeks are posted as a request that the audio thread applies at
//! the start of its next pull. The decoded source and transport live behind
//! a mutex that the audio thread only ever `try_lock`s; the control thread
//! takes it just long enough to swap sources during `load`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::decoder::TrackSource;
use super::transport::ResamplingTransport;
use super::types::{AudioData, DeckId, SpeedMode, StreamSpec, TrackRef, TransportState};
use crate::error::LoadError;

/// Upper end of the speed control.
pub const DEFAULT_MAX_SPEED: f64 = 10.0;

/// Bit pattern marking "no seek pending". Never produced by a clamped position.
const NO_SEEK: u64 = u64::MAX;

/// Construction options for a [`Player`].
#[derive(Debug, Clone, Copy)]
pub struct PlayerOptions {
    pub max_speed: f64,
    pub speed_mode: SpeedMode,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            max_speed: DEFAULT_MAX_SPEED,
            speed_mode: SpeedMode::Varispeed,
        }
    }
}

/// Audio-thread side of the player.
struct Voice {
    audio: Option<Arc<AudioData>>,
    transport: ResamplingTransport,
    prepared: bool,
}

pub struct Player {
    deck: DeckId,
    source: Arc<dyn TrackSource>,
    max_speed: f64,
    /// f32 bits.
    gain: AtomicU32,
    /// f64 bits.
    speed: AtomicU64,
    playing: AtomicBool,
    /// Last published normalized position, f64 bits.
    position: AtomicU64,
    /// Requested normalized position, f64 bits, or `NO_SEEK`.
    pending_seek: AtomicU64,
    voice: Mutex<Voice>,
    /// Only written while `voice` is held, so it always names the audio in the voice.
    track: Mutex<Option<TrackRef>>,
}

impl Player {
    pub fn new(deck: DeckId, source: Arc<dyn TrackSource>, options: PlayerOptions) -> Self {
        Self {
            deck,
            source,
            max_speed: options.max_speed.max(0.0),
            gain: AtomicU32::new(1.0f32.to_bits()),
            speed: AtomicU64::new(1.0f64.to_bits()),
            playing: AtomicBool::new(false),
            position: AtomicU64::new(0.0f64.to_bits()),
            pending_seek: AtomicU64::new(NO_SEEK),
            voice: Mutex::new(Voice {
                audio: None,
                transport: ResamplingTransport::new(options.speed_mode),
                prepared: false,
            }),
            track: Mutex::new(None),
        }
    }

    pub fn deck(&self) -> DeckId {
        self.deck
    }

    /// Bind a new track, rewinding and stopping the deck.
    ///
    /// Decoding runs on the calling thread. If it fails nothing about the
    /// player changes.
    pub fn load(&self, track: TrackRef) -> Result<(), LoadError> {
        let audio = self.source.open(&track)?;
        let frames = audio.num_frames();

        let name = track.to_string();
        self.playing.store(false, Ordering::Release);
        let previous = {
            // Lock order: voice, then track
            let mut voice = self.voice.lock();
            let mut bound = self.track.lock();
            voice.transport.reset();
            self.pending_seek.store(NO_SEEK, Ordering::Release);
            self.position.store(0.0f64.to_bits(), Ordering::Release);
            *bound = Some(track);
            voice.audio.replace(audio)
        };
        // Free the old buffer outside the lock
        drop(previous);

        log::info!("Deck {}: Loaded {} ({} frames)", self.deck, name, frames);
        Ok(())
    }

    /// The currently bound track.
    pub fn track(&self) -> Option<TrackRef> {
        self.track.lock().clone()
    }

    pub fn start(&self) {
        self.playing.store(true, Ordering::Release);
        log::debug!("Deck {}: Playing", self.deck);
    }

    pub fn stop(&self) {
        self.playing.store(false, Ordering::Release);
        log::debug!("Deck {}: Stopped", self.deck);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Set the output gain, clamped to [0, 1].
    pub fn set_gain(&self, gain: f64) {
        let gain = clamp_or_zero(gain, 0.0, 1.0) as f32;
        self.gain.store(gain.to_bits(), Ordering::Release);
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Acquire))
    }

    /// Set the speed ratio, clamped to [0, max_speed].
    pub fn set_speed(&self, ratio: f64) {
        let ratio = clamp_or_zero(ratio, 0.0, self.max_speed);
        self.speed.store(ratio.to_bits(), Ordering::Release);
    }

    pub fn speed(&self) -> f64 {
        f64::from_bits(self.speed.load(Ordering::Acquire))
    }

    /// Request a seek to `position` (clamped to [0, 1] of the track length).
    ///
    /// The audio thread applies it at the start of its next pull; reads of
    /// the position see the requested value immediately. Ignored when no
    /// track is bound.
    pub fn set_position_relative(&self, position: f64) {
        // Held across the store so a concurrent load cannot slip in between
        let bound = self.track.lock();
        if bound.is_none() {
            return;
        }
        let bits = clamp_or_zero(position, 0.0, 1.0).to_bits();
        self.pending_seek.store(bits, Ordering::Release);
        self.position.store(bits, Ordering::Release);
    }

    /// Current normalized position in [0, 1]. Never blocks.
    pub fn position_relative(&self) -> f64 {
        let pending = self.pending_seek.load(Ordering::Acquire);
        if pending != NO_SEEK {
            return f64::from_bits(pending);
        }
        f64::from_bits(self.position.load(Ordering::Acquire))
    }

    pub fn transport_state(&self) -> TransportState {
        if self.position_relative() >= 1.0 {
            TransportState::AtEnd
        } else if self.is_playing() {
            TransportState::Playing
        } else {
            TransportState::Stopped
        }
    }

    pub fn prepare(&self, spec: StreamSpec) {
        let mut voice = self.voice.lock();
        voice.transport.prepare(spec);
        voice.prepared = true;
        log::debug!(
            "Deck {}: Prepared {} Hz, {} frames, {} channels",
            self.deck,
            spec.sample_rate,
            spec.block_size,
            spec.channels
        );
    }

    pub fn release(&self) {
        let mut voice = self.voice.lock();
        voice.transport.release();
        voice.prepared = false;
        log::debug!("Deck {}: Released", self.deck);
    }

    /// Produce the next block. Called from the audio thread only.
    ///
    /// Writes silence when stopped, unprepared, unbound, or while the
    /// control thread is swapping sources.
    pub fn render(&self, out: &mut [f32]) {
        let Some(mut voice) = self.voice.try_lock() else {
            out.fill(0.0);
            return;
        };
        let Voice {
            audio,
            transport,
            prepared,
        } = &mut *voice;

        let Some(audio) = audio.as_deref() else {
            out.fill(0.0);
            return;
        };
        let total = audio.num_frames();

        let pending = self.pending_seek.load(Ordering::Acquire);
        if pending != NO_SEEK {
            transport.seek(f64::from_bits(pending) * total as f64, total);
            self.position.store(pending, Ordering::Release);
            // A newer request stays pending for the next block
            let _ = self.pending_seek.compare_exchange(
                pending,
                NO_SEEK,
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
        }

        if !*prepared || !self.playing.load(Ordering::Acquire) {
            out.fill(0.0);
            return;
        }

        transport.render(audio, self.speed(), out);

        let gain = self.gain();
        for sample in out.iter_mut() {
            *sample *= gain;
        }

        let relative = if total > 0 {
            transport.position() / total as f64
        } else {
            0.0
        };
        self.position.store(relative.to_bits(), Ordering::Release);
    }
}

/// Clamp to `[lo, hi]`, mapping NaN to `lo` like a knob at its stop.
fn clamp_or_zero(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}
