use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Decoded audio data stored entirely in memory.
#[derive(Clone, Debug)]
pub struct AudioData {
    /// Interleaved samples normalized to [-1.0, 1.0].
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Duration in seconds.
    pub duration: f64,
}

impl AudioData {
    /// Wrap interleaved samples, deriving the duration.
    pub fn from_interleaved(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let num_frames = samples.len() / channels as usize;
        Self {
            duration: num_frames as f64 / sample_rate.max(1) as f64,
            samples,
            sample_rate,
            channels,
        }
    }

    /// Total number of frames (samples per channel).
    pub fn num_frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Sample at `frame` for `channel`, or silence past the end.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let ch = self.channels as usize;
        self.samples
            .get(frame * ch + channel % ch)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Names a decodable audio resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TrackRef {
    path: PathBuf,
}

impl TrackRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Accept a plain path or a `file://` URI.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        let stripped = s.strip_prefix("file://").unwrap_or(s);
        // "file:///C:/x.wav" leaves "/C:/x.wav" behind
        let stripped = match stripped.as_bytes() {
            [b'/', drive, b':', ..] if drive.is_ascii_alphabetic() => &stripped[1..],
            _ => stripped,
        };
        Self::new(stripped)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file name shown next to a deck.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Deck identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeckId {
    One,
    Two,
}

impl DeckId {
    /// Zero-based index (0 for deck 1).
    pub fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }

    /// Map the user-facing selector (1 or 2) to a deck.
    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Output stream shape agreed during prepare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    /// Maximum frames per block.
    pub block_size: usize,
    pub channels: u16,
}

impl StreamSpec {
    pub fn block_samples(&self) -> usize {
        self.block_size * self.channels as usize
    }
}

impl Default for StreamSpec {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 512,
            channels: 2,
        }
    }
}

/// How the speed control is realised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedMode {
    /// Resampling: speed changes pitch.
    #[default]
    Varispeed,
    /// Time-stretching: speed changes tempo only.
    KeyLock,
}

/// Transport state observed by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    AtEnd,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_ref_parse() {
        assert_eq!(TrackRef::parse("file:///music/a.wav").path(), Path::new("/music/a.wav"));
        assert_eq!(TrackRef::parse("file:///C:/music/a.wav").path(), Path::new("C:/music/a.wav"));
        assert_eq!(TrackRef::parse("  b.mp3 \r").path(), Path::new("b.mp3"));
        assert_eq!(TrackRef::parse("dir/b.mp3").display_name(), "b.mp3");
    }

    #[test]
    fn test_deck_numbers() {
        assert_eq!(DeckId::from_number(1), Some(DeckId::One));
        assert_eq!(DeckId::from_number(2), Some(DeckId::Two));
        assert_eq!(DeckId::from_number(0), None);
        assert_eq!(DeckId::from_number(3), None);
        assert_eq!(DeckId::Two.to_string(), "2");
    }

    #[test]
    fn test_audio_data_sample_past_end() {
        let data = AudioData::from_interleaved(vec![0.1, 0.2, 0.3, 0.4], 4, 2);
        assert_eq!(data.num_frames(), 2);
        assert!((data.duration - 0.5).abs() < 1e-9);
        assert_eq!(data.sample(1, 1), 0.4);
        assert_eq!(data.sample(2, 0), 0.0);
    }
}
