use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::types::{AudioData, TrackRef};
use crate::error::LoadError;

/// Opens track references for decoding.
///
/// Decoding happens up front on the calling (control) thread, so the audio
/// path only ever reads from memory and a pull can never wait on I/O.
pub trait TrackSource: Send + Sync {
    fn open(&self, track: &TrackRef) -> Result<Arc<AudioData>, LoadError>;
}

/// Decodes files from disk with symphonia.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaSource;

impl TrackSource for SymphoniaSource {
    fn open(&self, track: &TrackRef) -> Result<Arc<AudioData>, LoadError> {
        decode_file(track.path()).map(Arc::new)
    }
}

/// Pre-decoded tracks keyed by reference.
#[derive(Default)]
pub struct MemorySource {
    tracks: RwLock<HashMap<TrackRef, Arc<AudioData>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, track: TrackRef, data: AudioData) {
        self.tracks.write().insert(track, Arc::new(data));
    }
}

impl TrackSource for MemorySource {
    fn open(&self, track: &TrackRef) -> Result<Arc<AudioData>, LoadError> {
        self.tracks
            .read()
            .get(track)
            .cloned()
            .ok_or_else(|| LoadError::UnknownTrack(track.to_string()))
    }
}

/// Decode an audio file into an `AudioData` struct with all samples in memory.
pub fn decode_file(path: &Path) -> Result<AudioData, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(LoadError::Probe)?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(LoadError::NoAudioTrack)?
        .clone();

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(LoadError::MissingSampleRate)?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(LoadError::Decoder)?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(LoadError::Decoder(e)),
        };

        if packet.track_id() != track.id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Decode warning in {:?}: {}", path, e);
                continue;
            }
            Err(e) => return Err(LoadError::Decoder(e)),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.capacity();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    let data = AudioData::from_interleaved(samples, sample_rate, channels);
    if data.num_frames() == 0 {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    log::info!(
        "Decoded {:?}: {} Hz, {} channels, {} frames ({:.2}s)",
        path,
        data.sample_rate,
        data.channels,
        data.num_frames(),
        data.duration
    );

    Ok(data)
}
