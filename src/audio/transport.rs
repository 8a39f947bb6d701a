use super::stretcher::{Stretcher, MIN_TEMPO};
use super::types::{AudioData, SpeedMode, StreamSpec};

/// Frames fed into SoundTouch at a time in key-lock mode.
const CHUNK_SIZE: usize = 1024;

/// Playback position machinery for one decoded source.
///
/// Reads frames at a fractional position and advances by
/// `speed * source_rate / output_rate` per output frame, interpolating
/// linearly between neighbouring frames. Reading past the end yields
/// silence and pins the position at the last frame boundary.
pub struct ResamplingTransport {
    mode: SpeedMode,
    spec: StreamSpec,
    /// Current position in source frames.
    position: f64,
    /// Step applied at the end of the previous block, ramped from on speed changes.
    step: Option<f64>,
    stretcher: Option<Stretcher>,
    stretch_in: Vec<f32>,
    stretch_out: Vec<f32>,
}

impl ResamplingTransport {
    pub fn new(mode: SpeedMode) -> Self {
        Self {
            mode,
            spec: StreamSpec::default(),
            position: 0.0,
            step: None,
            stretcher: None,
            stretch_in: Vec::new(),
            stretch_out: Vec::new(),
        }
    }

    /// Allocate everything the render path needs for `spec`.
    pub fn prepare(&mut self, spec: StreamSpec) {
        self.spec = spec;
        if self.mode == SpeedMode::KeyLock {
            self.stretcher = Some(Stretcher::new(spec.sample_rate, spec.channels));
            self.stretch_in = vec![0.0; CHUNK_SIZE * spec.channels as usize];
            self.stretch_out = vec![0.0; spec.block_samples()];
        }
    }

    pub fn release(&mut self) {
        self.stretcher = None;
        self.stretch_in = Vec::new();
        self.stretch_out = Vec::new();
    }

    /// Position in source frames.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Jump to `frame`, clamped to the source length.
    pub fn seek(&mut self, frame: f64, total_frames: usize) {
        self.position = frame.clamp(0.0, total_frames as f64);
        if let Some(s) = &mut self.stretcher {
            s.clear();
        }
    }

    /// Forget all playback history, as for a freshly bound source.
    pub fn reset(&mut self) {
        self.position = 0.0;
        self.step = None;
        if let Some(s) = &mut self.stretcher {
            s.clear();
        }
    }

    /// Fill `out` (interleaved, `spec.channels` wide) from `audio` at `speed`.
    pub fn render(&mut self, audio: &AudioData, speed: f64, out: &mut [f32]) {
        let rate = audio.sample_rate as f64 / self.spec.sample_rate.max(1) as f64;
        if rate <= 0.0 {
            out.fill(0.0);
            return;
        }
        match self.mode {
            SpeedMode::Varispeed => self.render_varispeed(audio, speed * rate, out),
            SpeedMode::KeyLock => self.render_key_lock(audio, speed, rate, out),
        }
    }

    fn render_varispeed(&mut self, audio: &AudioData, target: f64, out: &mut [f32]) {
        let start = self.step.unwrap_or(target);
        self.step = Some(target);
        if start <= 0.0 && target <= 0.0 {
            out.fill(0.0);
            return;
        }
        let channels = self.spec.channels as usize;
        interpolate(&mut self.position, audio, start, target, out, channels);
    }

    fn render_key_lock(&mut self, audio: &AudioData, speed: f64, rate: f64, out: &mut [f32]) {
        let channels = self.spec.channels as usize;
        let Self {
            position,
            stretcher,
            stretch_in,
            stretch_out,
            ..
        } = self;

        let stretcher = match stretcher {
            Some(s) if speed >= MIN_TEMPO => s,
            _ => {
                out.fill(0.0);
                return;
            }
        };
        stretcher.set_tempo(speed);

        let total_frames = audio.num_frames() as f64;
        let out_frames = out.len() / channels;
        let mut out_pos = 0;

        while out_pos < out_frames {
            // Try to receive from SoundTouch first
            let needed = (out_frames - out_pos).min(stretch_out.len() / channels);
            let recv_slice = &mut stretch_out[..needed * channels];
            let got_frames = stretcher.receive_samples(recv_slice) / channels;

            if got_frames > 0 {
                out[out_pos * channels..(out_pos + got_frames) * channels]
                    .copy_from_slice(&recv_slice[..got_frames * channels]);
                out_pos += got_frames;
                continue;
            }

            if *position >= total_frames || stretch_in.is_empty() {
                out[out_pos * channels..].fill(0.0);
                return;
            }

            // Feed rate-corrected frames; SoundTouch handles the tempo
            interpolate(position, audio, rate, rate, stretch_in, channels);
            stretcher.put_samples(stretch_in);
        }
    }
}

/// Linear-interpolating read of `out.len() / channels` frames starting at
/// `position`, with the step ramping from `start_step` to `end_step`.
fn interpolate(
    position: &mut f64,
    audio: &AudioData,
    start_step: f64,
    end_step: f64,
    out: &mut [f32],
    channels: usize,
) {
    let total = audio.num_frames();
    let end = total as f64;
    let frames = out.len() / channels;
    let delta = if frames > 0 {
        (end_step - start_step) / frames as f64
    } else {
        0.0
    };

    for (i, frame) in out.chunks_exact_mut(channels).enumerate() {
        let pos = *position;
        if pos >= end {
            frame.fill(0.0);
            continue;
        }

        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        for (c, sample) in frame.iter_mut().enumerate() {
            let a = audio.sample(idx, c);
            *sample = if frac > 0.0 && idx + 1 < total {
                a + (audio.sample(idx + 1, c) - a) * frac
            } else {
                a
            };
        }

        let step = (start_step + delta * (i + 1) as f64).max(0.0);
        *position = (pos + step).min(end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, sample_rate: u32) -> AudioData {
        let samples = (0..frames).map(|i| i as f32 / frames as f32).collect();
        AudioData::from_interleaved(samples, sample_rate, 1)
    }

    fn spec(sample_rate: u32) -> StreamSpec {
        StreamSpec {
            sample_rate,
            block_size: 64,
            channels: 2,
        }
    }

    #[test]
    fn test_unity_speed_copies_frames() {
        let audio = ramp(100, 1000);
        let mut t = ResamplingTransport::new(SpeedMode::Varispeed);
        t.prepare(spec(1000));

        let mut out = vec![0.0f32; 8];
        t.render(&audio, 1.0, &mut out);
        assert_eq!(out, vec![0.0, 0.0, 0.01, 0.01, 0.02, 0.02, 0.03, 0.03]);
        assert_eq!(t.position(), 4.0);
    }

    #[test]
    fn test_double_speed_skips_frames() {
        let audio = ramp(100, 1000);
        let mut t = ResamplingTransport::new(SpeedMode::Varispeed);
        t.prepare(spec(1000));

        let mut out = vec![0.0f32; 8];
        t.render(&audio, 2.0, &mut out);
        assert_eq!(t.position(), 8.0);
        assert!((out[2] - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_sample_rate_correction() {
        // 2 kHz source on a 1 kHz device advances two source frames per output frame
        let audio = ramp(100, 2000);
        let mut t = ResamplingTransport::new(SpeedMode::Varispeed);
        t.prepare(spec(1000));

        let mut out = vec![0.0f32; 20];
        t.render(&audio, 1.0, &mut out);
        assert_eq!(t.position(), 20.0);
    }

    #[test]
    fn test_speed_change_ramps_over_one_block() {
        let audio = ramp(1000, 1000);
        let mut t = ResamplingTransport::new(SpeedMode::Varispeed);
        t.prepare(spec(1000));

        let mut out = vec![0.0f32; 20];
        t.render(&audio, 1.0, &mut out);
        assert_eq!(t.position(), 10.0);

        t.render(&audio, 2.0, &mut out);
        // Ramp 1.1, 1.2, ... 2.0 sums to 15.5 frames
        assert!((t.position() - 25.5).abs() < 1e-9);

        t.render(&audio, 2.0, &mut out);
        assert!((t.position() - 45.5).abs() < 1e-9);
    }

    #[test]
    fn test_zero_speed_holds_and_is_silent() {
        let audio = ramp(100, 1000);
        let mut t = ResamplingTransport::new(SpeedMode::Varispeed);
        t.prepare(spec(1000));
        t.seek(10.0, audio.num_frames());

        let mut out = vec![1.0f32; 8];
        t.render(&audio, 0.0, &mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(t.position(), 10.0);
    }

    #[test]
    fn test_past_end_zero_fills() {
        let audio = ramp(3, 1000);
        let mut t = ResamplingTransport::new(SpeedMode::Varispeed);
        t.prepare(spec(1000));

        let mut out = vec![1.0f32; 10];
        t.render(&audio, 1.0, &mut out);
        assert_eq!(&out[6..], &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(t.position(), 3.0);
    }

    #[test]
    fn test_seek_clamps_to_length() {
        let mut t = ResamplingTransport::new(SpeedMode::Varispeed);
        t.seek(500.0, 100);
        assert_eq!(t.position(), 100.0);
        t.seek(-3.0, 100);
        assert_eq!(t.position(), 0.0);
    }

    #[test]
    fn test_key_lock_consumes_source_at_tempo() {
        let samples = (0..44100).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let audio = AudioData::from_interleaved(samples, 44100, 1);
        let mut t = ResamplingTransport::new(SpeedMode::KeyLock);
        t.prepare(StreamSpec {
            sample_rate: 44100,
            block_size: 512,
            channels: 2,
        });

        let mut out = vec![0.0f32; 1024];
        for _ in 0..40 {
            t.render(&audio, 2.0, &mut out);
        }
        // 40 blocks of 512 frames at double tempo need roughly 40960 source frames
        assert!(t.position() > 30000.0);
        assert!(out.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_key_lock_zero_speed_is_silent() {
        let audio = ramp(4096, 44100);
        let mut t = ResamplingTransport::new(SpeedMode::KeyLock);
        t.prepare(spec(44100));

        let mut out = vec![1.0f32; 128];
        t.render(&audio, 0.0, &mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(t.position(), 0.0);
    }
}
