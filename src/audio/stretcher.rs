use soundtouch::{Setting, SoundTouch};

/// Lowest tempo handed to SoundTouch; below this the deck is treated as held.
pub const MIN_TEMPO: f64 = 0.05;

/// Wrapper around SoundTouch for key-locked speed changes.
pub struct Stretcher {
    st: SoundTouch,
    channels: u16,
    tempo: f64,
}

impl Stretcher {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        let mut st = SoundTouch::new();
        st.set_sample_rate(sample_rate);
        st.set_channels(channels as u32);
        st.set_tempo(1.0);
        // Short sequences keep latency low enough for scratch-free seeking
        st.set_setting(Setting::SequenceMs, 40);
        st.set_setting(Setting::SeekwindowMs, 15);
        st.set_setting(Setting::OverlapMs, 8);
        Stretcher {
            st,
            channels,
            tempo: 1.0,
        }
    }

    pub fn set_tempo(&mut self, tempo: f64) {
        let tempo = tempo.max(MIN_TEMPO);
        if (tempo - self.tempo).abs() > 1e-6 {
            self.tempo = tempo;
            self.st.set_tempo(tempo);
        }
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Feed interleaved input samples into SoundTouch.
    pub fn put_samples(&mut self, samples: &[f32]) {
        self.st
            .put_samples(samples, samples.len() / self.channels as usize);
    }

    /// Receive processed samples from SoundTouch.
    /// Returns the number of samples written (total, not per channel).
    pub fn receive_samples(&mut self, output: &mut [f32]) -> usize {
        let max_frames = output.len() / self.channels as usize;
        let received_frames = self.st.receive_samples(output, max_frames);
        received_frames * self.channels as usize
    }

    /// Clear all buffered data (use when seeking or loading).
    pub fn clear(&mut self) {
        self.st.clear();
    }
}
