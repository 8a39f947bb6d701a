use std::sync::Arc;

use super::player::Player;
use super::types::StreamSpec;

/// Sums the blocks of its input players.
///
/// Summation is plain addition: no clipping and no attenuation, so two
/// full-scale inputs can reach ±2.0. Headroom is left to the deck gains.
/// Inputs are only added before `prepare`; the pull path never touches the
/// topology.
#[derive(Default)]
pub struct Mixer {
    inputs: Vec<Arc<Player>>,
    scratch: Vec<f32>,
    spec: Option<StreamSpec>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player to the mix. Returns `false` once the mixer is prepared.
    pub fn add_input(&mut self, player: Arc<Player>) -> bool {
        if self.spec.is_some() {
            log::warn!(
                "Mixer: ignoring deck {} added after prepare",
                player.deck()
            );
            return false;
        }
        self.inputs.push(player);
        true
    }

    pub fn inputs(&self) -> &[Arc<Player>] {
        &self.inputs
    }

    pub fn is_prepared(&self) -> bool {
        self.spec.is_some()
    }

    /// Prepare all inputs for `spec` and allocate the mix buffer.
    pub fn prepare(&mut self, spec: StreamSpec) {
        if self.spec.is_some() {
            log::warn!("Mixer: prepare called twice, ignoring");
            return;
        }
        for input in &self.inputs {
            input.prepare(spec);
        }
        self.scratch = vec![0.0; spec.block_samples()];
        self.spec = Some(spec);
        log::info!(
            "Mixer: Prepared {} inputs @ {} Hz, {} frames x {} channels",
            self.inputs.len(),
            spec.sample_rate,
            spec.block_size,
            spec.channels
        );
    }

    pub fn release(&mut self) {
        if self.spec.take().is_none() {
            return;
        }
        for input in &self.inputs {
            input.release();
        }
        self.scratch = Vec::new();
        log::info!("Mixer: Released");
    }

    /// Fill `out` with the sum of all inputs. Never blocks or allocates.
    ///
    /// Blocks longer than the prepared size are mixed in prepared-size chunks.
    pub fn pull(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let Some(spec) = self.spec else {
            return;
        };
        let chunk = spec.block_samples().max(1);

        for block in out.chunks_mut(chunk) {
            let scratch = &mut self.scratch[..block.len()];
            for input in &self.inputs {
                input.render(scratch);
                for (o, s) in block.iter_mut().zip(scratch.iter()) {
                    *o += *s;
                }
            }
        }
    }
}
