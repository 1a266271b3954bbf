use crate::config::HandlerConfig;
use crate::dsp::irf::LogarithmicIrfArray;
use crate::handlers::ring::ChunkRing;
use crate::handlers::transform::TransformChain;
use crate::wave::{Chunk, DataSize};

#[derive(Debug, Clone, PartialEq)]
pub struct TimeResamplerParams {
    pub granularity_ms: f32,
    pub attack_ms: f32,
    pub decay_ms: f32,
    pub transform_desc: Option<String>,
}

impl TimeResamplerParams {
    pub fn parse(config: &HandlerConfig) -> Self {
        let attack_ms = config.get_f32("attack").unwrap_or(0.0).max(0.0);
        let decay_ms = config.get_f32("decay").unwrap_or(attack_ms).max(attack_ms);
        Self {
            granularity_ms: config.get_f32("granularity").unwrap_or(1000.0 / 60.0).max(0.01),
            attack_ms,
            decay_ms,
            transform_desc: config.get_str("transform").map(|s| s.to_string()),
        }
    }
}

struct LayerState {
    wave_counter: u32,
    data_counter: u32,
    irf: LogarithmicIrfArray,
    latest_source: Vec<f32>,
}

/// `TimeResampler`: emits a fixed-rate chunk stream from any source, using
/// the chunk clock (`wave_counter`/`data_counter`) so the output rate never
/// depends on the source's own emission pattern — if the wave accumulates
/// without a new source chunk, the last known source data is reused.
pub struct TimeResamplerHandler {
    params: TimeResamplerParams,
    block_size: u32,
    layers: Vec<LayerState>,
    ring: ChunkRing,
    transform: TransformChain,
}

impl TimeResamplerHandler {
    pub fn new(params: TimeResamplerParams, sample_rate: u32, source_layers: usize, values_per_chunk: usize) -> Self {
        let mut handler = Self {
            params,
            block_size: 1,
            layers: Vec::new(),
            ring: ChunkRing::new(1, 1),
            transform: TransformChain::identity(),
        };
        handler.configure(sample_rate, source_layers, values_per_chunk);
        handler
    }

    pub fn check_same_params(&self, other: &TimeResamplerParams) -> bool {
        self.params == *other
    }

    pub fn configure(&mut self, sample_rate: u32, source_layers: usize, values_per_chunk: usize) {
        self.block_size = ((self.params.granularity_ms / 1000.0) * sample_rate as f32).round().max(1.0) as u32;
        let layers = source_layers.max(1);
        let vpc = values_per_chunk.max(1);
        self.layers = (0..layers)
            .map(|_| LayerState {
                wave_counter: 0,
                data_counter: 0,
                irf: LogarithmicIrfArray::new(
                    vpc,
                    self.params.attack_ms / 1000.0,
                    self.params.decay_ms / 1000.0,
                    self.block_size,
                    sample_rate,
                ),
                latest_source: vec![0.0; vpc],
            })
            .collect();
        self.ring.reconfigure(layers, vpc);
        self.transform = self
            .params
            .transform_desc
            .as_deref()
            .map(|d| TransformChain::parse(d, self.block_size, sample_rate))
            .unwrap_or_default();
    }

    /// Advances layer `layer` by `wave_len` raw input samples, consuming
    /// whatever chunks the source emitted on that layer this tick.
    pub fn process_layer(&mut self, layer: usize, wave_len: u32, source_chunks: &[(u32, &[f32])]) {
        let block_size = self.block_size;
        let state = &mut self.layers[layer];
        state.wave_counter += wave_len;
        state.data_counter += source_chunks.iter().map(|(e, _)| *e).sum::<u32>();
        if let Some((_, values)) = source_chunks.last() {
            state.latest_source.copy_from_slice(values);
        }

        while state.wave_counter >= block_size {
            let mut values = state.latest_source.clone();
            state.irf.apply(&mut values);
            for v in values.iter_mut() {
                let mut chain = self.transform.clone();
                *v = chain.apply(*v);
            }
            self.ring.push_layer(layer).copy_from_slice(&values);
            state.wave_counter -= block_size;
            state.data_counter = state.data_counter.saturating_sub(block_size);
        }
    }

    pub fn purge_cache(&mut self) {
        self.ring.purge_cache();
    }

    pub fn get_chunks(&self, layer: usize) -> Vec<Chunk<'_>> {
        let count = self.ring.get_chunks(layer).len();
        let sizes = vec![self.block_size; count];
        self.ring.get_chunks_with_sizes(layer, Some(&sizes))
    }

    pub fn get_last_data(&self, layer: usize) -> Option<&[f32]> {
        self.ring.get_last_data(layer)
    }

    pub fn data_size(&self) -> DataSize {
        self.ring.data_size()
    }

    pub fn get_prop(&self, name: &str) -> Option<String> {
        match name {
            "block size" => Some(self.block_size.to_string()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for TimeResamplerHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeResamplerHandler")
            .field("params", &self.params)
            .field("block_size", &self.block_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_fixed_rate_independent_of_source_pattern() {
        let sample_rate = 48000u32;
        let params = TimeResamplerParams {
            granularity_ms: 1000.0 / 60.0,
            attack_ms: 0.0,
            decay_ms: 0.0,
            transform_desc: None,
        };
        let mut handler = TimeResamplerHandler::new(params, sample_rate, 1, 1);

        let source_rate_hz = 100.0f32;
        let source_block = (sample_rate as f32 / source_rate_hz).round() as u32;
        let total_samples = sample_rate * 10;
        let tick_wave = 37u32; // deliberately not a clean divisor of anything

        let mut source_acc = 0u32;
        let mut remaining = total_samples;
        let single_value = [0.5f32];
        while remaining > 0 {
            let this_wave = tick_wave.min(remaining);
            source_acc += this_wave;
            let mut n_chunks = 0u32;
            while source_acc >= source_block {
                source_acc -= source_block;
                n_chunks += 1;
            }
            let chunks: Vec<(u32, &[f32])> = (0..n_chunks).map(|_| (source_block, &single_value[..])).collect();
            handler.process_layer(0, this_wave, &chunks);
            remaining -= this_wave;
        }
        // 10s at 60 Hz granularity => 600 emissions, independent of the
        // source's own 100 Hz chunk pattern.
        assert_eq!(handler.get_chunks(0).len(), 600);
    }
}
