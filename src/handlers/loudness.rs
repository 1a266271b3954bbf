use std::collections::VecDeque;

use crate::config::HandlerConfig;
use crate::handlers::ring::ChunkRing;
use crate::handlers::transform::TransformChain;
use crate::wave::{Chunk, DataSize};

/// EBU R128-inspired (not conformant) loudness parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LoudnessParams {
    pub update_rate_hz: f32,
    pub time_window_ms: f32,
    pub gating_db: f32,
    pub gating_limit: f32,
    pub ignore_gating_for_silence: bool,
    pub transform_desc: Option<String>,
}

impl LoudnessParams {
    pub fn parse(config: &HandlerConfig) -> Self {
        Self {
            update_rate_hz: config.get_f32("updateRate").unwrap_or(20.0).clamp(0.01, 60.0),
            time_window_ms: config.get_f32("timeWindow").unwrap_or(3000.0).clamp(0.01, 10000.0),
            gating_db: config.get_f32("gatingDb").unwrap_or(-10.0).clamp(-70.0, 0.0),
            gating_limit: config.get_f32("gatingLimit").unwrap_or(0.2).clamp(0.0, 1.0),
            ignore_gating_for_silence: config.get_bool("ignoreGatingForSilence").unwrap_or(true),
            transform_desc: config.get_str("transform").map(|s| s.to_string()),
        }
    }
}

/// `Loudness`: a micro-block ring of mean-square energies, gated and
/// averaged into a running loudness estimate once per `time_window_ms`.
#[derive(Debug)]
pub struct LoudnessHandler {
    params: LoudnessParams,
    sample_rate: u32,
    block_size: u32,
    blocks_count: usize,
    ring: VecDeque<f32>,
    accumulator: f32,
    count: u32,
    prev_output: f32,
    transform: TransformChain,
    out: ChunkRing,
}

impl LoudnessHandler {
    pub fn new(params: LoudnessParams, sample_rate: u32) -> Self {
        let mut handler = Self {
            params,
            sample_rate: 0,
            block_size: 1,
            blocks_count: 1,
            ring: VecDeque::new(),
            accumulator: 0.0,
            count: 0,
            prev_output: 0.0,
            transform: TransformChain::identity(),
            out: ChunkRing::new(1, 1),
        };
        handler.configure(sample_rate);
        handler
    }

    pub fn check_same_params(&self, other: &LoudnessParams) -> bool {
        self.params == *other
    }

    pub fn configure(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.block_size = derive_block_size(self.params.update_rate_hz, sample_rate).max(1);
        self.blocks_count = ((self.params.time_window_ms / 1000.0) * self.params.update_rate_hz)
            .round()
            .max(1.0) as usize;
        self.ring = VecDeque::with_capacity(self.blocks_count);
        self.transform = self
            .params
            .transform_desc
            .as_deref()
            .map(|d| TransformChain::parse(d, self.block_size, sample_rate))
            .unwrap_or_default();
        self.out.reconfigure(1, 1);
    }

    pub fn process(&mut self, wave: &[f32]) {
        for &sample in wave {
            self.accumulator += sample * sample;
            self.count += 1;
            if self.count >= self.block_size {
                let mean_square = self.accumulator / self.block_size as f32;
                self.push_block(mean_square);
                self.accumulator = 0.0;
                self.count = 0;
                let result = self.gated_mean();
                let loudness = result.sqrt();
                self.prev_output = loudness;
                let value = self.transform.apply(loudness);
                self.out.push_layer(0)[0] = value;
            }
        }
    }

    fn push_block(&mut self, mean_square: f32) {
        if self.ring.len() >= self.blocks_count {
            self.ring.pop_front();
        }
        self.ring.push_back(mean_square);
    }

    /// Computes the gated mean-square over the ring, always admitting at
    /// least the loudest `blocks_count * (1 - gating_limit)` blocks
    /// regardless of the gate, per the loudest-blocks-sorted-descending
    /// resolution of the ambiguity in the original algorithm.
    fn gated_mean(&self) -> f32 {
        if self.ring.is_empty() {
            return 0.0;
        }
        let gating_value = self.prev_output * 10f32.powf(self.params.gating_db / 10.0) * self.block_size as f32;
        let min_admitted = (self.blocks_count as f32 * (1.0 - self.params.gating_limit)).ceil() as usize;

        if self.params.ignore_gating_for_silence && self.ring.iter().all(|&v| v <= 0.0) {
            let sum: f32 = self.ring.iter().sum();
            return sum / self.ring.len() as f32;
        }

        let mut sorted: Vec<f32> = self.ring.iter().copied().collect();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        let min_admitted = min_admitted.min(sorted.len());

        let mut sum = 0.0f32;
        let mut n = 0usize;
        for (i, &v) in sorted.iter().enumerate() {
            if i < min_admitted || v >= gating_value {
                sum += v;
                n += 1;
            }
        }
        if n == 0 {
            0.0
        } else {
            sum / n as f32
        }
    }

    pub fn purge_cache(&mut self) {
        self.out.purge_cache();
    }

    pub fn get_chunks(&self) -> Vec<Chunk<'_>> {
        let sizes = vec![self.block_size; self.out.get_chunks(0).len()];
        self.out.get_chunks_with_sizes(0, Some(&sizes))
    }

    pub fn get_last_data(&self) -> Option<&[f32]> {
        self.out.get_last_data(0)
    }

    pub fn data_size(&self) -> DataSize {
        self.out.data_size()
    }

    pub fn get_prop(&self, name: &str) -> Option<String> {
        match name {
            "block size" => Some(self.block_size.to_string()),
            "blocks count" => Some(self.blocks_count.to_string()),
            _ => None,
        }
    }
}

fn derive_block_size(update_rate_hz: f32, sample_rate: u32) -> u32 {
    (sample_rate as f32 / update_rate_hz.max(0.01)).round().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> LoudnessParams {
        LoudnessParams {
            update_rate_hz: 100.0,
            time_window_ms: 1000.0,
            gating_db: -10.0,
            gating_limit: 0.2,
            ignore_gating_for_silence: true,
            transform_desc: None,
        }
    }

    #[test]
    fn silence_gives_zero_loudness() {
        let mut handler = LoudnessHandler::new(params(), 48000);
        handler.process(&vec![0.0f32; 48000]);
        let chunks = handler.get_chunks();
        assert!(chunks.iter().all(|c| c.values[0] == 0.0));
    }

    #[test]
    fn constant_amplitude_converges_toward_that_amplitude() {
        let mut handler = LoudnessHandler::new(params(), 48000);
        handler.process(&vec![0.5f32; 48000 * 2]);
        let last = handler.get_last_data().unwrap()[0];
        assert!((last - 0.5).abs() < 0.05, "last={last}");
    }
}
