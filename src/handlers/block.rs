use crate::config::HandlerConfig;
use crate::dsp::irf::LogarithmicIrf;
use crate::handlers::ring::ChunkRing;
use crate::handlers::transform::TransformChain;
use crate::wave::{Chunk, DataSize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockKind {
    Rms,
    Peak,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockParams {
    pub update_rate_hz: f32,
    pub attack_ms: f32,
    pub decay_ms: f32,
    pub transform_desc: Option<String>,
}

impl BlockParams {
    pub fn parse(config: &HandlerConfig) -> Self {
        Self {
            update_rate_hz: config.get_f32("updateRate").unwrap_or(60.0).clamp(0.01, 500.0),
            attack_ms: config.get_f32("attack").unwrap_or(0.0).max(0.0),
            decay_ms: config.get_f32("decay").unwrap_or(0.0).max(0.0),
            transform_desc: config.get_str("transform").map(|s| s.to_string()),
        }
    }
}

/// `BlockRms`/`BlockPeak`: accumulates a fixed-size block of the wave and
/// emits one smoothed, transformed scalar per block.
#[derive(Debug)]
pub struct BlockHandler {
    kind: BlockKind,
    params: BlockParams,
    block_size: u32,
    sample_rate: u32,
    accumulator: f32,
    count: u32,
    irf: LogarithmicIrf,
    transform: TransformChain,
    ring: ChunkRing,
}

impl BlockHandler {
    pub fn new(kind: BlockKind, params: BlockParams, sample_rate: u32) -> Self {
        let block_size = derive_block_size(params.update_rate_hz, sample_rate);
        let irf = LogarithmicIrf::new(params.attack_ms / 1000.0, params.decay_ms / 1000.0, block_size, sample_rate);
        let transform = params
            .transform_desc
            .as_deref()
            .map(|d| TransformChain::parse(d, block_size, sample_rate))
            .unwrap_or_default();
        Self {
            kind,
            params,
            block_size,
            sample_rate,
            accumulator: 0.0,
            count: 0,
            irf,
            transform,
            ring: ChunkRing::new(1, 1),
        }
    }

    pub fn check_same_params(&self, other: &BlockParams) -> bool {
        self.params == *other
    }

    pub fn configure(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.block_size = derive_block_size(self.params.update_rate_hz, sample_rate);
        self.irf = LogarithmicIrf::new(
            self.params.attack_ms / 1000.0,
            self.params.decay_ms / 1000.0,
            self.block_size,
            sample_rate,
        );
        self.ring.reconfigure(1, 1);
    }

    pub fn process(&mut self, wave: &[f32]) {
        for &sample in wave {
            match self.kind {
                BlockKind::Rms => self.accumulator += sample * sample,
                BlockKind::Peak => self.accumulator = self.accumulator.max(sample.abs()),
            }
            self.count += 1;
            if self.count >= self.block_size {
                let raw = match self.kind {
                    BlockKind::Rms => (self.accumulator / self.block_size as f32).sqrt(),
                    BlockKind::Peak => self.accumulator,
                };
                let smoothed = self.irf.next(raw);
                let value = self.transform.apply(smoothed);
                self.ring.push_layer(0)[0] = value;
                self.accumulator = 0.0;
                self.count = 0;
            }
        }
    }

    pub fn purge_cache(&mut self) {
        self.ring.purge_cache();
    }

    pub fn get_chunks(&self) -> Vec<Chunk<'_>> {
        let sizes = vec![self.block_size; self.ring.get_chunks(0).len()];
        self.ring.get_chunks_with_sizes(0, Some(&sizes))
    }

    pub fn get_last_data(&self) -> Option<&[f32]> {
        self.ring.get_last_data(0)
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

fn derive_block_size(update_rate_hz: f32, sample_rate: u32) -> u32 {
    ((sample_rate as f32 / update_rate_hz).round() as u32).max(1)
}
