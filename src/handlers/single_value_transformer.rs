use crate::config::HandlerConfig;
use crate::handlers::ring::ChunkRing;
use crate::handlers::transform::TransformChain;
use crate::wave::{Chunk, DataSize};

#[derive(Debug, Clone, PartialEq)]
pub struct SvtParams {
    pub transform_desc: Option<String>,
}

impl SvtParams {
    pub fn parse(config: &HandlerConfig) -> Self {
        Self {
            transform_desc: config.get_str("transform").map(|s| s.to_string()),
        }
    }
}

/// `SingleValueTransformer` (a.k.a. `ValueTransformer`): applies its chain
/// elementwise to every chunk of every layer of its source, preserving shape.
pub struct SingleValueTransformerHandler {
    params: SvtParams,
    transform: TransformChain,
    ring: ChunkRing,
    sizes: Vec<Vec<u32>>,
}

impl SingleValueTransformerHandler {
    pub fn new(params: SvtParams, sample_rate: u32, layers: usize, values_per_chunk: usize) -> Self {
        let mut handler = Self {
            params,
            transform: TransformChain::identity(),
            ring: ChunkRing::new(1, 1),
            sizes: Vec::new(),
        };
        handler.configure(sample_rate, layers, values_per_chunk);
        handler
    }

    pub fn check_same_params(&self, other: &SvtParams) -> bool {
        self.params == *other
    }

    pub fn configure(&mut self, sample_rate: u32, layers: usize, values_per_chunk: usize) {
        let layers = layers.max(1);
        let vpc = values_per_chunk.max(1);
        self.ring.reconfigure(layers, vpc);
        self.sizes = vec![Vec::new(); layers];
        self.transform = self
            .params
            .transform_desc
            .as_deref()
            .map(|d| TransformChain::parse(d, 1, sample_rate))
            .unwrap_or_default();
    }

    pub fn process_layer(&mut self, layer: usize, source_chunks: &[(u32, &[f32])]) {
        if let Some(sizes) = self.sizes.get_mut(layer) {
            sizes.clear();
        }
        for (equivalent, values) in source_chunks {
            let out: Vec<f32> = values
                .iter()
                .map(|&v| {
                    let mut chain = self.transform.clone();
                    chain.apply(v)
                })
                .collect();
            self.ring.push_layer(layer).copy_from_slice(&out);
            if let Some(sizes) = self.sizes.get_mut(layer) {
                sizes.push(*equivalent);
            }
        }
    }

    pub fn purge_cache(&mut self) {
        self.ring.purge_cache();
    }

    pub fn get_chunks(&self, layer: usize) -> Vec<Chunk<'_>> {
        self.ring.get_chunks_with_sizes(layer, self.sizes.get(layer).map(|v| v.as_slice()))
    }

    pub fn get_last_data(&self, layer: usize) -> Option<&[f32]> {
        self.ring.get_last_data(layer)
    }

    pub fn data_size(&self) -> DataSize {
        self.ring.data_size()
    }
}

impl std::fmt::Debug for SingleValueTransformerHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleValueTransformerHandler").field("params", &self.params).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_chain_elementwise_preserving_shape() {
        let mut handler = SingleValueTransformerHandler::new(
            SvtParams { transform_desc: Some("clamp[min:0 max:1]".to_string()) },
            48000,
            1,
            3,
        );
        let values = [2.0f32, -1.0, 0.5];
        handler.process_layer(0, &[(100, &values)]);
        let chunks = handler.get_chunks(0);
        assert_eq!(chunks[0].values, &[1.0, 0.0, 0.5]);
    }
}
