use crate::wave::{Chunk, DataSize};

/// Per-layer chunk bookkeeping shared by every handler: a pooled buffer of
/// emitted values, chunk offsets within that pool, and the last chunk from
/// the previous tick (for downstream consumers that find the current tick
/// empty). Emptied at the start of each tick by [`ChunkRing::purge_cache`].
#[derive(Debug, Default)]
pub struct ChunkRing {
    values_per_chunk: usize,
    layers: Vec<LayerRing>,
}

#[derive(Debug, Default, Clone)]
struct LayerRing {
    pool: Vec<f32>,
    offsets: Vec<usize>,
    last: Option<Vec<f32>>,
}

impl ChunkRing {
    pub fn new(layer_count: usize, values_per_chunk: usize) -> Self {
        Self {
            values_per_chunk,
            layers: vec![LayerRing::default(); layer_count],
        }
    }

    pub fn reconfigure(&mut self, layer_count: usize, values_per_chunk: usize) {
        self.values_per_chunk = values_per_chunk;
        self.layers = vec![LayerRing::default(); layer_count];
    }

    pub fn data_size(&self) -> DataSize {
        DataSize::new(self.layers.len(), self.values_per_chunk)
    }

    /// Reserves space for one new chunk on `layer` and returns a mutable
    /// slice for the kernel to fill.
    pub fn push_layer(&mut self, layer: usize) -> &mut [f32] {
        let ring = &mut self.layers[layer];
        let offset = ring.pool.len();
        ring.pool.resize(offset + self.values_per_chunk, 0.0);
        ring.offsets.push(offset);
        &mut ring.pool[offset..offset + self.values_per_chunk]
    }

    pub fn get_chunks(&self, layer: usize) -> Vec<Chunk<'_>> {
        self.get_chunks_with_sizes(layer, None)
    }

    /// Same as [`Self::get_chunks`] but with an explicit `equivalent_wave_size`
    /// per chunk (handlers with non-uniform emission use this; most pass
    /// `None` and get a uniform size from the caller).
    pub fn get_chunks_with_sizes(&self, layer: usize, sizes: Option<&[u32]>) -> Vec<Chunk<'_>> {
        let ring = &self.layers[layer];
        ring.offsets
            .iter()
            .enumerate()
            .map(|(i, &offset)| {
                let size = sizes.and_then(|s| s.get(i)).copied().unwrap_or(0);
                Chunk::new(size, &ring.pool[offset..offset + self.values_per_chunk])
            })
            .collect()
    }

    pub fn get_last_data(&self, layer: usize) -> Option<&[f32]> {
        let ring = &self.layers[layer];
        if let Some(&offset) = ring.offsets.last() {
            Some(&ring.pool[offset..offset + self.values_per_chunk])
        } else {
            ring.last.as_deref()
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Copies the last chunk of each layer into `last`, then clears the
    /// pool — called once per tick, before any handler produces new data.
    pub fn purge_cache(&mut self) {
        for ring in self.layers.iter_mut() {
            if let Some(&offset) = ring.offsets.last() {
                ring.last = Some(ring.pool[offset..offset + self.values_per_chunk].to_vec());
            }
            ring.pool.clear();
            ring.offsets.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_fetch_chunk() {
        let mut ring = ChunkRing::new(1, 3);
        {
            let slice = ring.push_layer(0);
            slice.copy_from_slice(&[1.0, 2.0, 3.0]);
        }
        let chunks = ring.get_chunks(0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].values, &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn purge_preserves_last_chunk() {
        let mut ring = ChunkRing::new(1, 2);
        ring.push_layer(0).copy_from_slice(&[5.0, 6.0]);
        ring.purge_cache();
        assert!(ring.get_chunks(0).is_empty());
        assert_eq!(ring.get_last_data(0), Some(&[5.0, 6.0][..]));
    }
}
