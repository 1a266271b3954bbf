use crate::config::HandlerConfig;
use crate::dsp::gaussian::GaussianCoefficientsManager;
use crate::handlers::ring::ChunkRing;
use crate::wave::{Chunk, DataSize};

#[derive(Debug, Clone, PartialEq)]
pub struct BlurParams {
    pub blur_radius: f32,
    pub blur_radius_adaptation: f32,
}

impl BlurParams {
    pub fn parse(config: &HandlerConfig) -> Self {
        Self {
            blur_radius: config.get_f32("blurRadius").unwrap_or(1.0).max(0.0),
            blur_radius_adaptation: config.get_f32("blurRadiusAdaptation").unwrap_or(1.0).max(0.0),
        }
    }
}

/// Source shape (layer count, values per chunk) this blur is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandSourceShape {
    pub layers: usize,
    pub bands_count: usize,
}

/// `UniformBlur`: convolves each layer's band values with a Gaussian kernel
/// whose radius scales per cascade by `blur_radius_adaptation^layer`.
pub struct UniformBlurHandler {
    params: BlurParams,
    shape: BandSourceShape,
    kernels: GaussianCoefficientsManager,
    ring: ChunkRing,
    sizes: Vec<Vec<u32>>,
}

impl UniformBlurHandler {
    pub fn new(params: BlurParams, shape: BandSourceShape) -> Self {
        let mut handler = Self {
            params,
            shape,
            kernels: GaussianCoefficientsManager::new(),
            ring: ChunkRing::new(1, 1),
            sizes: Vec::new(),
        };
        handler.configure(shape);
        handler
    }

    pub fn check_same_params(&self, other: &BlurParams) -> bool {
        self.params == *other
    }

    pub fn configure(&mut self, shape: BandSourceShape) {
        self.shape = shape;
        self.ring.reconfigure(shape.layers.max(1), shape.bands_count.max(1));
        self.sizes = vec![Vec::new(); shape.layers.max(1)];
    }

    /// Feeds one tick's worth of chunks for `layer` from the source,
    /// convolving each with the layer's Gaussian kernel.
    pub fn process_layer(&mut self, layer: usize, chunks: &[(u32, &[f32])]) {
        if let Some(sizes) = self.sizes.get_mut(layer) {
            sizes.clear();
        }
        let radius = (self.params.blur_radius * self.params.blur_radius_adaptation.powi(layer as i32))
            .round()
            .max(0.0) as u32;
        let kernel = self.kernels.get(radius).to_vec();
        for (equivalent, values) in chunks {
            let out = convolve_clamped(values, &kernel);
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

impl std::fmt::Debug for UniformBlurHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniformBlurHandler").field("params", &self.params).field("shape", &self.shape).finish()
    }
}

/// Convolves `values` with `kernel`, clamping (skipping, not reflecting)
/// samples outside `values`' domain.
fn convolve_clamped(values: &[f32], kernel: &[f32]) -> Vec<f32> {
    let radius = kernel.len() / 2;
    let n = values.len();
    (0..n)
        .map(|i| {
            let mut sum = 0.0f32;
            let mut weight = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let offset = k as isize - radius as isize;
                let src = i as isize + offset;
                if src >= 0 && (src as usize) < n {
                    sum += values[src as usize] * w;
                    weight += w;
                }
            }
            if weight > 0.0 {
                sum / weight
            } else {
                values[i]
            }
        })
        .collect()
}

/// Legacy `WeightedBlur`: kernel radius is derived per band from the
/// source's reliability weight rather than being uniform across bands.
/// Deprecated upstream with no clear semantics for new configurations;
/// parsed so old configs don't error, but intentionally left a pass-through.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedBlurParams {
    pub radius_multiplier: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    pub min_weight: f32,
}

impl WeightedBlurParams {
    pub fn parse(config: &HandlerConfig) -> Self {
        log::warn!("WeightedBlur is deprecated; parsing its options but not defining new behaviour");
        Self {
            radius_multiplier: config.get_f32("radiusMultiplier").unwrap_or(1.0),
            min_radius: config.get_f32("minRadius").unwrap_or(0.0),
            max_radius: config.get_f32("maxRadius").unwrap_or(10.0),
            min_weight: config.get_f32("minWeight").unwrap_or(0.1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_radius_is_identity() {
        let mut handler = UniformBlurHandler::new(
            BlurParams { blur_radius: 0.0, blur_radius_adaptation: 1.0 },
            BandSourceShape { layers: 1, bands_count: 4 },
        );
        let values = [1.0, 2.0, 3.0, 4.0];
        handler.process_layer(0, &[(100, &values)]);
        let chunks = handler.get_chunks(0);
        assert_eq!(chunks[0].values, &values);
    }

    #[test]
    fn blur_smooths_a_spike() {
        let mut handler = UniformBlurHandler::new(
            BlurParams { blur_radius: 2.0, blur_radius_adaptation: 1.0 },
            BandSourceShape { layers: 1, bands_count: 9 },
        );
        let mut values = [0.0f32; 9];
        values[4] = 9.0;
        handler.process_layer(0, &[(100, &values)]);
        let chunks = handler.get_chunks(0);
        assert!(chunks[0].values[4] < 9.0);
        assert!(chunks[0].values[3] > 0.0);
    }
}
