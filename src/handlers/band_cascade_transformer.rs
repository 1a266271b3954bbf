use crate::config::HandlerConfig;
use crate::handlers::band_resampler::BandResamplerHandler;
use crate::handlers::ring::ChunkRing;
use crate::wave::{Chunk, DataSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixKind {
    Product,
    Average,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandCascadeParams {
    pub min_weight: f32,
    pub target_weight: f32,
    pub weight_fallback: f32,
    pub zero_level_multiplier: f32,
    pub zero_level_hard_multiplier: f32,
    pub zero_weight_multiplier: f32,
    pub mix: MixKind,
}

impl BandCascadeParams {
    pub fn parse(config: &HandlerConfig) -> Self {
        let mix = match config.get_str("mix").unwrap_or("product") {
            "average" => MixKind::Average,
            _ => MixKind::Product,
        };
        let min_weight = config.get_f32("minWeight").unwrap_or(0.1).max(1e-6);
        Self {
            min_weight,
            target_weight: config.get_f32("targetWeight").unwrap_or(1.0).max(min_weight),
            weight_fallback: config.get_f32("weightFallback").unwrap_or(0.5).clamp(0.0, 1.0),
            zero_level_multiplier: config.get_f32("zeroLevelMultiplier").unwrap_or(0.1).max(0.0),
            zero_level_hard_multiplier: config.get_f32("zeroLevelHardMultiplier").unwrap_or(0.01).clamp(0.0, 1.0),
            zero_weight_multiplier: config.get_f32("zeroWeightMultiplier").unwrap_or(0.01).max(1e-9),
            mix,
        }
    }
}

/// `BandCascadeTransformer`: for each band, chooses the best mixture of
/// source cascades and collapses them into a single scalar value.
pub struct BandCascadeTransformerHandler {
    params: BandCascadeParams,
    bands_count: usize,
    ring: ChunkRing,
    sizes: Vec<u32>,
    cascade_range_per_band: Vec<(usize, usize)>,
    analysis: String,
}

impl BandCascadeTransformerHandler {
    pub fn new(params: BandCascadeParams, source: &BandResamplerHandler) -> Self {
        let mut handler = Self {
            params,
            bands_count: 0,
            ring: ChunkRing::new(1, 1),
            sizes: Vec::new(),
            cascade_range_per_band: Vec::new(),
            analysis: String::new(),
        };
        handler.configure(source);
        handler
    }

    pub fn check_same_params(&self, other: &BandCascadeParams) -> bool {
        self.params == *other
    }

    pub fn configure(&mut self, source: &BandResamplerHandler) {
        self.bands_count = source.bands_count();
        self.ring.reconfigure(1, self.bands_count.max(1));
        self.sizes.clear();
        self.cascade_range_per_band = vec![(0, 0); self.bands_count];
    }

    pub fn process(&mut self, source: &BandResamplerHandler) {
        let cascades = source.active_cascades_count();
        let ticks = (0..cascades).map(|c| source.get_chunks(c).len()).max().unwrap_or(0);
        for tick in 0..ticks {
            let mut out = vec![0.0f32; self.bands_count];
            let mut equivalent = 0u32;
            let mut analysis_parts = Vec::with_capacity(self.bands_count);
            for band in 0..self.bands_count {
                let weights = source.band_weights(band);
                let (value, min_c, max_c) = self.mix_band(source, band, &weights, cascades, tick);
                out[band] = value;
                self.cascade_range_per_band[band] = (min_c, max_c);
                analysis_parts.push(format!("{band}:{:.3}:{min_c}-{max_c}", weights.first().copied().unwrap_or(0.0)));
                if let Some(chunk) = source.get_chunks(0).get(tick.min(source.get_chunks(0).len().saturating_sub(1))) {
                    equivalent = equivalent.max(chunk.equivalent_wave_size);
                }
            }
            self.analysis = analysis_parts.join(" ");
            self.ring.push_layer(0).copy_from_slice(&out);
            self.sizes.push(equivalent);
        }
    }

    /// Accumulates `value` over the cascades covering `band`, applying the
    /// zero-level early-outs and the skipped-cascade fallback pass.
    fn mix_band(
        &self,
        source: &BandResamplerHandler,
        band: usize,
        weights: &[f32],
        cascades: usize,
        tick: usize,
    ) -> (f32, usize, usize) {
        let zero_level = self.params.zero_level_multiplier;
        let zero_level_hard = zero_level * self.params.zero_level_hard_multiplier;
        let zero_weight = self.params.min_weight * self.params.zero_weight_multiplier.min(1.0);

        let mut value = match self.params.mix {
            MixKind::Product => 1.0f32,
            MixKind::Average => 0.0f32,
        };
        let mut total_weight = 0.0f32;
        let mut min_used = cascades;
        let mut max_used = 0usize;
        let mut skipped = Vec::new();

        for cascade in 0..cascades {
            let weight = weights.get(cascade).copied().unwrap_or(0.0);
            if weight < self.params.min_weight {
                if weight >= zero_weight {
                    skipped.push(cascade);
                }
                continue;
            }
            let chunks = source.get_chunks(cascade);
            let magnitude = chunks
                .get(tick.min(chunks.len().saturating_sub(1)))
                .map(|c| c.values.get(band).copied().unwrap_or(0.0))
                .unwrap_or(0.0);
            let contribution = magnitude / weight;
            match self.params.mix {
                MixKind::Product => value *= contribution,
                MixKind::Average => value += contribution,
            }
            total_weight += weight;
            min_used = min_used.min(cascade);
            max_used = max_used.max(cascade);
            if value < zero_level_hard {
                break;
            }
            if value < zero_level {
                continue;
            }
            if total_weight >= self.params.target_weight {
                break;
            }
        }

        if total_weight < self.params.weight_fallback * self.params.target_weight {
            for cascade in skipped {
                let weight = weights.get(cascade).copied().unwrap_or(0.0).max(zero_weight);
                let chunks = source.get_chunks(cascade);
                let magnitude = chunks
                    .get(tick.min(chunks.len().saturating_sub(1)))
                    .map(|c| c.values.get(band).copied().unwrap_or(0.0))
                    .unwrap_or(0.0);
                let contribution = magnitude / weight;
                match self.params.mix {
                    MixKind::Product => value *= contribution,
                    MixKind::Average => value += contribution,
                }
                total_weight += weight;
                min_used = min_used.min(cascade);
                max_used = max_used.max(cascade);
                if total_weight >= self.params.weight_fallback * self.params.target_weight {
                    break;
                }
            }
        }

        if min_used > max_used {
            min_used = 0;
            max_used = 0;
        }

        let count = (max_used - min_used + 1).max(1) as f32;
        let final_value = match self.params.mix {
            MixKind::Product => value.max(0.0).powf(1.0 / count),
            MixKind::Average => value / count,
        };
        (final_value, min_used, max_used)
    }

    pub fn purge_cache(&mut self) {
        self.ring.purge_cache();
        self.sizes.clear();
    }

    pub fn get_chunks(&self, layer: usize) -> Vec<Chunk<'_>> {
        self.ring.get_chunks_with_sizes(layer, Some(&self.sizes))
    }

    pub fn get_last_data(&self, layer: usize) -> Option<&[f32]> {
        self.ring.get_last_data(layer)
    }

    pub fn data_size(&self) -> DataSize {
        self.ring.data_size()
    }

    pub fn get_prop(&self, name: &str) -> Option<String> {
        match name {
            "cascade analysis" => Some(self.analysis.clone()),
            "min cascade used" => self.cascade_range_per_band.iter().map(|r| r.0).min().map(|v| v.to_string()),
            "max cascade used" => self.cascade_range_per_band.iter().map(|r| r.1).max().map(|v| v.to_string()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for BandCascadeTransformerHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandCascadeTransformerHandler")
            .field("params", &self.params)
            .field("bands_count", &self.bands_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::band_resampler::{BandResamplerHandler, BandResamplerParams, BandsDescriptor};
    use crate::handlers::fft_analyzer::{FftAnalyzerHandler, FftParams};
    use std::time::{Duration, Instant};

    #[test]
    fn single_cascade_passthrough_matches_weighted_value() {
        let sample_rate = 48000u32;
        let fft_params = FftParams {
            bin_width_hz: 50.0,
            overlap: 0.0,
            cascades_count: 1,
            window_name: "rectangular".to_string(),
            window_param: None,
            random_test: 0.0,
            random_duration_ms: 100.0,
        };
        let mut fft = FftAnalyzerHandler::new(fft_params, sample_rate);
        fft.process(&vec![1.0f32; 4096], Instant::now() + Duration::from_secs(5));

        let resampler_params = BandResamplerParams {
            bands: BandsDescriptor::Linear { count: 4, fmin: 0.0, fmax: sample_rate as f32 / 2.0 },
            min_cascade: 0,
            max_cascade: 0,
            cubic_interpolation: false,
        };
        let mut resampler = BandResamplerHandler::new(resampler_params, &fft);
        resampler.process(&fft);

        let params = BandCascadeParams {
            min_weight: 0.01,
            target_weight: 0.5,
            weight_fallback: 0.0,
            zero_level_multiplier: 0.0,
            zero_level_hard_multiplier: 0.0,
            zero_weight_multiplier: 0.01,
            mix: MixKind::Average,
        };
        let mut transformer = BandCascadeTransformerHandler::new(params, &resampler);
        transformer.process(&resampler);
        let chunks = transformer.get_chunks(0);
        assert!(!chunks.is_empty());
        assert!(chunks[0].values.iter().all(|v| v.is_finite()));
    }
}
