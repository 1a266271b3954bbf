use crate::config::HandlerConfig;
use crate::dsp::interpolation;
use crate::handlers::fft_analyzer::FftAnalyzerHandler;
use crate::handlers::ring::ChunkRing;
use crate::wave::{Chunk, DataSize};

#[derive(Debug, Clone, PartialEq)]
pub enum BandsDescriptor {
    Custom(Vec<f32>),
    Linear { count: u32, fmin: f32, fmax: f32 },
    Log { count: u32, fmin: f32, fmax: f32 },
}

impl BandsDescriptor {
    /// Parses `"custom f1 f2 ... fn" | "linear count fmin fmax" | "log count fmin fmax"`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut tokens = text.split_whitespace();
        match tokens.next()?.to_ascii_lowercase().as_str() {
            "custom" => {
                let values: Option<Vec<f32>> = tokens.map(|t| t.parse().ok()).collect();
                values.filter(|v| v.len() >= 2).map(BandsDescriptor::Custom)
            }
            "linear" => {
                let count = tokens.next()?.parse().ok()?;
                let fmin = tokens.next()?.parse().ok()?;
                let fmax = tokens.next()?.parse().ok()?;
                Some(BandsDescriptor::Linear { count, fmin, fmax })
            }
            "log" => {
                let count = tokens.next()?.parse().ok()?;
                let fmin = tokens.next()?.parse().ok()?;
                let fmax = tokens.next()?.parse().ok()?;
                Some(BandsDescriptor::Log { count, fmin, fmax })
            }
            _ => None,
        }
    }

    /// Sorted, de-duplicated band-boundary frequencies (`bands_count + 1` entries).
    pub fn band_freqs(&self) -> Vec<f32> {
        let mut freqs = match self {
            BandsDescriptor::Custom(values) => values.clone(),
            BandsDescriptor::Linear { count, fmin, fmax } => {
                let count = (*count).max(1);
                (0..=count)
                    .map(|i| fmin + (fmax - fmin) * (i as f32 / count as f32))
                    .collect()
            }
            BandsDescriptor::Log { count, fmin, fmax } => {
                let count = (*count).max(1);
                let fmin = fmin.max(1e-3);
                let ratio = (fmax / fmin).ln();
                (0..=count)
                    .map(|i| fmin * (ratio * i as f32 / count as f32).exp())
                    .collect()
            }
        };
        freqs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        freqs.dedup_by(|a, b| (*a - *b).abs() < 1e-6);
        freqs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandResamplerParams {
    pub bands: BandsDescriptor,
    pub min_cascade: u32,
    pub max_cascade: u32,
    pub cubic_interpolation: bool,
}

impl BandResamplerParams {
    pub fn parse(config: &HandlerConfig) -> Option<Self> {
        let bands = config.get_str("bands").and_then(BandsDescriptor::parse)?;
        Some(Self {
            bands,
            min_cascade: config.get_u32("minCascade").unwrap_or(0),
            max_cascade: config.get_u32("maxCascade").unwrap_or(0),
            cubic_interpolation: config.get_bool("cubicInterpolation").unwrap_or(false),
        })
    }
}

/// `BandResampler`: resamples FFT bins of a source [`FftAnalyzerHandler`]
/// onto logical frequency bands via a per-(cascade, band) weight matrix.
pub struct BandResamplerHandler {
    params: BandResamplerParams,
    band_freqs: Vec<f32>,
    bands_count: usize,
    active_cascades: std::ops::Range<usize>,
    /// `weights[cascade][band]`: overlap (Hz) of band with the cascade's
    /// bin range, divided by the cascade's bin width.
    weights: Vec<Vec<f32>>,
    ring: ChunkRing,
    sizes: Vec<Vec<u32>>,
}

impl BandResamplerHandler {
    pub fn new(params: BandResamplerParams, source: &FftAnalyzerHandler) -> Self {
        let band_freqs = params.bands.band_freqs();
        let bands_count = band_freqs.len().saturating_sub(1).max(1);
        let mut handler = Self {
            params,
            band_freqs,
            bands_count,
            active_cascades: 0..0,
            weights: Vec::new(),
            ring: ChunkRing::new(1, bands_count),
            sizes: Vec::new(),
        };
        handler.configure(source);
        handler
    }

    pub fn check_same_params(&self, other: &BandResamplerParams) -> bool {
        self.params == *other
    }

    pub fn configure(&mut self, source: &FftAnalyzerHandler) {
        self.band_freqs = self.params.bands.band_freqs();
        self.bands_count = self.band_freqs.len().saturating_sub(1).max(1);
        let total = source.cascades_count();
        let lo = if self.params.min_cascade == 0 { 1 } else { self.params.min_cascade } as usize;
        let hi = if self.params.max_cascade == 0 { total as u32 } else { self.params.max_cascade } as usize;
        let lo = lo.saturating_sub(1).min(total.saturating_sub(1));
        let hi = hi.min(total).max(lo + 1);
        self.active_cascades = lo..hi;

        self.weights = self
            .active_cascades
            .clone()
            .map(|cascade| self.weights_for_cascade(source, cascade))
            .collect();
        self.ring.reconfigure(self.active_cascades.len().max(1), self.bands_count);
        self.sizes = vec![Vec::new(); self.active_cascades.len().max(1)];
    }

    fn weights_for_cascade(&self, source: &FftAnalyzerHandler, cascade: usize) -> Vec<f32> {
        let bin_width = source.bin_width_at(cascade);
        let bins_count = source.fft_size() / 2;
        let mut weights = vec![0.0f32; self.bands_count];
        for bin in 0..bins_count {
            let bin_lo = bin as f32 * bin_width;
            let bin_hi = bin_lo + bin_width;
            for band in 0..self.bands_count {
                let band_lo = self.band_freqs[band];
                let band_hi = self.band_freqs[band + 1];
                let overlap = bin_hi.min(band_hi) - bin_lo.max(band_lo);
                if overlap > 0.0 {
                    weights[band] += overlap / bin_width;
                }
            }
        }
        weights
    }

    pub fn process(&mut self, source: &FftAnalyzerHandler) {
        for sizes in self.sizes.iter_mut() {
            sizes.clear();
        }
        for (local_ix, cascade) in self.active_cascades.clone().enumerate() {
            let bin_width = source.bin_width_at(cascade);
            for chunk in source.get_chunks(cascade) {
                let out = self.resample(chunk.values, bin_width);
                self.ring.push_layer(local_ix).copy_from_slice(&out);
                self.sizes[local_ix].push(chunk.equivalent_wave_size);
            }
        }
    }

    fn resample(&self, bins: &[f32], bin_width: f32) -> Vec<f32> {
        let mut out = vec![0.0f32; self.bands_count];
        for band in 0..self.bands_count {
            let band_lo = self.band_freqs[band];
            let band_hi = self.band_freqs[band + 1];
            let band_width = band_hi - band_lo;
            if self.params.cubic_interpolation && band_width < bin_width {
                let centre = (band_lo + band_hi) * 0.5;
                let pos = centre / bin_width - 0.5;
                out[band] = interpolation::cubic(bins, pos.max(0.0));
            } else {
                let mut sum = 0.0f32;
                let mut count = 0u32;
                for (bin, value) in bins.iter().enumerate() {
                    let bin_centre = (bin as f32 + 0.5) * bin_width;
                    if bin_centre >= band_lo && bin_centre < band_hi {
                        sum += value;
                        count += 1;
                    }
                }
                out[band] = if count > 0 { sum / count as f32 } else { 0.0 };
            }
        }
        out
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

    pub fn bands_count(&self) -> usize {
        self.bands_count
    }

    pub fn active_cascades_count(&self) -> usize {
        self.active_cascades.len().max(1)
    }

    /// Per-cascade reliability weights for one band, used by
    /// `BandCascadeTransformer` to choose the best cascade mixture.
    pub fn band_weights(&self, band: usize) -> Vec<f32> {
        self.weights.iter().map(|w| w.get(band).copied().unwrap_or(0.0)).collect()
    }

    pub fn get_prop(&self, name: &str) -> Option<String> {
        if name == "bands count" {
            return Some(self.bands_count.to_string());
        }
        for i in 0..self.bands_count {
            if name == format!("lower bound {i}") {
                return Some(self.band_freqs[i].to_string());
            }
            if name == format!("upper bound {i}") {
                return Some(self.band_freqs[i + 1].to_string());
            }
            if name == format!("central frequency {i}") {
                return Some(((self.band_freqs[i] + self.band_freqs[i + 1]) * 0.5).to_string());
            }
        }
        None
    }
}

impl std::fmt::Debug for BandResamplerHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandResamplerHandler")
            .field("params", &self.params)
            .field("bands_count", &self.bands_count)
            .field("active_cascades", &self.active_cascades)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn band_containing_tone_dominates() {
        let sample_rate = 48000u32;
        let fft_params = crate::handlers::fft_analyzer::FftParams {
            bin_width_hz: 10.0,
            overlap: 0.0,
            cascades_count: 1,
            window_name: "hann".to_string(),
            window_param: None,
            random_test: 0.0,
            random_duration_ms: 100.0,
        };
        let mut fft = FftAnalyzerHandler::new(fft_params, sample_rate);
        let n = sample_rate as usize;
        let wave: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        fft.process(&wave, Instant::now() + Duration::from_secs(5));

        let params = BandResamplerParams {
            bands: BandsDescriptor::Log { count: 10, fmin: 20.0, fmax: 20000.0 },
            min_cascade: 0,
            max_cascade: 0,
            cubic_interpolation: false,
        };
        let mut resampler = BandResamplerHandler::new(params, &fft);
        resampler.process(&fft);
        let chunks = resampler.get_chunks(0);
        let last = chunks.last().unwrap();
        let max = last.values.iter().cloned().fold(0.0f32, f32::max);
        let target_band = resampler
            .band_freqs
            .windows(2)
            .position(|w| 1000.0 >= w[0] && 1000.0 < w[1])
            .unwrap();
        assert!(last.values[target_band] >= 0.9 * max);
    }

    #[test]
    fn weights_sum_to_bins_count_over_covered_range() {
        let sample_rate = 48000u32;
        let fft_params = crate::handlers::fft_analyzer::FftParams {
            bin_width_hz: 20.0,
            overlap: 0.0,
            cascades_count: 1,
            window_name: "rectangular".to_string(),
            window_param: None,
            random_test: 0.0,
            random_duration_ms: 100.0,
        };
        let fft = FftAnalyzerHandler::new(fft_params, sample_rate);
        let params = BandResamplerParams {
            bands: BandsDescriptor::Linear { count: 4, fmin: 0.0, fmax: sample_rate as f32 / 2.0 },
            min_cascade: 0,
            max_cascade: 0,
            cubic_interpolation: false,
        };
        let resampler = BandResamplerHandler::new(params, &fft);
        let bins_count = fft.fft_size() / 2;
        let total: f32 = (0..resampler.bands_count()).map(|b| resampler.band_weights(b)[0]).sum();
        assert!((total - bins_count as f32).abs() < bins_count as f32 * 0.05);
    }
}
