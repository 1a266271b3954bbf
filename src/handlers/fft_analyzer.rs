use std::time::Instant;

use rand::Rng;
use rand::rngs::ThreadRng;

use crate::config::HandlerConfig;
use crate::dsp::fft::{next_fast_size, FftCascade};
use crate::dsp::window::Window;
use crate::handlers::ring::ChunkRing;
use crate::wave::{Chunk, DataSize};

#[derive(Debug, Clone, PartialEq)]
pub struct FftParams {
    pub bin_width_hz: f32,
    pub overlap: f32,
    pub cascades_count: u32,
    pub window_name: String,
    pub window_param: Option<f32>,
    pub random_test: f32,
    pub random_duration_ms: f32,
}

impl FftParams {
    pub fn parse(config: &HandlerConfig) -> Self {
        let bin_width_hz = config.get_f32("binWidth").unwrap_or(10.0).max(1e-6);
        if bin_width_hz <= 1.0 {
            log::warn!("fft handler: binWidth <= 1 Hz gives an impractically large FFT size");
        }
        let overlap = match config.get_f32("overlapBoost") {
            Some(boost) if boost >= 1.0 => 1.0 - 1.0 / boost,
            _ => config.get_f32("overlap").unwrap_or(0.5).clamp(0.0, 1.0),
        };
        Self {
            bin_width_hz,
            overlap,
            cascades_count: config.get_u32("cascadesCount").unwrap_or(1).clamp(1, 20),
            window_name: config.get_str("windowFunction").unwrap_or("hann").to_string(),
            window_param: config.get_f32("windowParam"),
            random_test: config.get_f32("randomTest").unwrap_or(0.0).max(0.0),
            random_duration_ms: config.get_f32("randomDuration").unwrap_or(100.0).max(1.0),
        }
    }

    fn window(&self) -> Window {
        Window::parse(&self.window_name, self.window_param).unwrap_or(Window::Hann)
    }
}

/// `FftAnalyzer`: a pyramid of [`FftCascade`]s, cascade `k+1` fed by the
/// pairwise-downsampled input stream of cascade `k`, each emitting on its
/// own layer.
pub struct FftAnalyzerHandler {
    params: FftParams,
    sample_rate: u32,
    fft_size: usize,
    input_stride: usize,
    cascades: Vec<FftCascade>,
    pending_pair: Vec<Option<f32>>,
    ring: ChunkRing,
    sizes: Vec<Vec<u32>>,
    random_phase_remaining: u32,
    random_phase_on: bool,
    random_block_samples: u32,
    rng: ThreadRng,
}

impl FftAnalyzerHandler {
    pub fn new(params: FftParams, sample_rate: u32) -> Self {
        let mut handler = Self {
            params,
            sample_rate: 0,
            fft_size: 16,
            input_stride: 16,
            cascades: Vec::new(),
            pending_pair: Vec::new(),
            ring: ChunkRing::new(1, 1),
            sizes: Vec::new(),
            random_phase_remaining: 0,
            random_phase_on: true,
            random_block_samples: 1,
            rng: rand::thread_rng(),
        };
        handler.configure(sample_rate);
        handler
    }

    pub fn check_same_params(&self, other: &FftParams) -> bool {
        self.params == *other
    }

    pub fn configure(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        let min_size = (sample_rate as f32 / self.params.bin_width_hz).max(16.0) as usize;
        self.fft_size = next_fast_size(min_size.max(16));
        self.input_stride = ((self.fft_size as f32) * (1.0 - self.params.overlap))
            .round()
            .clamp(16.0, self.fft_size as f32) as usize;
        let window = self.params.window();
        let count = self.params.cascades_count as usize;
        self.cascades = (0..count)
            .map(|_| FftCascade::new(self.fft_size, self.input_stride, window))
            .collect();
        self.pending_pair = vec![None; count];
        self.ring.reconfigure(count, self.fft_size / 2);
        self.sizes = vec![Vec::new(); count];
        self.random_block_samples = (self.params.random_duration_ms / 1000.0 * sample_rate as f32)
            .round()
            .max(1.0) as u32;
    }

    pub fn process(&mut self, wave: &[f32], deadline: Instant) {
        for sizes in self.sizes.iter_mut() {
            sizes.clear();
        }
        for &sample in wave {
            if Instant::now() >= deadline {
                self.duplicate_remaining();
                return;
            }
            let effective = if self.params.random_test > 0.0 {
                self.next_random_sample()
            } else {
                sample
            };
            self.feed(0, effective);
        }
    }

    fn next_random_sample(&mut self) -> f32 {
        if self.random_phase_remaining == 0 {
            self.random_phase_remaining = self.random_block_samples;
            self.random_phase_on = !self.random_phase_on;
        }
        self.random_phase_remaining -= 1;
        if !self.random_phase_on {
            return 0.0;
        }
        self.rng.gen_range(-1.0f32..=1.0f32) * self.params.random_test
    }

    fn feed(&mut self, level: usize, sample: f32) {
        if level >= self.cascades.len() {
            return;
        }
        if let Some(spectrum) = self.cascades[level].push(sample) {
            let slot = self.ring.push_layer(level);
            slot.copy_from_slice(spectrum);
            let equivalent = (self.input_stride as u32).saturating_mul(1u32 << level as u32);
            self.sizes[level].push(equivalent);
        }
        if level + 1 < self.cascades.len() {
            match self.pending_pair[level].take() {
                None => self.pending_pair[level] = Some(sample),
                Some(first) => {
                    let avg = (first + sample) * 0.5;
                    self.feed(level + 1, avg);
                }
            }
        }
    }

    fn duplicate_remaining(&mut self) {
        for level in 0..self.cascades.len() {
            let spectrum = self.cascades[level].last().to_vec();
            let slot = self.ring.push_layer(level);
            slot.copy_from_slice(&spectrum);
            let equivalent = (self.input_stride as u32).saturating_mul(1u32 << level as u32);
            self.sizes[level].push(equivalent);
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

    pub fn cascades_count(&self) -> usize {
        self.cascades.len()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn input_stride(&self) -> usize {
        self.input_stride
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The effective bin width (Hz) at cascade `k`, halving each level.
    pub fn bin_width_at(&self, cascade: usize) -> f32 {
        (self.sample_rate as f32 / self.fft_size as f32) / (1u32 << cascade as u32) as f32
    }

    pub fn get_prop(&self, name: &str) -> Option<String> {
        match name {
            "fft size" => Some(self.fft_size.to_string()),
            "input stride" => Some(self.input_stride.to_string()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for FftAnalyzerHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftAnalyzerHandler")
            .field("params", &self.params)
            .field("fft_size", &self.fft_size)
            .field("input_stride", &self.input_stride)
            .field("cascades", &self.cascades.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[test]
    fn dc_input_peaks_at_bin_zero() {
        let params = FftParams {
            bin_width_hz: 100.0,
            overlap: 0.0,
            cascades_count: 1,
            window_name: "rectangular".to_string(),
            window_param: None,
            random_test: 0.0,
            random_duration_ms: 100.0,
        };
        let mut handler = FftAnalyzerHandler::new(params, 48000);
        let wave = vec![1.0f32; handler.fft_size() * 2];
        handler.process(&wave, far_deadline());
        let chunks = handler.get_chunks(0);
        let last = chunks.last().expect("should have emitted");
        let argmax = last
            .values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(argmax, 0);
    }

    #[test]
    fn single_tone_peaks_near_target_bin() {
        let sample_rate = 48000u32;
        let params = FftParams {
            bin_width_hz: 10.0,
            overlap: 0.0,
            cascades_count: 1,
            window_name: "hann".to_string(),
            window_param: None,
            random_test: 0.0,
            random_duration_ms: 100.0,
        };
        let mut handler = FftAnalyzerHandler::new(params, sample_rate);
        let freq = 1000.0f32;
        let n = sample_rate as usize;
        let wave: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        handler.process(&wave, far_deadline());
        let chunks = handler.get_chunks(0);
        let last = chunks.last().expect("should have emitted");
        let bin_width = handler.bin_width_at(0);
        let target_bin = (freq / bin_width).round() as usize;
        let argmax = last
            .values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert!((argmax as i64 - target_bin as i64).abs() <= 1, "argmax={argmax} target={target_bin}");
    }

    #[test]
    fn kill_deadline_duplicates_without_panicking() {
        let params = FftParams {
            bin_width_hz: 100.0,
            overlap: 0.0,
            cascades_count: 2,
            window_name: "hann".to_string(),
            window_param: None,
            random_test: 0.0,
            random_duration_ms: 100.0,
        };
        let mut handler = FftAnalyzerHandler::new(params, 48000);
        let wave = vec![0.1f32; 4096];
        let past_deadline = Instant::now() - Duration::from_micros(1);
        handler.process(&wave, past_deadline);
    }
}
