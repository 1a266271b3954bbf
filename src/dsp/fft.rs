use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::dsp::window::Window;

/// Smallest product of the primes {2, 3, 5} that is `>= min_size`, floored
/// at 16. FFT implementations (including `rustfft`'s mixed-radix path) are
/// fastest on these "5-smooth" sizes, and the DSP kernels never need an
/// exact power of two.
pub fn next_fast_size(min_size: usize) -> usize {
    let min_size = min_size.max(16);
    let mut best = usize::MAX;
    let mut p5 = 1usize;
    while p5 < min_size.saturating_mul(2) {
        let mut p3 = p5;
        while p3 < min_size.saturating_mul(2) {
            let mut p2 = p3;
            while p2 < min_size {
                p2 = p2.saturating_mul(2);
            }
            if p2 >= min_size && p2 < best {
                best = p2;
            }
            p3 = p3.saturating_mul(3);
        }
        p5 = p5.saturating_mul(5);
    }
    best.max(16)
}

/// One level of the FFT pyramid. Cascade `k` observes a stream already
/// downsampled (by 2, pairwise-averaged) `k` times by its caller, so its own
/// `fft_size`/`input_stride` are expressed in that cascade's own sample
/// domain.
pub struct FftCascade {
    fft_size: usize,
    input_stride: usize,
    window: Vec<f32>,
    window_sum: f32,
    fft: Arc<dyn Fft<f32>>,
    ring: VecDeque<f32>,
    pending: usize,
    scratch: Vec<Complex32>,
    last_magnitudes: Vec<f32>,
}

impl FftCascade {
    pub fn new(fft_size: usize, input_stride: usize, window: Window) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let window_coeffs = window.generate(fft_size);
        let window_sum: f32 = window_coeffs.iter().sum();
        let mut ring = VecDeque::with_capacity(fft_size);
        ring.resize(fft_size, 0.0);
        Self {
            fft_size,
            input_stride: input_stride.clamp(16, fft_size.max(16)),
            window: window_coeffs,
            window_sum: window_sum.max(f32::MIN_POSITIVE),
            fft,
            ring,
            pending: 0,
            scratch: vec![Complex32::new(0.0, 0.0); fft_size],
            last_magnitudes: vec![0.0; fft_size / 2],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn input_stride(&self) -> usize {
        self.input_stride
    }

    pub fn bins_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Feeds one sample; returns a freshly computed magnitude spectrum
    /// whenever `input_stride` new samples have accumulated since the last
    /// emission, else `None`.
    pub fn push(&mut self, sample: f32) -> Option<&[f32]> {
        self.ring.pop_front();
        self.ring.push_back(sample);
        self.pending += 1;
        if self.pending >= self.input_stride {
            self.pending -= self.input_stride;
            self.compute();
            Some(&self.last_magnitudes)
        } else {
            None
        }
    }

    /// Re-emits the previous magnitude spectrum without recomputing it —
    /// used when a tick's kill deadline forces a handler to duplicate its
    /// last chunk instead of doing fresh FFT work.
    pub fn last(&self) -> &[f32] {
        &self.last_magnitudes
    }

    fn compute(&mut self) {
        for (i, (sample, &w)) in self.ring.iter().zip(self.window.iter()).enumerate() {
            self.scratch[i] = Complex32::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.scratch);
        let norm = 2.0 / self.window_sum;
        for (i, (bin, value)) in self.last_magnitudes.iter_mut().zip(self.scratch.iter()).enumerate() {
            // DC (and Nyquist, were it not excluded from `last_magnitudes`) has no
            // negative-frequency mirror, so it does not get the one-sided factor of 2.
            let bin_norm = if i == 0 { 1.0 / self.window_sum } else { norm };
            *bin = value.norm() * bin_norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_fast_size_is_five_smooth_and_floored() {
        assert_eq!(next_fast_size(1), 16);
        assert!(next_fast_size(100) >= 100);
        let n = next_fast_size(100);
        let mut m = n;
        for p in [2, 3, 5] {
            while m % p == 0 {
                m /= p;
            }
        }
        assert_eq!(m, 1, "next_fast_size({n}) must be 5-smooth");
    }

    #[test]
    fn dc_input_peaks_bin_zero() {
        let mut cascade = FftCascade::new(64, 64, Window::Rectangular);
        let mut last = None;
        for _ in 0..64 {
            last = cascade.push(1.0);
        }
        let bins = last.expect("cascade should emit after fft_size samples");
        let max_bin = bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(max_bin, 0);
        assert!((bins[0] - 1.0).abs() < 0.05);
    }
}
