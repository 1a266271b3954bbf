use std::collections::HashMap;

/// Caches Gaussian convolution kernels by integer radius, since `UniformBlur`
/// re-derives the same handful of radii (one per cascade) every tick.
#[derive(Debug, Default)]
pub struct GaussianCoefficientsManager {
    cache: HashMap<u32, Vec<f32>>,
}

impl GaussianCoefficientsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the (odd-length, sum-normalised) kernel for `radius`,
    /// generating and caching it on first use. `sigma = radius / 3` so the
    /// kernel's effective support matches the requested radius.
    pub fn get(&mut self, radius: u32) -> &[f32] {
        self.cache.entry(radius).or_insert_with(|| generate_kernel(radius))
    }
}

fn generate_kernel(radius: u32) -> Vec<f32> {
    if radius == 0 {
        return vec![1.0];
    }
    let sigma = radius as f32 / 3.0;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let radius_i = radius as i32;
    let mut kernel: Vec<f32> = (-radius_i..=radius_i)
        .map(|i| (-((i * i) as f32) / two_sigma_sq).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    if sum > 0.0 {
        for v in kernel.iter_mut() {
            *v /= sum;
        }
    }
    kernel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        let mut mgr = GaussianCoefficientsManager::new();
        let kernel = mgr.get(4).to_vec();
        assert_eq!(kernel.len(), 9);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        for i in 0..kernel.len() / 2 {
            assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_radius_is_identity() {
        let mut mgr = GaussianCoefficientsManager::new();
        assert_eq!(mgr.get(0), &[1.0]);
    }
}
