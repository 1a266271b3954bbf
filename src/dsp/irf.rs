/// Logarithmic-time attack/decay one-pole smoother.
///
/// `alpha` is recomputed whenever the block size or sample rate changes;
/// `next` picks attack or decay depending on whether the input rose or fell.
#[derive(Debug, Clone, Copy)]
pub struct LogarithmicIrf {
    alpha_attack: f32,
    alpha_decay: f32,
    state: f32,
}

impl LogarithmicIrf {
    pub fn new(attack_sec: f32, decay_sec: f32, block_size: u32, sample_rate: u32) -> Self {
        Self {
            alpha_attack: compute_alpha(attack_sec, block_size, sample_rate),
            alpha_decay: compute_alpha(decay_sec, block_size, sample_rate),
            state: 0.0,
        }
    }

    pub fn reconfigure(&mut self, attack_sec: f32, decay_sec: f32, block_size: u32, sample_rate: u32) {
        self.alpha_attack = compute_alpha(attack_sec, block_size, sample_rate);
        self.alpha_decay = compute_alpha(decay_sec, block_size, sample_rate);
    }

    pub fn next(&mut self, value: f32) -> f32 {
        let alpha = if value > self.state {
            self.alpha_attack
        } else {
            self.alpha_decay
        };
        self.state = alpha * self.state + (1.0 - alpha) * value;
        self.state
    }

    pub fn reset(&mut self, value: f32) {
        self.state = value;
    }

    pub fn value(&self) -> f32 {
        self.state
    }
}

fn compute_alpha(time_sec: f32, block_size: u32, sample_rate: u32) -> f32 {
    if time_sec <= 0.0 || sample_rate == 0 {
        return 0.0;
    }
    let block_duration = block_size as f32 / sample_rate as f32;
    (-block_duration / time_sec).exp()
}

/// Array variant used by handlers that smooth many independent channels
/// (e.g. per-band values) with a shared attack/decay pair.
#[derive(Debug, Clone)]
pub struct LogarithmicIrfArray {
    alpha_attack: f32,
    alpha_decay: f32,
    state: Vec<f32>,
}

impl LogarithmicIrfArray {
    pub fn new(len: usize, attack_sec: f32, decay_sec: f32, block_size: u32, sample_rate: u32) -> Self {
        Self {
            alpha_attack: compute_alpha(attack_sec, block_size, sample_rate),
            alpha_decay: compute_alpha(decay_sec, block_size, sample_rate),
            state: vec![0.0; len],
        }
    }

    pub fn reconfigure(&mut self, len: usize, attack_sec: f32, decay_sec: f32, block_size: u32, sample_rate: u32) {
        self.alpha_attack = compute_alpha(attack_sec, block_size, sample_rate);
        self.alpha_decay = compute_alpha(decay_sec, block_size, sample_rate);
        self.state.resize(len, 0.0);
    }

    pub fn apply(&mut self, values: &mut [f32]) {
        for (state, value) in self.state.iter_mut().zip(values.iter_mut()) {
            let alpha = if *value > *state {
                self.alpha_attack
            } else {
                self.alpha_decay
            };
            *state = alpha * *state + (1.0 - alpha) * *value;
            *value = *state;
        }
    }

    pub fn state(&self) -> &[f32] {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_constant_input() {
        let mut irf = LogarithmicIrf::new(0.1, 0.1, 100, 48000);
        let mut last = 0.0;
        for _ in 0..2000 {
            last = irf.next(1.0);
        }
        assert!((last - 1.0).abs() < 1e-3);
    }

    #[test]
    fn zero_time_constant_is_instant() {
        let mut irf = LogarithmicIrf::new(0.0, 0.0, 100, 48000);
        assert_eq!(irf.next(0.5), 0.5);
        assert_eq!(irf.next(-0.3), -0.3);
    }
}
