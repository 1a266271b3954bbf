/// Tracks the running min/max of a wave over successive fixed-size blocks,
/// used by `WaveForm` to derive one (min, max) strip per block and to detect
/// silence on the unfiltered wave independently of the filtered one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinMaxCounter {
    min: f32,
    max: f32,
    count: u32,
    block_size: u32,
}

impl MinMaxCounter {
    pub fn new(block_size: u32) -> Self {
        Self {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            count: 0,
            block_size: block_size.max(1),
        }
    }

    pub fn set_block_size(&mut self, block_size: u32) {
        self.block_size = block_size.max(1);
    }

    /// Feeds one sample. Returns `Some((min, max))` once a block's worth of
    /// samples has been observed, resetting the running extrema afterward.
    pub fn update(&mut self, sample: f32) -> Option<(f32, f32)> {
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
        self.count += 1;
        if self.count >= self.block_size {
            let result = (self.min, self.max);
            self.min = f32::INFINITY;
            self.max = f32::NEG_INFINITY;
            self.count = 0;
            Some(result)
        } else {
            None
        }
    }

    pub fn has_next(&self) -> bool {
        self.count >= self.block_size
    }

    pub fn skip_block(&mut self) {
        self.min = f32::INFINITY;
        self.max = f32::NEG_INFINITY;
        self.count = 0;
    }

    /// True when both extrema fall below `threshold` in magnitude — used to
    /// gate silence detection against a configured dB threshold.
    pub fn is_below_threshold(&self, threshold: f32) -> bool {
        self.min.abs() < threshold && self.max.abs() < threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_after_block_size_samples() {
        let mut counter = MinMaxCounter::new(4);
        assert!(counter.update(1.0).is_none());
        assert!(counter.update(-2.0).is_none());
        assert!(counter.update(0.5).is_none());
        let result = counter.update(3.0);
        assert_eq!(result, Some((-2.0, 3.0)));
    }
}
