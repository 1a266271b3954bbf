use crate::dsp::color::Rgba8;

/// A strip-accumulating image: one column per tick (non-stationary) or one
/// circular-buffer slot (stationary). Width is `length`; height is fixed at
/// construction (`bands_count` for a spectrogram, `height` for a waveform).
#[derive(Debug, Clone)]
pub struct StripedImage {
    length: usize,
    strip_size: usize,
    stationary: bool,
    data: Vec<Rgba8>,
    filled: usize,
    head: usize,
    forced: bool,
}

impl StripedImage {
    pub fn new(length: usize, strip_size: usize, stationary: bool) -> Self {
        let length = length.max(1);
        let strip_size = strip_size.max(1);
        let capacity = if stationary {
            length * strip_size
        } else {
            // Non-stationary images grow from empty and only reallocate once
            // the reserve head room is exhausted, trading memory for fewer
            // shifts as new strips arrive.
            ((length as f32 * 1.5).ceil() as usize) * strip_size
        };
        Self {
            length,
            strip_size,
            stationary,
            data: vec![Rgba8::TRANSPARENT; capacity],
            filled: 0,
            head: 0,
            forced: false,
        }
    }

    pub fn set_dimensions(&mut self, length: usize, strip_size: usize) {
        if length == self.length && strip_size == self.strip_size {
            return;
        }
        *self = StripedImage::new(length, strip_size, self.stationary);
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn force(&mut self) {
        self.forced = true;
    }

    /// Appends a strip of exactly `strip_size` pixels.
    pub fn push_strip(&mut self, strip: &[Rgba8]) {
        debug_assert_eq!(strip.len(), self.strip_size);
        if self.stationary {
            let offset = self.head * self.strip_size;
            self.data[offset..offset + self.strip_size].copy_from_slice(strip);
            self.head = (self.head + 1) % self.length;
            self.filled = self.length.min(self.filled + 1);
        } else {
            if self.filled >= self.length {
                // Reserve exhausted: shift left by one strip, discarding the
                // oldest column, and append at the tail.
                self.data.copy_within(self.strip_size.., 0);
                let tail = (self.data.len() / self.strip_size - 1) * self.strip_size;
                self.data[tail..tail + self.strip_size].copy_from_slice(strip);
            } else {
                let tail = self.filled * self.strip_size;
                self.data[tail..tail + self.strip_size].copy_from_slice(strip);
                self.filled += 1;
            }
        }
        self.forced = false;
    }

    pub fn push_empty_strip(&mut self, background: Rgba8) {
        let strip = vec![background; self.strip_size];
        self.push_strip(&strip);
    }

    /// Renders the logical (left-to-right oldest-to-newest) `length x
    /// strip_size` image, unwinding the circular head offset for stationary
    /// images.
    pub fn render(&self) -> Vec<Rgba8> {
        let mut out = vec![Rgba8::TRANSPARENT; self.length * self.strip_size];
        if self.stationary {
            for col in 0..self.filled {
                let src_col = (self.head + self.length - self.filled + col) % self.length;
                let src = &self.data[src_col * self.strip_size..(src_col + 1) * self.strip_size];
                out[col * self.strip_size..(col + 1) * self.strip_size].copy_from_slice(src);
            }
        } else {
            let start_col = self.filled.saturating_sub(self.length);
            for (dst_col, src_col) in (start_col..self.filled).enumerate() {
                let src = &self.data[src_col * self.strip_size..(src_col + 1) * self.strip_size];
                out[(dst_col + self.length.saturating_sub(self.filled.min(self.length)))
                    * self.strip_size
                    ..(dst_col + self.length.saturating_sub(self.filled.min(self.length)) + 1)
                        * self.strip_size]
                    .copy_from_slice(src);
            }
        }
        out
    }

    pub fn width(&self) -> usize {
        self.length
    }

    pub fn strip_size(&self) -> usize {
        self.strip_size
    }

    /// Number of strips pushed so far, capped at `length`.
    pub fn filled(&self) -> usize {
        self.filled.min(self.length)
    }
}

/// Applies a linear left-edge fade (amount in `[0,1]`) to a rendered image,
/// used by `Spectrogram`/`WaveForm` when their `fading` option is nonzero.
pub fn fade(image: &mut [Rgba8], width: usize, strip_size: usize, amount: f32) {
    if amount <= 0.0 || width == 0 {
        return;
    }
    let fade_width = ((width as f32) * amount).round().max(1.0) as usize;
    for col in 0..fade_width.min(width) {
        let t = col as f32 / fade_width as f32;
        for row in 0..strip_size {
            let idx = col * strip_size + row;
            let c = image[idx].to_f32();
            image[idx] = Rgba8::from_f32([c[0], c[1], c[2], c[3] * t]);
        }
    }
}

/// Paints the leftmost and rightmost `border_size` columns of a rendered
/// image in `color`, used by `Spectrogram`/`WaveForm` when their
/// `border_size` option is nonzero. `border_size` is expected to already be
/// clamped to `[0, width/2]` by the caller.
pub fn border(image: &mut [Rgba8], width: usize, strip_size: usize, border_size: usize, color: Rgba8) {
    if border_size == 0 || width == 0 {
        return;
    }
    let border_size = border_size.min(width / 2);
    for col in 0..border_size {
        for row in 0..strip_size {
            image[col * strip_size + row] = color;
        }
    }
    for col in (width - border_size)..width {
        for row in 0..strip_size {
            image[col * strip_size + row] = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stationary_image_wraps() {
        let mut img = StripedImage::new(3, 1, true);
        for i in 0..5u8 {
            img.push_strip(&[Rgba8::new(i, 0, 0, 255)]);
        }
        let rendered = img.render();
        assert_eq!(rendered.iter().map(|c| c.r).collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn non_stationary_grows_then_shifts() {
        let mut img = StripedImage::new(3, 1, false);
        for i in 0..5u8 {
            img.push_strip(&[Rgba8::new(i, 0, 0, 255)]);
        }
        let rendered = img.render();
        assert_eq!(rendered.iter().map(|c| c.r).collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn border_paints_left_and_right_edges_only() {
        let mut image = vec![Rgba8::TRANSPARENT; 6];
        border(&mut image, 6, 1, 2, Rgba8::new(1, 2, 3, 255));
        assert_eq!(image[0], Rgba8::new(1, 2, 3, 255));
        assert_eq!(image[1], Rgba8::new(1, 2, 3, 255));
        assert_eq!(image[2], Rgba8::TRANSPARENT);
        assert_eq!(image[3], Rgba8::TRANSPARENT);
        assert_eq!(image[4], Rgba8::new(1, 2, 3, 255));
        assert_eq!(image[5], Rgba8::new(1, 2, 3, 255));
    }
}
