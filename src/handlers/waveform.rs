use crate::config::HandlerConfig;
use crate::dsp::color::{MixMode, Rgba8};
use crate::dsp::image::{border, fade, StripedImage};
use crate::dsp::minmax::MinMaxCounter;
use crate::handlers::color_stops::ColorStops;
use crate::handlers::transform::TransformChain;

/// When the wave's centre line is drawn relative to the filled wave region
/// of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDrawingPolicy {
    Never,
    BelowWave,
    Always,
}

impl LineDrawingPolicy {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "never" => Some(LineDrawingPolicy::Never),
            "belowwave" | "below_wave" => Some(LineDrawingPolicy::BelowWave),
            "always" => Some(LineDrawingPolicy::Always),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveFormParams {
    pub length: usize,
    pub height: usize,
    pub stationary: bool,
    pub fading: f32,
    pub silence_threshold: f32,
    pub connected: bool,
    pub colors_desc: Option<String>,
    pub update_rate_hz: f32,
    pub line_drawing_policy: LineDrawingPolicy,
    pub line_thickness: usize,
    pub line_color: Rgba8,
    pub border_size: usize,
    pub border_color: Rgba8,
    pub transform_desc: Option<String>,
    pub mix_mode: MixMode,
}

impl WaveFormParams {
    pub fn parse(config: &HandlerConfig) -> Self {
        let length = config.get_u32("length").unwrap_or(512).max(1) as usize;
        let height = config.get_u32("height").unwrap_or(64).max(1) as usize;
        // `update_rate_hz` is the logical option; the config surfaces it as
        // `resolutionMs` (column period in milliseconds) the way the source
        // waveform handler takes it, falling back to a direct `updateRate`.
        let update_rate_hz = match config.get_f32("resolutionMs") {
            Some(ms) if ms > 0.0 => 1000.0 / ms,
            _ => config.get_f32("updateRate").unwrap_or(60.0),
        }
        .max(0.001);
        Self {
            length,
            height,
            stationary: config.get_bool("stationary").unwrap_or(false),
            fading: config.get_f32("fading").unwrap_or(0.0).clamp(0.0, 1.0),
            silence_threshold: config.get_f32("silenceThreshold").unwrap_or(0.0).max(0.0),
            connected: config.get_bool("connected").unwrap_or(true),
            colors_desc: config.get_str("colors").map(|s| s.to_string()),
            update_rate_hz,
            line_drawing_policy: config
                .get_str("lineDrawingPolicy")
                .and_then(LineDrawingPolicy::parse)
                .unwrap_or(LineDrawingPolicy::BelowWave),
            line_thickness: (config.get_u32("lineThickness").unwrap_or(1) as usize).min(height),
            line_color: config.get_str("lineColor").and_then(Rgba8::parse).unwrap_or(Rgba8::new(128, 128, 128, 255)),
            border_size: (config.get_u32("borderSize").unwrap_or(0) as usize).min(length / 2),
            border_color: config.get_str("borderColor").and_then(Rgba8::parse).unwrap_or(Rgba8::new(0, 0, 0, 255)),
            transform_desc: config.get_str("transform").map(|s| s.to_string()),
            mix_mode: config.get_str("mixMode").and_then(MixMode::parse).unwrap_or(MixMode::SRgb),
        }
    }
}

/// `WaveForm`: a root handler (its source is the raw channel wave, not
/// another handler's output). Tracks block min/max on both the original wave
/// (for silence detection) and any configured filtered wave (for drawing),
/// rendering one column per block.
pub struct WaveFormHandler {
    params: WaveFormParams,
    colors: ColorStops,
    image: StripedImage,
    block_size: u32,
    draw_counter: MinMaxCounter,
    silence_counter: MinMaxCounter,
    last_column_mid: Option<f32>,
    transform: TransformChain,
}

impl WaveFormHandler {
    pub fn new(params: WaveFormParams, sample_rate: u32) -> Self {
        let mix_mode = params.mix_mode;
        let colors = params
            .colors_desc
            .as_deref()
            .and_then(|d| ColorStops::parse(d, mix_mode))
            .unwrap_or_else(|| ColorStops::default_gradient(mix_mode));
        let mut handler = Self {
            params,
            colors,
            image: StripedImage::new(1, 1, false),
            block_size: 1,
            draw_counter: MinMaxCounter::new(1),
            silence_counter: MinMaxCounter::new(1),
            last_column_mid: None,
            transform: TransformChain::identity(),
        };
        handler.configure(sample_rate);
        handler
    }

    pub fn check_same_params(&self, other: &WaveFormParams) -> bool {
        self.params == *other
    }

    pub fn configure(&mut self, sample_rate: u32) {
        self.block_size = (sample_rate as f32 / self.params.update_rate_hz).round().max(1.0) as u32;
        self.image = StripedImage::new(self.params.length, self.params.height, self.params.stationary);
        self.draw_counter.set_block_size(self.block_size);
        self.silence_counter.set_block_size(self.block_size);
        self.last_column_mid = None;
        self.transform = self
            .params
            .transform_desc
            .as_deref()
            .map(|d| TransformChain::parse(d, self.block_size, sample_rate))
            .unwrap_or_default();
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Feeds raw wave samples (the unfiltered channel signal, used purely for
    /// silence detection) alongside the handler's own filtered wave (what
    /// actually gets drawn — identical to `original` unless a `filter` option
    /// applied a separate shaping stage upstream).
    pub fn process(&mut self, original: &[f32], filtered: &[f32]) {
        for (&orig, &value) in original.iter().zip(filtered.iter()) {
            let silence_done = self.silence_counter.update(orig);
            if let Some((min, max)) = self.draw_counter.update(value) {
                let silent = silence_done
                    .map(|(smin, smax)| smin.abs() < self.params.silence_threshold && smax.abs() < self.params.silence_threshold)
                    .unwrap_or(self.params.silence_threshold > 0.0 && orig.abs() < self.params.silence_threshold);
                let strip = self.render_column(min, max, silent && self.params.silence_threshold > 0.0);
                self.image.push_strip(&strip);
            }
        }
    }

    /// Applies the transform chain to a min/max magnitude, preserving its
    /// sign (§4.3.12: "applied to min and max magnitudes, preserving sign").
    fn transform_signed(&self, v: f32) -> f32 {
        let mut chain = self.transform.clone();
        v.signum() * chain.apply(v.abs())
    }

    fn render_column(&mut self, min: f32, max: f32, silent: bool) -> Vec<Rgba8> {
        let height = self.params.height;
        if silent {
            self.last_column_mid = None;
            return vec![Rgba8::TRANSPARENT; height];
        }
        let min = self.transform_signed(min);
        let max = self.transform_signed(max);
        let to_row = |v: f32| -> usize {
            let t = (v.clamp(-1.0, 1.0) + 1.0) * 0.5;
            ((1.0 - t) * (height.saturating_sub(1)) as f32).round() as usize
        };
        let top = to_row(max).min(to_row(min));
        let bottom = to_row(max).max(to_row(min));
        let mut strip = vec![Rgba8::TRANSPARENT; height];
        let mid = (min + max) * 0.5;
        let color = self.colors.color_at(mid);
        if self.params.connected {
            if let Some(prev_mid) = self.last_column_mid {
                let prev_row = to_row(prev_mid);
                let lo = prev_row.min(top);
                let hi = prev_row.max(bottom);
                for row in lo..=hi {
                    strip[row] = color;
                }
            } else {
                for row in top..=bottom {
                    strip[row] = color;
                }
            }
        } else {
            for row in top..=bottom {
                strip[row] = color;
            }
        }
        self.paint_line(&mut strip, top, bottom);
        self.last_column_mid = Some(mid);
        strip
    }

    /// Draws the zero-level centre line per `line_drawing_policy`: `never`
    /// skips it, `always` paints over the wave fill, `below_wave` paints
    /// only the rows the wave fill didn't already cover.
    fn paint_line(&self, strip: &mut [Rgba8], top: usize, bottom: usize) {
        if self.params.line_drawing_policy == LineDrawingPolicy::Never || self.params.line_thickness == 0 {
            return;
        }
        let height = self.params.height;
        let center = height / 2;
        let half = self.params.line_thickness / 2;
        let lo = center.saturating_sub(half);
        let hi = (center + half).min(height.saturating_sub(1));
        for row in lo..=hi {
            let covered_by_wave = row >= top && row <= bottom;
            if self.params.line_drawing_policy == LineDrawingPolicy::Always || !covered_by_wave {
                strip[row] = self.params.line_color;
            }
        }
    }

    pub fn render(&self) -> (usize, usize, Vec<Rgba8>) {
        let mut pixels = self.image.render();
        let width = self.image.width();
        let strip_size = self.image.strip_size();
        fade(&mut pixels, width, strip_size, self.params.fading);
        border(&mut pixels, width, strip_size, self.params.border_size, self.params.border_color);
        (width, strip_size, pixels)
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}

impl std::fmt::Debug for WaveFormHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveFormHandler").field("params", &self.params).field("block_size", &self.block_size).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params(length: usize, height: usize) -> WaveFormParams {
        WaveFormParams {
            length,
            height,
            stationary: false,
            fading: 0.0,
            silence_threshold: 0.0,
            connected: true,
            colors_desc: None,
            update_rate_hz: 60.0,
            line_drawing_policy: LineDrawingPolicy::BelowWave,
            line_thickness: 1,
            line_color: Rgba8::new(128, 128, 128, 255),
            border_size: 0,
            border_color: Rgba8::new(0, 0, 0, 255),
            transform_desc: None,
            mix_mode: MixMode::SRgb,
        }
    }

    #[test]
    fn dimensions_match_length_and_height() {
        let handler = WaveFormHandler::new(base_params(8, 16), 48000);
        let (w, h, pixels) = handler.render();
        assert_eq!(w, 8);
        assert_eq!(h, 16);
        assert_eq!(pixels.len(), 128);
    }

    #[test]
    fn silence_on_original_wave_blanks_column_even_if_filtered_is_loud() {
        let mut params = base_params(4, 8);
        params.silence_threshold = 0.01;
        params.connected = false;
        let mut handler = WaveFormHandler::new(params, 8);
        let original = vec![0.0f32; 1];
        let filtered = vec![0.9f32; 1];
        handler.process(&original, &filtered);
        let (_, _, pixels) = handler.render();
        assert!(pixels.iter().all(|p| p.a == 0));
    }

    #[test]
    fn resolution_ms_derives_block_size_from_sample_rate() {
        let mut params = base_params(4, 8);
        // resolutionMs is normally expanded at parse() time; here we set
        // update_rate_hz directly the way parse() would have derived it
        // from `resolutionMs = 10` (1000/10 = 100 Hz).
        params.update_rate_hz = 100.0;
        let handler = WaveFormHandler::new(params, 8000);
        assert_eq!(handler.block_size(), 80);
    }

    #[test]
    fn never_policy_omits_line_even_where_wave_does_not_cover() {
        let mut params = base_params(2, 9);
        params.line_drawing_policy = LineDrawingPolicy::Never;
        let handler = WaveFormHandler::new(params, 48000);
        let mut strip = vec![Rgba8::TRANSPARENT; 9];
        handler.paint_line(&mut strip, 0, 1);
        assert!(strip.iter().all(|p| p.a == 0));
    }

    #[test]
    fn always_policy_paints_over_wave_fill() {
        let mut params = base_params(2, 9);
        params.line_drawing_policy = LineDrawingPolicy::Always;
        params.line_thickness = 1;
        let handler = WaveFormHandler::new(params, 48000);
        let mut strip = vec![Rgba8::new(9, 9, 9, 255); 9];
        handler.paint_line(&mut strip, 0, 8);
        assert_eq!(strip[4], Rgba8::new(128, 128, 128, 255));
    }

    #[test]
    fn below_wave_policy_skips_rows_covered_by_wave_fill() {
        let mut params = base_params(2, 9);
        params.line_drawing_policy = LineDrawingPolicy::BelowWave;
        params.line_thickness = 1;
        let handler = WaveFormHandler::new(params, 48000);
        let wave_color = Rgba8::new(9, 9, 9, 255);
        let mut strip = vec![wave_color; 9];
        handler.paint_line(&mut strip, 0, 8);
        // Row 4 (centre) is inside [0, 8], so below_wave must not overwrite it.
        assert_eq!(strip[4], wave_color);
    }
}
