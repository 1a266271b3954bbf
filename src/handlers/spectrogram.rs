use crate::config::HandlerConfig;
use crate::dsp::color::{MixMode, Rgba8};
use crate::dsp::image::{border, fade, StripedImage};
use crate::handlers::color_stops::ColorStops;

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrogramParams {
    pub length: usize,
    pub update_rate_hz: f32,
    pub stationary: bool,
    pub fading: f32,
    pub silence_threshold: f32,
    pub colors_desc: Option<String>,
    pub border_size: usize,
    pub border_color: Rgba8,
    pub mix_mode: MixMode,
}

impl SpectrogramParams {
    pub fn parse(config: &HandlerConfig) -> Self {
        let length = config.get_u32("length").unwrap_or(256).max(1) as usize;
        Self {
            length,
            update_rate_hz: config.get_f32("updateRate").unwrap_or(50.0).clamp(1.0, 20000.0),
            stationary: config.get_bool("stationary").unwrap_or(false),
            fading: config.get_f32("fading").unwrap_or(0.0).clamp(0.0, 1.0),
            silence_threshold: config.get_f32("silenceThreshold").unwrap_or(0.0).max(0.0),
            colors_desc: config.get_str("colors").map(|s| s.to_string()),
            border_size: (config.get_u32("borderSize").unwrap_or(0) as usize).min(length / 2),
            border_color: config.get_str("borderColor").and_then(Rgba8::parse).unwrap_or(Rgba8::new(0, 0, 0, 255)),
            mix_mode: config.get_str("mixMode").and_then(MixMode::parse).unwrap_or(MixMode::SRgb),
        }
    }
}

/// `Spectrogram`: renders a source's band values (one layer, any number of
/// bands) into a scrolling (or circular, when `stationary`) strip image,
/// one column per `block_size = sample_rate / update_rate_hz` input samples,
/// one row per band, bottom row = lowest band.
pub struct SpectrogramHandler {
    params: SpectrogramParams,
    bands_count: usize,
    colors: ColorStops,
    image: StripedImage,
    block_size: u32,
    wave_counter: u32,
    data_counter: u32,
    latest_source: Vec<f32>,
}

impl SpectrogramHandler {
    pub fn new(params: SpectrogramParams, bands_count: usize, sample_rate: u32) -> Self {
        let mix_mode = params.mix_mode;
        let colors = params
            .colors_desc
            .as_deref()
            .and_then(|d| ColorStops::parse(d, mix_mode))
            .unwrap_or_else(|| ColorStops::default_gradient(mix_mode));
        let image = StripedImage::new(params.length, bands_count.max(1), params.stationary);
        let mut handler = Self {
            params,
            bands_count: bands_count.max(1),
            colors,
            image,
            block_size: 1,
            wave_counter: 0,
            data_counter: 0,
            latest_source: vec![0.0; bands_count.max(1)],
        };
        handler.configure(bands_count, sample_rate);
        handler
    }

    pub fn check_same_params(&self, other: &SpectrogramParams) -> bool {
        self.params == *other
    }

    pub fn configure(&mut self, bands_count: usize, sample_rate: u32) {
        self.bands_count = bands_count.max(1);
        self.image.set_dimensions(self.params.length, self.bands_count);
        self.block_size = (sample_rate as f32 / self.params.update_rate_hz).round().max(1.0) as u32;
        self.latest_source = vec![0.0; self.bands_count];
        self.wave_counter = 0;
        self.data_counter = 0;
    }

    /// Advances the chunk clock by `wave_len` raw input samples and whatever
    /// band chunks the source emitted this tick, pushing one column every
    /// time both counters reach `block_size` — decoupling the column rate
    /// from the source's own chunk rate (§4.2).
    pub fn process(&mut self, wave_len: u32, chunks: &[(u32, &[f32])]) {
        self.wave_counter += wave_len;
        self.data_counter += chunks.iter().map(|(e, _)| *e).sum::<u32>();
        if let Some((_, values)) = chunks.last() {
            for (dst, &src) in self.latest_source.iter_mut().zip(values.iter()) {
                *dst = src;
            }
        }

        let block_size = self.block_size;
        while self.wave_counter >= block_size {
            let silent = self.params.silence_threshold > 0.0
                && self.latest_source.iter().all(|v| v.abs() < self.params.silence_threshold);
            let strip: Vec<Rgba8> = if silent {
                vec![Rgba8::TRANSPARENT; self.bands_count]
            } else {
                (0..self.bands_count)
                    .map(|i| {
                        let band = self.bands_count - 1 - i;
                        self.colors.color_at(self.latest_source.get(band).copied().unwrap_or(0.0))
                    })
                    .collect()
            };
            self.image.push_strip(&strip);
            self.wave_counter -= block_size;
            self.data_counter = self.data_counter.saturating_sub(block_size);
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

impl std::fmt::Debug for SpectrogramHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrogramHandler")
            .field("params", &self.params)
            .field("bands_count", &self.bands_count)
            .field("block_size", &self.block_size)
            .finish()
    }
}
