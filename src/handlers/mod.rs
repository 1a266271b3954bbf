pub mod band_cascade_transformer;
pub mod band_resampler;
pub mod block;
pub mod blur;
pub mod color_stops;
pub mod fft_analyzer;
pub mod loudness;
pub mod ring;
pub mod single_value_transformer;
pub mod spectrogram;
pub mod time_resampler;
pub mod transform;
pub mod waveform;

use std::time::Instant;

use crate::config::HandlerConfig;
use crate::dsp::color::Rgba8;
use crate::error::{HandlerError, HandlerResult};
use crate::wave::{Chunk, DataSize};

use band_cascade_transformer::{BandCascadeParams, BandCascadeTransformerHandler};
use band_resampler::{BandResamplerHandler, BandResamplerParams};
use block::{BlockHandler, BlockKind, BlockParams};
use blur::{BandSourceShape, BlurParams, UniformBlurHandler, WeightedBlurParams};
use fft_analyzer::{FftAnalyzerHandler, FftParams};
use loudness::{LoudnessHandler, LoudnessParams};
use single_value_transformer::{SingleValueTransformerHandler, SvtParams};
use spectrogram::{SpectrogramHandler, SpectrogramParams};
use time_resampler::{TimeResamplerHandler, TimeResamplerParams};
use waveform::{WaveFormHandler, WaveFormParams};

/// A handler's parsed configuration, kept around purely so a reload can tell
/// "did this handler's options actually change" without re-instantiating it.
/// `LogarithmicValueMapper` and `FiniteTimeFilter` are deprecated aliases for
/// `ValueTransformer` and fold into the same variant; `WeightedBlur` folds
/// into `UniformBlur` (see [`WeightedBlurParams`]'s doc comment).
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Block(BlockKind, BlockParams),
    Loudness(LoudnessParams),
    Fft(FftParams),
    BandResampler(BandResamplerParams),
    BandCascadeTransformer(BandCascadeParams),
    UniformBlur(BlurParams),
    TimeResampler(TimeResamplerParams),
    SingleValueTransformer(SvtParams),
    Spectrogram(SpectrogramParams),
    WaveForm(WaveFormParams),
}

impl Params {
    pub fn parse(kind: &str, name: &str, config: &HandlerConfig) -> HandlerResult<Params> {
        match kind {
            "rms" => Ok(Params::Block(BlockKind::Rms, BlockParams::parse(config))),
            "peak" => Ok(Params::Block(BlockKind::Peak, BlockParams::parse(config))),
            "loudness" => Ok(Params::Loudness(LoudnessParams::parse(config))),
            "fft" => Ok(Params::Fft(FftParams::parse(config))),
            "BandResampler" => BandResamplerParams::parse(config).map(Params::BandResampler).ok_or_else(|| {
                HandlerError::InvalidOptions {
                    handler: name.to_string(),
                    message: "missing or unparsable 'bands' descriptor".to_string(),
                }
            }),
            "BandCascadeTransformer" => Ok(Params::BandCascadeTransformer(BandCascadeParams::parse(config))),
            "UniformBlur" => Ok(Params::UniformBlur(BlurParams::parse(config))),
            "WeightedBlur" => {
                let legacy = WeightedBlurParams::parse(config);
                Ok(Params::UniformBlur(BlurParams {
                    blur_radius: legacy.radius_multiplier,
                    blur_radius_adaptation: 1.0,
                }))
            }
            "TimeResampler" => Ok(Params::TimeResampler(TimeResamplerParams::parse(config))),
            "ValueTransformer" => Ok(Params::SingleValueTransformer(SvtParams::parse(config))),
            "LogarithmicValueMapper" => {
                log::warn!("handler '{name}': LogarithmicValueMapper is deprecated, use ValueTransformer");
                Ok(Params::SingleValueTransformer(SvtParams::parse(config)))
            }
            "FiniteTimeFilter" => {
                log::warn!("handler '{name}': FiniteTimeFilter is deprecated, use ValueTransformer's filter stage");
                Ok(Params::SingleValueTransformer(SvtParams::parse(config)))
            }
            "spectrogram" => Ok(Params::Spectrogram(SpectrogramParams::parse(config))),
            "waveform" => Ok(Params::WaveForm(WaveFormParams::parse(config))),
            other => Err(HandlerError::InvalidOptions {
                handler: name.to_string(),
                message: format!("unknown handler type '{other}'"),
            }),
        }
    }

    /// Root handlers consume the wave directly and need no source.
    pub fn is_root(&self) -> bool {
        matches!(self, Params::Block(..) | Params::Loudness(_) | Params::Fft(_) | Params::WaveForm(_))
    }
}

/// The tagged union of every concrete handler kernel. Kept as an enum rather
/// than `dyn Trait` so the graph can dispatch without downcasting: each
/// variant wraps exactly one of the handler structs in this module.
pub enum Handler {
    Block(BlockHandler),
    Loudness(LoudnessHandler),
    Fft(FftAnalyzerHandler),
    BandResampler(BandResamplerHandler),
    BandCascadeTransformer(BandCascadeTransformerHandler),
    UniformBlur(UniformBlurHandler),
    TimeResampler(TimeResamplerHandler),
    SingleValueTransformer(SingleValueTransformerHandler),
    Spectrogram(SpectrogramHandler),
    WaveForm(WaveFormHandler),
}

impl Handler {
    pub fn new(name: &str, params: &Params, sample_rate: u32, source: Option<&Handler>) -> HandlerResult<Handler> {
        match params {
            Params::Block(kind, p) => Ok(Handler::Block(BlockHandler::new(*kind, p.clone(), sample_rate))),
            Params::Loudness(p) => Ok(Handler::Loudness(LoudnessHandler::new(p.clone(), sample_rate))),
            Params::Fft(p) => Ok(Handler::Fft(FftAnalyzerHandler::new(p.clone(), sample_rate))),
            Params::BandResampler(p) => {
                let fft = require_fft(name, source)?;
                Ok(Handler::BandResampler(BandResamplerHandler::new(p.clone(), fft)))
            }
            Params::BandCascadeTransformer(p) => {
                let resampler = require_band_resampler(name, source)?;
                Ok(Handler::BandCascadeTransformer(BandCascadeTransformerHandler::new(p.clone(), resampler)))
            }
            Params::UniformBlur(p) => {
                let shape = require_band_shape(name, source)?;
                Ok(Handler::UniformBlur(UniformBlurHandler::new(p.clone(), shape)))
            }
            Params::TimeResampler(p) => {
                let source = require_any_source(name, source)?;
                let size = source.data_size();
                Ok(Handler::TimeResampler(TimeResamplerHandler::new(
                    p.clone(),
                    sample_rate,
                    size.layers.max(1),
                    size.values_per_chunk.max(1),
                )))
            }
            Params::SingleValueTransformer(p) => {
                let source = require_any_source(name, source)?;
                let size = source.data_size();
                Ok(Handler::SingleValueTransformer(SingleValueTransformerHandler::new(
                    p.clone(),
                    sample_rate,
                    size.layers.max(1),
                    size.values_per_chunk.max(1),
                )))
            }
            Params::Spectrogram(p) => {
                let source = require_any_source(name, source)?;
                let bands = source.data_size().values_per_chunk.max(1);
                Ok(Handler::Spectrogram(SpectrogramHandler::new(p.clone(), bands, sample_rate)))
            }
            Params::WaveForm(p) => Ok(Handler::WaveForm(WaveFormHandler::new(p.clone(), sample_rate))),
        }
    }

    pub fn check_same_params(&self, params: &Params) -> bool {
        match (self, params) {
            (Handler::Block(h), Params::Block(_, p)) => h.check_same_params(p),
            (Handler::Loudness(h), Params::Loudness(p)) => h.check_same_params(p),
            (Handler::Fft(h), Params::Fft(p)) => h.check_same_params(p),
            (Handler::BandResampler(h), Params::BandResampler(p)) => h.check_same_params(p),
            (Handler::BandCascadeTransformer(h), Params::BandCascadeTransformer(p)) => h.check_same_params(p),
            (Handler::UniformBlur(h), Params::UniformBlur(p)) => h.check_same_params(p),
            (Handler::TimeResampler(h), Params::TimeResampler(p)) => h.check_same_params(p),
            (Handler::SingleValueTransformer(h), Params::SingleValueTransformer(p)) => h.check_same_params(p),
            (Handler::Spectrogram(h), Params::Spectrogram(p)) => h.check_same_params(p),
            (Handler::WaveForm(h), Params::WaveForm(p)) => h.check_same_params(p),
            _ => false,
        }
    }

    /// Re-derives every size/cache that depends on `sample_rate` or the
    /// source's shape. Called in handler-list order after (re)binding.
    pub fn configure(&mut self, name: &str, sample_rate: u32, source: Option<&Handler>) -> HandlerResult<()> {
        match self {
            Handler::Block(h) => {
                h.configure(sample_rate);
                Ok(())
            }
            Handler::Loudness(h) => {
                h.configure(sample_rate);
                Ok(())
            }
            Handler::Fft(h) => {
                h.configure(sample_rate);
                Ok(())
            }
            Handler::BandResampler(h) => {
                let fft = require_fft(name, source)?;
                h.configure(fft);
                Ok(())
            }
            Handler::BandCascadeTransformer(h) => {
                let resampler = require_band_resampler(name, source)?;
                h.configure(resampler);
                Ok(())
            }
            Handler::UniformBlur(h) => {
                let shape = require_band_shape(name, source)?;
                h.configure(shape);
                Ok(())
            }
            Handler::TimeResampler(h) => {
                let source = require_any_source(name, source)?;
                let size = source.data_size();
                h.configure(sample_rate, size.layers.max(1), size.values_per_chunk.max(1));
                Ok(())
            }
            Handler::SingleValueTransformer(h) => {
                let source = require_any_source(name, source)?;
                let size = source.data_size();
                h.configure(sample_rate, size.layers.max(1), size.values_per_chunk.max(1));
                Ok(())
            }
            Handler::Spectrogram(h) => {
                let source = require_any_source(name, source)?;
                h.configure(source.data_size().values_per_chunk.max(1), sample_rate);
                Ok(())
            }
            Handler::WaveForm(h) => {
                h.configure(sample_rate);
                Ok(())
            }
        }
    }

    /// Ticks this handler for one processing-group update. `source` is the
    /// already-processed handler this one declared as its source (`None` for
    /// root handlers), found by the group's handler list — the caller
    /// resolves it via `split_at_mut` so a handler only ever sees sources
    /// that ran earlier in this same tick.
    pub fn process(&mut self, wave: &[f32], original_wave: &[f32], deadline: Instant, source: Option<&Handler>) {
        match self {
            Handler::Block(h) => h.process(wave),
            Handler::Loudness(h) => h.process(wave),
            Handler::Fft(h) => h.process(wave, deadline),
            Handler::WaveForm(h) => h.process(original_wave, wave),
            Handler::BandResampler(h) => {
                if let Some(Handler::Fft(fft)) = source {
                    h.process(fft);
                }
            }
            Handler::BandCascadeTransformer(h) => {
                if let Some(Handler::BandResampler(resampler)) = source {
                    h.process(resampler);
                }
            }
            Handler::UniformBlur(h) => {
                if let Some(source) = source {
                    for_each_source_layer(source, |layer, chunks| h.process_layer(layer, chunks));
                }
            }
            Handler::TimeResampler(h) => {
                if let Some(source) = source {
                    let wave_len = wave.len() as u32;
                    for_each_source_layer(source, |layer, chunks| h.process_layer(layer, wave_len, chunks));
                }
            }
            Handler::SingleValueTransformer(h) => {
                if let Some(source) = source {
                    for_each_source_layer(source, |layer, chunks| h.process_layer(layer, chunks));
                }
            }
            Handler::Spectrogram(h) => {
                if let Some(source) = source {
                    let wave_len = wave.len() as u32;
                    let chunks = source.get_chunks(0);
                    let tuples: Vec<(u32, &[f32])> = chunks.iter().map(|c| (c.equivalent_wave_size, c.values)).collect();
                    h.process(wave_len, &tuples);
                }
            }
        }
    }

    pub fn purge_cache(&mut self) {
        match self {
            Handler::Block(h) => h.purge_cache(),
            Handler::Loudness(h) => h.purge_cache(),
            Handler::Fft(h) => h.purge_cache(),
            Handler::BandResampler(h) => h.purge_cache(),
            Handler::BandCascadeTransformer(h) => h.purge_cache(),
            Handler::UniformBlur(h) => h.purge_cache(),
            Handler::TimeResampler(h) => h.purge_cache(),
            Handler::SingleValueTransformer(h) => h.purge_cache(),
            Handler::Spectrogram(_) | Handler::WaveForm(_) => {}
        }
    }

    pub fn data_size(&self) -> DataSize {
        match self {
            Handler::Block(h) => h.data_size(),
            Handler::Loudness(h) => h.data_size(),
            Handler::Fft(h) => h.data_size(),
            Handler::BandResampler(h) => h.data_size(),
            Handler::BandCascadeTransformer(h) => h.data_size(),
            Handler::UniformBlur(h) => h.data_size(),
            Handler::TimeResampler(h) => h.data_size(),
            Handler::SingleValueTransformer(h) => h.data_size(),
            Handler::Spectrogram(_) | Handler::WaveForm(_) => DataSize::new(0, 0),
        }
    }

    pub fn get_chunks(&self, layer: usize) -> Vec<Chunk<'_>> {
        match self {
            Handler::Block(h) => h.get_chunks(),
            Handler::Loudness(h) => h.get_chunks(),
            Handler::Fft(h) => h.get_chunks(layer),
            Handler::BandResampler(h) => h.get_chunks(layer),
            Handler::BandCascadeTransformer(h) => h.get_chunks(layer),
            Handler::UniformBlur(h) => h.get_chunks(layer),
            Handler::TimeResampler(h) => h.get_chunks(layer),
            Handler::SingleValueTransformer(h) => h.get_chunks(layer),
            Handler::Spectrogram(_) | Handler::WaveForm(_) => Vec::new(),
        }
    }

    pub fn get_last_data(&self, layer: usize) -> Option<&[f32]> {
        match self {
            Handler::Block(h) => h.get_last_data(),
            Handler::Loudness(h) => h.get_last_data(),
            Handler::Fft(h) => h.get_last_data(layer),
            Handler::BandResampler(h) => h.get_last_data(layer),
            Handler::BandCascadeTransformer(h) => h.get_last_data(layer),
            Handler::UniformBlur(h) => h.get_last_data(layer),
            Handler::TimeResampler(h) => h.get_last_data(layer),
            Handler::SingleValueTransformer(h) => h.get_last_data(layer),
            Handler::Spectrogram(_) | Handler::WaveForm(_) => None,
        }
    }

    pub fn get_prop(&self, name: &str) -> Option<String> {
        match self {
            Handler::Block(h) => h.get_prop(name),
            Handler::Loudness(h) => h.get_prop(name),
            Handler::Fft(h) => h.get_prop(name),
            Handler::BandResampler(h) => h.get_prop(name),
            Handler::BandCascadeTransformer(h) => h.get_prop(name),
            Handler::TimeResampler(h) => h.get_prop(name),
            Handler::UniformBlur(_) | Handler::SingleValueTransformer(_) | Handler::Spectrogram(_) | Handler::WaveForm(_) => None,
        }
    }

    /// `Some` for image handlers, giving `(width, height, pixels)` for
    /// `Engine::finish` to hand to the BMP writer.
    pub fn render_image(&self) -> Option<(usize, usize, Vec<Rgba8>)> {
        match self {
            Handler::Spectrogram(h) => Some(h.render()),
            Handler::WaveForm(h) => Some(h.render()),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Handler::Spectrogram(_) | Handler::WaveForm(_))
    }
}

/// Iterates every layer of `source`, converting its chunks to
/// `(equivalent_wave_size, values)` pairs, for handlers generic over their
/// source's shape (`UniformBlur`, `TimeResampler`, `SingleValueTransformer`).
fn for_each_source_layer(source: &Handler, mut f: impl FnMut(usize, &[(u32, &[f32])])) {
    let layers = source.data_size().layers.max(1);
    for layer in 0..layers {
        let chunks = source.get_chunks(layer);
        let tuples: Vec<(u32, &[f32])> = chunks.iter().map(|c| (c.equivalent_wave_size, c.values)).collect();
        f(layer, &tuples);
    }
}

fn require_fft<'a>(name: &str, source: Option<&'a Handler>) -> HandlerResult<&'a FftAnalyzerHandler> {
    match source {
        Some(Handler::Fft(h)) => Ok(h),
        _ => Err(HandlerError::WrongSourceType { handler: name.to_string() }),
    }
}

fn require_band_resampler<'a>(name: &str, source: Option<&'a Handler>) -> HandlerResult<&'a BandResamplerHandler> {
    match source {
        Some(Handler::BandResampler(h)) => Ok(h),
        _ => Err(HandlerError::WrongSourceType { handler: name.to_string() }),
    }
}

fn require_any_source<'a>(name: &str, source: Option<&'a Handler>) -> HandlerResult<&'a Handler> {
    source.ok_or_else(|| HandlerError::UnknownSource { handler: name.to_string(), source_name: String::new() })
}

/// A band-providing source accepted by `UniformBlur`: anything whose
/// `DataSize` is already valid (`BandResampler`, `BandCascadeTransformer`, or
/// another `UniformBlur`, chained).
fn require_band_shape(name: &str, source: Option<&Handler>) -> HandlerResult<BandSourceShape> {
    let source = require_any_source(name, source)?;
    let size = source.data_size();
    if !size.is_valid() {
        return Err(HandlerError::WrongSourceType { handler: name.to_string() });
    }
    Ok(BandSourceShape { layers: size.layers, bands_count: size.values_per_chunk })
}

/// One node in a processing group's per-channel handler list: its
/// user-chosen name, the arena index of its source (if any), and the
/// concrete handler instance. Processed with `split_at_mut` so a node's
/// source is visible immutably while the node itself is mutably borrowed.
pub struct HandlerNode {
    pub name: String,
    pub source: Option<usize>,
    pub handler: Handler,
}

impl HandlerNode {
    pub fn new(name: String, source: Option<usize>, handler: Handler) -> Self {
        Self { name, source, handler }
    }
}

/// Runs one tick over an entire channel's handler list, in arena order
/// (which is required to already be a topological order: §4.5 of the
/// handler-graph construction rules rejects forward/cyclic references).
pub fn process_nodes(nodes: &mut [HandlerNode], wave: &[f32], original_wave: &[f32], deadline: Instant) {
    for i in 0..nodes.len() {
        let (earlier, rest) = nodes.split_at_mut(i);
        let node = &mut rest[0];
        let source = node.source.map(|s| &earlier[s].handler);
        node.handler.process(wave, original_wave, deadline, source);
    }
}

/// Clears every node's per-tick cache, called once before `process_nodes`
/// on the next tick.
pub fn purge_nodes(nodes: &mut [HandlerNode]) {
    for node in nodes.iter_mut() {
        node.handler.purge_cache();
    }
}

pub fn find_node<'a>(nodes: &'a [HandlerNode], name: &str) -> Option<&'a HandlerNode> {
    nodes.iter().find(|n| n.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[test]
    fn rms_root_handler_has_no_source_and_processes_wave() {
        let params = Params::Block(BlockKind::Rms, BlockParams { update_rate_hz: 100.0, attack_ms: 0.0, decay_ms: 0.0, transform_desc: None });
        assert!(params.is_root());
        let mut handler = Handler::new("rms", &params, 48000, None).unwrap();
        handler.process(&vec![1.0f32; 1000], &[], far_deadline(), None);
        assert!(!handler.get_chunks(0).is_empty());
    }

    #[test]
    fn band_resampler_rejects_non_fft_source() {
        let rms_params = Params::Block(BlockKind::Rms, BlockParams { update_rate_hz: 100.0, attack_ms: 0.0, decay_ms: 0.0, transform_desc: None });
        let rms = Handler::new("rms", &rms_params, 48000, None).unwrap();
        let band_params = Params::BandResampler(BandResamplerParams {
            bands: band_resampler::BandsDescriptor::Linear { count: 4, fmin: 0.0, fmax: 20000.0 },
            min_cascade: 0,
            max_cascade: 0,
            cubic_interpolation: false,
        });
        let err = Handler::new("bands", &band_params, 48000, Some(&rms));
        assert!(err.is_err());
    }

    #[test]
    fn chained_graph_fft_bands_transformer_blur_produces_finite_output() {
        let fft_params = Params::Fft(FftParams {
            bin_width_hz: 50.0,
            overlap: 0.0,
            cascades_count: 1,
            window_name: "hann".to_string(),
            window_param: None,
            random_test: 0.0,
            random_duration_ms: 100.0,
        });
        let fft = Handler::new("fft", &fft_params, 48000, None).unwrap();

        let band_params = Params::BandResampler(BandResamplerParams {
            bands: band_resampler::BandsDescriptor::Log { count: 8, fmin: 20.0, fmax: 20000.0 },
            min_cascade: 0,
            max_cascade: 0,
            cubic_interpolation: false,
        });
        let bands = Handler::new("bands", &band_params, 48000, Some(&fft)).unwrap();

        let blur_params = Params::UniformBlur(BlurParams { blur_radius: 1.0, blur_radius_adaptation: 1.0 });
        let mut blur = Handler::new("blur", &blur_params, 48000, Some(&bands)).unwrap();

        let mut nodes = vec![
            HandlerNode::new("fft".to_string(), None, fft),
            HandlerNode::new("bands".to_string(), Some(0), bands),
        ];
        let wave = vec![0.2f32; 8192];
        process_nodes(&mut nodes, &wave, &wave, far_deadline());

        let bands_handler = &nodes[1].handler;
        blur.process(&wave, &wave, far_deadline(), Some(bands_handler));
        for chunk in blur.get_chunks(0) {
            assert!(chunk.values.iter().all(|v| v.is_finite()));
        }
    }
}
