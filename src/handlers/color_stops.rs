use crate::dsp::color::{MixMode, Rgba8};

/// An ordered list of `(value, colour)` stops used by the image handlers to
/// map a scalar (already transformed into whatever domain the stops are
/// defined in) to a pixel colour, mixing between adjacent stops in the
/// handler's configured [`MixMode`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColorStops {
    stops: Vec<(f32, Rgba8)>,
    mix_mode: MixMode,
}

impl ColorStops {
    /// Parses `"0:0,0,0,255 0.5:0,255,0,255 1:255,0,0,255"`-style text:
    /// whitespace-separated `value:r,g,b,a` stops, sorted by value.
    pub fn parse(text: &str, mix_mode: MixMode) -> Option<Self> {
        let mut stops = Vec::new();
        for token in text.split_whitespace() {
            let (pos, rgba) = token.split_once(':')?;
            let pos: f32 = pos.parse().ok()?;
            let channels: Vec<u8> = rgba.split(',').map(|c| c.parse().ok()).collect::<Option<_>>()?;
            if channels.len() != 4 {
                return None;
            }
            stops.push((pos, Rgba8::new(channels[0], channels[1], channels[2], channels[3])));
        }
        if stops.is_empty() {
            return None;
        }
        stops.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        Some(Self { stops, mix_mode })
    }

    pub fn default_gradient(mix_mode: MixMode) -> Self {
        Self {
            stops: vec![(0.0, Rgba8::new(0, 0, 0, 255)), (1.0, Rgba8::new(255, 255, 255, 255))],
            mix_mode,
        }
    }

    /// Colour at `value`, clamped to the stop range at the ends and mixed
    /// between the two bracketing stops otherwise.
    pub fn color_at(&self, value: f32) -> Rgba8 {
        if value <= self.stops[0].0 {
            return self.stops[0].1;
        }
        let last = self.stops.len() - 1;
        if value >= self.stops[last].0 {
            return self.stops[last].1;
        }
        for window in self.stops.windows(2) {
            let (lo_v, lo_c) = window[0];
            let (hi_v, hi_c) = window[1];
            if value >= lo_v && value <= hi_v {
                let t = if hi_v > lo_v { (value - lo_v) / (hi_v - lo_v) } else { 0.0 };
                return self.mix_mode.mix(lo_c, hi_c, t);
            }
        }
        self.stops[last].1
    }
}
