/// 8-bit-per-channel RGBA colour, the pixel type every image handler and the
/// BMP writer operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const TRANSPARENT: Rgba8 = Rgba8::new(0, 0, 0, 0);

    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    pub fn from_f32(c: [f32; 4]) -> Self {
        let clamp = |x: f32| (x.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(clamp(c[0]), clamp(c[1]), clamp(c[2]), clamp(c[3]))
    }

    /// Parses a `"r,g,b,a"` option value, e.g. a `borderColor`/`lineColor`.
    pub fn parse(text: &str) -> Option<Self> {
        let channels: Vec<u8> = text.split(',').map(|c| c.trim().parse().ok()).collect::<Option<_>>()?;
        if channels.len() != 4 {
            return None;
        }
        Some(Self::new(channels[0], channels[1], channels[2], channels[3]))
    }
}

/// The colour space two adjacent colour stops are mixed in, chosen per
/// image handler (`mixMode` option).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixMode {
    SRgb,
    LinearRgb,
    Hsv,
    Hsl,
    YCbCr,
}

impl MixMode {
    pub fn parse(name: &str) -> Option<MixMode> {
        match name.trim().to_ascii_lowercase().as_str() {
            "srgb" | "rgb" => Some(MixMode::SRgb),
            "linearrgb" | "linear" => Some(MixMode::LinearRgb),
            "hsv" => Some(MixMode::Hsv),
            "hsl" => Some(MixMode::Hsl),
            "ycbcr" => Some(MixMode::YCbCr),
            _ => None,
        }
    }

    /// Mixes two colours at `t` in `[0,1]` via this colour space.
    pub fn mix(&self, a: Rgba8, b: Rgba8, t: f32) -> Rgba8 {
        let t = t.clamp(0.0, 1.0);
        match self {
            MixMode::SRgb => {
                let fa = a.to_f32();
                let fb = b.to_f32();
                Rgba8::from_f32(lerp4(fa, fb, t))
            }
            MixMode::LinearRgb => {
                let fa = srgb_to_linear(a.to_f32());
                let fb = srgb_to_linear(b.to_f32());
                let mixed = lerp4(fa, fb, t);
                Rgba8::from_f32(linear_to_srgb(mixed))
            }
            MixMode::Hsv => {
                let ha = rgb_to_hsv(a.to_f32());
                let hb = rgb_to_hsv(b.to_f32());
                let mixed = lerp4(ha, hb, t);
                Rgba8::from_f32(hsv_to_rgb(mixed))
            }
            MixMode::Hsl => {
                let ha = hsv_to_hsl(rgb_to_hsv(a.to_f32()));
                let hb = hsv_to_hsl(rgb_to_hsv(b.to_f32()));
                let mixed = lerp4(ha, hb, t);
                Rgba8::from_f32(hsv_to_rgb(hsl_to_hsv(mixed)))
            }
            MixMode::YCbCr => {
                let ya = rgb_to_ycbcr(a.to_f32());
                let yb = rgb_to_ycbcr(b.to_f32());
                let mixed = lerp4(ya, yb, t);
                Rgba8::from_f32(ycbcr_to_rgb(mixed))
            }
        }
    }
}

fn lerp4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

fn srgb_channel_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_channel_to_srgb(c: f32) -> f32 {
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn srgb_to_linear(c: [f32; 4]) -> [f32; 4] {
    [
        srgb_channel_to_linear(c[0]),
        srgb_channel_to_linear(c[1]),
        srgb_channel_to_linear(c[2]),
        c[3],
    ]
}

fn linear_to_srgb(c: [f32; 4]) -> [f32; 4] {
    [
        linear_channel_to_srgb(c[0]),
        linear_channel_to_srgb(c[1]),
        linear_channel_to_srgb(c[2]),
        c[3],
    ]
}

/// `[h in 0..1, s, v, a]`
pub fn rgb_to_hsv(c: [f32; 4]) -> [f32; 4] {
    let (r, g, b, a) = (c[0], c[1], c[2], c[3]);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let v = max;
    let s = if max > 0.0 { delta / max } else { 0.0 };
    let h = if delta <= 1e-9 {
        0.0
    } else if max == r {
        ((g - b) / delta).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };
    [h, s, v, a]
}

pub fn hsv_to_rgb(c: [f32; 4]) -> [f32; 4] {
    let (h, s, v, a) = (c[0].rem_euclid(1.0), c[1].clamp(0.0, 1.0), c[2], c[3]);
    let h6 = h * 6.0;
    let i = h6.floor() as i32;
    let f = h6 - i as f32;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match i.rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [r, g, b, a]
}

pub fn hsv_to_hsl(c: [f32; 4]) -> [f32; 4] {
    let (h, s, v, a) = (c[0], c[1], c[2], c[3]);
    let l = v * (1.0 - s / 2.0);
    let sl = if l <= 0.0 || l >= 1.0 {
        0.0
    } else {
        (v - l) / l.min(1.0 - l)
    };
    [h, sl, l, a]
}

pub fn hsl_to_hsv(c: [f32; 4]) -> [f32; 4] {
    let (h, s, l, a) = (c[0], c[1], c[2], c[3]);
    let v = l + s * l.min(1.0 - l);
    let sv = if v <= 0.0 { 0.0 } else { 2.0 * (1.0 - l / v) };
    [h, sv, v, a]
}

const KR: f32 = 0.299;
const KG: f32 = 0.587;
const KB: f32 = 0.114;

/// `[y, cb, cr, a]`, all in `[0,1]` (`cb`/`cr` offset by 0.5).
pub fn rgb_to_ycbcr(c: [f32; 4]) -> [f32; 4] {
    let (r, g, b, a) = (c[0], c[1], c[2], c[3]);
    let y = KR * r + KG * g + KB * b;
    let cb = 0.5 * (b - y) / (1.0 - KB) + 0.5;
    let cr = 0.5 * (r - y) / (1.0 - KR) + 0.5;
    [y, cb, cr, a]
}

pub fn ycbcr_to_rgb(c: [f32; 4]) -> [f32; 4] {
    let (y, cb, cr, a) = (c[0], c[1] - 0.5, c[2] - 0.5, c[3]);
    let r = y + cr * 2.0 * (1.0 - KR);
    let b = y + cb * 2.0 * (1.0 - KB);
    let g = (y - KR * r - KB * b) / KG;
    [r, g, b, a]
}
