use std::f32::consts::PI;

/// Window-function descriptor parsed from a handler's `windowFunction` option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Window {
    Rectangular,
    Hann,
    Hamming,
    Kaiser { alpha: f32 },
    Exponential { target_decay_db: f32 },
    Chebyshev { attenuation_db: f32 },
}

impl Window {
    pub fn parse(name: &str, param: Option<f32>) -> Option<Window> {
        match name.trim().to_ascii_lowercase().as_str() {
            "rectangular" | "none" => Some(Window::Rectangular),
            "hann" => Some(Window::Hann),
            "hamming" => Some(Window::Hamming),
            "kaiser" => Some(Window::Kaiser {
                alpha: param.unwrap_or(3.0),
            }),
            "exponential" => Some(Window::Exponential {
                target_decay_db: param.unwrap_or(60.0),
            }),
            "chebyshev" => Some(Window::Chebyshev {
                attenuation_db: param.unwrap_or(80.0),
            }),
            _ => None,
        }
    }

    pub fn generate(&self, size: usize) -> Vec<f32> {
        match self {
            Window::Rectangular => create_rectangular(size),
            Window::Hann => create_cosine_sum(size, 0.5),
            Window::Hamming => create_cosine_sum(size, 0.53836),
            Window::Kaiser { alpha } => create_kaiser(size, *alpha),
            Window::Exponential { target_decay_db } => create_exponential(size, *target_decay_db),
            Window::Chebyshev { attenuation_db } => create_chebyshev(size, *attenuation_db),
        }
    }
}

fn create_rectangular(size: usize) -> Vec<f32> {
    vec![1.0; size]
}

/// Generalised Hann/Hamming family: `a0 - (1-a0)*cos(2*pi*i/size)`.
///
/// Deliberately divides by `size`, not `size - 1`: this reproduces the
/// original plugin's slightly asymmetric window rather than the textbook
/// symmetric one, and downstream bin-weight assumptions were grounded on it.
fn create_cosine_sum(size: usize, a0: f32) -> Vec<f32> {
    (0..size)
        .map(|i| a0 - (1.0 - a0) * (2.0 * PI * i as f32 / size as f32).cos())
        .collect()
}

/// Zeroth-order modified Bessel function of the first kind, used by the
/// Kaiser window.
fn bessel_i0(x: f32) -> f32 {
    let mut sum = 1.0f32;
    let mut term = 1.0f32;
    let half_x_sq = (x / 2.0) * (x / 2.0);
    for k in 1..32 {
        term *= half_x_sq / (k as f32 * k as f32);
        sum += term;
        if term < sum * 1e-8 {
            break;
        }
    }
    sum
}

fn create_kaiser(size: usize, alpha: f32) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0; size];
    }
    let beta = PI * alpha;
    let denom = bessel_i0(beta);
    let n = size as f32 - 1.0;
    (0..size)
        .map(|i| {
            let ratio = 2.0 * i as f32 / n - 1.0;
            let arg = beta * (1.0 - ratio * ratio).max(0.0).sqrt();
            bessel_i0(arg) / denom
        })
        .collect()
}

fn create_exponential(size: usize, target_decay_db: f32) -> Vec<f32> {
    let tau = size as f32 * 0.5 * 8.69 / target_decay_db.max(1e-6);
    (0..size)
        .map(|i| (-(i as f32) / tau).exp())
        .collect()
}

/// Dolph-Chebyshev window via the Chebyshev-polynomial construction.
fn create_chebyshev(size: usize, attenuation_db: f32) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0; size];
    }
    let n = size;
    let n1 = n as f32 - 1.0;
    let gamma = 10f32.powf(attenuation_db / 20.0);
    let beta = (gamma.acosh() / n1).cosh();

    let cheby_poly = |order: f32, x: f32| -> f32 {
        if x.abs() <= 1.0 {
            (order * x.acos()).cos()
        } else {
            (order * x.acosh()).cosh()
        }
    };

    // Frequency-domain samples of the Chebyshev polynomial, then inverse DFT
    // via direct summation (window lengths here are small; a full FFT round
    // trip is not worth the bookkeeping).
    let mut freq = vec![0.0f32; n];
    for k in 0..n {
        let angle = PI * k as f32 / n as f32;
        freq[k] = cheby_poly(n1, beta * angle.cos());
    }
    let mut window = vec![0.0f32; n];
    for i in 0..n {
        let mut acc = freq[0];
        for k in 1..n {
            acc += 2.0 * freq[k] * (2.0 * PI * k as f32 * (i as f32 + 0.5) / n as f32).cos();
        }
        window[i] = acc;
    }
    let max = window.iter().cloned().fold(f32::MIN, f32::max).max(f32::MIN_POSITIVE);
    for w in &mut window {
        *w /= max;
    }
    window
}
