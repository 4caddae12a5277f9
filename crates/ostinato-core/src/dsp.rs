//! Float buffer kernels used by ports and processors.

/// Fill value for silent audio buffers. Keeps downstream filters out of
/// denormal range.
pub const DENORMAL_PREVENTION_VAL: f32 = 1e-20;

/// Magnitude above which a buffer counts as audible.
pub const HAS_SOUND_EPSILON: f32 = 1e-7;

/// Connection multipliers this close to 1.0 are summed with a plain add.
///
/// Tunable. The value is kept for bit compatibility of existing mixes.
pub const UNITY_GAIN_EPSILON: f32 = 0.00001;

#[inline]
pub fn floats_near(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() < epsilon
}

#[inline]
pub fn fill(buf: &mut [f32], value: f32) {
    buf.fill(value);
}

/// `dest[i] += src[i]`
#[inline]
pub fn add2(dest: &mut [f32], src: &[f32]) {
    for (d, s) in dest.iter_mut().zip(src) {
        *d += *s;
    }
}

/// `dest[i] += src[i] * k`
#[inline]
pub fn mix_product(dest: &mut [f32], src: &[f32], k: f32) {
    for (d, s) in dest.iter_mut().zip(src) {
        *d += *s * k;
    }
}

/// `dest[i] *= k`
#[inline]
pub fn mul_k2(dest: &mut [f32], k: f32) {
    for d in dest.iter_mut() {
        *d *= k;
    }
}

#[inline]
pub fn abs_max(buf: &[f32]) -> f32 {
    buf.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
}

/// Smallest and largest sample. `(0.0, 0.0)` for an empty buffer.
#[inline]
pub fn min_max(buf: &[f32]) -> (f32, f32) {
    let Some(first) = buf.first() else {
        return (0.0, 0.0);
    };
    buf.iter()
        .fold((*first, *first), |(lo, hi), s| (lo.min(*s), hi.max(*s)))
}

#[inline]
pub fn clip(buf: &mut [f32], min: f32, max: f32) {
    for s in buf.iter_mut() {
        *s = s.clamp(min, max);
    }
}

/// Clips only when some sample is outside `[min, max]`, so in-range data is
/// never touched. Returns true if clipping happened.
#[inline]
pub fn clip_if_out_of_range(buf: &mut [f32], min: f32, max: f32) -> bool {
    let (lo, hi) = min_max(buf);
    if lo < min || hi > max {
        clip(buf, min, max);
        true
    } else {
        false
    }
}

#[inline]
pub fn has_sound(buf: &[f32]) -> bool {
    buf.iter().any(|s| s.abs() > HAS_SOUND_EPSILON)
}

/// One-pole falloff for peak meters read by the UI.
#[derive(Debug, Clone, Default)]
pub struct PeakFallSmooth {
    history: f32,
    value: f32,
    coeff: f32,
}

impl PeakFallSmooth {
    /// `frequency` is the number of reads per second.
    pub fn calculate_coeff(&mut self, frequency: f32, sample_rate: f32) {
        self.coeff = (-2.0 * core::f32::consts::PI * frequency / sample_rate).exp();
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value;
    }

    /// Rises instantly, falls smoothly.
    pub fn smoothed_value(&mut self) -> f32 {
        let falling = self.value + self.coeff * (self.history - self.value);
        let result = self.value.max(falling);
        self.history = result;
        result
    }
}
