use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;

/// NTSC color subcarrier frequency (Hz)
pub const NTSC_SUBCARRIER_HZ: f64 = 315_000_000.0 / 88.0;

/// Sample rate of the emulated composite signal: four samples per subcarrier cycle
pub const NTSC_RATE: f64 = NTSC_SUBCARRIER_HZ * 4.0;

/// IIR transfer function as a pair of coefficient polynomials
///
/// `numerators` and `denominators` always have the same length; the shorter
/// side is zero-padded on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferFunction {
    numerators: Vec<f32>,
    denominators: Vec<f32>,
}

impl TransferFunction {
    pub fn new(mut numerators: Vec<f32>, mut denominators: Vec<f32>) -> Self {
        let len = numerators.len().max(denominators.len());
        numerators.resize(len, 0.0);
        denominators.resize(len, 0.0);
        Self {
            numerators,
            denominators,
        }
    }

    pub fn numerators(&self) -> &[f32] {
        &self.numerators
    }

    pub fn denominators(&self) -> &[f32] {
        &self.denominators
    }

    /// Number of coefficient positions (filter order + 1)
    pub fn len(&self) -> usize {
        self.numerators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numerators.is_empty()
    }

    /// The coefficient all others are normalized by
    pub fn first_nonzero_denominator(&self) -> Result<f32, FilterError> {
        self.denominators
            .iter()
            .copied()
            .find(|coeff| *coeff != 0.0)
            .ok_or(FilterError::NoNonZeroDenominator)
    }

    /// Series combination of two filters (polynomial product)
    pub fn multiply(&self, other: &TransferFunction) -> TransferFunction {
        let numerators = convolve(trimmed(&self.numerators), trimmed(&other.numerators));
        let denominators = convolve(
            trimmed(&self.denominators),
            trimmed(&other.denominators),
        );
        TransferFunction::new(numerators, denominators)
    }

    /// This filter applied `n` times in series
    ///
    /// `cascade(1)` (and `cascade(0)`) return the filter unchanged.
    pub fn cascade(&self, n: usize) -> TransferFunction {
        let mut result = self.clone();
        for _ in 1..n {
            result = result.multiply(self);
        }
        result
    }

    /// Squares the filter `n - 1` times, giving order `2^(n-1)` times the original.
    ///
    /// Kept for presets that were tuned against this behavior; new code wants
    /// [`cascade`](Self::cascade).
    pub fn cascade_squared(&self, n: usize) -> TransferFunction {
        let mut result = self.clone();
        for _ in 1..n {
            result = result.multiply(&result);
        }
        result
    }

    /// Steady-state filter memory for a unit constant input.
    ///
    /// Multiplying entry `i` by a constant input value gives the content of
    /// memory slot `i` for a filter that has been fed that value forever.
    /// The final slot is always zero.
    pub fn steady_state_memory(&self) -> Result<Vec<f32>, FilterError> {
        let len = self.len();
        let mut zi = vec![0.0f32; len];
        if len == 0 {
            return Ok(zi);
        }

        let norm = self.first_nonzero_denominator()?;
        let num: Vec<f32> = self.numerators.iter().map(|c| c / norm).collect();
        let den: Vec<f32> = self.denominators.iter().map(|c| c / norm).collect();

        let b_sum: f32 = (1..len).map(|i| num[i] - den[i] * num[0]).sum();
        zi[0] = b_sum / den.iter().sum::<f32>();

        let mut a_sum = 1.0;
        let mut c_sum = 0.0;
        for i in 1..len.saturating_sub(1) {
            a_sum += den[i];
            c_sum += num[i] - den[i] * num[0];
            zi[i] = a_sum * zi[0] - c_sum;
        }

        Ok(zi)
    }
}

/// Reject anything but a finite frequency above zero
fn positive_hz(name: &str, value: f64) -> Result<f64, FilterError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(FilterError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

/// Single-pole RC lowpass
///
/// Fails unless both frequencies are finite and positive.
pub fn lowpass(cutoff_hz: f64, sample_rate_hz: f64) -> Result<TransferFunction, FilterError> {
    let cutoff_hz = positive_hz("lowpass.cutoff", cutoff_hz)?;
    let dt = 1.0 / positive_hz("lowpass.sample_rate", sample_rate_hz)?;
    let tau = 1.0 / (2.0 * PI * cutoff_hz);
    let alpha = dt / (tau + dt);
    Ok(TransferFunction::new(vec![alpha as f32], vec![1.0, -(1.0 - alpha) as f32]))
}

/// Three single-pole lowpasses in series ("constant-K" response)
pub fn lowpass_triple(cutoff_hz: f64, sample_rate_hz: f64) -> Result<TransferFunction, FilterError> {
    Ok(lowpass(cutoff_hz, sample_rate_hz)?.cascade(3))
}

/// Second-order notch
///
/// `frequency` is normalized so that 1.0 is the Nyquist frequency.
pub fn notch(frequency: f64, quality: f64) -> Result<TransferFunction, FilterError> {
    if !(0.0..=1.0).contains(&frequency) {
        return Err(FilterError::InvalidParameter {
            name: "notch.frequency".to_string(),
            value: frequency.to_string(),
        });
    }
    if quality.is_nan() || quality <= 0.0 {
        return Err(FilterError::InvalidParameter {
            name: "notch.quality".to_string(),
            value: quality.to_string(),
        });
    }

    let bandwidth = (frequency / quality) * PI;
    let omega = frequency * PI;
    let beta = (bandwidth * 0.5).tan();
    let gain = 1.0 / (1.0 + beta);
    let cos_term = -2.0 * omega.cos() * gain;

    Ok(TransferFunction::new(
        vec![gain as f32, cos_term as f32, gain as f32],
        vec![1.0, cos_term as f32, (2.0 * gain - 1.0) as f32],
    ))
}

/// Second-order Butterworth lowpass (bilinear-transform biquad, Q = 1/sqrt(2))
///
/// The cutoff is clamped just below Nyquist. Fails unless both frequencies
/// are finite and positive.
pub fn butterworth(cutoff_hz: f64, sample_rate_hz: f64) -> Result<TransferFunction, FilterError> {
    let sample_rate_hz = positive_hz("butterworth.sample_rate", sample_rate_hz)?;
    let nyquist = sample_rate_hz * 0.5;
    let cutoff = positive_hz("butterworth.cutoff", cutoff_hz)?.min(nyquist * 0.9999);
    let q = std::f64::consts::FRAC_1_SQRT_2;

    let w0 = 2.0 * PI * cutoff / sample_rate_hz;
    let (sin_w0, cos_w0) = w0.sin_cos();
    let alpha = sin_w0 / (2.0 * q);

    let b0 = (1.0 - cos_w0) * 0.5;
    let b1 = 1.0 - cos_w0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;

    Ok(TransferFunction::new(
        vec![(b0 / a0) as f32, (b1 / a0) as f32, (b0 / a0) as f32],
        vec![1.0, (a1 / a0) as f32, (a2 / a0) as f32],
    ))
}

fn trimmed(coeffs: &[f32]) -> &[f32] {
    let end = coeffs
        .iter()
        .rposition(|c| *c != 0.0)
        .map_or(0, |last| last + 1);
    &coeffs[..end]
}

fn convolve(a: &[f32], b: &[f32]) -> Vec<f32> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0f32; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}
