//! Autocorrelation tempo estimation
//!
//! Autocorrelates the full onset envelope and picks the strongest peak that
//! passes height, spacing, and prominence constraints. The winning lag maps
//! directly to BPM. When no peak qualifies, the caller's beat-tracking tempo
//! is substituted and the substitution is flagged in the result.
//!
//! # Algorithm
//!
//! 1. FFT autocorrelation of the raw envelope (lags 0 to n-1)
//! 2. Peak picking with:
//!    - height >= 30% of the autocorrelation maximum
//!    - spacing derived from a 200 BPM upper bound
//!    - prominence >= half the autocorrelation standard deviation
//! 3. Tallest qualifying peak wins: `bpm = 60 * sample_rate / (lag * hop)`

use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::DetectError;
use crate::features::envelope::{OnsetEnvelope, HOP_SIZE};
use crate::features::peaks::find_peaks;

/// Small epsilon for degenerate-signal checks
const EPSILON: f32 = 1e-10;

/// Peak height floor as a fraction of the autocorrelation maximum
const MIN_HEIGHT_RATIO: f32 = 0.3;

/// Peak prominence floor as a fraction of the autocorrelation spread
const MIN_PROMINENCE_RATIO: f32 = 0.5;

/// Upper tempo bound used to derive the minimum peak spacing
const SPACING_BPM: f32 = 200.0;

/// Tempo estimate from the autocorrelation method
#[derive(Debug, Clone, Copy)]
pub struct AutocorrTempo {
    /// Estimated tempo in BPM
    pub bpm: f32,

    /// True when no peak qualified and the onset tempo was substituted
    pub fell_back: bool,
}

/// Estimate tempo from autocorrelation peaks of the onset envelope.
///
/// # Arguments
///
/// * `envelope` - Onset strength envelope
/// * `sample_rate` - Audio sample rate in Hz
/// * `onset_bpm` - Beat-tracking tempo, substituted when no peak qualifies
///
/// # Errors
///
/// Returns `DetectError` if the autocorrelation itself fails; a degenerate
/// envelope is not an error and resolves to the fallback tempo.
pub fn estimate_autocorr_tempo(
    envelope: &OnsetEnvelope,
    sample_rate: u32,
    onset_bpm: f32,
) -> Result<AutocorrTempo, DetectError> {
    log::debug!(
        "Autocorrelation tempo: {} envelope frames at {} Hz",
        envelope.values.len(),
        sample_rate
    );

    match best_acf_lag(&envelope.values, sample_rate)? {
        Some((lag, value)) => {
            let bpm = 60.0 * sample_rate as f32 / (lag as f32 * HOP_SIZE as f32);
            log::debug!(
                "Autocorrelation peak at lag {} (value {:.4}): {:.2} BPM",
                lag,
                value,
                bpm
            );
            Ok(AutocorrTempo {
                bpm,
                fell_back: false,
            })
        }
        None => {
            log::warn!(
                "No qualifying autocorrelation peak, substituting onset tempo {:.2} BPM",
                onset_bpm
            );
            Ok(AutocorrTempo {
                bpm: onset_bpm,
                fell_back: true,
            })
        }
    }
}

/// Strongest qualifying autocorrelation peak, or `None` for degenerate input
fn best_acf_lag(values: &[f32], sample_rate: u32) -> Result<Option<(usize, f32)>, DetectError> {
    if values.len() < 3 {
        return Ok(None);
    }

    let acf = autocorrelate(values)?;
    let max_acf = acf.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if max_acf < EPSILON {
        return Ok(None);
    }

    let min_distance =
        ((sample_rate as f32 / (SPACING_BPM * HOP_SIZE as f32)) as usize).max(1);
    let peaks = find_peaks(
        &acf,
        MIN_HEIGHT_RATIO * max_acf,
        min_distance,
        MIN_PROMINENCE_RATIO * stddev(&acf),
    );

    Ok(peaks.first().copied())
}

/// Compute an autocorrelation function with FFT acceleration.
///
/// Uses the identity `ACF = IFFT(FFT(x) * conj(FFT(x)))` with zero-padding
/// to the next power of two at or above `2n`. Values are clamped to be
/// non-negative.
///
/// # Errors
///
/// Returns `DetectError::InvalidInput` if the signal has fewer than two
/// samples.
pub fn autocorrelate(signal: &[f32]) -> Result<Vec<f32>, DetectError> {
    let n = signal.len();
    if n < 2 {
        return Err(DetectError::InvalidInput(
            "signal too short for autocorrelation".to_string(),
        ));
    }

    let fft_size = (2 * n).next_power_of_two();

    let mut fft_input: Vec<Complex<f32>> =
        signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    fft_input.resize(fft_size, Complex::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    fft.process(&mut fft_input);

    // Power spectrum: X * conj(X)
    for value in fft_input.iter_mut() {
        *value = *value * value.conj();
    }

    let ifft = planner.plan_fft_inverse(fft_size);
    ifft.process(&mut fft_input);

    let scale = 1.0 / (fft_size as f32);
    Ok(fft_input[..n].iter().map(|x| (x.re * scale).max(0.0)).collect())
}

/// Population standard deviation
fn stddev(values: &[f32]) -> f32 {
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    variance.sqrt()
}
