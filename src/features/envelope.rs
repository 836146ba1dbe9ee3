//! Onset strength envelope extraction
//!
//! Converts a waveform into a per-frame onset strength signal: the median
//! across mel bands of the half-wave rectified frame-to-frame increase in
//! log mel energy. Percussive events produce sharp peaks in this signal,
//! which the tempo estimators turn into periodicity measurements.
//!
//! # Algorithm
//!
//! 1. STFT with 2048-sample frames, 512-sample hop, Hann window, no padding
//! 2. Power spectrum per frame (1025 bins)
//! 3. 128-band triangular mel filterbank from 0 Hz to 8 kHz
//! 4. Log compression to dB with an 80 dB dynamic range floor
//! 5. Half-wave rectified first difference per band
//! 6. Median across bands per frame transition
//!
//! The median aggregation makes the envelope robust to narrowband noise:
//! a single noisy band cannot fake an onset.
//!
//! # Example
//!
//! ```no_run
//! use tempometer::features::envelope::onset_envelope;
//!
//! let samples = vec![0.0f32; 3 * 44100];
//! let envelope = onset_envelope(&samples, 44100)?;
//! println!("{} frames at {:.2} Hz", envelope.values.len(), envelope.frame_rate);
//! # Ok::<(), tempometer::DetectError>(())
//! ```

use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::DetectError;

/// STFT frame size in samples
pub const FRAME_SIZE: usize = 2048;

/// STFT hop size in samples
pub const HOP_SIZE: usize = 512;

/// Number of triangular mel bands in the filterbank
pub const N_BANDS: usize = 128;

/// Upper frequency bound of the filterbank in Hz
pub const FMAX_HZ: f32 = 8000.0;

/// Power floor, also the dB reference for silence
const EPSILON: f32 = 1e-10;

/// Dynamic range below the loudest mel bin, in dB
const TOP_DB: f32 = 80.0;

/// Onset strength envelope derived from a waveform
#[derive(Debug, Clone)]
pub struct OnsetEnvelope {
    /// Envelope values, one per frame transition, all finite and non-negative
    pub values: Vec<f32>,

    /// Envelope sampling rate in frames per second (sample rate / hop size)
    pub frame_rate: f32,
}

/// Compute the onset strength envelope of a mono waveform.
///
/// Non-finite input samples are absorbed by the dB floor and cannot
/// propagate into the output: the envelope is finite for any input.
///
/// # Arguments
///
/// * `samples` - Mono audio samples
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
///
/// An envelope with one value per frame transition (`n_frames - 1` values).
///
/// # Errors
///
/// Returns `DetectError::InvalidInput` if:
/// - `sample_rate` is zero
/// - `samples` is shorter than two STFT frames
pub fn onset_envelope(samples: &[f32], sample_rate: u32) -> Result<OnsetEnvelope, DetectError> {
    if sample_rate == 0 {
        return Err(DetectError::InvalidInput(
            "sample rate must be positive".to_string(),
        ));
    }
    if samples.len() < FRAME_SIZE + HOP_SIZE {
        return Err(DetectError::InvalidInput(format!(
            "audio too short for onset analysis: {} samples, need at least {}",
            samples.len(),
            FRAME_SIZE + HOP_SIZE
        )));
    }

    log::debug!(
        "Computing onset envelope: {} samples at {} Hz",
        samples.len(),
        sample_rate
    );

    let window = hann_window(FRAME_SIZE);
    let spectra = power_frames(samples, &window);
    let filterbank = mel_filterbank(sample_rate);

    let mut mel_db: Vec<Vec<f32>> = spectra
        .iter()
        .map(|spectrum| {
            filterbank
                .iter()
                .map(|band| {
                    band.iter()
                        .map(|&(bin, weight)| weight * spectrum[bin])
                        .sum()
                })
                .collect()
        })
        .collect();
    power_to_db(&mut mel_db);

    let values = flux_median(&mel_db);
    let frame_rate = sample_rate as f32 / HOP_SIZE as f32;

    log::debug!(
        "Onset envelope: {} frames at {:.2} Hz",
        values.len(),
        frame_rate
    );

    Ok(OnsetEnvelope { values, frame_rate })
}

/// Symmetric Hann window
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
            0.5 * (1.0 - t.cos())
        })
        .collect()
}

/// Power spectra of all complete frames, computed in parallel
fn power_frames(samples: &[f32], window: &[f32]) -> Vec<Vec<f32>> {
    let n_frames = (samples.len() - FRAME_SIZE) / HOP_SIZE + 1;
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(FRAME_SIZE);

    (0..n_frames)
        .into_par_iter()
        .map(|frame| {
            let start = frame * HOP_SIZE;
            let mut buffer: Vec<Complex<f32>> = samples[start..start + FRAME_SIZE]
                .iter()
                .zip(window.iter())
                .map(|(&sample, &w)| Complex::new(sample * w, 0.0))
                .collect();
            fft.process(&mut buffer);

            buffer[..=FRAME_SIZE / 2]
                .iter()
                .map(|bin| bin.re * bin.re + bin.im * bin.im)
                .collect()
        })
        .collect()
}

/// Sparse triangular mel filterbank as (bin, weight) pairs per band.
///
/// Band edges are spaced evenly on the mel scale between 0 Hz and the
/// filterbank ceiling (or Nyquist, whichever is lower).
fn mel_filterbank(sample_rate: u32) -> Vec<Vec<(usize, f32)>> {
    let fmax = FMAX_HZ.min(sample_rate as f32 / 2.0);
    let bin_hz = sample_rate as f32 / FRAME_SIZE as f32;
    let n_bins = FRAME_SIZE / 2;

    let max_mel = hz_to_mel(fmax);
    let edges: Vec<f32> = (0..N_BANDS + 2)
        .map(|i| mel_to_hz(max_mel * i as f32 / (N_BANDS + 1) as f32))
        .collect();

    (0..N_BANDS)
        .map(|band| {
            let lower = edges[band];
            let center = edges[band + 1];
            let upper = edges[band + 2];

            let first_bin = (lower / bin_hz).ceil() as usize;
            let last_bin = ((upper / bin_hz).floor() as usize).min(n_bins);

            let mut weights = Vec::new();
            for bin in first_bin..=last_bin {
                let freq = bin as f32 * bin_hz;
                let weight = if freq <= center {
                    (freq - lower) / (center - lower)
                } else {
                    (upper - freq) / (upper - center)
                };
                if weight > 0.0 {
                    weights.push((bin, weight));
                }
            }
            weights
        })
        .collect()
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}

/// Convert mel powers to dB in place, flooring 80 dB below the loudest bin.
///
/// The power floor makes silence map to a constant -100 dB, so a silent
/// signal produces a flat (all-zero) flux.
fn power_to_db(mel_power: &mut [Vec<f32>]) {
    let mut max_db = f32::NEG_INFINITY;
    for frame in mel_power.iter_mut() {
        for value in frame.iter_mut() {
            *value = 10.0 * value.max(EPSILON).log10();
            if *value > max_db {
                max_db = *value;
            }
        }
    }

    let floor = max_db - TOP_DB;
    for frame in mel_power.iter_mut() {
        for value in frame.iter_mut() {
            *value = value.max(floor);
        }
    }
}

/// Median across bands of the rectified per-band dB increase
fn flux_median(mel_db: &[Vec<f32>]) -> Vec<f32> {
    let n_frames = mel_db.len();
    let mut values = Vec::with_capacity(n_frames.saturating_sub(1));
    let mut band_flux = vec![0.0f32; N_BANDS];

    for t in 1..n_frames {
        for (band, flux) in band_flux.iter_mut().enumerate() {
            *flux = (mel_db[t][band] - mel_db[t - 1][band]).max(0.0);
        }
        band_flux.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        // N_BANDS is even: median averages the two middle values
        let mid = N_BANDS / 2;
        values.push(0.5 * (band_flux[mid - 1] + band_flux[mid]));
    }
    values
}
