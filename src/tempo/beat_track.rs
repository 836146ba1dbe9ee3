//! Beat tracking tempo estimation
//!
//! Jointly estimates a global tempo and a beat sequence from the onset
//! envelope. A log-normal tempo prior weights the envelope's autocorrelation
//! to pick the dominant beat period, then dynamic programming places beats
//! at onset peaks consistent with that period.
//!
//! # Reference
//!
//! Ellis, D. P. W. (2007). Beat tracking by dynamic programming.
//! Journal of New Music Research, 36(1), 51-60.
//!
//! # Algorithm
//!
//! 1. Mean-removed autocorrelation of the envelope, normalized by lag zero
//! 2. Score each lag in the 30 to 300 BPM range with
//!    `ln(1 + 1e6 * acf) + log_prior(bpm)`, a log-normal prior around
//!    120 BPM with one octave standard deviation
//! 3. Parabolic interpolation around the winning lag
//! 4. Dynamic program over a Gaussian-smoothed onset score: each frame links
//!    to its best predecessor about one period back, paying a squared-log
//!    penalty for deviating from the period; backtracking from the best
//!    terminal frame yields the beat sequence
//!
//! A degenerate envelope (silence, constant level) yields a tempo of zero
//! and no beats rather than the prior center, so fusion can discard the
//! candidate instead of trusting a fabricated 120 BPM.

use crate::error::DetectError;
use crate::features::envelope::OnsetEnvelope;
use crate::tempo::autocorr::autocorrelate;

/// Small epsilon for degenerate-signal checks
const EPSILON: f32 = 1e-10;

/// Center of the log-normal tempo prior in BPM
const PRIOR_BPM: f32 = 120.0;

/// Width of the tempo prior in octaves
const PRIOR_STD_OCTAVES: f32 = 1.0;

/// Lower bound of the period scan in BPM
const SEARCH_MIN_BPM: f32 = 30.0;

/// Upper bound of the period scan in BPM
const SEARCH_MAX_BPM: f32 = 300.0;

/// Transition cost sharpness for the dynamic program
const TIGHTNESS: f32 = 100.0;

/// Tempo and beat sequence from the beat-tracking estimator
#[derive(Debug, Clone)]
pub struct BeatTrack {
    /// Global tempo in BPM, 0.0 when the envelope carries no periodic energy
    pub bpm: f32,

    /// Beat positions in seconds from the start of the analyzed window
    pub beats: Vec<f32>,
}

/// Estimate tempo and beat positions from the onset envelope.
///
/// # Arguments
///
/// * `envelope` - Onset strength envelope
///
/// # Returns
///
/// The estimated tempo with its beat sequence. Degenerate envelopes produce
/// a zero tempo and an empty beat list.
///
/// # Errors
///
/// Returns `DetectError` if the autocorrelation fails.
pub fn track_beats(envelope: &OnsetEnvelope) -> Result<BeatTrack, DetectError> {
    log::debug!(
        "Beat tracking: {} envelope frames at {:.2} Hz",
        envelope.values.len(),
        envelope.frame_rate
    );

    let bpm = global_tempo(envelope)?;
    if bpm <= 0.0 {
        log::warn!("No periodic energy in onset envelope, beat tracking skipped");
        return Ok(BeatTrack {
            bpm: 0.0,
            beats: Vec::new(),
        });
    }

    let period = ((60.0 * envelope.frame_rate / bpm).round() as usize).max(1);
    let score = local_score(&envelope.values, period);
    let beats: Vec<f32> = beat_dp(&score, period)
        .into_iter()
        .map(|frame| frame as f32 / envelope.frame_rate)
        .collect();

    log::debug!("Beat tracking: {:.2} BPM, {} beats", bpm, beats.len());
    Ok(BeatTrack { bpm, beats })
}

/// Prior-weighted dominant period of the envelope autocorrelation, in BPM.
///
/// Returns 0.0 when the envelope has no onset energy or no autocorrelation
/// energy after mean removal.
fn global_tempo(envelope: &OnsetEnvelope) -> Result<f32, DetectError> {
    let values = &envelope.values;
    let n = values.len();
    if n < 4 {
        return Ok(0.0);
    }

    let max_onset = values.iter().cloned().fold(0.0f32, f32::max);
    if max_onset < EPSILON {
        return Ok(0.0);
    }

    let mean = values.iter().sum::<f32>() / n as f32;
    let centered: Vec<f32> = values.iter().map(|v| v - mean).collect();
    let acf = autocorrelate(&centered)?;
    let energy = acf[0];
    if energy < EPSILON {
        return Ok(0.0);
    }

    let lag_min = ((60.0 * envelope.frame_rate / SEARCH_MAX_BPM).ceil() as usize).max(1);
    let lag_max = ((60.0 * envelope.frame_rate / SEARCH_MIN_BPM).floor() as usize).min(n - 1);
    if lag_min >= lag_max {
        return Ok(0.0);
    }

    let mut best_lag = 0usize;
    let mut best_score = f32::NEG_INFINITY;
    for lag in lag_min..=lag_max {
        let strength = acf[lag] / energy;
        let bpm = 60.0 * envelope.frame_rate / lag as f32;
        let octaves = (bpm / PRIOR_BPM).log2();
        let score = (1.0 + 1e6 * strength).ln() - 0.5 * (octaves / PRIOR_STD_OCTAVES).powi(2);
        if score > best_score {
            best_score = score;
            best_lag = lag;
        }
    }
    if best_lag == 0 {
        return Ok(0.0);
    }

    let refined = refine_lag(&acf, energy, best_lag);
    Ok(60.0 * envelope.frame_rate / refined)
}

/// Parabolic interpolation of the autocorrelation peak for sub-lag precision
fn refine_lag(acf: &[f32], energy: f32, best_lag: usize) -> f32 {
    if best_lag == 0 || best_lag + 1 >= acf.len() {
        return best_lag as f32;
    }

    let left = acf[best_lag - 1] / energy;
    let mid = acf[best_lag] / energy;
    let right = acf[best_lag + 1] / energy;

    let denom = left - 2.0 * mid + right;
    if denom.abs() < EPSILON {
        return best_lag as f32;
    }

    let delta = (0.5 * (left - right) / denom).clamp(-0.5, 0.5);
    best_lag as f32 + delta
}

/// Onset score for the dynamic program: the std-normalized envelope smoothed
/// with a Gaussian of width period/32 frames
fn local_score(values: &[f32], period: usize) -> Vec<f32> {
    let n = values.len();
    let mean = values.iter().sum::<f32>() / n as f32;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / (n as f32 - 1.0);
    let std = variance.sqrt();
    if std < EPSILON {
        return vec![0.0; n];
    }

    let half = period as isize;
    let kernel: Vec<f32> = (-half..=half)
        .map(|i| {
            let z = i as f32 * 32.0 / period as f32;
            (-0.5 * z * z).exp()
        })
        .collect();

    (0..n)
        .map(|t| {
            let mut acc = 0.0;
            for (k, &weight) in kernel.iter().enumerate() {
                let index = t as isize - (k as isize - half);
                if index >= 0 && (index as usize) < n {
                    acc += weight * values[index as usize] / std;
                }
            }
            acc
        })
        .collect()
}

/// Dynamic-programming beat placement over the onset score.
///
/// Each frame may link to a predecessor between half and twice the period
/// back, paying `-tightness * ln(offset / period)^2`. A chain only forms
/// when continuing scores better than restarting, which keeps leading
/// silence out of the beat sequence.
fn beat_dp(localscore: &[f32], period: usize) -> Vec<usize> {
    let n = localscore.len();
    let max_score = localscore.iter().cloned().fold(0.0f32, f32::max);
    if n < 3 || max_score < EPSILON {
        return Vec::new();
    }

    let off_min = (((period as f32) / 2.0).round() as usize).max(1);
    let off_max = 2 * period;
    let costs: Vec<f32> = (off_min..=off_max)
        .map(|off| {
            let deviation = (off as f32 / period as f32).ln();
            -TIGHTNESS * deviation * deviation
        })
        .collect();

    let mut cumscore = vec![0.0f32; n];
    let mut backlink = vec![-1i32; n];

    for i in 0..n {
        let mut best_score = f32::NEG_INFINITY;
        let mut best_prev = -1i32;
        for (k, &cost) in costs.iter().enumerate() {
            let off = off_min + k;
            if off > i {
                break;
            }
            let score = cumscore[i - off] + cost;
            if score > best_score {
                best_score = score;
                best_prev = (i - off) as i32;
            }
        }

        if best_prev >= 0 && best_score > 0.0 {
            cumscore[i] = localscore[i] + best_score;
            backlink[i] = best_prev;
        } else {
            cumscore[i] = localscore[i];
            backlink[i] = -1;
        }
    }

    // Terminal beat: last local maximum of the cumulative score reaching
    // half the median peak level
    let maxima: Vec<usize> = (1..n - 1)
        .filter(|&i| cumscore[i] > cumscore[i - 1] && cumscore[i] > cumscore[i + 1])
        .collect();
    if maxima.is_empty() {
        return Vec::new();
    }

    let mut peak_scores: Vec<f32> = maxima.iter().map(|&i| cumscore[i]).collect();
    peak_scores.sort_by(f32::total_cmp);
    let threshold = 0.5 * peak_scores[peak_scores.len() / 2];

    let last = match maxima.iter().rev().find(|&&i| cumscore[i] >= threshold) {
        Some(&i) => i,
        None => return Vec::new(),
    };

    let mut beats = vec![last];
    let mut frame = last;
    while backlink[frame] >= 0 {
        frame = backlink[frame] as usize;
        beats.push(frame);
    }
    beats.reverse();
    beats
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_RATE: f32 = 44100.0 / 512.0;

    fn impulse_envelope(period: usize, n_frames: usize) -> OnsetEnvelope {
        let mut values = vec![0.0f32; n_frames];
        let mut i = 0;
        while i < n_frames {
            values[i] = 1.0;
            i += period;
        }
        OnsetEnvelope {
            values,
            frame_rate: FRAME_RATE,
        }
    }

    #[test]
    fn test_tracks_120_bpm_impulse_train() {
        // Lag 43 at 86.13 frames/sec is 120.2 BPM
        let envelope = impulse_envelope(43, 860);
        let result = track_beats(&envelope).expect("valid envelope");

        assert!(
            (result.bpm - 120.0).abs() < 2.0,
            "Expected about 120 BPM, got {:.2}",
            result.bpm
        );
        assert!(
            result.beats.len() >= 15 && result.beats.len() <= 25,
            "Expected about 20 beats in 10s, got {}",
            result.beats.len()
        );
    }

    #[test]
    fn test_beat_intervals_match_period() {
        let envelope = impulse_envelope(43, 860);
        let result = track_beats(&envelope).expect("valid envelope");

        for pair in result.beats.windows(2) {
            let interval = pair[1] - pair[0];
            assert!(
                interval > 0.4 && interval < 0.6,
                "Beat interval {:.3}s deviates from the 0.5s period",
                interval
            );
        }
    }

    #[test]
    fn test_silent_envelope_gives_zero_tempo() {
        let envelope = OnsetEnvelope {
            values: vec![0.0; 600],
            frame_rate: FRAME_RATE,
        };
        let result = track_beats(&envelope).expect("valid envelope");

        assert_eq!(result.bpm, 0.0);
        assert!(result.beats.is_empty());
    }

    #[test]
    fn test_constant_envelope_gives_zero_tempo() {
        let envelope = OnsetEnvelope {
            values: vec![1.0; 600],
            frame_rate: FRAME_RATE,
        };
        let result = track_beats(&envelope).expect("valid envelope");

        assert_eq!(result.bpm, 0.0, "Constant level has no beat periodicity");
        assert!(result.beats.is_empty());
    }

    #[test]
    fn test_tiny_envelope_is_degenerate_not_an_error() {
        let envelope = OnsetEnvelope {
            values: vec![1.0, 0.0, 1.0],
            frame_rate: FRAME_RATE,
        };
        let result = track_beats(&envelope).expect("valid envelope");
        assert_eq!(result.bpm, 0.0);
    }

    #[test]
    fn test_prior_resolves_octave_to_120() {
        // A 43-frame impulse train correlates at lags 43, 86, 129...
        // The prior should keep the 120 BPM reading over 60 BPM.
        let envelope = impulse_envelope(43, 860);
        let result = track_beats(&envelope).expect("valid envelope");
        assert!(result.bpm > 100.0, "Got subharmonic {:.2} BPM", result.bpm);
    }
}
