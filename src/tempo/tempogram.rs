//! Short-time periodicity tempogram
//!
//! Slices the onset envelope into overlapping windows, autocorrelates each,
//! and averages the normalized periodicity power per lag across time. The
//! dominant lag maps to BPM. Localizing the autocorrelation makes the
//! estimate robust to tempo drift within the analysis window.
//!
//! Lag zero is excluded from the search: after per-window normalization it
//! is identically 1 and would always win. A degenerate envelope yields
//! `f32::INFINITY`, which range filtering downstream discards.

use crate::error::DetectError;
use crate::features::envelope::OnsetEnvelope;
use crate::tempo::autocorr::autocorrelate;

/// Small epsilon for degenerate-signal checks
const EPSILON: f32 = 1e-10;

/// Tempogram window length in envelope frames
const WIN_LENGTH: usize = 384;

/// Estimate tempo from the time-averaged periodicity spectrum.
///
/// # Arguments
///
/// * `envelope` - Onset strength envelope
///
/// # Returns
///
/// The tempo of the dominant periodicity lag, or `f32::INFINITY` when the
/// envelope carries no periodicity energy.
///
/// # Errors
///
/// Returns `DetectError` if a window autocorrelation fails.
pub fn estimate_tempogram_tempo(envelope: &OnsetEnvelope) -> Result<f32, DetectError> {
    let values = &envelope.values;
    let n = values.len();
    if n < 2 {
        log::warn!("Envelope too short for a tempogram ({} frames)", n);
        return Ok(f32::INFINITY);
    }

    let win = WIN_LENGTH.min(n);
    let hop = (win / 2).max(1);
    log::debug!(
        "Tempogram: {} frames, window {} hop {}",
        n,
        win,
        hop
    );

    let hann: Vec<f32> = (0..win)
        .map(|i| {
            let t = 2.0 * std::f32::consts::PI * i as f32 / (win - 1) as f32;
            0.5 * (1.0 - t.cos())
        })
        .collect();

    let mut mean_power = vec![0.0f32; win];
    let mut n_windows = 0usize;
    let mut start = 0usize;
    while start + win <= n {
        let segment: Vec<f32> = values[start..start + win]
            .iter()
            .zip(hann.iter())
            .map(|(&v, &w)| v * w)
            .collect();

        let acf = autocorrelate(&segment)?;
        let zero = acf[0];
        if zero > EPSILON {
            for (total, value) in mean_power.iter_mut().zip(acf.iter()) {
                *total += value / zero;
            }
            n_windows += 1;
        }
        start += hop;
    }

    if n_windows == 0 {
        log::warn!("No tempogram window carried periodicity energy");
        return Ok(f32::INFINITY);
    }

    // Lag zero is the normalized self-correlation, always 1: skip it
    let mut best_lag = 0usize;
    let mut best_power = f32::NEG_INFINITY;
    for (lag, &power) in mean_power.iter().enumerate().skip(1) {
        if power > best_power {
            best_power = power;
            best_lag = lag;
        }
    }

    if best_lag == 0 || best_power < EPSILON {
        log::warn!("Flat periodicity spectrum, no tempogram tempo");
        return Ok(f32::INFINITY);
    }

    let bpm = 60.0 * envelope.frame_rate / best_lag as f32;
    log::debug!(
        "Tempogram: dominant lag {} over {} windows: {:.2} BPM",
        best_lag,
        n_windows,
        bpm
    );
    Ok(bpm)
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
    fn test_impulse_train_near_120_bpm() {
        let envelope = impulse_envelope(43, 860);
        let bpm = estimate_tempogram_tempo(&envelope).expect("valid envelope");

        assert!(
            (bpm - 120.0).abs() < 3.0,
            "Expected about 120 BPM, got {:.2}",
            bpm
        );
    }

    #[test]
    fn test_silent_envelope_gives_infinite_tempo() {
        let envelope = OnsetEnvelope {
            values: vec![0.0; 600],
            frame_rate: FRAME_RATE,
        };
        let bpm = estimate_tempogram_tempo(&envelope).expect("valid envelope");
        assert!(bpm.is_infinite(), "Silence should yield an implausible tempo");
    }

    #[test]
    fn test_constant_envelope_gives_implausible_tempo() {
        // A flat envelope correlates best at lag 1, far above any real tempo
        let envelope = OnsetEnvelope {
            values: vec![1.0; 600],
            frame_rate: FRAME_RATE,
        };
        let bpm = estimate_tempogram_tempo(&envelope).expect("valid envelope");
        assert!(bpm > 200.0, "Expected implausible tempo, got {:.2}", bpm);
    }

    #[test]
    fn test_short_envelope_gives_infinite_tempo() {
        let envelope = OnsetEnvelope {
            values: vec![1.0],
            frame_rate: FRAME_RATE,
        };
        let bpm = estimate_tempogram_tempo(&envelope).expect("valid envelope");
        assert!(bpm.is_infinite());
    }

    #[test]
    fn test_envelope_shorter_than_window_still_resolves() {
        // 200 frames is under the 384-frame window; the window shrinks
        let envelope = impulse_envelope(43, 200);
        let bpm = estimate_tempogram_tempo(&envelope).expect("valid envelope");
        assert!(
            (bpm - 120.0).abs() < 5.0,
            "Expected about 120 BPM, got {:.2}",
            bpm
        );
    }
}
