//! Constrained peak picking
//!
//! Selects strict interior local maxima of a signal subject to height,
//! spacing, and prominence constraints. Used on autocorrelation functions,
//! where excluding the endpoints keeps the lag-zero self-correlation out of
//! the candidate set.
//!
//! # Algorithm
//!
//! 1. Collect strict interior local maxima
//! 2. Discard peaks below the height threshold
//! 3. Enforce minimum spacing, keeping taller peaks first
//! 4. Discard peaks whose prominence is below the threshold
//!
//! Prominence is the peak height above the higher of its two bases, where
//! each base is the minimum between the peak and the nearest taller value
//! (or the signal edge) on that side.

/// Find peaks subject to height, spacing, and prominence constraints.
///
/// # Arguments
///
/// * `signal` - Input signal
/// * `min_height` - Minimum peak value
/// * `min_distance` - Minimum index spacing between kept peaks
/// * `min_prominence` - Minimum peak prominence
///
/// # Returns
///
/// `(index, value)` pairs sorted by value, tallest first.
pub fn find_peaks(
    signal: &[f32],
    min_height: f32,
    min_distance: usize,
    min_prominence: f32,
) -> Vec<(usize, f32)> {
    if signal.len() < 3 {
        return Vec::new();
    }

    let mut peaks: Vec<(usize, f32)> = Vec::new();
    for i in 1..signal.len() - 1 {
        if signal[i] > signal[i - 1] && signal[i] > signal[i + 1] && signal[i] >= min_height {
            peaks.push((i, signal[i]));
        }
    }

    // Spacing filter: tallest first, drop anything too close to a kept peak
    peaks.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut kept: Vec<(usize, f32)> = Vec::new();
    for &(index, value) in &peaks {
        let too_close = kept
            .iter()
            .any(|&(kept_index, _)| index.abs_diff(kept_index) < min_distance);
        if !too_close {
            kept.push((index, value));
        }
    }

    kept.retain(|&(index, _)| prominence(signal, index) >= min_prominence);
    kept.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    kept
}

/// Peak prominence: height above the higher of the two surrounding bases
fn prominence(signal: &[f32], peak: usize) -> f32 {
    let value = signal[peak];

    let mut left_base = value;
    for &sample in signal[..peak].iter().rev() {
        if sample > value {
            break;
        }
        if sample < left_base {
            left_base = sample;
        }
    }

    let mut right_base = value;
    for &sample in &signal[peak + 1..] {
        if sample > value {
            break;
        }
        if sample < right_base {
            right_base = sample;
        }
    }

    value - left_base.max(right_base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_single_peak() {
        let signal = vec![0.0, 1.0, 3.0, 1.0, 0.0];
        let peaks = find_peaks(&signal, 0.0, 1, 0.0);

        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0], (2, 3.0));
    }

    #[test]
    fn test_endpoints_are_not_peaks() {
        // Largest value sits at index 0, like lag zero of an autocorrelation
        let signal = vec![10.0, 2.0, 1.0, 4.0, 1.0];
        let peaks = find_peaks(&signal, 0.0, 1, 0.0);

        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].0, 3, "Endpoint maxima must be excluded");
    }

    #[test]
    fn test_height_threshold_filters() {
        let signal = vec![0.0, 0.5, 0.0, 2.0, 0.0, 0.8, 0.0];
        let peaks = find_peaks(&signal, 1.0, 1, 0.0);

        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].0, 3);
    }

    #[test]
    fn test_distance_keeps_taller_peak() {
        let signal = vec![0.0, 2.0, 1.0, 3.0, 0.0, 0.0, 0.0, 1.5, 0.0];
        let peaks = find_peaks(&signal, 0.0, 4, 0.0);

        let indices: Vec<usize> = peaks.iter().map(|&(i, _)| i).collect();
        assert!(indices.contains(&3), "Tallest peak should survive spacing");
        assert!(
            !indices.contains(&1),
            "Close shorter peak should be dropped"
        );
        assert!(indices.contains(&7));
    }

    #[test]
    fn test_prominence_rejects_shoulder_peak() {
        // Small bump riding on the flank of a large peak
        let signal = vec![0.0, 1.0, 5.0, 4.5, 4.8, 1.0, 0.0];
        let peaks = find_peaks(&signal, 0.0, 1, 1.0);

        let indices: Vec<usize> = peaks.iter().map(|&(i, _)| i).collect();
        assert!(indices.contains(&2));
        assert!(
            !indices.contains(&4),
            "Shoulder bump has prominence 0.3 and must be rejected"
        );
    }

    #[test]
    fn test_results_sorted_tallest_first() {
        let signal = vec![0.0, 1.0, 0.0, 3.0, 0.0, 2.0, 0.0];
        let peaks = find_peaks(&signal, 0.0, 1, 0.0);

        assert_eq!(peaks.len(), 3);
        assert!(peaks[0].1 >= peaks[1].1 && peaks[1].1 >= peaks[2].1);
        assert_eq!(peaks[0].0, 3);
    }

    #[test]
    fn test_short_signal_has_no_peaks() {
        assert!(find_peaks(&[1.0, 2.0], 0.0, 1, 0.0).is_empty());
        assert!(find_peaks(&[], 0.0, 1, 0.0).is_empty());
    }

    #[test]
    fn test_plateau_is_not_a_strict_peak() {
        let signal = vec![0.0, 2.0, 2.0, 0.0];
        let peaks = find_peaks(&signal, 0.0, 1, 0.0);
        assert!(peaks.is_empty(), "Plateaus are not strict maxima");
    }
}
