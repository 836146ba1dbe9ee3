//! Tempo candidate fusion and confidence scoring
//!
//! Combines the three estimator candidates into one tempo. Candidates
//! outside the plausible range (or non-finite) are discarded, never
//! clamped, and the survivors are averaged with fixed a-priori weights.
//! Discarding a method forfeits its weight: the remaining weights are not
//! renormalized, so the average stays a true weighted mean of survivors.
//!
//! Confidence reflects inter-method agreement: `100 - 3 * stddev` of the
//! surviving candidates, clamped to [0, 100]. With no survivors the
//! beat-tracking tempo is reported as-is with a fixed low confidence.

use crate::tempo::{Method, TempoEstimate};

/// Confidence assigned when every candidate fails range filtering
const FALLBACK_CONFIDENCE: f32 = 30.0;

/// Confidence penalty per BPM of inter-method standard deviation
const SPREAD_PENALTY: f32 = 3.0;

/// Raw tempo candidate from each method, regardless of validity
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct MethodBreakdown {
    /// Beat-tracking estimate in BPM
    pub onset: f32,

    /// Periodicity tempogram estimate in BPM
    pub tempogram: f32,

    /// Autocorrelation peak estimate in BPM
    pub autocorr: f32,
}

/// Fused tempo estimate with confidence and per-method breakdown
#[derive(Debug, Clone)]
pub struct FusionResult {
    /// Fused tempo in BPM
    pub bpm: f32,

    /// Inter-method agreement confidence in [0, 100]
    pub confidence: f32,

    /// Raw per-method candidates, including any that were discarded
    pub methods: MethodBreakdown,

    /// True when the autocorrelation method substituted the onset tempo
    pub autocorr_fell_back: bool,
}

/// Fuse the three method candidates into one confidence-scored tempo.
///
/// # Arguments
///
/// * `methods` - Raw candidate from each estimation method
/// * `min_bpm` - Lower bound of the plausible range
/// * `max_bpm` - Upper bound of the plausible range
/// * `autocorr_fell_back` - Whether the autocorrelation method substituted
///   the onset tempo
pub fn fuse(
    methods: MethodBreakdown,
    min_bpm: f32,
    max_bpm: f32,
    autocorr_fell_back: bool,
) -> FusionResult {
    let candidates = [
        TempoEstimate {
            method: Method::Onset,
            bpm: methods.onset,
        },
        TempoEstimate {
            method: Method::Tempogram,
            bpm: methods.tempogram,
        },
        TempoEstimate {
            method: Method::Autocorr,
            bpm: methods.autocorr,
        },
    ];

    let survivors: Vec<&TempoEstimate> = candidates
        .iter()
        .filter(|c| c.is_valid(min_bpm, max_bpm))
        .collect();

    for candidate in &candidates {
        if !candidate.is_valid(min_bpm, max_bpm) {
            log::debug!(
                "Discarding {} candidate {:.2} BPM (range {:.1} to {:.1})",
                candidate.method.as_str(),
                candidate.bpm,
                min_bpm,
                max_bpm
            );
        }
    }

    if survivors.is_empty() {
        log::warn!(
            "All tempo candidates outside {:.1} to {:.1} BPM, reporting onset tempo {:.2}",
            min_bpm,
            max_bpm,
            methods.onset
        );
        return FusionResult {
            bpm: methods.onset,
            confidence: FALLBACK_CONFIDENCE,
            methods,
            autocorr_fell_back,
        };
    }

    let weight_sum: f32 = survivors.iter().map(|c| c.method.weight()).sum();
    let bpm = survivors
        .iter()
        .map(|c| c.method.weight() * c.bpm)
        .sum::<f32>()
        / weight_sum;

    let spread = stddev(&survivors.iter().map(|c| c.bpm).collect::<Vec<f32>>());
    let confidence = (100.0 - SPREAD_PENALTY * spread).clamp(0.0, 100.0);

    log::debug!(
        "Fused {} candidates: {:.2} BPM, confidence {:.1} (spread {:.2})",
        survivors.len(),
        bpm,
        confidence,
        spread
    );

    FusionResult {
        bpm,
        confidence,
        methods,
        autocorr_fell_back,
    }
}

/// Population standard deviation
fn stddev(values: &[f32]) -> f32 {
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_valid_weighted_average() {
        let result = fuse(
            MethodBreakdown {
                onset: 120.0,
                tempogram: 121.0,
                autocorr: 119.0,
            },
            40.0,
            200.0,
            false,
        );

        // 0.4*120 + 0.3*121 + 0.3*119 over weight 1.0
        assert!((result.bpm - 120.0).abs() < 1e-4);
        assert!(result.confidence > 95.0 && result.confidence <= 100.0);
    }

    #[test]
    fn test_discarded_weight_is_not_redistributed() {
        let result = fuse(
            MethodBreakdown {
                onset: 120.0,
                tempogram: 500.0,
                autocorr: 122.0,
            },
            40.0,
            200.0,
            false,
        );

        // (0.4*120 + 0.3*122) / 0.7
        let expected = (0.4 * 120.0 + 0.3 * 122.0) / 0.7;
        assert!(
            (result.bpm - expected).abs() < 1e-3,
            "Expected {:.3}, got {:.3}",
            expected,
            result.bpm
        );
    }

    #[test]
    fn test_nonfinite_candidates_discarded() {
        let result = fuse(
            MethodBreakdown {
                onset: 118.0,
                tempogram: f32::INFINITY,
                autocorr: f32::NAN,
            },
            40.0,
            200.0,
            false,
        );

        assert_eq!(result.bpm, 118.0);
        assert_eq!(result.confidence, 100.0, "Single survivor has no spread");
    }

    #[test]
    fn test_no_survivors_reports_onset_with_fixed_confidence() {
        let result = fuse(
            MethodBreakdown {
                onset: 20.0,
                tempogram: 500.0,
                autocorr: 700.0,
            },
            40.0,
            200.0,
            false,
        );

        assert_eq!(result.bpm, 20.0, "Fallback reports onset tempo unclamped");
        assert_eq!(result.confidence, FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_confidence_floors_at_zero() {
        let result = fuse(
            MethodBreakdown {
                onset: 40.0,
                tempogram: 200.0,
                autocorr: 120.0,
            },
            40.0,
            200.0,
            false,
        );

        assert_eq!(result.confidence, 0.0, "Wild disagreement floors confidence");
    }

    #[test]
    fn test_breakdown_preserves_discarded_values() {
        let result = fuse(
            MethodBreakdown {
                onset: 120.0,
                tempogram: f32::INFINITY,
                autocorr: 121.0,
            },
            40.0,
            200.0,
            true,
        );

        assert!(result.methods.tempogram.is_infinite());
        assert!(result.autocorr_fell_back);
    }
}
