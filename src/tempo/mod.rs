//! Tempo estimation
//!
//! Three estimators read tempo from a shared onset envelope:
//! - Beat tracking (prior-weighted periodicity plus dynamic programming)
//! - Short-time periodicity tempogram
//! - Autocorrelation peak picking
//!
//! Their candidates are fused into one confidence-scored value, which the
//! stabilizer smooths over successive detection calls.

pub mod autocorr;
pub mod beat_track;
pub mod fusion;
pub mod stabilizer;
pub mod tempogram;

/// Estimation method tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Beat-tracking estimator
    Onset,

    /// Short-time periodicity tempogram
    Tempogram,

    /// Autocorrelation peak estimator
    Autocorr,
}

impl Method {
    /// Fixed a-priori fusion weight for this method.
    ///
    /// The beat tracker gets the largest share; the weights are not
    /// renormalized when a method's candidate is discarded.
    pub fn weight(self) -> f32 {
        match self {
            Method::Onset => 0.4,
            Method::Tempogram => 0.3,
            Method::Autocorr => 0.3,
        }
    }

    /// Method name as used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Onset => "onset",
            Method::Tempogram => "tempogram",
            Method::Autocorr => "autocorr",
        }
    }
}

/// A single method's tempo candidate before fusion
#[derive(Debug, Clone, Copy)]
pub struct TempoEstimate {
    /// Estimation method that produced this candidate
    pub method: Method,

    /// Estimated tempo in BPM; may be non-finite for degenerate input
    pub bpm: f32,
}

impl TempoEstimate {
    /// True when the candidate is finite and inside the plausible range
    pub fn is_valid(&self, min_bpm: f32, max_bpm: f32) -> bool {
        self.bpm.is_finite() && self.bpm >= min_bpm && self.bpm <= max_bpm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let total = Method::Onset.weight() + Method::Tempogram.weight() + Method::Autocorr.weight();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_validity_range_checks() {
        let estimate = TempoEstimate {
            method: Method::Onset,
            bpm: 120.0,
        };
        assert!(estimate.is_valid(40.0, 200.0));
        assert!(!estimate.is_valid(150.0, 200.0));

        let infinite = TempoEstimate {
            method: Method::Tempogram,
            bpm: f32::INFINITY,
        };
        assert!(!infinite.is_valid(40.0, 200.0));

        let nan = TempoEstimate {
            method: Method::Autocorr,
            bpm: f32::NAN,
        };
        assert!(!nan.is_valid(40.0, 200.0));
    }
}
