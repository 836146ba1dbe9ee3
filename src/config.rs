//! Configuration parameters for tempo detection

use serde::Deserialize;

/// History window smoothing level.
///
/// Controls how many seconds of recent audio are retained for estimation.
/// Longer windows give steadier readings at the cost of responsiveness to
/// tempo changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Smoothing {
    /// 5 second window: fast response, less stable
    Low,

    /// 10 second window: balanced (default)
    #[default]
    Medium,

    /// 15 second window: slow response, most stable
    High,
}

impl Smoothing {
    /// Maximum buffered audio duration for this level, in seconds
    pub fn history_seconds(self) -> f32 {
        match self {
            Smoothing::Low => 5.0,
            Smoothing::Medium => 10.0,
            Smoothing::High => 15.0,
        }
    }
}

/// Detector configuration parameters
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Minimum plausible BPM; fused candidates below this are discarded (default: 40.0)
    pub min_bpm: f32,

    /// Maximum plausible BPM; fused candidates above this are discarded (default: 200.0)
    pub max_bpm: f32,

    /// History window smoothing level (default: Medium)
    pub smoothing: Smoothing,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_bpm: 40.0,
            max_bpm: 200.0,
            smoothing: Smoothing::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DetectorConfig::default();
        assert_eq!(config.min_bpm, 40.0);
        assert_eq!(config.max_bpm, 200.0);
        assert_eq!(config.smoothing, Smoothing::Medium);
    }

    #[test]
    fn test_smoothing_window_seconds() {
        assert_eq!(Smoothing::Low.history_seconds(), 5.0);
        assert_eq!(Smoothing::Medium.history_seconds(), 10.0);
        assert_eq!(Smoothing::High.history_seconds(), 15.0);
    }

    #[test]
    fn test_smoothing_parses_lowercase() {
        let parsed: Smoothing = serde_json::from_str("\"low\"").expect("valid level");
        assert_eq!(parsed, Smoothing::Low);

        let parsed: Smoothing = serde_json::from_str("\"high\"").expect("valid level");
        assert_eq!(parsed, Smoothing::High);
    }

    #[test]
    fn test_smoothing_rejects_unknown_level() {
        let parsed = serde_json::from_str::<Smoothing>("\"extreme\"");
        assert!(parsed.is_err(), "Unknown smoothing level should not parse");
    }
}
