//! Detection orchestration
//!
//! Owns the audio window and runs the full pipeline per call: envelope
//! extraction, three tempo estimators, fusion, temporal smoothing, and a
//! final sanitize pass that guarantees finite numbers in every result.
//!
//! Estimation faults are recoverable: a failed call reports the fault and
//! leaves the reading history and last tempo untouched, and the next call
//! retries over the same buffered audio plus whatever arrived since.

use crate::buffer::{AudioChunk, HistoryBuffer};
use crate::config::DetectorConfig;
use crate::error::DetectError;
use crate::features::envelope::onset_envelope;
use crate::tempo::autocorr::estimate_autocorr_tempo;
use crate::tempo::beat_track::track_beats;
use crate::tempo::fusion::{fuse, FusionResult, MethodBreakdown};
use crate::tempo::stabilizer::{SmoothedTempo, Stabilizer};
use crate::tempo::tempogram::estimate_tempogram_tempo;

/// Minimum buffered audio before estimation runs, in seconds
pub const MIN_DETECT_SECONDS: f32 = 3.0;

/// Replacement for non-finite tempo values in sanitized results
const TEMPO_DEFAULT: f32 = 120.0;

/// Outcome of a single detection call
#[derive(Debug, Clone)]
pub enum Detection {
    /// Not enough audio buffered yet
    Collecting {
        /// Last reported tempo, 0.0 before the first successful estimate
        bpm: f32,
    },

    /// A full pipeline pass completed
    Estimated(TempoReading),

    /// The pipeline failed; detector state was not advanced
    Failed {
        /// Last reported tempo, 0.0 before the first successful estimate
        bpm: f32,

        /// Diagnostic message
        message: String,
    },
}

/// Sanitized result of a successful detection call
#[derive(Debug, Clone, serde::Serialize)]
pub struct TempoReading {
    /// Smoothed tempo in BPM, finite and non-negative
    pub bpm: f32,

    /// Inter-method agreement confidence in [0, 100]
    pub confidence: f32,

    /// True when recent readings have converged
    pub stable: bool,

    /// Per-method tempo breakdown, sanitized
    pub methods: MethodBreakdown,

    /// True when the autocorrelation method substituted the onset tempo
    pub autocorr_fell_back: bool,

    /// Buffered audio duration in seconds
    pub audio_duration: f32,
}

/// Introspection snapshot of detector state
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct DetectorStatus {
    /// Number of buffered audio chunks
    pub audio_chunks: usize,

    /// Fused readings currently held by the stabilizer
    pub bpm_history_size: usize,

    /// Last reported tempo, `None` before the first successful estimate
    pub last_bpm: Option<f32>,

    /// Current history window in seconds
    pub max_history_seconds: f32,
}

/// Streaming tempo detector
#[derive(Debug)]
pub struct Detector {
    config: DetectorConfig,
    buffer: HistoryBuffer,
    stabilizer: Stabilizer,
    last_bpm: Option<f32>,
}

impl Detector {
    /// Create a detector with the given configuration
    pub fn new(config: DetectorConfig) -> Self {
        let buffer = HistoryBuffer::new(config.smoothing.history_seconds());
        Self {
            config,
            buffer,
            stabilizer: Stabilizer::new(),
            last_bpm: None,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Replace the configuration.
    ///
    /// The new window length applies at the next append; buffered audio and
    /// reading history are kept.
    pub fn set_config(&mut self, config: DetectorConfig) {
        self.buffer
            .set_max_seconds(config.smoothing.history_seconds());
        self.config = config;
    }

    /// Append a chunk and run a detection pass over the buffered window
    pub fn detect(&mut self, chunk: AudioChunk) -> Detection {
        log::debug!(
            "Detect: {} samples at {} Hz",
            chunk.samples().len(),
            chunk.sample_rate()
        );
        self.buffer.append(chunk);

        let duration = self.buffer.total_duration();
        if duration < MIN_DETECT_SECONDS {
            log::debug!(
                "Collecting audio: {:.2}s of {:.1}s minimum",
                duration,
                MIN_DETECT_SECONDS
            );
            return Detection::Collecting {
                bpm: self.last_bpm.unwrap_or(0.0),
            };
        }

        match self.run_pipeline() {
            Ok(fusion) => {
                let smoothed = self.stabilizer.push(fusion.bpm);
                let reading = sanitize(&fusion, smoothed, duration);
                self.last_bpm = Some(reading.bpm);
                Detection::Estimated(reading)
            }
            Err(error) => {
                log::warn!("Estimation failed: {}", error);
                Detection::Failed {
                    bpm: self.last_bpm.unwrap_or(0.0),
                    message: error.to_string(),
                }
            }
        }
    }

    /// Clear buffered audio and reading history. Configuration is kept.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.stabilizer.clear();
        self.last_bpm = None;
        log::debug!("Detector state cleared");
    }

    /// Snapshot of the current detector state
    pub fn status(&self) -> DetectorStatus {
        DetectorStatus {
            audio_chunks: self.buffer.chunk_count(),
            bpm_history_size: self.stabilizer.len(),
            last_bpm: self.last_bpm,
            max_history_seconds: self.buffer.max_seconds(),
        }
    }

    /// One full estimation pass over the buffered window.
    ///
    /// Pure with respect to detector state: history updates happen only
    /// after this returns successfully.
    fn run_pipeline(&self) -> Result<FusionResult, DetectError> {
        let sample_rate = self
            .buffer
            .sample_rate()
            .ok_or_else(|| DetectError::ProcessingError("no audio buffered".to_string()))?;
        let waveform = self.buffer.concatenated();

        let envelope = onset_envelope(&waveform, sample_rate)?;
        let beat = track_beats(&envelope)?;
        let tempogram_bpm = estimate_tempogram_tempo(&envelope)?;
        let autocorr = estimate_autocorr_tempo(&envelope, sample_rate, beat.bpm)?;

        log::debug!(
            "Method tempos: onset {:.2} ({} beats), tempogram {:.2}, autocorr {:.2}",
            beat.bpm,
            beat.beats.len(),
            tempogram_bpm,
            autocorr.bpm
        );

        Ok(fuse(
            MethodBreakdown {
                onset: beat.bpm,
                tempogram: tempogram_bpm,
                autocorr: autocorr.bpm,
            },
            self.config.min_bpm,
            self.config.max_bpm,
            autocorr.fell_back,
        ))
    }
}

/// Force every numeric field to a finite, bounded value
fn sanitize(fusion: &FusionResult, smoothed: SmoothedTempo, audio_duration: f32) -> TempoReading {
    let finite = [
        smoothed.bpm,
        fusion.confidence,
        fusion.methods.onset,
        fusion.methods.tempogram,
        fusion.methods.autocorr,
    ]
    .iter()
    .all(|v| v.is_finite());
    if !finite {
        log::warn!(
            "Replacing non-finite result values (bpm {}, confidence {}, methods {} / {} / {})",
            smoothed.bpm,
            fusion.confidence,
            fusion.methods.onset,
            fusion.methods.tempogram,
            fusion.methods.autocorr
        );
    }

    TempoReading {
        bpm: finite_or(smoothed.bpm, TEMPO_DEFAULT).max(0.0),
        confidence: finite_or(fusion.confidence, 0.0).clamp(0.0, 100.0),
        stable: smoothed.stable,
        methods: MethodBreakdown {
            onset: finite_or(fusion.methods.onset, TEMPO_DEFAULT),
            tempogram: finite_or(fusion.methods.tempogram, TEMPO_DEFAULT),
            autocorr: finite_or(fusion.methods.autocorr, TEMPO_DEFAULT),
        },
        autocorr_fell_back: fusion.autocorr_fell_back,
        audio_duration,
    }
}

fn finite_or(value: f32, default: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Smoothing;

    const SAMPLE_RATE: u32 = 44100;

    fn click_track(bpm: f32, seconds: f32) -> Vec<f32> {
        let total = (seconds * SAMPLE_RATE as f32) as usize;
        let period = (60.0 / bpm * SAMPLE_RATE as f32) as usize;
        let click_len = SAMPLE_RATE as usize / 100;
        let mut samples = vec![0.0f32; total];

        let mut start = 0;
        while start < total {
            let end = (start + click_len).min(total);
            for (i, sample) in samples[start..end].iter_mut().enumerate() {
                let t = i as f32 / SAMPLE_RATE as f32;
                *sample = 0.8 * (2.0 * std::f32::consts::PI * 1000.0 * t).sin();
            }
            start += period;
        }
        samples
    }

    fn second_chunks(samples: &[f32]) -> Vec<AudioChunk> {
        samples
            .chunks(SAMPLE_RATE as usize)
            .map(|chunk| AudioChunk::new(chunk.to_vec(), SAMPLE_RATE).expect("valid chunk"))
            .collect()
    }

    #[test]
    fn test_collecting_under_three_seconds() {
        let mut detector = Detector::new(DetectorConfig::default());

        for chunk in second_chunks(&click_track(120.0, 2.0)) {
            match detector.detect(chunk) {
                Detection::Collecting { bpm } => assert_eq!(bpm, 0.0),
                other => panic!("Expected Collecting, got {:?}", other),
            }
        }
        assert_eq!(detector.status().last_bpm, None);
    }

    #[test]
    fn test_estimates_once_three_seconds_buffered() {
        let mut detector = Detector::new(DetectorConfig::default());
        let chunks = second_chunks(&click_track(120.0, 3.0));

        let mut last = None;
        for chunk in chunks {
            last = Some(detector.detect(chunk));
        }

        match last.expect("three chunks fed") {
            Detection::Estimated(reading) => {
                assert!(
                    (reading.bpm - 120.0).abs() < 10.0,
                    "Expected near 120 BPM, got {:.2}",
                    reading.bpm
                );
                assert!((reading.audio_duration - 3.0).abs() < 0.01);
                assert!(reading.methods.onset.is_finite());
                assert!(reading.methods.tempogram.is_finite());
                assert!(reading.methods.autocorr.is_finite());
            }
            other => panic!("Expected Estimated, got {:?}", other),
        }
    }

    #[test]
    fn test_silence_is_sanitized_low_confidence() {
        let mut detector = Detector::new(DetectorConfig::default());
        let silence = vec![0.0f32; 5 * SAMPLE_RATE as usize];

        for (i, chunk) in second_chunks(&silence).into_iter().enumerate() {
            match detector.detect(chunk) {
                Detection::Collecting { .. } => {
                    assert!(i < 2, "Call {} should estimate", i + 1)
                }
                Detection::Estimated(reading) => {
                    assert!(i >= 2);
                    assert_eq!(reading.confidence, 30.0);
                    assert_eq!(reading.bpm, 0.0);
                    assert!(!reading.stable);
                    assert!(reading.autocorr_fell_back);
                    assert_eq!(
                        reading.methods.tempogram, 120.0,
                        "Infinite tempogram value must be sanitized"
                    );
                }
                Detection::Failed { message, .. } => {
                    panic!("Silence must not fail estimation: {}", message)
                }
            }
        }
    }

    #[test]
    fn test_last_bpm_tracks_reported_value() {
        let mut detector = Detector::new(DetectorConfig::default());

        let mut reported = None;
        for chunk in second_chunks(&click_track(120.0, 4.0)) {
            if let Detection::Estimated(reading) = detector.detect(chunk) {
                reported = Some(reading.bpm);
            }
        }

        assert_eq!(detector.status().last_bpm, reported);
    }

    #[test]
    fn test_reset_clears_state_keeps_config() {
        let config = DetectorConfig {
            min_bpm: 60.0,
            max_bpm: 180.0,
            smoothing: Smoothing::High,
        };
        let mut detector = Detector::new(config);

        for chunk in second_chunks(&click_track(120.0, 4.0)) {
            detector.detect(chunk);
        }
        detector.reset();

        let status = detector.status();
        assert_eq!(status.audio_chunks, 0);
        assert_eq!(status.bpm_history_size, 0);
        assert_eq!(status.last_bpm, None);
        assert_eq!(status.max_history_seconds, 15.0, "Config must survive reset");
        assert_eq!(detector.config().min_bpm, 60.0);

        // Post-reset call starts collecting from scratch
        let chunk = AudioChunk::new(click_track(120.0, 1.0), SAMPLE_RATE).expect("valid chunk");
        match detector.detect(chunk) {
            Detection::Collecting { bpm } => assert_eq!(bpm, 0.0),
            other => panic!("Expected Collecting, got {:?}", other),
        }
    }

    #[test]
    fn test_status_reflects_window_length() {
        let detector = Detector::new(DetectorConfig {
            smoothing: Smoothing::Low,
            ..DetectorConfig::default()
        });
        assert_eq!(detector.status().max_history_seconds, 5.0);
    }
}
