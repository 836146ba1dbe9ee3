//! # Tempometer
//!
//! Streaming tempo (BPM) detection for short audio chunks: chunks accumulate
//! in a sliding window, three estimators read tempo from a shared
//! onset-strength envelope, and the fused result is smoothed into a stable,
//! confidence-scored reading.
//!
//! ## Features
//!
//! - **Multi-method estimation**: beat tracking, periodicity tempogram, and
//!   autocorrelation peaks over one onset envelope
//! - **Weighted fusion**: fixed per-method weights with agreement-based
//!   confidence scoring
//! - **Temporal smoothing**: median over recent readings plus a stability flag
//! - **HTTP interface**: JSON endpoints for chunk upload, reset, and
//!   introspection (see [`server`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use tempometer::{AudioChunk, Detection, Detector, DetectorConfig};
//!
//! let mut detector = Detector::new(DetectorConfig::default());
//!
//! // Feed one-second chunks as they arrive
//! let chunk = AudioChunk::new(vec![0.0f32; 44100], 44100)?;
//! match detector.detect(chunk) {
//!     Detection::Collecting { .. } => println!("warming up"),
//!     Detection::Estimated(reading) => {
//!         println!("BPM: {:.1} (confidence: {:.0})", reading.bpm, reading.confidence);
//!     }
//!     Detection::Failed { message, .. } => println!("estimation failed: {}", message),
//! }
//! # Ok::<(), tempometer::DetectError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! chunk -> HistoryBuffer -> onset envelope -> { beat tracking, tempogram,
//! autocorrelation } -> fusion -> stabilizer -> sanitized reading
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod config;
pub mod detector;
pub mod error;
pub mod features;
pub mod server;
pub mod tempo;

// Re-export main types
pub use buffer::{AudioChunk, HistoryBuffer};
pub use config::{DetectorConfig, Smoothing};
pub use detector::{Detection, Detector, DetectorStatus, TempoReading, MIN_DETECT_SECONDS};
pub use error::DetectError;
pub use tempo::fusion::{FusionResult, MethodBreakdown};
