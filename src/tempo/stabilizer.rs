//! Temporal smoothing of fused tempo readings
//!
//! Keeps a short history of fused values and reports their median once
//! enough exist, which suppresses single-call outliers. A reading is marked
//! stable when the recent history has converged.

use std::collections::VecDeque;

/// Maximum number of fused readings retained
const HISTORY_CAPACITY: usize = 10;

/// Minimum history length before median smoothing applies
const MEDIAN_MIN_LEN: usize = 3;

/// Number of recent readings examined for stability
const STABILITY_SPAN: usize = 5;

/// Maximum standard deviation over the stability span, in BPM
const STABILITY_STD_BPM: f32 = 2.0;

/// Smoothed tempo with stability classification
#[derive(Debug, Clone, Copy)]
pub struct SmoothedTempo {
    /// Reported tempo: the median of recent fused values once enough exist,
    /// otherwise the raw fused value
    pub bpm: f32,

    /// True when the recent readings have converged
    pub stable: bool,
}

/// Bounded FIFO of fused BPM readings with median smoothing
#[derive(Debug, Default)]
pub struct Stabilizer {
    history: VecDeque<f32>,
}

impl Stabilizer {
    /// Create an empty stabilizer
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Record a fused reading and return the smoothed result
    pub fn push(&mut self, fused_bpm: f32) -> SmoothedTempo {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(fused_bpm);

        let bpm = if self.history.len() >= MEDIAN_MIN_LEN {
            median(&self.history)
        } else {
            fused_bpm
        };

        let stable = self.history.len() >= STABILITY_SPAN
            && recent_stddev(&self.history, STABILITY_SPAN) < STABILITY_STD_BPM;

        log::debug!(
            "Stabilizer: raw {:.2} -> {:.2} BPM over {} readings (stable: {})",
            fused_bpm,
            bpm,
            self.history.len(),
            stable
        );

        SmoothedTempo { bpm, stable }
    }

    /// Number of readings currently held
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// True when no readings are held
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Drop all readings
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

/// True median: even-length histories average the two middle values.
/// `total_cmp` keeps the sort deterministic even for non-finite readings.
fn median(history: &VecDeque<f32>) -> f32 {
    let mut sorted: Vec<f32> = history.iter().copied().collect();
    sorted.sort_by(f32::total_cmp);

    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Population standard deviation of the most recent `span` readings
fn recent_stddev(history: &VecDeque<f32>, span: usize) -> f32 {
    let recent: Vec<f32> = history.iter().rev().take(span).copied().collect();
    let n = recent.len() as f32;
    let mean = recent.iter().sum::<f32>() / n;
    let variance = recent.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    variance.sqrt()
}
