//! Sliding window audio accumulation
//!
//! Incoming chunks are buffered oldest first and trimmed from the front once
//! the total buffered duration exceeds the configured window. Chunks are
//! never split: a single chunk longer than the window is kept whole until a
//! newer chunk displaces it.

use std::collections::VecDeque;

use crate::error::DetectError;

/// A chunk of mono audio samples at a known sample rate
#[derive(Debug, Clone)]
pub struct AudioChunk {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioChunk {
    /// Create a chunk from raw samples.
    ///
    /// # Errors
    ///
    /// Returns `DetectError::InvalidInput` if:
    /// - `samples` is empty
    /// - `sample_rate` is zero
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, DetectError> {
        if samples.is_empty() {
            return Err(DetectError::InvalidInput("empty audio chunk".to_string()));
        }
        if sample_rate == 0 {
            return Err(DetectError::InvalidInput(
                "sample rate must be positive".to_string(),
            ));
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Samples in this chunk
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Chunk duration in seconds
    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Bounded sliding window of audio chunks, oldest first
#[derive(Debug)]
pub struct HistoryBuffer {
    chunks: VecDeque<AudioChunk>,
    max_seconds: f32,
}

impl HistoryBuffer {
    /// Create an empty buffer holding at most `max_seconds` of audio
    pub fn new(max_seconds: f32) -> Self {
        Self {
            chunks: VecDeque::new(),
            max_seconds,
        }
    }

    /// Append a chunk, then trim oldest chunks while the buffered duration
    /// exceeds the window and more than one chunk remains.
    pub fn append(&mut self, chunk: AudioChunk) {
        self.chunks.push_back(chunk);
        self.trim();
    }

    /// Update the window length. Applies at the next append.
    pub fn set_max_seconds(&mut self, max_seconds: f32) {
        self.max_seconds = max_seconds;
    }

    /// Current window length in seconds
    pub fn max_seconds(&self) -> f32 {
        self.max_seconds
    }

    /// Total buffered duration in seconds
    pub fn total_duration(&self) -> f32 {
        self.chunks.iter().map(|c| c.duration_seconds()).sum()
    }

    /// Number of buffered chunks
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// True when no chunks are buffered
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Sample rate of the most recent chunk, or `None` when empty.
    ///
    /// The latest rate governs analysis of the whole window; callers feeding
    /// mixed rates get an approximation for older chunks.
    pub fn sample_rate(&self) -> Option<u32> {
        self.chunks.back().map(|c| c.sample_rate())
    }

    /// Concatenate all buffered chunks into one waveform, oldest first
    pub fn concatenated(&self) -> Vec<f32> {
        let total: usize = self.chunks.iter().map(|c| c.samples().len()).sum();
        let mut waveform = Vec::with_capacity(total);
        for chunk in &self.chunks {
            waveform.extend_from_slice(chunk.samples());
        }
        waveform
    }

    /// Drop all buffered chunks
    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    fn trim(&mut self) {
        while self.total_duration() > self.max_seconds && self.chunks.len() > 1 {
            if let Some(dropped) = self.chunks.pop_front() {
                log::debug!(
                    "Trimmed {:.2}s chunk from history ({} chunks, {:.2}s remain)",
                    dropped.duration_seconds(),
                    self.chunks.len(),
                    self.total_duration()
                );
            }
        }
    }
}
