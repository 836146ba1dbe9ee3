//! Error types for tempo detection

use std::fmt;

/// Errors that can occur during tempo detection
#[derive(Debug, Clone, PartialEq)]
pub enum DetectError {
    /// Invalid input parameters or malformed audio data
    InvalidInput(String),

    /// Error during pipeline processing
    ProcessingError(String),

    /// Numerical error (degenerate signal, non-finite intermediate)
    NumericalError(String),
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            DetectError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
            DetectError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
        }
    }
}

impl std::error::Error for DetectError {}
