//! Feature extraction modules
//!
//! Low-level signal features shared by the tempo estimators:
//! - Onset strength envelope (STFT, mel filterbank, log-compressed flux)
//! - Constrained peak picking

pub mod envelope;
pub mod peaks;
