//! Error types for the sample layer

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RfError {
    #[error("Invalid buffer shape: {num_channels} channels x {capacity} samples")]
    InvalidShape { num_channels: usize, capacity: usize },

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),
}

/// Result type alias
pub type RfResult<T> = Result<T, RfError>;
