//! Streaming error types

use std::time::Duration;

use rf_core::RfError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("Invalid block size: {0}")]
    InvalidBlockSize(usize),

    #[error("No active rx or tx channels")]
    NoActiveChannels,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Streaming already prepared")]
    AlreadyStreaming,

    #[error("Not streaming")]
    NotStreaming,

    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),

    #[error("Worker thread did not start within {0:?}")]
    StartupTimeout(Duration),

    #[error("{thread} thread did not exit within {timeout:?}")]
    ShutdownTimeout {
        thread: &'static str,
        timeout: Duration,
    },

    #[error("Sample layer error: {0}")]
    Core(#[from] RfError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type StreamResult<T> = Result<T, StreamError>;

/// Validate a sample rate for a streaming session
pub(crate) fn check_sample_rate(sample_rate: f64) -> StreamResult<f64> {
    rf_core::check_sample_rate(sample_rate).map_err(|_| StreamError::InvalidSampleRate(sample_rate))
}
