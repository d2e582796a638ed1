//! rf-stream: Real-time sample streaming core
//!
//! Bridges a fixed-blocksize hardware thread to user processing code and
//! measures the cost of that processing.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐     ┌────────────────────────┐     ┌───────────────┐
//! │ Hardware       │────▶│ ThreadedCallbackBridge │────▶│ User callback │
//! │ engine thread  │     │                        │     │ (worker       │
//! │                │◀────│ - swap buffers         │◀────│  thread)      │
//! │ - rx chunks    │     │ - SyncPoint handshake  │     │               │
//! │ - tx drain     │     │ - deadline accounting  │     │               │
//! └────────────────┘     └───────────┬────────────┘     └───────────────┘
//!                                    │ scope per block
//!                        ┌───────────▼────────────┐
//!                        │ ProcessingTime-        │──▶ LoadReport callback
//!                        │ Measurement (poller)   │
//!                        └────────────────────────┘
//! ```

mod bridge;
mod callback;
mod config;
mod error;
mod measurement;
mod sim;
mod sync_point;
pub mod thread_priority;

pub use bridge::*;
pub use callback::*;
pub use config::*;
pub use error::*;
pub use measurement::*;
pub use sim::*;
pub use sync_point::*;

pub use rf_core::{BufferShape, IQ_ZERO, IqSample, SampleBuffer};
