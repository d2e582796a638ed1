//! # rf-bench
//!
//! Performance benchmarks for the RF streaming crates.
//!
//! ## Benchmark Categories
//!
//! - **Buffer Benchmarks**: storage swap vs sample copy, chunked accumulation
//! - **Measurement Benchmarks**: scope overhead of both measurement variants
//! - **Bridge Benchmarks**: hardware → worker handoff round trip
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p rf-bench
//!
//! # Run specific benchmark
//! cargo bench -p rf-bench -- swap
//!
//! # Live bridge load profile
//! cargo run -p rf-bench --release --example bridge_profile -- --work-us 50
//! ```

pub mod generators;
pub mod utils;

pub use generators::*;
pub use utils::*;
