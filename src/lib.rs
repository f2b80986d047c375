//! tracerdiff - differential harness for trace client tracers
//!
//! Fetches the same blocks from two trace clients, one running the full call
//! tracer and one running the lean tracer, and fails on the first block whose
//! operations differ. Request latency of both clients is tracked alongside.

/// Rosetta-style block model
pub mod types;

/// Structural comparison of blocks and operations
pub mod diff;

/// Latency accounting
pub mod timing;

/// The block comparison loop
pub mod comparator;

/// Trace client contract and the node-backed implementation
pub mod client;

pub mod config;
pub mod profiling;

pub use client::{BlockSource, ClientError};
pub use comparator::{Comparator, ComparatorError};
pub use diff::{CompareMode, Mismatch};
