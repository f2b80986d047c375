//! Block comparison loop
//!
//! Walks block heights downwards from a starting point, fetching each block
//! from both clients in turn, timing the requests and comparing the results.
//! Every error ends the run: the caller gets it back and decides how to exit.

use crate::client::{BlockSource, ClientError};
use crate::diff::{compare_blocks, CompareMode, Mismatch};
use crate::timing::{ClientSlot, LatencySample, RunState};
use crate::types::PartialBlockIdentifier;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// Number of blocks checked when no bound is given
pub const DEFAULT_ITERATIONS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ComparatorError {
    #[error("Failed to get block {height} with client {}: {error}", .client.label())]
    Client {
        client: ClientSlot,
        height: u64,
        error: ClientError,
    },

    #[error("block {height}: {mismatch}")]
    Mismatch { height: u64, mismatch: Mismatch },

    #[error("cannot check below block 0 ({completed} of {requested} blocks checked)")]
    CursorExhausted { completed: u64, requested: u64 },

    #[error("failed to write progress: {0}")]
    Output(#[from] std::io::Error),
}

/// Outcome of one successfully compared block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReport {
    pub height: u64,
    pub sample: LatencySample,
    pub transactions: usize,
    pub operations: usize,
}

/// Totals of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub blocks: u64,
    pub total1: Duration,
    pub total2: Duration,
}

/// Compares two block sources block by block, writing progress to `out`
pub struct Comparator<A, B, W> {
    first: A,
    second: B,
    mode: CompareMode,
    state: RunState,
    out: W,
}

impl<A, B, W> Comparator<A, B, W>
where
    A: BlockSource,
    B: BlockSource,
    W: Write,
{
    pub fn new(first: A, second: B, start_block: u64, out: W) -> Self {
        Self {
            first,
            second,
            mode: CompareMode::default(),
            state: RunState::new(start_block),
            out,
        }
    }

    pub fn with_mode(mut self, mode: CompareMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Fetch, time and compare the block at the cursor
    pub async fn check_block(&mut self) -> Result<BlockReport, ComparatorError> {
        let height = self.state.cursor;
        writeln!(self.out, "Checking block: {}", height)?;
        let id = PartialBlockIdentifier::by_index(height);

        let start = Instant::now();
        let b1 = self
            .first
            .block(&id)
            .await
            .map_err(|error| ComparatorError::Client {
                client: ClientSlot::First,
                height,
                error,
            })?;
        let end = Instant::now();
        let elapsed1 = end - start;

        let b2 = self
            .second
            .block(&id)
            .await
            .map_err(|error| ComparatorError::Client {
                client: ClientSlot::Second,
                height,
                error,
            })?;
        let elapsed2 = end.elapsed();

        let sample = LatencySample {
            first: elapsed1,
            second: elapsed2,
        };
        self.state.record(sample);

        writeln!(
            self.out,
            "request times: {:?} {:?} ::: {:?} {:?}",
            elapsed1, elapsed2, self.state.total1, self.state.total2
        )?;
        for slot in sample.slow_clients() {
            writeln!(
                self.out,
                "WARNING: REQUEST TOOK MORE THAN TWO SECONDS FOR {}: {}",
                slot, height
            )?;
        }

        compare_blocks(&b1, &b2, self.mode)
            .map_err(|mismatch| ComparatorError::Mismatch { height, mismatch })?;

        let operations: usize = b1.transactions.iter().map(|tx| tx.operations.len()).sum();
        debug!(
            height,
            transactions = b1.transactions.len(),
            operations,
            "block matches"
        );

        Ok(BlockReport {
            height,
            sample,
            transactions: b1.transactions.len(),
            operations,
        })
    }

    /// Count the block at the cursor as done and move one block down;
    /// `None` once block 0 has been checked
    pub fn advance(&mut self) -> Option<u64> {
        self.state.advance()
    }

    /// Check `iterations` consecutive blocks, descending from the cursor
    pub async fn run(&mut self, iterations: u64) -> Result<RunSummary, ComparatorError> {
        for i in 0..iterations {
            self.check_block().await?;
            if self.advance().is_none() && i + 1 < iterations {
                return Err(ComparatorError::CursorExhausted {
                    completed: self.state.completed,
                    requested: iterations,
                });
            }
        }

        writeln!(
            self.out,
            "Checked {} blocks ::: {:?} {:?}",
            self.state.completed, self.state.total1, self.state.total2
        )?;

        Ok(RunSummary {
            blocks: self.state.completed,
            total1: self.state.total1,
            total2: self.state.total2,
        })
    }
}
