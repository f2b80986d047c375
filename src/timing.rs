//! Latency accounting for the comparison loop

use std::time::Duration;

/// Requests slower than this are reported, never cancelled
pub const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(2);

/// Which of the two clients a measurement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientSlot {
    First,
    Second,
}

impl ClientSlot {
    /// Short label used in progress output (`C1` / `C2`)
    pub fn label(self) -> &'static str {
        match self {
            ClientSlot::First => "C1",
            ClientSlot::Second => "C2",
        }
    }
}

impl std::fmt::Display for ClientSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Elapsed times of one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    pub first: Duration,
    pub second: Duration,
}

impl LatencySample {
    /// Clients whose request exceeded [`SLOW_REQUEST_THRESHOLD`]
    pub fn slow_clients(&self) -> Vec<ClientSlot> {
        let mut slow = Vec::new();
        if self.first > SLOW_REQUEST_THRESHOLD {
            slow.push(ClientSlot::First);
        }
        if self.second > SLOW_REQUEST_THRESHOLD {
            slow.push(ClientSlot::Second);
        }
        slow
    }
}

/// Accumulators owned by one comparison run
#[derive(Debug, Clone)]
pub struct RunState {
    /// Cumulative elapsed time of the first client
    pub total1: Duration,
    /// Cumulative elapsed time of the second client
    pub total2: Duration,
    /// Height of the next block to check
    pub cursor: u64,
    /// Iterations finished without a mismatch
    pub completed: u64,
}

impl RunState {
    pub fn new(start_block: u64) -> Self {
        Self {
            total1: Duration::ZERO,
            total2: Duration::ZERO,
            cursor: start_block,
            completed: 0,
        }
    }

    /// Add one iteration's elapsed times to the totals
    pub fn record(&mut self, sample: LatencySample) {
        self.total1 += sample.first;
        self.total2 += sample.second;
    }

    /// Move the cursor one block down; `None` once height 0 has been checked
    pub fn advance(&mut self) -> Option<u64> {
        self.completed += 1;
        let next = self.cursor.checked_sub(1)?;
        self.cursor = next;
        Some(next)
    }
}
