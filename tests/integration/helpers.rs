//! Test helpers: synthetic blocks and in-memory block sources

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Map;
use tracerdiff::client::{BlockSource, ClientError};
use tracerdiff::types::{
    AccountIdentifier, Amount, Block, BlockIdentifier, Currency, Operation, OperationIdentifier,
    PartialBlockIdentifier, Transaction, TransactionIdentifier, CALL_OP_TYPE, SUCCESS_STATUS,
};

pub fn matic() -> Currency {
    Currency {
        symbol: "MATIC".to_string(),
        decimals: 18,
    }
}

/// Create a debit/credit pair moving `value` from `from` to `to`
pub fn transfer(first_index: i64, from: &str, to: &str, value: u128) -> Vec<Operation> {
    let op = |index: i64, related: Vec<OperationIdentifier>, address: &str, amount: Amount| Operation {
        operation_identifier: OperationIdentifier::new(index),
        related_operations: related,
        op_type: CALL_OP_TYPE.to_string(),
        status: Some(SUCCESS_STATUS.to_string()),
        account: Some(AccountIdentifier {
            address: address.to_string(),
        }),
        amount: Some(amount),
        metadata: Map::new(),
    };

    vec![
        op(first_index, Vec::new(), from, Amount::debit(value, &matic())),
        op(
            first_index + 1,
            vec![OperationIdentifier::new(first_index)],
            to,
            Amount::credit(value, &matic()),
        ),
    ]
}

/// Create a block at `height` whose transactions carry the given operations
pub fn create_test_block(height: u64, txs: Vec<Vec<Operation>>) -> Block {
    Block {
        block_identifier: BlockIdentifier {
            index: height,
            hash: format!("0x{:064x}", height),
        },
        parent_block_identifier: BlockIdentifier {
            index: height.saturating_sub(1),
            hash: format!("0x{:064x}", height.saturating_sub(1)),
        },
        timestamp: 1_600_000_000_000 + height as i64 * 2_000,
        transactions: txs
            .into_iter()
            .enumerate()
            .map(|(i, operations)| Transaction {
                transaction_identifier: TransactionIdentifier {
                    hash: format!("0x{:x}{:04x}", height, i),
                },
                operations,
            })
            .collect(),
    }
}

/// Block with `tx_count` single-transfer transactions
pub fn create_transfer_block(height: u64, tx_count: usize) -> Block {
    let txs = (0..tx_count)
        .map(|i| transfer(0, "0xaaaa", &format!("0xbb{:02x}", i), 1_000 + i as u128))
        .collect();
    create_test_block(height, txs)
}

/// In-memory block source with a fixed per-request latency
#[derive(Clone, Default)]
pub struct MockSource {
    blocks: HashMap<u64, Block>,
    latency: Duration,
    calls: Arc<Mutex<Vec<u64>>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.insert(block.block_identifier.index, block);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Heights requested so far, in order
    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }
}

impl BlockSource for MockSource {
    async fn block(&self, id: &PartialBlockIdentifier) -> Result<Block, ClientError> {
        let index = id
            .index
            .ok_or_else(|| ClientError::InvalidConfig("mock only serves blocks by index".to_string()))?;
        self.calls.lock().unwrap().push(index);
        tokio::time::sleep(self.latency).await;
        self.blocks
            .get(&index)
            .cloned()
            .ok_or_else(|| ClientError::BlockNotFound(index.to_string()))
    }
}

/// Lines written by a comparator
pub fn lines(out: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(out).lines().map(|l| l.to_string()).collect()
}
