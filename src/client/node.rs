//! Node-backed trace client
//!
//! Fetches a block body, its receipts and a tracer run over the whole block,
//! then assembles Rosetta operations from them.

use super::rpc::RpcClient;
use super::trace::{
    flatten_trace_result, parse_quantity, transaction_operations, OperationContext, RawBlock,
    RawReceipt, TraceEntry,
};
use super::{BlockSource, ClientConfig, ClientError};
use crate::types::{
    Block, BlockIdentifier, PartialBlockIdentifier, Transaction, TransactionIdentifier,
};
use serde_json::{json, Value};
use tracing::debug;

/// Trace client bound to one node and one tracer script
pub struct TraceClient {
    rpc: RpcClient,
    config: ClientConfig,
    tracer: String,
}

impl TraceClient {
    /// Create a client; fails if the URL, headers or tracer script are unusable
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let tracer = std::fs::read_to_string(&config.custom_tracer_path).map_err(|source| {
            ClientError::TracerScript {
                path: config.custom_tracer_path.clone(),
                source,
            }
        })?;
        let rpc = RpcClient::new(&config.url, &config.headers, config.request_timeout)?;

        debug!(
            url = %rpc.url(),
            tracer = %config.custom_tracer_path.display(),
            lean = config.lean_traces,
            "trace client ready"
        );

        Ok(Self {
            rpc,
            config,
            tracer,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn raw_block(&self, id: &PartialBlockIdentifier) -> Result<RawBlock, ClientError> {
        let result = match (&id.index, &id.hash) {
            (Some(index), _) => {
                self.rpc
                    .call("eth_getBlockByNumber", json!([to_hex(*index), true]))
                    .await?
            }
            (None, Some(hash)) => {
                self.rpc
                    .call("eth_getBlockByHash", json!([hash, true]))
                    .await?
            }
            (None, None) => {
                self.rpc
                    .call("eth_getBlockByNumber", json!(["latest", true]))
                    .await?
            }
        };

        if result.is_null() {
            return Err(ClientError::BlockNotFound(id.to_string()));
        }
        decode(result, "block")
    }

    async fn receipts(&self, number: &str) -> Result<Vec<RawReceipt>, ClientError> {
        let result = self.rpc.call("eth_getBlockReceipts", json!([number])).await?;
        if result.is_null() {
            return Err(ClientError::BlockNotFound(number.to_string()));
        }
        decode(result, "receipts")
    }

    async fn traces(&self, number: &str) -> Result<Vec<TraceEntry>, ClientError> {
        let params = json!([
            number,
            {
                "tracer": self.tracer,
                "timeout": self.config.trace_timeout,
            }
        ]);
        let result = self.rpc.call("debug_traceBlockByNumber", params).await?;
        decode(result, "traces")
    }
}

impl BlockSource for TraceClient {
    async fn block(&self, id: &PartialBlockIdentifier) -> Result<Block, ClientError> {
        let raw = self.raw_block(id).await?;
        let receipts = self.receipts(&raw.number).await?;
        let traces = self.traces(&raw.number).await?;

        if receipts.len() != raw.transactions.len() || traces.len() != raw.transactions.len() {
            return Err(ClientError::MalformedResponse(format!(
                "block {} has {} transactions, {} receipts and {} traces",
                raw.number,
                raw.transactions.len(),
                receipts.len(),
                traces.len()
            )));
        }

        let index = parse_height(&raw.number)?;
        let base_fee = raw
            .base_fee_per_gas
            .as_deref()
            .map(parse_quantity)
            .transpose()?;
        let ctx = OperationContext {
            currency: &self.config.chain_config.currency,
            miner: &raw.miner,
            base_fee,
            burnt_contract: self.config.burnt_contract.as_deref(),
        };

        let mut transactions = Vec::with_capacity(raw.transactions.len());
        for ((tx, receipt), trace) in raw.transactions.iter().zip(&receipts).zip(traces) {
            if receipt.transaction_hash != tx.hash {
                return Err(ClientError::MalformedResponse(format!(
                    "receipt {} does not belong to transaction {}",
                    receipt.transaction_hash, tx.hash
                )));
            }
            if let Some(hash) = trace.tx_hash.as_deref() {
                if hash != tx.hash {
                    return Err(ClientError::MalformedResponse(format!(
                        "trace {} does not belong to transaction {}",
                        hash, tx.hash
                    )));
                }
            }
            if let Some(message) = trace.error {
                return Err(ClientError::TraceFailed {
                    transaction: tx.hash.clone(),
                    message,
                });
            }
            let result = trace.result.ok_or_else(|| {
                ClientError::MalformedResponse(format!("trace for {} has no result", tx.hash))
            })?;

            let calls = flatten_trace_result(result, self.config.lean_traces)?;
            transactions.push(Transaction {
                transaction_identifier: TransactionIdentifier {
                    hash: tx.hash.clone(),
                },
                operations: transaction_operations(tx, receipt, &calls, &ctx)?,
            });
        }

        Ok(Block {
            block_identifier: BlockIdentifier {
                index,
                hash: raw.hash,
            },
            parent_block_identifier: BlockIdentifier {
                index: index.saturating_sub(1),
                hash: raw.parent_hash,
            },
            timestamp: parse_timestamp_ms(&raw.timestamp)?,
            transactions,
        })
    }
}

fn to_hex(index: u64) -> String {
    format!("0x{:x}", index)
}

fn parse_height(raw: &str) -> Result<u64, ClientError> {
    let value = parse_quantity(raw)?;
    u64::try_from(value)
        .map_err(|_| ClientError::MalformedResponse(format!("block number {} out of range", raw)))
}

fn parse_timestamp_ms(raw: &str) -> Result<i64, ClientError> {
    let secs = parse_quantity(raw)?;
    i64::try_from(secs)
        .ok()
        .and_then(|s| s.checked_mul(1000))
        .ok_or_else(|| ClientError::MalformedResponse(format!("timestamp {} out of range", raw)))
}

fn decode<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T, ClientError> {
    serde_json::from_value(value)
        .map_err(|e| ClientError::MalformedResponse(format!("invalid {}: {}", what, e)))
}
