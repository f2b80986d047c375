//! Tracer output parsing
//!
//! The full tracer returns one nested call frame per transaction; the lean
//! tracer returns the same calls as a flat, depth-annotated list. Both are
//! reduced to [`FlatCall`]s here, and operations are built only from those, so
//! any divergence between the two tracers shows up in the operation lists.

use super::ClientError;
use crate::types::{
    AccountIdentifier, Amount, Currency, Operation, OperationIdentifier, CALLCODE_OP_TYPE,
    CALL_OP_TYPE, CREATE2_OP_TYPE, CREATE_OP_TYPE, FAILURE_STATUS, FEE_OP_TYPE,
    SELFDESTRUCT_OP_TYPE, SUCCESS_STATUS,
};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Block body as returned by `eth_getBlockByNumber(_, true)`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub number: String,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: String,
    pub miner: String,
    #[serde(default)]
    pub base_fee_per_gas: Option<String>,
    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub hash: String,
    pub from: String,
    #[serde(default)]
    pub gas_price: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    pub transaction_hash: String,
    pub gas_used: String,
    #[serde(default)]
    pub effective_gas_price: Option<String>,
}

/// One entry of a `debug_traceBlockByNumber` result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Nested frame produced by the full call tracer
#[derive(Debug, Clone, Deserialize)]
pub struct CallFrame {
    #[serde(rename = "type")]
    pub call_type: String,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub calls: Vec<CallFrame>,
}

/// Frame produced by the lean tracer; `depth` is 0 for the top-level call
#[derive(Debug, Clone, Deserialize)]
pub struct LeanFrame {
    #[serde(rename = "type")]
    pub call_type: String,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub depth: usize,
}

/// A call in depth-first order with its effective outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatCall {
    pub call_type: String,
    pub from: String,
    pub to: Option<String>,
    pub value: u128,
    /// Set when this frame or any ancestor reverted
    pub failed: bool,
    /// The frame's own error, if any
    pub error: Option<String>,
}

/// Parse an Ethereum hex quantity (`0x1a`); an empty `0x` is zero
pub fn parse_quantity(raw: &str) -> Result<u128, ClientError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| ClientError::MalformedResponse(format!("quantity {:?} lacks 0x prefix", raw)))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| ClientError::MalformedResponse(format!("invalid quantity {:?}: {}", raw, e)))
}

fn parse_value(raw: Option<&str>) -> Result<u128, ClientError> {
    raw.map(parse_quantity).transpose().map(|v| v.unwrap_or(0))
}

/// Flatten a nested full-tracer frame depth-first
pub fn flatten_call_frame(root: &CallFrame) -> Result<Vec<FlatCall>, ClientError> {
    let mut out = Vec::new();
    flatten_into(root, false, &mut out)?;
    Ok(out)
}

fn flatten_into(frame: &CallFrame, parent_failed: bool, out: &mut Vec<FlatCall>) -> Result<(), ClientError> {
    let failed = parent_failed || frame.error.is_some();
    out.push(FlatCall {
        call_type: frame.call_type.to_uppercase(),
        from: frame.from.clone(),
        to: frame.to.clone(),
        value: parse_value(frame.value.as_deref())?,
        failed,
        error: frame.error.clone(),
    });
    for child in &frame.calls {
        flatten_into(child, failed, out)?;
    }
    Ok(())
}

/// Resolve failure propagation over lean frames using their depths
pub fn flatten_lean_frames(frames: &[LeanFrame]) -> Result<Vec<FlatCall>, ClientError> {
    // failed_at[d] is the outcome of the most recent frame seen at depth d
    let mut failed_at: Vec<bool> = Vec::new();
    let mut out = Vec::with_capacity(frames.len());

    for frame in frames {
        if frame.depth > failed_at.len() {
            return Err(ClientError::MalformedResponse(format!(
                "lean frame at depth {} has no parent",
                frame.depth
            )));
        }
        let parent_failed = frame.depth > 0 && failed_at[frame.depth - 1];
        let failed = parent_failed || frame.error.is_some();
        failed_at.truncate(frame.depth);
        failed_at.push(failed);

        out.push(FlatCall {
            call_type: frame.call_type.to_uppercase(),
            from: frame.from.clone(),
            to: frame.to.clone(),
            value: parse_value(frame.value.as_deref())?,
            failed,
            error: frame.error.clone(),
        });
    }

    Ok(out)
}

/// Decode one trace entry's result according to the tracer mode
pub fn flatten_trace_result(result: Value, lean: bool) -> Result<Vec<FlatCall>, ClientError> {
    if lean {
        let frames: Vec<LeanFrame> = serde_json::from_value(result)
            .map_err(|e| ClientError::MalformedResponse(format!("invalid lean trace: {}", e)))?;
        flatten_lean_frames(&frames)
    } else {
        let root: CallFrame = serde_json::from_value(result)
            .map_err(|e| ClientError::MalformedResponse(format!("invalid call trace: {}", e)))?;
        flatten_call_frame(&root)
    }
}

fn is_value_transfer(call_type: &str) -> bool {
    matches!(
        call_type,
        CALL_OP_TYPE | CALLCODE_OP_TYPE | CREATE_OP_TYPE | CREATE2_OP_TYPE | SELFDESTRUCT_OP_TYPE
    )
}

/// Block-wide inputs to operation construction
#[derive(Debug, Clone)]
pub struct OperationContext<'a> {
    pub currency: &'a Currency,
    pub miner: &'a str,
    pub base_fee: Option<u128>,
    pub burnt_contract: Option<&'a str>,
}

fn operation(
    index: usize,
    related: Option<usize>,
    op_type: &str,
    status: &str,
    address: &str,
    amount: Amount,
) -> Operation {
    Operation {
        operation_identifier: OperationIdentifier::new(index as i64),
        related_operations: related
            .map(|r| vec![OperationIdentifier::new(r as i64)])
            .unwrap_or_default(),
        op_type: op_type.to_string(),
        status: Some(status.to_string()),
        account: Some(AccountIdentifier {
            address: address.to_string(),
        }),
        amount: Some(amount),
        metadata: Map::new(),
    }
}

fn checked_fee(gas_used: u128, price: u128) -> Result<u128, ClientError> {
    gas_used
        .checked_mul(price)
        .ok_or_else(|| ClientError::MalformedResponse("fee overflows u128".to_string()))
}

/// Gas fee operations: payer debit, miner credit and, when configured, the
/// burnt-contract credit for the base fee portion
pub fn fee_operations(
    tx: &RawTransaction,
    receipt: &RawReceipt,
    ctx: &OperationContext<'_>,
) -> Result<Vec<Operation>, ClientError> {
    let gas_used = parse_quantity(&receipt.gas_used)?;
    let price = match (&receipt.effective_gas_price, &tx.gas_price) {
        (Some(p), _) | (None, Some(p)) => parse_quantity(p)?,
        (None, None) => {
            return Err(ClientError::MalformedResponse(format!(
                "transaction {} has no gas price",
                tx.hash
            )))
        }
    };

    let total = checked_fee(gas_used, price)?;
    if total == 0 {
        return Ok(Vec::new());
    }

    let base_fee = ctx.base_fee.unwrap_or(0).min(price);
    let burnt = checked_fee(gas_used, base_fee)?;
    let miner_reward = total - burnt;

    let mut ops = vec![operation(
        0,
        None,
        FEE_OP_TYPE,
        SUCCESS_STATUS,
        &tx.from,
        Amount::debit(total, ctx.currency),
    )];
    if miner_reward > 0 {
        ops.push(operation(
            ops.len(),
            Some(0),
            FEE_OP_TYPE,
            SUCCESS_STATUS,
            ctx.miner,
            Amount::credit(miner_reward, ctx.currency),
        ));
    }
    if let (Some(contract), true) = (ctx.burnt_contract, burnt > 0) {
        ops.push(operation(
            ops.len(),
            Some(0),
            FEE_OP_TYPE,
            SUCCESS_STATUS,
            contract,
            Amount::credit(burnt, ctx.currency),
        ));
    }

    Ok(ops)
}

/// Debit/credit pairs for every value-carrying call, indexed from `start`
pub fn call_operations(
    start: usize,
    calls: &[FlatCall],
    currency: &Currency,
) -> Result<Vec<Operation>, ClientError> {
    let mut ops = Vec::new();

    for call in calls {
        if call.value == 0 || !is_value_transfer(&call.call_type) {
            continue;
        }
        let to = call.to.as_deref().ok_or_else(|| {
            ClientError::MalformedResponse(format!(
                "{} from {} carries value but has no recipient",
                call.call_type, call.from
            ))
        })?;
        let status = if call.failed {
            FAILURE_STATUS
        } else {
            SUCCESS_STATUS
        };

        let debit_index = start + ops.len();
        let mut debit = operation(
            debit_index,
            None,
            &call.call_type,
            status,
            &call.from,
            Amount::debit(call.value, currency),
        );
        if let Some(error) = &call.error {
            debit
                .metadata
                .insert("error".to_string(), Value::String(error.clone()));
        }
        ops.push(debit);
        ops.push(operation(
            debit_index + 1,
            Some(debit_index),
            &call.call_type,
            status,
            to,
            Amount::credit(call.value, currency),
        ));
    }

    Ok(ops)
}

/// All operations of one transaction: fees first, then traced value transfers
pub fn transaction_operations(
    tx: &RawTransaction,
    receipt: &RawReceipt,
    calls: &[FlatCall],
    ctx: &OperationContext<'_>,
) -> Result<Vec<Operation>, ClientError> {
    let mut ops = fee_operations(tx, receipt, ctx)?;
    let traced = call_operations(ops.len(), calls, ctx.currency)?;
    ops.extend(traced);
    Ok(ops)
}
