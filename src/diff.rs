//! Structural comparison of trace client responses
//!
//! Two blocks are equivalent when they carry the same number of transactions,
//! each transaction carries the same number of operations, and every operation
//! pair is field-for-field identical. The first divergence is returned as a
//! [`Mismatch`]; callers decide whether that ends the run.

use crate::types::{Block, Operation};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// How operations within a transaction are matched up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompareMode {
    /// Operation `i` of one block is compared with operation `i` of the other
    #[default]
    Positional,
    /// Operations are compared as a multiset; positional identifiers are ignored
    Unordered,
}

/// A single differing field between two operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    /// Dotted path of the field, e.g. `amount.value` or `metadata.error`
    pub path: String,
    pub left: String,
    pub right: String,
}

impl fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} != {}", self.path, self.left, self.right)
    }
}

/// First structural divergence found between two blocks
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Mismatch {
    #[error("transaction counts differ ({left} vs {right})")]
    TransactionCount { left: usize, right: usize },

    #[error("op counts differ in transaction {transaction} ({left} vs {right})")]
    OperationCount {
        transaction: usize,
        left: usize,
        right: usize,
    },

    #[error(
        "ops not equal {left_amount} {right_amount} (transaction {transaction}, operation {operation}: {})",
        format_diffs(.diffs)
    )]
    Operation {
        transaction: usize,
        operation: usize,
        left_amount: String,
        right_amount: String,
        diffs: Vec<FieldDiff>,
    },

    #[error(
        "operation sets differ in transaction {transaction} ({only_left} only in left, {only_right} only in right)"
    )]
    UnorderedOperations {
        transaction: usize,
        only_left: usize,
        only_right: usize,
    },
}

fn format_diffs(diffs: &[FieldDiff]) -> String {
    diffs
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn render_opt<T: fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<absent>".to_string())
}

fn push_if_ne(diffs: &mut Vec<FieldDiff>, path: &str, left: String, right: String) {
    if left != right {
        diffs.push(FieldDiff {
            path: path.to_string(),
            left,
            right,
        });
    }
}

/// Field-level differences between two operations.
///
/// Returns an empty vector iff `left == right`.
pub fn diff_operations(left: &Operation, right: &Operation) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();

    push_if_ne(
        &mut diffs,
        "operation_identifier.index",
        left.operation_identifier.index.to_string(),
        right.operation_identifier.index.to_string(),
    );
    push_if_ne(
        &mut diffs,
        "operation_identifier.network_index",
        render_opt(left.operation_identifier.network_index),
        render_opt(right.operation_identifier.network_index),
    );
    push_if_ne(
        &mut diffs,
        "related_operations",
        render_related(left),
        render_related(right),
    );
    push_if_ne(
        &mut diffs,
        "type",
        left.op_type.clone(),
        right.op_type.clone(),
    );
    push_if_ne(
        &mut diffs,
        "status",
        render_opt(left.status.as_deref()),
        render_opt(right.status.as_deref()),
    );
    push_if_ne(
        &mut diffs,
        "account.address",
        render_opt(left.account.as_ref().map(|a| a.address.as_str())),
        render_opt(right.account.as_ref().map(|a| a.address.as_str())),
    );
    push_if_ne(
        &mut diffs,
        "amount.value",
        render_opt(left.amount.as_ref().map(|a| a.value.as_str())),
        render_opt(right.amount.as_ref().map(|a| a.value.as_str())),
    );
    push_if_ne(
        &mut diffs,
        "amount.currency.symbol",
        render_opt(left.amount.as_ref().map(|a| a.currency.symbol.as_str())),
        render_opt(right.amount.as_ref().map(|a| a.currency.symbol.as_str())),
    );
    push_if_ne(
        &mut diffs,
        "amount.currency.decimals",
        render_opt(left.amount.as_ref().map(|a| a.currency.decimals)),
        render_opt(right.amount.as_ref().map(|a| a.currency.decimals)),
    );

    let keys: BTreeSet<&String> = left.metadata.keys().chain(right.metadata.keys()).collect();
    for key in keys {
        push_if_ne(
            &mut diffs,
            &format!("metadata.{}", key),
            render_opt(left.metadata.get(key)),
            render_opt(right.metadata.get(key)),
        );
    }

    diffs
}

fn render_related(op: &Operation) -> String {
    let ids: Vec<String> = op
        .related_operations
        .iter()
        .map(|r| match r.network_index {
            Some(network_index) => format!("{}/{}", r.index, network_index),
            None => r.index.to_string(),
        })
        .collect();
    format!("[{}]", ids.join(", "))
}

/// Compare two blocks, stopping at the first divergence.
///
/// Transaction counts are checked before any operation is looked at, and each
/// transaction's operation count before its operations.
pub fn compare_blocks(left: &Block, right: &Block, mode: CompareMode) -> Result<(), Mismatch> {
    if left.transactions.len() != right.transactions.len() {
        return Err(Mismatch::TransactionCount {
            left: left.transactions.len(),
            right: right.transactions.len(),
        });
    }

    for (i, (tx1, tx2)) in left
        .transactions
        .iter()
        .zip(right.transactions.iter())
        .enumerate()
    {
        let ops1 = &tx1.operations;
        let ops2 = &tx2.operations;
        if ops1.len() != ops2.len() {
            return Err(Mismatch::OperationCount {
                transaction: i,
                left: ops1.len(),
                right: ops2.len(),
            });
        }

        match mode {
            CompareMode::Positional => compare_positional(i, ops1, ops2)?,
            CompareMode::Unordered => compare_unordered(i, ops1, ops2)?,
        }
    }

    Ok(())
}

fn compare_positional(transaction: usize, ops1: &[Operation], ops2: &[Operation]) -> Result<(), Mismatch> {
    for (j, (op1, op2)) in ops1.iter().zip(ops2.iter()).enumerate() {
        if op1 == op2 {
            continue;
        }
        return Err(Mismatch::Operation {
            transaction,
            operation: j,
            left_amount: op1.amount_value().to_string(),
            right_amount: op2.amount_value().to_string(),
            diffs: diff_operations(op1, op2),
        });
    }
    Ok(())
}

fn compare_unordered(transaction: usize, ops1: &[Operation], ops2: &[Operation]) -> Result<(), Mismatch> {
    let mut counts: BTreeMap<CanonicalKey<'_>, i64> = BTreeMap::new();
    for op in ops1 {
        *counts.entry(canonical_key(op)).or_default() += 1;
    }
    for op in ops2 {
        *counts.entry(canonical_key(op)).or_default() -= 1;
    }

    let only_left: i64 = counts.values().filter(|c| **c > 0).sum();
    let only_right: i64 = -counts.values().filter(|c| **c < 0).sum::<i64>();
    if only_left == 0 && only_right == 0 {
        return Ok(());
    }

    Err(Mismatch::UnorderedOperations {
        transaction,
        only_left: only_left as usize,
        only_right: only_right as usize,
    })
}

/// Everything but the positional identifiers: type, status, account,
/// amount (value, symbol, decimals) and the metadata as sorted-key JSON
type CanonicalKey<'a> = (
    &'a str,
    Option<&'a str>,
    Option<&'a str>,
    Option<(&'a str, &'a str, u32)>,
    String,
);

fn canonical_key(op: &Operation) -> CanonicalKey<'_> {
    (
        op.op_type.as_str(),
        op.status.as_deref(),
        op.account.as_ref().map(|a| a.address.as_str()),
        op.amount
            .as_ref()
            .map(|a| (a.value.as_str(), a.currency.symbol.as_str(), a.currency.decimals)),
        Value::Object(op.metadata.clone()).to_string(),
    )
}
