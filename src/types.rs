//! Block data model
//!
//! Rosetta-style types returned by a trace client. Everything here derives
//! `PartialEq` so two responses can be compared structurally; field-level
//! diffs live in [`crate::diff`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Operation status for a value transfer that took effect
pub const SUCCESS_STATUS: &str = "SUCCESS";
/// Operation status for a value transfer inside a reverted frame
pub const FAILURE_STATUS: &str = "FAILURE";

/// Operation type for gas fee payments
pub const FEE_OP_TYPE: &str = "FEE";
/// Operation type for plain value calls
pub const CALL_OP_TYPE: &str = "CALL";
pub const CALLCODE_OP_TYPE: &str = "CALLCODE";
pub const CREATE_OP_TYPE: &str = "CREATE";
pub const CREATE2_OP_TYPE: &str = "CREATE2";
pub const SELFDESTRUCT_OP_TYPE: &str = "SELFDESTRUCT";

/// Fully resolved reference to a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIdentifier {
    pub index: u64,
    pub hash: String,
}

/// Block reference by index, by hash, or both
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialBlockIdentifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl PartialBlockIdentifier {
    /// Reference a block by height only
    pub fn by_index(index: u64) -> Self {
        Self {
            index: Some(index),
            hash: None,
        }
    }

    /// Reference a block by hash only
    pub fn by_hash(hash: impl Into<String>) -> Self {
        Self {
            index: None,
            hash: Some(hash.into()),
        }
    }
}

impl fmt::Display for PartialBlockIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.index, &self.hash) {
            (Some(index), _) => write!(f, "{}", index),
            (None, Some(hash)) => write!(f, "{}", hash),
            (None, None) => write!(f, "<latest>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub block_identifier: BlockIdentifier,
    pub parent_block_identifier: BlockIdentifier,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIdentifier {
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_identifier: TransactionIdentifier,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationIdentifier {
    pub index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_index: Option<i64>,
}

impl OperationIdentifier {
    pub fn new(index: i64) -> Self {
        Self {
            index,
            network_index: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentifier {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub symbol: String,
    pub decimals: u32,
}

/// Signed decimal value in the currency's smallest unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub value: String,
    pub currency: Currency,
}

impl Amount {
    /// Credit of `value` base units
    pub fn credit(value: u128, currency: &Currency) -> Self {
        Self {
            value: value.to_string(),
            currency: currency.clone(),
        }
    }

    /// Debit of `value` base units; zero is never rendered as "-0"
    pub fn debit(value: u128, currency: &Currency) -> Self {
        let value = if value == 0 {
            "0".to_string()
        } else {
            format!("-{}", value)
        };
        Self {
            value,
            currency: currency.clone(),
        }
    }
}

/// A single balance-affecting effect of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub operation_identifier: OperationIdentifier,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_operations: Vec<OperationIdentifier>,
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Operation {
    /// Amount value for diagnostics, `<none>` when the operation carries no amount
    pub fn amount_value(&self) -> &str {
        self.amount
            .as_ref()
            .map(|a| a.value.as_str())
            .unwrap_or("<none>")
    }
}
