//! Trace clients
//!
//! The comparison loop only needs something that turns a block identifier into
//! a [`Block`]; that contract is [`BlockSource`]. [`TraceClient`] is the
//! JSON-RPC implementation that runs a tracer script on the node and turns its
//! output into operations.

use crate::types::{Block, Currency, PartialBlockIdentifier};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod node;
pub mod rpc;
pub mod trace;

pub use node::TraceClient;

/// Anything that can produce a traced block for an identifier
pub trait BlockSource {
    /// Fetch and trace one block
    fn block(&self, id: &PartialBlockIdentifier) -> impl Future<Output = Result<Block, ClientError>>;
}

/// Errors raised while constructing or querying a trace client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read tracer script {}: {source}", .path.display())]
    TracerScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("RPC request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC request failed with status: {0}")]
    Status(reqwest::StatusCode),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("block {0} not found")]
    BlockNotFound(String),

    #[error("trace failed for transaction {transaction}: {message}")]
    TraceFailed { transaction: String, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Chain parameters shared by both clients of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub network: String,
    pub currency: Currency,
}

/// Construction parameters of a [`TraceClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Node RPC URL
    pub url: String,
    pub chain_config: ChainConfig,
    /// Extra HTTP headers sent with every request
    pub headers: Vec<(String, String)>,
    /// Address credited with the burnt base fee, if the chain routes it to a contract
    pub burnt_contract: Option<String>,
    /// Parse tracer output as flat lean frames instead of nested call frames
    pub lean_traces: bool,
    /// JS tracer script shipped to `debug_traceBlockByNumber`
    pub custom_tracer_path: PathBuf,
    /// Tracer timeout understood by the node, e.g. `120s`
    pub trace_timeout: String,
    /// HTTP request timeout
    pub request_timeout: Duration,
}
