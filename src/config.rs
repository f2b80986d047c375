//! Environment configuration
//!
//! Both clients of a run are built from the same node settings; only the
//! tracer script and lean flag differ, and those come from the command line.

use crate::client::{ChainConfig, ClientConfig};
use crate::types::Currency;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const BOR_URL_ENV: &str = "BOR_URL";
pub const NETWORK_ENV: &str = "NETWORK";
pub const GETH_HEADERS_ENV: &str = "GETH_HEADERS";
pub const BURNT_CONTRACT_ENV: &str = "BURNT_CONTRACT";
pub const TRACE_TIMEOUT_ENV: &str = "TRACE_TIMEOUT";
pub const RPC_TIMEOUT_ENV: &str = "RPC_TIMEOUT_SECS";

const DEFAULT_TRACE_TIMEOUT: &str = "120s";
const DEFAULT_RPC_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" | "mumbai" => Ok(Network::Testnet),
            other => Err(ConfigError::Invalid {
                name: NETWORK_ENV,
                reason: format!("unknown network {:?}", other),
            }),
        }
    }
}

impl Network {
    pub fn chain_config(self) -> ChainConfig {
        let (chain_id, network) = match self {
            Network::Mainnet => (137, "mainnet"),
            Network::Testnet => (80001, "testnet"),
        };
        ChainConfig {
            chain_id,
            network: network.to_string(),
            currency: Currency {
                symbol: "MATIC".to_string(),
                decimals: 18,
            },
        }
    }
}

/// Node settings shared by both clients
#[derive(Debug, Clone)]
pub struct Configuration {
    pub bor_url: String,
    pub network: Network,
    pub params: ChainConfig,
    pub geth_headers: Vec<(String, String)>,
    pub burnt_contract: Option<String>,
    pub trace_timeout: String,
    pub request_timeout: Duration,
}

impl Configuration {
    /// Load from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bor_url = get(BOR_URL_ENV).ok_or(ConfigError::Missing(BOR_URL_ENV))?;
        let network = match get(NETWORK_ENV) {
            Some(raw) => raw.parse()?,
            None => Network::Mainnet,
        };
        let geth_headers = match get(GETH_HEADERS_ENV) {
            Some(raw) => parse_headers(&raw)?,
            None => Vec::new(),
        };
        let request_timeout = match get(RPC_TIMEOUT_ENV) {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|e| ConfigError::Invalid {
                name: RPC_TIMEOUT_ENV,
                reason: format!("{:?}: {}", raw, e),
            })?),
            None => Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
        };

        Ok(Self {
            bor_url,
            network,
            params: network.chain_config(),
            geth_headers,
            burnt_contract: get(BURNT_CONTRACT_ENV),
            trace_timeout: get(TRACE_TIMEOUT_ENV).unwrap_or_else(|| DEFAULT_TRACE_TIMEOUT.to_string()),
            request_timeout,
        })
    }

    /// Client settings for one tracer variant
    pub fn client_config(&self, tracer_path: PathBuf, lean_traces: bool) -> ClientConfig {
        ClientConfig {
            url: self.bor_url.clone(),
            chain_config: self.params.clone(),
            headers: self.geth_headers.clone(),
            burnt_contract: self.burnt_contract.clone(),
            lean_traces,
            custom_tracer_path: tracer_path,
            trace_timeout: self.trace_timeout.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

/// Parse `key:value,key2:value2`
fn parse_headers(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once(':').ok_or_else(|| ConfigError::Invalid {
                name: GETH_HEADERS_ENV,
                reason: format!("header {:?} is not key:value", pair),
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::Invalid {
                    name: GETH_HEADERS_ENV,
                    reason: format!("header {:?} has an empty key", pair),
                });
            }
            Ok((key.to_string(), value.trim().to_string()))
        })
        .collect()
}
