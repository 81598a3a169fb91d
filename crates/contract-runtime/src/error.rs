//! Runtime error types

use contract_abi::{AbiError, RevertReason, H256};
use serde_json::Value;
use thiserror::Error;

/// Contract runtime error type
#[derive(Debug, Error)]
pub enum ContractError {
    /// Transport/network error
    #[error("Transport error: {0}")]
    Transport(String),

    /// RPC error from node
    #[error("RPC error: {code} - {message}")]
    Rpc {
        /// Error code
        code: i64,
        /// Error message
        message: String,
        /// Optional payload (revert data for execution errors)
        data: Option<Value>,
    },

    /// Codec or descriptor error
    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    /// Call returned nothing although the function declares outputs
    #[error("Empty result for {function}, which declares outputs (no contract at address?)")]
    EmptyResultOnNonEmptyOutputs {
        /// Function signature
        function: String,
    },

    /// Execution reverted
    #[error("Execution reverted: {reason}")]
    Reverted {
        /// Decoded reason
        reason: RevertReason,
    },

    /// Pre-submit simulation failed; nothing was sent
    #[error("Validation failed before submission: {0}")]
    ValidationFailed(Box<ContractError>),

    /// A linked library has no artifact
    #[error("Missing artifact for linked library: {0}")]
    MissingLibraryArtifact(String),

    /// Libraries reference each other in a cycle
    #[error("Library dependency cycle: {}", .0.join(" -> "))]
    LibraryCycle(Vec<String>),

    /// Mined with status 0
    #[error("Transaction {hash:?} failed")]
    TransactionFailed {
        /// Transaction hash
        hash: H256,
    },

    /// No receipt within the configured timeout
    #[error("Timed out waiting for transaction {hash:?}")]
    Timeout {
        /// Transaction hash
        hash: H256,
    },

    /// Deployment receipt carries no contract address
    #[error("Deployment transaction {hash:?} produced no contract address")]
    MissingContractAddress {
        /// Transaction hash
        hash: H256,
    },

    /// A polled log could not be decoded
    #[error("Failed to decode log for subscription {token}: {source}")]
    SubscriptionDecode {
        /// Subscription token
        token: u64,
        /// Decoding error
        source: AbiError,
    },

    /// Unknown subscription token
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(u64),

    /// Invalid hex string
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ContractError {
    /// Revert data carried by an RPC execution error
    ///
    /// Nodes put it either directly in `data` or in `data.data`.
    pub fn revert_data(&self) -> Option<Vec<u8>> {
        let ContractError::Rpc { data: Some(data), .. } = self else {
            return None;
        };
        let hex_str = match data {
            Value::String(s) => s.as_str(),
            Value::Object(map) => map.get("data")?.as_str()?,
            _ => return None,
        };
        let bytes = contract_abi::convert::bytes_from_hex(hex_str).ok()?;
        Some(bytes.to_vec())
    }
}

impl From<hex::FromHexError> for ContractError {
    fn from(e: hex::FromHexError) -> Self {
        ContractError::InvalidHex(e.to_string())
    }
}

impl From<serde_json::Error> for ContractError {
    fn from(e: serde_json::Error) -> Self {
        ContractError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for ContractError {
    fn from(e: toml::de::Error) -> Self {
        ContractError::Config(e.to_string())
    }
}
