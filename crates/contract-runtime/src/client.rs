//! RpcClient - JSON-RPC client used by contracts

use std::sync::Arc;

use bytes::Bytes;
use contract_abi::{Address, Log, H256};
use serde_json::Value;

use crate::transport::{deserialize_response, MockTransport, Transport};
use crate::types::{AccessListResult, BlockId, LogFilter, RpcReceipt, TxRequest};
use crate::ContractError;

#[cfg(feature = "http")]
use crate::transport::HttpTransport;

/// JSON-RPC client for contract interaction
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    chain_id: Option<u64>,
}

impl RpcClient {
    /// Create a new client with HTTP transport
    #[cfg(feature = "http")]
    pub async fn connect(url: &str) -> Result<Self, ContractError> {
        let transport = HttpTransport::new(url);
        let mut client = Self {
            transport: Arc::new(transport),
            chain_id: None,
        };

        // Fetch and cache chain ID
        let chain_id = client.fetch_chain_id().await?;
        client.chain_id = Some(chain_id);
        tracing::debug!(url, chain_id, "Connected to JSON-RPC endpoint");

        Ok(client)
    }

    /// Create a new client with mock transport (for testing)
    pub fn new_mock() -> Self {
        Self {
            transport: Arc::new(MockTransport::new()),
            chain_id: Some(1),
        }
    }

    /// Create a client with a custom transport
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self::new(Arc::new(transport))
    }

    /// Create a client over a shared transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            chain_id: None,
        }
    }

    /// Helper method to make RPC request and deserialize
    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, ContractError> {
        tracing::debug!(method, "JSON-RPC request");
        let value = self.transport.request_json(method, params).await?;
        deserialize_response(value)
    }

    // ==================== Chain Info ====================

    /// Get the chain ID
    pub async fn chain_id(&self) -> Result<u64, ContractError> {
        if let Some(id) = self.chain_id {
            return Ok(id);
        }
        self.fetch_chain_id().await
    }

    async fn fetch_chain_id(&self) -> Result<u64, ContractError> {
        let result: String = self.request("eth_chainId", vec![]).await?;
        parse_hex_u64(&result)
    }

    /// Get the current block number
    pub async fn block_number(&self) -> Result<u64, ContractError> {
        let result: String = self.request("eth_blockNumber", vec![]).await?;
        parse_hex_u64(&result)
    }

    /// Get the code at an address
    pub async fn get_code(&self, address: &Address, block: BlockId) -> Result<Bytes, ContractError> {
        let result: String = self
            .request(
                "eth_getCode",
                vec![serde_json::to_value(address)?, serde_json::to_value(block)?],
            )
            .await?;
        parse_hex_bytes(&result)
    }

    // ==================== Call & Estimation ====================

    /// Execute a call (read-only, does not create transaction)
    pub async fn call(&self, request: &TxRequest, block: BlockId) -> Result<Bytes, ContractError> {
        let result: String = self
            .request(
                "eth_call",
                vec![serde_json::to_value(request)?, serde_json::to_value(block)?],
            )
            .await?;
        parse_hex_bytes(&result)
    }

    /// Estimate gas for a transaction
    pub async fn estimate_gas(&self, request: &TxRequest) -> Result<u64, ContractError> {
        let result: String = self
            .request("eth_estimateGas", vec![serde_json::to_value(request)?])
            .await?;
        parse_hex_u64(&result)
    }

    /// Accounts and storage slots a transaction would touch
    pub async fn create_access_list(
        &self,
        request: &TxRequest,
        block: BlockId,
    ) -> Result<AccessListResult, ContractError> {
        self.request(
            "eth_createAccessList",
            vec![serde_json::to_value(request)?, serde_json::to_value(block)?],
        )
        .await
    }

    // ==================== Transactions ====================

    /// Send a transaction signed by the node's unlocked account
    pub async fn send_transaction(&self, request: &TxRequest) -> Result<H256, ContractError> {
        let result: String = self
            .request("eth_sendTransaction", vec![serde_json::to_value(request)?])
            .await?;
        parse_hex_h256(&result)
    }

    /// Get a transaction receipt; `None` while the transaction is pending
    pub async fn get_transaction_receipt(
        &self,
        hash: &H256,
    ) -> Result<Option<RpcReceipt>, ContractError> {
        self.request(
            "eth_getTransactionReceipt",
            vec![serde_json::to_value(hash)?],
        )
        .await
    }

    // ==================== Logs ====================

    /// Logs matching a filter
    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, ContractError> {
        self.request("eth_getLogs", vec![serde_json::to_value(filter)?])
            .await
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

// ==================== Helper Functions ====================

fn parse_hex_u64(s: &str) -> Result<u64, ContractError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).map_err(|e| ContractError::InvalidHex(e.to_string()))
}

fn parse_hex_h256(s: &str) -> Result<H256, ContractError> {
    let bytes = parse_hex_bytes(s)?;
    if bytes.len() != 32 {
        return Err(ContractError::InvalidHex(format!(
            "expected 32-byte hash, got {} bytes",
            bytes.len()
        )));
    }
    Ok(H256::from_slice(&bytes))
}

fn parse_hex_bytes(s: &str) -> Result<Bytes, ContractError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return Ok(Bytes::new());
    }
    let bytes = hex::decode(s)?;
    Ok(Bytes::from(bytes))
}
