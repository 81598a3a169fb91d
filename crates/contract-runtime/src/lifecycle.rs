//! Transaction lifecycle: default merging, submission and confirmation

use std::sync::Arc;
use std::time::Duration;

use contract_abi::{LogDecoder, H256};

use crate::client::RpcClient;
use crate::config::RuntimeConfig;
use crate::types::{RpcReceipt, TransactionReceipt, TxRequest};
use crate::ContractError;

/// How to wait for a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwaitOptions {
    /// Delay between `eth_getTransactionReceipt` polls
    pub polling_interval: Duration,
    /// Give up after this long; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for AwaitOptions {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_millis(1000),
            timeout: None,
        }
    }
}

impl AwaitOptions {
    /// Options taken from the runtime configuration
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            polling_interval: config.receipt_polling_interval(),
            timeout: config.receipt_timeout(),
        }
    }

    /// Set the polling interval
    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Set the timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Merge `defaults` into `request`, then estimate gas if asked to and no
/// limit is set
pub async fn apply_defaults(
    client: &RpcClient,
    request: TxRequest,
    defaults: &TxRequest,
    estimate: bool,
) -> Result<TxRequest, ContractError> {
    let mut request = request.merge_defaults(defaults);
    if estimate && request.gas.is_none() {
        let gas = client.estimate_gas(&request).await?;
        tracing::debug!(gas, "Estimated gas");
        request.gas = Some(gas);
    }
    Ok(request)
}

/// Send a fully prepared request
pub async fn send(
    client: &RpcClient,
    request: &TxRequest,
    decoder: Arc<LogDecoder>,
) -> Result<PendingTransaction, ContractError> {
    let hash = client.send_transaction(request).await?;
    tracing::info!(
        hash = ?hash,
        to = ?request.to,
        gas = ?request.gas,
        "Transaction submitted"
    );
    Ok(PendingTransaction::new(hash, client.clone(), decoder))
}

/// A submitted transaction
///
/// The hash is known immediately; [`await_result`](Self::await_result)
/// waits for the receipt.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    /// Transaction hash
    pub hash: H256,
    client: RpcClient,
    decoder: Arc<LogDecoder>,
}

impl PendingTransaction {
    /// Track a transaction, decoding its logs with `decoder`
    pub fn new(hash: H256, client: RpcClient, decoder: Arc<LogDecoder>) -> Self {
        Self {
            hash,
            client,
            decoder,
        }
    }

    /// Get the transaction hash
    pub fn hash(&self) -> &H256 {
        &self.hash
    }

    /// Poll until mined
    ///
    /// Fails with `Timeout` when the timeout elapses first and with
    /// `TransactionFailed` when the receipt reports status 0.
    pub async fn await_result(&self, options: AwaitOptions) -> Result<TransactionReceipt, ContractError> {
        let raw = match options.timeout {
            Some(limit) => tokio::time::timeout(limit, self.poll_receipt(options.polling_interval))
                .await
                .map_err(|_| {
                    tracing::warn!(hash = ?self.hash, ?limit, "Timed out waiting for receipt");
                    ContractError::Timeout { hash: self.hash }
                })??,
            None => self.poll_receipt(options.polling_interval).await?,
        };

        if raw.is_failure() {
            tracing::warn!(hash = ?self.hash, "Transaction failed");
            return Err(ContractError::TransactionFailed { hash: self.hash });
        }

        tracing::info!(
            hash = ?self.hash,
            block = ?raw.block_number,
            gas_used = ?raw.gas_used,
            "Transaction confirmed"
        );
        Ok(decode_receipt(raw, &self.decoder))
    }

    async fn poll_receipt(&self, interval: Duration) -> Result<RpcReceipt, ContractError> {
        loop {
            if let Some(receipt) = self.client.get_transaction_receipt(&self.hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(interval).await;
        }
    }
}

/// Attach decoded logs to a raw receipt
pub fn decode_receipt(raw: RpcReceipt, decoder: &LogDecoder) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: raw.transaction_hash,
        block_number: raw.block_number,
        block_hash: raw.block_hash,
        from: raw.from,
        to: raw.to,
        contract_address: raw.contract_address,
        gas_used: raw.gas_used,
        status: raw.status,
        logs: raw.logs.iter().map(|log| decoder.decode(log)).collect(),
    }
}
