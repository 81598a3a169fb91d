//! Prepared contract calls

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use contract_abi::revert::is_revert_payload;
use contract_abi::{Address, Detokenize, FunctionDescriptor, LogDecoder, RevertReason, Token};

use crate::client::RpcClient;
use crate::config::RuntimeConfig;
use crate::lifecycle::{self, AwaitOptions, PendingTransaction};
use crate::types::{AccessListResult, BlockId, TransactionReceipt, TxRequest};
use crate::ContractError;

/// What a contract exposes to the calls it prepares
#[async_trait]
pub trait CallContext: Send + Sync {
    /// Contract address
    fn address(&self) -> Address;

    /// Resolve a function by name or full signature
    fn lookup_function(&self, name_or_signature: &str) -> Result<FunctionDescriptor, ContractError>;

    /// RPC client
    fn client(&self) -> &RpcClient;

    /// Runtime configuration
    fn config(&self) -> &RuntimeConfig;

    /// Decoder for logs in receipts
    fn decoder(&self) -> Arc<LogDecoder>;

    /// Decode revert data against the contract's errors
    fn decode_revert(&self, data: &[u8]) -> RevertReason {
        RevertReason::decode(data)
    }

    /// Merge configured defaults into `request`, estimating gas if asked
    async fn apply_defaults(
        &self,
        request: TxRequest,
        estimate: bool,
    ) -> Result<TxRequest, ContractError> {
        let defaults = self.config().tx_defaults();
        lifecycle::apply_defaults(self.client(), request, &defaults, estimate).await
    }

    /// `eth_call`, turning revert data into `Reverted`
    async fn perform_call(&self, request: &TxRequest, block: BlockId) -> Result<Bytes, ContractError> {
        let data = self
            .client()
            .call(request, block)
            .await
            .map_err(|e| self.revert_error(e))?;
        if is_revert_payload(&data) {
            return Err(ContractError::Reverted {
                reason: self.decode_revert(&data),
            });
        }
        Ok(data)
    }

    /// Map an RPC error carrying revert data to `Reverted`
    fn revert_error(&self, error: ContractError) -> ContractError {
        match error.revert_data() {
            Some(data) => ContractError::Reverted {
                reason: self.decode_revert(&data),
            },
            None => error,
        }
    }
}

/// Per-submission switches; unset fields follow the runtime configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Simulate before sending
    pub validate: Option<bool>,
    /// Estimate gas when the request has no limit
    pub estimate_gas: Option<bool>,
}

impl SubmitOptions {
    /// Enable or disable pre-submit validation
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = Some(validate);
        self
    }

    /// Enable or disable gas estimation
    pub fn estimate_gas(mut self, estimate: bool) -> Self {
        self.estimate_gas = Some(estimate);
        self
    }
}

/// A function bound to its arguments and a contract
///
/// The calldata is encoded once, when the handle is created.
pub struct InvocationHandle<'a> {
    context: &'a dyn CallContext,
    descriptor: FunctionDescriptor,
    args: Vec<Token>,
    calldata: Bytes,
}

impl<'a> InvocationHandle<'a> {
    /// Bind `args` to `descriptor`
    pub fn new(
        context: &'a dyn CallContext,
        descriptor: FunctionDescriptor,
        args: Vec<Token>,
    ) -> Result<Self, ContractError> {
        let calldata = descriptor.encode_call(&args)?;
        Ok(Self {
            context,
            descriptor,
            args,
            calldata,
        })
    }

    /// Encoded calldata (selector and arguments)
    pub fn calldata(&self) -> &Bytes {
        &self.calldata
    }

    /// Function selector
    pub fn selector(&self) -> [u8; 4] {
        self.descriptor.selector
    }

    /// Function descriptor
    pub fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    /// Bound arguments
    pub fn args(&self) -> &[Token] {
        &self.args
    }

    fn request(&self, overrides: TxRequest) -> TxRequest {
        TxRequest {
            to: Some(self.context.address()),
            data: Some(self.calldata.clone()),
            ..overrides
        }
    }

    /// Execute with `eth_call` and decode the outputs
    pub async fn simulate(&self, overrides: TxRequest, block: BlockId) -> Result<Vec<Token>, ContractError> {
        let request = self.context.apply_defaults(self.request(overrides), false).await?;
        self.simulate_request(&request, block).await
    }

    /// [`simulate`](Self::simulate) with typed outputs
    pub async fn simulate_as<T: Detokenize>(
        &self,
        overrides: TxRequest,
        block: BlockId,
    ) -> Result<T, ContractError> {
        let tokens = self.simulate(overrides, block).await?;
        Ok(T::from_tokens(tokens)?)
    }

    async fn simulate_request(&self, request: &TxRequest, block: BlockId) -> Result<Vec<Token>, ContractError> {
        let data = self.context.perform_call(request, block).await?;
        if data.is_empty() && !self.descriptor.outputs.is_empty() {
            return Err(ContractError::EmptyResultOnNonEmptyOutputs {
                function: self.descriptor.signature.clone(),
            });
        }
        Ok(self.descriptor.decode_output(&data)?)
    }

    /// Gas the call would use
    pub async fn estimate_cost(&self, overrides: TxRequest) -> Result<u64, ContractError> {
        let request = self.context.apply_defaults(self.request(overrides), false).await?;
        self.context
            .client()
            .estimate_gas(&request)
            .await
            .map_err(|e| self.context.revert_error(e))
    }

    /// Access list of the call
    pub async fn build_access_list(
        &self,
        overrides: TxRequest,
        block: BlockId,
    ) -> Result<AccessListResult, ContractError> {
        let request = self.context.apply_defaults(self.request(overrides), false).await?;
        self.context
            .client()
            .create_access_list(&request, block)
            .await
            .map_err(|e| self.context.revert_error(e))
    }

    /// Send the call as a transaction
    ///
    /// Unless disabled, the merged request is simulated first and a failure
    /// aborts with `ValidationFailed` before anything is sent.
    pub async fn submit(
        &self,
        overrides: TxRequest,
        options: SubmitOptions,
    ) -> Result<PendingTransaction, ContractError> {
        let config = self.context.config();
        let validate = options.validate.unwrap_or(config.validate_before_send);
        let estimate = options.estimate_gas.unwrap_or(config.estimate_gas);

        let request = self.context.apply_defaults(self.request(overrides), false).await?;
        if validate {
            if let Err(e) = self.simulate_request(&request, BlockId::Latest).await {
                tracing::warn!(
                    function = %self.descriptor.signature,
                    error = %e,
                    "Pre-submit validation failed; transaction not sent"
                );
                return Err(ContractError::ValidationFailed(Box::new(e)));
            }
        }

        let request = self.context.apply_defaults(request, estimate).await?;
        tracing::debug!(function = %self.descriptor.signature, "Submitting transaction");
        lifecycle::send(self.context.client(), &request, self.context.decoder()).await
    }

    /// Submit and wait for the receipt
    pub async fn submit_and_await(
        &self,
        overrides: TxRequest,
        submit_options: SubmitOptions,
        await_options: AwaitOptions,
    ) -> Result<TransactionReceipt, ContractError> {
        self.submit(overrides, submit_options)
            .await?
            .await_result(await_options)
            .await
    }
}

impl std::fmt::Debug for InvocationHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationHandle")
            .field("function", &self.descriptor.signature)
            .field("calldata", &contract_abi::convert::to_hex(&self.calldata))
            .finish()
    }
}
