//! Contract instances

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use contract_abi::{
    AbiTable, Address, DecodedLog, FunctionDescriptor, IndexedFilter, Log, LogDecoder, LogEntry,
    RevertReason, Token, Tokenize,
};

use crate::client::RpcClient;
use crate::config::RuntimeConfig;
use crate::invocation::{CallContext, InvocationHandle, SubmitOptions};
use crate::lifecycle::PendingTransaction;
use crate::subscription::{EventCallback, SubscriptionManager, SubscriptionToken};
use crate::types::{BlockId, BlockRange, TxRequest};
use crate::ContractError;

/// A deployed contract: address, ABI, client and event subscriptions
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use contract_abi::{AbiTable, Address, Token};
/// use contract_runtime::{BlockId, Contract, RpcClient, TxRequest};
///
/// # async fn example() -> Result<(), contract_runtime::ContractError> {
/// let table = Arc::new(AbiTable::from_json(r#"[{"type":"function","name":"balanceOf",
///     "inputs":[{"name":"owner","type":"address"}],
///     "outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"}]"#)?);
/// let client = RpcClient::connect("http://localhost:8545").await?;
/// let token = Contract::new(Address::repeat_byte(0x11), table, client);
///
/// let balance = token
///     .method("balanceOf", vec![Token::Address(Address::zero())])?
///     .simulate(TxRequest::default(), BlockId::Latest)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Contract {
    address: Address,
    table: Arc<AbiTable>,
    client: RpcClient,
    config: RuntimeConfig,
    decoder: Arc<LogDecoder>,
    subscriptions: SubscriptionManager,
}

impl Contract {
    /// Bind an ABI to an address with the default configuration
    pub fn new(address: Address, table: Arc<AbiTable>, client: RpcClient) -> Self {
        let config = RuntimeConfig::default();
        let decoder = Arc::new(table.log_decoder());
        let subscriptions =
            SubscriptionManager::new(client.clone(), address, config.subscription_poll_interval());
        Self {
            address,
            table,
            client,
            config,
            decoder,
            subscriptions,
        }
    }

    /// Replace the runtime configuration
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.subscriptions = SubscriptionManager::new(
            self.client.clone(),
            self.address,
            config.subscription_poll_interval(),
        );
        self.config = config;
        self
    }

    /// Also decode receipt logs emitted by these ABIs
    ///
    /// Events of the contract's own ABI take precedence on topic clashes.
    pub fn with_log_decode_dependencies<'a>(
        mut self,
        tables: impl IntoIterator<Item = &'a AbiTable>,
    ) -> Self {
        let mut decoder = self.table.log_decoder();
        for table in tables {
            decoder.extend(table.events());
        }
        self.decoder = Arc::new(decoder);
        self
    }

    /// Contract address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Descriptor table
    pub fn table(&self) -> &Arc<AbiTable> {
        &self.table
    }

    /// RPC client
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Prepare a call by function name or full signature
    pub fn method(
        &self,
        name_or_signature: &str,
        args: Vec<Token>,
    ) -> Result<InvocationHandle<'_>, ContractError> {
        let descriptor = self.lookup_function(name_or_signature)?;
        InvocationHandle::new(self, descriptor, args)
    }

    /// [`method`](Self::method) with typed arguments
    pub fn method_with<A: Tokenize>(
        &self,
        name_or_signature: &str,
        args: A,
    ) -> Result<InvocationHandle<'_>, ContractError> {
        self.method(name_or_signature, args.into_tokens())
    }

    /// Prepare a call from an explicit descriptor
    pub fn invoke(
        &self,
        descriptor: &FunctionDescriptor,
        args: Vec<Token>,
    ) -> Result<InvocationHandle<'_>, ContractError> {
        InvocationHandle::new(self, descriptor.clone(), args)
    }

    /// Decode a log with this contract's decoder
    pub fn decode_log(&self, log: &Log) -> LogEntry {
        self.decoder.decode(log)
    }

    /// Whether code exists at the contract address
    pub async fn is_deployed(&self) -> Result<bool, ContractError> {
        let code = self.client.get_code(&self.address, BlockId::Latest).await?;
        Ok(!code.is_empty())
    }

    /// Subscription manager of this contract
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }
}

impl std::fmt::Debug for Contract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contract")
            .field("address", &self.address)
            .field("functions", &self.table.functions().len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

#[async_trait]
impl CallContext for Contract {
    fn address(&self) -> Address {
        self.address
    }

    fn lookup_function(&self, name_or_signature: &str) -> Result<FunctionDescriptor, ContractError> {
        Ok(self.table.function(name_or_signature)?.clone())
    }

    fn client(&self) -> &RpcClient {
        &self.client
    }

    fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn decoder(&self) -> Arc<LogDecoder> {
        Arc::clone(&self.decoder)
    }

    fn decode_revert(&self, data: &[u8]) -> RevertReason {
        self.table.decode_revert(data)
    }
}

/// Read-only calls
#[async_trait]
pub trait Callable {
    /// Simulate `name` with `args` and return the decoded outputs
    async fn call_function(
        &self,
        name: &str,
        args: Vec<Token>,
        block: BlockId,
    ) -> Result<Vec<Token>, ContractError>;
}

/// State-changing transactions
#[async_trait]
pub trait Submittable {
    /// Submit `name` with `args`, validating first per configuration
    async fn submit_function(
        &self,
        name: &str,
        args: Vec<Token>,
        overrides: TxRequest,
    ) -> Result<PendingTransaction, ContractError>;
}

/// Event subscriptions and log queries
#[async_trait]
pub trait Subscribable {
    /// Poll for `event` logs matching `filter`
    ///
    /// `interval` overrides the configured subscription poll interval.
    fn subscribe(
        &self,
        event: &str,
        filter: IndexedFilter,
        callback: EventCallback,
        interval: Option<Duration>,
    ) -> Result<SubscriptionToken, ContractError>;

    /// Stop one subscription
    fn unsubscribe(&self, token: SubscriptionToken) -> Result<(), ContractError>;

    /// Stop every subscription
    fn unsubscribe_all(&self);

    /// One-shot log query
    async fn get_logs(
        &self,
        event: &str,
        range: BlockRange,
        filter: IndexedFilter,
    ) -> Result<Vec<DecodedLog>, ContractError>;
}

#[async_trait]
impl Callable for Contract {
    async fn call_function(
        &self,
        name: &str,
        args: Vec<Token>,
        block: BlockId,
    ) -> Result<Vec<Token>, ContractError> {
        self.method(name, args)?
            .simulate(TxRequest::default(), block)
            .await
    }
}

#[async_trait]
impl Submittable for Contract {
    async fn submit_function(
        &self,
        name: &str,
        args: Vec<Token>,
        overrides: TxRequest,
    ) -> Result<PendingTransaction, ContractError> {
        self.method(name, args)?
            .submit(overrides, SubmitOptions::default())
            .await
    }
}

#[async_trait]
impl Subscribable for Contract {
    fn subscribe(
        &self,
        event: &str,
        filter: IndexedFilter,
        callback: EventCallback,
        interval: Option<Duration>,
    ) -> Result<SubscriptionToken, ContractError> {
        let event = self.table.event(event)?;
        self.subscriptions.subscribe(event, filter, callback, interval)
    }

    fn unsubscribe(&self, token: SubscriptionToken) -> Result<(), ContractError> {
        self.subscriptions.unsubscribe(token)
    }

    fn unsubscribe_all(&self) {
        self.subscriptions.unsubscribe_all();
    }

    async fn get_logs(
        &self,
        event: &str,
        range: BlockRange,
        filter: IndexedFilter,
    ) -> Result<Vec<DecodedLog>, ContractError> {
        let event = self.table.event(event)?;
        self.subscriptions.get_logs(event, range, &filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use contract_abi::{AbiError, U256};
    use serde_json::json;

    const TOKEN_ABI: &str = r#"[
        {"type":"function","name":"balanceOf","inputs":[{"name":"owner","type":"address"}],
         "outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
        {"type":"function","name":"transfer","inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
         "outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
        {"type":"function","name":"transfer","inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"},{"name":"memo","type":"bytes"}],
         "outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"}
    ]"#;

    fn contract(transport: &MockTransport) -> Contract {
        Contract::new(
            Address::repeat_byte(0x11),
            Arc::new(AbiTable::from_json(TOKEN_ABI).unwrap()),
            RpcClient::with_transport(transport.clone()),
        )
    }

    #[test]
    fn test_overloads_need_full_signature() {
        let transport = MockTransport::new();
        let contract = contract(&transport);
        let err = contract
            .method("transfer", vec![Token::Address(Address::zero()), Token::uint(1)])
            .unwrap_err();
        assert!(matches!(err, ContractError::Abi(AbiError::AmbiguousFunction { .. })));

        let handle = contract
            .method(
                "transfer(address,uint256)",
                vec![Token::Address(Address::zero()), Token::uint(1)],
            )
            .unwrap();
        assert_eq!(handle.selector(), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_typed_arguments() {
        let transport = MockTransport::new();
        let contract = contract(&transport);
        let owner = Address::repeat_byte(0x22);
        let typed = contract.method_with("balanceOf", (owner,)).unwrap();
        let untyped = contract.method("balanceOf", vec![Token::Address(owner)]).unwrap();
        assert_eq!(typed.calldata(), untyped.calldata());
    }

    #[tokio::test]
    async fn test_callable_simulates() {
        let transport = MockTransport::new();
        transport.set_response(
            "eth_call",
            json!("0x00000000000000000000000000000000000000000000000000000000000003e8"),
        );
        let contract = contract(&transport);

        let out = contract
            .call_function("balanceOf", vec![Token::Address(Address::zero())], BlockId::Latest)
            .await
            .unwrap();
        assert_eq!(out, vec![Token::Uint(U256::from(1000))]);

        let typed: U256 = contract
            .method_with("balanceOf", (Address::zero(),))
            .unwrap()
            .simulate_as(TxRequest::default(), BlockId::Number(7))
            .await
            .unwrap();
        assert_eq!(typed, U256::from(1000));
        assert_eq!(transport.requests()[1].1[1], "0x7");
    }

    #[tokio::test]
    async fn test_is_deployed() {
        let transport = MockTransport::new();
        let contract = contract(&transport);
        assert!(!contract.is_deployed().await.unwrap());
        transport.set_response("eth_getCode", json!("0x6080"));
        assert!(contract.is_deployed().await.unwrap());
    }
}
