//! Transport layer for RPC communication

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::ContractError;

/// Transport trait for RPC communication (object-safe)
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send an RPC request and get JSON response
    async fn request_json(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, ContractError>;
}

/// Helper to deserialize response
pub fn deserialize_response<T: serde::de::DeserializeOwned>(
    value: Value,
) -> Result<T, ContractError> {
    serde_json::from_value(value).map_err(|e| ContractError::Serialization(e.to_string()))
}

/// Scripted reply of the mock transport
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Successful result
    Result(Value),
    /// JSON-RPC error
    Error {
        /// Error code
        code: i64,
        /// Error message
        message: String,
        /// Optional error payload
        data: Option<Value>,
    },
}

impl MockReply {
    /// Execution-reverted error carrying hex revert data
    pub fn revert(data: impl AsRef<[u8]>) -> Self {
        MockReply::Error {
            code: 3,
            message: "execution reverted".to_string(),
            data: Some(Value::String(contract_abi::convert::to_hex(data))),
        }
    }

    fn into_result(self) -> Result<Value, ContractError> {
        match self {
            MockReply::Result(value) => Ok(value),
            MockReply::Error {
                code,
                message,
                data,
            } => Err(ContractError::Rpc {
                code,
                message,
                data,
            }),
        }
    }
}

type Handler = Arc<dyn Fn(&str, &[Value]) -> Option<MockReply> + Send + Sync>;

#[derive(Default)]
struct MockState {
    queued: HashMap<String, VecDeque<MockReply>>,
    responses: HashMap<String, MockReply>,
    defaults: HashMap<String, Value>,
    handler: Option<Handler>,
    requests: Vec<(String, Vec<Value>)>,
}

/// Mock transport for testing
///
/// Replies are looked up in order: queued one-shot replies, the handler,
/// per-method replies, built-in defaults. Clones share state, so a test can
/// keep a handle and inspect the request log after the client used it.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        let mut defaults = HashMap::new();

        // Default responses for common methods
        defaults.insert("eth_chainId".to_string(), Value::String("0x1".to_string()));
        defaults.insert("eth_gasPrice".to_string(), Value::String("0x3b9aca00".to_string())); // 1 gwei
        defaults.insert("eth_blockNumber".to_string(), Value::String("0x100".to_string())); // Block 256
        defaults.insert("eth_estimateGas".to_string(), Value::String("0x5208".to_string())); // 21000
        defaults.insert("eth_sendTransaction".to_string(), Value::String(
            "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b".to_string()
        ));
        defaults.insert("eth_call".to_string(), Value::String("0x".to_string()));
        defaults.insert("eth_getCode".to_string(), Value::String("0x".to_string()));
        defaults.insert("eth_getLogs".to_string(), Value::Array(vec![]));
        defaults.insert("eth_getTransactionReceipt".to_string(), Value::Null);

        Self {
            state: Arc::new(Mutex::new(MockState {
                defaults,
                ..Default::default()
            })),
        }
    }

    /// Set a mock response for a specific method
    pub fn set_response(&self, method: &str, response: Value) {
        self.state
            .lock()
            .responses
            .insert(method.to_string(), MockReply::Result(response));
    }

    /// Make every call to a method fail
    pub fn set_error(&self, method: &str, code: i64, message: &str, data: Option<Value>) {
        self.state.lock().responses.insert(
            method.to_string(),
            MockReply::Error {
                code,
                message: message.to_string(),
                data,
            },
        );
    }

    /// Queue a one-shot reply, consumed before any other reply
    pub fn push_reply(&self, method: &str, reply: MockReply) {
        self.state
            .lock()
            .queued
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Queue a one-shot successful result
    pub fn push_response(&self, method: &str, response: Value) {
        self.push_reply(method, MockReply::Result(response));
    }

    /// Install a handler consulted after queued replies
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&str, &[Value]) -> Option<MockReply> + Send + Sync + 'static,
    {
        self.state.lock().handler = Some(Arc::new(handler));
    }

    /// Clear custom responses, queued replies and the handler
    pub fn clear_responses(&self) {
        let mut state = self.state.lock();
        state.responses.clear();
        state.queued.clear();
        state.handler = None;
    }

    /// Every request seen so far, in order
    pub fn requests(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().requests.clone()
    }

    /// Number of requests for one method
    pub fn request_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    /// Forget the request log
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request_json(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, ContractError> {
        let (queued, handler) = {
            let mut state = self.state.lock();
            state.requests.push((method.to_string(), params.clone()));
            let queued = state.queued.get_mut(method).and_then(VecDeque::pop_front);
            (queued, state.handler.clone())
        };

        if let Some(reply) = queued {
            return reply.into_result();
        }

        // Handler runs without the lock so it may use the transport itself
        if let Some(reply) = handler.and_then(|h| h(method, &params)) {
            return reply.into_result();
        }

        let state = self.state.lock();
        if let Some(reply) = state.responses.get(method) {
            return reply.clone().into_result();
        }

        // Fall back to defaults
        if let Some(response) = state.defaults.get(method) {
            return Ok(response.clone());
        }

        Err(ContractError::Rpc {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        })
    }
}

/// HTTP transport for real RPC communication
#[cfg(feature = "http")]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    request_id: std::sync::atomic::AtomicU64,
}

#[cfg(feature = "http")]
impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            request_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Transport for HttpTransport {
    async fn request_json(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, ContractError> {
        let id = self.next_id();
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        tracing::trace!(id, method, "Sending JSON-RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ContractError::Transport(e.to_string()))?;

        let response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ContractError::Transport(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(ContractError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        // `null` is a valid result (e.g. a receipt that is not mined yet)
        Ok(response.result.unwrap_or(Value::Null))
    }
}

#[cfg(feature = "http")]
#[derive(serde::Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[cfg(feature = "http")]
#[derive(serde::Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}
