//! Event subscriptions over `eth_getLogs` polling

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contract_abi::{Address, DecodedLog, EventDescriptor, IndexedFilter, Log};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::client::RpcClient;
use crate::types::{BlockId, BlockRange, LogFilter};
use crate::ContractError;

/// Identifies one subscription
pub type SubscriptionToken = u64;

/// Receives each matching log, or the error of a failed poll or decode
pub type EventCallback = Arc<dyn Fn(Result<DecodedLog, ContractError>) + Send + Sync>;

struct Subscription {
    event: String,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Subscription {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }
}

/// Polling event subscriptions of one contract
///
/// Each subscription runs as its own task. Dropping the manager cancels
/// every subscription.
pub struct SubscriptionManager {
    client: RpcClient,
    address: Address,
    default_interval: Duration,
    next_token: AtomicU64,
    subscriptions: RwLock<BTreeMap<SubscriptionToken, Subscription>>,
}

impl SubscriptionManager {
    /// Manager for the logs of `address`
    pub fn new(client: RpcClient, address: Address, default_interval: Duration) -> Self {
        Self {
            client,
            address,
            default_interval,
            next_token: AtomicU64::new(1),
            subscriptions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Start polling for `event` logs matching `filter`
    ///
    /// The first poll records the chain head; only later logs are delivered.
    /// Must be called within a tokio runtime.
    pub fn subscribe(
        &self,
        event: &EventDescriptor,
        filter: IndexedFilter,
        callback: EventCallback,
        interval: Option<Duration>,
    ) -> Result<SubscriptionToken, ContractError> {
        let interval = interval.unwrap_or(self.default_interval);
        if interval.is_zero() {
            return Err(ContractError::Config(
                "subscription poll interval must be positive".to_string(),
            ));
        }
        let topics = filter.topics(event)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ContractError::Config(format!("subscriptions need a tokio runtime: {}", e)))?;

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let cancelled = Arc::new(AtomicBool::new(false));
        let poller = Poller {
            token,
            client: self.client.clone(),
            address: self.address,
            event: event.clone(),
            filter,
            topics,
            callback,
            cancelled: Arc::clone(&cancelled),
            last_seen: None,
        };
        let task = runtime.spawn(poller.run(interval));

        self.subscriptions.write().insert(
            token,
            Subscription {
                event: event.name.clone(),
                cancelled,
                task,
            },
        );
        tracing::info!(token, event = %event.signature, address = ?self.address, "Subscribed to event");
        Ok(token)
    }

    /// Stop one subscription
    pub fn unsubscribe(&self, token: SubscriptionToken) -> Result<(), ContractError> {
        let subscription = self
            .subscriptions
            .write()
            .remove(&token)
            .ok_or(ContractError::SubscriptionNotFound(token))?;
        subscription.cancel();
        tracing::info!(token, event = %subscription.event, "Unsubscribed");
        Ok(())
    }

    /// Stop every subscription
    pub fn unsubscribe_all(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.write());
        for subscription in subscriptions.values() {
            subscription.cancel();
        }
        if !subscriptions.is_empty() {
            tracing::info!(count = subscriptions.len(), "Unsubscribed all");
        }
    }

    /// Number of active subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Whether no subscription is active
    pub fn is_empty(&self) -> bool {
        self.subscriptions.read().is_empty()
    }

    /// One-shot query of `event` logs in `range`
    ///
    /// Logs that fail to decode are skipped.
    pub async fn get_logs(
        &self,
        event: &EventDescriptor,
        range: BlockRange,
        filter: &IndexedFilter,
    ) -> Result<Vec<DecodedLog>, ContractError> {
        let query = LogFilter {
            address: self.address,
            from_block: range.from,
            to_block: range.to,
            topics: filter.topics(event)?,
        };
        let logs = self.client.get_logs(&query).await?;

        let mut decoded = Vec::with_capacity(logs.len());
        for log in &logs {
            if !filter.matches(event, log)? {
                continue;
            }
            match event.decode_log(log) {
                Ok(entry) => decoded.push(entry),
                Err(e) => {
                    tracing::warn!(event = %event.signature, error = %e, "Skipping undecodable log");
                }
            }
        }
        Ok(decoded)
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        for subscription in self.subscriptions.get_mut().values() {
            subscription.cancel();
        }
    }
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("address", &self.address)
            .field("subscriptions", &self.len())
            .finish()
    }
}

struct Poller {
    token: SubscriptionToken,
    client: RpcClient,
    address: Address,
    event: EventDescriptor,
    filter: IndexedFilter,
    topics: Vec<Option<contract_abi::H256>>,
    callback: EventCallback,
    cancelled: Arc<AtomicBool>,
    last_seen: Option<u64>,
}

impl Poller {
    async fn run(mut self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.poll().await {
                tracing::warn!(token = self.token, error = %e, "Event poll failed");
                (self.callback)(Err(e));
            }
        }
    }

    async fn poll(&mut self) -> Result<(), ContractError> {
        let head = self.client.block_number().await?;
        let Some(last_seen) = self.last_seen else {
            self.last_seen = Some(head);
            return Ok(());
        };
        if head <= last_seen {
            return Ok(());
        }

        let query = LogFilter {
            address: self.address,
            from_block: BlockId::Number(last_seen + 1),
            to_block: BlockId::Number(head),
            topics: self.topics.clone(),
        };
        let logs = self.client.get_logs(&query).await?;
        self.last_seen = Some(head);

        for log in &logs {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }
            self.dispatch(log);
        }
        Ok(())
    }

    fn dispatch(&self, log: &Log) {
        match self.filter.matches(&self.event, log) {
            Ok(true) => {}
            Ok(false) => return,
            Err(source) => {
                (self.callback)(Err(ContractError::SubscriptionDecode {
                    token: self.token,
                    source,
                }));
                return;
            }
        }
        let result = self.event.decode_log(log).map_err(|source| {
            tracing::warn!(token = self.token, error = %source, "Undecodable log");
            ContractError::SubscriptionDecode {
                token: self.token,
                source,
            }
        });
        (self.callback)(result);
    }
}
