//! RPC request and response types

use bytes::Bytes;
use contract_abi::convert::serde_hex_u64_opt;
use contract_abi::{Address, Log, LogEntry, H256, U256};
use serde::{Deserialize, Serialize};

/// Block identifier for RPC queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockId {
    /// Block number
    Number(u64),
    /// Latest block
    #[default]
    Latest,
    /// Pending block (includes pending transactions)
    Pending,
    /// Earliest block (genesis)
    Earliest,
    /// Safe block (finalized by consensus)
    Safe,
    /// Finalized block
    Finalized,
}

impl Serialize for BlockId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            BlockId::Number(n) => serializer.serialize_str(&format!("0x{:x}", n)),
            BlockId::Latest => serializer.serialize_str("latest"),
            BlockId::Pending => serializer.serialize_str("pending"),
            BlockId::Earliest => serializer.serialize_str("earliest"),
            BlockId::Safe => serializer.serialize_str("safe"),
            BlockId::Finalized => serializer.serialize_str("finalized"),
        }
    }
}

impl From<u64> for BlockId {
    fn from(n: u64) -> Self {
        BlockId::Number(n)
    }
}

/// Transaction request used for calls, estimates, access lists and sends
///
/// Every field is optional; absent fields are omitted from the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxRequest {
    /// Sender address
    pub from: Option<Address>,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Gas limit
    pub gas: Option<u64>,
    /// Gas price (legacy)
    pub gas_price: Option<u128>,
    /// Max fee per gas (EIP-1559)
    pub max_fee_per_gas: Option<u128>,
    /// Max priority fee per gas (EIP-1559)
    pub max_priority_fee_per_gas: Option<u128>,
    /// Value to transfer
    pub value: Option<U256>,
    /// Sender nonce
    pub nonce: Option<u64>,
    /// Input data
    pub data: Option<Bytes>,
}

impl TxRequest {
    /// Fill every absent field from `defaults`; present fields win
    pub fn merge_defaults(mut self, defaults: &TxRequest) -> Self {
        self.from = self.from.or(defaults.from);
        self.to = self.to.or(defaults.to);
        self.gas = self.gas.or(defaults.gas);
        self.gas_price = self.gas_price.or(defaults.gas_price);
        self.max_fee_per_gas = self.max_fee_per_gas.or(defaults.max_fee_per_gas);
        self.max_priority_fee_per_gas = self
            .max_priority_fee_per_gas
            .or(defaults.max_priority_fee_per_gas);
        self.value = self.value.or(defaults.value);
        self.nonce = self.nonce.or(defaults.nonce);
        if self.data.is_none() {
            self.data = defaults.data.clone();
        }
        self
    }

    /// Set the sender
    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the gas limit
    pub fn gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    /// Set the legacy gas price
    pub fn gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    /// Set the value to transfer
    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    /// Set the nonce
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }
}

impl Serialize for TxRequest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;

        if let Some(from) = &self.from {
            map.serialize_entry("from", from)?;
        }
        if let Some(to) = &self.to {
            map.serialize_entry("to", to)?;
        }
        if let Some(gas) = &self.gas {
            map.serialize_entry("gas", &format!("0x{:x}", gas))?;
        }
        if let Some(gas_price) = &self.gas_price {
            map.serialize_entry("gasPrice", &format!("0x{:x}", gas_price))?;
        }
        if let Some(max_fee) = &self.max_fee_per_gas {
            map.serialize_entry("maxFeePerGas", &format!("0x{:x}", max_fee))?;
        }
        if let Some(max_priority) = &self.max_priority_fee_per_gas {
            map.serialize_entry("maxPriorityFeePerGas", &format!("0x{:x}", max_priority))?;
        }
        if let Some(value) = &self.value {
            map.serialize_entry("value", &format!("0x{:x}", value))?;
        }
        if let Some(nonce) = &self.nonce {
            map.serialize_entry("nonce", &format!("0x{:x}", nonce))?;
        }
        if let Some(data) = &self.data {
            map.serialize_entry("data", &format!("0x{}", hex::encode(data)))?;
        }

        map.end()
    }
}

/// One entry of an access list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItem {
    /// Accessed account
    pub address: Address,
    /// Accessed storage slots
    pub storage_keys: Vec<H256>,
}

/// Result of `eth_createAccessList`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListResult {
    /// Accounts and slots the call touches
    pub access_list: Vec<AccessListItem>,
    /// Gas used with the access list applied
    pub gas_used: U256,
    /// Execution error reported alongside the list, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Receipt as returned by `eth_getTransactionReceipt`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    /// Transaction hash
    pub transaction_hash: H256,
    /// Block containing the transaction
    #[serde(with = "serde_hex_u64_opt", default)]
    pub block_number: Option<u64>,
    /// Hash of that block
    #[serde(default)]
    pub block_hash: Option<H256>,
    /// Sender
    #[serde(default)]
    pub from: Option<Address>,
    /// Recipient (None for creations)
    #[serde(default)]
    pub to: Option<Address>,
    /// Address of a created contract
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// Gas used by this transaction
    #[serde(with = "serde_hex_u64_opt", default)]
    pub gas_used: Option<u64>,
    /// 1 for success, 0 for failure (absent before Byzantium)
    #[serde(with = "serde_hex_u64_opt", default)]
    pub status: Option<u64>,
    /// Emitted logs
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl RpcReceipt {
    /// Whether the receipt reports failure
    pub fn is_failure(&self) -> bool {
        self.status == Some(0)
    }
}

/// Mined transaction with its logs decoded by the known ABIs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Transaction hash
    pub transaction_hash: H256,
    /// Block containing the transaction
    pub block_number: Option<u64>,
    /// Hash of that block
    pub block_hash: Option<H256>,
    /// Sender
    pub from: Option<Address>,
    /// Recipient
    pub to: Option<Address>,
    /// Address of a created contract
    pub contract_address: Option<Address>,
    /// Gas used
    pub gas_used: Option<u64>,
    /// Status code
    pub status: Option<u64>,
    /// Logs, decoded where an event matched
    pub logs: Vec<LogEntry>,
}

impl TransactionReceipt {
    /// Decoded logs of the named event
    pub fn events<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a contract_abi::DecodedLog> {
        self.logs
            .iter()
            .filter_map(LogEntry::as_decoded)
            .filter(move |log| log.event == name)
    }
}

/// Inclusive block range for log queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockRange {
    /// First block
    pub from: BlockId,
    /// Last block
    pub to: BlockId,
}

impl BlockRange {
    /// Range between two block numbers
    pub fn new(from: u64, to: u64) -> Self {
        Self {
            from: BlockId::Number(from),
            to: BlockId::Number(to),
        }
    }
}

/// Filter object for `eth_getLogs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    /// Emitting contract
    pub address: Address,
    /// First block
    pub from_block: BlockId,
    /// Last block
    pub to_block: BlockId,
    /// Topic constraints by position; `null` matches anything
    pub topics: Vec<Option<H256>>,
}
