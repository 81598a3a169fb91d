//! Event logs: decoding, topic filters and multi-ABI log decoding

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use primitive_types::H256;
use serde::{Deserialize, Serialize};

use crate::convert::{serde_hex_bytes, serde_hex_u64_opt, Address};
use crate::decode::{decode, decode_word};
use crate::descriptor::EventDescriptor;
use crate::encode::encode;
use crate::hash::keccak256;
use crate::types::{ParamType, Token};
use crate::AbiError;

/// Raw log as returned by `eth_getLogs` and in receipts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    /// Emitting contract
    pub address: Address,
    /// Topics, signature hash first unless anonymous
    pub topics: Vec<H256>,
    /// Non-indexed arguments
    #[serde(with = "serde_hex_bytes", default)]
    pub data: Bytes,
    /// Block the log was included in
    #[serde(with = "serde_hex_u64_opt", default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Hash of that block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<H256>,
    /// Emitting transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<H256>,
    /// Position in the block
    #[serde(with = "serde_hex_u64_opt", default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
    /// Set when the log was dropped by a reorg
    #[serde(default)]
    pub removed: bool,
}

/// One decoded event argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedArg {
    /// Parameter name
    pub name: String,
    /// Decoded value; hashed indexed values are `FixedBytes(32)`
    pub value: Token,
    /// Whether the value came from a topic
    pub indexed: bool,
}

/// A log decoded against its event descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLog {
    /// Event name
    pub event: String,
    /// Canonical event signature
    pub signature: String,
    /// Arguments in declaration order
    pub args: Vec<DecodedArg>,
    /// The underlying raw log
    pub log: Log,
}

impl DecodedLog {
    /// Value of the named argument
    pub fn arg(&self, name: &str) -> Option<&Token> {
        self.args.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    /// Emitting contract
    pub fn address(&self) -> Address {
        self.log.address
    }

    /// Whether the log was removed by a chain reorganization
    pub fn removed(&self) -> bool {
        self.log.removed
    }
}

impl EventDescriptor {
    /// Decode a log emitted by this event
    ///
    /// The topic count and data layout must agree exactly with the
    /// indexed / non-indexed split of the parameters.
    pub fn decode_log(&self, log: &Log) -> Result<DecodedLog, AbiError> {
        let mismatch = |reason: String| AbiError::LogMismatch {
            event: self.signature.clone(),
            reason,
        };

        if log.topics.len() != self.topic_count() {
            return Err(mismatch(format!(
                "expected {} topics, got {}",
                self.topic_count(),
                log.topics.len()
            )));
        }
        let offset = usize::from(!self.anonymous);
        if !self.anonymous && log.topics[0] != self.topic {
            return Err(mismatch(format!("unexpected topic 0 {:?}", log.topics[0])));
        }

        let data_types = self.data_types();
        if data_types.is_empty() && !log.data.is_empty() {
            return Err(mismatch(format!(
                "{} data bytes for an event without data parameters",
                log.data.len()
            )));
        }
        if log.data.len() % 32 != 0 {
            return Err(mismatch(format!(
                "data length {} is not a multiple of 32",
                log.data.len()
            )));
        }
        let mut data_values = decode(&data_types, &log.data)
            .map_err(|e| mismatch(e.to_string()))?
            .into_iter();

        let mut topics = log.topics[offset..].iter();
        let mut args = Vec::with_capacity(self.params.len());
        for param in &self.params {
            let value = if param.indexed {
                let topic = topics
                    .next()
                    .ok_or_else(|| mismatch(format!("missing topic for {}", param.name)))?;
                decode_topic(&param.kind, topic)?
            } else {
                data_values
                    .next()
                    .ok_or_else(|| mismatch(format!("missing data for {}", param.name)))?
            };
            args.push(DecodedArg {
                name: param.name.clone(),
                value,
                indexed: param.indexed,
            });
        }

        Ok(DecodedLog {
            event: self.name.clone(),
            signature: self.signature.clone(),
            args,
            log: log.clone(),
        })
    }
}

/// Decode an indexed value; non-value types only survive as their hash
fn decode_topic(kind: &ParamType, topic: &H256) -> Result<Token, AbiError> {
    if kind.is_value_type() {
        decode_word(kind, topic.as_bytes())
    } else {
        Ok(Token::FixedBytes(topic.as_bytes().to_vec()))
    }
}

/// Topic form of an indexed value
///
/// Value types are their ABI word, `string` and `bytes` their keccak hash.
/// A 32-byte `FixedBytes` is accepted for `string`/`bytes` as an already
/// hashed value, matching what [`EventDescriptor::decode_log`] yields.
pub fn encode_topic(kind: &ParamType, value: &Token) -> Result<H256, AbiError> {
    if kind.is_value_type() {
        let word = encode(std::slice::from_ref(kind), std::slice::from_ref(value))?;
        return Ok(H256::from_slice(&word));
    }
    match (kind, value) {
        (ParamType::String, Token::String(s)) => Ok(keccak256(s.as_bytes())),
        (ParamType::Bytes, Token::Bytes(b)) => Ok(keccak256(b)),
        (ParamType::String | ParamType::Bytes, Token::FixedBytes(hash)) if hash.len() == 32 => {
            Ok(H256::from_slice(hash))
        }
        (ParamType::String | ParamType::Bytes, _) => Err(AbiError::TypeMismatch {
            expected: kind.to_string(),
            value: format!("{:?}", value),
        }),
        _ => Err(AbiError::UnsupportedTopicFilter(kind.to_string())),
    }
}

/// Equality filter over an event's indexed parameters, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedFilter {
    values: BTreeMap<String, Token>,
}

impl IndexedFilter {
    /// Empty filter, matching every log of the event
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required value (builder style)
    pub fn with(mut self, name: impl Into<String>, value: Token) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Add a required value
    pub fn insert(&mut self, name: impl Into<String>, value: Token) {
        self.values.insert(name.into(), value);
    }

    /// Whether no constraint is set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Constraints by parameter name
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Token)> {
        self.values.iter()
    }

    /// Resolve every key to `(topic position, expected topic)`
    ///
    /// Keys that are not indexed parameters of `event` are rejected.
    pub fn resolve(&self, event: &EventDescriptor) -> Result<Vec<(usize, H256)>, AbiError> {
        let offset = usize::from(!event.anonymous);
        self.values
            .iter()
            .map(|(name, value)| {
                let (position, param) = event
                    .indexed_params()
                    .enumerate()
                    .find(|(_, p)| &p.name == name)
                    .ok_or_else(|| AbiError::UnknownIndexedParam {
                        event: event.name.clone(),
                        param: name.clone(),
                    })?;
                Ok((offset + position, encode_topic(&param.kind, value)?))
            })
            .collect()
    }

    /// Topic filter for `eth_getLogs`; `None` positions match anything
    pub fn topics(&self, event: &EventDescriptor) -> Result<Vec<Option<H256>>, AbiError> {
        let mut topics = vec![None; event.topic_count()];
        if !event.anonymous {
            topics[0] = Some(event.topic);
        }
        for (position, topic) in self.resolve(event)? {
            topics[position] = Some(topic);
        }
        while topics.last() == Some(&None) {
            topics.pop();
        }
        Ok(topics)
    }

    /// Whether a log satisfies every constraint
    pub fn matches(&self, event: &EventDescriptor, log: &Log) -> Result<bool, AbiError> {
        Ok(self
            .resolve(event)?
            .iter()
            .all(|(position, topic)| log.topics.get(*position) == Some(topic)))
    }
}

/// A receipt or query log, decoded when some known event matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// Decoded against a known event
    Decoded(DecodedLog),
    /// No known event matched; kept as-is
    Raw(Log),
}

impl LogEntry {
    /// The decoded form, if any
    pub fn as_decoded(&self) -> Option<&DecodedLog> {
        match self {
            LogEntry::Decoded(decoded) => Some(decoded),
            LogEntry::Raw(_) => None,
        }
    }

    /// The raw log
    pub fn log(&self) -> &Log {
        match self {
            LogEntry::Decoded(decoded) => &decoded.log,
            LogEntry::Raw(log) => log,
        }
    }
}

/// Decodes logs against the events of several ABIs, keyed by topic
#[derive(Debug, Clone, Default)]
pub struct LogDecoder {
    events: HashMap<H256, EventDescriptor>,
}

impl LogDecoder {
    /// Empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event; the first registration of a topic wins
    pub fn add_event(&mut self, event: EventDescriptor) {
        if event.anonymous {
            return;
        }
        self.events.entry(event.topic).or_insert(event);
    }

    /// Register several events
    pub fn extend<'a>(&mut self, events: impl IntoIterator<Item = &'a EventDescriptor>) {
        for event in events {
            self.add_event(event.clone());
        }
    }

    /// Number of known event topics
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no event is known
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Decode when topic 0 names a known event
    pub fn try_decode(&self, log: &Log) -> Option<Result<DecodedLog, AbiError>> {
        let event = self.events.get(log.topics.first()?)?;
        Some(event.decode_log(log))
    }

    /// Decode or keep raw; never fails
    pub fn decode(&self, log: &Log) -> LogEntry {
        match self.try_decode(log) {
            Some(Ok(decoded)) => LogEntry::Decoded(decoded),
            Some(Err(e)) => {
                tracing::debug!(address = ?log.address, error = %e, "Log matched a known topic but failed to decode");
                LogEntry::Raw(log.clone())
            }
            None => LogEntry::Raw(log.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::Abi;
    use crate::encode::encode_u256;

    fn transfer_event() -> EventDescriptor {
        let abi = Abi::from_json(
            r#"[{"type":"event","name":"Transfer","inputs":[
                {"name":"from","type":"address","indexed":true},
                {"name":"to","type":"address","indexed":true},
                {"name":"value","type":"uint256"}]}]"#,
        )
        .unwrap();
        let desc = EventDescriptor::from_abi(abi.events().next().unwrap()).unwrap();
        desc
    }

    fn named_event() -> EventDescriptor {
        let abi = Abi::from_json(
            r#"[{"type":"event","name":"Named","inputs":[
                {"name":"label","type":"string","indexed":true},
                {"name":"owner","type":"address","indexed":false}]}]"#,
        )
        .unwrap();
        let desc = EventDescriptor::from_abi(abi.events().next().unwrap()).unwrap();
        desc
    }

    fn addr_topic(byte: u8) -> H256 {
        let mut t = H256::zero();
        t.0[31] = byte;
        t
    }

    fn transfer_log(from: u8, to: u8, value: u64) -> Log {
        Log {
            topics: vec![transfer_event().topic, addr_topic(from), addr_topic(to)],
            data: Bytes::from(encode_u256(&value.into())),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_transfer_log() {
        let decoded = transfer_event().decode_log(&transfer_log(1, 2, 1000)).unwrap();
        assert_eq!(decoded.event, "Transfer");
        assert_eq!(decoded.args.len(), 3);
        assert_eq!(decoded.arg("from").unwrap().as_address().unwrap().0[19], 1);
        assert!(decoded.args[0].indexed);
        assert!(!decoded.args[2].indexed);
        assert_eq!(decoded.arg("value"), Some(&Token::uint(1000)));
    }

    #[test]
    fn test_decode_log_topic_count_mismatch() {
        let mut log = transfer_log(1, 2, 1000);
        log.topics.pop();
        assert!(matches!(
            transfer_event().decode_log(&log),
            Err(AbiError::LogMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_log_bad_data() {
        let mut log = transfer_log(1, 2, 1000);
        log.data = Bytes::from(vec![0u8; 33]);
        assert!(matches!(
            transfer_event().decode_log(&log),
            Err(AbiError::LogMismatch { .. })
        ));

        log.data = Bytes::new();
        assert!(transfer_event().decode_log(&log).is_err());
    }

    #[test]
    fn test_indexed_string_decodes_to_hash() {
        let event = named_event();
        let log = Log {
            topics: vec![event.topic, keccak256(b"alice")],
            data: Bytes::from(vec![0u8; 32]),
            ..Default::default()
        };
        let decoded = event.decode_log(&log).unwrap();
        assert_eq!(
            decoded.arg("label"),
            Some(&Token::FixedBytes(keccak256(b"alice").as_bytes().to_vec()))
        );

        // both the plain string and the decoded hash match in topic form
        let by_string = IndexedFilter::new().with("label", Token::string("alice"));
        assert!(by_string.matches(&event, &log).unwrap());
        let by_hash = IndexedFilter::new().with("label", decoded.arg("label").unwrap().clone());
        assert!(by_hash.matches(&event, &log).unwrap());
    }

    #[test]
    fn test_filter_matches_only_requested_sender() {
        let event = transfer_event();
        let mut sender = Address::zero();
        sender.0[19] = 1;
        let filter = IndexedFilter::new().with("from", Token::Address(sender));

        assert!(filter.matches(&event, &transfer_log(1, 2, 5)).unwrap());
        assert!(!filter.matches(&event, &transfer_log(3, 1, 5)).unwrap());
    }

    #[test]
    fn test_filter_rejects_unknown_and_non_indexed_keys() {
        let event = transfer_event();
        let unknown = IndexedFilter::new().with("maker", Token::uint(1));
        assert!(matches!(
            unknown.resolve(&event),
            Err(AbiError::UnknownIndexedParam { .. })
        ));
        let not_indexed = IndexedFilter::new().with("value", Token::uint(1));
        assert!(matches!(
            not_indexed.topics(&event),
            Err(AbiError::UnknownIndexedParam { .. })
        ));
    }

    #[test]
    fn test_filter_topics_trimmed() {
        let event = transfer_event();
        assert_eq!(IndexedFilter::new().topics(&event).unwrap(), vec![Some(event.topic)]);

        let mut to = Address::zero();
        to.0[19] = 2;
        let topics = IndexedFilter::new()
            .with("to", Token::Address(to))
            .topics(&event)
            .unwrap();
        assert_eq!(topics, vec![Some(event.topic), None, Some(addr_topic(2))]);
    }

    #[test]
    fn test_log_decoder_keeps_unknown_raw() {
        let mut decoder = LogDecoder::new();
        decoder.add_event(transfer_event());

        assert!(decoder.decode(&transfer_log(1, 2, 3)).as_decoded().is_some());

        let unknown = Log {
            topics: vec![keccak256(b"Other()")],
            ..Default::default()
        };
        assert_eq!(decoder.decode(&unknown), LogEntry::Raw(unknown.clone()));
    }

    #[test]
    fn test_log_json() {
        let log: Log = serde_json::from_str(
            r#"{
                "address":"0x742d35cc6634c0532925a3b844bc9e7595f0ab3d",
                "topics":["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"],
                "data":"0x",
                "blockNumber":"0x1b4",
                "logIndex":"0x0",
                "removed":false
            }"#,
        )
        .unwrap();
        assert_eq!(log.block_number, Some(0x1b4));
        assert_eq!(log.log_index, Some(0));
        assert!(log.data.is_empty());
        assert_eq!(log.transaction_hash, None);
    }
}
