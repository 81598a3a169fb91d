//! Descriptor tables and the shared descriptor cache

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use primitive_types::H256;

use crate::abi::Abi;
use crate::descriptor::{
    signature_of, ConstructorDescriptor, ErrorDescriptor, EventDescriptor, FunctionDescriptor,
};
use crate::event::LogDecoder;
use crate::hash::keccak256;
use crate::parse::parse_param_type;
use crate::revert::RevertReason;
use crate::types::{ParamType, Token};
use crate::AbiError;

/// All descriptors of one ABI, indexed for lookup
#[derive(Debug, Clone)]
pub struct AbiTable {
    abi: Abi,
    functions: Vec<FunctionDescriptor>,
    by_signature: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
    events: Vec<EventDescriptor>,
    events_by_topic: HashMap<H256, usize>,
    events_by_name: HashMap<String, Vec<usize>>,
    constructor: ConstructorDescriptor,
    errors: HashMap<[u8; 4], ErrorDescriptor>,
}

impl AbiTable {
    /// Build the table of a parsed ABI
    pub fn from_abi(abi: Abi) -> Result<Self, AbiError> {
        let functions = abi
            .functions()
            .map(FunctionDescriptor::from_abi)
            .collect::<Result<Vec<_>, _>>()?;
        let events = abi
            .events()
            .map(EventDescriptor::from_abi)
            .collect::<Result<Vec<_>, _>>()?;
        let constructor = abi
            .constructor()
            .map(ConstructorDescriptor::from_abi)
            .transpose()?
            .unwrap_or_default();
        let errors = abi
            .errors()
            .map(|e| ErrorDescriptor::from_abi(e).map(|d| (d.selector, d)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        let mut by_signature = HashMap::new();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, f) in functions.iter().enumerate() {
            by_signature.insert(f.signature.clone(), i);
            by_name.entry(f.name.clone()).or_default().push(i);
        }

        let mut events_by_topic = HashMap::new();
        let mut events_by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, e) in events.iter().enumerate() {
            events_by_topic.entry(e.topic).or_insert(i);
            events_by_name.entry(e.name.clone()).or_default().push(i);
        }

        Ok(Self {
            abi,
            functions,
            by_signature,
            by_name,
            events,
            events_by_topic,
            events_by_name,
            constructor,
            errors,
        })
    }

    /// Parse a JSON ABI and build its table
    pub fn from_json(json: &str) -> Result<Self, AbiError> {
        Self::from_abi(Abi::from_json(json)?)
    }

    /// The underlying ABI
    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    /// Look up a function by name or by signature
    ///
    /// A bare name must identify exactly one overload.
    pub fn function(&self, name_or_signature: &str) -> Result<&FunctionDescriptor, AbiError> {
        if name_or_signature.contains('(') {
            let signature = canonical_signature(name_or_signature)?;
            return self
                .by_signature
                .get(&signature)
                .map(|&i| &self.functions[i])
                .ok_or_else(|| AbiError::UnknownFunction(name_or_signature.to_string()));
        }
        match self.by_name.get(name_or_signature).map(Vec::as_slice) {
            Some([i]) => Ok(&self.functions[*i]),
            Some(overloads) if !overloads.is_empty() => Err(AbiError::AmbiguousFunction {
                name: name_or_signature.to_string(),
                candidates: overloads
                    .iter()
                    .map(|&i| self.functions[i].signature.clone())
                    .collect(),
            }),
            _ => Err(AbiError::UnknownFunction(name_or_signature.to_string())),
        }
    }

    /// Function whose selector starts `calldata`
    pub fn function_by_selector(&self, selector: [u8; 4]) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|f| f.selector == selector)
    }

    /// Functions in declaration order
    pub fn functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    /// Look up an event by name or signature
    pub fn event(&self, name_or_signature: &str) -> Result<&EventDescriptor, AbiError> {
        if name_or_signature.contains('(') {
            let signature = canonical_signature(name_or_signature)?;
            return self
                .events_by_topic
                .get(&keccak256(signature.as_bytes()))
                .map(|&i| &self.events[i])
                .ok_or_else(|| AbiError::UnknownEvent(name_or_signature.to_string()));
        }
        match self.events_by_name.get(name_or_signature).map(Vec::as_slice) {
            Some([i]) => Ok(&self.events[*i]),
            Some(overloads) if !overloads.is_empty() => Err(AbiError::UnknownEvent(format!(
                "{} is overloaded, use one of: {}",
                name_or_signature,
                overloads
                    .iter()
                    .map(|&i| self.events[i].signature.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
            _ => Err(AbiError::UnknownEvent(name_or_signature.to_string())),
        }
    }

    /// Event whose signature hash is `topic`
    pub fn event_by_topic(&self, topic: &H256) -> Option<&EventDescriptor> {
        self.events_by_topic.get(topic).map(|&i| &self.events[i])
    }

    /// Events in declaration order
    pub fn events(&self) -> &[EventDescriptor] {
        &self.events
    }

    /// Constructor (an empty one when the ABI declares none)
    pub fn constructor(&self) -> &ConstructorDescriptor {
        &self.constructor
    }

    /// Custom error by selector
    pub fn error_by_selector(&self, selector: [u8; 4]) -> Option<&ErrorDescriptor> {
        self.errors.get(&selector)
    }

    /// Decode revert data, trying built-in reasons then custom errors
    pub fn decode_revert(&self, data: &[u8]) -> RevertReason {
        let reason = RevertReason::decode(data);
        if !matches!(reason, RevertReason::Raw(_)) || data.len() < 4 {
            return reason;
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);
        match self.errors.get(&selector).map(|e| (e, e.decode_args(data))) {
            Some((error, Ok(args))) => RevertReason::Custom {
                name: error.name.clone(),
                args,
            },
            _ => reason,
        }
    }

    /// Log decoder over this ABI's events
    pub fn log_decoder(&self) -> LogDecoder {
        let mut decoder = LogDecoder::new();
        decoder.extend(&self.events);
        decoder
    }

    /// Canonical signature of a function
    pub fn function_signature(&self, name: &str) -> Result<String, AbiError> {
        Ok(self.function(name)?.signature.clone())
    }

    /// 4-byte selector of a function
    pub fn selector(&self, name: &str) -> Result<[u8; 4], AbiError> {
        Ok(self.function(name)?.selector)
    }

    /// Decode the arguments of calldata sent to `name`
    pub fn decode_transaction_data(
        &self,
        name: &str,
        calldata: &[u8],
    ) -> Result<Vec<Token>, AbiError> {
        self.function(name)?.decode_call(calldata)
    }

    /// Decode the return data of `name`
    pub fn decode_return_data(&self, name: &str, data: &[u8]) -> Result<Vec<Token>, AbiError> {
        self.function(name)?.decode_output(data)
    }
}

/// Normalize a user-supplied signature (`f(uint, (bool,bytes))`)
fn canonical_signature(s: &str) -> Result<String, AbiError> {
    let open = s
        .find('(')
        .ok_or_else(|| AbiError::InvalidType(format!("not a signature: {}", s)))?;
    match parse_param_type(&s[open..])? {
        ParamType::Tuple(params) => Ok(signature_of(s[..open].trim(), &params)),
        _ => Err(AbiError::InvalidType(format!("not a signature: {}", s))),
    }
}

/// Shared cache of descriptor tables
///
/// Keyed by contract name plus the hash of the canonical ABI JSON, so
/// several ABI versions of one contract can coexist.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    tables: DashMap<(String, H256), Arc<AbiTable>>,
}

impl DescriptorCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
        }
    }

    /// Table for a JSON ABI, built on first use
    pub fn get_or_load(&self, contract: &str, abi_json: &str) -> Result<Arc<AbiTable>, AbiError> {
        self.get_or_insert(contract, Abi::from_json(abi_json)?)
    }

    /// Table for a parsed ABI, built on first use
    pub fn get_or_insert(&self, contract: &str, abi: Abi) -> Result<Arc<AbiTable>, AbiError> {
        let key = (
            contract.to_string(),
            keccak256(abi.to_canonical_json()?.as_bytes()),
        );
        if let Some(table) = self.tables.get(&key) {
            return Ok(Arc::clone(table.value()));
        }

        let table = Arc::new(AbiTable::from_abi(abi)?);
        tracing::debug!(contract, functions = table.functions().len(), "Cached descriptor table");
        Ok(Arc::clone(self.tables.entry(key).or_insert(table).value()))
    }

    /// Drop every cached version of a contract
    pub fn remove(&self, contract: &str) {
        self.tables.retain(|(name, _), _| name != contract);
    }

    /// Number of cached tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Drop everything
    pub fn clear(&self) {
        self.tables.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode_function_call;
    use crate::revert::ERROR_SELECTOR;

    const TOKEN_ABI: &str = r#"[
        {"type":"function","name":"transfer","inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
        {"type":"function","name":"mint","inputs":[{"name":"amount","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"},
        {"type":"function","name":"mint","inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"},
        {"type":"function","name":"name","inputs":[],"outputs":[{"name":"","type":"string"}],"stateMutability":"view"},
        {"type":"event","name":"Transfer","inputs":[{"name":"from","type":"address","indexed":true},{"name":"to","type":"address","indexed":true},{"name":"value","type":"uint256"}]},
        {"type":"error","name":"InsufficientBalance","inputs":[{"name":"available","type":"uint256"},{"name":"required","type":"uint256"}]}
    ]"#;

    #[test]
    fn test_function_lookup() {
        let table = AbiTable::from_json(TOKEN_ABI).unwrap();
        assert_eq!(table.selector("transfer").unwrap(), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(
            table.function_signature("transfer(address, uint)").unwrap(),
            "transfer(address,uint256)"
        );
        assert!(matches!(
            table.function("missing"),
            Err(AbiError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_overloads_need_signature() {
        let table = AbiTable::from_json(TOKEN_ABI).unwrap();
        match table.function("mint") {
            Err(AbiError::AmbiguousFunction { candidates, .. }) => {
                assert_eq!(candidates, vec!["mint(uint256)", "mint(address,uint256)"]);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
        assert_eq!(table.function("mint(address,uint256)").unwrap().inputs.len(), 2);
    }

    #[test]
    fn test_transaction_and_return_data() {
        let table = AbiTable::from_json(TOKEN_ABI).unwrap();
        let f = table.function("transfer").unwrap();
        let args = vec![Token::Address(Default::default()), Token::uint(7)];
        let calldata = f.encode_call(&args).unwrap();
        assert_eq!(table.decode_transaction_data("transfer", &calldata).unwrap(), args);
        assert!(table.function_by_selector(f.selector).is_some());

        let mut out = [0u8; 32];
        out[31] = 1;
        assert_eq!(
            table.decode_return_data("transfer", &out).unwrap(),
            vec![Token::Bool(true)]
        );
    }

    #[test]
    fn test_decode_revert_custom_error() {
        let table = AbiTable::from_json(TOKEN_ABI).unwrap();
        let error = table.abi().errors().next().unwrap();
        let descriptor = ErrorDescriptor::from_abi(error).unwrap();
        let data = encode_function_call(
            descriptor.selector,
            &descriptor.inputs,
            &[Token::uint(1), Token::uint(2)],
        )
        .unwrap();
        assert_eq!(
            table.decode_revert(&data),
            RevertReason::Custom {
                name: "InsufficientBalance".to_string(),
                args: vec![Token::uint(1), Token::uint(2)],
            }
        );

        let builtin = encode_function_call(ERROR_SELECTOR, &[ParamType::String], &[Token::string("nope")])
            .unwrap();
        assert_eq!(table.decode_revert(&builtin), RevertReason::Error("nope".to_string()));
    }

    #[test]
    fn test_event_lookup() {
        let table = AbiTable::from_json(TOKEN_ABI).unwrap();
        let event = table.event("Transfer").unwrap();
        assert_eq!(table.event_by_topic(&event.topic).unwrap().name, "Transfer");
        assert_eq!(
            table.event("Transfer(address,address,uint256)").unwrap().topic,
            event.topic
        );
        assert!(matches!(table.event("Approval"), Err(AbiError::UnknownEvent(_))));
        assert_eq!(table.log_decoder().len(), 1);
    }

    #[test]
    fn test_cache_shares_tables() {
        let cache = DescriptorCache::new();
        let a = cache.get_or_load("Token", TOKEN_ABI).unwrap();
        let b = cache.get_or_load("Token", TOKEN_ABI).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        // a second ABI version of the same contract is kept alongside
        let v2 = r#"[{"type":"function","name":"burn","inputs":[],"outputs":[]}]"#;
        let c = cache.get_or_load("Token", v2).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);

        cache.remove("Token");
        assert!(cache.is_empty());
    }
}
