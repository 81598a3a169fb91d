//! JSON ABI model
//!
//! Mirrors the compiler's JSON ABI: a list of entries tagged by `type`.
//! Entries are immutable once loaded; descriptors are derived from them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::parse::{apply_array_suffix, parse_param_type};
use crate::types::ParamType;
use crate::AbiError;

/// One input or output parameter of an ABI entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    /// Parameter name (may be empty)
    #[serde(default)]
    pub name: String,
    /// Solidity type string, `tuple` / `tuple[]` for structs
    #[serde(rename = "type")]
    pub ty: String,
    /// Struct members when `ty` is a tuple type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
    /// Whether an event parameter is stored in a topic
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub indexed: bool,
    /// Compiler's source-level type name
    #[serde(
        rename = "internalType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub internal_type: Option<String>,
}

impl AbiParam {
    /// Create a parameter from a name and type string
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            components: Vec::new(),
            indexed: false,
            internal_type: None,
        }
    }

    /// Mark the parameter as indexed
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Resolve the declared type, expanding `tuple` from `components`
    pub fn param_type(&self) -> Result<ParamType, AbiError> {
        if let Some(suffix) = self.ty.strip_prefix("tuple") {
            let members = self
                .components
                .iter()
                .map(AbiParam::param_type)
                .collect::<Result<Vec<_>, _>>()?;
            return apply_array_suffix(ParamType::Tuple(members), suffix);
        }
        parse_param_type(&self.ty)
    }
}

/// Function state mutability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    /// Reads nothing from state
    Pure,
    /// Reads but never writes state
    View,
    /// Writes state, rejects value
    #[default]
    NonPayable,
    /// Writes state, accepts value
    Payable,
}

impl StateMutability {
    /// Whether calling never mutates state
    pub fn is_read_only(&self) -> bool {
        matches!(self, StateMutability::Pure | StateMutability::View)
    }

    /// Derive mutability from pre-0.4.16 `constant` / `payable` flags
    fn from_legacy(constant: Option<bool>, payable: Option<bool>) -> Self {
        match (constant, payable) {
            (Some(true), _) => StateMutability::View,
            (_, Some(true)) => StateMutability::Payable,
            _ => StateMutability::NonPayable,
        }
    }
}

/// Function entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawFunction")]
pub struct AbiFunction {
    /// Function name
    pub name: String,
    /// Input parameters
    pub inputs: Vec<AbiParam>,
    /// Output parameters
    pub outputs: Vec<AbiParam>,
    /// Mutability tag
    pub state_mutability: StateMutability,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFunction {
    name: String,
    #[serde(default)]
    inputs: Vec<AbiParam>,
    #[serde(default)]
    outputs: Vec<AbiParam>,
    state_mutability: Option<StateMutability>,
    constant: Option<bool>,
    payable: Option<bool>,
}

impl From<RawFunction> for AbiFunction {
    fn from(raw: RawFunction) -> Self {
        let state_mutability = raw
            .state_mutability
            .unwrap_or_else(|| StateMutability::from_legacy(raw.constant, raw.payable));
        Self {
            name: raw.name,
            inputs: raw.inputs,
            outputs: raw.outputs,
            state_mutability,
        }
    }
}

/// Event entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEvent {
    /// Event name
    pub name: String,
    /// Parameters, each with its `indexed` flag
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    /// Anonymous events carry no signature topic
    #[serde(default)]
    pub anonymous: bool,
}

/// Constructor entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiConstructor {
    /// Constructor parameters
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    /// Mutability tag (payable or nonpayable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_mutability: Option<StateMutability>,
}

/// Custom error entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiErrorEntry {
    /// Error name
    pub name: String,
    /// Error parameters
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
}

/// Fallback / receive entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiSpecial {
    /// Mutability tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_mutability: Option<StateMutability>,
}

/// One entry of a JSON ABI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AbiEntry {
    /// `function`
    Function(AbiFunction),
    /// `event`
    Event(AbiEvent),
    /// `constructor`
    Constructor(AbiConstructor),
    /// `fallback`
    Fallback(AbiSpecial),
    /// `receive`
    Receive(AbiSpecial),
    /// `error`
    Error(AbiErrorEntry),
}

/// A contract's JSON ABI
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Abi {
    /// Entries in declaration order
    pub entries: Vec<AbiEntry>,
}

impl<'de> Deserialize<'de> for Abi {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Abi::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl Abi {
    /// Parse a JSON ABI string
    pub fn from_json(json: &str) -> Result<Self, AbiError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Build from an already parsed JSON array
    pub fn from_value(value: Value) -> Result<Self, AbiError> {
        let Value::Array(items) = value else {
            return Err(AbiError::Serialization("ABI must be a JSON array".to_string()));
        };
        let entries = items
            .into_iter()
            .map(|mut item| {
                // entries without a type tag are functions
                if let Value::Object(map) = &mut item {
                    map.entry("type")
                        .or_insert_with(|| Value::String("function".to_string()));
                }
                serde_json::from_value(item)
            })
            .collect::<Result<Vec<AbiEntry>, _>>()?;
        Ok(Self { entries })
    }

    /// Canonical JSON rendering, stable for equal ABIs
    pub fn to_canonical_json(&self) -> Result<String, AbiError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Function entries
    pub fn functions(&self) -> impl Iterator<Item = &AbiFunction> {
        self.entries.iter().filter_map(|e| match e {
            AbiEntry::Function(f) => Some(f),
            _ => None,
        })
    }

    /// Event entries
    pub fn events(&self) -> impl Iterator<Item = &AbiEvent> {
        self.entries.iter().filter_map(|e| match e {
            AbiEntry::Event(ev) => Some(ev),
            _ => None,
        })
    }

    /// Custom error entries
    pub fn errors(&self) -> impl Iterator<Item = &AbiErrorEntry> {
        self.entries.iter().filter_map(|e| match e {
            AbiEntry::Error(err) => Some(err),
            _ => None,
        })
    }

    /// The constructor, if declared
    pub fn constructor(&self) -> Option<&AbiConstructor> {
        self.entries.iter().find_map(|e| match e {
            AbiEntry::Constructor(c) => Some(c),
            _ => None,
        })
    }
}
