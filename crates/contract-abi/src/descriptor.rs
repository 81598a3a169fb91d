//! Function, event, constructor and error descriptors
//!
//! A descriptor is a pure function of its ABI entry: the canonical
//! signature is built from the parameter types only, so parameter names
//! never influence selectors or topics.

use bytes::Bytes;
use primitive_types::H256;

use crate::abi::{AbiConstructor, AbiErrorEntry, AbiEvent, AbiFunction, AbiParam, StateMutability};
use crate::decode::decode;
use crate::encode::{encode, encode_function_call};
use crate::hash::keccak256;
use crate::types::{ParamType, Token};
use crate::AbiError;

/// Canonical signature, e.g. `swap((address,uint256)[],bytes)`
pub fn signature_of(name: &str, params: &[ParamType]) -> String {
    let types = params
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("{}({})", name, types)
}

/// First 4 bytes of keccak256(signature)
pub fn selector_of(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash.as_bytes()[..4]);
    selector
}

fn resolve_params(params: &[AbiParam]) -> Result<(Vec<ParamType>, Vec<String>), AbiError> {
    let types = params
        .iter()
        .map(AbiParam::param_type)
        .collect::<Result<Vec<_>, _>>()?;
    let names = params.iter().map(|p| p.name.clone()).collect();
    Ok((types, names))
}

/// Callable function derived from an ABI entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    /// Function name
    pub name: String,
    /// Canonical signature
    pub signature: String,
    /// 4-byte selector
    pub selector: [u8; 4],
    /// Input types
    pub inputs: Vec<ParamType>,
    /// Input names, positionally aligned with `inputs`
    pub input_names: Vec<String>,
    /// Output types
    pub outputs: Vec<ParamType>,
    /// Output names
    pub output_names: Vec<String>,
    /// Mutability tag
    pub state_mutability: StateMutability,
}

impl FunctionDescriptor {
    /// Create a descriptor from resolved types
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<ParamType>,
        outputs: Vec<ParamType>,
        state_mutability: StateMutability,
    ) -> Self {
        let name = name.into();
        let signature = signature_of(&name, &inputs);
        let selector = selector_of(&signature);
        Self {
            input_names: vec![String::new(); inputs.len()],
            output_names: vec![String::new(); outputs.len()],
            name,
            signature,
            selector,
            inputs,
            outputs,
            state_mutability,
        }
    }

    /// Derive the descriptor of an ABI function entry
    pub fn from_abi(function: &AbiFunction) -> Result<Self, AbiError> {
        let (inputs, input_names) = resolve_params(&function.inputs)?;
        let (outputs, output_names) = resolve_params(&function.outputs)?;
        let signature = signature_of(&function.name, &inputs);
        Ok(Self {
            name: function.name.clone(),
            selector: selector_of(&signature),
            signature,
            inputs,
            input_names,
            outputs,
            output_names,
            state_mutability: function.state_mutability,
        })
    }

    /// Whether the function is `view` or `pure`
    pub fn is_read_only(&self) -> bool {
        self.state_mutability.is_read_only()
    }

    /// selector || encoded arguments
    pub fn encode_call(&self, args: &[Token]) -> Result<Bytes, AbiError> {
        encode_function_call(self.selector, &self.inputs, args).map(Bytes::from)
    }

    /// Decode the arguments of a transaction's calldata
    ///
    /// The leading selector must be this function's selector.
    pub fn decode_call(&self, calldata: &[u8]) -> Result<Vec<Token>, AbiError> {
        if calldata.len() < 4 {
            return Err(AbiError::malformed(format!(
                "calldata of {} bytes has no selector",
                calldata.len()
            )));
        }
        if calldata[..4] != self.selector {
            return Err(AbiError::SelectorMismatch {
                expected: hex::encode(self.selector),
                got: hex::encode(&calldata[..4]),
            });
        }
        decode(&self.inputs, &calldata[4..])
    }

    /// Decode the function's return data
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<Token>, AbiError> {
        decode(&self.outputs, data)
    }
}

/// One parameter of an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventParam {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub kind: ParamType,
    /// Stored in a topic rather than in data
    pub indexed: bool,
}

/// Event derived from an ABI entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    /// Event name
    pub name: String,
    /// Canonical signature
    pub signature: String,
    /// keccak256(signature), topic 0 of non-anonymous logs
    pub topic: H256,
    /// Anonymous events emit no signature topic
    pub anonymous: bool,
    /// Parameters in declaration order
    pub params: Vec<EventParam>,
}

impl EventDescriptor {
    /// Derive the descriptor of an ABI event entry
    pub fn from_abi(event: &AbiEvent) -> Result<Self, AbiError> {
        let params = event
            .inputs
            .iter()
            .map(|p| {
                Ok(EventParam {
                    name: p.name.clone(),
                    kind: p.param_type()?,
                    indexed: p.indexed,
                })
            })
            .collect::<Result<Vec<_>, AbiError>>()?;
        let types = params.iter().map(|p| p.kind.clone()).collect::<Vec<_>>();
        let signature = signature_of(&event.name, &types);
        Ok(Self {
            name: event.name.clone(),
            topic: keccak256(signature.as_bytes()),
            signature,
            anonymous: event.anonymous,
            params,
        })
    }

    /// Indexed parameters in topic order
    pub fn indexed_params(&self) -> impl Iterator<Item = &EventParam> {
        self.params.iter().filter(|p| p.indexed)
    }

    /// Types of the parameters carried in `data`
    pub fn data_types(&self) -> Vec<ParamType> {
        self.params
            .iter()
            .filter(|p| !p.indexed)
            .map(|p| p.kind.clone())
            .collect()
    }

    /// Number of topics a matching log carries
    pub fn topic_count(&self) -> usize {
        self.indexed_params().count() + usize::from(!self.anonymous)
    }
}

/// Constructor derived from an ABI entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstructorDescriptor {
    /// Input types
    pub inputs: Vec<ParamType>,
    /// Input names
    pub input_names: Vec<String>,
    /// Whether the constructor accepts value
    pub payable: bool,
}

impl ConstructorDescriptor {
    /// Derive the descriptor of an ABI constructor entry
    pub fn from_abi(constructor: &AbiConstructor) -> Result<Self, AbiError> {
        let (inputs, input_names) = resolve_params(&constructor.inputs)?;
        Ok(Self {
            inputs,
            input_names,
            payable: constructor.state_mutability == Some(StateMutability::Payable),
        })
    }

    /// Encode constructor arguments (appended to creation code)
    pub fn encode_args(&self, args: &[Token]) -> Result<Vec<u8>, AbiError> {
        encode(&self.inputs, args)
    }
}

/// Custom error derived from an ABI entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDescriptor {
    /// Error name
    pub name: String,
    /// Canonical signature
    pub signature: String,
    /// 4-byte selector
    pub selector: [u8; 4],
    /// Input types
    pub inputs: Vec<ParamType>,
    /// Input names
    pub input_names: Vec<String>,
}

impl ErrorDescriptor {
    /// Derive the descriptor of an ABI error entry
    pub fn from_abi(error: &AbiErrorEntry) -> Result<Self, AbiError> {
        let (inputs, input_names) = resolve_params(&error.inputs)?;
        let signature = signature_of(&error.name, &inputs);
        Ok(Self {
            name: error.name.clone(),
            selector: selector_of(&signature),
            signature,
            inputs,
            input_names,
        })
    }

    /// Decode the arguments following the selector
    pub fn decode_args(&self, data: &[u8]) -> Result<Vec<Token>, AbiError> {
        decode(&self.inputs, data.get(4..).unwrap_or_default())
    }
}
