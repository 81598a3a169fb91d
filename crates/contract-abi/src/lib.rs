//! # contract-abi
//!
//! Solidity ABI support for the contract runtime.
//!
//! ## Features
//!
//! - **Codec**: head/tail encoding and bounds-checked decoding of nested values
//! - **Descriptors**: function, event, constructor and error descriptors
//!   derived from a JSON ABI, with canonical signatures and selectors
//! - **AbiTable / DescriptorCache**: indexed descriptor tables shared by name
//!   and ABI hash
//! - **Logs**: event log decoding, indexed-argument filters, revert reasons
//! - **Artifacts**: compiler artifacts and library linking
//!
//! ## Example
//!
//! ```rust
//! use contract_abi::{AbiTable, Token, convert::address_from_hex};
//!
//! let table = AbiTable::from_json(r#"[
//!     {"type":"function","name":"transfer",
//!      "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
//!      "outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"}
//! ]"#).unwrap();
//!
//! let to = address_from_hex("0x742d35Cc6634C0532925a3b844Bc9e7595f0aB3d").unwrap();
//! let transfer = table.function("transfer").unwrap();
//! let data = transfer.encode_call(&[Token::Address(to), Token::uint(1000)]).unwrap();
//! assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod abi;
pub mod artifact;
mod cache;
pub mod convert;
mod decode;
mod descriptor;
mod encode;
mod error;
pub mod event;
mod hash;
mod parse;
pub mod revert;
mod tokens;
mod types;

pub use abi::{Abi, AbiEntry, AbiParam, StateMutability};
pub use artifact::{ContractArtifact, LinkOffset, LinkReferenceMap, LinkableBytecode};
pub use cache::{AbiTable, DescriptorCache};
pub use convert::Address;
pub use decode::{decode, decode_output};
pub use descriptor::{
    selector_of, signature_of, ConstructorDescriptor, ErrorDescriptor, EventDescriptor,
    EventParam, FunctionDescriptor,
};
pub use encode::{encode, encode_function_call};
pub use error::AbiError;
pub use event::{DecodedArg, DecodedLog, IndexedFilter, Log, LogDecoder, LogEntry};
pub use hash::keccak256;
pub use parse::parse_param_type;
pub use revert::RevertReason;
pub use tokens::{Detokenize, Tokenizable, Tokenize};
pub use types::{ParamType, Token, I256};

// Re-export primitives for convenience
pub use primitive_types::{H160, H256, U256};
