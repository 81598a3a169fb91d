//! Revert reason decoding

use std::fmt;

use primitive_types::U256;

use crate::decode::decode;
use crate::types::{ParamType, Token};

/// Selector of `Error(string)`
pub const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Selector of `Panic(uint256)`
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Why a call reverted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    /// `require(cond, "message")` / `revert("message")`
    Error(String),
    /// Compiler-inserted panic with its code
    Panic(U256),
    /// Custom error declared in the ABI
    Custom {
        /// Error name
        name: String,
        /// Decoded arguments
        args: Vec<Token>,
    },
    /// Undecodable payload (possibly empty)
    Raw(Vec<u8>),
}

impl RevertReason {
    /// Decode the built-in `Error(string)` and `Panic(uint256)` payloads
    pub fn decode(data: &[u8]) -> Self {
        if data.len() < 4 {
            return RevertReason::Raw(data.to_vec());
        }
        let (selector, body) = data.split_at(4);
        if selector == ERROR_SELECTOR {
            if let Ok(mut tokens) = decode(&[ParamType::String], body) {
                if let Some(Token::String(message)) = tokens.pop() {
                    return RevertReason::Error(message);
                }
            }
        } else if selector == PANIC_SELECTOR {
            if let Ok(mut tokens) = decode(&[ParamType::Uint(256)], body) {
                if let Some(Token::Uint(code)) = tokens.pop() {
                    return RevertReason::Panic(code);
                }
            }
        }
        RevertReason::Raw(data.to_vec())
    }
}

/// Whether a successful-looking payload is really revert data
///
/// Some nodes return revert data as the `eth_call` result. A payload counts
/// as revert data only if it carries a built-in revert selector followed by
/// whole words.
pub fn is_revert_payload(data: &[u8]) -> bool {
    data.len() >= 4
        && data.len() % 32 == 4
        && (data[..4] == ERROR_SELECTOR || data[..4] == PANIC_SELECTOR)
}

/// Human-readable meaning of a panic code
pub fn panic_description(code: U256) -> &'static str {
    if code > U256::from(u8::MAX) {
        return "unknown panic";
    }
    match code.low_u32() {
        0x00 => "generic compiler panic",
        0x01 => "assertion failed",
        0x11 => "arithmetic overflow or underflow",
        0x12 => "division or modulo by zero",
        0x21 => "invalid enum value",
        0x22 => "invalid storage byte array encoding",
        0x31 => "pop on empty array",
        0x32 => "array index out of bounds",
        0x41 => "out of memory",
        0x51 => "call to zero-initialized function",
        _ => "unknown panic",
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevertReason::Error(message) => write!(f, "{}", message),
            RevertReason::Panic(code) => {
                write!(f, "panic 0x{:x}: {}", code, panic_description(*code))
            }
            RevertReason::Custom { name, args } => write!(f, "{}{:?}", name, args),
            RevertReason::Raw(data) if data.is_empty() => write!(f, "no reason"),
            RevertReason::Raw(data) => write!(f, "0x{}", hex::encode(data)),
        }
    }
}
