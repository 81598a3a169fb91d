//! ABI error types

use thiserror::Error;

/// Error raised by the codec, descriptors and bytecode linker
#[derive(Debug, Error)]
pub enum AbiError {
    /// Structural violation while decoding (bad offset, bad length, truncated buffer)
    #[error("malformed calldata: {0}")]
    MalformedCalldata(String),

    /// Type string could not be parsed or is unsupported
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// Wrong number of values for a parameter list
    #[error("expected {expected} arguments, got {got}")]
    ArgumentCount {
        /// Declared parameter count
        expected: usize,
        /// Supplied value count
        got: usize,
    },

    /// Value does not fit its declared type
    #[error("value {value} does not match type {expected}")]
    TypeMismatch {
        /// Canonical declared type
        expected: String,
        /// Debug rendering of the offending value
        value: String,
    },

    /// No function with this name or signature
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Name refers to several overloads
    #[error("ambiguous function name {name}, use one of: {candidates:?}")]
    AmbiguousFunction {
        /// Requested name
        name: String,
        /// Matching signatures
        candidates: Vec<String>,
    },

    /// No event with this name or signature
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Calldata selector differs from the descriptor's selector
    #[error("selector mismatch: expected 0x{expected}, got 0x{got}")]
    SelectorMismatch {
        /// Hex of the expected selector
        expected: String,
        /// Hex of the selector found in the data
        got: String,
    },

    /// Log topics or data disagree with the event's indexed/non-indexed split
    #[error("log does not match event {event}: {reason}")]
    LogMismatch {
        /// Event signature
        event: String,
        /// What was inconsistent
        reason: String,
    },

    /// Filter key that is not an indexed parameter of the event
    #[error("{param} is not an indexed parameter of event {event}")]
    UnknownIndexedParam {
        /// Event name
        event: String,
        /// Offending filter key
        param: String,
    },

    /// Indexed parameter type that cannot be turned into a topic
    #[error("cannot filter on indexed parameter of type {0}")]
    UnsupportedTopicFilter(String),

    /// Bytecode still references a library with no known address
    #[error("unlinked library reference: {0}")]
    UnlinkedLibrary(String),

    /// Bytecode is not valid hex or a link range is out of bounds
    #[error("invalid bytecode: {0}")]
    InvalidBytecode(String),

    /// Decoded tokens cannot be converted into the requested Rust type
    #[error("invalid output type: {0}")]
    InvalidOutputType(String),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid hex string
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl AbiError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        AbiError::MalformedCalldata(msg.into())
    }
}

impl From<hex::FromHexError> for AbiError {
    fn from(e: hex::FromHexError) -> Self {
        AbiError::InvalidHex(e.to_string())
    }
}

impl From<serde_json::Error> for AbiError {
    fn from(e: serde_json::Error) -> Self {
        AbiError::Serialization(e.to_string())
    }
}
