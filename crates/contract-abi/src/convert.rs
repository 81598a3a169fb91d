//! Hex conversions shared by artifacts, logs and RPC payloads

use bytes::Bytes;
use primitive_types::{H160, H256};

use crate::AbiError;

/// Ethereum address
pub type Address = H160;

/// Strip an optional `0x` prefix
pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Decode a hex string (with or without 0x prefix) into bytes
pub fn bytes_from_hex(s: &str) -> Result<Bytes, AbiError> {
    let s = strip_0x(s.trim());
    if s.is_empty() {
        return Ok(Bytes::new());
    }
    Ok(Bytes::from(hex::decode(s)?))
}

/// Parse a 20-byte address from hex
pub fn address_from_hex(s: &str) -> Result<Address, AbiError> {
    let bytes = hex::decode(strip_0x(s.trim()))?;
    if bytes.len() != 20 {
        return Err(AbiError::InvalidHex(format!(
            "expected 20 bytes for address, got {}",
            bytes.len()
        )));
    }
    Ok(H160::from_slice(&bytes))
}

/// Parse a 32-byte hash from hex
pub fn h256_from_hex(s: &str) -> Result<H256, AbiError> {
    let bytes = hex::decode(strip_0x(s.trim()))?;
    if bytes.len() != 32 {
        return Err(AbiError::InvalidHex(format!(
            "expected 32 bytes for hash, got {}",
            bytes.len()
        )));
    }
    Ok(H256::from_slice(&bytes))
}

/// Hex encode with 0x prefix
pub fn to_hex(data: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(data))
}

/// Parse a hex quantity such as `0x1b4`
pub fn u64_from_hex(s: &str) -> Result<u64, AbiError> {
    u64::from_str_radix(strip_0x(s.trim()), 16).map_err(|e| AbiError::InvalidHex(e.to_string()))
}

/// Serde adapter for optional `u64` quantities (`"0x1b4"` or `null`)
pub mod serde_hex_u64_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as a hex quantity
    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&format!("0x{:x}", v)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from a hex quantity or null
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| super::u64_from_hex(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Serde adapter for `Bytes` as 0x-prefixed hex
pub mod serde_hex_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as 0x-prefixed hex
    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex(value))
    }

    /// Deserialize from hex (prefix optional)
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::bytes_from_hex(&s).map_err(serde::de::Error::custom)
    }
}
