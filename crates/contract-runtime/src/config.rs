//! Runtime configuration

use std::path::Path;
use std::time::Duration;

use contract_abi::Address;
use serde::{Deserialize, Serialize};

use crate::types::TxRequest;
use crate::ContractError;

/// Runtime configuration
///
/// Every field has a default, so an empty TOML document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Delay between receipt polls, in milliseconds
    #[serde(default = "default_receipt_polling_interval_ms")]
    pub receipt_polling_interval_ms: u64,
    /// Give up waiting for a receipt after this many milliseconds
    #[serde(default)]
    pub receipt_timeout_ms: Option<u64>,
    /// Delay between event subscription polls, in milliseconds
    #[serde(default = "default_subscription_poll_interval_ms")]
    pub subscription_poll_interval_ms: u64,
    /// Simulate a transaction before sending it
    #[serde(default = "default_true")]
    pub validate_before_send: bool,
    /// Estimate gas when a request sets no gas limit
    #[serde(default = "default_true")]
    pub estimate_gas: bool,
    /// Default sender
    #[serde(default)]
    pub default_from: Option<Address>,
    /// Default gas limit
    #[serde(default)]
    pub default_gas: Option<u64>,
    /// Default gas price
    #[serde(default)]
    pub default_gas_price: Option<u64>,
}

fn default_receipt_polling_interval_ms() -> u64 {
    1000
}

fn default_subscription_poll_interval_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            receipt_polling_interval_ms: default_receipt_polling_interval_ms(),
            receipt_timeout_ms: None,
            subscription_poll_interval_ms: default_subscription_poll_interval_ms(),
            validate_before_send: default_true(),
            estimate_gas: default_true(),
            default_from: None,
            default_gas: None,
            default_gas_price: None,
        }
    }
}

impl RuntimeConfig {
    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ContractError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ContractError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String, ContractError> {
        toml::to_string_pretty(self).map_err(|e| ContractError::Config(e.to_string()))
    }

    /// Reject zero polling intervals
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.receipt_polling_interval_ms == 0 {
            return Err(ContractError::Config(
                "receipt_polling_interval_ms must be positive".to_string(),
            ));
        }
        if self.subscription_poll_interval_ms == 0 {
            return Err(ContractError::Config(
                "subscription_poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Receipt polling interval
    pub fn receipt_polling_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_polling_interval_ms)
    }

    /// Receipt timeout, if any
    pub fn receipt_timeout(&self) -> Option<Duration> {
        self.receipt_timeout_ms.map(Duration::from_millis)
    }

    /// Subscription polling interval
    pub fn subscription_poll_interval(&self) -> Duration {
        Duration::from_millis(self.subscription_poll_interval_ms)
    }

    /// Transaction defaults as a request template
    pub fn tx_defaults(&self) -> TxRequest {
        TxRequest {
            from: self.default_from,
            gas: self.default_gas,
            gas_price: self.default_gas_price.map(u128::from),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RuntimeConfig::default();
        assert_eq!(config.receipt_polling_interval(), Duration::from_secs(1));
        assert_eq!(config.subscription_poll_interval(), Duration::from_secs(1));
        assert_eq!(config.receipt_timeout(), None);
        assert!(config.validate_before_send);
        assert!(config.estimate_gas);
    }

    #[test]
    fn test_config_empty_toml() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_config_partial_toml() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            receipt_polling_interval_ms = 250
            receipt_timeout_ms = 30000
            validate_before_send = false
            default_from = "0x1111111111111111111111111111111111111111"
            default_gas = 200000
            "#,
        )
        .unwrap();
        assert_eq!(config.receipt_polling_interval(), Duration::from_millis(250));
        assert_eq!(config.receipt_timeout(), Some(Duration::from_secs(30)));
        assert!(!config.validate_before_send);
        assert!(config.estimate_gas);

        let defaults = config.tx_defaults();
        assert_eq!(defaults.from, Some(Address::repeat_byte(0x11)));
        assert_eq!(defaults.gas, Some(200_000));
    }

    #[test]
    fn test_config_rejects_zero_interval() {
        let err = RuntimeConfig::from_toml_str("subscription_poll_interval_ms = 0").unwrap_err();
        assert!(matches!(err, ContractError::Config(_)));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = RuntimeConfig {
            receipt_timeout_ms: Some(5000),
            ..Default::default()
        };
        let toml = config.to_toml_string().unwrap();
        assert!(toml.contains("receipt_timeout_ms"));
        assert_eq!(RuntimeConfig::from_toml_str(&toml).unwrap(), config);
    }

    #[test]
    fn test_config_from_missing_file() {
        let err = RuntimeConfig::from_file("/nonexistent/runtime.toml").unwrap_err();
        assert!(matches!(err, ContractError::Config(_)));
    }
}
