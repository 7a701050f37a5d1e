use saveether_types::{Result, SavingsError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What `withdraw` does when the caller's balance is already zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyWithdrawal {
    /// Succeed, pay out nothing, skip the value channel
    NoOp,
    /// Fail with `InsufficientBalance`
    Reject,
}

/// Configuration for the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Maximum nesting of ledger calls, counting the top-level call
    pub max_call_depth: usize,

    /// Behaviour of a withdrawal against a zero balance
    pub empty_withdrawal: EmptyWithdrawal,

    /// Emit notifications for withdrawals and send-outs, not only deposits
    pub emit_payout_events: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 64,
            empty_withdrawal: EmptyWithdrawal::NoOp,
            emit_payout_events: true,
        }
    }
}

impl LedgerConfig {
    /// Load and validate a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SavingsError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: LedgerConfig = serde_json::from_str(&raw).map_err(|e| {
            SavingsError::ConfigError(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_call_depth == 0 {
            return Err(SavingsError::ConfigError(
                "max_call_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{ "empty_withdrawal": "reject" }"#).unwrap();

        assert_eq!(config.empty_withdrawal, EmptyWithdrawal::Reject);
        assert_eq!(config.max_call_depth, 64);
        assert!(config.emit_payout_events);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_call_depth": 2, "emit_payout_events": false }}"#).unwrap();

        let config = LedgerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.max_call_depth, 2);
        assert!(!config.emit_payout_events);
        assert_eq!(config.empty_withdrawal, EmptyWithdrawal::NoOp);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_call_depth": 0 }}"#).unwrap();
        assert!(matches!(
            LedgerConfig::from_json_file(file.path()),
            Err(SavingsError::ConfigError(_))
        ));

        assert!(matches!(
            LedgerConfig::from_json_file("/nonexistent/ledger.json"),
            Err(SavingsError::ConfigError(_))
        ));
    }
}
