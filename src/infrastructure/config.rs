use crate::foundation::{Amount, Height, Result, WalletError, DEFAULT_FEE_FLOOR, DEFAULT_TX_LIFETIME};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Wallet-level knobs of the negotiation core.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalletConfig {
    /// Kernel lifetime in blocks when the caller does not set one.
    pub default_lifetime: Height,
    /// Invitations carrying a smaller fee are refused by the receiver.
    pub fee_floor: Amount,
    /// Optional cap on the fee a receiver will co-sign without review.
    pub max_receive_fee: Option<Amount>,
    /// Optional cap on the amount a receiver will co-sign without review.
    pub max_receive_amount: Option<Amount>,
    /// Log filter expression, e.g. `"info"` or `"veil_core=debug"`.
    pub log_filters: String,
    /// Optional directory for rolling log files.
    pub log_dir: Option<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            default_lifetime: DEFAULT_TX_LIFETIME,
            fee_floor: DEFAULT_FEE_FLOOR,
            max_receive_fee: None,
            max_receive_amount: None,
            log_filters: "info".to_string(),
            log_dir: None,
        }
    }
}

impl WalletConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: WalletConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_lifetime == 0 {
            return Err(WalletError::ConfigError("default_lifetime must be positive".to_string()));
        }
        if let Some(max_fee) = self.max_receive_fee {
            if max_fee < self.fee_floor {
                return Err(WalletError::ConfigError(format!(
                    "max_receive_fee {} is below fee_floor {}",
                    max_fee, self.fee_floor
                )));
            }
        }
        Ok(())
    }
}
