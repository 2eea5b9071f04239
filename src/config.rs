use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AccountId, WalletCode};
use crate::settings::FeeSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("fee rate {0} is outside 0..=100 percent")]
    InvalidRate(Decimal),

    #[error("platform wallet '{0}' is not a valid wallet code")]
    InvalidPlatformWallet(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    /// Wallet that collects every fee.
    pub platform_wallet: String,
    pub platform_account: String,
    /// How often the expiry sweeper scans the pending withdrawal pool.
    pub sweep_interval_secs: u64,
    /// How often the config file is re-read for fee changes.
    pub reload_interval_secs: u64,
    pub fees: FeeSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            platform_wallet: "SYS000".to_string(),
            platform_account: "platform".to_string(),
            sweep_interval_secs: 60,
            reload_interval_secs: 30,
            fees: FeeSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.platform_wallet()?;
        Ok(config)
    }

    pub fn platform_wallet(&self) -> Result<WalletCode, ConfigError> {
        WalletCode::parse(&self.platform_wallet)
            .ok_or_else(|| ConfigError::InvalidPlatformWallet(self.platform_wallet.clone()))
    }

    pub fn platform_account(&self) -> AccountId {
        AccountId::new(self.platform_account.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::FeeRate;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.platform_wallet().unwrap().as_str(), "SYS000");
        assert_eq!(config.sweep_interval_secs, 60);
        assert_eq!(config.reload_interval_secs, 30);
        assert_eq!(config.fees, FeeSettings::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = AppConfig::from_yaml(
            "log_level: debug\nplatform_wallet: CTY001\nfees:\n  withdrawal_percent: 3\n",
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.platform_wallet().unwrap().as_str(), "CTY001");
        assert_eq!(config.fees.withdrawal, FeeRate::whole(3).unwrap());
        assert_eq!(config.fees.p2p, FeeRate::whole(5).unwrap());
    }

    #[test]
    fn bad_platform_wallet_is_rejected() {
        assert!(matches!(
            AppConfig::from_yaml("platform_wallet: nope"),
            Err(ConfigError::InvalidPlatformWallet(_))
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert!(matches!(
            AppConfig::load(Path::new("/definitely/not/here.yaml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
