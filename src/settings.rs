//! Fee settings and the collaborator that serves them.
//!
//! Rates are read through [`SettingsProvider::current`] at the moment a fee is
//! computed, so swapping settings affects subsequent operations only.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::{AppConfig, ConfigError};

/// Fee percentage in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct FeeRate(Decimal);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(Decimal::ZERO);

    pub fn percent(value: Decimal) -> Result<Self, ConfigError> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(ConfigError::InvalidRate(value));
        }
        Ok(FeeRate(value))
    }

    /// Whole-number percentage, for literals.
    pub fn whole(percent: u8) -> Result<Self, ConfigError> {
        Self::percent(Decimal::from(percent))
    }

    pub fn as_percent(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for FeeRate {
    type Error = ConfigError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        FeeRate::percent(value)
    }
}

impl From<FeeRate> for Decimal {
    fn from(rate: FeeRate) -> Self {
        rate.0
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

fn five_percent() -> FeeRate {
    FeeRate(Decimal::from(5))
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSettings {
    #[serde(default = "five_percent", rename = "p2p_percent")]
    pub p2p: FeeRate,
    #[serde(default = "five_percent", rename = "withdrawal_percent")]
    pub withdrawal: FeeRate,
    #[serde(default = "five_percent", rename = "invoice_percent")]
    pub invoice: FeeRate,
    /// Event ticket sales; carried for the portal, not charged by this engine.
    #[serde(default = "five_percent", rename = "ticket_percent")]
    pub ticket: FeeRate,
    #[serde(default = "FeeSettings::no_fee", rename = "deposit_percent")]
    pub deposit: FeeRate,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl FeeSettings {
    fn no_fee() -> FeeRate {
        FeeRate::ZERO
    }
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            p2p: five_percent(),
            withdrawal: five_percent(),
            invoice: five_percent(),
            ticket: five_percent(),
            deposit: FeeRate::ZERO,
            currency: default_currency(),
        }
    }
}

/// Read-only source of the current fee settings.
pub trait SettingsProvider: Send + Sync {
    fn current(&self) -> FeeSettings;
}

/// In-process settings that can be swapped at runtime.
#[derive(Debug, Default)]
pub struct SharedSettings {
    inner: RwLock<FeeSettings>,
}

impl SharedSettings {
    pub fn new(settings: FeeSettings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    pub fn replace(&self, settings: FeeSettings) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = settings;
    }

    /// Re-read the `fees` block of a config file. On any error the previous
    /// settings stay in force.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        match AppConfig::load(path.as_ref()) {
            Ok(config) => {
                if config.fees != self.current() {
                    info!(
                        p2p = %config.fees.p2p,
                        withdrawal = %config.fees.withdrawal,
                        invoice = %config.fees.invoice,
                        "fee settings reloaded"
                    );
                    self.replace(config.fees);
                }
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.as_ref().display(), reason = %e, "keeping previous fee settings");
                Err(e)
            }
        }
    }
}

/// Re-read the config file every `interval` until `shutdown` turns true or
/// its sender is dropped. A bad file is logged and the old rates stay.
pub async fn watch_file(
    settings: Arc<SharedSettings>,
    path: PathBuf,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // reload logs the failure itself
                let _ = settings.reload(&path);
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

impl SettingsProvider for SharedSettings {
    fn current(&self) -> FeeSettings {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
