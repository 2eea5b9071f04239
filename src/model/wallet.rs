use std::fmt;

use chrono::{DateTime, Utc};

use super::{AccountId, WalletCode};
use crate::{Amount, LedgerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletStatus {
    Active,
    Suspended,
    /// Final; a terminated wallet never moves money again.
    Terminated,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Active => "active",
            WalletStatus::Suspended => "suspended",
            WalletStatus::Terminated => "terminated",
        }
    }

    pub fn can_transition_to(self, next: WalletStatus) -> bool {
        match (self, next) {
            (WalletStatus::Terminated, _) => false,
            (a, b) => a != b,
        }
    }
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One wallet per account. The balance only changes through the methods below,
/// each of which validates and mutates in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    code: WalletCode,
    owner: AccountId,
    balance: Amount,
    status: WalletStatus,
    opened_at: DateTime<Utc>,
}

impl Wallet {
    pub fn open(code: WalletCode, owner: AccountId, opened_at: DateTime<Utc>) -> Self {
        Self {
            code,
            owner,
            balance: Amount::ZERO,
            status: WalletStatus::Active,
            opened_at,
        }
    }

    pub fn code(&self) -> WalletCode {
        self.code
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn status(&self) -> WalletStatus {
        self.status
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn is_active(&self) -> bool {
        self.status == WalletStatus::Active
    }

    pub fn ensure_active(&self) -> Result<(), LedgerError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(LedgerError::WalletNotActive(self.code, self.status))
        }
    }

    pub(crate) fn credit(&mut self, amount: Amount) -> Result<Amount, LedgerError> {
        self.ensure_active()?;
        self.refund(amount)
    }

    /// Check-and-subtract in one step; the balance is untouched on failure.
    pub(crate) fn debit(&mut self, amount: Amount) -> Result<Amount, LedgerError> {
        self.ensure_active()?;
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                wallet: self.code,
                balance: self.balance,
                requested: amount,
            })?;
        Ok(self.balance)
    }

    /// Credit that ignores the status gate. Only escrow reversals use this: the
    /// principal belongs to the holder whatever happened to the wallet meanwhile.
    pub(crate) fn refund(&mut self, amount: Amount) -> Result<Amount, LedgerError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount)?;
        Ok(self.balance)
    }

    pub(crate) fn set_status(&mut self, status: WalletStatus) -> Result<(), LedgerError> {
        if !self.status.can_transition_to(status) {
            return Err(LedgerError::WalletNotActive(self.code, self.status));
        }
        self.status = status;
        Ok(())
    }
}
