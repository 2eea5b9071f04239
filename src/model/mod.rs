//! Core domain types for the wallet ledger.

use std::fmt;

use rand::Rng;

mod invoice;
mod transaction;
mod voucher;
mod wallet;
mod withdrawal;

pub use invoice::{Invoice, InvoiceState};
pub use transaction::{FeeRecord, FeeType, NewTransaction, Transaction, TxKind, TxStatus};
pub use voucher::{RedeemCode, RedeemState, normalize_code, validate_pin};
pub use wallet::{Wallet, WalletStatus};
pub use withdrawal::{PendingWithdrawal, WithdrawalState};

/// Transaction log sequence number.
pub type TxId = u64;

/// Identifier of a portal account, issued by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role name as reported by the authorization collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Role(String);

impl Role {
    pub fn new(role: impl Into<String>) -> Self {
        Role(role.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Public wallet code: three uppercase letters followed by three digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletCode([u8; 6]);

impl WalletCode {
    /// Validate user input. Surrounding whitespace is tolerated; anything else
    /// that is not `AAA999` is rejected, lowercase letters included.
    pub fn parse(input: &str) -> Option<Self> {
        let bytes = input.trim().as_bytes();
        if bytes.len() != 6 {
            return None;
        }
        let mut code = [0u8; 6];
        for (i, &b) in bytes.iter().enumerate() {
            let ok = if i < 3 {
                b.is_ascii_uppercase()
            } else {
                b.is_ascii_digit()
            };
            if !ok {
                return None;
            }
            code[i] = b;
        }
        Some(WalletCode(code))
    }

    pub fn generate(rng: &mut impl Rng) -> Self {
        let mut code = [0u8; 6];
        for slot in code.iter_mut().take(3) {
            *slot = rng.gen_range(b'A'..=b'Z');
        }
        for slot in code.iter_mut().skip(3) {
            *slot = rng.gen_range(b'0'..=b'9');
        }
        WalletCode(code)
    }

    pub fn as_str(&self) -> &str {
        // only ASCII ever reaches the array
        std::str::from_utf8(&self.0).unwrap_or("??????")
    }
}

impl fmt::Display for WalletCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for WalletCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletCode({})", self.as_str())
    }
}

/// Numeric reference shared with users for lookups (transactions, withdrawals,
/// invoices). Short enough to read out over a counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference(String);

impl Reference {
    pub const DIGITS: usize = 10;

    pub fn new(value: impl Into<String>) -> Self {
        Reference(value.into())
    }

    /// Accepts a non-empty all-digit string.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Reference(trimmed.to_string()))
    }

    pub fn generate(rng: &mut impl Rng) -> Self {
        // leading digit is never zero so the reference survives numeric re-typing
        let first = rng.gen_range(1..=9u8);
        let rest: String = (1..Self::DIGITS)
            .map(|_| char::from(b'0' + rng.gen_range(0..=9u8)))
            .collect();
        Reference(format!("{first}{rest}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
