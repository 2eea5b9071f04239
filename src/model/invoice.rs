use chrono::{DateTime, Utc};

use super::{AccountId, Reference, WalletCode};
use crate::Amount;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceState {
    Unpaid,
    /// Terminal.
    Paid {
        payer: AccountId,
        paid_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub reference: Reference,
    pub issuer: AccountId,
    /// Wallet credited on payment.
    pub issuer_wallet: WalletCode,
    /// Wallet expected to pay.
    pub recipient: WalletCode,
    pub amount: Amount,
    pub purpose: String,
    pub note: Option<String>,
    pub state: InvoiceState,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn is_paid(&self) -> bool {
        matches!(self.state, InvoiceState::Paid { .. })
    }
}
