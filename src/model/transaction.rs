use std::fmt;

use chrono::{DateTime, Utc};

use super::{Reference, TxId, WalletCode};
use crate::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Send,
    Receive,
    Deposit,
    WithdrawRequest,
    CashPayout,
    InvoicePayment,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Send => "send",
            TxKind::Receive => "receive",
            TxKind::Deposit => "deposit",
            TxKind::WithdrawRequest => "withdraw-request",
            TxKind::CashPayout => "cash-payout",
            TxKind::InvoicePayment => "invoice-payment",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Success => "success",
            TxStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry of the transaction log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TxId,
    pub kind: TxKind,
    pub amount: Amount,
    pub fee: Option<Amount>,
    pub from: Option<WalletCode>,
    pub to: Option<WalletCode>,
    pub reference: Option<Reference>,
    pub status: TxStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Whether the entry moved value into or out of `wallet`.
    pub fn touches(&self, wallet: WalletCode) -> bool {
        self.from == Some(wallet) || self.to == Some(wallet)
    }
}

/// Log entry before the store assigns its id and timestamp.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub kind: TxKind,
    pub amount: Amount,
    pub fee: Option<Amount>,
    pub from: Option<WalletCode>,
    pub to: Option<WalletCode>,
    pub reference: Option<Reference>,
    pub status: TxStatus,
    pub note: Option<String>,
}

impl NewTransaction {
    pub fn new(kind: TxKind, amount: Amount, status: TxStatus) -> Self {
        Self {
            kind,
            amount,
            fee: None,
            from: None,
            to: None,
            reference: None,
            status,
            note: None,
        }
    }

    pub fn from(mut self, wallet: WalletCode) -> Self {
        self.from = Some(wallet);
        self
    }

    pub fn to(mut self, wallet: WalletCode) -> Self {
        self.to = Some(wallet);
        self
    }

    pub fn fee(mut self, fee: Amount) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeeType {
    Transaction,
    Withdrawal,
    Deposit,
    Invoice,
}

impl FeeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeType::Transaction => "transaction",
            FeeType::Withdrawal => "withdrawal",
            FeeType::Deposit => "deposit",
            FeeType::Invoice => "invoice",
        }
    }
}

impl fmt::Display for FeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fee ledger entry, linked to the transaction that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeRecord {
    pub kind: FeeType,
    pub amount: Amount,
    pub transaction: TxId,
    pub created_at: DateTime<Utc>,
}
