//! Error types for ledger operations.

use thiserror::Error;

use crate::Amount;
use crate::model::{AccountId, Reference, WalletCode, WalletStatus};

/// Failure of the backing store itself, as opposed to a rejected operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store lock poisoned by a panicking writer")]
    Poisoned,
}

/// Top-level error returned by every service in the engine.
///
/// Business rejections never leave partial state behind. The one variant that
/// does commit work is [`LedgerError::WithdrawalExpired`]: by the time a caller
/// sees it, the escrowed funds have already been returned to the wallet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("amount must be a positive number")]
    InvalidAmount,

    #[error("wallet {0} not found")]
    WalletNotFound(String),

    #[error("account {0} has no wallet")]
    NoWallet(AccountId),

    #[error("account {0} already has a wallet")]
    WalletAlreadyExists(AccountId),

    #[error("wallet {0} is {1}")]
    WalletNotActive(WalletCode, WalletStatus),

    #[error("insufficient funds in {wallet}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        wallet: WalletCode,
        balance: Amount,
        requested: Amount,
    },

    #[error("recipient wallet {0} not found")]
    RecipientNotFound(String),

    #[error("sender and recipient are the same wallet {0}")]
    SameWallet(WalletCode),

    #[error("redeem code not found")]
    CodeNotFound,

    #[error("redeem code already used")]
    CodeAlreadyUsed,

    #[error("invalid PIN for redeem code")]
    InvalidPin,

    #[error("redeem code expired")]
    CodeExpired,

    #[error("'{0}' is not a valid redeem code or PIN")]
    InvalidRedeemCode(String),

    #[error("withdrawal {0} not found")]
    WithdrawalNotFound(Reference),

    #[error("withdrawal {0} expired, funds returned to wallet")]
    WithdrawalExpired(Reference),

    #[error("withdrawal {0} already processed")]
    WithdrawalAlreadyProcessed(Reference),

    #[error("invoice {0} not found")]
    InvoiceNotFound(Reference),

    #[error("invoice {0} already paid")]
    InvoiceAlreadyPaid(Reference),

    #[error("nothing outstanding for wallet {0}")]
    NothingOutstanding(WalletCode),

    #[error("not authorized")]
    Unauthorized,

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Stable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::WalletNotFound(_) => "WALLET_NOT_FOUND",
            LedgerError::NoWallet(_) => "NO_WALLET",
            LedgerError::WalletAlreadyExists(_) => "WALLET_ALREADY_EXISTS",
            LedgerError::WalletNotActive(..) => "WALLET_NOT_ACTIVE",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::RecipientNotFound(_) => "RECIPIENT_NOT_FOUND",
            LedgerError::SameWallet(_) => "SAME_WALLET",
            LedgerError::CodeNotFound => "CODE_NOT_FOUND",
            LedgerError::CodeAlreadyUsed => "CODE_ALREADY_USED",
            LedgerError::InvalidPin => "INVALID_PIN",
            LedgerError::CodeExpired => "CODE_EXPIRED",
            LedgerError::InvalidRedeemCode(_) => "INVALID_REDEEM_CODE",
            LedgerError::WithdrawalNotFound(_) => "WITHDRAWAL_NOT_FOUND",
            LedgerError::WithdrawalExpired(_) => "WITHDRAWAL_EXPIRED",
            LedgerError::WithdrawalAlreadyProcessed(_) => "WITHDRAWAL_ALREADY_PROCESSED",
            LedgerError::InvoiceNotFound(_) => "INVOICE_NOT_FOUND",
            LedgerError::InvoiceAlreadyPaid(_) => "INVOICE_ALREADY_PAID",
            LedgerError::NothingOutstanding(_) => "NOTHING_OUTSTANDING",
            LedgerError::Unauthorized => "UNAUTHORIZED",
            LedgerError::Store(_) => "STORE_FAILURE",
        }
    }

    /// Whether this is an infrastructure failure rather than a business rejection.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, LedgerError::Store(_))
    }
}

impl From<crate::amount::AmountError> for LedgerError {
    fn from(_: crate::amount::AmountError) -> Self {
        LedgerError::InvalidAmount
    }
}
