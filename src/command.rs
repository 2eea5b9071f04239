//! Commands accepted by [`Engine::apply`](crate::Engine::apply).

use crate::Amount;
use crate::model::{AccountId, Reference, Role, WalletCode, WalletStatus};

/// Which pending record a command targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Reference(Reference),
    /// The oldest still-outstanding record of this wallet.
    Oldest(WalletCode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    OpenWallet {
        account: AccountId,
        code: Option<WalletCode>,
    },
    IssueCode {
        role: Role,
        amount: Amount,
    },
    ImportCode {
        role: Role,
        code: String,
        pin: String,
        amount: Amount,
    },
    Redeem {
        account: AccountId,
        code: String,
        pin: String,
    },
    Send {
        account: AccountId,
        recipient: String,
        amount: Amount,
        note: Option<String>,
    },
    Withdraw {
        account: AccountId,
        amount: Amount,
    },
    ProcessWithdrawal {
        role: Role,
        staff: AccountId,
        target: Selector,
    },
    /// Without a reference, cancels the oldest pending withdrawal of the
    /// account's wallet.
    CancelWithdrawal {
        account: AccountId,
        reference: Option<Reference>,
    },
    IssueInvoice {
        account: AccountId,
        recipient: String,
        amount: Amount,
        purpose: String,
        note: Option<String>,
    },
    /// Without a reference, pays the oldest unpaid invoice addressed to the
    /// account's wallet.
    PayInvoice {
        account: AccountId,
        reference: Option<Reference>,
    },
    SetStatus {
        role: Role,
        wallet: WalletCode,
        status: WalletStatus,
    },
    Sweep,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::OpenWallet { .. } => "open",
            Command::IssueCode { .. } | Command::ImportCode { .. } => "issue_code",
            Command::Redeem { .. } => "redeem",
            Command::Send { .. } => "send",
            Command::Withdraw { .. } => "withdraw",
            Command::ProcessWithdrawal { .. } => "process",
            Command::CancelWithdrawal { .. } => "cancel",
            Command::IssueInvoice { .. } => "invoice",
            Command::PayInvoice { .. } => "pay",
            Command::SetStatus { status, .. } => match status {
                WalletStatus::Active => "activate",
                WalletStatus::Suspended => "suspend",
                WalletStatus::Terminated => "terminate",
            },
            Command::Sweep => "sweep",
        }
    }
}
