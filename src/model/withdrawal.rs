use std::fmt;

use chrono::{DateTime, Duration, Utc};

use super::{AccountId, Reference, WalletCode};
use crate::Amount;

/// Escrow state. Only `Pending` holds funds; every other state is terminal and
/// carries the data that was fixed when it was entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalState {
    Pending,
    Processed {
        by: AccountId,
        at: DateTime<Utc>,
        fee: Amount,
        payout: Amount,
    },
    Expired {
        at: DateTime<Utc>,
    },
    Cancelled {
        at: DateTime<Utc>,
    },
}

impl WithdrawalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalState::Pending => "pending",
            WithdrawalState::Processed { .. } => "processed",
            WithdrawalState::Expired { .. } => "expired",
            WithdrawalState::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalState::Pending)
    }
}

impl fmt::Display for WithdrawalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWithdrawal {
    pub reference: Reference,
    pub wallet: WalletCode,
    pub owner: AccountId,
    /// Original amount taken from the wallet, before any fee.
    pub amount: Amount,
    pub state: WithdrawalState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingWithdrawal {
    pub const WINDOW_HOURS: i64 = 24;

    pub fn new(
        reference: Reference,
        wallet: WalletCode,
        owner: AccountId,
        amount: Amount,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            reference,
            wallet,
            owner,
            amount,
            state: WithdrawalState::Pending,
            created_at,
            expires_at: created_at + Duration::hours(Self::WINDOW_HOURS),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == WithdrawalState::Pending
    }

    /// Still pending but past its window.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(created_at: DateTime<Utc>) -> PendingWithdrawal {
        PendingWithdrawal::new(
            Reference::new("1000000001"),
            WalletCode::parse("VXE445").unwrap(),
            AccountId::new("alice"),
            Amount::from_minor(10_000),
            created_at,
        )
    }

    #[test]
    fn window_is_twenty_four_hours() {
        let now = Utc::now();
        let w = pending(now);
        assert_eq!(w.expires_at - w.created_at, Duration::hours(24));
        assert!(w.is_pending());
    }

    #[test]
    fn due_only_after_expiry_while_pending() {
        let now = Utc::now();
        let mut w = pending(now);
        assert!(!w.is_due(now + Duration::hours(24)));
        assert!(w.is_due(now + Duration::hours(24) + Duration::seconds(1)));

        w.state = WithdrawalState::Expired {
            at: now + Duration::hours(25),
        };
        assert!(!w.is_due(now + Duration::hours(48)));
        assert!(w.state.is_terminal());
    }
}
