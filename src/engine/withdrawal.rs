//! Withdrawal requests and the escrow pool.
//!
//! A request moves the full amount out of the wallet into a pending record.
//! The record then leaves the pool exactly once: processed by finance (fee
//! taken, cash handed over), expired after 24 hours, or cancelled by its
//! owner. Expiry and cancellation return the full amount with no fee.
//!
//! Every transition out of `pending` goes through
//! [`UnitOfWork::close_withdrawal`], which only succeeds while the record is
//! still pending, so two racing transitions cannot both apply.

use tracing::{info, warn};

use super::Context;
use crate::fee;
use crate::model::{
    AccountId, FeeType, NewTransaction, PendingWithdrawal, Reference, TxKind, TxStatus,
    WalletCode, WithdrawalState,
};
use crate::store::{Store, UnitOfWork};
use crate::{Amount, LedgerError};

/// Result of a confirmed cash payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutReceipt {
    pub reference: Reference,
    pub wallet: WalletCode,
    pub owner: AccountId,
    /// Amount held in escrow: `payout + fee`.
    pub amount: Amount,
    pub fee: Amount,
    /// Cash handed to the holder.
    pub payout: Amount,
    pub processed_by: AccountId,
}

/// What a unit found when it opened a record.
enum Opened {
    Pending(PendingWithdrawal),
    /// The record was past its window; the unit has reversed it.
    Expired(PendingWithdrawal),
}

/// Outcome of a unit that may have expired the record instead of doing its
/// job. The expiry must commit, so the error is raised after the unit.
enum Outcome<T> {
    Done(T),
    Expired(PendingWithdrawal),
}

pub struct WithdrawalService<S> {
    ctx: Context<S>,
}

impl<S> Clone for WithdrawalService<S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

/// Public API
impl<S: Store> WithdrawalService<S> {
    pub(crate) fn new(ctx: Context<S>) -> Self {
        Self { ctx }
    }

    /// Move `amount` from the account's wallet into escrow.
    pub fn request(
        &self,
        account: &AccountId,
        amount: Amount,
    ) -> Result<PendingWithdrawal, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        let record = self.ctx.atomically(|unit| {
            let wallet = unit.require_wallet_of(account)?.code();
            unit.debit(wallet, amount)?;

            let reference = unit.fresh_reference();
            let record =
                PendingWithdrawal::new(reference.clone(), wallet, account.clone(), amount, unit.now());
            unit.insert_withdrawal(record.clone());
            unit.append(
                NewTransaction::new(TxKind::WithdrawRequest, amount, TxStatus::Pending)
                    .from(wallet)
                    .reference(reference),
            );
            Ok(record)
        })?;

        info!(
            account = %account,
            wallet = %record.wallet,
            amount = %record.amount,
            reference = %record.reference,
            expires_at = %record.expires_at,
            "withdrawal requested"
        );
        Ok(record)
    }

    /// Fetch a pending record. A record found past its window is expired on
    /// the spot and reported as [`LedgerError::WithdrawalExpired`], with the
    /// funds already back in the wallet.
    pub fn lookup(&self, reference: &Reference) -> Result<PendingWithdrawal, LedgerError> {
        let outcome = self.ctx.atomically(|unit| {
            Ok(match open(unit, reference)? {
                Opened::Pending(record) => Outcome::Done(record),
                Opened::Expired(record) => Outcome::Expired(record),
            })
        })?;
        self.finish(outcome)
    }

    /// Confirm a cash payout. The withdrawal fee is computed from the current
    /// settings and kept by the platform; the holder receives the rest.
    pub fn process(
        &self,
        reference: &Reference,
        staff: &AccountId,
    ) -> Result<PayoutReceipt, LedgerError> {
        let settings = self.ctx.settings.current();
        let platform = self.ctx.platform;

        let outcome = self.ctx.atomically(|unit| {
            let record = match open(unit, reference)? {
                Opened::Pending(record) => record,
                Opened::Expired(record) => return Ok(Outcome::Expired(record)),
            };

            let fee = fee::withdrawal_fee(record.amount, &settings);
            let payout = record.amount - fee;
            let now = unit.now();
            unit.close_withdrawal(
                reference,
                WithdrawalState::Processed {
                    by: staff.clone(),
                    at: now,
                    fee,
                    payout,
                },
            )?;
            if !fee.is_zero() {
                unit.credit(platform, fee)?;
            }
            let tx = unit.append(
                NewTransaction::new(TxKind::CashPayout, payout, TxStatus::Success)
                    .from(record.wallet)
                    .fee(fee)
                    .reference(reference.clone())
                    .note(Some(format!("processed by {staff}"))),
            );
            unit.append_fee(FeeType::Withdrawal, fee, tx);

            Ok(Outcome::Done(PayoutReceipt {
                reference: record.reference,
                wallet: record.wallet,
                owner: record.owner,
                amount: record.amount,
                fee,
                payout,
                processed_by: staff.clone(),
            }))
        })?;

        let receipt = self.finish(outcome)?;
        info!(
            reference = %receipt.reference,
            wallet = %receipt.wallet,
            payout = %receipt.payout,
            fee = %receipt.fee,
            staff = %staff,
            "withdrawal processed"
        );
        Ok(receipt)
    }

    /// Return a pending withdrawal to its owner's wallet. Only the account
    /// that requested it may cancel.
    pub fn cancel(
        &self,
        reference: &Reference,
        account: &AccountId,
    ) -> Result<PendingWithdrawal, LedgerError> {
        let outcome = self.ctx.atomically(|unit| {
            let record = match open(unit, reference)? {
                Opened::Pending(record) => record,
                Opened::Expired(record) => return Ok(Outcome::Expired(record)),
            };
            if &record.owner != account {
                return Err(LedgerError::Unauthorized);
            }
            let now = unit.now();
            reverse(unit, &record, WithdrawalState::Cancelled { at: now }).map(Outcome::Done)
        })?;

        let record = self.finish(outcome)?;
        info!(
            reference = %record.reference,
            wallet = %record.wallet,
            amount = %record.amount,
            "withdrawal cancelled"
        );
        Ok(record)
    }

    /// Expire every pending record past its window. Each record is reversed in
    /// its own unit; a record another unit closed first is skipped. Returns
    /// the number of records expired.
    pub fn expire_due(&self) -> Result<usize, LedgerError> {
        let now = self.ctx.clock.now();
        let due: Vec<Reference> = self.ctx.store.read(|tables| {
            tables
                .pending_withdrawals()
                .into_iter()
                .filter(|w| w.is_due(now))
                .map(|w| w.reference.clone())
                .collect()
        })?;

        let mut expired = 0;
        for reference in due {
            match self.expire_one(&reference) {
                Ok(Some(record)) => {
                    expired += 1;
                    log_expired(&record);
                }
                Ok(None) => {}
                Err(e) if e.is_infrastructure() => return Err(e),
                Err(e) => {
                    warn!(reference = %reference, reason = %e, "could not expire withdrawal");
                }
            }
        }
        Ok(expired)
    }

    /// Reverse one record if it is still pending and past its window when the
    /// unit sees it; `None` means nothing was due.
    fn expire_one(
        &self,
        reference: &Reference,
    ) -> Result<Option<PendingWithdrawal>, LedgerError> {
        self.ctx.atomically(|unit| {
            let record = unit
                .withdrawal(reference)
                .cloned()
                .ok_or_else(|| LedgerError::WithdrawalNotFound(reference.clone()))?;
            let now = unit.now();
            if !record.is_due(now) {
                return Ok(None);
            }
            reverse(unit, &record, WithdrawalState::Expired { at: now }).map(Some)
        })
    }

    /// The escrow pool, oldest first.
    pub fn pending(&self) -> Result<Vec<PendingWithdrawal>, LedgerError> {
        self.ctx.store.read(|tables| {
            tables
                .pending_withdrawals()
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Every withdrawal of one wallet, any state, oldest first.
    pub fn history(&self, wallet: WalletCode) -> Result<Vec<PendingWithdrawal>, LedgerError> {
        self.ctx.store.read(|tables| {
            tables
                .withdrawals_for(wallet)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    pub fn oldest_pending_for(&self, wallet: WalletCode) -> Result<Reference, LedgerError> {
        self.ctx
            .store
            .read(|tables| {
                tables
                    .withdrawals_for(wallet)
                    .into_iter()
                    .find(|w| w.is_pending())
                    .map(|w| w.reference.clone())
            })?
            .ok_or(LedgerError::NothingOutstanding(wallet))
    }
}

/// Private API
impl<S: Store> WithdrawalService<S> {
    fn finish<T>(&self, outcome: Outcome<T>) -> Result<T, LedgerError> {
        match outcome {
            Outcome::Done(value) => Ok(value),
            Outcome::Expired(record) => {
                log_expired(&record);
                Err(LedgerError::WithdrawalExpired(record.reference))
            }
        }
    }
}

/// Open a record for a transition, expiring it first if it is past its window.
///
/// Records that already left the pool map to the error a caller would expect:
/// processed ones are `WithdrawalAlreadyProcessed`, expired ones
/// `WithdrawalExpired`, cancelled ones are gone.
fn open(unit: &mut UnitOfWork<'_>, reference: &Reference) -> Result<Opened, LedgerError> {
    let record = unit
        .withdrawal(reference)
        .cloned()
        .ok_or_else(|| LedgerError::WithdrawalNotFound(reference.clone()))?;
    match record.state {
        WithdrawalState::Pending if record.is_due(unit.now()) => {
            let now = unit.now();
            let record = reverse(unit, &record, WithdrawalState::Expired { at: now })?;
            Ok(Opened::Expired(record))
        }
        WithdrawalState::Pending => Ok(Opened::Pending(record)),
        WithdrawalState::Processed { .. } => {
            Err(LedgerError::WithdrawalAlreadyProcessed(reference.clone()))
        }
        WithdrawalState::Expired { .. } => Err(LedgerError::WithdrawalExpired(reference.clone())),
        WithdrawalState::Cancelled { .. } => {
            Err(LedgerError::WithdrawalNotFound(reference.clone()))
        }
    }
}

/// Close a pending record as expired or cancelled and return the full amount
/// to its wallet, whatever the wallet's status.
fn reverse(
    unit: &mut UnitOfWork<'_>,
    record: &PendingWithdrawal,
    state: WithdrawalState,
) -> Result<PendingWithdrawal, LedgerError> {
    let note = state.as_str();
    let closed = unit.close_withdrawal(&record.reference, state)?;
    unit.refund(record.wallet, record.amount)?;
    unit.append(
        NewTransaction::new(TxKind::WithdrawRequest, record.amount, TxStatus::Failed)
            .to(record.wallet)
            .fee(Amount::ZERO)
            .reference(record.reference.clone())
            .note(Some(note.to_string())),
    );
    Ok(closed)
}

fn log_expired(record: &PendingWithdrawal) {
    info!(
        reference = %record.reference,
        wallet = %record.wallet,
        amount = %record.amount,
        "withdrawal expired, funds returned"
    );
}
