//! Send money between wallets.

use tracing::info;

use super::Context;
use crate::fee;
use crate::model::{
    AccountId, FeeType, NewTransaction, Reference, TxKind, TxStatus, WalletCode,
};
use crate::store::Store;
use crate::{Amount, LedgerError};

/// What the sender sees after a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub reference: Reference,
    pub from: WalletCode,
    pub to: WalletCode,
    /// Debited from the sender.
    pub amount: Amount,
    pub fee: Amount,
    /// Credited to the recipient: `amount - fee`.
    pub credited: Amount,
}

pub struct TransferService<S> {
    ctx: Context<S>,
}

impl<S> Clone for TransferService<S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

impl<S: Store> TransferService<S> {
    pub(crate) fn new(ctx: Context<S>) -> Self {
        Self { ctx }
    }

    /// Send `amount` from the sender's wallet to `recipient`.
    ///
    /// The fee comes out of the sent amount: the sender is debited `amount`,
    /// the recipient receives `amount - fee`, the platform wallet the fee.
    /// Produces a `send` and a `receive` entry sharing one reference.
    pub fn send(
        &self,
        sender: &AccountId,
        recipient: &str,
        amount: Amount,
        note: Option<String>,
    ) -> Result<TransferReceipt, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        let to = WalletCode::parse(recipient)
            .ok_or_else(|| LedgerError::RecipientNotFound(recipient.trim().to_string()))?;

        let settings = self.ctx.settings.current();
        let fee = fee::transfer_fee(amount, &settings);
        let credited = amount - fee;
        let platform = self.ctx.platform;

        let receipt = self.ctx.atomically(|unit| {
            if unit.wallet(to).is_none() {
                return Err(LedgerError::RecipientNotFound(to.to_string()));
            }
            let from = unit.require_wallet_of(sender)?.code();
            if from == to {
                return Err(LedgerError::SameWallet(from));
            }

            unit.debit(from, amount)?;
            unit.credit(to, credited)?;
            if !fee.is_zero() {
                unit.credit(platform, fee)?;
            }

            let reference = unit.fresh_reference();
            let send_id = unit.append(
                NewTransaction::new(TxKind::Send, amount, TxStatus::Success)
                    .from(from)
                    .to(to)
                    .fee(fee)
                    .reference(reference.clone())
                    .note(note.clone()),
            );
            unit.append(
                NewTransaction::new(TxKind::Receive, credited, TxStatus::Success)
                    .from(from)
                    .to(to)
                    .reference(reference.clone())
                    .note(note),
            );
            unit.append_fee(FeeType::Transaction, fee, send_id);

            Ok(TransferReceipt {
                reference,
                from,
                to,
                amount,
                fee,
                credited,
            })
        })?;

        info!(
            reference = %receipt.reference,
            from = %receipt.from,
            to = %receipt.to,
            amount = %receipt.amount,
            fee = %receipt.fee,
            "transfer settled"
        );
        Ok(receipt)
    }
}
