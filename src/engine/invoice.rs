//! Invoices: a merchant bills a wallet, the holder of that wallet pays.
//!
//! Unlike transfers, the invoice fee is charged on top: the payer is debited
//! `amount + fee` and the issuer receives the full `amount`.

use tracing::info;

use super::Context;
use crate::fee;
use crate::model::{
    AccountId, FeeType, Invoice, InvoiceState, NewTransaction, Reference, TxKind, TxStatus,
    WalletCode,
};
use crate::store::Store;
use crate::{Amount, LedgerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceReceipt {
    pub reference: Reference,
    pub payer_wallet: WalletCode,
    pub issuer_wallet: WalletCode,
    pub amount: Amount,
    pub fee: Amount,
    /// Debited from the payer: `amount + fee`.
    pub charged: Amount,
}

pub struct InvoiceService<S> {
    ctx: Context<S>,
}

impl<S> Clone for InvoiceService<S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

impl<S: Store> InvoiceService<S> {
    pub(crate) fn new(ctx: Context<S>) -> Self {
        Self { ctx }
    }

    /// Bill the wallet `recipient` on behalf of `issuer`. Both wallets must be
    /// active.
    pub fn create(
        &self,
        issuer: &AccountId,
        recipient: &str,
        amount: Amount,
        purpose: impl Into<String>,
        note: Option<String>,
    ) -> Result<Invoice, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        let to = WalletCode::parse(recipient)
            .ok_or_else(|| LedgerError::RecipientNotFound(recipient.trim().to_string()))?;
        let purpose = purpose.into();

        let invoice = self.ctx.atomically(|unit| {
            unit.wallet(to)
                .ok_or_else(|| LedgerError::RecipientNotFound(to.to_string()))?
                .ensure_active()?;
            let issuer_wallet = unit.require_wallet_of(issuer)?;
            issuer_wallet.ensure_active()?;
            let issuer_wallet = issuer_wallet.code();
            if issuer_wallet == to {
                return Err(LedgerError::SameWallet(to));
            }

            let invoice = Invoice {
                reference: unit.fresh_reference(),
                issuer: issuer.clone(),
                issuer_wallet,
                recipient: to,
                amount,
                purpose,
                note,
                state: InvoiceState::Unpaid,
                created_at: unit.now(),
            };
            unit.insert_invoice(invoice.clone());
            Ok(invoice)
        })?;

        info!(
            reference = %invoice.reference,
            issuer = %invoice.issuer_wallet,
            recipient = %invoice.recipient,
            amount = %invoice.amount,
            "invoice issued"
        );
        Ok(invoice)
    }

    /// Pay an invoice from the payer's wallet, which must be the wallet the
    /// invoice was addressed to.
    pub fn pay(
        &self,
        reference: &Reference,
        payer: &AccountId,
    ) -> Result<InvoiceReceipt, LedgerError> {
        let settings = self.ctx.settings.current();
        let platform = self.ctx.platform;

        let receipt = self.ctx.atomically(|unit| {
            let invoice = unit
                .invoice(reference)
                .cloned()
                .ok_or_else(|| LedgerError::InvoiceNotFound(reference.clone()))?;
            if invoice.is_paid() {
                return Err(LedgerError::InvoiceAlreadyPaid(reference.clone()));
            }
            let payer_wallet = unit.require_wallet_of(payer)?.code();
            if payer_wallet != invoice.recipient {
                return Err(LedgerError::Unauthorized);
            }

            let fee = fee::invoice_fee(invoice.amount, &settings);
            let charged = invoice
                .amount
                .checked_add(fee)
                .ok_or(LedgerError::InvalidAmount)?;
            unit.debit(payer_wallet, charged)?;
            unit.credit(invoice.issuer_wallet, invoice.amount)?;
            if !fee.is_zero() {
                unit.credit(platform, fee)?;
            }
            unit.settle_invoice(reference, payer)?;

            let tx = unit.append(
                NewTransaction::new(TxKind::InvoicePayment, invoice.amount, TxStatus::Success)
                    .from(payer_wallet)
                    .to(invoice.issuer_wallet)
                    .fee(fee)
                    .reference(reference.clone())
                    .note(Some(invoice.purpose.clone())),
            );
            unit.append_fee(FeeType::Invoice, fee, tx);

            Ok(InvoiceReceipt {
                reference: reference.clone(),
                payer_wallet,
                issuer_wallet: invoice.issuer_wallet,
                amount: invoice.amount,
                fee,
                charged,
            })
        })?;

        info!(
            reference = %receipt.reference,
            payer = %receipt.payer_wallet,
            issuer = %receipt.issuer_wallet,
            amount = %receipt.amount,
            fee = %receipt.fee,
            "invoice paid"
        );
        Ok(receipt)
    }

    pub fn get(&self, reference: &Reference) -> Result<Invoice, LedgerError> {
        self.ctx
            .store
            .read(|tables| tables.invoice(reference).cloned())?
            .ok_or_else(|| LedgerError::InvoiceNotFound(reference.clone()))
    }

    /// Invoices issued from or addressed to `wallet`, oldest first.
    pub fn for_wallet(&self, wallet: WalletCode) -> Result<Vec<Invoice>, LedgerError> {
        self.ctx
            .store
            .read(|tables| tables.invoices_for(wallet).into_iter().cloned().collect())
    }

    /// Oldest unpaid invoice addressed to `wallet`.
    pub fn oldest_unpaid_for(&self, wallet: WalletCode) -> Result<Reference, LedgerError> {
        self.ctx
            .store
            .read(|tables| {
                tables
                    .invoices_for(wallet)
                    .into_iter()
                    .find(|inv| inv.recipient == wallet && !inv.is_paid())
                    .map(|inv| inv.reference.clone())
            })?
            .ok_or(LedgerError::NothingOutstanding(wallet))
    }
}
