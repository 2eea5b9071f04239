use std::ops::Deref;

use chrono::{DateTime, Utc};

use super::Tables;
use crate::model::{
    AccountId, FeeRecord, FeeType, Invoice, InvoiceState, NewTransaction, PendingWithdrawal,
    RedeemCode, RedeemState, Reference, Transaction, TxId, Wallet, WalletCode, WalletStatus,
    WithdrawalState,
};
use crate::{Amount, LedgerError};

/// Inverse of one applied mutation.
#[derive(Debug)]
enum Undo {
    Wallet {
        code: WalletCode,
        previous: Option<Wallet>,
    },
    Transactions(usize),
    Fees(usize),
    RedeemCode {
        code: String,
        previous: Option<RedeemCode>,
    },
    Invoice {
        reference: Reference,
        previous: Option<Invoice>,
    },
    Withdrawal {
        reference: Reference,
        previous: Option<PendingWithdrawal>,
    },
    Reference(Reference),
}

/// A set of mutations that is either kept entirely or undone entirely.
///
/// Every mutating method journals the prior value before touching the tables,
/// so [`rollback`](Self::rollback) can restore them in reverse order. Reads go
/// straight through to [`Tables`] via `Deref` and see the unit's own writes.
pub struct UnitOfWork<'a> {
    tables: &'a mut Tables,
    journal: Vec<Undo>,
    now: DateTime<Utc>,
}

impl<'a> UnitOfWork<'a> {
    pub(super) fn new(tables: &'a mut Tables, now: DateTime<Utc>) -> Self {
        Self {
            tables,
            journal: Vec::new(),
            now,
        }
    }

    /// Timestamp applied to every record written by this unit.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub(super) fn commit(self) {}

    pub(super) fn rollback(self) {
        let tables = self.tables;
        for undo in self.journal.into_iter().rev() {
            match undo {
                Undo::Wallet { code, previous } => match previous {
                    Some(wallet) => {
                        tables.wallets.insert(code, wallet);
                    }
                    None => {
                        if let Some(wallet) = tables.wallets.remove(&code) {
                            tables.owners.remove(wallet.owner());
                        }
                    }
                },
                Undo::Transactions(len) => tables.transactions.truncate(len),
                Undo::Fees(len) => tables.fees.truncate(len),
                Undo::RedeemCode { code, previous } => match previous {
                    Some(voucher) => {
                        tables.redeem_codes.insert(code, voucher);
                    }
                    None => {
                        tables.redeem_codes.remove(&code);
                    }
                },
                Undo::Invoice {
                    reference,
                    previous,
                } => match previous {
                    Some(invoice) => {
                        tables.invoices.insert(reference, invoice);
                    }
                    None => {
                        tables.invoices.remove(&reference);
                    }
                },
                Undo::Withdrawal {
                    reference,
                    previous,
                } => match previous {
                    Some(record) => {
                        tables.withdrawals.insert(reference, record);
                    }
                    None => {
                        tables.withdrawals.remove(&reference);
                    }
                },
                Undo::Reference(reference) => {
                    tables.references.remove(&reference);
                }
            }
        }
    }
}

/// Wallets
impl UnitOfWork<'_> {
    pub fn require_wallet(&self, code: WalletCode) -> Result<&Wallet, LedgerError> {
        self.tables
            .wallet(code)
            .ok_or_else(|| LedgerError::WalletNotFound(code.to_string()))
    }

    pub fn require_wallet_of(&self, account: &AccountId) -> Result<&Wallet, LedgerError> {
        self.tables
            .wallet_of(account)
            .ok_or_else(|| LedgerError::NoWallet(account.clone()))
    }

    pub fn insert_wallet(&mut self, wallet: Wallet) -> Result<(), LedgerError> {
        if self.tables.owners.contains_key(wallet.owner()) {
            return Err(LedgerError::WalletAlreadyExists(wallet.owner().clone()));
        }
        if let Some(existing) = self.tables.wallets.get(&wallet.code()) {
            return Err(LedgerError::WalletAlreadyExists(existing.owner().clone()));
        }
        let code = wallet.code();
        self.journal.push(Undo::Wallet {
            code,
            previous: None,
        });
        self.tables.owners.insert(wallet.owner().clone(), code);
        self.tables.wallets.insert(code, wallet);
        Ok(())
    }

    fn wallet_mut(&mut self, code: WalletCode) -> Result<&mut Wallet, LedgerError> {
        let wallet = self
            .tables
            .wallets
            .get_mut(&code)
            .ok_or_else(|| LedgerError::WalletNotFound(code.to_string()))?;
        self.journal.push(Undo::Wallet {
            code,
            previous: Some(wallet.clone()),
        });
        Ok(wallet)
    }

    pub fn credit(&mut self, code: WalletCode, amount: Amount) -> Result<Amount, LedgerError> {
        self.wallet_mut(code)?.credit(amount)
    }

    pub fn debit(&mut self, code: WalletCode, amount: Amount) -> Result<Amount, LedgerError> {
        self.wallet_mut(code)?.debit(amount)
    }

    /// Escrow reversal credit; see [`Wallet::refund`].
    pub fn refund(&mut self, code: WalletCode, amount: Amount) -> Result<Amount, LedgerError> {
        self.wallet_mut(code)?.refund(amount)
    }

    pub fn set_status(
        &mut self,
        code: WalletCode,
        status: WalletStatus,
    ) -> Result<WalletStatus, LedgerError> {
        let wallet = self.wallet_mut(code)?;
        let previous = wallet.status();
        wallet.set_status(status)?;
        Ok(previous)
    }
}

/// Transaction log and fee ledger
impl UnitOfWork<'_> {
    pub fn append(&mut self, entry: NewTransaction) -> TxId {
        let len = self.tables.transactions.len();
        self.journal.push(Undo::Transactions(len));
        let id = len as TxId + 1;
        self.tables.transactions.push(Transaction {
            id,
            kind: entry.kind,
            amount: entry.amount,
            fee: entry.fee,
            from: entry.from,
            to: entry.to,
            reference: entry.reference,
            status: entry.status,
            note: entry.note,
            created_at: self.now,
        });
        id
    }

    /// Record a collected fee. Zero fees are not recorded.
    pub fn append_fee(&mut self, kind: FeeType, amount: Amount, transaction: TxId) {
        if amount.is_zero() {
            return;
        }
        self.journal.push(Undo::Fees(self.tables.fees.len()));
        self.tables.fees.push(FeeRecord {
            kind,
            amount,
            transaction,
            created_at: self.now,
        });
    }

    /// A reference never handed out before, reserved for this unit.
    pub fn fresh_reference(&mut self) -> Reference {
        let mut rng = rand::thread_rng();
        loop {
            let candidate = Reference::generate(&mut rng);
            if self.tables.references.insert(candidate.clone()) {
                self.journal.push(Undo::Reference(candidate.clone()));
                return candidate;
            }
        }
    }
}

/// Redeem codes
impl UnitOfWork<'_> {
    pub fn insert_redeem_code(&mut self, voucher: RedeemCode) -> Result<(), LedgerError> {
        if self.tables.redeem_codes.contains_key(&voucher.code) {
            return Err(LedgerError::InvalidRedeemCode(voucher.code));
        }
        self.journal.push(Undo::RedeemCode {
            code: voucher.code.clone(),
            previous: None,
        });
        self.tables
            .redeem_codes
            .insert(voucher.code.clone(), voucher);
        Ok(())
    }

    /// Flip a voucher from unused to used. Fails if someone got there first.
    pub fn consume_code(&mut self, code: &str, by: &AccountId) -> Result<RedeemCode, LedgerError> {
        let now = self.now;
        let voucher = self
            .tables
            .redeem_codes
            .get_mut(code)
            .ok_or(LedgerError::CodeNotFound)?;
        if voucher.is_used() {
            return Err(LedgerError::CodeAlreadyUsed);
        }
        self.journal.push(Undo::RedeemCode {
            code: code.to_string(),
            previous: Some(voucher.clone()),
        });
        voucher.state = RedeemState::Used {
            by: by.clone(),
            at: now,
        };
        Ok(voucher.clone())
    }
}

/// Invoices
impl UnitOfWork<'_> {
    pub fn insert_invoice(&mut self, invoice: Invoice) {
        self.journal.push(Undo::Invoice {
            reference: invoice.reference.clone(),
            previous: self.tables.invoices.get(&invoice.reference).cloned(),
        });
        self.tables
            .invoices
            .insert(invoice.reference.clone(), invoice);
    }

    /// Unpaid to paid, exactly once.
    pub fn settle_invoice(
        &mut self,
        reference: &Reference,
        payer: &AccountId,
    ) -> Result<Invoice, LedgerError> {
        let now = self.now;
        let invoice = self
            .tables
            .invoices
            .get_mut(reference)
            .ok_or_else(|| LedgerError::InvoiceNotFound(reference.clone()))?;
        if invoice.is_paid() {
            return Err(LedgerError::InvoiceAlreadyPaid(reference.clone()));
        }
        self.journal.push(Undo::Invoice {
            reference: reference.clone(),
            previous: Some(invoice.clone()),
        });
        invoice.state = InvoiceState::Paid {
            payer: payer.clone(),
            paid_at: now,
        };
        Ok(invoice.clone())
    }
}

/// Withdrawal pool
impl UnitOfWork<'_> {
    pub fn insert_withdrawal(&mut self, record: PendingWithdrawal) {
        self.journal.push(Undo::Withdrawal {
            reference: record.reference.clone(),
            previous: self.tables.withdrawals.get(&record.reference).cloned(),
        });
        self.tables
            .withdrawals
            .insert(record.reference.clone(), record);
    }

    /// Move a pending record into a terminal state. The record must still be
    /// pending at this point; anything else is reported as already processed.
    pub fn close_withdrawal(
        &mut self,
        reference: &Reference,
        next: WithdrawalState,
    ) -> Result<PendingWithdrawal, LedgerError> {
        let record = self
            .tables
            .withdrawals
            .get_mut(reference)
            .ok_or_else(|| LedgerError::WithdrawalNotFound(reference.clone()))?;
        if !record.is_pending() || !next.is_terminal() {
            return Err(LedgerError::WithdrawalAlreadyProcessed(reference.clone()));
        }
        self.journal.push(Undo::Withdrawal {
            reference: reference.clone(),
            previous: Some(record.clone()),
        });
        record.state = next;
        Ok(record.clone())
    }
}

impl Deref for UnitOfWork<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        &*self.tables
    }
}
