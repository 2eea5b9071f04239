use std::collections::{HashMap, HashSet};

use crate::Amount;
use crate::model::{
    AccountId, FeeRecord, FeeType, Invoice, PendingWithdrawal, RedeemCode, Reference,
    Transaction, Wallet, WalletCode,
};

/// Every record the ledger keeps. Mutated only through a
/// [`UnitOfWork`](super::UnitOfWork); read through the query methods.
#[derive(Debug, Default)]
pub struct Tables {
    pub(super) wallets: HashMap<WalletCode, Wallet>,
    pub(super) owners: HashMap<AccountId, WalletCode>,
    pub(super) transactions: Vec<Transaction>,
    pub(super) fees: Vec<FeeRecord>,
    pub(super) redeem_codes: HashMap<String, RedeemCode>,
    pub(super) invoices: HashMap<Reference, Invoice>,
    pub(super) withdrawals: HashMap<Reference, PendingWithdrawal>,
    /// Every reference handed out, across all record kinds.
    pub(super) references: HashSet<Reference>,
}

/// Queries
impl Tables {
    pub fn wallet(&self, code: WalletCode) -> Option<&Wallet> {
        self.wallets.get(&code)
    }

    pub fn wallet_of(&self, account: &AccountId) -> Option<&Wallet> {
        self.owners
            .get(account)
            .and_then(|code| self.wallets.get(code))
    }

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> + '_ {
        self.wallets.values()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// History of one wallet, oldest first.
    pub fn transactions_for(&self, wallet: WalletCode) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|tx| tx.touches(wallet))
            .collect()
    }

    pub fn transactions_by_reference(&self, reference: &Reference) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|tx| tx.reference.as_ref() == Some(reference))
            .collect()
    }

    pub fn fees(&self) -> &[FeeRecord] {
        &self.fees
    }

    /// Fees collected, optionally restricted to one type.
    pub fn fee_total(&self, kind: Option<FeeType>) -> Amount {
        self.fees
            .iter()
            .filter(|fee| kind.is_none_or(|k| fee.kind == k))
            .map(|fee| fee.amount)
            .sum()
    }

    pub fn redeem_code(&self, code: &str) -> Option<&RedeemCode> {
        self.redeem_codes.get(code)
    }

    pub fn invoice(&self, reference: &Reference) -> Option<&Invoice> {
        self.invoices.get(reference)
    }

    /// Invoices issued from or addressed to `wallet`, oldest first.
    pub fn invoices_for(&self, wallet: WalletCode) -> Vec<&Invoice> {
        let mut invoices: Vec<_> = self
            .invoices
            .values()
            .filter(|inv| inv.recipient == wallet || inv.issuer_wallet == wallet)
            .collect();
        invoices.sort_by(|a, b| {
            (a.created_at, &a.reference).cmp(&(b.created_at, &b.reference))
        });
        invoices
    }

    pub fn withdrawal(&self, reference: &Reference) -> Option<&PendingWithdrawal> {
        self.withdrawals.get(reference)
    }

    /// All withdrawals of one wallet, oldest first.
    pub fn withdrawals_for(&self, wallet: WalletCode) -> Vec<&PendingWithdrawal> {
        let mut records: Vec<_> = self
            .withdrawals
            .values()
            .filter(|w| w.wallet == wallet)
            .collect();
        records.sort_by(|a, b| {
            (a.created_at, &a.reference).cmp(&(b.created_at, &b.reference))
        });
        records
    }

    /// The escrow pool: every still-pending withdrawal, oldest first.
    pub fn pending_withdrawals(&self) -> Vec<&PendingWithdrawal> {
        let mut records: Vec<_> = self
            .withdrawals
            .values()
            .filter(|w| w.is_pending())
            .collect();
        records.sort_by(|a, b| {
            (a.created_at, &a.reference).cmp(&(b.created_at, &b.reference))
        });
        records
    }

    /// Wallet balances plus funds held in escrow.
    pub fn total_value(&self) -> Amount {
        let balances: Amount = self.wallets.values().map(Wallet::balance).sum();
        let escrow: Amount = self
            .withdrawals
            .values()
            .filter(|w| w.is_pending())
            .map(|w| w.amount)
            .sum();
        balances + escrow
    }
}
