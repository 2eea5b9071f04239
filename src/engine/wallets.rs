//! Wallet store operations: opening, lookup, balance primitives and
//! administrative status changes.

use std::sync::Arc;

use tracing::info;

use super::Context;
use crate::collab::Authorizer;
use crate::model::{AccountId, Role, Transaction, Wallet, WalletCode, WalletStatus};
use crate::store::Store;
use crate::{Amount, LedgerError};

pub struct WalletService<S> {
    ctx: Context<S>,
    authorizer: Arc<dyn Authorizer>,
}

impl<S> Clone for WalletService<S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            authorizer: Arc::clone(&self.authorizer),
        }
    }
}

impl<S: Store> WalletService<S> {
    pub(crate) fn new(ctx: Context<S>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self { ctx, authorizer }
    }

    /// Issue a wallet with a fresh random code. Called once identity
    /// verification for `account` has been approved.
    pub fn open_wallet(&self, account: &AccountId) -> Result<WalletCode, LedgerError> {
        let code = self.ctx.atomically(|unit| {
            if unit.wallet_of(account).is_some() {
                return Err(LedgerError::WalletAlreadyExists(account.clone()));
            }
            let mut rng = rand::thread_rng();
            let code = loop {
                let candidate = WalletCode::generate(&mut rng);
                if unit.wallet(candidate).is_none() {
                    break candidate;
                }
            };
            unit.insert_wallet(Wallet::open(code, account.clone(), unit.now()))?;
            Ok(code)
        })?;
        info!(account = %account, wallet = %code, "wallet opened");
        Ok(code)
    }

    /// Issue a wallet under a known code, e.g. when importing existing accounts.
    pub fn open_wallet_with_code(
        &self,
        account: &AccountId,
        code: WalletCode,
    ) -> Result<WalletCode, LedgerError> {
        self.ctx.atomically(|unit| {
            unit.insert_wallet(Wallet::open(code, account.clone(), unit.now()))?;
            Ok(code)
        })?;
        info!(account = %account, wallet = %code, "wallet opened");
        Ok(code)
    }

    /// Provision the fee-collecting wallet if it does not exist yet.
    pub(crate) fn ensure_platform(&self, owner: &AccountId) -> Result<(), LedgerError> {
        let platform = self.ctx.platform;
        self.ctx.atomically(|unit| {
            if unit.wallet(platform).is_none() {
                unit.insert_wallet(Wallet::open(platform, owner.clone(), unit.now()))?;
            }
            Ok(())
        })
    }

    /// Resolve a public wallet code. Malformed and unknown codes are both
    /// `WalletNotFound`.
    pub fn lookup_by_code(&self, input: &str) -> Result<Wallet, LedgerError> {
        let code = WalletCode::parse(input)
            .ok_or_else(|| LedgerError::WalletNotFound(input.trim().to_string()))?;
        self.ctx
            .store
            .read(|tables| tables.wallet(code).cloned())?
            .ok_or_else(|| LedgerError::WalletNotFound(code.to_string()))
    }

    pub fn wallet_of(&self, account: &AccountId) -> Result<Wallet, LedgerError> {
        self.ctx
            .store
            .read(|tables| tables.wallet_of(account).cloned())?
            .ok_or_else(|| LedgerError::NoWallet(account.clone()))
    }

    pub fn balance(&self, code: WalletCode) -> Result<Amount, LedgerError> {
        self.ctx
            .store
            .read(|tables| tables.wallet(code).map(Wallet::balance))?
            .ok_or_else(|| LedgerError::WalletNotFound(code.to_string()))
    }

    /// Raw credit. Orchestrated operations go through their own services,
    /// which also write the transaction log; this is the bare store primitive.
    pub fn credit(&self, code: WalletCode, amount: Amount) -> Result<Amount, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        self.ctx.atomically(|unit| unit.credit(code, amount))
    }

    /// Raw debit; see [`credit`](Self::credit).
    pub fn debit(&self, code: WalletCode, amount: Amount) -> Result<Amount, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        self.ctx.atomically(|unit| unit.debit(code, amount))
    }

    pub fn set_status(
        &self,
        role: &Role,
        code: WalletCode,
        status: WalletStatus,
    ) -> Result<(), LedgerError> {
        if !self.authorizer.is_admin(role) {
            return Err(LedgerError::Unauthorized);
        }
        let previous = self.ctx.atomically(|unit| unit.set_status(code, status))?;
        info!(wallet = %code, from = %previous, to = %status, "wallet status changed");
        Ok(())
    }

    /// Transaction history of a wallet, oldest first.
    pub fn history(&self, code: WalletCode) -> Result<Vec<Transaction>, LedgerError> {
        self.ctx.store.read(|tables| {
            tables
                .transactions_for(code)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Every wallet, ordered by code.
    pub fn all(&self) -> Result<Vec<Wallet>, LedgerError> {
        self.ctx.store.read(|tables| {
            let mut wallets: Vec<Wallet> = tables.wallets().cloned().collect();
            wallets.sort_by_key(Wallet::code);
            wallets
        })
    }
}
