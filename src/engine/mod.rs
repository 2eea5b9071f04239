//! Wallet ledger engine.
//!
//! The engine wires the services to one store and one set of collaborators.
//! Each service call is synchronous and runs its mutations as a single unit
//! against the store. [`Engine::run`] feeds an async stream of [`Command`]s
//! through [`Engine::apply`], the way a request handler would.

use std::sync::Arc;
use std::time::Duration;

use tokio_stream::{Stream, StreamExt};
use tracing::{error, info};

use crate::LedgerError;
use crate::clock::{Clock, SystemClock};
use crate::collab::{Authorizer, InMemoryKyc, KycProvider, StaticRoles};
use crate::command::{Command, Selector};
use crate::model::{AccountId, Reference, WalletCode};
use crate::settings::{SettingsProvider, SharedSettings};
use crate::store::{MemoryStore, Store, UnitOfWork};

mod finance;
mod invoice;
mod redeem;
mod sweeper;
mod transfer;
mod wallets;
mod withdrawal;

pub use finance::{FinanceDesk, PayoutReview};
pub use invoice::{InvoiceReceipt, InvoiceService};
pub use redeem::{DepositReceipt, RedeemService};
pub use sweeper::ExpirySweeper;
pub use transfer::{TransferReceipt, TransferService};
pub use wallets::WalletService;
pub use withdrawal::{PayoutReceipt, WithdrawalService};

/// What every service shares: the store, the settings collaborator, the clock
/// and the platform wallet that collects fees.
pub(crate) struct Context<S> {
    pub(crate) store: Arc<S>,
    pub(crate) settings: Arc<dyn SettingsProvider>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) platform: WalletCode,
}

impl<S> Clone for Context<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: Arc::clone(&self.settings),
            clock: Arc::clone(&self.clock),
            platform: self.platform,
        }
    }
}

impl<S: Store> Context<S> {
    /// Run `work` as one unit stamped with the current time.
    pub(crate) fn atomically<T>(
        &self,
        work: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        self.store.atomically(self.clock.now(), work)
    }
}

/// External collaborators the engine consults but does not own.
pub struct Collaborators {
    pub settings: Arc<dyn SettingsProvider>,
    pub authorizer: Arc<dyn Authorizer>,
    pub kyc: Arc<dyn KycProvider>,
    pub clock: Arc<dyn Clock>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            settings: Arc::new(SharedSettings::default()),
            authorizer: Arc::new(StaticRoles::default()),
            kyc: Arc::new(InMemoryKyc::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

/// The wallet ledger engine.
pub struct Engine<S: Store = MemoryStore> {
    ctx: Context<S>,
    wallets: WalletService<S>,
    transfers: TransferService<S>,
    redeem: RedeemService<S>,
    withdrawals: WithdrawalService<S>,
    invoices: InvoiceService<S>,
    finance: FinanceDesk<S>,
}

/// Public API
impl<S: Store> Engine<S> {
    /// Build an engine over `store` and provision the platform wallet, owned by
    /// `platform_owner`, if the store does not hold it yet.
    pub fn new(
        store: Arc<S>,
        collab: Collaborators,
        platform_wallet: WalletCode,
        platform_owner: AccountId,
    ) -> Result<Self, LedgerError> {
        let ctx = Context {
            store,
            settings: collab.settings,
            clock: collab.clock,
            platform: platform_wallet,
        };
        let wallets = WalletService::new(ctx.clone(), Arc::clone(&collab.authorizer));
        let withdrawals = WithdrawalService::new(ctx.clone());
        let engine = Self {
            transfers: TransferService::new(ctx.clone()),
            redeem: RedeemService::new(ctx.clone(), Arc::clone(&collab.authorizer)),
            invoices: InvoiceService::new(ctx.clone()),
            finance: FinanceDesk::new(
                ctx.clone(),
                withdrawals.clone(),
                collab.authorizer,
                collab.kyc,
            ),
            withdrawals,
            wallets,
            ctx,
        };
        engine.wallets.ensure_platform(&platform_owner)?;
        Ok(engine)
    }

    pub fn wallets(&self) -> &WalletService<S> {
        &self.wallets
    }

    pub fn transfers(&self) -> &TransferService<S> {
        &self.transfers
    }

    pub fn redeem(&self) -> &RedeemService<S> {
        &self.redeem
    }

    pub fn withdrawals(&self) -> &WithdrawalService<S> {
        &self.withdrawals
    }

    pub fn invoices(&self) -> &InvoiceService<S> {
        &self.invoices
    }

    pub fn finance(&self) -> &FinanceDesk<S> {
        &self.finance
    }

    pub fn store(&self) -> &S {
        &self.ctx.store
    }

    /// Wallet that collects every fee.
    pub fn platform_wallet(&self) -> WalletCode {
        self.ctx.platform
    }

    /// Background task that expires overdue withdrawals every `interval`.
    pub fn sweeper(&self, interval: Duration) -> ExpirySweeper<S> {
        ExpirySweeper::new(self.withdrawals.clone(), interval)
    }

    /// Run the engine over a stream of commands. A rejected command does not
    /// stop the engine; an infrastructure failure does.
    pub async fn run(
        &self,
        mut stream: impl Stream<Item = Command> + Unpin,
    ) -> Result<(), LedgerError> {
        while let Some(command) = stream.next().await {
            if let Err(e) = self.apply(command) {
                if e.is_infrastructure() {
                    error!(reason = %e, "store failure, stopping engine");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Apply a single command.
    pub fn apply(&self, command: Command) -> Result<(), LedgerError> {
        let op = command.name();
        match command {
            Command::OpenWallet { account, code } => {
                let result = match code {
                    Some(code) => self.wallets.open_wallet_with_code(&account, code),
                    None => self.wallets.open_wallet(&account),
                };
                Self::log_result(op, account.as_str(), None, &result.map(|_| ()))?;
            }
            Command::IssueCode { role, amount } => {
                let result = self.redeem.issue(&role, amount, None);
                Self::log_result(op, role.as_str(), None, &result.map(|_| ()))?;
            }
            Command::ImportCode {
                role,
                code,
                pin,
                amount,
            } => {
                let result = self.redeem.import(&role, &code, &pin, amount, None);
                Self::log_result(op, role.as_str(), None, &result.map(|_| ()))?;
            }
            Command::Redeem { account, code, pin } => {
                let result = self.redeem.redeem(&account, &code, &pin);
                let reference = result.as_ref().ok().map(|r| r.reference.clone());
                Self::log_result(op, account.as_str(), reference.as_ref(), &result.map(|_| ()))?;
            }
            Command::Send {
                account,
                recipient,
                amount,
                note,
            } => {
                let result = self.transfers.send(&account, &recipient, amount, note);
                let reference = result.as_ref().ok().map(|r| r.reference.clone());
                Self::log_result(op, account.as_str(), reference.as_ref(), &result.map(|_| ()))?;
            }
            Command::Withdraw { account, amount } => {
                let result = self.withdrawals.request(&account, amount);
                let reference = result.as_ref().ok().map(|r| r.reference.clone());
                Self::log_result(op, account.as_str(), reference.as_ref(), &result.map(|_| ()))?;
            }
            Command::ProcessWithdrawal {
                role,
                staff,
                target,
            } => {
                let result = self
                    .resolve_withdrawal(&target)
                    .and_then(|reference| self.finance.confirm(&role, &staff, &reference));
                let reference = result.as_ref().ok().map(|r| r.reference.clone());
                Self::log_result(op, staff.as_str(), reference.as_ref(), &result.map(|_| ()))?;
            }
            Command::CancelWithdrawal { account, reference } => {
                let result = self
                    .resolve_own(&account, reference, |wallet| {
                        self.withdrawals.oldest_pending_for(wallet)
                    })
                    .and_then(|reference| self.withdrawals.cancel(&reference, &account));
                let reference = result.as_ref().ok().map(|r| r.reference.clone());
                Self::log_result(op, account.as_str(), reference.as_ref(), &result.map(|_| ()))?;
            }
            Command::IssueInvoice {
                account,
                recipient,
                amount,
                purpose,
                note,
            } => {
                let result = self
                    .invoices
                    .create(&account, &recipient, amount, purpose, note);
                let reference = result.as_ref().ok().map(|inv| inv.reference.clone());
                Self::log_result(op, account.as_str(), reference.as_ref(), &result.map(|_| ()))?;
            }
            Command::PayInvoice { account, reference } => {
                let result = self
                    .resolve_own(&account, reference, |wallet| {
                        self.invoices.oldest_unpaid_for(wallet)
                    })
                    .and_then(|reference| self.invoices.pay(&reference, &account));
                let reference = result.as_ref().ok().map(|r| r.reference.clone());
                Self::log_result(op, account.as_str(), reference.as_ref(), &result.map(|_| ()))?;
            }
            Command::SetStatus {
                role,
                wallet,
                status,
            } => {
                let result = self.wallets.set_status(&role, wallet, status);
                Self::log_result(op, role.as_str(), None, &result)?;
            }
            Command::Sweep => {
                let expired = self.withdrawals.expire_due()?;
                info!(expired, "{op} applied");
            }
        }
        Ok(())
    }
}

/// Private API
impl<S: Store> Engine<S> {
    /// Small helper to log `apply` results. Hands the result back so the
    /// caller can propagate it.
    fn log_result(
        op: &str,
        actor: &str,
        reference: Option<&Reference>,
        result: &Result<(), LedgerError>,
    ) -> Result<(), LedgerError> {
        match (result, reference) {
            (Ok(()), Some(reference)) => {
                info!(actor, reference = %reference, "{op} applied");
            }
            (Ok(()), None) => {
                info!(actor, "{op} applied");
            }
            (Err(e), _) => {
                info!(actor, code = e.code(), reason = %e, "{op} skipped");
            }
        }
        result.clone()
    }

    fn resolve_withdrawal(&self, target: &Selector) -> Result<Reference, LedgerError> {
        match target {
            Selector::Reference(reference) => Ok(reference.clone()),
            Selector::Oldest(wallet) => self.withdrawals.oldest_pending_for(*wallet),
        }
    }

    /// Use the explicit reference if given, otherwise pick the oldest
    /// outstanding record of the account's own wallet.
    fn resolve_own(
        &self,
        account: &AccountId,
        reference: Option<Reference>,
        oldest: impl FnOnce(WalletCode) -> Result<Reference, LedgerError>,
    ) -> Result<Reference, LedgerError> {
        match reference {
            Some(reference) => Ok(reference),
            None => oldest(self.wallets.wallet_of(account)?.code()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{engine, funded};
    use super::*;
    use crate::Amount;
    use crate::model::{Role, WalletStatus};

    fn send(from: &str, to: &str, minor: u64) -> Command {
        Command::Send {
            account: AccountId::new(from),
            recipient: to.to_string(),
            amount: Amount::from_minor(minor),
            note: None,
        }
    }

    #[test]
    fn new_engine_provisions_platform_wallet() {
        let (engine, _) = engine();
        let platform = engine.wallets().lookup_by_code("SYS000").unwrap();
        assert_eq!(platform.owner(), &AccountId::new("platform"));
        assert_eq!(platform.balance(), Amount::ZERO);
    }

    #[test]
    fn apply_send_moves_funds() {
        let (engine, _) = engine();
        let alice = funded(&engine, "alice", "VXE445", 10_000);
        engine.apply(send("alice", "HUY444", 1_000)).unwrap_err();

        let bob = funded(&engine, "bob", "HUY444", 0);
        engine.apply(send("alice", "HUY444", 1_000)).unwrap();
        assert_eq!(engine.wallets().balance(alice).unwrap(), Amount::from_minor(9_000));
        assert_eq!(engine.wallets().balance(bob).unwrap(), Amount::from_minor(950));
    }

    #[test]
    fn apply_selects_oldest_pending_withdrawal() {
        let (engine, harness) = engine();
        let alice = funded(&engine, "alice", "VXE445", 10_000);
        engine
            .apply(Command::Withdraw {
                account: AccountId::new("alice"),
                amount: Amount::from_minor(4_000),
            })
            .unwrap();
        harness.clock.advance(chrono::Duration::minutes(1));
        engine
            .apply(Command::Withdraw {
                account: AccountId::new("alice"),
                amount: Amount::from_minor(1_000),
            })
            .unwrap();

        engine
            .apply(Command::ProcessWithdrawal {
                role: Role::new("finance"),
                staff: AccountId::new("cashier"),
                target: Selector::Oldest(alice),
            })
            .unwrap();

        let pending = engine.withdrawals().pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].amount, Amount::from_minor(1_000));
    }

    #[test]
    fn apply_reports_nothing_outstanding() {
        let (engine, _) = engine();
        let alice = funded(&engine, "alice", "VXE445", 0);
        assert_eq!(
            engine.apply(Command::ProcessWithdrawal {
                role: Role::new("finance"),
                staff: AccountId::new("cashier"),
                target: Selector::Oldest(alice),
            }),
            Err(LedgerError::NothingOutstanding(alice))
        );
        assert_eq!(
            engine.apply(Command::PayInvoice {
                account: AccountId::new("alice"),
                reference: None,
            }),
            Err(LedgerError::NothingOutstanding(alice))
        );
    }

    #[test]
    fn apply_set_status_and_sweep() {
        let (engine, harness) = engine();
        let alice = funded(&engine, "alice", "VXE445", 500);
        engine
            .apply(Command::Withdraw {
                account: AccountId::new("alice"),
                amount: Amount::from_minor(500),
            })
            .unwrap();
        engine
            .apply(Command::SetStatus {
                role: Role::new("admin"),
                wallet: alice,
                status: WalletStatus::Suspended,
            })
            .unwrap();

        harness.clock.advance(chrono::Duration::hours(25));
        engine.apply(Command::Sweep).unwrap();
        // escrow reversal reaches a suspended wallet
        assert_eq!(engine.wallets().balance(alice).unwrap(), Amount::from_minor(500));
        assert!(engine.withdrawals().pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_continues_past_rejected_commands() {
        let (engine, _) = engine();
        funded(&engine, "alice", "VXE445", 1_000);
        let bob = funded(&engine, "bob", "HUY444", 0);

        let commands = vec![
            send("alice", "HUY444", 5_000),
            send("alice", "NOP000", 100),
            send("alice", "HUY444", 1_000),
        ];
        engine
            .run(tokio_stream::iter(commands))
            .await
            .unwrap();

        assert_eq!(engine.wallets().balance(bob).unwrap(), Amount::from_minor(950));
    }
}
