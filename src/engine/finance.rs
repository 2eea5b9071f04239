//! Finance desk: staff review a pending withdrawal against the holder's
//! identity, then hand over cash and confirm.

use std::sync::Arc;

use super::{Context, PayoutReceipt, WithdrawalService};
use crate::collab::{Authorizer, KycIdentity, KycProvider};
use crate::fee;
use crate::model::{AccountId, PendingWithdrawal, Reference, Role};
use crate::store::Store;
use crate::{Amount, LedgerError};

/// Everything staff need before paying out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutReview {
    pub withdrawal: PendingWithdrawal,
    /// `None` when the KYC collaborator has no record for the holder.
    pub holder: Option<KycIdentity>,
    /// Preview under the current settings; the fee is fixed on confirm.
    pub fee: Amount,
    pub payout: Amount,
    pub currency: String,
}

pub struct FinanceDesk<S> {
    ctx: Context<S>,
    withdrawals: WithdrawalService<S>,
    authorizer: Arc<dyn Authorizer>,
    kyc: Arc<dyn KycProvider>,
}

impl<S> Clone for FinanceDesk<S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            withdrawals: self.withdrawals.clone(),
            authorizer: Arc::clone(&self.authorizer),
            kyc: Arc::clone(&self.kyc),
        }
    }
}

impl<S: Store> FinanceDesk<S> {
    pub(crate) fn new(
        ctx: Context<S>,
        withdrawals: WithdrawalService<S>,
        authorizer: Arc<dyn Authorizer>,
        kyc: Arc<dyn KycProvider>,
    ) -> Self {
        Self {
            ctx,
            withdrawals,
            authorizer,
            kyc,
        }
    }

    pub fn review(&self, role: &Role, reference: &Reference) -> Result<PayoutReview, LedgerError> {
        self.authorize(role)?;
        let withdrawal = self.withdrawals.lookup(reference)?;
        let settings = self.ctx.settings.current();
        let fee = fee::withdrawal_fee(withdrawal.amount, &settings);
        Ok(PayoutReview {
            holder: self.kyc.identity(&withdrawal.owner),
            payout: withdrawal.amount - fee,
            fee,
            currency: settings.currency,
            withdrawal,
        })
    }

    pub fn confirm(
        &self,
        role: &Role,
        staff: &AccountId,
        reference: &Reference,
    ) -> Result<PayoutReceipt, LedgerError> {
        self.authorize(role)?;
        self.withdrawals.process(reference, staff)
    }

    /// The escrow pool as finance sees it.
    pub fn pool(&self, role: &Role) -> Result<Vec<PendingWithdrawal>, LedgerError> {
        self.authorize(role)?;
        self.withdrawals.pending()
    }

    fn authorize(&self, role: &Role) -> Result<(), LedgerError> {
        if self.authorizer.can_handle_finance(role) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized)
        }
    }
}
