//! Deposit by redeem code.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::Context;
use crate::collab::Authorizer;
use crate::fee;
use crate::model::{
    AccountId, FeeType, NewTransaction, RedeemCode, RedeemState, Reference, Role, TxKind,
    TxStatus, WalletCode, normalize_code, validate_pin,
};
use crate::store::Store;
use crate::{Amount, LedgerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositReceipt {
    pub reference: Reference,
    pub wallet: WalletCode,
    /// Face value of the voucher.
    pub amount: Amount,
    pub fee: Amount,
    pub credited: Amount,
}

pub struct RedeemService<S> {
    ctx: Context<S>,
    authorizer: Arc<dyn Authorizer>,
}

impl<S> Clone for RedeemService<S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            authorizer: Arc::clone(&self.authorizer),
        }
    }
}

impl<S: Store> RedeemService<S> {
    pub(crate) fn new(ctx: Context<S>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self { ctx, authorizer }
    }

    /// Mint a voucher with a random code and PIN.
    pub fn issue(
        &self,
        role: &Role,
        amount: Amount,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<RedeemCode, LedgerError> {
        self.authorize(role, amount)?;
        let voucher = self.ctx.atomically(|unit| {
            let mut rng = rand::thread_rng();
            let (code, pin) = loop {
                let (code, pin) = RedeemCode::generate(&mut rng);
                if unit.redeem_code(&code).is_none() {
                    break (code, pin);
                }
            };
            let voucher = RedeemCode {
                code,
                pin,
                amount,
                state: RedeemState::Unused,
                expires_at,
                created_at: unit.now(),
            };
            unit.insert_redeem_code(voucher.clone())?;
            Ok(voucher)
        })?;
        info!(code = %voucher.code, amount = %amount, "redeem code issued");
        Ok(voucher)
    }

    /// Register a voucher whose code and PIN were produced elsewhere, e.g.
    /// printed cards.
    pub fn import(
        &self,
        role: &Role,
        code: &str,
        pin: &str,
        amount: Amount,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<RedeemCode, LedgerError> {
        self.authorize(role, amount)?;
        let code = normalize_code(code)?;
        validate_pin(pin)?;
        let voucher = self.ctx.atomically(|unit| {
            let voucher = RedeemCode {
                code,
                pin: pin.to_string(),
                amount,
                state: RedeemState::Unused,
                expires_at,
                created_at: unit.now(),
            };
            unit.insert_redeem_code(voucher.clone())?;
            Ok(voucher)
        })?;
        info!(code = %voucher.code, amount = %amount, "redeem code imported");
        Ok(voucher)
    }

    /// Consume a voucher and credit its value to the account's wallet.
    ///
    /// Checks run in order: unknown code, already used, wrong PIN, expired.
    /// Marking the code used and crediting the wallet happen in one unit, so
    /// of several concurrent attempts exactly one succeeds.
    pub fn redeem(
        &self,
        account: &AccountId,
        code: &str,
        pin: &str,
    ) -> Result<DepositReceipt, LedgerError> {
        let code = normalize_code(code).map_err(|_| LedgerError::CodeNotFound)?;
        let settings = self.ctx.settings.current();
        let platform = self.ctx.platform;

        let receipt = self.ctx.atomically(|unit| {
            let voucher = unit
                .redeem_code(&code)
                .cloned()
                .ok_or(LedgerError::CodeNotFound)?;
            if voucher.is_used() {
                return Err(LedgerError::CodeAlreadyUsed);
            }
            if voucher.pin != pin.trim() {
                return Err(LedgerError::InvalidPin);
            }
            if voucher.is_expired(unit.now()) {
                return Err(LedgerError::CodeExpired);
            }

            let wallet = unit.require_wallet_of(account)?.code();
            unit.consume_code(&code, account)?;

            let fee = fee::deposit_fee(voucher.amount, &settings);
            let credited = voucher.amount - fee;
            unit.credit(wallet, credited)?;
            if !fee.is_zero() {
                unit.credit(platform, fee)?;
            }

            let reference = unit.fresh_reference();
            let tx = unit.append(
                NewTransaction::new(TxKind::Deposit, voucher.amount, TxStatus::Success)
                    .to(wallet)
                    .fee(fee)
                    .reference(reference.clone())
                    .note(Some(format!("redeem code {}", voucher.code))),
            );
            unit.append_fee(FeeType::Deposit, fee, tx);

            Ok(DepositReceipt {
                reference,
                wallet,
                amount: voucher.amount,
                fee,
                credited,
            })
        })?;

        info!(
            account = %account,
            wallet = %receipt.wallet,
            amount = %receipt.amount,
            reference = %receipt.reference,
            "redeem code deposited"
        );
        Ok(receipt)
    }

    fn authorize(&self, role: &Role, amount: Amount) -> Result<(), LedgerError> {
        if !self.authorizer.is_admin(role) {
            return Err(LedgerError::Unauthorized);
        }
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{engine, funded};
    use super::*;
    use crate::clock::Clock;
    use crate::settings::{FeeRate, FeeSettings};
    use chrono::Duration;

    fn admin() -> Role {
        Role::new("admin")
    }

    #[test]
    fn redeem_credits_wallet_once() {
        let (engine, _) = engine();
        let wallet = funded(&engine, "alice", "VXE445", 0);
        let voucher = engine
            .redeem()
            .issue(&admin(), Amount::from_minor(2_500), None)
            .unwrap();
        let alice = AccountId::new("alice");

        let receipt = engine
            .redeem()
            .redeem(&alice, &voucher.code, &voucher.pin)
            .unwrap();
        assert_eq!(receipt.credited, Amount::from_minor(2_500));
        assert_eq!(engine.wallets().balance(wallet).unwrap(), Amount::from_minor(2_500));

        assert_eq!(
            engine.redeem().redeem(&alice, &voucher.code, &voucher.pin),
            Err(LedgerError::CodeAlreadyUsed)
        );
        assert_eq!(engine.wallets().balance(wallet).unwrap(), Amount::from_minor(2_500));
    }

    #[test]
    fn redeem_logs_a_deposit() {
        let (engine, _) = engine();
        let wallet = funded(&engine, "alice", "VXE445", 0);
        engine
            .redeem()
            .import(&admin(), "1111 2222 3333 4444", "0420", Amount::from_minor(900), None)
            .unwrap();
        engine
            .redeem()
            .redeem(&AccountId::new("alice"), "1111-2222-3333-4444", "0420")
            .unwrap();

        let history = engine.wallets().history(wallet).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TxKind::Deposit);
        assert_eq!(history[0].to, Some(wallet));
        assert_eq!(history[0].status, TxStatus::Success);
    }

    #[test]
    fn check_order() {
        let (engine, harness) = engine();
        funded(&engine, "alice", "VXE445", 0);
        let alice = AccountId::new("alice");
        let expires = harness.clock.now() + Duration::hours(1);
        engine
            .redeem()
            .import(&admin(), "1111222233334444", "1234", Amount::from_minor(100), Some(expires))
            .unwrap();

        assert_eq!(
            engine.redeem().redeem(&alice, "9999-9999-9999-9999", "1234"),
            Err(LedgerError::CodeNotFound)
        );
        assert_eq!(
            engine.redeem().redeem(&alice, "not a code", "1234"),
            Err(LedgerError::CodeNotFound)
        );
        assert_eq!(
            engine.redeem().redeem(&alice, "1111222233334444", "0000"),
            Err(LedgerError::InvalidPin)
        );

        harness.clock.advance(Duration::hours(2));
        assert_eq!(
            engine.redeem().redeem(&alice, "1111222233334444", "1234"),
            Err(LedgerError::CodeExpired)
        );
        // wrong PIN is reported before expiry
        assert_eq!(
            engine.redeem().redeem(&alice, "1111222233334444", "0000"),
            Err(LedgerError::InvalidPin)
        );
    }

    #[test]
    fn failed_redeem_does_not_burn_the_code() {
        let (engine, _) = engine();
        let voucher = engine
            .redeem()
            .issue(&admin(), Amount::from_minor(100), None)
            .unwrap();
        // no wallet yet
        assert!(matches!(
            engine
                .redeem()
                .redeem(&AccountId::new("alice"), &voucher.code, &voucher.pin),
            Err(LedgerError::NoWallet(_))
        ));
        funded(&engine, "alice", "VXE445", 0);
        assert!(
            engine
                .redeem()
                .redeem(&AccountId::new("alice"), &voucher.code, &voucher.pin)
                .is_ok()
        );
    }

    #[test]
    fn issuing_requires_admin() {
        let (engine, _) = engine();
        assert_eq!(
            engine
                .redeem()
                .issue(&Role::new("finance"), Amount::from_minor(100), None)
                .map(|_| ()),
            Err(LedgerError::Unauthorized)
        );
        assert_eq!(
            engine
                .redeem()
                .issue(&admin(), Amount::ZERO, None)
                .map(|_| ()),
            Err(LedgerError::InvalidAmount)
        );
    }

    #[test]
    fn duplicate_import_is_rejected() {
        let (engine, _) = engine();
        let redeem = engine.redeem();
        redeem
            .import(&admin(), "1111222233334444", "1234", Amount::from_minor(1), None)
            .unwrap();
        assert!(matches!(
            redeem.import(&admin(), "1111-2222-3333-4444", "9999", Amount::from_minor(1), None),
            Err(LedgerError::InvalidRedeemCode(_))
        ));
    }

    #[test]
    fn deposit_fee_goes_to_platform() {
        let (engine, harness) = engine();
        let wallet = funded(&engine, "alice", "VXE445", 0);
        harness.settings.replace(FeeSettings {
            deposit: FeeRate::whole(2).unwrap(),
            ..FeeSettings::default()
        });
        let voucher = engine
            .redeem()
            .issue(&admin(), Amount::from_minor(10_000), None)
            .unwrap();
        let receipt = engine
            .redeem()
            .redeem(&AccountId::new("alice"), &voucher.code, &voucher.pin)
            .unwrap();

        assert_eq!(receipt.fee, Amount::from_minor(200));
        assert_eq!(engine.wallets().balance(wallet).unwrap(), Amount::from_minor(9_800));
        assert_eq!(
            engine.wallets().balance(engine.platform_wallet()).unwrap(),
            Amount::from_minor(200)
        );
    }
}
