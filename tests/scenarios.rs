use std::sync::Arc;
use std::thread;

use chrono::{Duration, TimeZone, Utc};
use wallet_engine::clock::ManualClock;
use wallet_engine::collab::{InMemoryKyc, StaticRoles};
use wallet_engine::model::{
    AccountId, Role, TxKind, TxStatus, WalletCode, WalletStatus, WithdrawalState,
};
use wallet_engine::settings::SharedSettings;
use wallet_engine::store::{MemoryStore, Store};
use wallet_engine::{Amount, Collaborators, Engine, LedgerError};

struct Fixture {
    engine: Engine<MemoryStore>,
    clock: Arc<ManualClock>,
}

fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
    ));
    let collab = Collaborators {
        settings: Arc::new(SharedSettings::default()),
        authorizer: Arc::new(StaticRoles::default()),
        kyc: Arc::new(InMemoryKyc::new()),
        clock: clock.clone(),
    };
    let engine = Engine::new(
        Arc::new(MemoryStore::new()),
        collab,
        WalletCode::parse("SYS000").unwrap(),
        AccountId::new("platform"),
    )
    .unwrap();
    Fixture { engine, clock }
}

fn open(engine: &Engine<MemoryStore>, account: &str, code: &str, minor: u64) -> WalletCode {
    let code = engine
        .wallets()
        .open_wallet_with_code(&AccountId::new(account), WalletCode::parse(code).unwrap())
        .unwrap();
    if minor > 0 {
        engine.wallets().credit(code, Amount::from_minor(minor)).unwrap();
    }
    code
}

fn balance(engine: &Engine<MemoryStore>, code: WalletCode) -> Amount {
    engine.wallets().balance(code).unwrap()
}

fn total_value(engine: &Engine<MemoryStore>) -> Amount {
    engine.store().read(|t| t.total_value()).unwrap()
}

#[test]
fn transfer_forty_at_five_percent() {
    let Fixture { engine, .. } = fixture();
    let sender = open(&engine, "alice", "VXE445", 10_000);
    let recipient = open(&engine, "bob", "HUY444", 0);
    let before = total_value(&engine);

    let receipt = engine
        .transfers()
        .send(&AccountId::new("alice"), "HUY444", Amount::parse("40.00").unwrap(), None)
        .unwrap();

    assert_eq!(balance(&engine, sender), Amount::from_minor(6_000));
    assert_eq!(balance(&engine, recipient), Amount::from_minor(3_800));
    assert_eq!(balance(&engine, engine.platform_wallet()), Amount::from_minor(200));
    assert_eq!(receipt.fee + receipt.credited, receipt.amount);
    assert_eq!(total_value(&engine), before);
}

#[test]
fn withdrawal_processed_by_finance() {
    let Fixture { engine, .. } = fixture();
    let wallet = open(&engine, "alice", "VXE445", 10_000);

    let record = engine
        .withdrawals()
        .request(&AccountId::new("alice"), Amount::parse("100").unwrap())
        .unwrap();
    assert_eq!(balance(&engine, wallet), Amount::ZERO);
    assert_eq!(record.amount, Amount::from_minor(10_000));

    let finance = Role::new("finance");
    let review = engine.finance().review(&finance, &record.reference).unwrap();
    assert_eq!(review.payout, Amount::from_minor(9_500));

    let receipt = engine
        .finance()
        .confirm(&finance, &AccountId::new("cashier"), &record.reference)
        .unwrap();
    assert_eq!(receipt.payout, Amount::from_minor(9_500));
    assert_eq!(receipt.fee, Amount::from_minor(500));
    assert_eq!(receipt.payout + receipt.fee, record.amount);

    let stored = engine
        .store()
        .read(|t| t.withdrawal(&record.reference).cloned())
        .unwrap()
        .unwrap();
    assert_eq!(stored.state.as_str(), "processed");

    let payout = engine
        .store()
        .read(|t| {
            t.transactions_by_reference(&record.reference)
                .into_iter()
                .find(|tx| tx.kind == TxKind::CashPayout)
                .cloned()
        })
        .unwrap()
        .unwrap();
    assert_eq!(payout.amount, Amount::from_minor(9_500));
    assert_eq!(payout.status, TxStatus::Success);
}

#[test]
fn untouched_withdrawal_expires_after_a_day() {
    let Fixture { engine, clock } = fixture();
    let wallet = open(&engine, "alice", "VXE445", 10_000);
    let record = engine
        .withdrawals()
        .request(&AccountId::new("alice"), Amount::from_minor(10_000))
        .unwrap();

    clock.advance(Duration::hours(24) + Duration::minutes(1));
    assert_eq!(engine.withdrawals().expire_due().unwrap(), 1);

    assert_eq!(balance(&engine, wallet), Amount::from_minor(10_000));
    let stored = engine
        .store()
        .read(|t| t.withdrawal(&record.reference).cloned())
        .unwrap()
        .unwrap();
    assert!(matches!(stored.state, WithdrawalState::Expired { .. }));
    assert_eq!(engine.store().read(|t| t.fee_total(None)).unwrap(), Amount::ZERO);

    assert_eq!(
        engine
            .finance()
            .confirm(&Role::new("finance"), &AccountId::new("cashier"), &record.reference),
        Err(LedgerError::WithdrawalExpired(record.reference.clone()))
    );
}

#[test]
fn invoice_fifty_at_five_percent() {
    let Fixture { engine, .. } = fixture();
    let issuer = open(&engine, "shop", "SHP100", 0);
    let payer = open(&engine, "buyer", "BUY200", 10_000);

    let invoice = engine
        .invoices()
        .create(
            &AccountId::new("shop"),
            "BUY200",
            Amount::from_minor(5_000),
            "concert tickets",
            None,
        )
        .unwrap();
    engine
        .invoices()
        .pay(&invoice.reference, &AccountId::new("buyer"))
        .unwrap();

    assert_eq!(balance(&engine, payer), Amount::from_minor(4_750));
    assert_eq!(balance(&engine, issuer), Amount::from_minor(5_000));
    assert_eq!(balance(&engine, engine.platform_wallet()), Amount::from_minor(250));
    assert!(engine.invoices().get(&invoice.reference).unwrap().is_paid());
}

#[test]
fn redeeming_twice_changes_balance_once() {
    let Fixture { engine, .. } = fixture();
    let wallet = open(&engine, "alice", "VXE445", 0);
    let voucher = engine
        .redeem()
        .issue(&Role::new("admin"), Amount::from_minor(2_000), None)
        .unwrap();
    let alice = AccountId::new("alice");

    engine.redeem().redeem(&alice, &voucher.code, &voucher.pin).unwrap();
    assert_eq!(
        engine.redeem().redeem(&alice, &voucher.code, &voucher.pin),
        Err(LedgerError::CodeAlreadyUsed)
    );
    assert_eq!(balance(&engine, wallet), Amount::from_minor(2_000));
}

#[test]
fn over_debit_never_changes_balance() {
    let Fixture { engine, .. } = fixture();
    let wallet = open(&engine, "alice", "VXE445", 999);
    open(&engine, "bob", "HUY444", 0);
    let alice = AccountId::new("alice");

    for minor in [1_000, 5_000, u64::MAX / 2] {
        let amount = Amount::from_minor(minor);
        assert!(matches!(
            engine.transfers().send(&alice, "HUY444", amount, None),
            Err(LedgerError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            engine.withdrawals().request(&alice, amount),
            Err(LedgerError::InsufficientFunds { .. })
        ));
        assert_eq!(balance(&engine, wallet), Amount::from_minor(999));
    }
}

#[test]
fn inactive_wallets_cannot_move_money() {
    let Fixture { engine, .. } = fixture();
    let admin = Role::new("admin");
    let alice = AccountId::new("alice");
    let wallet = open(&engine, "alice", "VXE445", 10_000);
    let shop = open(&engine, "shop", "SHP100", 0);
    let voucher = engine
        .redeem()
        .issue(&admin, Amount::from_minor(2_000), None)
        .unwrap();
    let invoice = engine
        .invoices()
        .create(&AccountId::new("shop"), "VXE445", Amount::from_minor(1_000), "rent", None)
        .unwrap();

    engine
        .wallets()
        .set_status(&admin, wallet, WalletStatus::Suspended)
        .unwrap();
    let suspended = Err(LedgerError::WalletNotActive(wallet, WalletStatus::Suspended));

    assert_eq!(
        engine.withdrawals().request(&alice, Amount::from_minor(1_000)).map(|_| ()),
        suspended
    );
    assert_eq!(
        engine.redeem().redeem(&alice, &voucher.code, &voucher.pin).map(|_| ()),
        suspended
    );
    assert_eq!(
        engine.invoices().pay(&invoice.reference, &alice).map(|_| ()),
        suspended
    );
    assert_eq!(
        engine
            .invoices()
            .create(&AccountId::new("shop"), "VXE445", Amount::from_minor(1_000), "rent", None)
            .map(|_| ()),
        suspended
    );
    assert_eq!(balance(&engine, wallet), Amount::from_minor(10_000));
    assert_eq!(balance(&engine, shop), Amount::ZERO);
    assert!(!engine.invoices().get(&invoice.reference).unwrap().is_paid());

    // the voucher survived the rejected attempt
    engine
        .wallets()
        .set_status(&admin, wallet, WalletStatus::Active)
        .unwrap();
    engine.redeem().redeem(&alice, &voucher.code, &voucher.pin).unwrap();
    assert_eq!(balance(&engine, wallet), Amount::from_minor(12_000));

    engine
        .wallets()
        .set_status(&admin, shop, WalletStatus::Terminated)
        .unwrap();
    assert_eq!(
        engine.invoices().pay(&invoice.reference, &alice).map(|_| ()),
        Err(LedgerError::WalletNotActive(shop, WalletStatus::Terminated))
    );
    assert_eq!(balance(&engine, wallet), Amount::from_minor(12_000));
}

#[test]
fn concurrent_process_has_one_winner() {
    let Fixture { engine, .. } = fixture();
    open(&engine, "alice", "VXE445", 10_000);
    let record = engine
        .withdrawals()
        .request(&AccountId::new("alice"), Amount::from_minor(10_000))
        .unwrap();
    let finance = Role::new("finance");

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = &engine;
                let finance = &finance;
                let reference = &record.reference;
                s.spawn(move || {
                    let staff = AccountId::new(format!("cashier-{i}"));
                    engine.finance().confirm(finance, &staff, reference)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_eq!(
            result,
            &Err(LedgerError::WithdrawalAlreadyProcessed(record.reference.clone()))
        );
    }
    assert_eq!(balance(&engine, engine.platform_wallet()), Amount::from_minor(500));
}

#[test]
fn concurrent_redeem_has_one_winner() {
    let Fixture { engine, .. } = fixture();
    let wallets: Vec<_> = (0..8)
        .map(|i| open(&engine, &format!("user-{i}"), &format!("USR00{i}"), 0))
        .collect();
    let voucher = engine
        .redeem()
        .issue(&Role::new("admin"), Amount::from_minor(5_000), None)
        .unwrap();

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = &engine;
                let voucher = &voucher;
                s.spawn(move || {
                    engine.redeem().redeem(
                        &AccountId::new(format!("user-{i}")),
                        &voucher.code,
                        &voucher.pin,
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == LedgerError::CodeAlreadyUsed)
    );
    let credited: Amount = wallets.iter().map(|w| balance(&engine, *w)).sum();
    assert_eq!(credited, Amount::from_minor(5_000));
}

#[test]
fn concurrent_transfers_conserve_value() {
    let Fixture { engine, .. } = fixture();
    let codes = ["AAA001", "BBB002", "CCC003", "DDD004"];
    for (i, code) in codes.iter().enumerate() {
        open(&engine, &format!("user-{i}"), code, 10_000);
    }
    let before = total_value(&engine);

    thread::scope(|s| {
        for i in 0..codes.len() {
            let engine = &engine;
            let codes = &codes;
            s.spawn(move || {
                let sender = AccountId::new(format!("user-{i}"));
                let recipient = codes[(i + 1) % codes.len()];
                for _ in 0..50 {
                    // some of these run dry; that is fine
                    let _ = engine
                        .transfers()
                        .send(&sender, recipient, Amount::from_minor(333), None);
                }
            });
        }
    });

    assert_eq!(total_value(&engine), before);
    let fees = engine.store().read(|t| t.fee_total(None)).unwrap();
    assert_eq!(balance(&engine, engine.platform_wallet()), fees);
}
