//! Fee calculation.
//!
//! One function per fee-bearing operation, each reading its rate from the
//! settings snapshot handed in by the caller. Fees are rounded half away from
//! zero to whole minor units and never exceed the base amount.

use rust_decimal::prelude::*;

use crate::Amount;
use crate::settings::{FeeRate, FeeSettings};

/// `amount * rate%`, in minor units.
pub fn calculate_fee(amount: Amount, rate: FeeRate) -> Amount {
    let fee = (Decimal::from(amount.minor()) * rate.as_percent() / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .unwrap_or(u64::MAX);
    Amount::from_minor(fee.min(amount.minor()))
}

/// P2P send: taken out of the sent amount.
pub fn transfer_fee(amount: Amount, settings: &FeeSettings) -> Amount {
    calculate_fee(amount, settings.p2p)
}

/// Cash payout: taken out of the escrowed amount.
pub fn withdrawal_fee(amount: Amount, settings: &FeeSettings) -> Amount {
    calculate_fee(amount, settings.withdrawal)
}

/// Invoice payment: charged to the payer on top of the face value.
pub fn invoice_fee(amount: Amount, settings: &FeeSettings) -> Amount {
    calculate_fee(amount, settings.invoice)
}

/// Redeem-code deposit: taken out of the voucher value.
pub fn deposit_fee(amount: Amount, settings: &FeeSettings) -> Amount {
    calculate_fee(amount, settings.deposit)
}
