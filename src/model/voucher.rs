use chrono::{DateTime, Utc};
use rand::Rng;

use super::AccountId;
use crate::{Amount, LedgerError};

const GROUPS: usize = 4;
const GROUP_LEN: usize = 4;
const PIN_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemState {
    Unused,
    Used {
        by: AccountId,
        at: DateTime<Utc>,
    },
}

/// Single-use deposit voucher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemCode {
    pub code: String,
    pub pin: String,
    pub amount: Amount,
    pub state: RedeemState,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RedeemCode {
    pub fn is_used(&self) -> bool {
        matches!(self.state, RedeemState::Used { .. })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }

    pub fn generate(rng: &mut impl Rng) -> (String, String) {
        let digits: String = (0..GROUPS * GROUP_LEN)
            .map(|_| char::from(b'0' + rng.gen_range(0..=9u8)))
            .collect();
        let pin: String = (0..PIN_LEN)
            .map(|_| char::from(b'0' + rng.gen_range(0..=9u8)))
            .collect();
        (format_groups(&digits), pin)
    }
}

/// Canonical `1234-5678-9012-3456` form of user input. Spaces and dashes are
/// ignored; anything that is not sixteen digits is rejected.
pub fn normalize_code(input: &str) -> Result<String, LedgerError> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if digits.len() != GROUPS * GROUP_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LedgerError::InvalidRedeemCode(input.trim().to_string()));
    }
    Ok(format_groups(&digits))
}

pub fn validate_pin(pin: &str) -> Result<(), LedgerError> {
    if pin.len() == PIN_LEN && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(LedgerError::InvalidRedeemCode(pin.to_string()))
    }
}

fn format_groups(digits: &str) -> String {
    digits
        .as_bytes()
        .chunks(GROUP_LEN)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}
