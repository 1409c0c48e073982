//! Money primitives.
//!
//! Amounts are `i64` minor units (cents). Balances never go negative; every
//! operation validates before mutating, so arithmetic here stays plain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// ISO-style currency code: 3..=5 ASCII uppercase alphanumerics.
///
/// Value object — compared by value, immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl Into<String>) -> Result<Self, LedgerError> {
        let code = code.into();
        let valid = (3..=5).contains(&code.len())
            && code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !valid {
            return Err(LedgerError::internal(format!("invalid currency code: {code:?}")));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Reject zero and negative amounts up front.
pub fn ensure_positive(amount: i64) -> Result<i64, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(amount)
}

/// Add `amount` to `balance`, rejecting `i64` overflow before any mutation.
pub fn checked_balance_add(balance: i64, amount: i64) -> Result<i64, LedgerError> {
    balance
        .checked_add(amount)
        .ok_or(LedgerError::BalanceOverflow { balance, amount })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_codes() {
        for code in ["USD", "EUR", "GBP", "USDT", "VUSD1"] {
            assert!(Currency::new(code).is_ok(), "{code} should be valid");
        }
    }

    #[test]
    fn rejects_lowercase_and_short_codes() {
        for code in ["usd", "US", "", "DOLLARS", "U$D"] {
            assert!(Currency::new(code).is_err(), "{code} should be invalid");
        }
    }

    #[test]
    fn zero_and_negative_amounts_are_invalid() {
        assert_eq!(ensure_positive(0), Err(LedgerError::InvalidAmount(0)));
        assert_eq!(ensure_positive(-5), Err(LedgerError::InvalidAmount(-5)));
        assert_eq!(ensure_positive(1), Ok(1));
    }

    #[test]
    fn balance_addition_rejects_overflow() {
        assert_eq!(checked_balance_add(100, 50), Ok(150));
        assert_eq!(
            checked_balance_add(i64::MAX - 10, 11),
            Err(LedgerError::BalanceOverflow {
                balance: i64::MAX - 10,
                amount: 11,
            })
        );
    }
}
