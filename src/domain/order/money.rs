//! Conversion between decimal amounts and PSP minor units.
//!
//! The PSP expects integer cents (`AMOUNT=123` for 1.23). Amounts that fall
//! between two cents are rounded half-to-even, so `0.005` becomes `0` and
//! `0.015` becomes `2`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::foundation::ValidationError;

/// Number of decimal places carried by minor units.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Converts a decimal amount into integer minor units.
///
/// # Errors
///
/// Returns `ValidationError` for negative amounts or amounts too large for `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationError::negative("amount", amount));
    }
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|cents| cents.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven))
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| ValidationError::invalid_format("amount", "amount out of range"))
}

/// Converts integer minor units back into a decimal with two places.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, MINOR_UNIT_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn whole_cents_are_exact() {
        assert_eq!(to_minor_units(dec("1.23")), Ok(123));
        assert_eq!(to_minor_units(dec("100")), Ok(10000));
        assert_eq!(to_minor_units(dec("0")), Ok(0));
    }

    #[test]
    fn half_cents_round_to_even() {
        assert_eq!(to_minor_units(dec("0.005")), Ok(0));
        assert_eq!(to_minor_units(dec("0.015")), Ok(2));
        assert_eq!(to_minor_units(dec("0.025")), Ok(2));
        assert_eq!(to_minor_units(dec("10.995")), Ok(1100));
    }

    #[test]
    fn sub_half_cents_round_to_nearest() {
        assert_eq!(to_minor_units(dec("1.2349")), Ok(123));
        assert_eq!(to_minor_units(dec("1.2351")), Ok(124));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(to_minor_units(dec("-0.01")).is_err());
    }

    #[test]
    fn minor_units_convert_back_with_two_places() {
        assert_eq!(from_minor_units(123), dec("1.23"));
        assert_eq!(from_minor_units(123).to_string(), "1.23");
        assert_eq!(from_minor_units(5).to_string(), "0.05");
    }
}
