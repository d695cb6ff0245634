//! Conversion between display amounts and the ledger's smallest unit

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{ClientError, Result};

pub use solana_sdk::native_token::LAMPORTS_PER_SOL;

/// Fractional digits of the native unit
pub const NATIVE_DECIMALS: u32 = 9;

/// Parse a decimal amount such as `"0.01"` into base units
pub fn to_base_units(amount: &str) -> Result<u64> {
    let value = Decimal::from_str(amount.trim()).map_err(|e| ClientError::InvalidAmount {
        input: amount.to_string(),
        reason: e.to_string(),
    })?;
    decimal_to_base_units(value).map_err(|err| match err {
        ClientError::InvalidAmount { reason, .. } => ClientError::InvalidAmount {
            input: amount.to_string(),
            reason,
        },
        other => other,
    })
}

/// Scale a decimal amount into base units, rejecting anything that cannot be
/// represented exactly
pub fn decimal_to_base_units(value: Decimal) -> Result<u64> {
    let invalid = |reason: &str| ClientError::InvalidAmount {
        input: value.to_string(),
        reason: reason.to_string(),
    };

    if value.is_sign_negative() && !value.is_zero() {
        return Err(invalid("amount must not be negative"));
    }

    let scaled = value
        .checked_mul(Decimal::from(LAMPORTS_PER_SOL))
        .ok_or_else(|| invalid("amount overflows"))?;

    if !scaled.fract().is_zero() {
        return Err(invalid("more than 9 fractional digits"));
    }

    scaled.to_u64().ok_or_else(|| invalid("amount overflows u64"))
}

/// Base units back to a display amount
pub fn from_base_units(base_units: u64) -> Decimal {
    Decimal::from_i128_with_scale(base_units as i128, NATIVE_DECIMALS).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hundredth_is_exact() {
        assert_eq!(to_base_units("0.01").unwrap(), 10_000_000);
        assert_eq!(to_base_units("0.01").unwrap(), LAMPORTS_PER_SOL / 100);
    }

    #[test]
    fn test_whole_and_smallest_units() {
        assert_eq!(to_base_units("1").unwrap(), LAMPORTS_PER_SOL);
        assert_eq!(to_base_units("0.000000001").unwrap(), 1);
        assert_eq!(to_base_units("0").unwrap(), 0);
        assert_eq!(to_base_units(" 2.5 ").unwrap(), 2_500_000_000);
    }

    #[test]
    fn test_excess_precision_rejected() {
        let err = to_base_units("0.0000000001").unwrap_err();
        match err {
            ClientError::InvalidAmount { input, reason } => {
                assert_eq!(input, "0.0000000001");
                assert!(reason.contains("fractional"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_negative_and_garbage_rejected() {
        assert!(to_base_units("-0.5").is_err());
        assert!(to_base_units("abc").is_err());
        assert!(to_base_units("").is_err());
    }

    #[test]
    fn test_overflow_rejected() {
        // u64::MAX lamports is about 18.4 billion
        assert!(to_base_units("18446744073.709551615").is_ok());
        assert!(to_base_units("18446744073.709551616").is_err());
    }

    #[test]
    fn test_from_base_units() {
        assert_eq!(from_base_units(10_000_000).to_string(), "0.01");
        assert_eq!(from_base_units(LAMPORTS_PER_SOL).to_string(), "1");
    }
}
