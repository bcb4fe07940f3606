//! Token amount conversions between human-readable and base-unit form.
//!
//! The aggregator API accepts base-unit integer strings while operators and
//! config files deal in human-readable amounts. Conversions here truncate
//! toward zero so a profitability estimate never rounds an amount up.

use alloy::primitives::U256;
use thiserror::Error;

/// Errors raised while parsing a human-readable token amount.
#[derive(Debug, Error)]
pub enum AmountError {
    #[error("empty amount string")]
    Empty,

    #[error("invalid amount '{0}': not a decimal number")]
    Invalid(String),

    #[error("amount '{0}' overflows U256 at {1} decimals")]
    Overflow(String, u8),
}

/// 10^exp as a U256.
#[inline]
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Parse a human-readable decimal amount into base units.
///
/// Fractional digits beyond `decimals` are truncated toward zero, never
/// rounded up. `"1000"` at 18 decimals parses to `1000 * 10^18`.
pub fn parse_units(human: &str, decimals: u8) -> Result<U256, AmountError> {
    let trimmed = human.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole_str, frac_str) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if whole_str.is_empty() && frac_str.is_empty() {
        return Err(AmountError::Invalid(human.to_string()));
    }
    if !whole_str.chars().all(|c| c.is_ascii_digit())
        || !frac_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(AmountError::Invalid(human.to_string()));
    }

    let whole = if whole_str.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole_str, 10)
            .map_err(|_| AmountError::Invalid(human.to_string()))?
    };

    // Truncate excess fractional digits toward zero.
    let frac_digits = frac_str.len().min(decimals as usize);
    let frac = if frac_digits == 0 {
        U256::ZERO
    } else {
        let truncated = &frac_str[..frac_digits];
        let parsed = U256::from_str_radix(truncated, 10)
            .map_err(|_| AmountError::Invalid(human.to_string()))?;
        parsed * pow10(decimals - frac_digits as u8)
    };

    whole
        .checked_mul(pow10(decimals))
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| AmountError::Overflow(human.to_string(), decimals))
}

/// Format a base-unit amount as a human-readable decimal string.
///
/// Trailing zeros in the fractional part are trimmed; a whole number
/// renders without a decimal point.
pub fn format_units(amount: U256, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }

    let divisor = pow10(decimals);
    let whole = amount / divisor;
    let frac = amount % divisor;

    if frac.is_zero() {
        return whole.to_string();
    }

    let frac_str = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    let trimmed = frac_str.trim_end_matches('0');
    if trimmed.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_amount() {
        // 1000 at 18 decimals
        let parsed = parse_units("1000", 18).unwrap();
        assert_eq!(parsed, U256::from(1000u64) * pow10(18));
    }

    #[test]
    fn test_parse_fractional_amount() {
        // 1.5 USDC (6 decimals)
        let parsed = parse_units("1.5", 6).unwrap();
        assert_eq!(parsed, U256::from(1_500_000u64));

        // 0.5 ETH
        let parsed = parse_units("0.5", 18).unwrap();
        assert_eq!(parsed, U256::from(500_000_000_000_000_000u128));

        // Leading-dot form
        let parsed = parse_units(".5", 6).unwrap();
        assert_eq!(parsed, U256::from(500_000u64));
    }

    #[test]
    fn test_parse_truncates_toward_zero() {
        // 7 fractional digits at 6 decimals: last digit dropped, not rounded
        let parsed = parse_units("1.9999999", 6).unwrap();
        assert_eq!(parsed, U256::from(1_999_999u64));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_units("", 18).is_err());
        assert!(parse_units(".", 18).is_err());
        assert!(parse_units("12a", 18).is_err());
        assert!(parse_units("-5", 18).is_err());
        assert!(parse_units("1.2.3", 18).is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(
            format_units(U256::from(1_000_000_000_000_000_000u128), 18),
            "1"
        );
        assert_eq!(format_units(U256::from(1234u64), 0), "1234");
        assert_eq!(format_units(U256::ZERO, 18), "0");
    }

    #[test]
    fn test_round_trip_exact_for_integers() {
        // "1000" at 18 decimals -> base units -> back to "1000"
        for decimals in [0u8, 6, 8, 18] {
            let base = parse_units("1000", decimals).unwrap();
            assert_eq!(format_units(base, decimals), "1000");
        }
    }
}
