//! Fixed-point arithmetic for liquidation sizing.
//!
//! Health factors arrive in WAD (1e18) form, protocol percentages in basis
//! points. All sizing stays in native U256 until the final USD conversion
//! for reporting and thresholds.

use alloy::primitives::U256;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10000 = 100%).
pub const BPS_DENOMINATOR: U256 = U256::from_limbs([10_000u64, 0, 0, 0]);

/// 10^exp as a U256.
#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Reduce a value by basis points: `value * (10000 - bps) / 10000`.
///
/// Used to floor swap outputs by the slippage tolerance.
#[inline(always)]
pub fn apply_basis_points(value: U256, basis_points: u32) -> U256 {
    let factor = U256::from(10_000u32.saturating_sub(basis_points));
    (value * factor) / BPS_DENOMINATOR
}

/// Take a basis-point fraction of a value: `value * bps / 10000`.
///
/// Used for close-factor sizing (5000 bps = half the debt).
#[inline(always)]
pub fn apply_fraction(value: U256, basis_points: u32) -> U256 {
    (value * U256::from(basis_points)) / BPS_DENOMINATOR
}

/// Convert a WAD value to f64. Display and thresholds only, never sizing.
#[inline(always)]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad <= U256::from(u128::MAX) {
        let value: u128 = wad.to();
        value as f64 / 1e18
    } else {
        let limbs = wad.as_limbs();
        let high = limbs[1] as f64 * (u64::MAX as f64 + 1.0);
        let low = limbs[0] as f64;
        (high + low) / 1e18
    }
}

/// Convert an f64 to WAD. Used for configured thresholds.
#[inline(always)]
pub fn f64_to_wad(value: f64) -> U256 {
    if value <= 0.0 {
        return U256::ZERO;
    }
    U256::from((value * 1e18) as u128)
}

/// Collateral base units received for covering `debt_to_cover` debt units,
/// at oracle prices and the reserve's liquidation bonus.
///
/// `amount_c = amount_d * price_d * bonus * 10^dec_c / (10000 * price_c * 10^dec_d)`
pub fn collateral_for_debt(
    debt_to_cover: U256,
    debt_price: U256,
    debt_decimals: u8,
    collateral_price: U256,
    collateral_decimals: u8,
    liquidation_bonus_bps: u32,
) -> U256 {
    if collateral_price.is_zero() {
        return U256::ZERO;
    }
    let numerator =
        debt_to_cover * debt_price * U256::from(liquidation_bonus_bps) * pow10(collateral_decimals);
    let denominator = BPS_DENOMINATOR * collateral_price * pow10(debt_decimals);
    numerator / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_basis_points() {
        let value = U256::from(1000u64);
        assert_eq!(apply_basis_points(value, 100), U256::from(990u64));
        assert_eq!(apply_basis_points(value, 1000), U256::from(900u64));
        assert_eq!(apply_basis_points(value, 0), U256::from(1000u64));
    }

    #[test]
    fn test_apply_fraction() {
        let value = U256::from(1000u64);
        // 50% close factor
        assert_eq!(apply_fraction(value, 5000), U256::from(500u64));
        assert_eq!(apply_fraction(value, 10_000), value);
    }

    #[test]
    fn test_wad_round_trip() {
        let wad = f64_to_wad(0.95);
        assert!((wad_to_f64(wad) - 0.95).abs() < 1e-9);
        assert_eq!(f64_to_wad(-1.0), U256::ZERO);
    }

    #[test]
    fn test_collateral_for_debt() {
        // Cover 75 debt tokens at $1 against collateral at $2 with a 5%
        // bonus: 75 * 1.05 / 2 = 39.375 collateral tokens.
        let amount = collateral_for_debt(
            U256::from(75u64) * pow10(18),
            U256::from(100_000_000u64),     // $1.00
            18,
            U256::from(200_000_000u64),     // $2.00
            18,
            10_500,
        );
        assert_eq!(amount, U256::from(39_375u64) * pow10(15));
    }

    #[test]
    fn test_collateral_for_debt_cross_decimals() {
        // Cover 100 USDC (6 decimals, $1) against WETH (18 decimals, $2000),
        // 5% bonus: 100 * 1.05 / 2000 = 0.0525 WETH.
        let amount = collateral_for_debt(
            U256::from(100_000_000u64),      // 100 USDC
            U256::from(100_000_000u64),      // $1.00
            6,
            U256::from(200_000_000_000u64),  // $2000.00
            18,
            10_500,
        );
        assert_eq!(amount, U256::from(52_500u64) * pow10(12));
    }
}
