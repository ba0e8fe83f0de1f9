//! Sqrt-price curve math
//!
//! Prices are Q64.64 square roots and liquidity is Q64 scaled, so
//! `amount_b = L * (upper - lower) >> 128` and
//! `amount_a = L * (upper - lower) / (lower * upper)`.
//! Amounts owed to the pool round up, amounts paid out round down.
use anchor_lang::prelude::*;
use ethnum::U256;

use crate::{
    constants::LIQUIDITY_SCALE,
    safe_math::{SafeCast, SafeMath},
    utils::{mul_div_u256, Rounding},
    PoolError,
};

/// Token a amount between two sqrt prices
pub fn get_delta_amount_a_unsigned(
    lower_sqrt_price: u128,
    upper_sqrt_price: u128,
    liquidity: u128,
    round: Rounding,
) -> Result<u64> {
    let result =
        get_delta_amount_a_unsigned_unchecked(lower_sqrt_price, upper_sqrt_price, liquidity, round)?;
    Ok(result.safe_cast()?)
}

pub fn get_delta_amount_a_unsigned_unchecked(
    lower_sqrt_price: u128,
    upper_sqrt_price: u128,
    liquidity: u128,
    round: Rounding,
) -> Result<U256> {
    let numerator_1 = U256::from(liquidity);
    let numerator_2 = U256::from(upper_sqrt_price.safe_sub(lower_sqrt_price)?);
    let denominator = U256::from(lower_sqrt_price).safe_mul(U256::from(upper_sqrt_price))?;
    let result =
        mul_div_u256(numerator_1, numerator_2, denominator, round).ok_or(PoolError::MathOverflow)?;
    Ok(result)
}

/// Token b amount between two sqrt prices
pub fn get_delta_amount_b_unsigned(
    lower_sqrt_price: u128,
    upper_sqrt_price: u128,
    liquidity: u128,
    round: Rounding,
) -> Result<u64> {
    let result =
        get_delta_amount_b_unsigned_unchecked(lower_sqrt_price, upper_sqrt_price, liquidity, round)?;
    Ok(result.safe_cast()?)
}

pub fn get_delta_amount_b_unsigned_unchecked(
    lower_sqrt_price: u128,
    upper_sqrt_price: u128,
    liquidity: u128,
    round: Rounding,
) -> Result<U256> {
    let delta_sqrt_price = U256::from(upper_sqrt_price.safe_sub(lower_sqrt_price)?);
    let prod = U256::from(liquidity).safe_mul(delta_sqrt_price)?;

    match round {
        Rounding::Up => {
            let denominator = U256::ONE.safe_shl(u32::from(LIQUIDITY_SCALE) * 2)?;
            Ok(prod
                .safe_add(denominator.safe_sub(U256::ONE)?)?
                .safe_shr(u32::from(LIQUIDITY_SCALE) * 2)?)
        }
        Rounding::Down => Ok(prod.safe_shr(u32::from(LIQUIDITY_SCALE) * 2)?),
    }
}

/// Sqrt price after `amount_in` enters the pool
pub fn get_next_sqrt_price_from_input(
    sqrt_price: u128,
    liquidity: u128,
    amount_in: u64,
    a_for_b: bool,
) -> Result<u128> {
    require!(sqrt_price > 0 && liquidity > 0, PoolError::InsufficientLiquidity);

    if a_for_b {
        get_next_sqrt_price_from_amount_a_rounding_up(sqrt_price, liquidity, amount_in)
    } else {
        get_next_sqrt_price_from_amount_b_rounding_down(sqrt_price, liquidity, amount_in)
    }
}

/// Sqrt price after `amount_out` leaves the pool
pub fn get_next_sqrt_price_from_output(
    sqrt_price: u128,
    liquidity: u128,
    amount_out: u64,
    a_for_b: bool,
) -> Result<u128> {
    require!(sqrt_price > 0 && liquidity > 0, PoolError::InsufficientLiquidity);

    if a_for_b {
        get_next_sqrt_price_from_output_amount_b_rounding_down(sqrt_price, liquidity, amount_out)
    } else {
        get_next_sqrt_price_from_output_amount_a_rounding_up(sqrt_price, liquidity, amount_out)
    }
}

//  sqrt_price' = L * sqrt_price / (L + amount * sqrt_price)
fn get_next_sqrt_price_from_amount_a_rounding_up(
    sqrt_price: u128,
    liquidity: u128,
    amount: u64,
) -> Result<u128> {
    if amount == 0 {
        return Ok(sqrt_price);
    }
    let sqrt_price = U256::from(sqrt_price);
    let liquidity = U256::from(liquidity);

    let product = U256::from(amount).safe_mul(sqrt_price)?;
    let denominator = liquidity.safe_add(product)?;
    let result =
        mul_div_u256(liquidity, sqrt_price, denominator, Rounding::Up).ok_or(PoolError::MathOverflow)?;
    Ok(result.safe_cast()?)
}

//  sqrt_price' = sqrt_price + (amount << 128) / L
fn get_next_sqrt_price_from_amount_b_rounding_down(
    sqrt_price: u128,
    liquidity: u128,
    amount: u64,
) -> Result<u128> {
    let quotient = U256::from(amount)
        .safe_shl(u32::from(LIQUIDITY_SCALE) * 2)?
        .safe_div(U256::from(liquidity))?;
    let result = U256::from(sqrt_price).safe_add(quotient)?;
    Ok(result.safe_cast()?)
}

//  sqrt_price' = sqrt_price - ceil((amount << 128) / L)
fn get_next_sqrt_price_from_output_amount_b_rounding_down(
    sqrt_price: u128,
    liquidity: u128,
    amount: u64,
) -> Result<u128> {
    let quotient = mul_div_u256(
        U256::from(amount),
        U256::ONE.safe_shl(u32::from(LIQUIDITY_SCALE) * 2)?,
        U256::from(liquidity),
        Rounding::Up,
    )
    .ok_or(PoolError::MathOverflow)?;
    let sqrt_price = U256::from(sqrt_price);
    require!(sqrt_price > quotient, PoolError::PriceRangeViolation);
    Ok(sqrt_price.safe_sub(quotient)?.safe_cast()?)
}

//  sqrt_price' = L * sqrt_price / (L - amount * sqrt_price)
fn get_next_sqrt_price_from_output_amount_a_rounding_up(
    sqrt_price: u128,
    liquidity: u128,
    amount: u64,
) -> Result<u128> {
    if amount == 0 {
        return Ok(sqrt_price);
    }
    let sqrt_price = U256::from(sqrt_price);
    let liquidity = U256::from(liquidity);

    let product = U256::from(amount).safe_mul(sqrt_price)?;
    require!(liquidity > product, PoolError::PriceRangeViolation);
    let denominator = liquidity.safe_sub(product)?;
    let result =
        mul_div_u256(liquidity, sqrt_price, denominator, Rounding::Up).ok_or(PoolError::MathOverflow)?;
    Ok(result.safe_cast()?)
}

/// Token amounts backing `liquidity` deposited at `sqrt_price` inside `[sqrt_min_price, sqrt_max_price]`
pub fn get_initialize_amounts(
    sqrt_min_price: u128,
    sqrt_max_price: u128,
    sqrt_price: u128,
    liquidity: u128,
) -> Result<(u64, u64)> {
    let amount_a = get_delta_amount_a_unsigned(sqrt_price, sqrt_max_price, liquidity, Rounding::Up)?;
    let amount_b = get_delta_amount_b_unsigned(sqrt_min_price, sqrt_price, liquidity, Rounding::Up)?;
    Ok((amount_a, amount_b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{MAX_SQRT_PRICE, MIN_SQRT_PRICE, ONE_Q64};
    use proptest::prelude::*;

    // sqrt(1) in Q64.64
    const SQRT_PRICE_ONE: u128 = ONE_Q64;
    // 1_000_000 units of liquidity, Q64 scaled
    const LIQUIDITY: u128 = 1_000_000u128 << 64;

    #[test]
    fn test_delta_amounts_at_unit_price() {
        let upper = SQRT_PRICE_ONE * 2;
        let b_up = get_delta_amount_b_unsigned(SQRT_PRICE_ONE, upper, LIQUIDITY, Rounding::Up).unwrap();
        let b_down =
            get_delta_amount_b_unsigned(SQRT_PRICE_ONE, upper, LIQUIDITY, Rounding::Down).unwrap();
        assert_eq!(b_down, 1_000_000);
        assert_eq!(b_up, 1_000_000);

        // L * (1/1 - 1/2) = 500_000
        let a = get_delta_amount_a_unsigned(SQRT_PRICE_ONE, upper, LIQUIDITY, Rounding::Down).unwrap();
        assert_eq!(a, 500_000);
    }

    #[test]
    fn test_rounding_direction() {
        let lower = SQRT_PRICE_ONE;
        let upper = SQRT_PRICE_ONE + 3;
        let liquidity = 7u128 << 64;
        let up = get_delta_amount_b_unsigned(lower, upper, liquidity, Rounding::Up).unwrap();
        let down = get_delta_amount_b_unsigned(lower, upper, liquidity, Rounding::Down).unwrap();
        assert_eq!(down, 0);
        assert_eq!(up, 1);
    }

    #[test]
    fn test_next_sqrt_price_moves_in_trade_direction() {
        let down = get_next_sqrt_price_from_input(SQRT_PRICE_ONE, LIQUIDITY, 1_000, true).unwrap();
        assert!(down < SQRT_PRICE_ONE);
        let up = get_next_sqrt_price_from_input(SQRT_PRICE_ONE, LIQUIDITY, 1_000, false).unwrap();
        assert!(up > SQRT_PRICE_ONE);

        let out_b = get_next_sqrt_price_from_output(SQRT_PRICE_ONE, LIQUIDITY, 1_000, true).unwrap();
        assert!(out_b < SQRT_PRICE_ONE);
        let out_a = get_next_sqrt_price_from_output(SQRT_PRICE_ONE, LIQUIDITY, 1_000, false).unwrap();
        assert!(out_a > SQRT_PRICE_ONE);
    }

    #[test]
    fn test_output_larger_than_reserve_fails() {
        // removing more token a than the curve holds
        assert!(get_next_sqrt_price_from_output(SQRT_PRICE_ONE, LIQUIDITY, 2_000_000, false).is_err());
        assert!(get_next_sqrt_price_from_input(SQRT_PRICE_ONE, 0, 1, true).is_err());
    }

    #[test]
    fn test_initialize_amounts() {
        let (a, b) = get_initialize_amounts(MIN_SQRT_PRICE, MAX_SQRT_PRICE, SQRT_PRICE_ONE, LIQUIDITY)
            .unwrap();
        // full range at price 1 needs roughly L of each side
        assert!(a > 999_000 && a <= 1_000_001);
        assert!(b > 999_000 && b <= 1_000_001);
    }

    proptest! {
        #[test]
        fn swap_in_never_pays_more_than_received(
            amount_in in 1u64..1_000_000_000,
            liquidity in (1u128 << 64)..(1u128 << 100),
            a_for_b in any::<bool>(),
        ) {
            let next = get_next_sqrt_price_from_input(SQRT_PRICE_ONE, liquidity, amount_in, a_for_b).unwrap();
            if a_for_b {
                // the a amount implied by the move never exceeds what was paid in
                let implied_in = get_delta_amount_a_unsigned(next, SQRT_PRICE_ONE, liquidity, Rounding::Down).unwrap();
                prop_assert!(implied_in <= amount_in);
            } else {
                let implied_in = get_delta_amount_b_unsigned(SQRT_PRICE_ONE, next, liquidity, Rounding::Down).unwrap();
                prop_assert!(implied_in <= amount_in);
            }
        }

        #[test]
        fn exact_out_price_covers_requested_output(
            amount_out in 1u64..1_000_000,
            liquidity in (1u128 << 84)..(1u128 << 100),
            a_for_b in any::<bool>(),
        ) {
            let next = get_next_sqrt_price_from_output(SQRT_PRICE_ONE, liquidity, amount_out, a_for_b).unwrap();
            let produced = if a_for_b {
                get_delta_amount_b_unsigned(next, SQRT_PRICE_ONE, liquidity, Rounding::Down).unwrap()
            } else {
                get_delta_amount_a_unsigned(SQRT_PRICE_ONE, next, liquidity, Rounding::Down).unwrap()
            };
            prop_assert!(produced >= amount_out);
        }
    }
}
