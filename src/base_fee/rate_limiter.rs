use anchor_lang::prelude::*;

use super::{
    validate_fee_numerator_range, write_borsh, BaseFeeContext, BaseFeeHandler, BaseFeeParameters,
};
use crate::{
    constants::fee::{FEE_DENOMINATOR, MAX_BASIS_POINT, MAX_FEE_BPS, MAX_FEE_NUMERATOR},
    safe_math::{SafeCast, SafeMath},
    state::{ActivationType, CollectFeeMode, TradeDirection},
    utils::ceil_div,
    PoolError,
};

/// Size based fee, borsh layout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct FeeRateLimiterParameters {
    pub cliff_fee_numerator: u64,
    pub fee_increment_bps: u16,
    pub max_limiter_duration: u32,
    pub max_fee_bps: u32,
    pub reference_amount: u64,
    // offset 26
    pub base_fee_mode: u8,
    pub padding: [u8; 3],
}

/// Size based fee, stored layout
///
/// Within `[activation_point, activation_point + max_limiter_duration]` a B to A
/// trade pays `cliff_fee_numerator` on its first `reference_amount`, and every
/// further `reference_amount` sized bucket pays `fee_increment_bps` more,
/// up to `max_fee_bps`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FeeRateLimiter {
    pub cliff_fee_numerator: u64,
    // offset 8
    pub base_fee_mode: u8,
    pub padding: [u8; 5],
    pub fee_increment_bps: u16,
    pub max_limiter_duration: u32,
    pub max_fee_bps: u32,
    pub reference_amount: u64,
}

static_assertions::const_assert_eq!(std::mem::size_of::<FeeRateLimiter>(), 32);
static_assertions::const_assert_eq!(std::mem::offset_of!(FeeRateLimiter, base_fee_mode), 8);

fn bps_to_fee_numerator(bps: u64) -> Result<u64> {
    Ok(u128::from(bps)
        .safe_mul(u128::from(FEE_DENOMINATOR))?
        .safe_div(u128::from(MAX_BASIS_POINT))?
        .safe_cast()?)
}

impl FeeRateLimiterParameters {
    pub fn to_pod(&self) -> FeeRateLimiter {
        FeeRateLimiter {
            cliff_fee_numerator: self.cliff_fee_numerator,
            base_fee_mode: self.base_fee_mode,
            fee_increment_bps: self.fee_increment_bps,
            max_limiter_duration: self.max_limiter_duration,
            max_fee_bps: self.max_fee_bps,
            reference_amount: self.reference_amount,
            ..Default::default()
        }
    }

    pub fn to_base_fee_parameters(&self) -> Result<BaseFeeParameters> {
        write_borsh(self)
    }
}

impl FeeRateLimiter {
    pub fn to_parameters(&self) -> FeeRateLimiterParameters {
        FeeRateLimiterParameters {
            cliff_fee_numerator: self.cliff_fee_numerator,
            fee_increment_bps: self.fee_increment_bps,
            max_limiter_duration: self.max_limiter_duration,
            max_fee_bps: self.max_fee_bps,
            reference_amount: self.reference_amount,
            base_fee_mode: self.base_fee_mode,
            ..Default::default()
        }
    }

    /// A limiter with no shape behaves as a flat cliff fee
    pub fn is_zero_rate_limiter(&self) -> bool {
        self.reference_amount == 0
            && self.max_limiter_duration == 0
            && self.max_fee_bps == 0
            && self.fee_increment_bps == 0
    }

    pub fn is_rate_limiter_applied(
        &self,
        current_point: u64,
        activation_point: u64,
        trade_direction: TradeDirection,
    ) -> Result<bool> {
        if self.is_zero_rate_limiter() || trade_direction == TradeDirection::AtoB {
            return Ok(false);
        }
        if current_point < activation_point {
            return Ok(false);
        }
        let last_effective_point =
            activation_point.safe_add(u64::from(self.max_limiter_duration))?;
        Ok(current_point <= last_effective_point)
    }

    fn get_max_fee_numerator(&self) -> Result<u64> {
        Ok(bps_to_fee_numerator(self.max_fee_bps.into())?.min(MAX_FEE_NUMERATOR))
    }

    fn get_fee_increment_numerator(&self) -> Result<u64> {
        bps_to_fee_numerator(self.fee_increment_bps.into())
    }

    /// Number of buckets after the first one whose rate is still below the cap
    fn get_max_index(&self) -> Result<u64> {
        let delta_numerator = self
            .get_max_fee_numerator()?
            .safe_sub(self.cliff_fee_numerator)?;
        Ok(delta_numerator.safe_div(self.get_fee_increment_numerator()?)?)
    }

    /// Effective numerator for `input_amount`, fee included
    pub fn get_fee_numerator_from_included_fee_amount(&self, input_amount: u64) -> Result<u64> {
        if input_amount <= self.reference_amount {
            return Ok(self.cliff_fee_numerator);
        }
        let max_fee_numerator = u128::from(self.get_max_fee_numerator()?);
        let c = u128::from(self.cliff_fee_numerator);
        let x0 = u128::from(self.reference_amount);
        let i = u128::from(self.get_fee_increment_numerator()?);
        let max_index = u128::from(self.get_max_index()?);

        // input_amount = x0 + (a * x0 + b)
        let remaining = u128::from(input_amount).safe_sub(x0)?;
        let a = remaining.safe_div(x0)?;
        let b = remaining.safe_rem(x0)?;

        let trading_fee_numerator = if a < max_index {
            // x0 * (c + c*a + i*a*(a+1)/2) + b * (c + i*(a+1))
            let a_plus_one = a.safe_add(1)?;
            let first = c
                .safe_add(c.safe_mul(a)?)?
                .safe_add(i.safe_mul(a)?.safe_mul(a_plus_one)?.safe_div(2)?)?;
            let second = c.safe_add(i.safe_mul(a_plus_one)?)?;
            x0.safe_mul(first)?.safe_add(b.safe_mul(second)?)?
        } else {
            // x0 * (c + c*m + i*m*(m+1)/2) + (d*x0 + b) * max
            let m_plus_one = max_index.safe_add(1)?;
            let first = c
                .safe_add(c.safe_mul(max_index)?)?
                .safe_add(i.safe_mul(max_index)?.safe_mul(m_plus_one)?.safe_div(2)?)?;
            let d = a.safe_sub(max_index)?;
            let left_amount = d.safe_mul(x0)?.safe_add(b)?;
            x0.safe_mul(first)?
                .safe_add(left_amount.safe_mul(max_fee_numerator)?)?
        };

        // average rate over the input, rounded up once so it stays monotone in the amount
        let fee_numerator = ceil_div(trading_fee_numerator, u128::from(input_amount))?;

        let fee_numerator: u64 = fee_numerator.min(max_fee_numerator).safe_cast()?;
        Ok(fee_numerator)
    }

    fn get_trading_fee(&self, included_amount: u64) -> Result<u64> {
        let fee_numerator = self.get_fee_numerator_from_included_fee_amount(included_amount)?;
        Ok(ceil_div(
            u128::from(included_amount).safe_mul(u128::from(fee_numerator))?,
            u128::from(FEE_DENOMINATOR),
        )?
        .safe_cast()?)
    }

    /// Effective numerator for a trade that must deliver `excluded_amount` net of fee
    ///
    /// Finds the smallest gross amount whose net covers the request.
    pub fn get_fee_numerator_from_excluded_fee_amount(&self, excluded_amount: u64) -> Result<u64> {
        let cliff_included = u128::from(excluded_amount)
            .safe_mul(u128::from(FEE_DENOMINATOR))?
            .safe_div(u128::from(FEE_DENOMINATOR.safe_sub(self.cliff_fee_numerator)?))?;
        if cliff_included <= u128::from(self.reference_amount) {
            return Ok(self.cliff_fee_numerator);
        }

        let max_fee_numerator = self.get_max_fee_numerator()?;
        let mut low = excluded_amount;
        let upper_bound = ceil_div(
            u128::from(excluded_amount)
                .safe_add(1)?
                .safe_mul(u128::from(FEE_DENOMINATOR))?,
            u128::from(FEE_DENOMINATOR.safe_sub(max_fee_numerator)?),
        )?
        .safe_add(1)?;
        let mut high: u64 = upper_bound.min(u128::from(u64::MAX)).safe_cast()?;

        while low < high {
            let mid = low + (high - low) / 2;
            let net = mid.saturating_sub(self.get_trading_fee(mid)?);
            if net >= excluded_amount {
                high = mid;
            } else {
                low = mid.safe_add(1)?;
            }
        }
        self.get_fee_numerator_from_included_fee_amount(low)
    }
}

impl BaseFeeHandler for FeeRateLimiter {
    fn validate(
        &self,
        collect_fee_mode: CollectFeeMode,
        activation_type: ActivationType,
    ) -> Result<()> {
        if !self.is_zero_rate_limiter() {
            require!(
                collect_fee_mode == CollectFeeMode::OnlyB,
                PoolError::InvalidFeeRateLimiter
            );
            require!(
                self.fee_increment_bps > 0
                    && u64::from(self.fee_increment_bps) <= MAX_BASIS_POINT
                    && self.reference_amount > 0
                    && self.max_limiter_duration > 0
                    && u64::from(self.max_limiter_duration)
                        <= activation_type.get_max_rate_limiter_duration()
                    && u64::from(self.max_fee_bps) <= MAX_FEE_BPS,
                PoolError::InvalidFeeRateLimiter
            );
            require!(
                bps_to_fee_numerator(self.max_fee_bps.into())? >= self.cliff_fee_numerator,
                PoolError::InvalidFeeRateLimiter
            );
        }
        validate_fee_numerator_range(self.cliff_fee_numerator, self.cliff_fee_numerator)
    }

    fn get_base_fee_numerator_from_included_fee_amount(
        &self,
        context: &BaseFeeContext,
        included_fee_amount: u64,
    ) -> Result<u64> {
        if self.is_rate_limiter_applied(
            context.current_point,
            context.activation_point,
            context.trade_direction,
        )? {
            self.get_fee_numerator_from_included_fee_amount(included_fee_amount)
        } else {
            Ok(self.cliff_fee_numerator)
        }
    }

    fn get_base_fee_numerator_from_excluded_fee_amount(
        &self,
        context: &BaseFeeContext,
        excluded_fee_amount: u64,
    ) -> Result<u64> {
        if self.is_rate_limiter_applied(
            context.current_point,
            context.activation_point,
            context.trade_direction,
        )? {
            self.get_fee_numerator_from_excluded_fee_amount(excluded_fee_amount)
        } else {
            Ok(self.cliff_fee_numerator)
        }
    }

    fn validate_base_fee_is_static(
        &self,
        current_point: u64,
        activation_point: u64,
    ) -> Result<bool> {
        if self.is_zero_rate_limiter() {
            return Ok(true);
        }
        let last_effective_point =
            u128::from(activation_point).safe_add(u128::from(self.max_limiter_duration))?;
        Ok(u128::from(current_point) > last_effective_point)
    }

    fn get_min_base_fee_numerator(&self) -> Result<u64> {
        Ok(self.cliff_fee_numerator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{base_fee::BaseFeeMode, errors::assert_pool_error};
    use proptest::prelude::*;

    const REFERENCE_AMOUNT: u64 = 1_000_000_000;

    fn limiter(cliff: u64, increment_bps: u16, max_fee_bps: u32) -> FeeRateLimiter {
        FeeRateLimiterParameters {
            cliff_fee_numerator: cliff,
            fee_increment_bps: increment_bps,
            max_limiter_duration: 10,
            max_fee_bps,
            reference_amount: REFERENCE_AMOUNT,
            base_fee_mode: BaseFeeMode::RateLimiter as u8,
            ..Default::default()
        }
        .to_pod()
    }

    fn context(current_point: u64, trade_direction: TradeDirection) -> BaseFeeContext {
        BaseFeeContext {
            current_point,
            activation_point: 100,
            trade_direction,
            init_sqrt_price: 0,
            current_sqrt_price: 0,
        }
    }

    fn fee_for(limiter: &FeeRateLimiter, ctx: &BaseFeeContext, amount: u64) -> u64 {
        let numerator = limiter
            .get_base_fee_numerator_from_included_fee_amount(ctx, amount)
            .unwrap();
        ceil_div(
            u128::from(amount) * u128::from(numerator),
            u128::from(FEE_DENOMINATOR),
        )
        .unwrap() as u64
    }

    #[test]
    fn test_rate_limiter_window() {
        let fee = limiter(10_000_000, 10, 5_000);
        fee.validate(CollectFeeMode::OnlyB, ActivationType::Slot).unwrap();

        let in_window = context(105, TradeDirection::BtoA);
        assert_eq!(fee_for(&fee, &in_window, REFERENCE_AMOUNT), REFERENCE_AMOUNT / 100);

        let doubled = fee_for(&fee, &in_window, 2 * REFERENCE_AMOUNT);
        assert!(doubled > 2 * REFERENCE_AMOUNT / 100);
        // 1% on the first bucket, 1.1% on the second
        assert_eq!(doubled, 21_000_000);

        let after_window = context(111, TradeDirection::BtoA);
        assert_eq!(
            fee_for(&fee, &after_window, 2 * REFERENCE_AMOUNT),
            2 * REFERENCE_AMOUNT / 100
        );

        let other_direction = context(105, TradeDirection::AtoB);
        assert_eq!(
            fee_for(&fee, &other_direction, 2 * REFERENCE_AMOUNT),
            2 * REFERENCE_AMOUNT / 100
        );

        assert!(!fee.validate_base_fee_is_static(110, 100).unwrap());
        assert!(fee.validate_base_fee_is_static(111, 100).unwrap());
    }

    #[test]
    fn test_rate_limiter_reaches_cap() {
        let fee = limiter(10_000_000, 100, 500);
        // cap 5%, reached after 4 increments
        let numerator = fee
            .get_fee_numerator_from_included_fee_amount(1_000 * REFERENCE_AMOUNT)
            .unwrap();
        assert!(numerator <= 50_000_000);
        assert!(numerator > 49_000_000);
    }

    #[test]
    fn test_rate_limiter_requires_only_b() {
        let fee = limiter(10_000_000, 10, 5_000);
        assert_pool_error(
            fee.validate(CollectFeeMode::BothToken, ActivationType::Slot),
            PoolError::InvalidFeeRateLimiter,
        );
        let too_low_cap = limiter(10_000_000, 10, 50);
        assert_pool_error(
            too_low_cap.validate(CollectFeeMode::OnlyB, ActivationType::Slot),
            PoolError::InvalidFeeRateLimiter,
        );
        let mut too_long = limiter(10_000_000, 10, 5_000);
        too_long.max_limiter_duration = 43_201;
        assert_pool_error(
            too_long.validate(CollectFeeMode::OnlyB, ActivationType::Timestamp),
            PoolError::InvalidFeeRateLimiter,
        );
    }

    #[test]
    fn test_excluded_amount_search_covers_request() {
        let fee = limiter(10_000_000, 10, 5_000);
        for excluded in [1u64, 990_000_000, 1_500_000_000, 7_777_777_777] {
            let numerator = fee
                .get_fee_numerator_from_excluded_fee_amount(excluded)
                .unwrap();
            let included = ceil_div(
                u128::from(excluded) * u128::from(FEE_DENOMINATOR),
                u128::from(FEE_DENOMINATOR - numerator),
            )
            .unwrap() as u64;
            let fee_amount = ceil_div(
                u128::from(included) * u128::from(numerator),
                u128::from(FEE_DENOMINATOR),
            )
            .unwrap() as u64;
            assert!(included - fee_amount >= excluded);
        }
    }

    proptest! {
        #[test]
        fn rate_limiter_numerator_non_decreasing_in_amount(
            cliff in 1_000_000u64..20_000_000,
            increment_bps in 1u16..200,
            amount in 1u64..100_000_000_000,
            extra in 0u64..100_000_000_000,
        ) {
            let fee = limiter(cliff, increment_bps, 5_000);
            let smaller = fee.get_fee_numerator_from_included_fee_amount(amount).unwrap();
            let larger = fee.get_fee_numerator_from_included_fee_amount(amount + extra).unwrap();
            prop_assert!(larger >= smaller);
            prop_assert!(smaller >= cliff);
            prop_assert!(larger <= 500_000_000);
        }

        #[test]
        fn rate_limiter_fee_covers_bucket_sum(
            amount in REFERENCE_AMOUNT..100 * REFERENCE_AMOUNT,
        ) {
            let fee = limiter(10_000_000, 10, 5_000);
            // 1% on the first bucket, 0.1% more on each following one
            let a = u128::from(amount - REFERENCE_AMOUNT) / u128::from(REFERENCE_AMOUNT);
            let b = u128::from(amount - REFERENCE_AMOUNT) % u128::from(REFERENCE_AMOUNT);
            let exact = u128::from(REFERENCE_AMOUNT) * (10_000_000 * (a + 1) + 1_000_000 * a * (a + 1) / 2)
                + b * (10_000_000 + 1_000_000 * (a + 1));
            let charged = fee.get_trading_fee(amount).unwrap();
            prop_assert!(u128::from(charged) >= ceil_div(exact, u128::from(FEE_DENOMINATOR)).unwrap());
        }
    }

    #[test]
    fn test_numerator_steady_past_first_bucket() {
        let fee = limiter(10_000_000, 10, 5_000);
        let mut previous = fee.cliff_fee_numerator;
        for amount in REFERENCE_AMOUNT..REFERENCE_AMOUNT + 200_000 {
            let numerator = fee.get_fee_numerator_from_included_fee_amount(amount).unwrap();
            assert!(numerator >= previous, "numerator dropped at {}", amount);
            previous = numerator;
        }
        assert_eq!(
            fee.get_fee_numerator_from_included_fee_amount(1_000_000_099).unwrap(),
            10_000_001
        );
        assert_eq!(
            fee.get_fee_numerator_from_included_fee_amount(1_000_000_100).unwrap(),
            10_000_001
        );
    }
}
