use anchor_lang::prelude::*;
use ethnum::U256;

use super::{
    get_exponential_fee_in_period, get_linear_fee_in_period, validate_fee_numerator_range,
    write_borsh, BaseFeeContext, BaseFeeHandler, BaseFeeMode, BaseFeeParameters,
};
use crate::{
    constants::fee::MAX_BASIS_POINT,
    safe_math::{SafeCast, SafeMath},
    state::{ActivationType, CollectFeeMode},
    PoolError,
};

/// Price based decay, borsh layout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct FeeMarketCapSchedulerParameters {
    pub cliff_fee_numerator: u64,
    pub number_of_period: u16,
    /// Price move, in bps of the initial sqrt price, that advances one period
    pub sqrt_price_step_bps: u32,
    pub scheduler_expiration_duration: u32,
    pub reduction_factor: u64,
    // offset 26
    pub base_fee_mode: u8,
    pub padding: [u8; 3],
}

/// Price based decay, stored layout
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FeeMarketCapScheduler {
    pub cliff_fee_numerator: u64,
    // offset 8
    pub base_fee_mode: u8,
    pub padding: [u8; 5],
    pub number_of_period: u16,
    pub sqrt_price_step_bps: u32,
    pub scheduler_expiration_duration: u32,
    pub reduction_factor: u64,
}

static_assertions::const_assert_eq!(std::mem::size_of::<FeeMarketCapScheduler>(), 32);
static_assertions::const_assert_eq!(
    std::mem::offset_of!(FeeMarketCapScheduler, base_fee_mode),
    8
);

impl FeeMarketCapSchedulerParameters {
    pub fn to_pod(&self) -> FeeMarketCapScheduler {
        FeeMarketCapScheduler {
            cliff_fee_numerator: self.cliff_fee_numerator,
            base_fee_mode: self.base_fee_mode,
            number_of_period: self.number_of_period,
            sqrt_price_step_bps: self.sqrt_price_step_bps,
            scheduler_expiration_duration: self.scheduler_expiration_duration,
            reduction_factor: self.reduction_factor,
            ..Default::default()
        }
    }

    pub fn to_base_fee_parameters(&self) -> Result<BaseFeeParameters> {
        write_borsh(self)
    }
}

impl FeeMarketCapScheduler {
    pub fn to_parameters(&self) -> FeeMarketCapSchedulerParameters {
        FeeMarketCapSchedulerParameters {
            cliff_fee_numerator: self.cliff_fee_numerator,
            number_of_period: self.number_of_period,
            sqrt_price_step_bps: self.sqrt_price_step_bps,
            scheduler_expiration_duration: self.scheduler_expiration_duration,
            reduction_factor: self.reduction_factor,
            base_fee_mode: self.base_fee_mode,
            ..Default::default()
        }
    }

    fn get_base_fee_numerator_by_period(&self, period: u64) -> Result<u64> {
        let period = period.min(self.number_of_period.into());
        match BaseFeeMode::from_tag(self.base_fee_mode)? {
            BaseFeeMode::FeeMarketCapSchedulerLinear => {
                get_linear_fee_in_period(self.cliff_fee_numerator, self.reduction_factor, period)
            }
            BaseFeeMode::FeeMarketCapSchedulerExponential => {
                get_exponential_fee_in_period(self.cliff_fee_numerator, self.reduction_factor, period)
            }
            _ => err!(PoolError::InvalidBaseFeeMode),
        }
    }

    /// Periods passed as the price climbed above its initial value
    fn get_passed_period(&self, init_sqrt_price: u128, current_sqrt_price: u128) -> Result<u64> {
        if current_sqrt_price <= init_sqrt_price {
            return Ok(0);
        }
        let passed_period = U256::from(current_sqrt_price.safe_sub(init_sqrt_price)?)
            .safe_mul(U256::from(MAX_BASIS_POINT))?
            .safe_div(U256::from(init_sqrt_price))?
            .safe_div(U256::from(self.sqrt_price_step_bps))?;

        let number_of_period = U256::from(self.number_of_period);
        if passed_period > number_of_period {
            Ok(self.number_of_period.into())
        } else {
            Ok(passed_period.safe_cast()?)
        }
    }

    pub fn get_base_fee_numerator(
        &self,
        current_point: u64,
        activation_point: u64,
        init_sqrt_price: u128,
        current_sqrt_price: u128,
    ) -> Result<u64> {
        let scheduler_expiration_point =
            activation_point.safe_add(self.scheduler_expiration_duration.into())?;

        // expired schedulers stay at the floor, as do pre-activation trades
        let period = if current_point > scheduler_expiration_point || current_point < activation_point
        {
            u64::from(self.number_of_period)
        } else {
            self.get_passed_period(init_sqrt_price, current_sqrt_price)?
        };
        self.get_base_fee_numerator_by_period(period)
    }
}

impl BaseFeeHandler for FeeMarketCapScheduler {
    fn validate(
        &self,
        _collect_fee_mode: CollectFeeMode,
        _activation_type: ActivationType,
    ) -> Result<()> {
        require!(
            self.reduction_factor > 0
                && self.sqrt_price_step_bps > 0
                && self.scheduler_expiration_duration > 0
                && self.number_of_period > 0,
            PoolError::InvalidFeeMarketCapScheduler
        );
        if BaseFeeMode::from_tag(self.base_fee_mode)?
            == BaseFeeMode::FeeMarketCapSchedulerExponential
        {
            require!(
                self.reduction_factor < MAX_BASIS_POINT,
                PoolError::InvalidFeeMarketCapScheduler
            );
        }
        validate_fee_numerator_range(self.get_min_base_fee_numerator()?, self.cliff_fee_numerator)
    }

    fn get_base_fee_numerator_from_included_fee_amount(
        &self,
        context: &BaseFeeContext,
        _included_fee_amount: u64,
    ) -> Result<u64> {
        self.get_base_fee_numerator(
            context.current_point,
            context.activation_point,
            context.init_sqrt_price,
            context.current_sqrt_price,
        )
    }

    fn get_base_fee_numerator_from_excluded_fee_amount(
        &self,
        context: &BaseFeeContext,
        _excluded_fee_amount: u64,
    ) -> Result<u64> {
        self.get_base_fee_numerator(
            context.current_point,
            context.activation_point,
            context.init_sqrt_price,
            context.current_sqrt_price,
        )
    }

    fn validate_base_fee_is_static(
        &self,
        current_point: u64,
        activation_point: u64,
    ) -> Result<bool> {
        let scheduler_expiration_point = u128::from(activation_point)
            .safe_add(u128::from(self.scheduler_expiration_duration))?;
        Ok(u128::from(current_point) > scheduler_expiration_point)
    }

    fn get_min_base_fee_numerator(&self) -> Result<u64> {
        self.get_base_fee_numerator_by_period(self.number_of_period.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{fee::MIN_FEE_NUMERATOR, ONE_Q64},
        errors::assert_pool_error,
    };
    use proptest::prelude::*;

    const INIT_SQRT_PRICE: u128 = 10_000_000_000_000_000_000;

    fn scheduler(mode: BaseFeeMode, reduction: u64) -> FeeMarketCapScheduler {
        FeeMarketCapSchedulerParameters {
            cliff_fee_numerator: 50_000_000,
            number_of_period: 100,
            sqrt_price_step_bps: 100,
            scheduler_expiration_duration: 1_000,
            reduction_factor: reduction,
            base_fee_mode: mode as u8,
            ..Default::default()
        }
        .to_pod()
    }

    #[test]
    fn test_period_follows_price() {
        let fee = scheduler(BaseFeeMode::FeeMarketCapSchedulerLinear, 400_000);
        fee.validate(CollectFeeMode::BothToken, ActivationType::Timestamp)
            .unwrap();
        let init = INIT_SQRT_PRICE;
        assert_eq!(fee.get_base_fee_numerator(10, 0, init, init).unwrap(), 50_000_000);
        // price below the initial price does not decay
        assert_eq!(fee.get_base_fee_numerator(10, 0, init, init / 2).unwrap(), 50_000_000);
        // +1% sqrt price is one period, +3.5% is three
        assert_eq!(
            fee.get_base_fee_numerator(10, 0, init, init + init / 100).unwrap(),
            49_600_000
        );
        assert_eq!(
            fee.get_base_fee_numerator(10, 0, init, init + init * 35 / 1_000).unwrap(),
            48_800_000
        );
    }

    #[test]
    fn test_expired_scheduler_latches_at_floor() {
        let fee = scheduler(BaseFeeMode::FeeMarketCapSchedulerLinear, 400_000);
        let init = INIT_SQRT_PRICE;
        let floor = fee.get_min_base_fee_numerator().unwrap();
        assert_eq!(floor, 10_000_000);
        assert_eq!(fee.get_base_fee_numerator(1_001, 0, init, init).unwrap(), floor);
        assert!(!fee.validate_base_fee_is_static(1_000, 0).unwrap());
        assert!(fee.validate_base_fee_is_static(1_001, 0).unwrap());
    }

    #[test]
    fn test_zero_shape_is_rejected() {
        let fee = scheduler(BaseFeeMode::FeeMarketCapSchedulerExponential, 0);
        assert_pool_error(
            fee.validate(CollectFeeMode::BothToken, ActivationType::Slot),
            PoolError::InvalidFeeMarketCapScheduler,
        );
    }

    proptest! {
        #[test]
        fn market_cap_schedule_is_non_increasing_in_price(
            exponential in any::<bool>(),
            reduction in 1u64..5_000,
            price_move in 0u128..(1u128 << 66),
            extra in 0u128..(1u128 << 62),
        ) {
            let mode = if exponential {
                BaseFeeMode::FeeMarketCapSchedulerExponential
            } else {
                BaseFeeMode::FeeMarketCapSchedulerLinear
            };
            let fee = scheduler(mode, reduction);
            let init = ONE_Q64;
            let lower = fee.get_base_fee_numerator(5, 0, init, init + price_move).unwrap();
            let higher = fee.get_base_fee_numerator(5, 0, init, init + price_move + extra).unwrap();
            prop_assert!(higher <= lower);
            prop_assert!(lower <= 50_000_000);
            prop_assert!(higher >= MIN_FEE_NUMERATOR);
        }
    }
}
