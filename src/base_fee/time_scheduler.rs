use anchor_lang::prelude::*;

use super::{
    get_exponential_fee_in_period, get_linear_fee_in_period, validate_fee_numerator_range,
    write_borsh, BaseFeeContext, BaseFeeHandler, BaseFeeMode, BaseFeeParameters,
};
use crate::{
    constants::fee::MAX_BASIS_POINT,
    safe_math::SafeMath,
    state::{ActivationType, CollectFeeMode},
    PoolError,
};

/// Time based decay, borsh layout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct FeeTimeSchedulerParameters {
    pub cliff_fee_numerator: u64,
    pub number_of_period: u16,
    pub period_frequency: u64,
    pub reduction_factor: u64,
    // offset 26
    pub base_fee_mode: u8,
    pub padding: [u8; 3],
}

/// Time based decay, stored layout
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FeeTimeScheduler {
    pub cliff_fee_numerator: u64,
    // offset 8
    pub base_fee_mode: u8,
    pub padding: [u8; 5],
    pub number_of_period: u16,
    pub period_frequency: u64,
    pub reduction_factor: u64,
}

static_assertions::const_assert_eq!(std::mem::size_of::<FeeTimeScheduler>(), 32);
static_assertions::const_assert_eq!(std::mem::offset_of!(FeeTimeScheduler, base_fee_mode), 8);

impl FeeTimeSchedulerParameters {
    pub fn to_pod(&self) -> FeeTimeScheduler {
        FeeTimeScheduler {
            cliff_fee_numerator: self.cliff_fee_numerator,
            base_fee_mode: self.base_fee_mode,
            number_of_period: self.number_of_period,
            period_frequency: self.period_frequency,
            reduction_factor: self.reduction_factor,
            ..Default::default()
        }
    }

    pub fn to_base_fee_parameters(&self) -> Result<BaseFeeParameters> {
        write_borsh(self)
    }
}

impl FeeTimeScheduler {
    pub fn to_parameters(&self) -> FeeTimeSchedulerParameters {
        FeeTimeSchedulerParameters {
            cliff_fee_numerator: self.cliff_fee_numerator,
            number_of_period: self.number_of_period,
            period_frequency: self.period_frequency,
            reduction_factor: self.reduction_factor,
            base_fee_mode: self.base_fee_mode,
            ..Default::default()
        }
    }

    fn get_base_fee_numerator_by_period(&self, period: u64) -> Result<u64> {
        let period = period.min(self.number_of_period.into());
        match BaseFeeMode::from_tag(self.base_fee_mode)? {
            BaseFeeMode::FeeTimeSchedulerLinear => {
                get_linear_fee_in_period(self.cliff_fee_numerator, self.reduction_factor, period)
            }
            BaseFeeMode::FeeTimeSchedulerExponential => {
                get_exponential_fee_in_period(self.cliff_fee_numerator, self.reduction_factor, period)
            }
            _ => err!(PoolError::InvalidBaseFeeMode),
        }
    }

    pub fn get_base_fee_numerator(&self, current_point: u64, activation_point: u64) -> Result<u64> {
        if self.period_frequency == 0 {
            return self.get_base_fee_numerator_by_period(0);
        }
        // trading before activation (e.g. a pre-launch vault) pays the fully decayed fee
        let period = if current_point < activation_point {
            u64::from(self.number_of_period)
        } else {
            current_point
                .safe_sub(activation_point)?
                .safe_div(self.period_frequency)?
        };
        self.get_base_fee_numerator_by_period(period)
    }
}

impl BaseFeeHandler for FeeTimeScheduler {
    fn validate(
        &self,
        _collect_fee_mode: CollectFeeMode,
        _activation_type: ActivationType,
    ) -> Result<()> {
        if self.period_frequency != 0 || self.number_of_period != 0 || self.reduction_factor != 0 {
            require!(
                self.number_of_period != 0
                    && self.period_frequency != 0
                    && self.reduction_factor != 0,
                PoolError::InvalidFeeTimeScheduler
            );
        }
        if BaseFeeMode::from_tag(self.base_fee_mode)? == BaseFeeMode::FeeTimeSchedulerExponential {
            require!(
                self.reduction_factor < MAX_BASIS_POINT,
                PoolError::InvalidFeeTimeScheduler
            );
        }
        validate_fee_numerator_range(self.get_min_base_fee_numerator()?, self.cliff_fee_numerator)
    }

    fn get_base_fee_numerator_from_included_fee_amount(
        &self,
        context: &BaseFeeContext,
        _included_fee_amount: u64,
    ) -> Result<u64> {
        self.get_base_fee_numerator(context.current_point, context.activation_point)
    }

    fn get_base_fee_numerator_from_excluded_fee_amount(
        &self,
        context: &BaseFeeContext,
        _excluded_fee_amount: u64,
    ) -> Result<u64> {
        self.get_base_fee_numerator(context.current_point, context.activation_point)
    }

    fn validate_base_fee_is_static(
        &self,
        current_point: u64,
        activation_point: u64,
    ) -> Result<bool> {
        let scheduler_expiration_point = u128::from(activation_point).safe_add(
            u128::from(self.number_of_period).safe_mul(u128::from(self.period_frequency))?,
        )?;
        Ok(u128::from(current_point) > scheduler_expiration_point)
    }

    fn get_min_base_fee_numerator(&self) -> Result<u64> {
        self.get_base_fee_numerator_by_period(self.number_of_period.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::fee::MIN_FEE_NUMERATOR, errors::assert_pool_error};
    use proptest::prelude::*;

    fn scheduler(mode: BaseFeeMode, cliff: u64, periods: u16, frequency: u64, reduction: u64) -> FeeTimeScheduler {
        FeeTimeSchedulerParameters {
            cliff_fee_numerator: cliff,
            number_of_period: periods,
            period_frequency: frequency,
            reduction_factor: reduction,
            base_fee_mode: mode as u8,
            ..Default::default()
        }
        .to_pod()
    }

    #[test]
    fn test_constant_fee_without_periods() {
        let fee = scheduler(BaseFeeMode::FeeTimeSchedulerLinear, 2_500_000, 0, 0, 0);
        fee.validate(CollectFeeMode::BothToken, ActivationType::Slot).unwrap();
        for point in [0u64, 1, 1_000, u64::MAX] {
            assert_eq!(fee.get_base_fee_numerator(point, 0).unwrap(), 2_500_000);
        }
        assert!(fee.validate_base_fee_is_static(1, 0).unwrap());
    }

    #[test]
    fn test_linear_schedule() {
        let fee = scheduler(BaseFeeMode::FeeTimeSchedulerLinear, 10_000_000, 5, 10, 1_000_000);
        fee.validate(CollectFeeMode::BothToken, ActivationType::Slot).unwrap();
        assert_eq!(fee.get_base_fee_numerator(100, 100).unwrap(), 10_000_000);
        assert_eq!(fee.get_base_fee_numerator(119, 100).unwrap(), 9_000_000);
        assert_eq!(fee.get_base_fee_numerator(125, 100).unwrap(), 8_000_000);
        assert_eq!(fee.get_base_fee_numerator(10_000, 100).unwrap(), 5_000_000);
        // before activation
        assert_eq!(fee.get_base_fee_numerator(50, 100).unwrap(), 5_000_000);
        assert_eq!(fee.get_min_base_fee_numerator().unwrap(), 5_000_000);

        assert!(!fee.validate_base_fee_is_static(150, 100).unwrap());
        assert!(fee.validate_base_fee_is_static(151, 100).unwrap());
    }

    #[test]
    fn test_partial_shape_is_rejected() {
        let fee = scheduler(BaseFeeMode::FeeTimeSchedulerLinear, 10_000_000, 5, 0, 1_000_000);
        assert_pool_error(
            fee.validate(CollectFeeMode::BothToken, ActivationType::Slot),
            PoolError::InvalidFeeTimeScheduler,
        );
        let fee = scheduler(BaseFeeMode::FeeTimeSchedulerExponential, 10_000_000, 5, 10, 10_000);
        assert_pool_error(
            fee.validate(CollectFeeMode::BothToken, ActivationType::Slot),
            PoolError::InvalidFeeTimeScheduler,
        );
    }

    #[test]
    fn test_cliff_above_ceiling_is_rejected() {
        let fee = scheduler(BaseFeeMode::FeeTimeSchedulerLinear, 990_000_001, 0, 0, 0);
        assert_pool_error(
            fee.validate(CollectFeeMode::BothToken, ActivationType::Slot),
            PoolError::ExceedMaxFeeBps,
        );
        let fee = scheduler(BaseFeeMode::FeeTimeSchedulerLinear, MIN_FEE_NUMERATOR - 1, 0, 0, 0);
        assert_pool_error(
            fee.validate(CollectFeeMode::BothToken, ActivationType::Slot),
            PoolError::ExceedMaxFeeBps,
        );
    }

    proptest! {
        #[test]
        fn time_schedule_is_non_increasing(
            exponential in any::<bool>(),
            cliff in MIN_FEE_NUMERATOR..=990_000_000u64,
            periods in 1u16..500,
            frequency in 1u64..1_000,
            reduction in 1u64..9_999,
            elapsed in 0u64..1_000_000,
            step in 0u64..1_000,
        ) {
            let mode = if exponential {
                BaseFeeMode::FeeTimeSchedulerExponential
            } else {
                BaseFeeMode::FeeTimeSchedulerLinear
            };
            let fee = scheduler(mode, cliff, periods, frequency, reduction);
            let earlier = fee.get_base_fee_numerator(elapsed, 0).unwrap();
            let later = fee.get_base_fee_numerator(elapsed + step, 0).unwrap();
            prop_assert!(later <= earlier);
            prop_assert!(earlier <= 990_000_000);
            prop_assert!(later >= MIN_FEE_NUMERATOR);
            prop_assert!(later >= fee.get_min_base_fee_numerator().unwrap());
        }
    }
}
