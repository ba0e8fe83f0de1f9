//! Base fee schedulers
//!
//! The base fee is configured through a fixed 30 byte borsh blob
//! (`BaseFeeParameters`) and stored as a fixed 32 byte pod-aligned blob
//! (`BaseFeeInfo`). Both carry the scheduler tag at a fixed offset so older
//! encodings keep decoding. `BaseFee` is the decoded form used by the fee
//! pipeline.
pub mod market_cap_scheduler;
pub mod rate_limiter;
pub mod time_scheduler;

pub use market_cap_scheduler::*;
pub use rate_limiter::*;
pub use time_scheduler::*;

use anchor_lang::prelude::*;
use ethnum::U256;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{
    constants::{
        fee::{MAX_BASIS_POINT, MAX_FEE_NUMERATOR, MIN_FEE_NUMERATOR},
        ONE_Q64,
    },
    safe_math::{SafeCast, SafeMath},
    state::{ActivationType, CollectFeeMode, TradeDirection},
    PoolError,
};

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum BaseFeeMode {
    FeeTimeSchedulerLinear,
    FeeTimeSchedulerExponential,
    RateLimiter,
    FeeMarketCapSchedulerLinear,
    FeeMarketCapSchedulerExponential,
}

impl BaseFeeMode {
    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(Self::from_u8(tag).ok_or(PoolError::InvalidBaseFeeMode)?)
    }
}

/// Borsh encoded base fee, as supplied by config and pool creators
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct BaseFeeParameters {
    pub data: [u8; BaseFeeParameters::LEN],
}

/// Pod-aligned base fee, as stored on the pool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct BaseFeeInfo {
    pub data: [u8; BaseFeeInfo::LEN],
}

impl BaseFeeParameters {
    pub const LEN: usize = 30;
    pub const BASE_FEE_MODE_OFFSET: usize = 26;

    pub fn get_base_fee_mode(&self) -> Result<BaseFeeMode> {
        BaseFeeMode::from_tag(self.data[Self::BASE_FEE_MODE_OFFSET])
    }

    pub fn to_base_fee(&self) -> Result<BaseFee> {
        let base_fee = match self.get_base_fee_mode()? {
            BaseFeeMode::FeeTimeSchedulerLinear | BaseFeeMode::FeeTimeSchedulerExponential => {
                BaseFee::TimeScheduler(
                    read_borsh::<FeeTimeSchedulerParameters>(&self.data)?.to_pod(),
                )
            }
            BaseFeeMode::RateLimiter => {
                BaseFee::RateLimiter(read_borsh::<FeeRateLimiterParameters>(&self.data)?.to_pod())
            }
            BaseFeeMode::FeeMarketCapSchedulerLinear
            | BaseFeeMode::FeeMarketCapSchedulerExponential => BaseFee::MarketCapScheduler(
                read_borsh::<FeeMarketCapSchedulerParameters>(&self.data)?.to_pod(),
            ),
        };
        Ok(base_fee)
    }

    pub fn to_base_fee_info(&self) -> Result<BaseFeeInfo> {
        Ok(self.to_base_fee()?.to_base_fee_info())
    }
}

impl BaseFeeInfo {
    pub const LEN: usize = 32;
    pub const BASE_FEE_MODE_OFFSET: usize = 8;

    pub fn get_base_fee_mode(&self) -> Result<BaseFeeMode> {
        BaseFeeMode::from_tag(self.data[Self::BASE_FEE_MODE_OFFSET])
    }

    pub fn to_base_fee(&self) -> Result<BaseFee> {
        let base_fee = match self.get_base_fee_mode()? {
            BaseFeeMode::FeeTimeSchedulerLinear | BaseFeeMode::FeeTimeSchedulerExponential => {
                BaseFee::TimeScheduler(read_pod(&self.data)?)
            }
            BaseFeeMode::RateLimiter => BaseFee::RateLimiter(read_pod(&self.data)?),
            BaseFeeMode::FeeMarketCapSchedulerLinear
            | BaseFeeMode::FeeMarketCapSchedulerExponential => {
                BaseFee::MarketCapScheduler(read_pod(&self.data)?)
            }
        };
        Ok(base_fee)
    }

    pub fn to_base_fee_parameters(&self) -> Result<BaseFeeParameters> {
        self.to_base_fee()?.to_base_fee_parameters()
    }

    pub fn update_cliff_fee_numerator(&mut self, cliff_fee_numerator: u64) -> Result<()> {
        let mut base_fee = self.to_base_fee()?;
        match &mut base_fee {
            BaseFee::TimeScheduler(scheduler) => scheduler.cliff_fee_numerator = cliff_fee_numerator,
            BaseFee::MarketCapScheduler(scheduler) => {
                scheduler.cliff_fee_numerator = cliff_fee_numerator
            }
            BaseFee::RateLimiter(limiter) => limiter.cliff_fee_numerator = cliff_fee_numerator,
        }
        *self = base_fee.to_base_fee_info();
        Ok(())
    }
}

fn read_pod<T: bytemuck::Pod>(data: &[u8]) -> Result<T> {
    Ok(bytemuck::try_pod_read_unaligned::<T>(data).map_err(|_| PoolError::UndeterminedError)?)
}

fn write_pod<T: bytemuck::Pod>(value: &T) -> BaseFeeInfo {
    let mut data = [0u8; BaseFeeInfo::LEN];
    data.copy_from_slice(bytemuck::bytes_of(value));
    BaseFeeInfo { data }
}

fn read_borsh<T: AnchorDeserialize>(data: &[u8]) -> Result<T> {
    Ok(T::try_from_slice(data).map_err(|_| PoolError::UndeterminedError)?)
}

fn write_borsh<T: AnchorSerialize>(value: &T) -> Result<BaseFeeParameters> {
    let mut data = [0u8; BaseFeeParameters::LEN];
    borsh::to_writer(&mut data[..], value).map_err(|_| PoolError::UndeterminedError)?;
    Ok(BaseFeeParameters { data })
}

/// Point in time and price a base fee is evaluated at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BaseFeeContext {
    pub current_point: u64,
    pub activation_point: u64,
    pub trade_direction: TradeDirection,
    pub init_sqrt_price: u128,
    pub current_sqrt_price: u128,
}

pub trait BaseFeeHandler {
    fn validate(&self, collect_fee_mode: CollectFeeMode, activation_type: ActivationType)
        -> Result<()>;

    /// Fee numerator for a trade whose amount still includes the fee
    fn get_base_fee_numerator_from_included_fee_amount(
        &self,
        context: &BaseFeeContext,
        included_fee_amount: u64,
    ) -> Result<u64>;

    /// Fee numerator for a trade whose amount already excludes the fee
    fn get_base_fee_numerator_from_excluded_fee_amount(
        &self,
        context: &BaseFeeContext,
        excluded_fee_amount: u64,
    ) -> Result<u64>;

    /// True once the decay or limiter window has fully elapsed
    fn validate_base_fee_is_static(&self, current_point: u64, activation_point: u64)
        -> Result<bool>;

    fn get_min_base_fee_numerator(&self) -> Result<u64>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaseFee {
    TimeScheduler(FeeTimeScheduler),
    MarketCapScheduler(FeeMarketCapScheduler),
    RateLimiter(FeeRateLimiter),
}

impl BaseFee {
    pub fn handler(&self) -> &dyn BaseFeeHandler {
        match self {
            BaseFee::TimeScheduler(scheduler) => scheduler,
            BaseFee::MarketCapScheduler(scheduler) => scheduler,
            BaseFee::RateLimiter(limiter) => limiter,
        }
    }

    pub fn to_base_fee_info(&self) -> BaseFeeInfo {
        match self {
            BaseFee::TimeScheduler(scheduler) => write_pod(scheduler),
            BaseFee::MarketCapScheduler(scheduler) => write_pod(scheduler),
            BaseFee::RateLimiter(limiter) => write_pod(limiter),
        }
    }

    pub fn to_base_fee_parameters(&self) -> Result<BaseFeeParameters> {
        match self {
            BaseFee::TimeScheduler(scheduler) => write_borsh(&scheduler.to_parameters()),
            BaseFee::MarketCapScheduler(scheduler) => write_borsh(&scheduler.to_parameters()),
            BaseFee::RateLimiter(limiter) => write_borsh(&limiter.to_parameters()),
        }
    }

    pub fn get_cliff_fee_numerator(&self) -> u64 {
        match self {
            BaseFee::TimeScheduler(scheduler) => scheduler.cliff_fee_numerator,
            BaseFee::MarketCapScheduler(scheduler) => scheduler.cliff_fee_numerator,
            BaseFee::RateLimiter(limiter) => limiter.cliff_fee_numerator,
        }
    }
}

pub(crate) fn validate_fee_numerator_range(
    min_fee_numerator: u64,
    max_fee_numerator: u64,
) -> Result<()> {
    require!(
        min_fee_numerator >= MIN_FEE_NUMERATOR
            && max_fee_numerator >= min_fee_numerator
            && max_fee_numerator <= MAX_FEE_NUMERATOR,
        PoolError::ExceedMaxFeeBps
    );
    Ok(())
}

pub(crate) fn clamp_fee_numerator(fee_numerator: u64) -> u64 {
    fee_numerator.clamp(MIN_FEE_NUMERATOR, MAX_FEE_NUMERATOR)
}

/// `cliff_fee_numerator - reduction_factor * period`, floored at the minimum fee
pub(crate) fn get_linear_fee_in_period(
    cliff_fee_numerator: u64,
    reduction_factor: u64,
    period: u64,
) -> Result<u64> {
    let reduction = u128::from(reduction_factor).safe_mul(u128::from(period))?;
    let fee_numerator = u128::from(cliff_fee_numerator).saturating_sub(reduction);
    let fee_numerator: u64 = fee_numerator.safe_cast()?;
    Ok(clamp_fee_numerator(fee_numerator))
}

/// `cliff_fee_numerator * (1 - reduction_factor / 10_000) ^ period`, floored at the minimum fee
pub(crate) fn get_exponential_fee_in_period(
    cliff_fee_numerator: u64,
    reduction_factor: u64,
    period: u64,
) -> Result<u64> {
    if period == 0 || reduction_factor == 0 {
        return Ok(clamp_fee_numerator(cliff_fee_numerator));
    }
    require!(
        reduction_factor < MAX_BASIS_POINT,
        PoolError::InvalidParameters
    );
    let reduction = u128::from(reduction_factor)
        .safe_shl(64)?
        .safe_div(u128::from(MAX_BASIS_POINT))?;
    let base = ONE_Q64.safe_sub(reduction)?;
    let factor = pow_q64(base, period)?;

    let fee_numerator: u64 = U256::from(cliff_fee_numerator)
        .safe_mul(U256::from(factor))?
        .safe_shr(64)?
        .safe_cast()?;
    Ok(clamp_fee_numerator(fee_numerator))
}

/// base ^ exp for a Q64.64 base below one, rounded down at every step
fn pow_q64(base: u128, exp: u64) -> Result<u128> {
    let mut result = ONE_Q64;
    let mut base = base;
    let mut exp = exp;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.safe_mul(base)?.safe_shr(64)?;
        }
        exp >>= 1;
        if exp > 0 {
            base = base.safe_mul(base)?.safe_shr(64)?;
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::assert_pool_error;

    fn time_scheduler_params(mode: BaseFeeMode) -> FeeTimeSchedulerParameters {
        FeeTimeSchedulerParameters {
            cliff_fee_numerator: 500_000_000,
            number_of_period: 120,
            period_frequency: 60,
            reduction_factor: 265,
            base_fee_mode: mode as u8,
            padding: [0; 3],
        }
    }

    // Frozen encodings, these bytes must never change
    const TIME_SCHEDULER_BORSH: [u8; 30] = [
        0x00, 0x65, 0xCD, 0x1D, 0x00, 0x00, 0x00, 0x00, // cliff_fee_numerator
        0x78, 0x00, // number_of_period
        0x3C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // period_frequency
        0x09, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // reduction_factor
        0x01, // base_fee_mode
        0x00, 0x00, 0x00, // padding
    ];

    const TIME_SCHEDULER_POD: [u8; 32] = [
        0x00, 0x65, 0xCD, 0x1D, 0x00, 0x00, 0x00, 0x00, // cliff_fee_numerator
        0x01, // base_fee_mode
        0x00, 0x00, 0x00, 0x00, 0x00, // padding
        0x78, 0x00, // number_of_period
        0x3C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // period_frequency
        0x09, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // reduction_factor
    ];

    const RATE_LIMITER_BORSH: [u8; 30] = [
        0x40, 0x42, 0x0F, 0x00, 0x00, 0x00, 0x00, 0x00, // cliff_fee_numerator
        0x14, 0x00, // fee_increment_bps
        0x2C, 0x01, 0x00, 0x00, // max_limiter_duration
        0xA0, 0x0F, 0x00, 0x00, // max_fee_bps
        0x00, 0xF2, 0x05, 0x2A, 0x01, 0x00, 0x00, 0x00, // reference_amount
        0x02, // base_fee_mode
        0x00, 0x00, 0x00, // padding
    ];

    const RATE_LIMITER_POD: [u8; 32] = [
        0x40, 0x42, 0x0F, 0x00, 0x00, 0x00, 0x00, 0x00, // cliff_fee_numerator
        0x02, // base_fee_mode
        0x00, 0x00, 0x00, 0x00, 0x00, // padding
        0x14, 0x00, // fee_increment_bps
        0x2C, 0x01, 0x00, 0x00, // max_limiter_duration
        0xA0, 0x0F, 0x00, 0x00, // max_fee_bps
        0x00, 0xF2, 0x05, 0x2A, 0x01, 0x00, 0x00, 0x00, // reference_amount
    ];

    const MARKET_CAP_BORSH: [u8; 30] = [
        0x40, 0x42, 0x0F, 0x00, 0x00, 0x00, 0x00, 0x00, // cliff_fee_numerator
        0x14, 0x00, // number_of_period
        0x2C, 0x01, 0x00, 0x00, // sqrt_price_step_bps
        0x20, 0x03, 0x00, 0x00, // scheduler_expiration_duration
        0x0F, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // reduction_factor
        0x04, // base_fee_mode
        0x00, 0x00, 0x00, // padding
    ];

    const MARKET_CAP_POD: [u8; 32] = [
        0x40, 0x42, 0x0F, 0x00, 0x00, 0x00, 0x00, 0x00, // cliff_fee_numerator
        0x04, // base_fee_mode
        0x00, 0x00, 0x00, 0x00, 0x00, // padding
        0x14, 0x00, // number_of_period
        0x2C, 0x01, 0x00, 0x00, // sqrt_price_step_bps
        0x20, 0x03, 0x00, 0x00, // scheduler_expiration_duration
        0x0F, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // reduction_factor
    ];

    #[test]
    fn test_time_scheduler_fixture() {
        let params = time_scheduler_params(BaseFeeMode::FeeTimeSchedulerExponential)
            .to_base_fee_parameters()
            .unwrap();
        assert_eq!(params.data, TIME_SCHEDULER_BORSH);
        assert_eq!(
            params.get_base_fee_mode().unwrap(),
            BaseFeeMode::FeeTimeSchedulerExponential
        );

        let info = params.to_base_fee_info().unwrap();
        assert_eq!(info.data, TIME_SCHEDULER_POD);
        assert_eq!(info.to_base_fee_parameters().unwrap(), params);
    }

    #[test]
    fn test_rate_limiter_fixture() {
        let params = BaseFeeParameters {
            data: RATE_LIMITER_BORSH,
        };
        let BaseFee::RateLimiter(limiter) = params.to_base_fee().unwrap() else {
            panic!("expected rate limiter");
        };
        assert_eq!(limiter.cliff_fee_numerator, 1_000_000);
        assert_eq!(limiter.fee_increment_bps, 20);
        assert_eq!(limiter.max_limiter_duration, 300);
        assert_eq!(limiter.max_fee_bps, 4000);
        assert_eq!(limiter.reference_amount, 5_000_000_000);

        let info = params.to_base_fee_info().unwrap();
        assert_eq!(info.data, RATE_LIMITER_POD);
        assert_eq!(info.to_base_fee_parameters().unwrap().data, RATE_LIMITER_BORSH);
    }

    #[test]
    fn test_market_cap_fixture() {
        let info = BaseFeeInfo {
            data: MARKET_CAP_POD,
        };
        let BaseFee::MarketCapScheduler(scheduler) = info.to_base_fee().unwrap() else {
            panic!("expected market cap scheduler");
        };
        assert_eq!(scheduler.cliff_fee_numerator, 1_000_000);
        assert_eq!(scheduler.number_of_period, 20);
        assert_eq!(scheduler.sqrt_price_step_bps, 300);
        assert_eq!(scheduler.scheduler_expiration_duration, 800);
        assert_eq!(scheduler.reduction_factor, 271);
        assert_eq!(info.to_base_fee_parameters().unwrap().data, MARKET_CAP_BORSH);
    }

    #[test]
    fn test_mode_offsets_are_fixed() {
        for (borsh, pod) in [
            (TIME_SCHEDULER_BORSH, TIME_SCHEDULER_POD),
            (RATE_LIMITER_BORSH, RATE_LIMITER_POD),
            (MARKET_CAP_BORSH, MARKET_CAP_POD),
        ] {
            assert_eq!(
                borsh[BaseFeeParameters::BASE_FEE_MODE_OFFSET],
                pod[BaseFeeInfo::BASE_FEE_MODE_OFFSET]
            );
        }
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let mut data = TIME_SCHEDULER_BORSH;
        data[BaseFeeParameters::BASE_FEE_MODE_OFFSET] = 5;
        assert_pool_error(
            BaseFeeParameters { data }.to_base_fee(),
            PoolError::InvalidBaseFeeMode,
        );
    }

    #[test]
    fn test_update_cliff_fee_numerator_keeps_shape() {
        let mut info = BaseFeeInfo {
            data: RATE_LIMITER_POD,
        };
        info.update_cliff_fee_numerator(2_000_000).unwrap();
        let BaseFee::RateLimiter(limiter) = info.to_base_fee().unwrap() else {
            panic!("expected rate limiter");
        };
        assert_eq!(limiter.cliff_fee_numerator, 2_000_000);
        assert_eq!(limiter.reference_amount, 5_000_000_000);
        assert_eq!(&info.data[8..], &RATE_LIMITER_POD[8..]);
    }

    #[test]
    fn test_exponential_decay() {
        // 50% per period
        assert_eq!(get_exponential_fee_in_period(80_000_000, 5_000, 1).unwrap(), 40_000_000);
        assert_eq!(get_exponential_fee_in_period(80_000_000, 5_000, 3).unwrap(), 10_000_000);
        assert_eq!(get_exponential_fee_in_period(80_000_000, 5_000, 0).unwrap(), 80_000_000);
        // floored at the minimum fee
        assert_eq!(
            get_exponential_fee_in_period(80_000_000, 5_000, 60).unwrap(),
            MIN_FEE_NUMERATOR
        );
    }

    #[test]
    fn test_linear_decay_floors_at_minimum() {
        assert_eq!(get_linear_fee_in_period(10_000_000, 1_000_000, 3).unwrap(), 7_000_000);
        assert_eq!(
            get_linear_fee_in_period(10_000_000, 1_000_000, 100).unwrap(),
            MIN_FEE_NUMERATOR
        );
    }
}
