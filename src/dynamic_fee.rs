use anchor_lang::prelude::*;

use crate::{
    constants::{
        fee::{DYNAMIC_FEE_SCALING_FACTOR, MAX_BASIS_POINT, MAX_DYNAMIC_FEE_PERCENT},
        BIN_STEP_BPS_DEFAULT, BIN_STEP_BPS_U128_DEFAULT, MAX_PERCENTAGE, ONE_Q64,
    },
    safe_math::SafeMath,
    utils::{safe_shl_div_cast, Rounding},
    PoolError,
};

/// Volatility fee configuration supplied at pool creation or by an operator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct DynamicFeeParameters {
    pub bin_step: u16,
    pub bin_step_u128: u128,
    pub filter_period: u16,
    pub decay_period: u16,
    pub reduction_factor: u16,
    pub max_volatility_accumulator: u32,
    pub variable_fee_control: u32,
}

impl DynamicFeeParameters {
    pub fn validate(&self) -> Result<()> {
        require!(
            self.bin_step == BIN_STEP_BPS_DEFAULT
                && self.bin_step_u128 == BIN_STEP_BPS_U128_DEFAULT,
            PoolError::InvalidDynamicFeeParameters
        );
        require!(
            self.filter_period < self.decay_period,
            PoolError::InvalidDynamicFeeParameters
        );
        require!(
            u64::from(self.reduction_factor) <= MAX_BASIS_POINT,
            PoolError::InvalidDynamicFeeParameters
        );
        require!(
            self.max_volatility_accumulator > 0 && self.variable_fee_control > 0,
            PoolError::InvalidDynamicFeeParameters
        );
        Ok(())
    }

    pub fn to_dynamic_fee_struct(&self) -> DynamicFeeStruct {
        DynamicFeeStruct {
            initialized: 1,
            max_volatility_accumulator: self.max_volatility_accumulator,
            variable_fee_control: self.variable_fee_control,
            bin_step: self.bin_step,
            filter_period: self.filter_period,
            decay_period: self.decay_period,
            reduction_factor: self.reduction_factor,
            bin_step_u128: self.bin_step_u128,
            ..Default::default()
        }
    }
}

/// Volatility accumulator carried by the pool
///
/// Timestamps are unix seconds regardless of the pool activation type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct DynamicFeeStruct {
    pub initialized: u8,
    pub max_volatility_accumulator: u32,
    pub variable_fee_control: u32,
    pub bin_step: u16,
    pub filter_period: u16,
    pub decay_period: u16,
    pub reduction_factor: u16,
    pub last_update_timestamp: u64,
    pub bin_step_u128: u128,
    pub sqrt_price_reference: u128,
    pub volatility_accumulator: u128,
    pub volatility_reference: u128,
}

impl DynamicFeeStruct {
    pub fn is_dynamic_fee_enable(&self) -> bool {
        self.initialized != 0
    }

    pub fn to_dynamic_fee_parameters(&self) -> Option<DynamicFeeParameters> {
        if !self.is_dynamic_fee_enable() {
            return None;
        }
        Some(DynamicFeeParameters {
            bin_step: self.bin_step,
            bin_step_u128: self.bin_step_u128,
            filter_period: self.filter_period,
            decay_period: self.decay_period,
            reduction_factor: self.reduction_factor,
            max_volatility_accumulator: self.max_volatility_accumulator,
            variable_fee_control: self.variable_fee_control,
        })
    }

    /// Refresh the reference price and decay the volatility reference
    pub fn update_references(&mut self, sqrt_price_current: u128, current_timestamp: u64) -> Result<()> {
        let elapsed = current_timestamp.saturating_sub(self.last_update_timestamp);
        if elapsed >= u64::from(self.filter_period) {
            self.sqrt_price_reference = sqrt_price_current;
            if elapsed < u64::from(self.decay_period) {
                self.volatility_reference = self
                    .volatility_accumulator
                    .safe_mul(self.reduction_factor.into())?
                    .safe_div(u128::from(MAX_BASIS_POINT))?;
            } else {
                self.volatility_reference = 0;
            }
        }
        Ok(())
    }

    pub fn update_volatility_accumulator(&mut self, sqrt_price: u128) -> Result<()> {
        let delta_bin_id =
            get_delta_bin_id(self.bin_step_u128, sqrt_price, self.sqrt_price_reference)?;
        let volatility_accumulator = self
            .volatility_reference
            .safe_add(delta_bin_id.safe_mul(u128::from(MAX_BASIS_POINT))?)?;
        self.volatility_accumulator =
            volatility_accumulator.min(u128::from(self.max_volatility_accumulator));
        Ok(())
    }

    /// Uncapped variable fee numerator
    pub fn get_variable_fee(&self) -> Result<u128> {
        if !self.is_dynamic_fee_enable() {
            return Ok(0);
        }
        let square_vfa_bin = self
            .volatility_accumulator
            .safe_mul(self.bin_step.into())?
            .checked_pow(2)
            .ok_or(PoolError::MathOverflow)?;
        let v_fee = square_vfa_bin.safe_mul(self.variable_fee_control.into())?;
        Ok(v_fee
            .safe_add(DYNAMIC_FEE_SCALING_FACTOR - 1)?
            .safe_div(DYNAMIC_FEE_SCALING_FACTOR)?)
    }

    /// Variable fee numerator, bounded by a share of the base fee
    pub fn get_capped_variable_fee(&self, base_fee_numerator: u64) -> Result<u64> {
        let cap = u128::from(base_fee_numerator)
            .safe_mul(MAX_DYNAMIC_FEE_PERCENT.into())?
            .safe_div(MAX_PERCENTAGE.into())?;
        let variable_fee = self.get_variable_fee()?.min(cap);
        Ok(u64::try_from(variable_fee).map_err(|_| PoolError::TypeCastFailed)?)
    }
}

/// Number of bins between two prices, doubled since prices are square roots
pub fn get_delta_bin_id(bin_step_u128: u128, sqrt_price_a: u128, sqrt_price_b: u128) -> Result<u128> {
    let (upper_sqrt_price, lower_sqrt_price) = if sqrt_price_a > sqrt_price_b {
        (sqrt_price_a, sqrt_price_b)
    } else {
        (sqrt_price_b, sqrt_price_a)
    };
    if lower_sqrt_price == 0 {
        return Ok(0);
    }
    let price_ratio = safe_shl_div_cast(upper_sqrt_price, lower_sqrt_price, 64, Rounding::Down)?;
    let delta_bin_id = price_ratio.safe_sub(ONE_Q64)?.safe_div(bin_step_u128)?;
    Ok(delta_bin_id.safe_mul(2)?)
}
