use anchor_lang::prelude::*;

use crate::{
    base_fee::{BaseFee, BaseFeeContext, BaseFeeInfo, BaseFeeParameters},
    constants::fee::{FEE_DENOMINATOR, MAX_FEE_NUMERATOR},
    dynamic_fee::{DynamicFeeParameters, DynamicFeeStruct},
    safe_math::SafeMath,
    state::{ActivationType, CollectFeeMode, TradeDirection},
    utils::{safe_mul_div_cast_u64, Rounding},
    PoolError,
};

/// Fee configuration as supplied by a config or a pool creator
#[derive(Clone, Debug, Default, PartialEq, AnchorSerialize, AnchorDeserialize)]
pub struct PoolFeeParameters {
    pub base_fee: BaseFeeParameters,
    pub dynamic_fee: Option<DynamicFeeParameters>,
}

impl PoolFeeParameters {
    pub fn validate(
        &self,
        collect_fee_mode: CollectFeeMode,
        activation_type: ActivationType,
    ) -> Result<()> {
        self.base_fee
            .to_base_fee()?
            .handler()
            .validate(collect_fee_mode, activation_type)?;
        if let Some(dynamic_fee) = &self.dynamic_fee {
            dynamic_fee.validate()?;
        }
        Ok(())
    }

    pub fn to_pool_fees_struct(
        &self,
        protocol_fee_percent: u8,
        partner_fee_percent: u8,
        referral_fee_percent: u8,
    ) -> Result<PoolFeesStruct> {
        Ok(PoolFeesStruct {
            base_fee: self.base_fee.to_base_fee_info()?,
            protocol_fee_percent,
            partner_fee_percent,
            referral_fee_percent,
            dynamic_fee: self
                .dynamic_fee
                .map(|dynamic_fee| dynamic_fee.to_dynamic_fee_struct())
                .unwrap_or_default(),
        })
    }
}

/// Fee state stored on the pool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct PoolFeesStruct {
    pub base_fee: BaseFeeInfo,
    pub protocol_fee_percent: u8,
    pub partner_fee_percent: u8,
    pub referral_fee_percent: u8,
    pub dynamic_fee: DynamicFeeStruct,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeOnAmountResult {
    /// Amount left after the trading fee
    pub amount: u64,
    pub lp_fee: u64,
    pub protocol_fee: u64,
    pub partner_fee: u64,
    pub referral_fee: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitFees {
    pub lp_fee: u64,
    pub protocol_fee: u64,
    pub partner_fee: u64,
    pub referral_fee: u64,
}

impl PoolFeesStruct {
    pub fn get_base_fee(&self) -> Result<BaseFee> {
        self.base_fee.to_base_fee()
    }

    fn get_total_fee_numerator(&self, base_fee_numerator: u64) -> Result<u64> {
        let variable_fee_numerator = self.dynamic_fee.get_capped_variable_fee(base_fee_numerator)?;
        let total_fee_numerator = base_fee_numerator.safe_add(variable_fee_numerator)?;
        Ok(total_fee_numerator.min(MAX_FEE_NUMERATOR))
    }

    /// Trading fee numerator for a fee leg amount that still contains the fee
    pub fn get_total_trading_fee_from_included_fee_amount(
        &self,
        context: &BaseFeeContext,
        included_fee_amount: u64,
    ) -> Result<u64> {
        let base_fee_numerator = self
            .get_base_fee()?
            .handler()
            .get_base_fee_numerator_from_included_fee_amount(context, included_fee_amount)?;
        self.get_total_fee_numerator(base_fee_numerator)
    }

    /// Trading fee numerator for a fee leg amount that is already net of the fee
    pub fn get_total_trading_fee_from_excluded_fee_amount(
        &self,
        context: &BaseFeeContext,
        excluded_fee_amount: u64,
    ) -> Result<u64> {
        let base_fee_numerator = self
            .get_base_fee()?
            .handler()
            .get_base_fee_numerator_from_excluded_fee_amount(context, excluded_fee_amount)?;
        self.get_total_fee_numerator(base_fee_numerator)
    }

    pub fn get_fee_on_amount(
        &self,
        amount: u64,
        trade_fee_numerator: u64,
        has_referral: bool,
        has_partner: bool,
    ) -> Result<FeeOnAmountResult> {
        let (amount, trading_fee) = get_excluded_fee_amount(trade_fee_numerator, amount)?;
        let SplitFees {
            lp_fee,
            protocol_fee,
            partner_fee,
            referral_fee,
        } = self.split_fees(trading_fee, has_referral, has_partner)?;
        Ok(FeeOnAmountResult {
            amount,
            lp_fee,
            protocol_fee,
            partner_fee,
            referral_fee,
        })
    }

    /// Split a trading fee between liquidity providers, protocol, partner and referral
    ///
    /// The referral cut comes out of the protocol share and the partner cut out
    /// of the liquidity provider share. Percentages are of the whole fee.
    pub fn split_fees(
        &self,
        trading_fee: u64,
        has_referral: bool,
        has_partner: bool,
    ) -> Result<SplitFees> {
        let mut protocol_fee = percent_of(trading_fee, self.protocol_fee_percent)?;
        let referral_fee = if has_referral {
            let referral_fee = percent_of(trading_fee, self.referral_fee_percent)?;
            protocol_fee = protocol_fee.safe_sub(referral_fee)?;
            referral_fee
        } else {
            0
        };
        let partner_fee = if has_partner {
            percent_of(trading_fee, self.partner_fee_percent)?
        } else {
            0
        };
        let lp_fee = trading_fee
            .safe_sub(protocol_fee)?
            .safe_sub(referral_fee)?
            .safe_sub(partner_fee)?;
        Ok(SplitFees {
            lp_fee,
            protocol_fee,
            partner_fee,
            referral_fee,
        })
    }

    /// Base fee window is over, the cliff may be replaced
    pub fn is_base_fee_static(&self, current_point: u64, activation_point: u64) -> Result<bool> {
        self.get_base_fee()?
            .handler()
            .validate_base_fee_is_static(current_point, activation_point)
    }

    pub fn update_dynamic_fee(&mut self, dynamic_fee: Option<DynamicFeeParameters>) {
        self.dynamic_fee = dynamic_fee
            .map(|dynamic_fee| dynamic_fee.to_dynamic_fee_struct())
            .unwrap_or_default();
    }
}

fn percent_of(amount: u64, percent: u8) -> Result<u64> {
    safe_mul_div_cast_u64(amount, percent.into(), 100, Rounding::Down)
}

/// Net amount and fee when `included_fee_amount` pays a trading fee
///
/// # Returns
/// `(excluded_fee_amount, trading_fee)`, fee rounded up
pub fn get_excluded_fee_amount(trade_fee_numerator: u64, included_fee_amount: u64) -> Result<(u64, u64)> {
    let trading_fee = safe_mul_div_cast_u64(
        included_fee_amount,
        trade_fee_numerator,
        FEE_DENOMINATOR,
        Rounding::Up,
    )?;
    let excluded_fee_amount = included_fee_amount.safe_sub(trading_fee)?;
    Ok((excluded_fee_amount, trading_fee))
}

/// Gross amount whose net after the trading fee covers `excluded_fee_amount`
///
/// # Returns
/// `(included_fee_amount, trading_fee)`
pub fn get_included_fee_amount(trade_fee_numerator: u64, excluded_fee_amount: u64) -> Result<(u64, u64)> {
    let included_fee_amount = safe_mul_div_cast_u64(
        excluded_fee_amount,
        FEE_DENOMINATOR,
        FEE_DENOMINATOR.safe_sub(trade_fee_numerator)?,
        Rounding::Up,
    )?;
    let trading_fee = included_fee_amount.safe_sub(excluded_fee_amount)?;

    let (inverse_amount, _) = get_excluded_fee_amount(trade_fee_numerator, included_fee_amount)?;
    require!(
        inverse_amount >= excluded_fee_amount,
        PoolError::UndeterminedError
    );
    Ok((included_fee_amount, trading_fee))
}

/// Where the trading fee of a swap is taken
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeMode {
    pub fees_on_input: bool,
    pub fees_on_token_a: bool,
    pub has_referral: bool,
}

impl FeeMode {
    pub fn get_fee_mode(
        collect_fee_mode: CollectFeeMode,
        trade_direction: TradeDirection,
        has_referral: bool,
    ) -> FeeMode {
        let (fees_on_input, fees_on_token_a) = match (collect_fee_mode, trade_direction) {
            (CollectFeeMode::BothToken, TradeDirection::AtoB) => (true, true),
            (CollectFeeMode::BothToken, TradeDirection::BtoA) => (true, false),
            (CollectFeeMode::OnlyB, TradeDirection::AtoB) => (false, false),
            (CollectFeeMode::OnlyB, TradeDirection::BtoA) => (true, false),
        };
        FeeMode {
            fees_on_input,
            fees_on_token_a,
            has_referral,
        }
    }
}
