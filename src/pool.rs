use anchor_lang::prelude::*;
use ethnum::U256;

use crate::{
    base_fee::BaseFeeContext,
    constants::{
        fee::{
            MAX_FEE_NUMERATOR_POST_UPDATE, PARTNER_FEE_PERCENT, PROTOCOL_FEE_PERCENT,
            REFERRAL_FEE_PERCENT,
        },
        LIQUIDITY_SCALE, NUM_REWARDS,
    },
    curve::{
        get_delta_amount_a_unsigned, get_delta_amount_a_unsigned_unchecked,
        get_delta_amount_b_unsigned, get_delta_amount_b_unsigned_unchecked,
        get_initialize_amounts, get_next_sqrt_price_from_input, get_next_sqrt_price_from_output,
    },
    dynamic_fee::get_delta_bin_id,
    events::{EvtClaimPartnerFee, EvtInitializePool},
    fee::{get_included_fee_amount, FeeMode, FeeOnAmountResult, PoolFeeParameters, PoolFeesStruct, SplitFees},
    liquidity::{PositionId, PositionLedger},
    operator::UpdatePoolFeesParameters,
    position::Position,
    reward::RewardInfo,
    safe_math::{SafeCast, SafeMath},
    state::{
        get_current_timestamp, validate_fee_split, validate_price_range, ActivationType,
        CollectFeeMode, Config, ConfigType, PoolStatus, PoolType, TradeDirection,
    },
    utils::{u256_from_bytes, u256_to_bytes, Rounding, TokenTransferFees},
    PoolError,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct PoolMetrics {
    pub total_lp_a_fee: u128,
    pub total_lp_b_fee: u128,
    pub total_protocol_a_fee: u64,
    pub total_protocol_b_fee: u64,
    pub total_partner_a_fee: u64,
    pub total_partner_b_fee: u64,
    pub total_position: u64,
}

impl PoolMetrics {
    pub fn accumulate_fee(
        &mut self,
        lp_fee: u64,
        protocol_fee: u64,
        partner_fee: u64,
        is_token_a: bool,
    ) -> Result<()> {
        if is_token_a {
            self.total_lp_a_fee = self.total_lp_a_fee.safe_add(lp_fee.into())?;
            self.total_protocol_a_fee = self.total_protocol_a_fee.safe_add(protocol_fee)?;
            self.total_partner_a_fee = self.total_partner_a_fee.safe_add(partner_fee)?;
        } else {
            self.total_lp_b_fee = self.total_lp_b_fee.safe_add(lp_fee.into())?;
            self.total_protocol_b_fee = self.total_protocol_b_fee.safe_add(protocol_fee)?;
            self.total_partner_b_fee = self.total_partner_b_fee.safe_add(partner_fee)?;
        }
        Ok(())
    }
}

/// Outcome of a swap against the curve, before token transfer fees
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct SwapResult2 {
    pub included_fee_input_amount: u64,
    pub excluded_fee_input_amount: u64,
    /// Input a partial fill could not consume
    pub amount_left: u64,
    pub output_amount: u64,
    pub next_sqrt_price: u128,
    pub lp_fee: u64,
    pub protocol_fee: u64,
    pub partner_fee: u64,
    pub referral_fee: u64,
}

struct SwapAmountFromInput {
    output_amount: u64,
    next_sqrt_price: u128,
    amount_left: u64,
}

struct SwapAmountFromOutput {
    input_amount: u64,
    next_sqrt_price: u128,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct Pool {
    pub pool_fees: PoolFeesStruct,
    pub token_a_mint: Pubkey,
    pub token_b_mint: Pubkey,
    pub token_a_vault: Pubkey,
    pub token_b_vault: Pubkey,
    /// Receives the partner fee share, default when the pool has no partner
    pub partner: Pubkey,
    pub creator: Pubkey,
    pub config: Pubkey,
    pub liquidity: u128,
    pub permanent_lock_liquidity: u128,
    pub protocol_a_fee: u64,
    pub protocol_b_fee: u64,
    pub partner_a_fee: u64,
    pub partner_b_fee: u64,
    pub sqrt_min_price: u128,
    pub sqrt_max_price: u128,
    pub sqrt_price: u128,
    /// Reference price of the market cap scheduler
    pub init_sqrt_price: u128,
    pub activation_point: u64,
    pub activation_type: u8,
    pub pool_status: u8,
    pub collect_fee_mode: u8,
    pub pool_type: u8,
    /// Q128 per unit of Q64 liquidity
    pub fee_a_per_liquidity: [u8; 32],
    pub fee_b_per_liquidity: [u8; 32],
    pub metrics: PoolMetrics,
    pub reward_infos: [RewardInfo; NUM_REWARDS],
}

impl Pool {
    pub fn get_activation_type(&self) -> Result<ActivationType> {
        ActivationType::from_u8_checked(self.activation_type)
    }

    pub fn get_collect_fee_mode(&self) -> Result<CollectFeeMode> {
        CollectFeeMode::from_u8_checked(self.collect_fee_mode)
    }

    pub fn get_pool_status(&self) -> Result<PoolStatus> {
        PoolStatus::from_u8_checked(self.pool_status)
    }

    pub fn is_enabled(&self) -> Result<bool> {
        Ok(self.get_pool_status()? == PoolStatus::Enable)
    }

    pub fn get_current_point(&self, clock: &Clock) -> Result<u64> {
        self.get_activation_type()?.get_current_point(clock)
    }

    pub fn has_partner(&self) -> bool {
        self.partner != Pubkey::default()
    }

    pub fn fee_a_per_liquidity(&self) -> U256 {
        u256_from_bytes(&self.fee_a_per_liquidity)
    }

    pub fn fee_b_per_liquidity(&self) -> U256 {
        u256_from_bytes(&self.fee_b_per_liquidity)
    }

    pub fn base_fee_context(&self, current_point: u64, trade_direction: TradeDirection) -> BaseFeeContext {
        BaseFeeContext {
            current_point,
            activation_point: self.activation_point,
            trade_direction,
            init_sqrt_price: self.init_sqrt_price,
            current_sqrt_price: self.sqrt_price,
        }
    }

    /// Swap a gross input amount, failing if the price would leave the pool range
    pub fn get_swap_result_from_exact_input(
        &self,
        amount_in: u64,
        fee_mode: &FeeMode,
        trade_direction: TradeDirection,
        current_point: u64,
    ) -> Result<SwapResult2> {
        let context = self.base_fee_context(current_point, trade_direction);
        let trade_fee_numerator = self
            .pool_fees
            .get_total_trading_fee_from_included_fee_amount(&context, amount_in)?;

        let mut fees = SplitFees::default();
        let excluded_fee_input_amount = if fee_mode.fees_on_input {
            let result = self.take_fee(amount_in, trade_fee_numerator, fee_mode, &mut fees)?;
            result.amount
        } else {
            amount_in
        };

        let SwapAmountFromInput {
            output_amount,
            next_sqrt_price,
            ..
        } = match trade_direction {
            TradeDirection::AtoB => self.calculate_a_to_b_from_amount_in(excluded_fee_input_amount)?,
            TradeDirection::BtoA => self.calculate_b_to_a_from_amount_in(excluded_fee_input_amount)?,
        };

        let output_amount = if fee_mode.fees_on_input {
            output_amount
        } else {
            self.take_fee(output_amount, trade_fee_numerator, fee_mode, &mut fees)?
                .amount
        };

        Ok(SwapResult2 {
            included_fee_input_amount: amount_in,
            excluded_fee_input_amount,
            amount_left: 0,
            output_amount,
            next_sqrt_price,
            lp_fee: fees.lp_fee,
            protocol_fee: fees.protocol_fee,
            partner_fee: fees.partner_fee,
            referral_fee: fees.referral_fee,
        })
    }

    /// Swap a gross input amount, stopping at the price bound
    ///
    /// Whatever the curve cannot absorb before the bound is reported as
    /// `amount_left` and is not charged.
    pub fn get_swap_result_from_partial_input(
        &self,
        amount_in: u64,
        fee_mode: &FeeMode,
        trade_direction: TradeDirection,
        current_point: u64,
    ) -> Result<SwapResult2> {
        require!(self.liquidity > 0, PoolError::InsufficientLiquidity);
        let context = self.base_fee_context(current_point, trade_direction);
        let trade_fee_numerator = self
            .pool_fees
            .get_total_trading_fee_from_included_fee_amount(&context, amount_in)?;

        let mut fees = SplitFees::default();
        let mut excluded_fee_input_amount = if fee_mode.fees_on_input {
            self.take_fee(amount_in, trade_fee_numerator, fee_mode, &mut fees)?
                .amount
        } else {
            amount_in
        };

        let SwapAmountFromInput {
            output_amount,
            next_sqrt_price,
            amount_left,
        } = match trade_direction {
            TradeDirection::AtoB => {
                self.calculate_a_to_b_from_partial_amount_in(excluded_fee_input_amount)?
            }
            TradeDirection::BtoA => {
                self.calculate_b_to_a_from_partial_amount_in(excluded_fee_input_amount)?
            }
        };

        let included_fee_input_amount = if amount_left > 0 {
            excluded_fee_input_amount = excluded_fee_input_amount.safe_sub(amount_left)?;
            if fee_mode.fees_on_input {
                let (included_fee_input_amount, trading_fee) =
                    get_included_fee_amount(trade_fee_numerator, excluded_fee_input_amount)?;
                fees = self.pool_fees.split_fees(
                    trading_fee,
                    fee_mode.has_referral,
                    self.has_partner(),
                )?;
                included_fee_input_amount
            } else {
                excluded_fee_input_amount
            }
        } else {
            amount_in
        };

        let output_amount = if fee_mode.fees_on_input {
            output_amount
        } else {
            self.take_fee(output_amount, trade_fee_numerator, fee_mode, &mut fees)?
                .amount
        };

        Ok(SwapResult2 {
            included_fee_input_amount,
            excluded_fee_input_amount,
            amount_left: amount_in.safe_sub(included_fee_input_amount)?,
            output_amount,
            next_sqrt_price,
            lp_fee: fees.lp_fee,
            protocol_fee: fees.protocol_fee,
            partner_fee: fees.partner_fee,
            referral_fee: fees.referral_fee,
        })
    }

    /// Swap for an exact net output, deriving the gross input
    pub fn get_swap_result_from_exact_output(
        &self,
        amount_out: u64,
        fee_mode: &FeeMode,
        trade_direction: TradeDirection,
        current_point: u64,
    ) -> Result<SwapResult2> {
        let context = self.base_fee_context(current_point, trade_direction);
        let mut fees = SplitFees::default();

        let included_fee_amount_out = if fee_mode.fees_on_input {
            amount_out
        } else {
            let trade_fee_numerator = self
                .pool_fees
                .get_total_trading_fee_from_excluded_fee_amount(&context, amount_out)?;
            let (included_fee_amount_out, trading_fee) =
                get_included_fee_amount(trade_fee_numerator, amount_out)?;
            fees = self
                .pool_fees
                .split_fees(trading_fee, fee_mode.has_referral, self.has_partner())?;
            included_fee_amount_out
        };

        let SwapAmountFromOutput {
            input_amount,
            next_sqrt_price,
        } = match trade_direction {
            TradeDirection::AtoB => self.calculate_a_to_b_from_amount_out(included_fee_amount_out)?,
            TradeDirection::BtoA => self.calculate_b_to_a_from_amount_out(included_fee_amount_out)?,
        };

        let included_fee_input_amount = if fee_mode.fees_on_input {
            let trade_fee_numerator = self
                .pool_fees
                .get_total_trading_fee_from_excluded_fee_amount(&context, input_amount)?;
            let (included_fee_input_amount, trading_fee) =
                get_included_fee_amount(trade_fee_numerator, input_amount)?;
            fees = self
                .pool_fees
                .split_fees(trading_fee, fee_mode.has_referral, self.has_partner())?;
            included_fee_input_amount
        } else {
            input_amount
        };

        Ok(SwapResult2 {
            included_fee_input_amount,
            excluded_fee_input_amount: input_amount,
            amount_left: 0,
            output_amount: amount_out,
            next_sqrt_price,
            lp_fee: fees.lp_fee,
            protocol_fee: fees.protocol_fee,
            partner_fee: fees.partner_fee,
            referral_fee: fees.referral_fee,
        })
    }

    fn take_fee(
        &self,
        amount: u64,
        trade_fee_numerator: u64,
        fee_mode: &FeeMode,
        fees: &mut SplitFees,
    ) -> Result<FeeOnAmountResult> {
        let result = self.pool_fees.get_fee_on_amount(
            amount,
            trade_fee_numerator,
            fee_mode.has_referral,
            self.has_partner(),
        )?;
        *fees = SplitFees {
            lp_fee: result.lp_fee,
            protocol_fee: result.protocol_fee,
            partner_fee: result.partner_fee,
            referral_fee: result.referral_fee,
        };
        Ok(result)
    }

    fn calculate_a_to_b_from_amount_in(&self, amount_in: u64) -> Result<SwapAmountFromInput> {
        let next_sqrt_price =
            get_next_sqrt_price_from_input(self.sqrt_price, self.liquidity, amount_in, true)?;
        require!(
            next_sqrt_price >= self.sqrt_min_price,
            PoolError::PriceRangeViolation
        );
        let output_amount = get_delta_amount_b_unsigned(
            next_sqrt_price,
            self.sqrt_price,
            self.liquidity,
            Rounding::Down,
        )?;
        Ok(SwapAmountFromInput {
            output_amount,
            next_sqrt_price,
            amount_left: 0,
        })
    }

    fn calculate_b_to_a_from_amount_in(&self, amount_in: u64) -> Result<SwapAmountFromInput> {
        let next_sqrt_price =
            get_next_sqrt_price_from_input(self.sqrt_price, self.liquidity, amount_in, false)?;
        require!(
            next_sqrt_price <= self.sqrt_max_price,
            PoolError::PriceRangeViolation
        );
        let output_amount = get_delta_amount_a_unsigned(
            self.sqrt_price,
            next_sqrt_price,
            self.liquidity,
            Rounding::Down,
        )?;
        Ok(SwapAmountFromInput {
            output_amount,
            next_sqrt_price,
            amount_left: 0,
        })
    }

    fn calculate_a_to_b_from_partial_amount_in(&self, amount_in: u64) -> Result<SwapAmountFromInput> {
        let max_amount_in = get_delta_amount_a_unsigned_unchecked(
            self.sqrt_min_price,
            self.sqrt_price,
            self.liquidity,
            Rounding::Up,
        )?;
        let (consumed_in_amount, next_sqrt_price) = if U256::from(amount_in) >= max_amount_in {
            (max_amount_in.safe_cast()?, self.sqrt_min_price)
        } else {
            (
                amount_in,
                get_next_sqrt_price_from_input(self.sqrt_price, self.liquidity, amount_in, true)?,
            )
        };
        let output_amount = get_delta_amount_b_unsigned(
            next_sqrt_price,
            self.sqrt_price,
            self.liquidity,
            Rounding::Down,
        )?;
        Ok(SwapAmountFromInput {
            output_amount,
            next_sqrt_price,
            amount_left: amount_in.safe_sub(consumed_in_amount)?,
        })
    }

    fn calculate_b_to_a_from_partial_amount_in(&self, amount_in: u64) -> Result<SwapAmountFromInput> {
        let max_amount_in = get_delta_amount_b_unsigned_unchecked(
            self.sqrt_price,
            self.sqrt_max_price,
            self.liquidity,
            Rounding::Up,
        )?;
        let (consumed_in_amount, next_sqrt_price) = if U256::from(amount_in) >= max_amount_in {
            (max_amount_in.safe_cast()?, self.sqrt_max_price)
        } else {
            (
                amount_in,
                get_next_sqrt_price_from_input(self.sqrt_price, self.liquidity, amount_in, false)?,
            )
        };
        let output_amount = get_delta_amount_a_unsigned(
            self.sqrt_price,
            next_sqrt_price,
            self.liquidity,
            Rounding::Down,
        )?;
        Ok(SwapAmountFromInput {
            output_amount,
            next_sqrt_price,
            amount_left: amount_in.safe_sub(consumed_in_amount)?,
        })
    }

    fn calculate_a_to_b_from_amount_out(&self, amount_out: u64) -> Result<SwapAmountFromOutput> {
        let next_sqrt_price =
            get_next_sqrt_price_from_output(self.sqrt_price, self.liquidity, amount_out, true)?;
        require!(
            next_sqrt_price >= self.sqrt_min_price,
            PoolError::PriceRangeViolation
        );
        let input_amount = get_delta_amount_a_unsigned(
            next_sqrt_price,
            self.sqrt_price,
            self.liquidity,
            Rounding::Up,
        )?;
        Ok(SwapAmountFromOutput {
            input_amount,
            next_sqrt_price,
        })
    }

    fn calculate_b_to_a_from_amount_out(&self, amount_out: u64) -> Result<SwapAmountFromOutput> {
        let next_sqrt_price =
            get_next_sqrt_price_from_output(self.sqrt_price, self.liquidity, amount_out, false)?;
        require!(
            next_sqrt_price <= self.sqrt_max_price,
            PoolError::PriceRangeViolation
        );
        let input_amount = get_delta_amount_b_unsigned(
            self.sqrt_price,
            next_sqrt_price,
            self.liquidity,
            Rounding::Up,
        )?;
        Ok(SwapAmountFromOutput {
            input_amount,
            next_sqrt_price,
        })
    }

    /// Move the price and book every fee component of a swap
    pub fn apply_swap_result(
        &mut self,
        swap_result: &SwapResult2,
        fee_mode: &FeeMode,
        current_timestamp: u64,
    ) -> Result<()> {
        let old_sqrt_price = self.sqrt_price;
        self.sqrt_price = swap_result.next_sqrt_price;

        let fee_per_liquidity = U256::from(swap_result.lp_fee)
            .safe_shl(u32::from(LIQUIDITY_SCALE))?
            .safe_div(U256::from(self.liquidity))?;

        if fee_mode.fees_on_token_a {
            self.protocol_a_fee = self.protocol_a_fee.safe_add(swap_result.protocol_fee)?;
            self.partner_a_fee = self.partner_a_fee.safe_add(swap_result.partner_fee)?;
            self.fee_a_per_liquidity =
                u256_to_bytes(self.fee_a_per_liquidity().safe_add(fee_per_liquidity)?);
        } else {
            self.protocol_b_fee = self.protocol_b_fee.safe_add(swap_result.protocol_fee)?;
            self.partner_b_fee = self.partner_b_fee.safe_add(swap_result.partner_fee)?;
            self.fee_b_per_liquidity =
                u256_to_bytes(self.fee_b_per_liquidity().safe_add(fee_per_liquidity)?);
        }
        self.metrics.accumulate_fee(
            swap_result.lp_fee,
            swap_result.protocol_fee,
            swap_result.partner_fee,
            fee_mode.fees_on_token_a,
        )?;

        self.update_post_swap(old_sqrt_price, current_timestamp)
    }

    pub fn update_pre_swap(&mut self, current_timestamp: u64) -> Result<()> {
        if self.pool_fees.dynamic_fee.is_dynamic_fee_enable() {
            self.pool_fees
                .dynamic_fee
                .update_references(self.sqrt_price, current_timestamp)?;
        }
        Ok(())
    }

    pub fn update_post_swap(&mut self, old_sqrt_price: u128, current_timestamp: u64) -> Result<()> {
        let dynamic_fee = &mut self.pool_fees.dynamic_fee;
        if dynamic_fee.is_dynamic_fee_enable() {
            dynamic_fee.update_volatility_accumulator(self.sqrt_price)?;
            // the clock only advances once the price crosses a bin
            let delta_bin_id =
                get_delta_bin_id(dynamic_fee.bin_step_u128, old_sqrt_price, self.sqrt_price)?;
            if delta_bin_id > 0 {
                dynamic_fee.last_update_timestamp = current_timestamp;
            }
        }
        Ok(())
    }

    /// Token amounts matching `liquidity_delta` at the current price
    ///
    /// # Returns
    /// `(token_a_amount, token_b_amount)`
    pub fn get_amounts_for_modify_liquidity(
        &self,
        liquidity_delta: u128,
        round: Rounding,
    ) -> Result<(u64, u64)> {
        let amount_a = get_delta_amount_a_unsigned(
            self.sqrt_price,
            self.sqrt_max_price,
            liquidity_delta,
            round,
        )?;
        let amount_b = get_delta_amount_b_unsigned(
            self.sqrt_min_price,
            self.sqrt_price,
            liquidity_delta,
            round,
        )?;
        Ok((amount_a, amount_b))
    }

    pub fn apply_add_liquidity(&mut self, position: &mut Position, liquidity_delta: u128) -> Result<()> {
        position.add_liquidity(liquidity_delta)?;
        self.liquidity = self.liquidity.safe_add(liquidity_delta)?;
        Ok(())
    }

    pub fn apply_remove_liquidity(
        &mut self,
        position: &mut Position,
        liquidity_delta: u128,
    ) -> Result<()> {
        position.remove_unlocked_liquidity(liquidity_delta)?;
        self.liquidity = self.liquidity.safe_sub(liquidity_delta)?;
        Ok(())
    }

    pub fn accumulate_permanent_locked_liquidity(&mut self, liquidity: u128) -> Result<()> {
        self.permanent_lock_liquidity = self.permanent_lock_liquidity.safe_add(liquidity)?;
        Ok(())
    }

    /// Advance every running reward stream to `current_time`
    pub fn update_rewards(&mut self, current_time: u64) -> Result<()> {
        let liquidity = self.liquidity;
        for reward_info in self.reward_infos.iter_mut() {
            if !reward_info.initialized() {
                continue;
            }
            if liquidity > 0 {
                let reward_per_token_stored_delta = reward_info
                    .calculate_reward_per_token_stored_since_last_update(current_time, liquidity)?;
                reward_info.accumulate_reward_per_token_stored(reward_per_token_stored_delta)?;
            } else {
                let time_period = reward_info.get_seconds_elapsed_since_last_update(current_time)?;
                reward_info.cumulative_seconds_with_empty_liquidity_reward = reward_info
                    .cumulative_seconds_with_empty_liquidity_reward
                    .safe_add(time_period)?;
            }
            reward_info.update_last_update_time(current_time);
        }
        Ok(())
    }

    /// Bring the pending fees and rewards of a position up to date
    pub fn refresh_position(&mut self, position: &mut Position, current_time: u64) -> Result<()> {
        self.update_rewards(current_time)?;
        position.update_fee(self.fee_a_per_liquidity(), self.fee_b_per_liquidity())?;
        position.update_rewards(&self.reward_infos)
    }

    /// # Returns
    /// `(token_a_amount, token_b_amount)` withdrawn, each bounded by its maximum
    pub fn claim_protocol_fee(&mut self, max_amount_a: u64, max_amount_b: u64) -> Result<(u64, u64)> {
        let token_a_amount = self.protocol_a_fee.min(max_amount_a);
        let token_b_amount = self.protocol_b_fee.min(max_amount_b);
        self.protocol_a_fee = self.protocol_a_fee.safe_sub(token_a_amount)?;
        self.protocol_b_fee = self.protocol_b_fee.safe_sub(token_b_amount)?;
        Ok((token_a_amount, token_b_amount))
    }

    pub fn claim_partner_fee(&mut self, max_amount_a: u64, max_amount_b: u64) -> Result<(u64, u64)> {
        let token_a_amount = self.partner_a_fee.min(max_amount_a);
        let token_b_amount = self.partner_b_fee.min(max_amount_b);
        self.partner_a_fee = self.partner_a_fee.safe_sub(token_a_amount)?;
        self.partner_b_fee = self.partner_b_fee.safe_sub(token_b_amount)?;
        Ok((token_a_amount, token_b_amount))
    }

    /// Replace the cliff fee and/or the dynamic fee
    ///
    /// The cliff can only move once the base fee window has fully elapsed. A
    /// zeroed dynamic fee disables it, any other value replaces it and resets
    /// the volatility state.
    pub fn update_pool_fees(
        &mut self,
        params: &UpdatePoolFeesParameters,
        current_point: u64,
    ) -> Result<()> {
        if let Some(cliff_fee_numerator) = params.cliff_fee_numerator {
            require!(
                self.pool_fees
                    .is_base_fee_static(current_point, self.activation_point)?,
                PoolError::CannotUpdateBaseFee
            );
            require!(
                cliff_fee_numerator <= MAX_FEE_NUMERATOR_POST_UPDATE,
                PoolError::ExceedMaxFeeBps
            );
            self.pool_fees
                .base_fee
                .update_cliff_fee_numerator(cliff_fee_numerator)?;
            self.pool_fees
                .get_base_fee()?
                .handler()
                .validate(self.get_collect_fee_mode()?, self.get_activation_type()?)?;
        }

        if let Some(dynamic_fee) = params.dynamic_fee {
            if dynamic_fee == Default::default() {
                self.pool_fees.update_dynamic_fee(None);
            } else {
                dynamic_fee.validate()?;
                self.pool_fees.update_dynamic_fee(Some(dynamic_fee));
            }
        }
        Ok(())
    }
}

/// Addresses a new pool is bound to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolAccounts {
    pub pool: Pubkey,
    pub token_a_mint: Pubkey,
    pub token_b_mint: Pubkey,
    pub token_a_vault: Pubkey,
    pub token_b_vault: Pubkey,
    pub creator: Pubkey,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct InitializePoolParameters {
    pub liquidity: u128,
    pub sqrt_price: u128,
    pub activation_point: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, AnchorSerialize, AnchorDeserialize)]
pub struct InitializeCustomizablePoolParameters {
    pub pool_fees: PoolFeeParameters,
    pub sqrt_min_price: u128,
    pub sqrt_max_price: u128,
    pub liquidity: u128,
    pub sqrt_price: u128,
    pub activation_type: u8,
    pub collect_fee_mode: u8,
    pub activation_point: Option<u64>,
}

/// A created pool with the ledger holding its creator's first position
#[derive(Clone, Debug)]
pub struct InitializedPool {
    pub pool: Pool,
    pub ledger: PositionLedger,
    pub position: PositionId,
    /// Amounts deposited into the vaults
    pub token_a_amount: u64,
    pub token_b_amount: u64,
    /// Amounts the creator sends, transfer fees included
    pub included_token_a_amount: u64,
    pub included_token_b_amount: u64,
}

struct PoolPolicy {
    config: Pubkey,
    partner: Pubkey,
    pool_fees: PoolFeeParameters,
    protocol_fee_percent: u8,
    partner_fee_percent: u8,
    referral_fee_percent: u8,
    sqrt_min_price: u128,
    sqrt_max_price: u128,
    activation_type: u8,
    collect_fee_mode: u8,
    pool_type: PoolType,
}

/// Create a pool from a static config
///
/// When the config names a pool creator authority, only that identity may
/// create and it becomes the pool partner.
pub fn initialize_pool(
    config_key: &Pubkey,
    config: &mut Config,
    accounts: &PoolAccounts,
    params: &InitializePoolParameters,
    transfer_fees: &TokenTransferFees,
    clock: &Clock,
) -> Result<InitializedPool> {
    require!(
        config.get_config_type()? == ConfigType::Static,
        PoolError::InvalidConfigType
    );
    if config.has_pool_creator_authority() {
        require!(
            config.pool_creator_authority == accounts.creator,
            PoolError::InvalidAuthorityToCreateThePool
        );
    }
    let policy = PoolPolicy {
        config: *config_key,
        partner: config.pool_creator_authority,
        pool_fees: config.pool_fees.clone(),
        protocol_fee_percent: config.protocol_fee_percent,
        partner_fee_percent: config.partner_fee_percent,
        referral_fee_percent: config.referral_fee_percent,
        sqrt_min_price: config.sqrt_min_price,
        sqrt_max_price: config.sqrt_max_price,
        activation_type: config.activation_type,
        collect_fee_mode: config.collect_fee_mode,
        pool_type: PoolType::Permissionless,
    };
    let initialized = create_pool(
        accounts,
        policy,
        params.liquidity,
        params.sqrt_price,
        params.activation_point,
        transfer_fees,
        clock,
    )?;
    config.pool_count = config.pool_count.safe_add(1)?;
    Ok(initialized)
}

/// Create a pool from a dynamic config, its authority supplies the pool policy
pub fn initialize_pool_with_dynamic_config(
    config_key: &Pubkey,
    config: &mut Config,
    accounts: &PoolAccounts,
    params: &InitializeCustomizablePoolParameters,
    transfer_fees: &TokenTransferFees,
    clock: &Clock,
) -> Result<InitializedPool> {
    require!(
        config.get_config_type()? == ConfigType::Dynamic,
        PoolError::InvalidConfigType
    );
    require!(
        config.pool_creator_authority == accounts.creator,
        PoolError::InvalidAuthorityToCreateThePool
    );
    let policy = PoolPolicy {
        config: *config_key,
        partner: config.pool_creator_authority,
        pool_fees: params.pool_fees.clone(),
        protocol_fee_percent: config.protocol_fee_percent,
        partner_fee_percent: config.partner_fee_percent,
        referral_fee_percent: config.referral_fee_percent,
        sqrt_min_price: params.sqrt_min_price,
        sqrt_max_price: params.sqrt_max_price,
        activation_type: params.activation_type,
        collect_fee_mode: params.collect_fee_mode,
        pool_type: PoolType::Customizable,
    };
    let initialized = create_pool(
        accounts,
        policy,
        params.liquidity,
        params.sqrt_price,
        params.activation_point,
        transfer_fees,
        clock,
    )?;
    config.pool_count = config.pool_count.safe_add(1)?;
    Ok(initialized)
}

/// Create a pool without a config, using the default fee split and no partner
pub fn initialize_customizable_pool(
    accounts: &PoolAccounts,
    params: &InitializeCustomizablePoolParameters,
    transfer_fees: &TokenTransferFees,
    clock: &Clock,
) -> Result<InitializedPool> {
    let policy = PoolPolicy {
        config: Pubkey::default(),
        partner: Pubkey::default(),
        pool_fees: params.pool_fees.clone(),
        protocol_fee_percent: PROTOCOL_FEE_PERCENT,
        partner_fee_percent: PARTNER_FEE_PERCENT,
        referral_fee_percent: REFERRAL_FEE_PERCENT,
        sqrt_min_price: params.sqrt_min_price,
        sqrt_max_price: params.sqrt_max_price,
        activation_type: params.activation_type,
        collect_fee_mode: params.collect_fee_mode,
        pool_type: PoolType::Customizable,
    };
    create_pool(
        accounts,
        policy,
        params.liquidity,
        params.sqrt_price,
        params.activation_point,
        transfer_fees,
        clock,
    )
}

fn create_pool(
    accounts: &PoolAccounts,
    policy: PoolPolicy,
    liquidity: u128,
    sqrt_price: u128,
    activation_point: Option<u64>,
    transfer_fees: &TokenTransferFees,
    clock: &Clock,
) -> Result<InitializedPool> {
    require!(
        accounts.token_a_mint != accounts.token_b_mint,
        PoolError::SameTokenMint
    );
    validate_price_range(policy.sqrt_min_price, policy.sqrt_max_price)?;
    require!(
        sqrt_price >= policy.sqrt_min_price && sqrt_price <= policy.sqrt_max_price,
        PoolError::InvalidPriceRange
    );
    require!(liquidity > 0, PoolError::InvalidMinimumLiquidity);

    let activation_type = ActivationType::from_u8_checked(policy.activation_type)?;
    let collect_fee_mode = CollectFeeMode::from_u8_checked(policy.collect_fee_mode)?;
    validate_fee_split(
        policy.protocol_fee_percent,
        policy.partner_fee_percent,
        policy.referral_fee_percent,
    )?;
    policy.pool_fees.validate(collect_fee_mode, activation_type)?;

    let current_point = activation_type.get_current_point(clock)?;
    let activation_point = activation_point.unwrap_or(current_point);
    require!(
        activation_point >= current_point
            && activation_point
                <= current_point.safe_add(activation_type.get_max_activation_duration())?,
        PoolError::InvalidActivationPoint
    );

    let (token_a_amount, token_b_amount) = get_initialize_amounts(
        policy.sqrt_min_price,
        policy.sqrt_max_price,
        sqrt_price,
        liquidity,
    )?;
    require!(
        token_a_amount > 0 || token_b_amount > 0,
        PoolError::AmountIsZero
    );
    let included_token_a = transfer_fees.included_amount(true, token_a_amount)?;
    let included_token_b = transfer_fees.included_amount(false, token_b_amount)?;

    let pool_fees = policy.pool_fees.to_pool_fees_struct(
        policy.protocol_fee_percent,
        policy.partner_fee_percent,
        policy.referral_fee_percent,
    )?;
    let mut pool = Pool {
        pool_fees,
        token_a_mint: accounts.token_a_mint,
        token_b_mint: accounts.token_b_mint,
        token_a_vault: accounts.token_a_vault,
        token_b_vault: accounts.token_b_vault,
        partner: policy.partner,
        creator: accounts.creator,
        config: policy.config,
        sqrt_min_price: policy.sqrt_min_price,
        sqrt_max_price: policy.sqrt_max_price,
        sqrt_price,
        init_sqrt_price: sqrt_price,
        activation_point,
        activation_type: policy.activation_type,
        pool_status: PoolStatus::Enable as u8,
        collect_fee_mode: policy.collect_fee_mode,
        pool_type: policy.pool_type as u8,
        ..Default::default()
    };

    let mut ledger = PositionLedger::new(accounts.pool);
    let position = ledger.open_initial_position(
        &mut pool,
        accounts.creator,
        liquidity,
        get_current_timestamp(clock)?,
    )?;

    emit!(EvtInitializePool {
        pool: accounts.pool,
        token_a_mint: accounts.token_a_mint,
        token_b_mint: accounts.token_b_mint,
        creator: accounts.creator,
        partner: pool.partner,
        pool_fees: policy.pool_fees,
        sqrt_min_price: pool.sqrt_min_price,
        sqrt_max_price: pool.sqrt_max_price,
        activation_type: pool.activation_type,
        collect_fee_mode: pool.collect_fee_mode,
        pool_type: pool.pool_type,
        liquidity,
        sqrt_price,
        activation_point,
        token_a_amount,
        token_b_amount,
        total_amount_a: included_token_a.amount,
        total_amount_b: included_token_b.amount,
    });

    Ok(InitializedPool {
        pool,
        ledger,
        position,
        token_a_amount,
        token_b_amount,
        included_token_a_amount: included_token_a.amount,
        included_token_b_amount: included_token_b.amount,
    })
}

/// Withdraw accrued partner fees, partner only
pub fn claim_partner_fee(
    pool_key: &Pubkey,
    pool: &mut Pool,
    signer: &Pubkey,
    max_amount_a: u64,
    max_amount_b: u64,
) -> Result<(u64, u64)> {
    require!(
        pool.has_partner() && pool.partner == *signer,
        PoolError::InvalidPartnerAccount
    );
    let (token_a_amount, token_b_amount) = pool.claim_partner_fee(max_amount_a, max_amount_b)?;
    emit!(EvtClaimPartnerFee {
        pool: *pool_key,
        token_a_amount,
        token_b_amount,
    });
    Ok((token_a_amount, token_b_amount))
}
