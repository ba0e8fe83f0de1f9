use std::collections::BTreeSet;

use anchor_lang::prelude::*;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{
    events::EvtSwap2,
    fee::FeeMode,
    pool::{Pool, SwapResult2},
    state::{get_current_timestamp, TradeDirection},
    utils::TokenTransferFees,
    PoolError,
};

/// Layout version of `EvtSwap2`
pub const EVT_SWAP_VERSION: u8 = 2;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum SwapMode {
    ExactIn,
    PartialFill,
    ExactOut,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct SwapParameters2 {
    /// Input amount for exact in and partial fill, output amount for exact out
    pub amount_0: u64,
    /// Minimum output for exact in and partial fill, maximum input for exact out
    pub amount_1: u64,
    pub swap_mode: u8,
}

impl SwapParameters2 {
    pub fn get_swap_mode(&self) -> Result<SwapMode> {
        Ok(SwapMode::from_u8(self.swap_mode).ok_or(PoolError::InvalidInput)?)
    }
}

/// One swap against a pool
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapRequest {
    pub trade_direction: TradeDirection,
    pub params: SwapParameters2,
    /// A referral account takes part of the protocol fee
    pub has_referral: bool,
}

/// Swap outcome with the token transfer fees of both legs applied
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessSwapResult {
    pub swap_result: SwapResult2,
    /// Sent by the trader
    pub included_transfer_fee_amount_in: u64,
    /// Sent by the pool vault
    pub included_transfer_fee_amount_out: u64,
    /// Received by the trader
    pub excluded_transfer_fee_amount_out: u64,
}

/// Pools already swapped against in the current caller batch
///
/// Scheduled fees read their window from pool state, so a batch may only swap
/// once per pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwapBatch {
    swapped_pools: BTreeSet<Pubkey>,
}

impl SwapBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, pool_key: &Pubkey) -> Result<()> {
        require!(
            !self.swapped_pools.contains(pool_key),
            PoolError::FailToValidateSingleSwapInstruction
        );
        Ok(())
    }

    fn insert(&mut self, pool_key: Pubkey) {
        self.swapped_pools.insert(pool_key);
    }
}

fn is_token_a_input(trade_direction: TradeDirection) -> bool {
    trade_direction == TradeDirection::AtoB
}

fn process_swap_exact_in(
    pool: &Pool,
    params: &SwapParameters2,
    fee_mode: &FeeMode,
    trade_direction: TradeDirection,
    current_point: u64,
    transfer_fees: &TokenTransferFees,
) -> Result<ProcessSwapResult> {
    let is_token_a_in = is_token_a_input(trade_direction);
    let excluded_transfer_fee_amount_in =
        transfer_fees.excluded_amount(is_token_a_in, params.amount_0)?;
    require!(
        excluded_transfer_fee_amount_in.amount > 0,
        PoolError::AmountIsZero
    );

    let swap_result = pool.get_swap_result_from_exact_input(
        excluded_transfer_fee_amount_in.amount,
        fee_mode,
        trade_direction,
        current_point,
    )?;

    let excluded_transfer_fee_amount_out =
        transfer_fees.excluded_amount(!is_token_a_in, swap_result.output_amount)?;
    require!(
        excluded_transfer_fee_amount_out.amount >= params.amount_1,
        PoolError::ExceededSlippage
    );

    Ok(ProcessSwapResult {
        swap_result,
        included_transfer_fee_amount_in: params.amount_0,
        included_transfer_fee_amount_out: swap_result.output_amount,
        excluded_transfer_fee_amount_out: excluded_transfer_fee_amount_out.amount,
    })
}

fn process_swap_partial_fill(
    pool: &Pool,
    params: &SwapParameters2,
    fee_mode: &FeeMode,
    trade_direction: TradeDirection,
    current_point: u64,
    transfer_fees: &TokenTransferFees,
) -> Result<ProcessSwapResult> {
    let is_token_a_in = is_token_a_input(trade_direction);
    let excluded_transfer_fee_amount_in =
        transfer_fees.excluded_amount(is_token_a_in, params.amount_0)?;
    require!(
        excluded_transfer_fee_amount_in.amount > 0,
        PoolError::AmountIsZero
    );

    let swap_result = pool.get_swap_result_from_partial_input(
        excluded_transfer_fee_amount_in.amount,
        fee_mode,
        trade_direction,
        current_point,
    )?;

    // only what the curve consumed is pulled from the trader
    let included_transfer_fee_amount_in = if swap_result.amount_left > 0 {
        transfer_fees
            .included_amount(is_token_a_in, swap_result.included_fee_input_amount)?
            .amount
    } else {
        params.amount_0
    };

    let excluded_transfer_fee_amount_out =
        transfer_fees.excluded_amount(!is_token_a_in, swap_result.output_amount)?;
    require!(
        excluded_transfer_fee_amount_out.amount >= params.amount_1,
        PoolError::ExceededSlippage
    );

    Ok(ProcessSwapResult {
        swap_result,
        included_transfer_fee_amount_in,
        included_transfer_fee_amount_out: swap_result.output_amount,
        excluded_transfer_fee_amount_out: excluded_transfer_fee_amount_out.amount,
    })
}

fn process_swap_exact_out(
    pool: &Pool,
    params: &SwapParameters2,
    fee_mode: &FeeMode,
    trade_direction: TradeDirection,
    current_point: u64,
    transfer_fees: &TokenTransferFees,
) -> Result<ProcessSwapResult> {
    let is_token_a_in = is_token_a_input(trade_direction);
    let included_transfer_fee_amount_out =
        transfer_fees.included_amount(!is_token_a_in, params.amount_0)?;
    require!(
        included_transfer_fee_amount_out.amount > 0,
        PoolError::AmountIsZero
    );

    let swap_result = pool.get_swap_result_from_exact_output(
        included_transfer_fee_amount_out.amount,
        fee_mode,
        trade_direction,
        current_point,
    )?;

    let included_transfer_fee_amount_in =
        transfer_fees.included_amount(is_token_a_in, swap_result.included_fee_input_amount)?;
    require!(
        included_transfer_fee_amount_in.amount <= params.amount_1,
        PoolError::ExceededSlippage
    );

    Ok(ProcessSwapResult {
        swap_result,
        included_transfer_fee_amount_in: included_transfer_fee_amount_in.amount,
        included_transfer_fee_amount_out: included_transfer_fee_amount_out.amount,
        excluded_transfer_fee_amount_out: params.amount_0,
    })
}

// Runs the full swap pipeline against `pool` in place
fn execute_swap(
    pool: &mut Pool,
    request: &SwapRequest,
    transfer_fees: &TokenTransferFees,
    clock: &Clock,
) -> Result<(ProcessSwapResult, u64)> {
    require!(pool.is_enabled()?, PoolError::PoolDisabled);
    let swap_mode = request.params.get_swap_mode()?;
    require!(request.params.amount_0 > 0, PoolError::AmountIsZero);

    let current_point = pool.get_current_point(clock)?;
    require!(
        current_point >= pool.activation_point,
        PoolError::PoolNotActivated
    );

    let current_timestamp = get_current_timestamp(clock)?;
    pool.update_pre_swap(current_timestamp)?;

    let fee_mode = FeeMode::get_fee_mode(
        pool.get_collect_fee_mode()?,
        request.trade_direction,
        request.has_referral,
    );

    msg!("swap mode: {:?}", swap_mode);
    let process = match swap_mode {
        SwapMode::ExactIn => process_swap_exact_in,
        SwapMode::PartialFill => process_swap_partial_fill,
        SwapMode::ExactOut => process_swap_exact_out,
    };
    let result = process(
        pool,
        &request.params,
        &fee_mode,
        request.trade_direction,
        current_point,
        transfer_fees,
    )?;

    pool.apply_swap_result(&result.swap_result, &fee_mode, current_timestamp)?;
    Ok((result, current_timestamp))
}

/// Swap against a pool
///
/// The pool is only written when the whole swap succeeds, and a pool can be
/// swapped once per `batch`.
///
/// # Returns
/// The amounts each party sends and receives
pub fn swap(
    batch: &mut SwapBatch,
    pool_key: &Pubkey,
    pool: &mut Pool,
    request: &SwapRequest,
    transfer_fees: &TokenTransferFees,
    clock: &Clock,
) -> Result<ProcessSwapResult> {
    batch.check(pool_key)?;

    let mut updated = pool.clone();
    let (result, current_timestamp) = execute_swap(&mut updated, request, transfer_fees, clock)?;
    *pool = updated;
    batch.insert(*pool_key);

    emit!(EvtSwap2 {
        pool: *pool_key,
        version: EVT_SWAP_VERSION,
        trade_direction: request.trade_direction as u8,
        collect_fee_mode: pool.collect_fee_mode,
        has_referral: request.has_referral,
        params: request.params,
        swap_result: result.swap_result,
        current_timestamp,
        included_transfer_fee_amount_in: result.included_transfer_fee_amount_in,
        included_transfer_fee_amount_out: result.included_transfer_fee_amount_out,
        excluded_transfer_fee_amount_out: result.excluded_transfer_fee_amount_out,
    });
    Ok(result)
}

/// Simulate a swap without touching the pool
pub fn quote(
    pool: &Pool,
    request: &SwapRequest,
    transfer_fees: &TokenTransferFees,
    clock: &Clock,
) -> Result<ProcessSwapResult> {
    let mut simulated = pool.clone();
    let (result, _) = execute_swap(&mut simulated, request, transfer_fees, clock)?;
    Ok(result)
}
