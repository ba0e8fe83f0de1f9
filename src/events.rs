use anchor_lang::prelude::*;

use crate::{
    fee::PoolFeeParameters,
    liquidity::{PositionId, SplitAmountInfo, SplitPositionParameters2, VestingId},
    operator::UpdatePoolFeesParameters,
    pool::SwapResult2,
    swap::SwapParameters2,
};

#[event]
pub struct EvtCreateConfig {
    pub config_index: u64,
    pub pool_fees: PoolFeeParameters,
    pub sqrt_min_price: u128,
    pub sqrt_max_price: u128,
    pub pool_creator_authority: Pubkey,
    pub activation_type: u8,
    pub collect_fee_mode: u8,
    pub protocol_fee_percent: u8,
    pub partner_fee_percent: u8,
    pub referral_fee_percent: u8,
}

#[event]
pub struct EvtCreateDynamicConfig {
    pub config_index: u64,
    pub pool_creator_authority: Pubkey,
}

#[event]
pub struct EvtCloseConfig {
    pub config_index: u64,
    pub admin: Pubkey,
}

#[event]
pub struct EvtInitializePool {
    pub pool: Pubkey,
    pub token_a_mint: Pubkey,
    pub token_b_mint: Pubkey,
    pub creator: Pubkey,
    pub partner: Pubkey,
    pub pool_fees: PoolFeeParameters,
    pub sqrt_min_price: u128,
    pub sqrt_max_price: u128,
    pub activation_type: u8,
    pub collect_fee_mode: u8,
    pub pool_type: u8,
    pub liquidity: u128,
    pub sqrt_price: u128,
    pub activation_point: u64,
    pub token_a_amount: u64,
    pub token_b_amount: u64,
    pub total_amount_a: u64,
    pub total_amount_b: u64,
}

#[event]
pub struct EvtSetPoolStatus {
    pub pool: Pubkey,
    pub status: u8,
}

#[event]
pub struct EvtUpdatePoolFees {
    pub pool: Pubkey,
    pub operator: Pubkey,
    pub params: UpdatePoolFeesParameters,
}

#[event]
pub struct EvtClaimProtocolFee {
    pub pool: Pubkey,
    pub token_a_amount: u64,
    pub token_b_amount: u64,
}

#[event]
pub struct EvtClaimPartnerFee {
    pub pool: Pubkey,
    pub token_a_amount: u64,
    pub token_b_amount: u64,
}

/// Swap record, fields are only ever appended
#[event]
pub struct EvtSwap2 {
    pub pool: Pubkey,
    pub version: u8,
    pub trade_direction: u8,
    pub collect_fee_mode: u8,
    pub has_referral: bool,
    pub params: SwapParameters2,
    pub swap_result: SwapResult2,
    pub current_timestamp: u64,
    pub included_transfer_fee_amount_in: u64,
    pub included_transfer_fee_amount_out: u64,
    pub excluded_transfer_fee_amount_out: u64,
}

#[event]
pub struct EvtLiquidityChange {
    pub pool: Pubkey,
    pub position: PositionId,
    pub owner: Pubkey,
    pub token_a_amount: u64,
    pub token_b_amount: u64,
    pub transfer_fee_included_token_a_amount: u64,
    pub transfer_fee_included_token_b_amount: u64,
    pub liquidity_delta: u128,
    pub token_a_amount_threshold: u64,
    pub token_b_amount_threshold: u64,
    /// 0 add, 1 remove
    pub change_type: u8,
}

#[event]
pub struct EvtClaimPositionFee {
    pub pool: Pubkey,
    pub position: PositionId,
    pub owner: Pubkey,
    pub fee_a_claimed: u64,
    pub fee_b_claimed: u64,
}

#[event]
pub struct EvtLockPosition {
    pub pool: Pubkey,
    pub position: PositionId,
    pub owner: Pubkey,
    pub vesting: VestingId,
    pub cliff_point: u64,
    pub period_frequency: u64,
    pub cliff_unlock_liquidity: u128,
    pub liquidity_per_period: u128,
    pub number_of_period: u16,
}

#[event]
pub struct EvtRefreshVesting {
    pub pool: Pubkey,
    pub position: PositionId,
    pub vesting: VestingId,
    pub released_liquidity: u128,
    pub completed: bool,
}

#[event]
pub struct EvtPermanentLockPosition {
    pub pool: Pubkey,
    pub position: PositionId,
    pub lock_liquidity_amount: u128,
    pub total_permanent_locked_liquidity: u128,
}

#[event]
pub struct EvtSplitPosition2 {
    pub pool: Pubkey,
    pub first_owner: Pubkey,
    pub second_owner: Pubkey,
    pub first_position: PositionId,
    pub second_position: PositionId,
    pub current_sqrt_price: u128,
    pub amount_splits: SplitAmountInfo,
    pub split_position_parameters: SplitPositionParameters2,
}

#[event]
pub struct EvtInitializeReward {
    pub pool: Pubkey,
    pub reward_mint: Pubkey,
    pub funder: Pubkey,
    pub creator: Pubkey,
    pub reward_index: u8,
    pub reward_duration: u64,
}

#[event]
pub struct EvtFundReward {
    pub pool: Pubkey,
    pub funder: Pubkey,
    pub mint_reward: Pubkey,
    pub reward_index: u8,
    pub amount: u64,
    pub carry_forward: bool,
    pub reward_duration_end: u64,
    pub pre_reward_rate: u128,
    pub post_reward_rate: u128,
}

#[event]
pub struct EvtClaimReward {
    pub pool: Pubkey,
    pub position: PositionId,
    pub owner: Pubkey,
    pub mint_reward: Pubkey,
    pub reward_index: u8,
    pub total_reward: u64,
    pub skipped: bool,
}

#[event]
pub struct EvtUpdateRewardDuration {
    pub pool: Pubkey,
    pub reward_index: u8,
    pub old_reward_duration: u64,
    pub new_reward_duration: u64,
}

#[event]
pub struct EvtUpdateRewardFunder {
    pub pool: Pubkey,
    pub reward_index: u8,
    pub old_funder: Pubkey,
    pub new_funder: Pubkey,
}

#[event]
pub struct EvtWithdrawIneligibleReward {
    pub pool: Pubkey,
    pub reward_mint: Pubkey,
    pub amount: u64,
}
