use anchor_lang::prelude::*;
use ethnum::U256;

use crate::{
    constants::{
        LIQUIDITY_SCALE, MAX_REWARD_DURATION, MIN_REWARD_DURATION, NUM_REWARDS, REWARD_RATE_SCALE,
    },
    events::{
        EvtClaimReward, EvtFundReward, EvtInitializeReward, EvtUpdateRewardDuration,
        EvtUpdateRewardFunder, EvtWithdrawIneligibleReward,
    },
    liquidity::{PositionId, PositionLedger},
    operator::{require_permission, Operator, OperatorPermission},
    pool::Pool,
    safe_math::SafeMath,
    state::get_current_timestamp,
    utils::{safe_mul_shr_cast, safe_shl_div_cast, u256_from_bytes, u256_to_bytes, Rounding},
    PoolError,
};

/// Lifecycle of a reward slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewardState {
    Uninitialized,
    Initialized,
    Funded,
    Expired,
}

/// Reward emission slot of a pool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct RewardInfo {
    pub initialized: u8,
    pub mint: Pubkey,
    pub vault: Pubkey,
    pub funder: Pubkey,
    pub reward_duration: u64,
    pub reward_duration_end: u64,
    /// Tokens per second, Q64
    pub reward_rate: u128,
    /// Accumulated reward per unit of liquidity, Q192 over Q64 liquidity
    pub reward_per_token_stored: [u8; 32],
    pub last_update_time: u64,
    /// Seconds the campaign ran while the pool had no liquidity
    pub cumulative_seconds_with_empty_liquidity_reward: u64,
}

impl RewardInfo {
    pub fn initialized(&self) -> bool {
        self.initialized != 0
    }

    pub fn state(&self, current_time: u64) -> RewardState {
        if !self.initialized() {
            RewardState::Uninitialized
        } else if self.reward_duration_end == 0 {
            RewardState::Initialized
        } else if current_time < self.reward_duration_end {
            RewardState::Funded
        } else {
            RewardState::Expired
        }
    }

    pub fn init_reward(&mut self, mint: Pubkey, vault: Pubkey, funder: Pubkey, reward_duration: u64) {
        self.initialized = 1;
        self.mint = mint;
        self.vault = vault;
        self.funder = funder;
        self.reward_duration = reward_duration;
    }

    pub fn reward_per_token_stored(&self) -> U256 {
        u256_from_bytes(&self.reward_per_token_stored)
    }

    pub fn update_last_update_time(&mut self, current_time: u64) {
        self.last_update_time = current_time.min(self.reward_duration_end);
    }

    pub fn get_seconds_elapsed_since_last_update(&self, current_time: u64) -> Result<u64> {
        let last_time_reward_applicable = current_time.min(self.reward_duration_end);
        Ok(last_time_reward_applicable.saturating_sub(self.last_update_time))
    }

    pub fn calculate_reward_per_token_stored_since_last_update(
        &self,
        current_time: u64,
        liquidity_supply: u128,
    ) -> Result<U256> {
        let time_period = self.get_seconds_elapsed_since_last_update(current_time)?;
        let total_reward = U256::from(time_period).safe_mul(U256::from(self.reward_rate))?;
        Ok(total_reward
            .safe_shl(u32::from(LIQUIDITY_SCALE))?
            .safe_div(U256::from(liquidity_supply))?)
    }

    pub fn accumulate_reward_per_token_stored(&mut self, delta: U256) -> Result<()> {
        let reward_per_token_stored = self.reward_per_token_stored().safe_add(delta)?;
        self.reward_per_token_stored = u256_to_bytes(reward_per_token_stored);
        Ok(())
    }

    /// Emission that accrued while the pool was empty, reset to zero
    pub fn take_ineligible_reward(&mut self) -> Result<u64> {
        let ineligible_reward = safe_mul_shr_cast(
            self.cumulative_seconds_with_empty_liquidity_reward.into(),
            self.reward_rate,
            u32::from(REWARD_RATE_SCALE),
        )?;
        self.cumulative_seconds_with_empty_liquidity_reward = 0;
        Ok(ineligible_reward)
    }

    /// Spread `funding_amount` plus whatever is left of the running window over a new window
    pub fn update_rate_after_funding(&mut self, current_time: u64, funding_amount: u64) -> Result<()> {
        let total_amount = if current_time >= self.reward_duration_end {
            funding_amount
        } else {
            let remaining_seconds = self.reward_duration_end.safe_sub(current_time)?;
            let leftover = safe_mul_shr_cast(
                self.reward_rate,
                remaining_seconds.into(),
                u32::from(REWARD_RATE_SCALE),
            )?;
            leftover.safe_add(funding_amount)?
        };

        self.reward_rate = safe_shl_div_cast(
            total_amount.into(),
            self.reward_duration.into(),
            u32::from(REWARD_RATE_SCALE),
            Rounding::Down,
        )?;
        self.last_update_time = current_time;
        self.reward_duration_end = current_time.safe_add(self.reward_duration)?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct InitializeRewardParameters {
    pub reward_mint: Pubkey,
    pub reward_vault: Pubkey,
    pub funder: Pubkey,
    pub reward_duration: u64,
}

fn validate_reward_index(reward_index: u8) -> Result<usize> {
    let index = usize::from(reward_index);
    require!(index < NUM_REWARDS, PoolError::InvalidRewardIndex);
    Ok(index)
}

fn validate_reward_duration(reward_duration: u64) -> Result<()> {
    require!(
        (MIN_REWARD_DURATION..=MAX_REWARD_DURATION).contains(&reward_duration),
        PoolError::InvalidRewardDuration
    );
    Ok(())
}

/// Operators with the capability manage every slot, the pool creator only the first one
fn validate_reward_authority(
    pool: &Pool,
    reward_index: usize,
    signer: &Pubkey,
    operator: Option<&Operator>,
    permission: OperatorPermission,
) -> Result<()> {
    match operator {
        Some(operator) => require_permission(operator, signer, permission),
        None => {
            require!(
                reward_index == 0 && *signer == pool.creator,
                PoolError::InvalidPermission
            );
            Ok(())
        }
    }
}

pub fn initialize_reward(
    pool_key: &Pubkey,
    pool: &mut Pool,
    signer: &Pubkey,
    operator: Option<&Operator>,
    reward_index: u8,
    params: &InitializeRewardParameters,
    clock: &Clock,
) -> Result<()> {
    let index = validate_reward_index(reward_index)?;
    validate_reward_authority(pool, index, signer, operator, OperatorPermission::InitializeReward)?;
    validate_reward_duration(params.reward_duration)?;
    require!(
        !pool.reward_infos[index].initialized(),
        PoolError::RewardInitialized
    );

    let current_time = get_current_timestamp(clock)?;
    let mut next_pool = pool.clone();
    next_pool.update_rewards(current_time)?;
    next_pool.reward_infos[index].init_reward(
        params.reward_mint,
        params.reward_vault,
        params.funder,
        params.reward_duration,
    );
    *pool = next_pool;

    emit!(EvtInitializeReward {
        pool: *pool_key,
        reward_mint: params.reward_mint,
        funder: params.funder,
        creator: *signer,
        reward_index,
        reward_duration: params.reward_duration,
    });
    Ok(())
}

pub fn update_reward_duration(
    pool_key: &Pubkey,
    pool: &mut Pool,
    signer: &Pubkey,
    operator: Option<&Operator>,
    reward_index: u8,
    new_duration: u64,
    clock: &Clock,
) -> Result<()> {
    let index = validate_reward_index(reward_index)?;
    validate_reward_authority(
        pool,
        index,
        signer,
        operator,
        OperatorPermission::UpdateRewardDuration,
    )?;
    validate_reward_duration(new_duration)?;

    let reward_info = &pool.reward_infos[index];
    require!(reward_info.initialized(), PoolError::RewardUninitialized);
    require!(
        reward_info.reward_duration != new_duration,
        PoolError::IdenticalRewardDuration
    );
    let current_time = get_current_timestamp(clock)?;
    require!(
        reward_info.reward_duration_end < current_time,
        PoolError::RewardCampaignInProgress
    );

    let mut next_pool = pool.clone();
    next_pool.update_rewards(current_time)?;
    let reward_info = &mut next_pool.reward_infos[index];
    require!(
        reward_info.cumulative_seconds_with_empty_liquidity_reward == 0,
        PoolError::MustWithdrawnIneligibleReward
    );
    let old_reward_duration = reward_info.reward_duration;
    reward_info.reward_duration = new_duration;
    *pool = next_pool;

    emit!(EvtUpdateRewardDuration {
        pool: *pool_key,
        reward_index,
        old_reward_duration,
        new_reward_duration: new_duration,
    });
    Ok(())
}

pub fn update_reward_funder(
    pool_key: &Pubkey,
    pool: &mut Pool,
    signer: &Pubkey,
    operator: Option<&Operator>,
    reward_index: u8,
    new_funder: Pubkey,
) -> Result<()> {
    let index = validate_reward_index(reward_index)?;
    validate_reward_authority(
        pool,
        index,
        signer,
        operator,
        OperatorPermission::UpdateRewardFunder,
    )?;

    let reward_info = &mut pool.reward_infos[index];
    require!(reward_info.initialized(), PoolError::RewardUninitialized);
    require!(reward_info.funder != new_funder, PoolError::IdenticalFunder);
    let old_funder = reward_info.funder;
    reward_info.funder = new_funder;

    emit!(EvtUpdateRewardFunder {
        pool: *pool_key,
        reward_index,
        old_funder,
        new_funder,
    });
    Ok(())
}

/// Fund a reward slot and restart its emission window
///
/// With `carry_forward` the unspent part of the running window and any
/// emission lost to empty liquidity roll into the new window. Without it the
/// running window must have ended.
pub fn fund_reward(
    pool_key: &Pubkey,
    pool: &mut Pool,
    funder: &Pubkey,
    reward_index: u8,
    amount: u64,
    carry_forward: bool,
    clock: &Clock,
) -> Result<()> {
    let index = validate_reward_index(reward_index)?;
    let reward_info = &pool.reward_infos[index];
    require!(reward_info.initialized(), PoolError::RewardUninitialized);
    require!(reward_info.funder == *funder, PoolError::InvalidFunder);
    require!(amount > 0 || carry_forward, PoolError::AmountIsZero);

    let current_time = get_current_timestamp(clock)?;
    if !carry_forward {
        require!(
            current_time >= reward_info.reward_duration_end,
            PoolError::RewardCampaignInProgress
        );
    }

    let mut next_pool = pool.clone();
    next_pool.update_rewards(current_time)?;
    let reward_info = &mut next_pool.reward_infos[index];
    let pre_reward_rate = reward_info.reward_rate;
    let total_amount = if carry_forward {
        amount.safe_add(reward_info.take_ineligible_reward()?)?
    } else {
        amount
    };
    reward_info.update_rate_after_funding(current_time, total_amount)?;
    let post_reward_rate = reward_info.reward_rate;
    let reward_duration_end = reward_info.reward_duration_end;
    let mint_reward = reward_info.mint;
    *pool = next_pool;

    msg!(
        "fund reward {} amount {} rate {} until {}",
        reward_index,
        total_amount,
        post_reward_rate,
        reward_duration_end
    );
    emit!(EvtFundReward {
        pool: *pool_key,
        funder: *funder,
        mint_reward,
        reward_index,
        amount,
        carry_forward,
        reward_duration_end,
        pre_reward_rate,
        post_reward_rate,
    });
    Ok(())
}

/// Return to the funder the emission nobody could earn, once the window is over
pub fn withdraw_ineligible_reward(
    pool_key: &Pubkey,
    pool: &mut Pool,
    funder: &Pubkey,
    reward_index: u8,
    clock: &Clock,
) -> Result<u64> {
    let index = validate_reward_index(reward_index)?;
    let reward_info = &pool.reward_infos[index];
    require!(reward_info.initialized(), PoolError::RewardUninitialized);
    require!(reward_info.funder == *funder, PoolError::InvalidFunder);
    let current_time = get_current_timestamp(clock)?;
    require!(
        current_time > reward_info.reward_duration_end,
        PoolError::RewardNotEnded
    );

    let mut next_pool = pool.clone();
    next_pool.update_rewards(current_time)?;
    let reward_info = &mut next_pool.reward_infos[index];
    let amount = reward_info.take_ineligible_reward()?;
    let reward_mint = reward_info.mint;
    *pool = next_pool;

    emit!(EvtWithdrawIneligibleReward {
        pool: *pool_key,
        reward_mint,
        amount,
    });
    Ok(amount)
}

impl PositionLedger {
    /// Claim the pending reward of a position
    ///
    /// `vault_frozen` is reported by the token layer. A frozen vault can only be
    /// claimed against with `skip_reward == 1`, which forfeits the transfer.
    ///
    /// # Returns
    /// The amount to transfer to the owner
    #[allow(clippy::too_many_arguments)]
    pub fn claim_reward(
        &mut self,
        pool: &mut Pool,
        position_id: PositionId,
        owner: &Pubkey,
        reward_index: u8,
        skip_reward: u8,
        vault_frozen: bool,
        clock: &Clock,
    ) -> Result<u64> {
        let index = validate_reward_index(reward_index)?;
        require!(skip_reward <= 1, PoolError::InvalidInput);
        require!(
            pool.reward_infos[index].initialized(),
            PoolError::RewardUninitialized
        );
        if vault_frozen {
            require!(skip_reward == 1, PoolError::RewardVaultFrozenSkipRequired);
        }

        let current_time = get_current_timestamp(clock)?;
        let mut next_pool = pool.clone();
        let mut position = self.get_owned_position(position_id, owner)?.clone();
        next_pool.refresh_position(&mut position, current_time)?;
        let total_reward = position.claim_reward(index)?;
        let skipped = skip_reward == 1;

        let mint_reward = next_pool.reward_infos[index].mint;
        *pool = next_pool;
        self.commit_position(position_id, position);

        emit!(EvtClaimReward {
            pool: self.pool,
            position: position_id,
            owner: *owner,
            mint_reward,
            reward_index,
            total_reward,
            skipped,
        });
        Ok(if skipped { 0 } else { total_reward })
    }
}
