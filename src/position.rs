use anchor_lang::prelude::*;
use ethnum::U256;

use crate::{
    constants::{LIQUIDITY_SCALE, NUM_REWARDS, TOTAL_REWARD_SCALE},
    reward::RewardInfo,
    safe_math::SafeMath,
    utils::{safe_mul_shr_256_cast, u256_from_bytes, u256_to_bytes},
    PoolError,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct PositionMetrics {
    pub total_claimed_a_fee: u64,
    pub total_claimed_b_fee: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct UserRewardInfo {
    pub reward_per_token_checkpoint: [u8; 32],
    pub reward_pendings: u64,
    pub total_claimed_rewards: u64,
}

/// Share of pool liquidity held by one owner
///
/// Fee and reward accrual is checkpointed against the pool's growth counters,
/// so a position must be refreshed through the pool before its liquidity moves.
#[derive(Clone, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct Position {
    pub pool: Pubkey,
    pub owner: Pubkey,
    pub fee_a_per_token_checkpoint: [u8; 32],
    pub fee_b_per_token_checkpoint: [u8; 32],
    pub fee_a_pending: u64,
    pub fee_b_pending: u64,
    pub unlocked_liquidity: u128,
    /// Locked by vesting records, released back to unlocked over time
    pub vested_liquidity: u128,
    pub permanent_locked_liquidity: u128,
    pub metrics: PositionMetrics,
    pub reward_infos: [UserRewardInfo; NUM_REWARDS],
}

impl Position {
    pub fn new(pool: Pubkey, owner: Pubkey) -> Self {
        Self {
            pool,
            owner,
            ..Default::default()
        }
    }

    pub fn get_total_liquidity(&self) -> Result<u128> {
        Ok(self
            .unlocked_liquidity
            .safe_add(self.vested_liquidity)?
            .safe_add(self.permanent_locked_liquidity)?)
    }

    pub fn has_sufficient_liquidity(&self, liquidity: u128) -> bool {
        self.unlocked_liquidity >= liquidity
    }

    /// Move pending fee forward to the current pool growth
    pub fn update_fee(&mut self, fee_a_per_liquidity: U256, fee_b_per_liquidity: U256) -> Result<()> {
        let liquidity = self.get_total_liquidity()?;
        if liquidity > 0 {
            let new_fee_a = pending_since(
                fee_a_per_liquidity,
                u256_from_bytes(&self.fee_a_per_token_checkpoint),
                liquidity,
                LIQUIDITY_SCALE,
            )?;
            let new_fee_b = pending_since(
                fee_b_per_liquidity,
                u256_from_bytes(&self.fee_b_per_token_checkpoint),
                liquidity,
                LIQUIDITY_SCALE,
            )?;
            self.fee_a_pending = self.fee_a_pending.safe_add(new_fee_a)?;
            self.fee_b_pending = self.fee_b_pending.safe_add(new_fee_b)?;
        }
        self.fee_a_per_token_checkpoint = u256_to_bytes(fee_a_per_liquidity);
        self.fee_b_per_token_checkpoint = u256_to_bytes(fee_b_per_liquidity);
        Ok(())
    }

    pub fn update_rewards(&mut self, pool_reward_infos: &[RewardInfo; NUM_REWARDS]) -> Result<()> {
        let liquidity = self.get_total_liquidity()?;
        for (user_reward, pool_reward) in self.reward_infos.iter_mut().zip(pool_reward_infos) {
            if !pool_reward.initialized() {
                continue;
            }
            let reward_per_token_stored = pool_reward.reward_per_token_stored();
            if liquidity > 0 {
                let new_reward = pending_since(
                    reward_per_token_stored,
                    u256_from_bytes(&user_reward.reward_per_token_checkpoint),
                    liquidity,
                    TOTAL_REWARD_SCALE,
                )?;
                user_reward.reward_pendings = user_reward.reward_pendings.safe_add(new_reward)?;
            }
            user_reward.reward_per_token_checkpoint = u256_to_bytes(reward_per_token_stored);
        }
        Ok(())
    }

    pub fn add_liquidity(&mut self, liquidity_delta: u128) -> Result<()> {
        self.unlocked_liquidity = self.unlocked_liquidity.safe_add(liquidity_delta)?;
        Ok(())
    }

    pub fn remove_unlocked_liquidity(&mut self, liquidity_delta: u128) -> Result<()> {
        require!(
            self.has_sufficient_liquidity(liquidity_delta),
            PoolError::InsufficientLiquidity
        );
        self.unlocked_liquidity = self.unlocked_liquidity.safe_sub(liquidity_delta)?;
        Ok(())
    }

    pub fn lock(&mut self, total_lock_liquidity: u128) -> Result<()> {
        self.remove_unlocked_liquidity(total_lock_liquidity)?;
        self.vested_liquidity = self.vested_liquidity.safe_add(total_lock_liquidity)?;
        Ok(())
    }

    pub fn release_vested_liquidity(&mut self, released_liquidity: u128) -> Result<()> {
        self.vested_liquidity = self.vested_liquidity.safe_sub(released_liquidity)?;
        self.unlocked_liquidity = self.unlocked_liquidity.safe_add(released_liquidity)?;
        Ok(())
    }

    pub fn permanent_lock_liquidity(&mut self, permanent_lock_liquidity: u128) -> Result<()> {
        self.remove_unlocked_liquidity(permanent_lock_liquidity)?;
        self.permanent_locked_liquidity = self
            .permanent_locked_liquidity
            .safe_add(permanent_lock_liquidity)?;
        Ok(())
    }

    /// Take all pending fees
    ///
    /// # Returns
    /// `(fee_a, fee_b)` to transfer to the owner
    pub fn claim_fee(&mut self) -> Result<(u64, u64)> {
        let fee_a = self.fee_a_pending;
        let fee_b = self.fee_b_pending;
        self.fee_a_pending = 0;
        self.fee_b_pending = 0;
        self.metrics.total_claimed_a_fee = self.metrics.total_claimed_a_fee.safe_add(fee_a)?;
        self.metrics.total_claimed_b_fee = self.metrics.total_claimed_b_fee.safe_add(fee_b)?;
        Ok((fee_a, fee_b))
    }

    pub fn claim_reward(&mut self, reward_index: usize) -> Result<u64> {
        let reward_info = &mut self.reward_infos[reward_index];
        let total_reward = reward_info.reward_pendings;
        reward_info.reward_pendings = 0;
        reward_info.total_claimed_rewards =
            reward_info.total_claimed_rewards.safe_add(total_reward)?;
        Ok(total_reward)
    }

    /// No liquidity and nothing left to claim
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.get_total_liquidity()? == 0
            && self.fee_a_pending == 0
            && self.fee_b_pending == 0
            && self
                .reward_infos
                .iter()
                .all(|reward_info| reward_info.reward_pendings == 0))
    }
}

//  (growth - checkpoint) * liquidity >> scale
fn pending_since(growth: U256, checkpoint: U256, liquidity: u128, scale: u8) -> Result<u64> {
    let delta = growth.safe_sub(checkpoint)?;
    safe_mul_shr_256_cast(delta, U256::from(liquidity), u32::from(scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::assert_pool_error;

    #[test]
    fn test_fee_accrues_from_checkpoint() {
        let mut position = Position::default();
        position.add_liquidity(10u128 << 64).unwrap();
        // 5 fee units per unit of liquidity
        let growth = U256::from(5u128 << 64);
        position.update_fee(growth, U256::ZERO).unwrap();
        assert_eq!(position.fee_a_pending, 50);
        assert_eq!(position.fee_b_pending, 0);

        // a second refresh at the same growth adds nothing
        position.update_fee(growth, U256::ZERO).unwrap();
        assert_eq!(position.fee_a_pending, 50);

        assert_eq!(position.claim_fee().unwrap(), (50, 0));
        assert_eq!(position.metrics.total_claimed_a_fee, 50);
        assert_eq!(position.fee_a_pending, 0);
    }

    #[test]
    fn test_liquidity_classes() {
        let mut position = Position::default();
        position.add_liquidity(100).unwrap();
        position.lock(40).unwrap();
        position.permanent_lock_liquidity(10).unwrap();
        assert_eq!(position.unlocked_liquidity, 50);
        assert_eq!(position.get_total_liquidity().unwrap(), 100);

        assert_pool_error(
            position.remove_unlocked_liquidity(51),
            PoolError::InsufficientLiquidity,
        );
        position.release_vested_liquidity(15).unwrap();
        assert_eq!(position.unlocked_liquidity, 65);
        assert_eq!(position.vested_liquidity, 25);
        assert!(!position.is_empty().unwrap());
    }
}
