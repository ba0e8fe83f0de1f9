//! Position ledger of a pool
//!
//! Liquidity moves, fee claims, vesting locks, permanent locks and position
//! splits. Every operation works on copies of the pool and positions it touches
//! and commits them only once all checks passed.
use std::collections::BTreeMap;

use anchor_lang::prelude::*;

use crate::{
    constants::SPLIT_POSITION_DENOMINATOR,
    events::{
        EvtClaimPositionFee, EvtLiquidityChange, EvtLockPosition, EvtPermanentLockPosition,
        EvtRefreshVesting, EvtSplitPosition2,
    },
    pool::Pool,
    position::Position,
    safe_math::SafeMath,
    state::get_current_timestamp,
    utils::{safe_mul_div_cast_u128, safe_mul_div_cast_u64, Rounding, TokenTransferFees},
    vesting::{Vesting, VestingParameters},
    PoolError,
};

pub type PositionId = u64;
pub type VestingId = u64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct AddLiquidityParameters {
    pub liquidity_delta: u128,
    /// Maximum token a the owner sends, transfer fee included
    pub token_a_amount_threshold: u64,
    pub token_b_amount_threshold: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct RemoveLiquidityParameters {
    /// `None` removes all unlocked liquidity
    pub liquidity_delta: Option<u128>,
    /// Minimum token a the owner receives, transfer fee excluded
    pub token_a_amount_threshold: u64,
    pub token_b_amount_threshold: u64,
}

/// Token amounts of a liquidity change
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiquidityChange {
    pub liquidity_delta: u128,
    /// Amounts entering or leaving the vaults
    pub token_a_amount: u64,
    pub token_b_amount: u64,
    /// Amounts on the owner side of the transfer
    pub transfer_fee_included_token_a_amount: u64,
    pub transfer_fee_included_token_b_amount: u64,
}

/// Percentages of each balance class to move, 0..=100
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct SplitPositionParameters {
    pub unlocked_liquidity_percentage: u8,
    pub permanent_locked_liquidity_percentage: u8,
    pub fee_a_percentage: u8,
    pub fee_b_percentage: u8,
    pub reward_0_percentage: u8,
    pub reward_1_percentage: u8,
}

/// Numerators over `SPLIT_POSITION_DENOMINATOR` of each balance class to move
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct SplitPositionParameters2 {
    pub unlocked_liquidity_numerator: u32,
    pub permanent_locked_liquidity_numerator: u32,
    pub fee_a_numerator: u32,
    pub fee_b_numerator: u32,
    pub reward_0_numerator: u32,
    pub reward_1_numerator: u32,
}

impl SplitPositionParameters {
    pub fn validate(&self) -> Result<()> {
        let percentages = [
            self.unlocked_liquidity_percentage,
            self.permanent_locked_liquidity_percentage,
            self.fee_a_percentage,
            self.fee_b_percentage,
            self.reward_0_percentage,
            self.reward_1_percentage,
        ];
        require!(
            percentages.iter().all(|percentage| *percentage <= 100)
                && percentages.iter().any(|percentage| *percentage > 0),
            PoolError::InvalidSplitPositionParameters
        );
        Ok(())
    }

    pub fn to_numerators(&self) -> SplitPositionParameters2 {
        let to_numerator = |percentage: u8| u32::from(percentage) * (SPLIT_POSITION_DENOMINATOR / 100);
        SplitPositionParameters2 {
            unlocked_liquidity_numerator: to_numerator(self.unlocked_liquidity_percentage),
            permanent_locked_liquidity_numerator: to_numerator(
                self.permanent_locked_liquidity_percentage,
            ),
            fee_a_numerator: to_numerator(self.fee_a_percentage),
            fee_b_numerator: to_numerator(self.fee_b_percentage),
            reward_0_numerator: to_numerator(self.reward_0_percentage),
            reward_1_numerator: to_numerator(self.reward_1_percentage),
        }
    }
}

impl SplitPositionParameters2 {
    pub fn uniform(numerator: u32) -> Self {
        Self {
            unlocked_liquidity_numerator: numerator,
            permanent_locked_liquidity_numerator: numerator,
            fee_a_numerator: numerator,
            fee_b_numerator: numerator,
            reward_0_numerator: numerator,
            reward_1_numerator: numerator,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let numerators = [
            self.unlocked_liquidity_numerator,
            self.permanent_locked_liquidity_numerator,
            self.fee_a_numerator,
            self.fee_b_numerator,
            self.reward_0_numerator,
            self.reward_1_numerator,
        ];
        require!(
            numerators
                .iter()
                .all(|numerator| *numerator <= SPLIT_POSITION_DENOMINATOR)
                && numerators.iter().any(|numerator| *numerator > 0),
            PoolError::InvalidSplitPositionParameters
        );
        Ok(())
    }
}

/// Balances moved by a split
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct SplitAmountInfo {
    pub permanent_locked_liquidity: u128,
    pub unlocked_liquidity: u128,
    pub fee_a: u64,
    pub fee_b: u64,
    pub reward_0: u64,
    pub reward_1: u64,
}

impl SplitAmountInfo {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Positions and vesting records of one pool
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionLedger {
    pub pool: Pubkey,
    positions: BTreeMap<PositionId, Position>,
    vestings: BTreeMap<VestingId, Vesting>,
    next_position_id: PositionId,
    next_vesting_id: VestingId,
}

impl PositionLedger {
    pub fn new(pool: Pubkey) -> Self {
        Self {
            pool,
            ..Default::default()
        }
    }

    pub fn get_position(&self, position_id: PositionId) -> Result<&Position> {
        Ok(self
            .positions
            .get(&position_id)
            .ok_or(PoolError::PositionNotFound)?)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&PositionId, &Position)> {
        self.positions.iter()
    }

    pub fn get_vesting(&self, vesting_id: VestingId) -> Result<&Vesting> {
        Ok(self
            .vestings
            .get(&vesting_id)
            .ok_or(PoolError::VestingNotFound)?)
    }

    pub fn vestings_of(&self, position_id: PositionId) -> impl Iterator<Item = (&VestingId, &Vesting)> {
        self.vestings
            .iter()
            .filter(move |(_, vesting)| vesting.position == position_id)
    }

    pub(crate) fn get_owned_position(&self, position_id: PositionId, owner: &Pubkey) -> Result<&Position> {
        let position = self.get_position(position_id)?;
        require!(position.owner == *owner, PoolError::InvalidPositionOwner);
        Ok(position)
    }

    pub(crate) fn commit_position(&mut self, position_id: PositionId, position: Position) {
        self.positions.insert(position_id, position);
    }

    pub fn create_position(&mut self, pool: &mut Pool, owner: Pubkey) -> Result<PositionId> {
        let position_id = self.next_position_id;
        let next_position_id = position_id.safe_add(1)?;
        pool.metrics.total_position = pool.metrics.total_position.safe_add(1)?;
        self.next_position_id = next_position_id;
        self.positions
            .insert(position_id, Position::new(self.pool, owner));
        Ok(position_id)
    }

    pub(crate) fn open_initial_position(
        &mut self,
        pool: &mut Pool,
        owner: Pubkey,
        liquidity: u128,
        current_time: u64,
    ) -> Result<PositionId> {
        let position_id = self.create_position(pool, owner)?;
        let mut position = self.get_position(position_id)?.clone();
        pool.refresh_position(&mut position, current_time)?;
        pool.apply_add_liquidity(&mut position, liquidity)?;
        self.commit_position(position_id, position);
        Ok(position_id)
    }

    /// Deposit liquidity into an owned position
    ///
    /// Rejected when the pool is disabled or when the owner would have to send
    /// more than a threshold.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity(
        &mut self,
        pool: &mut Pool,
        position_id: PositionId,
        owner: &Pubkey,
        params: &AddLiquidityParameters,
        transfer_fees: &TokenTransferFees,
        clock: &Clock,
    ) -> Result<LiquidityChange> {
        require!(pool.is_enabled()?, PoolError::PoolDisabled);
        require!(params.liquidity_delta > 0, PoolError::AmountIsZero);
        let current_time = get_current_timestamp(clock)?;

        let mut next_pool = pool.clone();
        let mut position = self.get_owned_position(position_id, owner)?.clone();
        next_pool.refresh_position(&mut position, current_time)?;

        let (token_a_amount, token_b_amount) =
            next_pool.get_amounts_for_modify_liquidity(params.liquidity_delta, Rounding::Up)?;
        require!(
            token_a_amount > 0 || token_b_amount > 0,
            PoolError::AmountIsZero
        );
        next_pool.apply_add_liquidity(&mut position, params.liquidity_delta)?;

        let included_a = transfer_fees.included_amount(true, token_a_amount)?;
        let included_b = transfer_fees.included_amount(false, token_b_amount)?;
        require!(
            included_a.amount <= params.token_a_amount_threshold
                && included_b.amount <= params.token_b_amount_threshold,
            PoolError::ExceededSlippage
        );

        *pool = next_pool;
        self.commit_position(position_id, position);

        emit!(EvtLiquidityChange {
            pool: self.pool,
            position: position_id,
            owner: *owner,
            token_a_amount,
            token_b_amount,
            transfer_fee_included_token_a_amount: included_a.amount,
            transfer_fee_included_token_b_amount: included_b.amount,
            liquidity_delta: params.liquidity_delta,
            token_a_amount_threshold: params.token_a_amount_threshold,
            token_b_amount_threshold: params.token_b_amount_threshold,
            change_type: 0,
        });
        Ok(LiquidityChange {
            liquidity_delta: params.liquidity_delta,
            token_a_amount,
            token_b_amount,
            transfer_fee_included_token_a_amount: included_a.amount,
            transfer_fee_included_token_b_amount: included_b.amount,
        })
    }

    /// Withdraw unlocked liquidity, allowed on a disabled pool
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity(
        &mut self,
        pool: &mut Pool,
        position_id: PositionId,
        owner: &Pubkey,
        params: &RemoveLiquidityParameters,
        transfer_fees: &TokenTransferFees,
        clock: &Clock,
    ) -> Result<LiquidityChange> {
        let current_time = get_current_timestamp(clock)?;
        let mut next_pool = pool.clone();
        let mut position = self.get_owned_position(position_id, owner)?.clone();
        let liquidity_delta = params
            .liquidity_delta
            .unwrap_or(position.unlocked_liquidity);
        require!(liquidity_delta > 0, PoolError::AmountIsZero);

        next_pool.refresh_position(&mut position, current_time)?;
        let (token_a_amount, token_b_amount) =
            next_pool.get_amounts_for_modify_liquidity(liquidity_delta, Rounding::Down)?;
        next_pool.apply_remove_liquidity(&mut position, liquidity_delta)?;

        let excluded_a = transfer_fees.excluded_amount(true, token_a_amount)?;
        let excluded_b = transfer_fees.excluded_amount(false, token_b_amount)?;
        require!(
            excluded_a.amount >= params.token_a_amount_threshold
                && excluded_b.amount >= params.token_b_amount_threshold,
            PoolError::ExceededSlippage
        );

        *pool = next_pool;
        self.commit_position(position_id, position);

        emit!(EvtLiquidityChange {
            pool: self.pool,
            position: position_id,
            owner: *owner,
            token_a_amount,
            token_b_amount,
            transfer_fee_included_token_a_amount: excluded_a.amount,
            transfer_fee_included_token_b_amount: excluded_b.amount,
            liquidity_delta,
            token_a_amount_threshold: params.token_a_amount_threshold,
            token_b_amount_threshold: params.token_b_amount_threshold,
            change_type: 1,
        });
        Ok(LiquidityChange {
            liquidity_delta,
            token_a_amount,
            token_b_amount,
            transfer_fee_included_token_a_amount: excluded_a.amount,
            transfer_fee_included_token_b_amount: excluded_b.amount,
        })
    }

    /// # Returns
    /// `(fee_a, fee_b)` to transfer to the owner
    pub fn claim_position_fee(
        &mut self,
        pool: &mut Pool,
        position_id: PositionId,
        owner: &Pubkey,
        clock: &Clock,
    ) -> Result<(u64, u64)> {
        let current_time = get_current_timestamp(clock)?;
        let mut next_pool = pool.clone();
        let mut position = self.get_owned_position(position_id, owner)?.clone();
        next_pool.refresh_position(&mut position, current_time)?;
        let (fee_a_claimed, fee_b_claimed) = position.claim_fee()?;

        *pool = next_pool;
        self.commit_position(position_id, position);

        emit!(EvtClaimPositionFee {
            pool: self.pool,
            position: position_id,
            owner: *owner,
            fee_a_claimed,
            fee_b_claimed,
        });
        Ok((fee_a_claimed, fee_b_claimed))
    }

    /// Lock part of the unlocked liquidity under a new vesting record
    pub fn lock_position(
        &mut self,
        pool: &mut Pool,
        position_id: PositionId,
        owner: &Pubkey,
        params: &VestingParameters,
        clock: &Clock,
    ) -> Result<VestingId> {
        let current_point = pool.get_current_point(clock)?;
        let max_vesting_duration = pool.get_activation_type()?.get_max_vesting_duration();
        params.validate(current_point, max_vesting_duration)?;

        let current_time = get_current_timestamp(clock)?;
        let mut next_pool = pool.clone();
        let mut position = self.get_owned_position(position_id, owner)?.clone();
        next_pool.refresh_position(&mut position, current_time)?;
        position.lock(params.get_total_lock_amount()?)?;

        let vesting_id = self.next_vesting_id;
        let next_vesting_id = vesting_id.safe_add(1)?;
        let vesting = Vesting::new(position_id, params, current_point);

        *pool = next_pool;
        self.commit_position(position_id, position);
        self.vestings.insert(vesting_id, vesting);
        self.next_vesting_id = next_vesting_id;

        emit!(EvtLockPosition {
            pool: self.pool,
            position: position_id,
            owner: *owner,
            vesting: vesting_id,
            cliff_point: vesting.cliff_point,
            period_frequency: vesting.period_frequency,
            cliff_unlock_liquidity: vesting.cliff_unlock_liquidity,
            liquidity_per_period: vesting.liquidity_per_period,
            number_of_period: vesting.number_of_period,
        });
        Ok(vesting_id)
    }

    /// Release whatever the vesting records of a position allow at the current point
    ///
    /// Completed records are removed. Anyone may refresh.
    ///
    /// # Returns
    /// The liquidity moved from vested to unlocked
    pub fn refresh_vesting(
        &mut self,
        pool: &Pool,
        position_id: PositionId,
        clock: &Clock,
    ) -> Result<u128> {
        let current_point = pool.get_current_point(clock)?;
        let mut position = self.get_position(position_id)?.clone();

        let mut updates = Vec::new();
        let mut total_released = 0u128;
        for (vesting_id, vesting) in self.vestings_of(position_id) {
            let mut vesting = *vesting;
            let released_liquidity = vesting.get_new_release_liquidity(current_point)?;
            if released_liquidity > 0 {
                position.release_vested_liquidity(released_liquidity)?;
                vesting.accumulate_released_liquidity(released_liquidity)?;
                total_released = total_released.safe_add(released_liquidity)?;
            }
            updates.push((*vesting_id, vesting, released_liquidity));
        }

        self.commit_position(position_id, position);
        for (vesting_id, vesting, released_liquidity) in updates {
            let completed = vesting.is_done()?;
            if completed {
                self.vestings.remove(&vesting_id);
            } else {
                self.vestings.insert(vesting_id, vesting);
            }
            if released_liquidity > 0 || completed {
                msg!(
                    "vesting {} released {} completed {}",
                    vesting_id,
                    released_liquidity,
                    completed
                );
                emit!(EvtRefreshVesting {
                    pool: self.pool,
                    position: position_id,
                    vesting: vesting_id,
                    released_liquidity,
                    completed,
                });
            }
        }
        Ok(total_released)
    }

    /// Lock all unlocked liquidity of a position forever
    pub fn permanent_lock_position(
        &mut self,
        pool: &mut Pool,
        position_id: PositionId,
        owner: &Pubkey,
    ) -> Result<u128> {
        let unlocked_liquidity = self.get_owned_position(position_id, owner)?.unlocked_liquidity;
        self.permanent_lock_liquidity(pool, position_id, owner, unlocked_liquidity)?;
        Ok(unlocked_liquidity)
    }

    pub fn permanent_lock_liquidity(
        &mut self,
        pool: &mut Pool,
        position_id: PositionId,
        owner: &Pubkey,
        permanent_lock_liquidity: u128,
    ) -> Result<()> {
        require!(permanent_lock_liquidity > 0, PoolError::AmountIsZero);
        let mut next_pool = pool.clone();
        let mut position = self.get_owned_position(position_id, owner)?.clone();
        position.permanent_lock_liquidity(permanent_lock_liquidity)?;
        next_pool.accumulate_permanent_locked_liquidity(permanent_lock_liquidity)?;

        *pool = next_pool;
        let total_permanent_locked_liquidity = position.permanent_locked_liquidity;
        self.commit_position(position_id, position);

        emit!(EvtPermanentLockPosition {
            pool: self.pool,
            position: position_id,
            lock_liquidity_amount: permanent_lock_liquidity,
            total_permanent_locked_liquidity,
        });
        Ok(())
    }

    /// Split by percentage per balance class
    #[allow(clippy::too_many_arguments)]
    pub fn split_position(
        &mut self,
        pool: &mut Pool,
        first_position_id: PositionId,
        first_owner: &Pubkey,
        second_position_id: PositionId,
        second_owner: &Pubkey,
        params: &SplitPositionParameters,
        clock: &Clock,
    ) -> Result<SplitAmountInfo> {
        params.validate()?;
        self.split_position_with_numerators(
            pool,
            first_position_id,
            first_owner,
            second_position_id,
            second_owner,
            &params.to_numerators(),
            clock,
        )
    }

    /// Split every balance class by `numerator / SPLIT_POSITION_DENOMINATOR`
    #[allow(clippy::too_many_arguments)]
    pub fn split_position2(
        &mut self,
        pool: &mut Pool,
        first_position_id: PositionId,
        first_owner: &Pubkey,
        second_position_id: PositionId,
        second_owner: &Pubkey,
        numerator: u32,
        clock: &Clock,
    ) -> Result<SplitAmountInfo> {
        self.split_position_with_numerators(
            pool,
            first_position_id,
            first_owner,
            second_position_id,
            second_owner,
            &SplitPositionParameters2::uniform(numerator),
            clock,
        )
    }

    /// Move a share of each balance class from the first position to the second
    ///
    /// Vested liquidity stays with its vesting records. Pool totals do not change.
    #[allow(clippy::too_many_arguments)]
    pub fn split_position_with_numerators(
        &mut self,
        pool: &mut Pool,
        first_position_id: PositionId,
        first_owner: &Pubkey,
        second_position_id: PositionId,
        second_owner: &Pubkey,
        params: &SplitPositionParameters2,
        clock: &Clock,
    ) -> Result<SplitAmountInfo> {
        require!(
            first_position_id != second_position_id,
            PoolError::SamePosition
        );
        params.validate()?;

        let current_time = get_current_timestamp(clock)?;
        let mut next_pool = pool.clone();
        let mut first = self.get_owned_position(first_position_id, first_owner)?.clone();
        let mut second = self
            .get_owned_position(second_position_id, second_owner)?
            .clone();
        next_pool.refresh_position(&mut first, current_time)?;
        next_pool.refresh_position(&mut second, current_time)?;

        let amount_splits = get_split_amounts(&first, params)?;
        require!(
            !amount_splits.is_empty(),
            PoolError::InvalidSplitPositionParameters
        );
        apply_split(&mut first, &mut second, &amount_splits)?;

        *pool = next_pool;
        self.commit_position(first_position_id, first);
        self.commit_position(second_position_id, second);

        emit!(EvtSplitPosition2 {
            pool: self.pool,
            first_owner: *first_owner,
            second_owner: *second_owner,
            first_position: first_position_id,
            second_position: second_position_id,
            current_sqrt_price: pool.sqrt_price,
            amount_splits,
            split_position_parameters: *params,
        });
        Ok(amount_splits)
    }

    /// Remove an empty position
    pub fn close_position(&mut self, position_id: PositionId, owner: &Pubkey) -> Result<()> {
        let position = self.get_owned_position(position_id, owner)?;
        require!(position.is_empty()?, PoolError::PositionNotEmpty);
        self.positions.remove(&position_id);
        Ok(())
    }
}

fn split_share_u128(amount: u128, numerator: u32) -> Result<u128> {
    safe_mul_div_cast_u128(
        amount,
        numerator.into(),
        SPLIT_POSITION_DENOMINATOR.into(),
        Rounding::Down,
    )
}

fn split_share_u64(amount: u64, numerator: u32) -> Result<u64> {
    safe_mul_div_cast_u64(
        amount,
        numerator.into(),
        SPLIT_POSITION_DENOMINATOR.into(),
        Rounding::Down,
    )
}

fn get_split_amounts(position: &Position, params: &SplitPositionParameters2) -> Result<SplitAmountInfo> {
    Ok(SplitAmountInfo {
        permanent_locked_liquidity: split_share_u128(
            position.permanent_locked_liquidity,
            params.permanent_locked_liquidity_numerator,
        )?,
        unlocked_liquidity: split_share_u128(
            position.unlocked_liquidity,
            params.unlocked_liquidity_numerator,
        )?,
        fee_a: split_share_u64(position.fee_a_pending, params.fee_a_numerator)?,
        fee_b: split_share_u64(position.fee_b_pending, params.fee_b_numerator)?,
        reward_0: split_share_u64(
            position.reward_infos[0].reward_pendings,
            params.reward_0_numerator,
        )?,
        reward_1: split_share_u64(
            position.reward_infos[1].reward_pendings,
            params.reward_1_numerator,
        )?,
    })
}

fn apply_split(first: &mut Position, second: &mut Position, amounts: &SplitAmountInfo) -> Result<()> {
    first.unlocked_liquidity = first.unlocked_liquidity.safe_sub(amounts.unlocked_liquidity)?;
    second.unlocked_liquidity = second.unlocked_liquidity.safe_add(amounts.unlocked_liquidity)?;

    first.permanent_locked_liquidity = first
        .permanent_locked_liquidity
        .safe_sub(amounts.permanent_locked_liquidity)?;
    second.permanent_locked_liquidity = second
        .permanent_locked_liquidity
        .safe_add(amounts.permanent_locked_liquidity)?;

    first.fee_a_pending = first.fee_a_pending.safe_sub(amounts.fee_a)?;
    second.fee_a_pending = second.fee_a_pending.safe_add(amounts.fee_a)?;
    first.fee_b_pending = first.fee_b_pending.safe_sub(amounts.fee_b)?;
    second.fee_b_pending = second.fee_b_pending.safe_add(amounts.fee_b)?;

    for (index, reward) in [amounts.reward_0, amounts.reward_1].into_iter().enumerate() {
        let from = &mut first.reward_infos[index];
        from.reward_pendings = from.reward_pendings.safe_sub(reward)?;
        let to = &mut second.reward_infos[index];
        to.reward_pendings = to.reward_pendings.safe_add(reward)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::assert_pool_error,
        pool::tests::{clock_at, key, new_customizable_pool, LIQUIDITY},
        state::PoolStatus,
        utils::tests::transfer_fee_config,
        vesting::VestingState,
    };
    use proptest::prelude::*;

    const OWNER: u8 = 1;

    fn add_params(liquidity_delta: u128) -> AddLiquidityParameters {
        AddLiquidityParameters {
            liquidity_delta,
            token_a_amount_threshold: u64::MAX,
            token_b_amount_threshold: u64::MAX,
        }
    }

    fn remove_params(liquidity_delta: Option<u128>) -> RemoveLiquidityParameters {
        RemoveLiquidityParameters {
            liquidity_delta,
            token_a_amount_threshold: 0,
            token_b_amount_threshold: 0,
        }
    }

    proptest! {
        #[test]
        fn add_then_remove_restores_liquidity(liquidity_delta in 1u128..(1u128 << 100)) {
            let (_, mut pool, mut ledger, position_id) = new_customizable_pool();
            let owner = key(OWNER);
            let clock = clock_at(2, 1_100);
            let fees = TokenTransferFees::default();
            let before = pool.liquidity;

            let added = ledger
                .add_liquidity(&mut pool, position_id, &owner, &add_params(liquidity_delta), &fees, &clock)
                .unwrap();
            prop_assert_eq!(pool.liquidity, before + liquidity_delta);
            let removed = ledger
                .remove_liquidity(&mut pool, position_id, &owner, &remove_params(Some(liquidity_delta)), &fees, &clock)
                .unwrap();
            prop_assert_eq!(pool.liquidity, before);
            // deposits round up, withdrawals round down
            prop_assert!(removed.token_a_amount <= added.token_a_amount);
            prop_assert!(removed.token_b_amount <= added.token_b_amount);
        }

        #[test]
        fn split_conserves_balances(
            numerators in proptest::array::uniform6(0u32..=SPLIT_POSITION_DENOMINATOR + 10),
            fee_a in any::<u32>(),
            fee_b in any::<u32>(),
            reward_0 in any::<u32>(),
            locked_share in 0u128..100,
        ) {
            let (_, mut pool, mut ledger, first_id) = new_customizable_pool();
            let owner = key(OWNER);
            let second_id = ledger.create_position(&mut pool, key(2)).unwrap();
            if locked_share > 0 {
                ledger
                    .permanent_lock_liquidity(&mut pool, first_id, &owner, LIQUIDITY / 100 * locked_share)
                    .unwrap();
            }
            let mut first = ledger.get_position(first_id).unwrap().clone();
            first.fee_a_pending = fee_a.into();
            first.fee_b_pending = fee_b.into();
            first.reward_infos[0].reward_pendings = reward_0.into();
            ledger.commit_position(first_id, first);

            let params = SplitPositionParameters2 {
                unlocked_liquidity_numerator: numerators[0],
                permanent_locked_liquidity_numerator: numerators[1],
                fee_a_numerator: numerators[2],
                fee_b_numerator: numerators[3],
                reward_0_numerator: numerators[4],
                reward_1_numerator: numerators[5],
            };
            let ledger_before = ledger.clone();
            let pool_before = pool.clone();
            let totals = |ledger: &PositionLedger| {
                let a = ledger.get_position(first_id).unwrap();
                let b = ledger.get_position(second_id).unwrap();
                (
                    a.unlocked_liquidity + b.unlocked_liquidity,
                    a.permanent_locked_liquidity + b.permanent_locked_liquidity,
                    a.fee_a_pending + b.fee_a_pending,
                    a.fee_b_pending + b.fee_b_pending,
                    a.reward_infos[0].reward_pendings + b.reward_infos[0].reward_pendings,
                )
            };

            let result = ledger.split_position_with_numerators(
                &mut pool,
                first_id,
                &owner,
                second_id,
                &key(2),
                &params,
                &clock_at(2, 1_000),
            );
            match result {
                Ok(_) => {
                    prop_assert_eq!(totals(&ledger), totals(&ledger_before));
                    prop_assert_eq!(pool.liquidity, pool_before.liquidity);
                    prop_assert_eq!(pool.permanent_lock_liquidity, pool_before.permanent_lock_liquidity);
                }
                Err(_) => {
                    prop_assert_eq!(&ledger, &ledger_before);
                    prop_assert_eq!(&pool, &pool_before);
                }
            }
        }
    }

    #[test]
    fn test_add_liquidity_thresholds_and_status() {
        let (_, mut pool, mut ledger, position_id) = new_customizable_pool();
        let owner = key(OWNER);
        let clock = clock_at(2, 1_100);
        // 1% transfer fee on token a
        let fees = TokenTransferFees::new(Some(transfer_fee_config(100, u64::MAX)), None, 0);

        let before = (pool.clone(), ledger.clone());
        let tight = AddLiquidityParameters {
            liquidity_delta: 1_000u128 << 64,
            token_a_amount_threshold: 1_000,
            token_b_amount_threshold: 1_000,
        };
        assert_pool_error(
            ledger.add_liquidity(&mut pool, position_id, &owner, &tight, &fees, &clock),
            PoolError::ExceededSlippage,
        );
        assert_eq!((pool.clone(), ledger.clone()), before);

        let change = ledger
            .add_liquidity(&mut pool, position_id, &owner, &add_params(1_000u128 << 64), &fees, &clock)
            .unwrap();
        assert_eq!(change.token_a_amount, 1_000);
        assert_eq!(change.transfer_fee_included_token_a_amount, 1_011);

        assert_pool_error(
            ledger.add_liquidity(&mut pool, position_id, &key(9), &add_params(1), &fees, &clock),
            PoolError::InvalidPositionOwner,
        );

        pool.pool_status = PoolStatus::Disable as u8;
        assert_pool_error(
            ledger.add_liquidity(&mut pool, position_id, &owner, &add_params(1), &fees, &clock),
            PoolError::PoolDisabled,
        );
        // withdrawals still work on a disabled pool
        ledger
            .remove_liquidity(&mut pool, position_id, &owner, &remove_params(None), &fees, &clock)
            .unwrap();
        assert_eq!(pool.liquidity, 0);
    }

    #[test]
    fn test_remove_liquidity_threshold() {
        let (_, mut pool, mut ledger, position_id) = new_customizable_pool();
        let owner = key(OWNER);
        let strict = RemoveLiquidityParameters {
            liquidity_delta: Some(1_000u128 << 64),
            token_a_amount_threshold: 1_001,
            token_b_amount_threshold: 0,
        };
        assert_pool_error(
            ledger.remove_liquidity(
                &mut pool,
                position_id,
                &owner,
                &strict,
                &TokenTransferFees::default(),
                &clock_at(2, 1_100),
            ),
            PoolError::ExceededSlippage,
        );
        assert_eq!(pool.liquidity, LIQUIDITY);
    }

    #[test]
    fn test_permanent_lock_blocks_removal() {
        let (_, mut pool, mut ledger, position_id) = new_customizable_pool();
        let owner = key(OWNER);
        let fees = TokenTransferFees::default();
        let clock = clock_at(2, 1_100);

        let locked = ledger
            .permanent_lock_position(&mut pool, position_id, &owner)
            .unwrap();
        assert_eq!(locked, LIQUIDITY);
        let position = ledger.get_position(position_id).unwrap();
        assert_eq!(position.unlocked_liquidity, 0);
        assert_eq!(position.permanent_locked_liquidity, LIQUIDITY);
        assert_eq!(pool.permanent_lock_liquidity, LIQUIDITY);

        assert_pool_error(
            ledger.remove_liquidity(&mut pool, position_id, &owner, &remove_params(Some(LIQUIDITY)), &fees, &clock),
            PoolError::InsufficientLiquidity,
        );
        assert_pool_error(
            ledger.remove_liquidity(&mut pool, position_id, &owner, &remove_params(None), &fees, &clock),
            PoolError::AmountIsZero,
        );
        assert_pool_error(
            ledger.close_position(position_id, &owner),
            PoolError::PositionNotEmpty,
        );
    }

    #[test]
    fn test_lock_and_refresh_vesting() {
        let (_, mut pool, mut ledger, position_id) = new_customizable_pool();
        let owner = key(OWNER);
        let params = VestingParameters {
            cliff_point: Some(2_000),
            period_frequency: 100,
            cliff_unlock_liquidity: LIQUIDITY / 10,
            liquidity_per_period: LIQUIDITY / 10,
            number_of_period: 4,
        };
        let vesting_id = ledger
            .lock_position(&mut pool, position_id, &owner, &params, &clock_at(2, 1_500))
            .unwrap();
        let position = ledger.get_position(position_id).unwrap();
        assert_eq!(position.vested_liquidity, LIQUIDITY / 2);
        assert_eq!(position.unlocked_liquidity, LIQUIDITY / 2);

        assert_eq!(ledger.refresh_vesting(&pool, position_id, &clock_at(3, 1_999)).unwrap(), 0);
        assert_eq!(
            ledger.get_vesting(vesting_id).unwrap().state(1_999).unwrap(),
            VestingState::Active
        );
        let released = ledger
            .refresh_vesting(&pool, position_id, &clock_at(4, 2_150))
            .unwrap();
        assert_eq!(released, LIQUIDITY / 5);
        assert_eq!(
            ledger.get_vesting(vesting_id).unwrap().state(2_150).unwrap(),
            VestingState::Releasing
        );

        ledger
            .refresh_vesting(&pool, position_id, &clock_at(5, 10_000))
            .unwrap();
        assert_pool_error(ledger.get_vesting(vesting_id), PoolError::VestingNotFound);
        let position = ledger.get_position(position_id).unwrap();
        assert_eq!(position.vested_liquidity, 0);
        assert_eq!(position.unlocked_liquidity, LIQUIDITY);
    }

    #[test]
    fn test_refresh_past_last_period_completes_vesting() {
        let (_, mut pool, mut ledger, position_id) = new_customizable_pool();
        let owner = key(OWNER);
        let params = VestingParameters {
            cliff_point: Some(2_000),
            period_frequency: 50,
            cliff_unlock_liquidity: LIQUIDITY / 8,
            liquidity_per_period: LIQUIDITY / 16,
            number_of_period: 6,
        };
        let locked = params.get_total_lock_amount().unwrap();
        let vesting_id = ledger
            .lock_position(&mut pool, position_id, &owner, &params, &clock_at(2, 1_500))
            .unwrap();
        let unlocked_before = ledger.get_position(position_id).unwrap().unlocked_liquidity;
        let mut record = *ledger.get_vesting(vesting_id).unwrap();
        assert_eq!(record.state(1_500).unwrap(), VestingState::Active);

        let released = ledger
            .refresh_vesting(&pool, position_id, &clock_at(3, 2_301))
            .unwrap();
        assert_eq!(released, locked);
        record.accumulate_released_liquidity(released).unwrap();
        assert_eq!(record.total_released_liquidity, locked);
        assert_eq!(record.state(2_301).unwrap(), VestingState::Completed);

        assert_pool_error(ledger.get_vesting(vesting_id), PoolError::VestingNotFound);
        assert_eq!(ledger.vestings_of(position_id).count(), 0);
        let position = ledger.get_position(position_id).unwrap();
        assert_eq!(position.unlocked_liquidity, unlocked_before + locked);
        assert_eq!(position.vested_liquidity, 0);

        assert_eq!(
            ledger.refresh_vesting(&pool, position_id, &clock_at(4, 3_000)).unwrap(),
            0
        );
    }

    #[test]
    fn test_lock_rejects_more_than_unlocked() {
        let (_, mut pool, mut ledger, position_id) = new_customizable_pool();
        let params = VestingParameters {
            cliff_point: None,
            cliff_unlock_liquidity: LIQUIDITY + 1,
            ..Default::default()
        };
        assert_pool_error(
            ledger.lock_position(&mut pool, position_id, &key(OWNER), &params, &clock_at(2, 1_500)),
            PoolError::InsufficientLiquidity,
        );
    }

    #[test]
    fn test_split_position_rules() {
        let (_, mut pool, mut ledger, first_id) = new_customizable_pool();
        let owner = key(OWNER);
        let clock = clock_at(2, 1_100);
        let second_id = ledger.create_position(&mut pool, key(2)).unwrap();

        assert_pool_error(
            ledger.split_position2(&mut pool, first_id, &owner, first_id, &owner, 1, &clock),
            PoolError::SamePosition,
        );
        assert_pool_error(
            ledger.split_position2(&mut pool, first_id, &owner, second_id, &key(2), 0, &clock),
            PoolError::InvalidSplitPositionParameters,
        );
        assert_pool_error(
            ledger.split_position2(
                &mut pool,
                first_id,
                &owner,
                second_id,
                &key(2),
                SPLIT_POSITION_DENOMINATOR + 1,
                &clock,
            ),
            PoolError::InvalidSplitPositionParameters,
        );
        // a fee-only split of a position with no pending fee moves nothing
        let fee_only = SplitPositionParameters {
            fee_a_percentage: 50,
            ..Default::default()
        };
        assert_pool_error(
            ledger.split_position(&mut pool, first_id, &owner, second_id, &key(2), &fee_only, &clock),
            PoolError::InvalidSplitPositionParameters,
        );

        let half = SplitPositionParameters {
            unlocked_liquidity_percentage: 50,
            ..Default::default()
        };
        let split = ledger
            .split_position(&mut pool, first_id, &owner, second_id, &key(2), &half, &clock)
            .unwrap();
        assert_eq!(split.unlocked_liquidity, LIQUIDITY / 2);
        assert_eq!(
            ledger.get_position(second_id).unwrap().unlocked_liquidity,
            LIQUIDITY / 2
        );
        assert_eq!(pool.liquidity, LIQUIDITY);
    }

    #[test]
    fn test_close_empty_position() {
        let (_, mut pool, mut ledger, _) = new_customizable_pool();
        let position_id = ledger.create_position(&mut pool, key(3)).unwrap();
        assert_eq!(pool.metrics.total_position, 2);
        assert_pool_error(
            ledger.close_position(position_id, &key(4)),
            PoolError::InvalidPositionOwner,
        );
        ledger.close_position(position_id, &key(3)).unwrap();
        assert_pool_error(ledger.get_position(position_id), PoolError::PositionNotFound);
    }
}
