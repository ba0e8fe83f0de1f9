use anchor_lang::prelude::*;

use crate::{liquidity::PositionId, safe_math::SafeMath, PoolError};

/// Phase of a vesting record at a given point
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VestingState {
    /// Before the cliff
    Active,
    Releasing,
    /// Everything released, the record can be reclaimed
    Completed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct VestingParameters {
    /// Defaults to the current point
    pub cliff_point: Option<u64>,
    pub period_frequency: u64,
    pub cliff_unlock_liquidity: u128,
    pub liquidity_per_period: u128,
    pub number_of_period: u16,
}

impl VestingParameters {
    pub fn get_cliff_point(&self, current_point: u64) -> u64 {
        self.cliff_point.unwrap_or(current_point)
    }

    pub fn get_total_lock_amount(&self) -> Result<u128> {
        Ok(self
            .liquidity_per_period
            .safe_mul(self.number_of_period.into())?
            .safe_add(self.cliff_unlock_liquidity)?)
    }

    pub fn validate(&self, current_point: u64, max_vesting_duration: u64) -> Result<()> {
        let cliff_point = self.get_cliff_point(current_point);
        require!(cliff_point >= current_point, PoolError::InvalidVestingInfo);

        if self.number_of_period > 0 {
            require!(
                self.period_frequency > 0 && self.liquidity_per_period > 0,
                PoolError::InvalidVestingInfo
            );
        }

        let vesting_duration = cliff_point
            .safe_sub(current_point)?
            .safe_add(self.period_frequency.safe_mul(self.number_of_period.into())?)?;
        require!(
            vesting_duration <= max_vesting_duration,
            PoolError::InvalidVestingInfo
        );
        require!(self.get_total_lock_amount()? > 0, PoolError::InvalidVestingInfo);
        Ok(())
    }
}

/// Cliff plus periodic release schedule over part of a position
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct Vesting {
    pub position: PositionId,
    pub cliff_point: u64,
    pub period_frequency: u64,
    pub cliff_unlock_liquidity: u128,
    pub liquidity_per_period: u128,
    pub total_released_liquidity: u128,
    pub number_of_period: u16,
}

impl Vesting {
    pub fn new(position: PositionId, params: &VestingParameters, current_point: u64) -> Self {
        Self {
            position,
            cliff_point: params.get_cliff_point(current_point),
            period_frequency: params.period_frequency,
            cliff_unlock_liquidity: params.cliff_unlock_liquidity,
            liquidity_per_period: params.liquidity_per_period,
            total_released_liquidity: 0,
            number_of_period: params.number_of_period,
        }
    }

    pub fn get_total_lock_amount(&self) -> Result<u128> {
        Ok(self
            .liquidity_per_period
            .safe_mul(self.number_of_period.into())?
            .safe_add(self.cliff_unlock_liquidity)?)
    }

    /// Liquidity the schedule allows to be unlocked by `current_point`
    pub fn get_max_unlocked_liquidity(&self, current_point: u64) -> Result<u128> {
        if current_point < self.cliff_point {
            return Ok(0);
        }
        if self.period_frequency == 0 {
            return Ok(self.cliff_unlock_liquidity);
        }
        let period = current_point
            .safe_sub(self.cliff_point)?
            .safe_div(self.period_frequency)?
            .min(self.number_of_period.into());
        Ok(self
            .cliff_unlock_liquidity
            .safe_add(self.liquidity_per_period.safe_mul(period.into())?)?)
    }

    pub fn get_new_release_liquidity(&self, current_point: u64) -> Result<u128> {
        let unlocked_liquidity = self.get_max_unlocked_liquidity(current_point)?;
        Ok(unlocked_liquidity.safe_sub(self.total_released_liquidity)?)
    }

    pub fn accumulate_released_liquidity(&mut self, released_liquidity: u128) -> Result<()> {
        self.total_released_liquidity = self.total_released_liquidity.safe_add(released_liquidity)?;
        Ok(())
    }

    pub fn is_done(&self) -> Result<bool> {
        Ok(self.total_released_liquidity == self.get_total_lock_amount()?)
    }

    pub fn state(&self, current_point: u64) -> Result<VestingState> {
        if self.is_done()? {
            Ok(VestingState::Completed)
        } else if current_point < self.cliff_point {
            Ok(VestingState::Active)
        } else {
            Ok(VestingState::Releasing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::assert_pool_error;
    use proptest::prelude::*;

    fn params() -> VestingParameters {
        VestingParameters {
            cliff_point: Some(100),
            period_frequency: 10,
            cliff_unlock_liquidity: 1_000,
            liquidity_per_period: 100,
            number_of_period: 5,
        }
    }

    #[test]
    fn test_validate_vesting_parameters() {
        params().validate(50, 1_000).unwrap();
        assert_pool_error(params().validate(101, 1_000), PoolError::InvalidVestingInfo);
        assert_pool_error(params().validate(50, 99), PoolError::InvalidVestingInfo);

        let mut no_frequency = params();
        no_frequency.period_frequency = 0;
        assert_pool_error(no_frequency.validate(50, 1_000), PoolError::InvalidVestingInfo);

        let empty = VestingParameters {
            cliff_point: None,
            ..Default::default()
        };
        assert_pool_error(empty.validate(0, 1_000), PoolError::InvalidVestingInfo);
    }

    #[test]
    fn test_release_schedule() {
        let mut vesting = Vesting::new(7, &params(), 50);
        assert_eq!(vesting.get_total_lock_amount().unwrap(), 1_500);
        assert_eq!(vesting.state(99).unwrap(), VestingState::Active);
        assert_eq!(vesting.get_new_release_liquidity(99).unwrap(), 0);

        assert_eq!(vesting.get_new_release_liquidity(100).unwrap(), 1_000);
        vesting.accumulate_released_liquidity(1_000).unwrap();
        assert_eq!(vesting.state(100).unwrap(), VestingState::Releasing);

        assert_eq!(vesting.get_new_release_liquidity(125).unwrap(), 200);
        vesting.accumulate_released_liquidity(200).unwrap();
        assert_eq!(vesting.get_new_release_liquidity(10_000).unwrap(), 300);
        vesting.accumulate_released_liquidity(300).unwrap();
        assert_eq!(vesting.state(10_000).unwrap(), VestingState::Completed);
    }

    proptest! {
        #[test]
        fn refresh_converges_to_locked_amount(
            cliff_unlock_liquidity in 0u128..1_000_000,
            liquidity_per_period in 1u128..1_000_000,
            number_of_period in 0u16..200,
            period_frequency in 1u64..1_000,
            steps in proptest::collection::vec(0u64..5_000, 1..20),
        ) {
            let params = VestingParameters {
                cliff_point: Some(0),
                period_frequency,
                cliff_unlock_liquidity,
                liquidity_per_period,
                number_of_period,
            };
            let locked = params.get_total_lock_amount().unwrap();
            prop_assume!(locked > 0);
            prop_assert_eq!(
                locked,
                cliff_unlock_liquidity + u128::from(number_of_period) * liquidity_per_period
            );

            let mut vesting = Vesting::new(0, &params, 0);
            let mut point = 0u64;
            for step in steps {
                point += step;
                let released = vesting.get_new_release_liquidity(point).unwrap();
                vesting.accumulate_released_liquidity(released).unwrap();
                prop_assert!(vesting.total_released_liquidity <= locked);
            }
            let end = period_frequency * u64::from(number_of_period);
            let released = vesting.get_new_release_liquidity(end).unwrap_or(0);
            vesting.accumulate_released_liquidity(released).unwrap();
            prop_assert_eq!(vesting.total_released_liquidity, locked);
            prop_assert_eq!(vesting.state(end).unwrap(), VestingState::Completed);
        }
    }
}
