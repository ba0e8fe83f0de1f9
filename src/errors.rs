use anchor_lang::prelude::error_code;

#[error_code]
#[derive(PartialEq)]
pub enum PoolError {
    #[msg("Math operation overflow")]
    MathOverflow,
    #[msg("Invalid fee setup")]
    InvalidFee,
    #[msg("Invalid input")]
    InvalidInput,
    #[msg("Type cast error")]
    TypeCastFailed,
    #[msg("Undetermined error")]
    UndeterminedError,
    #[msg("Amount is zero")]
    AmountIsZero,
    #[msg("Exceeded slippage tolerance")]
    ExceededSlippage,
    #[msg("Price range is violated")]
    PriceRangeViolation,
    #[msg("Invalid price range")]
    InvalidPriceRange,
    #[msg("Invalid minimum liquidity")]
    InvalidMinimumLiquidity,
    #[msg("Insufficient liquidity")]
    InsufficientLiquidity,
    #[msg("Invalid parameters")]
    InvalidParameters,
    #[msg("Exceeded max fee bps")]
    ExceedMaxFeeBps,
    #[msg("Invalid base fee mode")]
    InvalidBaseFeeMode,
    #[msg("Invalid fee time scheduler")]
    InvalidFeeTimeScheduler,
    #[msg("Invalid fee rate limiter")]
    InvalidFeeRateLimiter,
    #[msg("Invalid fee market cap scheduler")]
    InvalidFeeMarketCapScheduler,
    #[msg("Invalid dynamic fee parameters")]
    InvalidDynamicFeeParameters,
    #[msg("Invalid collect fee mode")]
    InvalidCollectFeeMode,
    #[msg("Invalid activation type")]
    InvalidActivationType,
    #[msg("Invalid activation point")]
    InvalidActivationPoint,
    #[msg("Invalid pool status")]
    InvalidPoolStatus,
    #[msg("Pool is disabled")]
    PoolDisabled,
    #[msg("Pool is not activated yet")]
    PoolNotActivated,
    #[msg("Invalid token mint")]
    InvalidTokenMint,
    #[msg("Same token mint")]
    SameTokenMint,
    #[msg("Invalid vesting information")]
    InvalidVestingInfo,
    #[msg("Vesting record not found")]
    VestingNotFound,
    #[msg("Position not found")]
    PositionNotFound,
    #[msg("Invalid position owner")]
    InvalidPositionOwner,
    #[msg("Position is not empty")]
    PositionNotEmpty,
    #[msg("Same position")]
    SamePosition,
    #[msg("Invalid split position parameters")]
    InvalidSplitPositionParameters,
    #[msg("Invalid permission")]
    InvalidPermission,
    #[msg("Invalid authority to create the pool")]
    InvalidAuthorityToCreateThePool,
    #[msg("Invalid config type")]
    InvalidConfigType,
    #[msg("Config is still referenced by pools")]
    ConfigInUse,
    #[msg("Invalid partner account")]
    InvalidPartnerAccount,
    #[msg("Fail to validate single swap instruction in rate limiter")]
    FailToValidateSingleSwapInstruction,
    #[msg("Cannot update base fee")]
    CannotUpdateBaseFee,
    #[msg("Invalid update pool fees parameters")]
    InvalidUpdatePoolFeesParameters,
    #[msg("Invalid reward index")]
    InvalidRewardIndex,
    #[msg("Invalid reward duration")]
    InvalidRewardDuration,
    #[msg("Reward already initialized")]
    RewardInitialized,
    #[msg("Reward not initialized")]
    RewardUninitialized,
    #[msg("Identical funder")]
    IdenticalFunder,
    #[msg("Invalid funder")]
    InvalidFunder,
    #[msg("Reward campaign in progress")]
    RewardCampaignInProgress,
    #[msg("Reward duration is the same")]
    IdenticalRewardDuration,
    #[msg("Reward has not ended")]
    RewardNotEnded,
    #[msg("Must withdraw ineligible reward")]
    MustWithdrawnIneligibleReward,
    #[msg("Reward vault is frozen, must skip reward to proceed")]
    RewardVaultFrozenSkipRequired,
}

#[cfg(test)]
pub(crate) fn assert_pool_error<T: std::fmt::Debug>(
    result: anchor_lang::Result<T>,
    expected: PoolError,
) {
    match result {
        Err(anchor_lang::error::Error::AnchorError(e)) => {
            assert_eq!(e.error_code_number, u32::from(expected), "{}", e.error_msg)
        }
        other => panic!("expected {:?}, got {:?}", expected, other),
    }
}
