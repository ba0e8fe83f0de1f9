//! Protocol constants
//!
//! Price bounds, fixed point scales and fee policy limits shared by every module.

pub const MIN_SQRT_PRICE: u128 = 4295048016;

pub const MAX_SQRT_PRICE: u128 = 79226673521066979257578248091;

pub const LIQUIDITY_SCALE: u8 = 128;

pub const REWARD_RATE_SCALE: u8 = 64;

pub const TOTAL_REWARD_SCALE: u8 = 192;

pub const ONE_Q64: u128 = 1u128 << 64;

pub const BIN_STEP_BPS_DEFAULT: u16 = 1;

//  bin_step << 64 / MAX_BASIS_POINT
pub const BIN_STEP_BPS_U128_DEFAULT: u128 = 1844674407370955;

static_assertions::const_assert_eq!(LIQUIDITY_SCALE + REWARD_RATE_SCALE, TOTAL_REWARD_SCALE);

/// Percentages (protocol / partner / referral split) are expressed over 100
pub const MAX_PERCENTAGE: u8 = 100;

pub const NUM_REWARDS: usize = 2;

pub const MIN_REWARD_DURATION: u64 = 24 * 60 * 60; // 1 day

pub const MAX_REWARD_DURATION: u64 = 31536000; // 1 year

pub const SPLIT_POSITION_DENOMINATOR: u32 = 1_000_000_000;

pub const MAX_RATE_LIMITER_DURATION_IN_SECONDS: u32 = 60 * 60 * 12; // 12 hours
pub const MAX_RATE_LIMITER_DURATION_IN_SLOTS: u32 = 108000; // 12 hours

static_assertions::const_assert_eq!(
    MAX_RATE_LIMITER_DURATION_IN_SECONDS * 1000 / 400,
    MAX_RATE_LIMITER_DURATION_IN_SLOTS
);

/// Number of operator permissions currently defined
pub const MAX_OPERATION: u8 = 11;

pub mod activation {
    pub const SLOT_BUFFER: u64 = 9000; // 1 slot = 400 ms => 1 hour

    pub const TIME_BUFFER: u64 = 3600; // 1 hour

    pub const MAX_ACTIVATION_SLOT_DURATION: u64 = SLOT_BUFFER * 24 * 31; // 31 days

    pub const MAX_ACTIVATION_TIME_DURATION: u64 = TIME_BUFFER * 24 * 31; // 31 days

    pub const MAX_VESTING_SLOT_DURATION: u64 = SLOT_BUFFER * 24 * 365 * 10; // 10 years

    pub const MAX_VESTING_TIME_DURATION: u64 = TIME_BUFFER * 24 * 365 * 10; // 10 years
}

pub mod fee {
    /// Default fee denominator. Every fee numerator is expressed over it.
    pub const FEE_DENOMINATOR: u64 = 1_000_000_000;

    /// 100% in basis points
    pub const MAX_BASIS_POINT: u64 = 10_000;

    pub const MAX_FEE_BPS: u64 = 9900; // 99%
    pub const MAX_FEE_NUMERATOR: u64 = 990_000_000; // 99%

    pub const MIN_FEE_BPS: u64 = 1; // 0.01%
    pub const MIN_FEE_NUMERATOR: u64 = 100_000;

    /// Highest cliff fee an operator may set through a pool fee update
    pub const MAX_FEE_NUMERATOR_POST_UPDATE: u64 = 100_000_000; // 10%

    static_assertions::const_assert_eq!(
        MAX_FEE_BPS * FEE_DENOMINATOR / MAX_BASIS_POINT,
        MAX_FEE_NUMERATOR
    );

    static_assertions::const_assert_eq!(
        MIN_FEE_BPS * FEE_DENOMINATOR / MAX_BASIS_POINT,
        MIN_FEE_NUMERATOR
    );

    pub const PROTOCOL_FEE_PERCENT: u8 = 20;

    /// Share of the total trading fee, carved out of the protocol share (20% of 20%)
    pub const REFERRAL_FEE_PERCENT: u8 = 4;

    pub const PARTNER_FEE_PERCENT: u8 = 0;

    static_assertions::const_assert!(REFERRAL_FEE_PERCENT <= PROTOCOL_FEE_PERCENT);

    /// Variable fee can add at most this share of the base fee
    pub const MAX_DYNAMIC_FEE_PERCENT: u8 = 20;

    /// Divisor applied to `(volatility_accumulator * bin_step)^2 * variable_fee_control`
    pub const DYNAMIC_FEE_SCALING_FACTOR: u128 = 100_000_000_000;
}
