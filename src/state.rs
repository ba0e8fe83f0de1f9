use anchor_lang::prelude::*;
use anchor_lang::prelude::borsh;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{
    constants::{
        activation::{
            MAX_ACTIVATION_SLOT_DURATION, MAX_ACTIVATION_TIME_DURATION, MAX_VESTING_SLOT_DURATION,
            MAX_VESTING_TIME_DURATION,
        },
        fee::{PARTNER_FEE_PERCENT, PROTOCOL_FEE_PERCENT, REFERRAL_FEE_PERCENT},
        MAX_PERCENTAGE, MAX_RATE_LIMITER_DURATION_IN_SECONDS, MAX_RATE_LIMITER_DURATION_IN_SLOTS,
        MAX_SQRT_PRICE, MIN_SQRT_PRICE,
    },
    fee::PoolFeeParameters,
    PoolError,
};

/// Unit of the clock a pool is scheduled against
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum ActivationType {
    Slot,
    Timestamp,
}

impl ActivationType {
    pub fn from_u8_checked(value: u8) -> Result<Self> {
        Ok(Self::from_u8(value).ok_or(PoolError::InvalidActivationType)?)
    }

    pub fn get_current_point(&self, clock: &Clock) -> Result<u64> {
        match self {
            ActivationType::Slot => Ok(clock.slot),
            ActivationType::Timestamp => Ok(u64::try_from(clock.unix_timestamp)
                .map_err(|_| PoolError::TypeCastFailed)?),
        }
    }

    pub fn get_max_activation_duration(&self) -> u64 {
        match self {
            ActivationType::Slot => MAX_ACTIVATION_SLOT_DURATION,
            ActivationType::Timestamp => MAX_ACTIVATION_TIME_DURATION,
        }
    }

    pub fn get_max_vesting_duration(&self) -> u64 {
        match self {
            ActivationType::Slot => MAX_VESTING_SLOT_DURATION,
            ActivationType::Timestamp => MAX_VESTING_TIME_DURATION,
        }
    }

    pub fn get_max_rate_limiter_duration(&self) -> u64 {
        match self {
            ActivationType::Slot => u64::from(MAX_RATE_LIMITER_DURATION_IN_SLOTS),
            ActivationType::Timestamp => u64::from(MAX_RATE_LIMITER_DURATION_IN_SECONDS),
        }
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, AnchorSerialize, AnchorDeserialize)]
pub enum TradeDirection {
    AtoB,
    BtoA,
}

/// Token leg the trading fee is denominated in
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum CollectFeeMode {
    BothToken,
    OnlyB,
}

impl CollectFeeMode {
    pub fn from_u8_checked(value: u8) -> Result<Self> {
        Ok(Self::from_u8(value).ok_or(PoolError::InvalidCollectFeeMode)?)
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum PoolStatus {
    Enable,
    Disable,
}

impl PoolStatus {
    pub fn from_u8_checked(value: u8) -> Result<Self> {
        Ok(Self::from_u8(value).ok_or(PoolError::InvalidPoolStatus)?)
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum PoolType {
    Permissionless,
    Customizable,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum ConfigType {
    Static,
    Dynamic,
}

/// Pool creation template
///
/// A static config fixes every pool policy field. A dynamic config only names
/// the identity allowed to create pools, which then supplies its own fees.
#[derive(Clone, Debug, PartialEq, AnchorSerialize, AnchorDeserialize)]
pub struct Config {
    pub index: u64,
    pub config_type: u8,
    pub pool_creator_authority: Pubkey,
    pub pool_fees: PoolFeeParameters,
    pub protocol_fee_percent: u8,
    pub partner_fee_percent: u8,
    pub referral_fee_percent: u8,
    pub activation_type: u8,
    pub collect_fee_mode: u8,
    pub sqrt_min_price: u128,
    pub sqrt_max_price: u128,
    /// Pools created from this config
    pub pool_count: u64,
}

#[derive(Clone, Debug, PartialEq, AnchorSerialize, AnchorDeserialize)]
pub struct StaticConfigParameters {
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

#[derive(Clone, Copy, Debug, PartialEq, AnchorSerialize, AnchorDeserialize)]
pub struct DynamicConfigParameters {
    pub pool_creator_authority: Pubkey,
}

impl StaticConfigParameters {
    /// Parameters using the default protocol, partner and referral split
    pub fn with_default_split(
        pool_fees: PoolFeeParameters,
        sqrt_min_price: u128,
        sqrt_max_price: u128,
        activation_type: ActivationType,
        collect_fee_mode: CollectFeeMode,
    ) -> Self {
        Self {
            pool_fees,
            sqrt_min_price,
            sqrt_max_price,
            pool_creator_authority: Pubkey::default(),
            activation_type: activation_type as u8,
            collect_fee_mode: collect_fee_mode as u8,
            protocol_fee_percent: PROTOCOL_FEE_PERCENT,
            partner_fee_percent: PARTNER_FEE_PERCENT,
            referral_fee_percent: REFERRAL_FEE_PERCENT,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_price_range(self.sqrt_min_price, self.sqrt_max_price)?;
        let activation_type = ActivationType::from_u8_checked(self.activation_type)?;
        let collect_fee_mode = CollectFeeMode::from_u8_checked(self.collect_fee_mode)?;
        validate_fee_split(
            self.protocol_fee_percent,
            self.partner_fee_percent,
            self.referral_fee_percent,
        )?;
        self.pool_fees.validate(collect_fee_mode, activation_type)?;
        Ok(())
    }
}

impl Config {
    pub fn new_static(index: u64, params: &StaticConfigParameters) -> Self {
        Self {
            index,
            config_type: ConfigType::Static as u8,
            pool_creator_authority: params.pool_creator_authority,
            pool_fees: params.pool_fees.clone(),
            protocol_fee_percent: params.protocol_fee_percent,
            partner_fee_percent: params.partner_fee_percent,
            referral_fee_percent: params.referral_fee_percent,
            activation_type: params.activation_type,
            collect_fee_mode: params.collect_fee_mode,
            sqrt_min_price: params.sqrt_min_price,
            sqrt_max_price: params.sqrt_max_price,
            pool_count: 0,
        }
    }

    pub fn new_dynamic(index: u64, params: &DynamicConfigParameters) -> Self {
        Self {
            index,
            config_type: ConfigType::Dynamic as u8,
            pool_creator_authority: params.pool_creator_authority,
            pool_fees: PoolFeeParameters::default(),
            protocol_fee_percent: PROTOCOL_FEE_PERCENT,
            partner_fee_percent: PARTNER_FEE_PERCENT,
            referral_fee_percent: REFERRAL_FEE_PERCENT,
            activation_type: 0,
            collect_fee_mode: 0,
            sqrt_min_price: 0,
            sqrt_max_price: 0,
            pool_count: 0,
        }
    }

    pub fn get_config_type(&self) -> Result<ConfigType> {
        Ok(ConfigType::from_u8(self.config_type).ok_or(PoolError::InvalidConfigType)?)
    }

    pub fn has_pool_creator_authority(&self) -> bool {
        self.pool_creator_authority != Pubkey::default()
    }
}

/// Unix timestamp of the clock, used by reward and volatility accounting
pub fn get_current_timestamp(clock: &Clock) -> Result<u64> {
    ActivationType::Timestamp.get_current_point(clock)
}

pub fn validate_price_range(sqrt_min_price: u128, sqrt_max_price: u128) -> Result<()> {
    require!(
        sqrt_min_price >= MIN_SQRT_PRICE
            && sqrt_max_price <= MAX_SQRT_PRICE
            && sqrt_min_price < sqrt_max_price,
        PoolError::InvalidPriceRange
    );
    Ok(())
}

/// Referral is carved out of the protocol share, partner out of the LP share
pub fn validate_fee_split(
    protocol_fee_percent: u8,
    partner_fee_percent: u8,
    referral_fee_percent: u8,
) -> Result<()> {
    require!(
        referral_fee_percent <= protocol_fee_percent
            && u16::from(protocol_fee_percent) + u16::from(partner_fee_percent)
                <= u16::from(MAX_PERCENTAGE),
        PoolError::InvalidFee
    );
    Ok(())
}
