use anchor_lang::prelude::*;
use num_derive::FromPrimitive;
use static_assertions::const_assert_eq;

use crate::{
    constants::MAX_OPERATION,
    dynamic_fee::DynamicFeeParameters,
    events::{
        EvtClaimProtocolFee, EvtCloseConfig, EvtCreateConfig, EvtCreateDynamicConfig,
        EvtSetPoolStatus, EvtUpdatePoolFees,
    },
    pool::Pool,
    state::{Config, DynamicConfigParameters, PoolStatus, StaticConfigParameters},
    PoolError,
};

/// Capability bits an operator can hold
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum OperatorPermission {
    CreateConfigKey,
    RemoveConfigKey,
    CreateTokenBadge,
    CloseTokenBadge,
    SetPoolStatus,
    InitializeReward,
    UpdateRewardDuration,
    UpdateRewardFunder,
    UpdatePoolFees,
    ClaimProtocolFee,
    ZapProtocolFee,
}

const_assert_eq!(OperatorPermission::ZapProtocolFee as u8 + 1, MAX_OPERATION);

/// Capability set resolved by the caller for one signer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct Operator {
    pub whitelisted_address: Pubkey,
    pub permission: u128,
}

impl Operator {
    pub fn new(whitelisted_address: Pubkey, permission: u128) -> Self {
        Self {
            whitelisted_address,
            permission,
        }
    }

    pub fn with_permissions(whitelisted_address: Pubkey, permissions: &[OperatorPermission]) -> Self {
        let permission = permissions
            .iter()
            .fold(0u128, |acc, permission| acc | (1u128 << *permission as u8));
        Self::new(whitelisted_address, permission)
    }

    pub fn is_permission_allow(&self, permission: OperatorPermission) -> bool {
        self.permission & (1u128 << permission as u8) != 0
    }
}

pub fn require_permission(
    operator: &Operator,
    signer: &Pubkey,
    permission: OperatorPermission,
) -> Result<()> {
    require!(
        operator.whitelisted_address == *signer && operator.is_permission_allow(permission),
        PoolError::InvalidPermission
    );
    Ok(())
}

/// Fee update, each field left `None` is untouched
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct UpdatePoolFeesParameters {
    pub cliff_fee_numerator: Option<u64>,
    /// A zeroed value disables the dynamic fee
    pub dynamic_fee: Option<DynamicFeeParameters>,
}

impl UpdatePoolFeesParameters {
    pub fn validate(&self) -> Result<()> {
        require!(
            self.cliff_fee_numerator.is_some() || self.dynamic_fee.is_some(),
            PoolError::InvalidUpdatePoolFeesParameters
        );
        Ok(())
    }
}

pub fn create_static_config(
    operator: &Operator,
    signer: &Pubkey,
    index: u64,
    params: &StaticConfigParameters,
) -> Result<Config> {
    require_permission(operator, signer, OperatorPermission::CreateConfigKey)?;
    params.validate()?;

    emit!(EvtCreateConfig {
        config_index: index,
        pool_fees: params.pool_fees.clone(),
        sqrt_min_price: params.sqrt_min_price,
        sqrt_max_price: params.sqrt_max_price,
        pool_creator_authority: params.pool_creator_authority,
        activation_type: params.activation_type,
        collect_fee_mode: params.collect_fee_mode,
        protocol_fee_percent: params.protocol_fee_percent,
        partner_fee_percent: params.partner_fee_percent,
        referral_fee_percent: params.referral_fee_percent,
    });
    Ok(Config::new_static(index, params))
}

pub fn create_dynamic_config(
    operator: &Operator,
    signer: &Pubkey,
    index: u64,
    params: &DynamicConfigParameters,
) -> Result<Config> {
    require_permission(operator, signer, OperatorPermission::CreateConfigKey)?;
    require!(
        params.pool_creator_authority != Pubkey::default(),
        PoolError::InvalidParameters
    );

    emit!(EvtCreateDynamicConfig {
        config_index: index,
        pool_creator_authority: params.pool_creator_authority,
    });
    Ok(Config::new_dynamic(index, params))
}

/// Close and drop a config that no pool was created from
pub fn close_config(operator: &Operator, signer: &Pubkey, config: Config) -> Result<()> {
    require_permission(operator, signer, OperatorPermission::RemoveConfigKey)?;
    require!(config.pool_count == 0, PoolError::ConfigInUse);

    emit!(EvtCloseConfig {
        config_index: config.index,
        admin: *signer,
    });
    Ok(())
}

pub fn set_pool_status(
    pool_key: &Pubkey,
    pool: &mut Pool,
    operator: &Operator,
    signer: &Pubkey,
    status: u8,
) -> Result<()> {
    require_permission(operator, signer, OperatorPermission::SetPoolStatus)?;
    PoolStatus::from_u8_checked(status)?;
    require!(pool.pool_status != status, PoolError::InvalidPoolStatus);

    pool.pool_status = status;
    msg!("pool status: {}", status);
    emit!(EvtSetPoolStatus {
        pool: *pool_key,
        status,
    });
    Ok(())
}

/// Update the cliff fee and/or the dynamic fee of a pool
pub fn update_pool_fees(
    pool_key: &Pubkey,
    pool: &mut Pool,
    operator: &Operator,
    signer: &Pubkey,
    params: &UpdatePoolFeesParameters,
    clock: &Clock,
) -> Result<()> {
    require_permission(operator, signer, OperatorPermission::UpdatePoolFees)?;
    params.validate()?;

    let current_point = pool.get_current_point(clock)?;
    let mut updated = pool.clone();
    updated.update_pool_fees(params, current_point)?;
    *pool = updated;

    emit!(EvtUpdatePoolFees {
        pool: *pool_key,
        operator: *signer,
        params: *params,
    });
    Ok(())
}

/// # Returns
/// `(token_a_amount, token_b_amount)` to transfer to the protocol treasury
pub fn claim_protocol_fee(
    pool_key: &Pubkey,
    pool: &mut Pool,
    operator: &Operator,
    signer: &Pubkey,
    max_amount_a: u64,
    max_amount_b: u64,
) -> Result<(u64, u64)> {
    require_permission(operator, signer, OperatorPermission::ClaimProtocolFee)?;
    let (token_a_amount, token_b_amount) = pool.claim_protocol_fee(max_amount_a, max_amount_b)?;

    emit!(EvtClaimProtocolFee {
        pool: *pool_key,
        token_a_amount,
        token_b_amount,
    });
    Ok((token_a_amount, token_b_amount))
}
