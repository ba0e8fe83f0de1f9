use anchor_lang::prelude::*;
use anchor_spl::token_2022::spl_token_2022::extension::transfer_fee::{
    TransferFeeConfig, MAX_FEE_BASIS_POINTS,
};
use ethnum::U256;

use crate::{
    safe_math::{SafeCast, SafeMath},
    PoolError,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rounding {
    Up,
    Down,
}

/// (x * y) / denominator in 256 bits
pub fn mul_div_u256(x: U256, y: U256, denominator: U256, rounding: Rounding) -> Option<U256> {
    if denominator == U256::ZERO {
        return None;
    }
    let prod = x.checked_mul(y)?;
    match rounding {
        Rounding::Up => {
            let (quotient, remainder) = (prod / denominator, prod % denominator);
            if remainder == U256::ZERO {
                Some(quotient)
            } else {
                quotient.checked_add(U256::ONE)
            }
        }
        Rounding::Down => Some(prod / denominator),
    }
}

pub fn safe_mul_div_cast_u64(x: u64, y: u64, denominator: u64, rounding: Rounding) -> Result<u64> {
    let result = mul_div_u256(
        U256::from(x),
        U256::from(y),
        U256::from(denominator),
        rounding,
    )
    .ok_or(PoolError::MathOverflow)?;
    Ok(result.safe_cast()?)
}

pub fn safe_mul_div_cast_u128(
    x: u128,
    y: u128,
    denominator: u128,
    rounding: Rounding,
) -> Result<u128> {
    let result = mul_div_u256(
        U256::from(x),
        U256::from(y),
        U256::from(denominator),
        rounding,
    )
    .ok_or(PoolError::MathOverflow)?;
    Ok(result.safe_cast()?)
}

/// (x << offset) / y
pub fn safe_shl_div_cast(x: u128, y: u128, offset: u32, rounding: Rounding) -> Result<u128> {
    let result = mul_div_u256(
        U256::from(x),
        U256::ONE.safe_shl(offset)?,
        U256::from(y),
        rounding,
    )
    .ok_or(PoolError::MathOverflow)?;
    Ok(result.safe_cast()?)
}

/// (x * y) >> offset, rounded down
pub fn safe_mul_shr_cast(x: u128, y: u128, offset: u32) -> Result<u64> {
    let prod = U256::from(x).safe_mul(U256::from(y))?;
    Ok(prod.safe_shr(offset)?.safe_cast()?)
}

/// Growth delta times liquidity, shifted back to token units
pub fn safe_mul_shr_256_cast(x: U256, y: U256, offset: u32) -> Result<u64> {
    Ok(x.safe_mul(y)?.safe_shr(offset)?.safe_cast()?)
}

pub fn ceil_div(numerator: u128, denominator: u128) -> Result<u128> {
    Ok(numerator
        .safe_add(denominator)?
        .safe_sub(1)?
        .safe_div(denominator)?)
}

pub fn u256_from_bytes(bytes: &[u8; 32]) -> U256 {
    U256::from_le_bytes(*bytes)
}

pub fn u256_to_bytes(value: U256) -> [u8; 32] {
    value.to_le_bytes()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferFeeIncludedAmount {
    pub amount: u64,
    pub transfer_fee: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferFeeExcludedAmount {
    pub amount: u64,
    pub transfer_fee: u64,
}

/// Token-2022 transfer fee configs of both pool mints at the current epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenTransferFees {
    pub token_a: Option<TransferFeeConfig>,
    pub token_b: Option<TransferFeeConfig>,
    pub epoch: u64,
}

impl TokenTransferFees {
    pub fn new(
        token_a: Option<TransferFeeConfig>,
        token_b: Option<TransferFeeConfig>,
        epoch: u64,
    ) -> Self {
        Self {
            token_a,
            token_b,
            epoch,
        }
    }

    fn config(&self, is_token_a: bool) -> &Option<TransferFeeConfig> {
        if is_token_a {
            &self.token_a
        } else {
            &self.token_b
        }
    }

    /// Amount that lands on the receiver when `amount` is sent
    pub fn excluded_amount(&self, is_token_a: bool, amount: u64) -> Result<TransferFeeExcludedAmount> {
        calculate_transfer_fee_excluded_amount(self.config(is_token_a), amount, self.epoch)
    }

    /// Amount that must be sent so the receiver gets `amount`
    pub fn included_amount(&self, is_token_a: bool, amount: u64) -> Result<TransferFeeIncludedAmount> {
        calculate_transfer_fee_included_amount(self.config(is_token_a), amount, self.epoch)
    }
}

/// Calculate the transfer fee withheld on a transfer of `pre_fee_amount`
///
/// # Arguments
/// * `transfer_fee_config` - The mint transfer fee extension, if any
/// * `pre_fee_amount` - The amount sent
/// * `epoch` - The current epoch
///
/// # Returns
/// The fee withheld by the token program
pub fn get_transfer_fee(
    transfer_fee_config: &Option<TransferFeeConfig>,
    pre_fee_amount: u64,
    epoch: u64,
) -> Result<u64> {
    let Some(transfer_fee_config) = transfer_fee_config else {
        return Ok(0);
    };
    let fee = transfer_fee_config
        .calculate_epoch_fee(epoch, pre_fee_amount)
        .ok_or(PoolError::MathOverflow)?;
    Ok(fee)
}

pub fn calculate_transfer_fee_excluded_amount(
    transfer_fee_config: &Option<TransferFeeConfig>,
    transfer_fee_included_amount: u64,
    epoch: u64,
) -> Result<TransferFeeExcludedAmount> {
    let transfer_fee = get_transfer_fee(transfer_fee_config, transfer_fee_included_amount, epoch)?;
    let amount = transfer_fee_included_amount.safe_sub(transfer_fee)?;
    Ok(TransferFeeExcludedAmount {
        amount,
        transfer_fee,
    })
}

pub fn calculate_transfer_fee_included_amount(
    transfer_fee_config: &Option<TransferFeeConfig>,
    transfer_fee_excluded_amount: u64,
    epoch: u64,
) -> Result<TransferFeeIncludedAmount> {
    if transfer_fee_excluded_amount == 0 {
        return Ok(TransferFeeIncludedAmount {
            amount: 0,
            transfer_fee: 0,
        });
    }
    let Some(transfer_fee_config) = transfer_fee_config else {
        return Ok(TransferFeeIncludedAmount {
            amount: transfer_fee_excluded_amount,
            transfer_fee: 0,
        });
    };

    let epoch_fee = transfer_fee_config.get_epoch_fee(epoch);
    // inverse fee is undefined at 100%, the whole maximum fee is withheld
    let transfer_fee = if u16::from(epoch_fee.transfer_fee_basis_points) == MAX_FEE_BASIS_POINTS {
        u64::from(epoch_fee.maximum_fee)
    } else {
        transfer_fee_config
            .calculate_inverse_epoch_fee(epoch, transfer_fee_excluded_amount)
            .ok_or(PoolError::MathOverflow)?
    };

    let amount = transfer_fee_excluded_amount.safe_add(transfer_fee)?;
    Ok(TransferFeeIncludedAmount {
        amount,
        transfer_fee,
    })
}
