//! Checked arithmetic
//!
//! Every overflow, underflow or division by zero is reported as
//! `PoolError::MathOverflow` together with the call site.
use anchor_lang::prelude::msg;
use ethnum::U256;
use std::panic::Location;

use crate::PoolError;

pub trait SafeMath<T>: Sized {
    fn safe_add(self, rhs: Self) -> Result<Self, PoolError>;
    fn safe_sub(self, rhs: Self) -> Result<Self, PoolError>;
    fn safe_mul(self, rhs: Self) -> Result<Self, PoolError>;
    fn safe_div(self, rhs: Self) -> Result<Self, PoolError>;
    fn safe_rem(self, rhs: Self) -> Result<Self, PoolError>;
    fn safe_shl(self, offset: T) -> Result<Self, PoolError>;
    fn safe_shr(self, offset: T) -> Result<Self, PoolError>;
}

#[track_caller]
fn math_error() -> PoolError {
    let caller = Location::caller();
    msg!("Math error thrown at {}:{}", caller.file(), caller.line());
    PoolError::MathOverflow
}

macro_rules! checked_impl {
    ($t:ty, $offset:ty) => {
        impl SafeMath<$offset> for $t {
            #[track_caller]
            fn safe_add(self, v: $t) -> Result<$t, PoolError> {
                self.checked_add(v).ok_or_else(math_error)
            }

            #[track_caller]
            fn safe_sub(self, v: $t) -> Result<$t, PoolError> {
                self.checked_sub(v).ok_or_else(math_error)
            }

            #[track_caller]
            fn safe_mul(self, v: $t) -> Result<$t, PoolError> {
                self.checked_mul(v).ok_or_else(math_error)
            }

            #[track_caller]
            fn safe_div(self, v: $t) -> Result<$t, PoolError> {
                self.checked_div(v).ok_or_else(math_error)
            }

            #[track_caller]
            fn safe_rem(self, v: $t) -> Result<$t, PoolError> {
                self.checked_rem(v).ok_or_else(math_error)
            }

            #[track_caller]
            fn safe_shl(self, v: $offset) -> Result<$t, PoolError> {
                self.checked_shl(v).ok_or_else(math_error)
            }

            #[track_caller]
            fn safe_shr(self, v: $offset) -> Result<$t, PoolError> {
                self.checked_shr(v).ok_or_else(math_error)
            }
        }
    };
}

checked_impl!(u16, u32);
checked_impl!(u32, u32);
checked_impl!(u64, u32);
checked_impl!(u128, u32);
checked_impl!(usize, u32);
checked_impl!(U256, u32);

pub trait SafeCast<T>: Sized {
    fn safe_cast(self) -> Result<T, PoolError>;
}

macro_rules! try_into_impl {
    ($t:ty, $v:ty) => {
        impl SafeCast<$v> for $t {
            #[track_caller]
            fn safe_cast(self) -> Result<$v, PoolError> {
                self.try_into().map_err(|_| {
                    let caller = Location::caller();
                    msg!("TypeCast is failed at {}:{}", caller.file(), caller.line());
                    PoolError::TypeCastFailed
                })
            }
        }
    };
}

try_into_impl!(u128, u64);
try_into_impl!(u64, u16);
try_into_impl!(u64, u32);
try_into_impl!(i64, u64);
try_into_impl!(usize, u16);

impl SafeCast<u128> for U256 {
    #[track_caller]
    fn safe_cast(self) -> Result<u128, PoolError> {
        if self > U256::from(u128::MAX) {
            let caller = Location::caller();
            msg!("TypeCast is failed at {}:{}", caller.file(), caller.line());
            return Err(PoolError::TypeCastFailed);
        }
        Ok(self.as_u128())
    }
}

impl SafeCast<u64> for U256 {
    #[track_caller]
    fn safe_cast(self) -> Result<u64, PoolError> {
        let value: u128 = self.safe_cast()?;
        value.safe_cast()
    }
}
