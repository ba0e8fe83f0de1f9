//! Constant product AMM exchange core
//!
//! Sqrt-price curve math, scheduled and volatility based trading fees, and
//! the position ledger (liquidity, fees, vesting, rewards) of a single pool.
//! Operations take the caller's clock and capabilities explicitly and leave
//! state untouched when they fail.

pub mod base_fee;
pub mod constants;
pub mod curve;
pub mod dynamic_fee;
pub mod errors;
pub mod events;
pub mod fee;
pub mod liquidity;
pub mod operator;
pub mod pool;
pub mod position;
pub mod reward;
pub mod safe_math;
pub mod state;
pub mod swap;
pub mod utils;
pub mod vesting;

// Re-export the entry points for convenience
pub use errors::PoolError;
pub use liquidity::{PositionId, PositionLedger, VestingId};
pub use operator::{Operator, OperatorPermission};
pub use pool::{
    claim_partner_fee, initialize_customizable_pool, initialize_pool,
    initialize_pool_with_dynamic_config, Pool,
};
pub use swap::{quote, swap, SwapBatch, SwapMode, SwapParameters2, SwapRequest};
