use anchor_lang::prelude::{Clock, Pubkey};
use cp_amm_core::{
    base_fee::{BaseFeeMode, FeeTimeSchedulerParameters},
    constants::{MAX_SQRT_PRICE, MIN_SQRT_PRICE},
    fee::PoolFeeParameters,
    initialize_customizable_pool,
    pool::{InitializeCustomizablePoolParameters, PoolAccounts},
    quote,
    state::{ActivationType, CollectFeeMode, TradeDirection},
    utils::TokenTransferFees,
    SwapMode, SwapParameters2, SwapRequest,
};

fn main() -> anchor_lang::Result<()> {
    // Example: quote a swap on a fresh pool at price 1 with a 0.25% fee
    let clock = Clock {
        slot: 1,
        unix_timestamp: 1_700_000_000,
        ..Clock::default()
    };
    let accounts = PoolAccounts {
        pool: Pubkey::new_from_array([1; 32]),
        token_a_mint: Pubkey::new_from_array([2; 32]),
        token_b_mint: Pubkey::new_from_array([3; 32]),
        token_a_vault: Pubkey::new_from_array([4; 32]),
        token_b_vault: Pubkey::new_from_array([5; 32]),
        creator: Pubkey::new_from_array([6; 32]),
    };
    let params = InitializeCustomizablePoolParameters {
        pool_fees: PoolFeeParameters {
            base_fee: FeeTimeSchedulerParameters {
                cliff_fee_numerator: 2_500_000,
                base_fee_mode: BaseFeeMode::FeeTimeSchedulerLinear as u8,
                ..Default::default()
            }
            .to_base_fee_parameters()?,
            dynamic_fee: None,
        },
        sqrt_min_price: MIN_SQRT_PRICE,
        sqrt_max_price: MAX_SQRT_PRICE,
        liquidity: 1_000_000_000u128 << 64,
        sqrt_price: 1u128 << 64,
        activation_type: ActivationType::Timestamp as u8,
        collect_fee_mode: CollectFeeMode::BothToken as u8,
        activation_point: None,
    };
    let fees = TokenTransferFees::default();
    let initialized = initialize_customizable_pool(&accounts, &params, &fees, &clock)?;
    println!(
        "Pool: deposited {} token A and {} token B",
        initialized.token_a_amount, initialized.token_b_amount
    );

    let amount_in = 1_000_000;
    let request = SwapRequest {
        trade_direction: TradeDirection::AtoB,
        params: SwapParameters2 {
            amount_0: amount_in,
            amount_1: 0,
            swap_mode: SwapMode::ExactIn as u8,
        },
        has_referral: false,
    };
    let result = quote(&initialized.pool, &request, &fees, &clock)?;
    println!(
        "Quote: {} token A in -> {} token B out (lp fee {}, protocol fee {})",
        amount_in,
        result.excluded_transfer_fee_amount_out,
        result.swap_result.lp_fee,
        result.swap_result.protocol_fee
    );
    Ok(())
}
