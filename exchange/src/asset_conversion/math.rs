//! Constant-product pricing with the LP fee expressed in permille.

use num_traits::Zero;

use crate::error::ExchangeError;
use crate::types::Balance;

pub const FEE_DENOMINATOR: u32 = 1000;

/// Amount received for selling `amount_in` into a pool.
pub fn out_given_in(
    amount_in: &Balance,
    reserve_in: &Balance,
    reserve_out: &Balance,
    fee_permille: u32,
) -> Result<Balance, ExchangeError> {
    if amount_in.is_zero() {
        return Err(ExchangeError::ZeroAmount);
    }
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(ExchangeError::InsufficientLiquidity);
    }

    let in_with_fee = amount_in * (FEE_DENOMINATOR - fee_permille);
    let numerator = &in_with_fee * reserve_out;
    let denominator = reserve_in * FEE_DENOMINATOR + &in_with_fee;
    let amount_out = numerator / denominator;

    if amount_out.is_zero() || &amount_out >= reserve_out {
        return Err(ExchangeError::InsufficientLiquidity);
    }
    Ok(amount_out)
}

/// Amount that must be sold to receive exactly `amount_out`.
pub fn in_given_out(
    amount_out: &Balance,
    reserve_in: &Balance,
    reserve_out: &Balance,
    fee_permille: u32,
) -> Result<Balance, ExchangeError> {
    if amount_out.is_zero() {
        return Err(ExchangeError::ZeroAmount);
    }
    if reserve_in.is_zero() || amount_out >= reserve_out {
        return Err(ExchangeError::InsufficientLiquidity);
    }

    let numerator = reserve_in * amount_out * FEE_DENOMINATOR;
    let denominator = (reserve_out - amount_out) * (FEE_DENOMINATOR - fee_permille);

    Ok(numerator / denominator + 1u32)
}
