//! Request and result types shared by every exchange backend.

use num_bigint::BigUint;
use num_traits::Zero;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::percent::{Perbill, Percent};
use crate::types::{AssetId, Balance, ChainAsset, ChainId, SwapDirection, Token};

/// A quote request. The backend is picked by `token_in`'s chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapQuoteArgs {
    pub token_in: Token,
    pub token_out: Token,
    /// Amount on the side named by `swap_direction`.
    pub amount: Balance,
    pub swap_direction: SwapDirection,
}

/// What a backend answers for a quote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetExchangeQuote {
    /// The amount on the side the caller did not specify.
    pub quote: Balance,
    /// Assets the quote was priced through, `asset_in` first.
    pub route: Vec<AssetId>,
}

/// Backend-agnostic quote with both amounts resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapQuote {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    pub amount_in: Balance,
    pub amount_out: Balance,
    pub direction: SwapDirection,
    pub price_impact: Percent,
    pub route: Vec<AssetId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapFee {
    /// Asset the network fee is charged in.
    pub fee_asset: AssetId,
    pub network_fee: Balance,
    /// Extra amount that must be bought so the fee asset account stays alive.
    pub minimum_balance_buy_in: Balance,
}

/// Bounds the executed swap must respect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapLimit {
    SpecifiedIn {
        amount_in: Balance,
        amount_out_min: Balance,
    },
    SpecifiedOut {
        amount_out: Balance,
        amount_in_max: Balance,
    },
}

impl SwapLimit {
    /// Applies `slippage` to the side the quote did not fix.
    ///
    /// The minimum out is rounded down and the maximum in is rounded up.
    pub fn from_quote(quote: &SwapQuote, slippage: Percent) -> Self {
        let tolerance = BigUint::from(slippage.to_perbill().parts());
        let accuracy = BigUint::from(Perbill::ACCURACY);

        match quote.direction {
            SwapDirection::SpecifiedIn => {
                let kept = &accuracy - &tolerance;
                SwapLimit::SpecifiedIn {
                    amount_in: quote.amount_in.clone(),
                    amount_out_min: &quote.amount_out * kept / &accuracy,
                }
            }
            SwapDirection::SpecifiedOut => {
                let widened = &quote.amount_in * (&accuracy + &tolerance);
                let mut amount_in_max = &widened / &accuracy;
                if !(&widened % &accuracy).is_zero() {
                    amount_in_max += 1u32;
                }
                SwapLimit::SpecifiedOut {
                    amount_out: quote.amount_out.clone(),
                    amount_in_max,
                }
            }
        }
    }

    pub fn direction(&self) -> SwapDirection {
        match self {
            SwapLimit::SpecifiedIn { .. } => SwapDirection::SpecifiedIn,
            SwapLimit::SpecifiedOut { .. } => SwapDirection::SpecifiedOut,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapExecuteArgs {
    pub asset_in: ChainAsset,
    pub asset_out: ChainAsset,
    /// Route from the quote; recomputed by the backend when empty.
    pub route: Vec<AssetId>,
    pub swap_limit: SwapLimit,
    /// Pay the network fee in this asset instead of the utility asset.
    pub custom_fee_asset: Option<ChainAsset>,
    /// Submitting account.
    pub origin: String,
}

/// Handle of a submitted swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtrinsicSubmission {
    pub hash: String,
    pub chain_id: ChainId,
    pub origin: String,
}

/// How a user-chosen slippage compares to a backend's recommended range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlippageCheck {
    Ok,
    /// Likely to fail on small price moves.
    TooSmall,
    /// Exposes the user to a bad execution price.
    TooBig,
    /// Not accepted at all.
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlippageConfig {
    pub default_slippage: Percent,
    pub slippage_tips: Vec<Percent>,
    pub min_available_slippage: Percent,
    pub max_available_slippage: Percent,
    pub small_slippage: Percent,
    pub big_slippage: Percent,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self {
            default_slippage: Percent::new(dec!(0.5)),
            slippage_tips: vec![
                Percent::new(dec!(0.1)),
                Percent::new(dec!(0.5)),
                Percent::new(dec!(1)),
            ],
            min_available_slippage: Percent::new(dec!(0.01)),
            max_available_slippage: Percent::new(dec!(50)),
            small_slippage: Percent::new(dec!(0.1)),
            big_slippage: Percent::new(dec!(5)),
        }
    }
}

impl SlippageConfig {
    pub fn validate(&self, slippage: Percent) -> SlippageCheck {
        if slippage < self.min_available_slippage || slippage > self.max_available_slippage {
            SlippageCheck::OutOfRange
        } else if slippage < self.small_slippage {
            SlippageCheck::TooSmall
        } else if slippage > self.big_slippage {
            SlippageCheck::TooBig
        } else {
            SlippageCheck::Ok
        }
    }
}
