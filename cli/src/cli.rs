use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use exchange::SwapDirection;
use num_bigint::BigUint;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DirectionCli {
    /// The amount is what you sell
    In,
    /// The amount is what you buy
    Out,
}

impl From<DirectionCli> for SwapDirection {
    fn from(value: DirectionCli) -> Self {
        match value {
            DirectionCli::In => SwapDirection::SpecifiedIn,
            DirectionCli::Out => SwapDirection::SpecifiedOut,
        }
    }
}

#[derive(Debug, Parser)]
#[clap(name = "swapctl", version)]
pub struct Cli {
    /// Network snapshot: chains, pool reserves and fiat rates (JSON)
    #[clap(long, short)]
    pub snapshot: PathBuf,

    /// One JSON object per log line
    #[clap(long)]
    pub json_logs: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Quote a swap and show its price impact
    Quote {
        #[clap(long)]
        chain: String,

        /// Asset id to sell
        #[clap(long)]
        from: u32,

        /// Asset id to buy
        #[clap(long)]
        to: u32,

        /// Amount in planks
        #[clap(long)]
        amount: BigUint,

        #[clap(long, value_enum, default_value_t = DirectionCli::In)]
        direction: DirectionCli,

        /// Slippage tolerance in percent, used to print swap limits
        #[clap(long)]
        slippage: Option<Decimal>,
    },

    /// Estimate the network fee of a swap
    Fee {
        #[clap(long)]
        chain: String,

        #[clap(long)]
        from: u32,

        #[clap(long)]
        to: u32,

        #[clap(long)]
        amount: BigUint,

        /// Pay the fee in this asset instead of the utility asset
        #[clap(long)]
        fee_asset: Option<u32>,
    },

    /// List swappable assets, or the directions of one asset
    Directions {
        #[clap(long)]
        chain: Option<String>,

        #[clap(long, requires = "chain")]
        asset: Option<u32>,
    },

    /// Show the slippage settings of a chain's exchange
    Slippage {
        #[clap(long)]
        chain: String,
    },
}
