pub mod cli;
pub mod snapshot;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;
use futures::StreamExt;
use futures::stream::BoxStream;
use num_bigint::BigUint;
use rust_decimal::Decimal;
use tracing::{Instrument, info};

use cache::{ComputationScope, ComputationalCache};
use common::logger::{TraceId, init_logger, root_span};
use exchange::asset_conversion::AssetConversionFactory;
use exchange::memory::{InMemoryChainRegistry, InMemoryPoolSource, InMemorySubmitter};
use exchange::model::SlippageCheck;
use exchange::{
    AssetId, ChainId, Percent, SwapDirection, SwapExecuteArgs, SwapLimit, SwapQuote,
    SwapQuoteArgs,
};
use swap::{SwapService, SwapServiceConfig};

use cli::{Cli, Command};
use snapshot::NetworkSnapshot;

const FIRST_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);
const OFFLINE_ORIGIN: &str = "swapctl";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = SwapServiceConfig::from_env();
    init_logger("swapctl", cli.json_logs || config.log_json);

    let snapshot = NetworkSnapshot::load(&cli.snapshot)?;
    let service = build_service(&snapshot, config)?;

    let trace_id = TraceId::default();
    let scope = ComputationScope::new();

    let result = run(&service, &snapshot, cli.command, &scope)
        .instrument(root_span("swapctl", &trace_id))
        .await;

    // Releases every cached exchange and shared stream.
    scope.cancel();
    result
}

fn build_service(
    snapshot: &NetworkSnapshot,
    config: SwapServiceConfig,
) -> anyhow::Result<SwapService> {
    let pools = Arc::new(InMemoryPoolSource::new());
    for (chain_id, reserves) in snapshot.pool_reserves()? {
        pools.set_pools(chain_id, reserves);
    }
    let submitter = Arc::new(InMemorySubmitter::new(snapshot.network_fee()?));

    info!(
        chains = snapshot.chains.len(),
        pools = snapshot.pools.len(),
        "network snapshot loaded"
    );

    Ok(SwapService::new(
        ComputationalCache::new(),
        Arc::new(InMemoryChainRegistry::new(snapshot.chains.clone())),
        Arc::new(AssetConversionFactory::new(pools, submitter)),
        config,
    ))
}

async fn run(
    service: &SwapService,
    snapshot: &NetworkSnapshot,
    command: Command,
    scope: &ComputationScope,
) -> anyhow::Result<()> {
    match command {
        Command::Quote {
            chain,
            from,
            to,
            amount,
            direction,
            slippage,
        } => {
            let chain_id = ChainId::new(chain);
            let quote = quote(
                service,
                snapshot,
                &chain_id,
                (from, to),
                amount,
                direction.into(),
                scope,
            )
            .await?;
            print_quote(&quote);

            if let Some(slippage) = slippage {
                print_limits(service, &chain_id, &quote, slippage, scope).await?;
            }
        }

        Command::Fee {
            chain,
            from,
            to,
            amount,
            fee_asset,
        } => {
            let chain_id = ChainId::new(chain);
            let quote = quote(
                service,
                snapshot,
                &chain_id,
                (from, to),
                amount,
                SwapDirection::SpecifiedIn,
                scope,
            )
            .await?;

            let slippage = service
                .slippage_config(&chain_id, scope)
                .await?
                .map(|config| config.default_slippage)
                .unwrap_or_default();

            let custom_fee_asset = match fee_asset {
                Some(id) => Some(snapshot.asset(&chain_id, id)?.clone()),
                None => None,
            };

            let args = SwapExecuteArgs {
                asset_in: snapshot.asset(&chain_id, from)?.clone(),
                asset_out: snapshot.asset(&chain_id, to)?.clone(),
                route: quote.route.clone(),
                swap_limit: SwapLimit::from_quote(&quote, slippage),
                custom_fee_asset,
                origin: OFFLINE_ORIGIN.into(),
            };

            let fee = service.estimate_fee(&args, scope).await?;
            println!("fee asset:    {}", fee.fee_asset);
            println!("network fee:  {}", fee.network_fee);
            println!("ed buy-in:    {}", fee.minimum_balance_buy_in);
        }

        Command::Directions { chain, asset } => {
            let assets = match (chain, asset) {
                (Some(chain), Some(asset)) => {
                    let asset = AssetId::new(chain, asset);
                    let stream = service.available_swap_directions_for(&asset, scope).await?;
                    first_snapshot(stream).await?
                }
                (chain, _) => {
                    let stream = service.assets_available_for_swap(scope).await?;
                    let assets = first_snapshot(stream).await?;
                    match chain {
                        Some(chain) => assets
                            .into_iter()
                            .filter(|asset| asset.chain_id.as_str() == chain)
                            .collect(),
                        None => assets,
                    }
                }
            };

            let mut assets: Vec<_> = assets.into_iter().collect();
            assets.sort();
            for asset in assets {
                println!("{asset}");
            }
        }

        Command::Slippage { chain } => {
            let chain_id = ChainId::new(chain);
            let config = service
                .slippage_config(&chain_id, scope)
                .await?
                .ok_or_else(|| anyhow!("no exchange on chain {chain_id}"))?;

            let tips: Vec<String> = config.slippage_tips.iter().map(|t| t.to_string()).collect();
            println!("default:      {}", config.default_slippage);
            println!("tips:         {}", tips.join(", "));
            println!(
                "accepted:     {} .. {}",
                config.min_available_slippage, config.max_available_slippage
            );
            println!(
                "warn outside: {} .. {}",
                config.small_slippage, config.big_slippage
            );
        }
    }

    Ok(())
}

async fn quote(
    service: &SwapService,
    snapshot: &NetworkSnapshot,
    chain_id: &ChainId,
    (from, to): (u32, u32),
    amount: BigUint,
    swap_direction: SwapDirection,
    scope: &ComputationScope,
) -> anyhow::Result<SwapQuote> {
    let args = SwapQuoteArgs {
        token_in: snapshot.token(snapshot.asset(chain_id, from)?),
        token_out: snapshot.token(snapshot.asset(chain_id, to)?),
        amount,
        swap_direction,
    };

    service
        .quote(&args, scope)
        .await
        .with_context(|| format!("quote {from} -> {to} on {chain_id} failed"))
}

fn print_quote(quote: &SwapQuote) {
    let route: Vec<String> = quote.route.iter().map(|hop| hop.to_string()).collect();

    println!("route:        {}", route.join(" -> "));
    println!("amount in:    {}", quote.amount_in);
    println!("amount out:   {}", quote.amount_out);
    println!("price impact: {}", quote.price_impact);
}

async fn print_limits(
    service: &SwapService,
    chain_id: &ChainId,
    quote: &SwapQuote,
    slippage: Decimal,
    scope: &ComputationScope,
) -> anyhow::Result<()> {
    let slippage = Percent::new(slippage);

    if let Some(config) = service.slippage_config(chain_id, scope).await? {
        match config.validate(slippage) {
            SlippageCheck::Ok => {}
            SlippageCheck::OutOfRange => {
                return Err(anyhow!(
                    "slippage {slippage} outside {} .. {}",
                    config.min_available_slippage,
                    config.max_available_slippage
                ));
            }
            check => eprintln!("warning: slippage {slippage} looks {check:?}"),
        }
    }

    match SwapLimit::from_quote(quote, slippage) {
        SwapLimit::SpecifiedIn { amount_out_min, .. } => {
            println!("min received: {amount_out_min}");
        }
        SwapLimit::SpecifiedOut { amount_in_max, .. } => {
            println!("max sold:     {amount_in_max}");
        }
    }

    Ok(())
}

async fn first_snapshot(
    mut stream: BoxStream<'static, HashSet<AssetId>>,
) -> anyhow::Result<HashSet<AssetId>> {
    tokio::time::timeout(FIRST_SNAPSHOT_TIMEOUT, stream.next())
        .await
        .context("no swap directions published in time")?
        .ok_or_else(|| anyhow!("swap directions stream ended"))
}
