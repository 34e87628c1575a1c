use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use eyre::Result;
use futures::future::try_join_all;
use rust_decimal::Decimal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use pulse_liquidity_sim::config::SimConfig;
use pulse_liquidity_sim::dexscreener::{DexScreenerClient, ReserveSnapshotProvider};
use pulse_liquidity_sim::display::{
    print_correlation, print_hearts_law_projection, print_history, print_pool_info, print_step,
};
use pulse_liquidity_sim::export::HistoryExporter;
use pulse_liquidity_sim::pools::TradeDirection;
use pulse_liquidity_sim::simulation::{
    project_hearts_law, AmmEngine, CorrelationTracker, ExperimentalPrice, SharedAsset, SimulationSession,
};

#[derive(Parser)]
#[command(name = "pulse-sim")]
#[command(about = "Constant-product liquidity impact and Hearts Law simulator (educational only)", long_about = None)]
struct Cli {
    /// Swap fee in bps withheld from each trade input (overrides SIM_FEE_BPS)
    #[arg(long, global = true)]
    fee_bps: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    /// Sell asset A (base token) into the pool
    AToB,
    /// Sell asset B (quote token) into the pool
    BToA,
}

impl From<DirectionArg> for TradeDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::AToB => TradeDirection::AToB,
            DirectionArg::BToA => TradeDirection::BToA,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate chained trades against one pool
    Impact {
        /// Label for this run, e.g. hex
        name: String,

        /// Pair address (token address with --token)
        address: String,

        /// Pool the token's total liquidity against USD instead of reading one pair
        #[arg(long)]
        token: bool,

        /// Direction of positive amounts; negative amounts trade the other way
        #[arg(long, value_enum, default_value = "b-to-a")]
        direction: DirectionArg,

        /// Trade sizes in units of the --direction input asset, applied in order
        #[arg(long = "amount", required = true, num_args = 1.., allow_negative_numbers = true)]
        amounts: Vec<Decimal>,

        /// Append steps as JSON Lines to this file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Simulate trades on a primary pool and carry the price move into paired pools
    HeartsLaw {
        /// Symbol of the token being analysed, e.g. HEX
        name: String,

        /// Primary pair address the trades run against
        primary: String,

        /// Paired pool addresses sharing an asset with the primary pool
        #[arg(required = true)]
        paired: Vec<String>,

        /// Symbol of the asset the pools share
        #[arg(long)]
        shared: String,

        /// Direction of positive amounts; negative amounts trade the other way
        #[arg(long, value_enum, default_value = "b-to-a")]
        direction: DirectionArg,

        /// Trade sizes on the primary pool, applied in order
        #[arg(long = "amount", num_args = 1.., allow_negative_numbers = true)]
        amounts: Vec<Decimal>,

        /// Apply each implied price to the paired pools as it is computed
        #[arg(long)]
        commit: bool,

        /// What-if USD price of a pair asset, e.g. WPLS=0.001; repeat for each pair asset
        #[arg(long = "paired-usd", value_name = "SYMBOL=PRICE")]
        paired_usd: Vec<ExperimentalPrice>,

        /// Append steps and correlations as JSON Lines to this file
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

async fn run_impact(
    config: &SimConfig,
    name: &str,
    address: &str,
    token: bool,
    direction: TradeDirection,
    amounts: &[Decimal],
    export: Option<PathBuf>,
) -> Result<()> {
    let client = DexScreenerClient::new(config)?;
    let engine = AmmEngine::new(config.fee_bps)?;

    let mut session = if token {
        let snapshot = client.token_snapshot(address).await?;
        SimulationSession::new(snapshot.into_pool_state()?, engine)?
    } else {
        SimulationSession::from_provider(&client, address, engine).await?
    };

    print_pool_info(name, session.pool(), session.engine().fee_bps());

    for amount in amounts {
        let step = session.execute_signed(direction, *amount)?;
        print_step(step);
    }

    print_history(session.history());

    if let Some(path) = export {
        let written = HistoryExporter::open(&path)?.export_history(name, session.history())?;
        println!("\n  {} steps appended to {}", written, path.display());
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_hearts_law(
    config: &SimConfig,
    name: &str,
    primary: &str,
    paired: &[String],
    shared: &str,
    direction: TradeDirection,
    amounts: &[Decimal],
    commit: bool,
    paired_usd: &[ExperimentalPrice],
    export: Option<PathBuf>,
) -> Result<()> {
    let client = DexScreenerClient::new(config)?;
    let engine = AmmEngine::new(config.fee_bps)?;
    let shared = SharedAsset::new(shared);

    let addresses: Vec<&str> = std::iter::once(primary)
        .chain(paired.iter().map(String::as_str))
        .collect();
    let snapshots = try_join_all(addresses.iter().map(|a| client.pair_snapshot(a))).await?;
    info!("Fetched {} pool snapshots", snapshots.len());

    let mut pools = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        pools.push(snapshot.into_pool_state()?);
    }
    let primary_pool = pools.remove(0);

    let mut session = SimulationSession::new(primary_pool, engine)?;
    // Fails fast with UnsharedAsset if the primary pool lacks the shared asset
    shared.resolve_in(session.pool())?;

    let mut trackers = Vec::with_capacity(pools.len());
    for pool in pools {
        trackers.push(CorrelationTracker::new(pool, shared.clone())?);
    }

    print_pool_info(name, session.pool(), session.engine().fee_bps());

    for amount in amounts {
        let step = session.execute_signed(direction, *amount)?;
        let step_index = step.step_index();
        print_step(step);

        for tracker in trackers.iter_mut() {
            tracker.follow(session.history())?;
            if commit {
                tracker.commit(step_index)?;
            }
        }
    }

    print_history(session.history());
    for tracker in &trackers {
        print_correlation(tracker);
    }

    if !paired_usd.is_empty() {
        let current_pools = std::iter::once(session.pool()).chain(trackers.iter().map(|t| t.paired()));
        for pool in current_pools {
            match project_hearts_law(pool, name, paired_usd)? {
                Some(projection) => print_hearts_law_projection(&projection),
                None => warn!(
                    pool = pool.address(),
                    pair = %pool.pair_label(),
                    token = name,
                    "token or pair asset price missing, skipping projection"
                ),
            }
        }
    }

    if let Some(path) = export {
        let mut exporter = HistoryExporter::open(&path)?;
        let mut written = exporter.export_history(name, session.history())?;
        for tracker in &trackers {
            written += exporter.export_correlation(name, tracker)?;
        }
        println!("\n  {} records appended to {}", written, path.display());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let config = SimConfig::from_env()?.with_fee_bps(cli.fee_bps)?;
    config.log_config();

    match cli.command {
        Commands::Impact { name, address, token, direction, amounts, export } => {
            run_impact(&config, &name, &address, token, direction.into(), &amounts, export).await
        }
        Commands::HeartsLaw {
            name,
            primary,
            paired,
            shared,
            direction,
            amounts,
            commit,
            paired_usd,
            export,
        } => {
            run_hearts_law(
                &config,
                &name,
                &primary,
                &paired,
                &shared,
                direction.into(),
                &amounts,
                commit,
                &paired_usd,
                export,
            )
            .await
        }
    }
}
