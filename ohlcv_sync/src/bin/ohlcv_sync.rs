use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ohlcv_ingestor::retrievers::{
    OhlcvRetriever, archive::KrakenArchiveRetriever, file::CsvRetriever, file::write_csv,
};
use ohlcv_sync::{
    config::SyncConfig,
    puller::{DataPuller, Pull},
    store::SqliteStore,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "OHLCV cache CLI")]
struct Cli {
    /// Path to a TOML config file; defaults apply when omitted
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args)]
struct RangeArgs {
    /// Canonical symbol, e.g. "ETH/BTC"
    #[arg(long)]
    symbol: String,

    /// Bar interval, e.g. "1d", "4h", "15m"
    #[arg(long)]
    timeframe: String,

    /// First day (YYYY-MM-DD, M-D-YYYY or M/D/YYYY)
    #[arg(long)]
    from: String,

    /// Last day, inclusive; defaults to yesterday (UTC)
    #[arg(long)]
    to: Option<String>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Pull a range through the cache and print it as CSV
    Fetch(RangeArgs),

    /// Load exported history into the store
    Seed {
        /// Kraken OHLCVT zip archive
        #[arg(long, conflicts_with = "csv", required_unless_present = "csv")]
        archive: Option<PathBuf>,

        /// CSV with Timestamp,Open,High,Low,Close,Volume,Symbol columns
        #[arg(long)]
        csv: Option<PathBuf>,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// List the stored timeframe partitions
    Partitions,
}

fn report(pull: &Pull) {
    for fill in &pull.fills {
        if fill.is_complete() {
            info!(side = ?fill.side, range = %fill.range, rows = fill.fetched, "gap filled");
        } else {
            warn!(
                side = ?fill.side, range = %fill.range, rows = fill.fetched,
                persisted = fill.persisted, status = ?fill.status,
                "gap not fully filled"
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::load(cli.config.as_deref())?;

    match cli.cmd {
        Cmd::Fetch(args) => {
            let puller = DataPuller::from_config(&config).context("building exchange client")?;
            let pull = puller
                .fetch(&args.symbol, &args.timeframe, &args.from, args.to.as_deref())
                .await?;
            report(&pull);
            write_csv(std::io::stdout().lock(), &pull.candles)?;
        }
        Cmd::Seed {
            archive,
            csv,
            range,
        } => {
            let source: Arc<dyn OhlcvRetriever> = match (archive, csv) {
                (Some(path), _) => Arc::new(KrakenArchiveRetriever::new(path)?),
                (None, Some(path)) => Arc::new(CsvRetriever::new(path)?),
                (None, None) => anyhow::bail!("either --archive or --csv is required"),
            };
            let puller = DataPuller::new()
                .with_sqlite(&config.database_url)
                .with_online(source)
                .with_boundary(config.gap_boundary);
            let pull = puller
                .fetch(&range.symbol, &range.timeframe, &range.from, range.to.as_deref())
                .await?;
            report(&pull);
            let added: usize = pull.fills.iter().map(|f| f.fetched).sum();
            println!("{} rows available, {added} newly seeded", pull.candles.len());
        }
        Cmd::Partitions => {
            for name in SqliteStore::new(&config.database_url).partitions()? {
                println!("{name}");
            }
        }
    }

    Ok(())
}
