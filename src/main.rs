use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use household_energy_forecast::domain::{Frequency, MeterSelection};
use household_energy_forecast::seasons::SeasonGrouping;
use household_energy_forecast::{telemetry, Config, Engine, ViewKind, ViewRequest};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "hef")]
#[command(about = "Household energy meter views and consumption forecasts", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = household_energy_forecast::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resampled meter readings
    AllData {
        /// Household power consumption file
        input: PathBuf,

        /// Resample frequency (H, D, W, M, 15min, 3D, ...)
        #[arg(short, long)]
        frequency: Option<Frequency>,

        /// all_meters, sub_metering_1..3 or not_sub_metering
        #[arg(short, long)]
        meters: Option<MeterSelection>,
    },

    /// Metering sums per season
    BySeason {
        input: PathBuf,

        /// season or year_season
        #[arg(short, long)]
        grouping: Option<SeasonGrouping>,
    },

    /// Forecast monthly total consumption
    Predict {
        input: PathBuf,

        /// Months to forecast
        #[arg(short = 'n', long)]
        horizon: Option<usize>,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)?;
    telemetry::init_tracing(&cfg.logging);

    let (input, kind, request_override) = match cli.command {
        Commands::ShowConfig => {
            print!("{}", cfg.to_toml()?);
            return Ok(());
        }
        Commands::AllData {
            input,
            frequency,
            meters,
        } => (
            input,
            ViewKind::AllData,
            Some(ViewRequest::AllData {
                frequency: frequency.unwrap_or(cfg.resample.frequency),
                meters: meters.unwrap_or(cfg.resample.meters),
            }),
        ),
        Commands::BySeason { input, grouping } => (
            input,
            ViewKind::BySeason,
            grouping.map(|grouping| ViewRequest::BySeason { grouping }),
        ),
        Commands::Predict { input, horizon } => (
            input,
            ViewKind::Predictions,
            horizon.map(|horizon| ViewRequest::Predictions { horizon }),
        ),
    };

    let engine = Engine::from_path(&input, cfg)
        .with_context(|| format!("reading {}", input.display()))?;
    for warning in engine.ingest_warnings() {
        warn!(%warning, "ingestion warning");
    }

    let request = request_override.unwrap_or_else(|| engine.default_request(kind));
    info!(view = %request.kind(), "rendering view");
    let view = engine.render(&request)?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&view)?
    } else {
        serde_json::to_string(&view)?
    };
    println!("{json}");
    Ok(())
}
