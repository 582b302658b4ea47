mod circle;
mod coolers;
mod simulate;
mod zones;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "coolfleet-cli")]
#[command(about = "Cooler fleet geofencing tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List mock coolers, optionally filtered
    Coolers {
        /// Number of coolers to generate
        #[arg(long, default_value = "200")]
        count: usize,
        /// Seed for the generator (defaults to `COOLFLEET_MOCK_SEED`, then 1)
        #[arg(long)]
        seed: Option<u64>,
        /// `active`, `inactive` or a status label
        #[arg(long)]
        status: Option<String>,
        /// Substring of name, city or province
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        province: Option<String>,
        /// Print the records as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print a circular geofence as a `GeoJSON` feature
    Circle {
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Radius in meters (defaults to `COOLFLEET_DEFAULT_RADIUS_M`)
        #[arg(long)]
        radius: Option<f64>,
        #[arg(long, default_value_t = coolfleet_core::CIRCLE_STEPS)]
        steps: usize,
    },
    /// Run the breach monitor against simulated telemetry
    Simulate {
        #[arg(long, default_value = "20")]
        count: usize,
        /// Number of reporting rounds
        #[arg(long, default_value = "60")]
        ticks: u32,
        /// Seconds between rounds
        #[arg(long, default_value = "60")]
        interval_secs: i64,
        #[arg(long)]
        seed: Option<u64>,
        /// Chance per round that a stationary cooler starts to wander
        #[arg(long, default_value = "0.02")]
        drift_probability: f64,
        /// Zone file to seed geofences from (defaults to one fence per cooler)
        #[arg(long)]
        zones: Option<PathBuf>,
    },
    /// Validate a zone file against a mock fleet
    CheckZones {
        path: PathBuf,
        #[arg(long, default_value = "200")]
        count: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = coolfleet_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let default_seed = config.mock_seed.unwrap_or(1);
    match cli.command {
        Some(Commands::Coolers {
            count,
            seed,
            status,
            search,
            city,
            province,
            json,
        }) => {
            let filter = coolfleet_core::CoolerFilter {
                status,
                search,
                city,
                province,
            };
            coolers::run_coolers(count, seed.unwrap_or(default_seed), &filter, json)?;
        }
        Some(Commands::Circle {
            lng,
            lat,
            radius,
            steps,
        }) => {
            let radius = radius.unwrap_or(config.default_radius_meters);
            circle::run_circle(lng, lat, radius, steps)?;
        }
        Some(Commands::Simulate {
            count,
            ticks,
            interval_secs,
            seed,
            drift_probability,
            zones,
        }) => {
            let options = simulate::SimulationOptions {
                count,
                ticks,
                interval: chrono::Duration::seconds(interval_secs.max(1)),
                seed: seed.unwrap_or(default_seed),
                drift_probability,
                zones: zones.map(|p| coolfleet_core::load_zones(&p)).transpose()?,
                policy: config.breach_policy(),
            };
            simulate::run_simulate(&options)?;
        }
        Some(Commands::CheckZones { path, count, seed }) => {
            zones::run_check_zones(&path, count, seed.unwrap_or(default_seed))?;
        }
        None => println!("coolfleet-cli: run with --help for commands"),
    }

    Ok(())
}

#[cfg(test)]
mod tests;
