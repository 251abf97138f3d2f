use anyhow::Result;
use clap::Parser;
use power_forecast::{config::Config, telemetry, ForecastEngine};
use std::path::PathBuf;
use tracing::info;

/// Train and evaluate a power-consumption forecaster from CSV inputs.
#[derive(Debug, Parser)]
#[command(name = "power-forecast", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, env = "POWER_FORECAST_CONFIG", default_value = power_forecast::config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Power table: timestamp or Year/Month columns plus a power column
    #[arg(long)]
    power_csv: Option<PathBuf>,

    /// Optional weather table keyed by timestamp
    #[arg(long)]
    weather_csv: Option<PathBuf>,

    /// Directory receiving predictions, sample, model and metrics
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Name of the model directory under the output directory
    #[arg(long)]
    model_name: Option<String>,
}

impl Cli {
    fn apply(self, mut cfg: Config) -> Config {
        if let Some(path) = self.power_csv {
            cfg.pipeline.power_csv = Some(path);
        }
        if let Some(path) = self.weather_csv {
            cfg.pipeline.weather_csv = Some(path);
        }
        if let Some(dir) = self.output_dir {
            cfg.pipeline.output_dir = dir;
        }
        if let Some(name) = self.model_name {
            cfg.pipeline.model_name = name;
        }
        cfg
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)?;
    let cfg = cli.apply(cfg);
    cfg.validate()?;

    info!(
        power = ?cfg.pipeline.power_csv,
        weather = ?cfg.pipeline.weather_csv,
        output = %cfg.pipeline.output_dir.display(),
        "starting power forecast run"
    );

    let summary = ForecastEngine::new(cfg).run()?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
