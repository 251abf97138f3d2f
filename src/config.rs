use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ForecastError, Result};
pub use crate::ml::TrainingConfig;

pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "POWER_FORECAST__";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub training: TrainingConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub power_csv: Option<PathBuf>,
    pub weather_csv: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub model_name: String,
    /// Rows scanned when inferring CSV column types
    pub infer_schema_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            power_csv: None,
            weather_csv: None,
            output_dir: PathBuf::from("outputs/forecasts"),
            model_name: "gbt_model".to_string(),
            infer_schema_rows: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for the job; 0 means one per core.
    pub worker_threads: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Defaults, then `path` (if it exists), then `POWER_FORECAST__*` variables.
    pub fn load_from(path: &Path) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        figment
            .extract()
            .map_err(|e| ForecastError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;

        let name = &self.pipeline.model_name;
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ForecastError::Config(format!(
                "model_name must be a plain directory name, got {name:?}"
            )));
        }
        if self.pipeline.infer_schema_rows == 0 {
            return Err(ForecastError::Config(
                "infer_schema_rows must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pipeline.output_dir, PathBuf::from("outputs/forecasts"));
        assert_eq!(config.pipeline.model_name, "gbt_model");
        assert_eq!(config.training.train_ratio, 0.8);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.max_iter, 50);
        assert_eq!(config.engine.worker_threads, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline]\nmodel_name = \"monthly\"\n\n[training]\nseed = 7").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.pipeline.model_name, "monthly");
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.training.max_iter, 50);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load_from(Path::new("/no/such/config.toml")).unwrap();
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_validate_model_name() {
        let mut config = Config::default();
        config.pipeline.model_name = "../escape".into();
        assert!(matches!(config.validate(), Err(ForecastError::Config(_))));

        config.pipeline.model_name = String::new();
        assert!(config.validate().is_err());
    }
}
