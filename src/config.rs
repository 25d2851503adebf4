use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub startup: StartupConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StartupConfig {
    /// Run the reference catalog seed after migrations on every start.
    #[serde(default = "default_seed_on_start")]
    pub seed_on_start: bool,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            seed_on_start: default_seed_on_start(),
        }
    }
}

fn default_seed_on_start() -> bool {
    true
}

impl Config {
    /// Default configuration pointing at the given database file.
    pub fn for_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: path.into(),
                max_connections: default_max_connections(),
            },
            logging: LoggingConfig::default(),
            startup: StartupConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be >= 1");
    }

    match config.logging.level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        other => anyhow::bail!(
            "Unknown logging.level: '{}'. Must be trace, debug, info, warn, or error.",
            other
        ),
    }

    Ok(())
}
