use std::path::PathBuf;

use anyhow::{Context, Result};
use soulflow_policy_center::{load_snapshot_with_options, LoadOptions, ModeSnapshot};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// `RUST_LOG` wins over `level`; `debug` forces DEBUG. Logs go to stderr so
/// structured output on stdout stays parseable.
pub fn init_logging(level: &str, debug: bool, json: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.context("Failed to initialize logging")?;

    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.clone(),
        None => {
            // Priority: ./config/soulflow.yaml > ~/.config/soulflow/soulflow.yaml
            let local_config = PathBuf::from("config/soulflow.yaml");
            if local_config.exists() {
                local_config
            } else {
                let mut path = dirs::config_dir().context("Failed to get config directory")?;
                path.push("soulflow");
                path.push("soulflow.yaml");
                path
            }
        }
    };

    if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .await
            .context("Failed to read config file")?;

        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded configuration from: {}", config_path.display());
        Ok(LoadedConfig {
            config,
            path: config_path,
        })
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        Ok(LoadedConfig {
            config: Config::default(),
            path: config_path,
        })
    }
}

/// Execution mode snapshot: builtin defaults, the configured policy files,
/// then the environment layers.
pub fn load_mode_snapshot(config: &Config) -> Result<ModeSnapshot> {
    let options = LoadOptions {
        paths: config.policy_paths.clone(),
        include_env: true,
        include_cli_env: true,
    };
    load_snapshot_with_options(&options).context("Failed to load execution mode policy")
}
