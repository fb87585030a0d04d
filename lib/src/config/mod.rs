// lib/src/config/mod.rs
//
// Configuration is layered: built-in defaults, then the YAML file, then
// `HMS__SECTION__KEY` environment variables (a `.env` file is read first).

pub mod config_defaults;
pub mod config_structs;

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use tracing::{debug, info};

pub use config_defaults::{DEFAULT_CONFIG_PATH, ENV_PREFIX};
pub use config_structs::{
    AuthSettings, ExportSettings, HospitalConfig, IndexDefinition, NotificationSettings, ServerSettings,
    StorageSettings, SyncSettings,
};

/// Loads the configuration. An explicitly named file must exist; the default
/// path is optional.
pub fn load_config(path: Option<&Path>) -> Result<HospitalConfig> {
    if dotenv::dotenv().is_ok() {
        debug!("Loaded environment from .env");
    }

    let (file, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (Path::new(DEFAULT_CONFIG_PATH).to_path_buf(), false),
    };

    let settings = Config::builder()
        .add_source(File::from(file.clone()).format(FileFormat::Yaml).required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(config_defaults::ENV_SEPARATOR)
                .separator(config_defaults::ENV_SEPARATOR)
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to read configuration from {}", file.display()))?;

    let config: HospitalConfig = settings
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    info!("Configuration loaded (storage engine: {:?})", config.storage.engine);
    Ok(config)
}

/// Parses a YAML document directly, without file or environment layers.
pub fn config_from_yaml(yaml: &str) -> Result<HospitalConfig> {
    let settings = Config::builder()
        .add_source(File::from_str(yaml, FileFormat::Yaml))
        .build()
        .context("Failed to parse configuration")?;
    settings.try_deserialize().context("Failed to deserialize configuration")
}
