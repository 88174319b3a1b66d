mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;
    expand_paths(&mut config);

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./mdb.toml",
        "./config.toml",
        "~/.config/mdb/config.toml",
        "/etc/mdb/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    let mut config = Config::default();
    expand_paths(&mut config);
    Ok(config)
}

fn expand_paths(config: &mut Config) {
    let raw = config.database.path.to_string_lossy().into_owned();
    config.database.path = PathBuf::from(shellexpand::tilde(&raw).as_ref());
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.database.pool_size == 0 {
        anyhow::bail!("Database pool size cannot be 0");
    }

    if config.database.path.as_os_str().is_empty() {
        anyhow::bail!("Database path cannot be empty");
    }

    if config.registry.part_type_offset < 1 {
        anyhow::bail!(
            "Part type offset must be positive, got {}",
            config.registry.part_type_offset
        );
    }

    for label in &config.registry.event_part_labels {
        if label.trim().is_empty() {
            anyhow::bail!("Event part labels cannot be blank");
        }
    }

    for (alias, code) in &config.registry.language_aliases {
        if code.len() != 2 {
            anyhow::bail!("Language alias '{}' must map to a two letter code, got '{}'", alias, code);
        }
    }

    if config.events.capacity == 0 {
        anyhow::bail!("Event channel capacity cannot be 0");
    }

    Ok(())
}
