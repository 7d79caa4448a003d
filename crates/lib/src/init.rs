//! Initialize the configuration directory: create ~/.embedfix and a default config file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

static DEFAULT_CONFIG: &str = r#"{
  "discord": {
    "botToken": null
  },
  "rewrite": {
    "dedupCapacity": 1000,
    "maxMessageLength": 2000
  }
}
"#;

/// Create the config directory and write the default `config.json` if it does not exist.
/// Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config, Config};

    #[test]
    fn default_config_parses() {
        let c: Config = serde_json::from_str(DEFAULT_CONFIG).unwrap();
        assert!(c.discord.bot_token.is_none());
        assert_eq!(c.rewrite.dedup_capacity, 1000);
    }

    #[test]
    fn init_writes_config_once() {
        let dir = std::env::temp_dir().join(format!("embedfix-init-{}", std::process::id()));
        let path = dir.join("nested").join("config.json");
        let returned = init_config_dir(&path).unwrap();
        assert_eq!(returned, dir.join("nested"));
        assert!(path.exists());

        std::fs::write(&path, r#"{"rewrite":{"dedupCapacity":7}}"#).unwrap();
        init_config_dir(&path).unwrap();
        let (c, _) = load_config(Some(path)).unwrap();
        assert_eq!(c.rewrite.dedup_capacity, 7);
        let _ = std::fs::remove_dir_all(dir);
    }
}
