use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::GemExpConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["gemexp.toml", "gemexp.yaml", "gemexp.yml", "gemexp.json"];

/// Env var that overrides `api_key` when set and non-empty.
pub const API_KEY_ENV: &str = "GEMEXP_API_KEY";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<GemExpConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./gemexp.{toml,yaml,yml,json}`
/// 2. `~/.config/gemexp/gemexp.{toml,yaml,yml,json}`
///
/// Returns `GemExpConfig::default()` if no config file is found or it fails
/// to parse. Env overrides are applied either way.
pub fn discover_and_load() -> GemExpConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                GemExpConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            GemExpConfig::default()
        },
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config
}

/// Apply environment overrides using `lookup` (usually `std::env::var`).
pub fn apply_env_overrides(config: &mut GemExpConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
        debug!(var = API_KEY_ENV, "api key taken from environment");
        config.api_key = Secret::new(key);
    }
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dirs = directories::ProjectDirs::from("", "", "gemexp")?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dirs.config_dir().join(name))
        .find(|p| p.exists())
}

/// Parse `raw` according to the extension of `path` (TOML when absent).
pub fn parse_config(raw: &str, path: &Path) -> anyhow::Result<GemExpConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
