//! Plugin configuration: schema, loading, env substitution, and validation.
//!
//! Config files: `gemexp.toml`, `gemexp.yaml`, or `gemexp.json`
//! Searched in `./` then `~/.config/gemexp/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, discover_and_load, load_config, parse_config},
    schema::{GemExpConfig, Messages, RearmPolicy, render},
    validate::{Diagnostic, Severity, ValidationResult},
};
