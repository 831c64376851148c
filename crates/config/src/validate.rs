//! Configuration validation.
//!
//! Detects unknown/misspelled keys in TOML config files and reports semantic
//! problems (missing api key, unusable URLs, zero timeouts).

use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;

use crate::{loader::parse_config, schema::GemExpConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "messages.timout"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Collection windows longer than this are clamped by the plugin.
const MAX_TIMEOUT_SECS: u64 = 365 * 24 * 60 * 60;

const TOP_LEVEL_KEYS: &[&str] = &[
    "api_key",
    "base_url",
    "model",
    "translate",
    "translate_model",
    "bot_id",
    "bot_name",
    "command",
    "aliases",
    "timeout_secs",
    "rearm",
    "max_reply_depth",
    "max_image_dimension",
    "request_timeout_secs",
    "messages",
];

const MESSAGE_KEYS: &[&str] = &[
    "missing_api_key",
    "prompt",
    "already_waiting",
    "timeout",
    "need_text",
    "need_image",
    "image_failed",
    "translate_failed",
    "processing",
    "failed",
    "image_label",
];

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

/// Validate the config file at `path`, or the discovered one when `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path
        .map(Path::to_path_buf)
        .or_else(crate::loader::find_config_file);

    let Some(actual_path) = config_path else {
        let mut result = validate_config(&GemExpConfig::default());
        result.push(Severity::Info, "", "no config file found; using defaults");
        return result;
    };

    let raw = match std::fs::read_to_string(&actual_path) {
        Ok(raw) => crate::env_subst::substitute_env(&raw),
        Err(e) => {
            let mut result = ValidationResult {
                config_path: Some(actual_path.clone()),
                ..Default::default()
            };
            result.push(
                Severity::Error,
                "",
                format!("failed to read {}: {e}", actual_path.display()),
            );
            return result;
        },
    };

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");

    let mut result = if is_toml {
        validate_toml_str(&raw)
    } else {
        match parse_config(&raw, &actual_path) {
            Ok(cfg) => validate_config(&cfg),
            Err(e) => {
                let mut r = ValidationResult::default();
                r.push(Severity::Error, "", format!("syntax error: {e}"));
                r
            },
        }
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate a TOML document: syntax, unknown keys, then semantics.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            let mut result = ValidationResult::default();
            result.push(Severity::Error, "", format!("syntax error: {e}"));
            return result;
        },
    };

    let mut unknown = ValidationResult::default();
    if let Some(table) = value.as_table() {
        check_keys(table, TOP_LEVEL_KEYS, "", &mut unknown);
        if let Some(messages) = table.get("messages").and_then(toml::Value::as_table) {
            check_keys(messages, MESSAGE_KEYS, "messages", &mut unknown);
        }
    }

    let mut result = match value.try_into::<GemExpConfig>() {
        Ok(cfg) => validate_config(&cfg),
        Err(e) => {
            let mut r = ValidationResult::default();
            r.push(Severity::Error, "", format!("type error: {e}"));
            r
        },
    };
    unknown.diagnostics.append(&mut result.diagnostics);
    result.diagnostics = unknown.diagnostics;
    result
}

fn check_keys(
    table: &toml::map::Map<String, toml::Value>,
    known: &[&str],
    prefix: &str,
    result: &mut ValidationResult,
) {
    for key in table.keys() {
        if known.contains(&key.as_str()) {
            continue;
        }
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        let message = match suggest(key, known, 3) {
            Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
            None => "unknown field".to_string(),
        };
        result.push(Severity::Error, path, message);
    }
}

/// Semantic checks on an already-parsed config.
#[must_use]
pub fn validate_config(config: &GemExpConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !config.has_api_key() {
        result.push(
            Severity::Warning,
            "api_key",
            "no api key configured; every request will be refused",
        );
    } else if config.api_key.expose_secret().contains("${") {
        result.push(
            Severity::Warning,
            "api_key",
            "contains an unresolved ${...} placeholder; is the variable set?",
        );
    }
    if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
        result.push(
            Severity::Error,
            "base_url",
            format!("\"{}\" is not an http(s) URL", config.base_url),
        );
    }
    if config.model.trim().is_empty() {
        result.push(Severity::Error, "model", "model must not be empty");
    }
    if config.command.trim().is_empty() {
        result.push(Severity::Error, "command", "command must not be empty");
    }
    if config.timeout_secs == 0 {
        result.push(
            Severity::Warning,
            "timeout_secs",
            "0 closes every collection window immediately",
        );
    }
    if config.timeout_secs > MAX_TIMEOUT_SECS {
        result.push(
            Severity::Warning,
            "timeout_secs",
            format!("longer than {MAX_TIMEOUT_SECS}s; windows are capped at one year"),
        );
    }
    if config.max_reply_depth == 0 {
        result.push(
            Severity::Info,
            "max_reply_depth",
            "images inside quoted replies will be ignored",
        );
    }
    if config.request_timeout_secs == Some(0) {
        result.push(
            Severity::Error,
            "request_timeout_secs",
            "must be greater than 0 when set",
        );
    }

    result
}
