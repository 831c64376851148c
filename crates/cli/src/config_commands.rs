use std::path::Path;

use {
    anyhow::{Result, bail},
    gemexp_config::validate::{self, Diagnostic, Severity},
};

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
        Severity::Info => CYAN,
    }
}

fn format_diagnostic(d: &Diagnostic) -> String {
    let location = if d.path.is_empty() {
        String::new()
    } else {
        format!("{}: ", d.path)
    };
    format!(
        "  {BOLD}{}{}{RESET} {location}{}",
        color(d.severity),
        d.severity,
        d.message
    )
}

/// `gemexp check`: validate the config file, errors first.
///
/// Fails when any diagnostic is an error so scripts can gate on the exit code.
pub fn check(path: Option<&Path>, verbose: bool) -> Result<()> {
    let result = validate::validate(path);

    match &result.config_path {
        Some(path) => eprintln!("Checking {}", path.display()),
        None => eprintln!("No config file found, checking built-in defaults"),
    }

    let mut shown: Vec<&Diagnostic> = result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .collect();
    shown.sort_by_key(|d| d.severity);
    for d in &shown {
        eprintln!("{}", format_diagnostic(d));
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    match (errors, warnings) {
        (0, 0) => eprintln!("Config OK."),
        _ => eprintln!("{errors} error(s), {warnings} warning(s)"),
    }

    if result.has_errors() {
        bail!("config has {errors} error(s)");
    }
    Ok(())
}
