use std::env;
use std::fs;
use std::path::Path;

use groundline_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

const REDACTION_PREFIX_LEN: usize = 3;
const REDACTION_MIN_LEN: usize = 12;

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    CommandResult { exit_code: 0, output: render(&config, config_file_path.as_deref()) }
}

fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path)
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "snapshot.lookback_days",
        &config.snapshot.lookback_days.to_string(),
        source("snapshot.lookback_days", &["GROUNDLINE_SNAPSHOT_LOOKBACK_DAYS"]),
    ));
    let report_date = config
        .snapshot
        .report_date
        .map(|date| date.to_string())
        .unwrap_or_else(|| "<today>".to_string());
    lines.push(render_line(
        "snapshot.report_date",
        &report_date,
        source("snapshot.report_date", &["GROUNDLINE_SNAPSHOT_REPORT_DATE"]),
    ));

    lines.push(render_line(
        "generator.mode",
        config.generator.mode.as_str(),
        source("generator.mode", &["GROUNDLINE_GENERATOR_MODE"]),
    ));
    lines.push(render_line(
        "generator.command",
        config.generator.command.as_deref().unwrap_or("<unset>"),
        source("generator.command", &["GROUNDLINE_GENERATOR_COMMAND"]),
    ));
    let api_key = config
        .generator
        .api_key()
        .map(redact_secret)
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(render_line(
        "generator.api_key",
        &api_key,
        source("generator.api_key", &["GROUNDLINE_GENERATOR_API_KEY"]),
    ));
    lines.push(render_line(
        "generator.mock_seed",
        &config.generator.mock_seed.to_string(),
        source("generator.mock_seed", &["GROUNDLINE_GENERATOR_MOCK_SEED"]),
    ));
    lines.push(render_line(
        "generator.timeout_secs",
        &config.generator.timeout_secs.to_string(),
        source("generator.timeout_secs", &["GROUNDLINE_GENERATOR_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["GROUNDLINE_LOGGING_LEVEL", "GROUNDLINE_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        config.logging.format.as_str(),
        source("logging.format", &["GROUNDLINE_LOGGING_FORMAT", "GROUNDLINE_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Shows at most a fixed three-character prefix, and only for secrets long
/// enough that the prefix reveals little.
fn redact_secret(secret: &SecretString) -> String {
    let exposed = secret.expose_secret().trim();
    if exposed.is_empty() {
        return "<empty>".to_string();
    }
    if exposed.chars().count() < REDACTION_MIN_LEN {
        return "<redacted>".to_string();
    }

    let prefix = exposed.chars().take(REDACTION_PREFIX_LEN).collect::<String>();
    format!("{prefix}***")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use secrecy::SecretString;

    use super::{contains_path, redact_secret};

    fn redact(raw: &str) -> String {
        redact_secret(&SecretString::from(raw.to_string()))
    }

    #[test]
    fn redaction_shows_a_fixed_prefix_at_most() {
        assert_eq!(redact("sk-groundline-secret"), "sk-***");
        assert_eq!(redact("mysecretvalue-x"), "mys***");
        assert_eq!(redact("longsecretwithoutdashes"), "lon***");
        assert_eq!(redact("short-key"), "<redacted>");
        assert_eq!(redact("  "), "<empty>");
    }

    #[test]
    fn finds_nested_keys() {
        let doc = "[generator]\nmode = \"mock\"\n".parse::<Value>().expect("toml");
        assert!(contains_path(&doc, "generator.mode"));
        assert!(!contains_path(&doc, "generator.command"));
        assert!(!contains_path(&doc, "logging.level"));
    }
}
