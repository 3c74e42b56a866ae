pub mod config;
pub mod infer;
pub mod snapshot;

use std::fs;
use std::path::Path;

use groundline_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};
use groundline_core::domain::records::{InputCostChange, RawActivityRecord, RecordBundle};
use serde::Serialize;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_INPUT: u8 = 3;
pub const EXIT_MISSING_CREDENTIAL: u8 = 4;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Successful command whose stdout is the document itself.
    pub fn document<T: Serialize>(command: &str, document: &T) -> Self {
        match serde_json::to_string_pretty(document) {
            Ok(output) => Self { exit_code: 0, output },
            Err(error) => Self::failure(
                command,
                "serialization",
                format!("failed to encode output: {error}"),
                EXIT_INPUT,
            ),
        }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str, options: LoadOptions) -> Result<AppConfig, CommandResult> {
    let config = AppConfig::load(options).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    })?;
    init_logging(&config.logging);
    Ok(config)
}

/// Reads either a record bundle object or a bare array of tagged records.
pub(crate) fn load_records(
    command: &str,
    path: &Path,
) -> Result<(Vec<RawActivityRecord>, Vec<InputCostChange>), CommandResult> {
    let raw = read_input(command, path)?;
    let value = parse_input::<serde_json::Value>(command, path, &raw)?;
    if value.is_array() {
        let records = parse_input::<Vec<RawActivityRecord>>(command, path, &raw)?;
        return Ok((records, Vec::new()));
    }
    Ok(parse_input::<RecordBundle>(command, path, &raw)?.into_records())
}

pub(crate) fn read_input(command: &str, path: &Path) -> Result<String, CommandResult> {
    fs::read_to_string(path).map_err(|error| {
        CommandResult::failure(
            command,
            "input",
            format!("failed to read {}: {error}", path.display()),
            EXIT_INPUT,
        )
    })
}

pub(crate) fn parse_input<T: serde::de::DeserializeOwned>(
    command: &str,
    path: &Path,
    raw: &str,
) -> Result<T, CommandResult> {
    serde_json::from_str(raw).map_err(|error| {
        CommandResult::failure(
            command,
            "input",
            format!("failed to parse {}: {error}", path.display()),
            EXIT_INPUT,
        )
    })
}

/// Logs go to stderr; stdout carries only the JSON result. Later calls in
/// the same process keep the first subscriber.
pub fn init_logging(logging: &LoggingConfig) {
    use tracing::Level;

    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
