use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "groundline.toml";
pub const NESTED_CONFIG_FILE: &str = "config/groundline.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub snapshot: SnapshotConfig,
    pub generator: GeneratorConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    pub lookback_days: u32,
    pub report_date: Option<NaiveDate>,
}

#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub mode: GeneratorMode,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub api_key: Option<SecretString>,
    pub mock_seed: u64,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorMode {
    Mock,
    Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub lookback_days: Option<u32>,
    pub report_date: Option<NaiveDate>,
    pub generator_mode: Option<GeneratorMode>,
    pub generator_command: Option<String>,
    pub mock_seed: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            snapshot: SnapshotConfig { lookback_days: 90, report_date: None },
            generator: GeneratorConfig {
                mode: GeneratorMode::Mock,
                command: None,
                args: Vec::new(),
                api_key: None,
                mock_seed: 7,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl GeneratorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Command => "command",
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for GeneratorMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "command" => Ok(Self::Command),
            other => Err(ConfigError::Validation(format!(
                "unsupported generator mode `{other}` (expected mock|command)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl GeneratorConfig {
    /// The credential with surrounding whitespace ignored; blank keys count
    /// as absent.
    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref().filter(|key| !key.expose_secret().trim().is_empty())
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(snapshot) = patch.snapshot {
            if let Some(lookback_days) = snapshot.lookback_days {
                self.snapshot.lookback_days = lookback_days;
            }
            if let Some(report_date) = snapshot.report_date {
                self.snapshot.report_date = Some(report_date);
            }
        }

        if let Some(generator) = patch.generator {
            if let Some(mode) = generator.mode {
                self.generator.mode = mode;
            }
            if let Some(command) = generator.command {
                self.generator.command = Some(command);
            }
            if let Some(args) = generator.args {
                self.generator.args = args;
            }
            if let Some(api_key) = generator.api_key {
                self.generator.api_key = Some(api_key.into());
            }
            if let Some(mock_seed) = generator.mock_seed {
                self.generator.mock_seed = mock_seed;
            }
            if let Some(timeout_secs) = generator.timeout_secs {
                self.generator.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GROUNDLINE_SNAPSHOT_LOOKBACK_DAYS") {
            self.snapshot.lookback_days = parse_u32("GROUNDLINE_SNAPSHOT_LOOKBACK_DAYS", &value)?;
        }
        if let Some(value) = read_env("GROUNDLINE_SNAPSHOT_REPORT_DATE") {
            self.snapshot.report_date =
                Some(parse_date("GROUNDLINE_SNAPSHOT_REPORT_DATE", &value)?);
        }

        if let Some(value) = read_env("GROUNDLINE_GENERATOR_MODE") {
            self.generator.mode = value.parse()?;
        }
        if let Some(value) = read_env("GROUNDLINE_GENERATOR_COMMAND") {
            self.generator.command = Some(value);
        }
        if let Some(value) = read_env("GROUNDLINE_GENERATOR_API_KEY") {
            self.generator.api_key = Some(value.into());
        }
        if let Some(value) = read_env("GROUNDLINE_GENERATOR_MOCK_SEED") {
            self.generator.mock_seed = parse_u64("GROUNDLINE_GENERATOR_MOCK_SEED", &value)?;
        }
        if let Some(value) = read_env("GROUNDLINE_GENERATOR_TIMEOUT_SECS") {
            self.generator.timeout_secs = parse_u64("GROUNDLINE_GENERATOR_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("GROUNDLINE_LOGGING_LEVEL").or_else(|| read_env("GROUNDLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GROUNDLINE_LOGGING_FORMAT").or_else(|| read_env("GROUNDLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(lookback_days) = overrides.lookback_days {
            self.snapshot.lookback_days = lookback_days;
        }
        if let Some(report_date) = overrides.report_date {
            self.snapshot.report_date = Some(report_date);
        }
        if let Some(mode) = overrides.generator_mode {
            self.generator.mode = mode;
        }
        if let Some(command) = overrides.generator_command {
            self.generator.command = Some(command);
        }
        if let Some(mock_seed) = overrides.mock_seed {
            self.generator.mock_seed = mock_seed;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_snapshot(&self.snapshot)?;
        validate_generator(&self.generator)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(CONFIG_FILE_NAME), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_snapshot(snapshot: &SnapshotConfig) -> Result<(), ConfigError> {
    if snapshot.lookback_days == 0 || snapshot.lookback_days > 3650 {
        return Err(ConfigError::Validation(
            "snapshot.lookback_days must be in range 1..=3650".to_string(),
        ));
    }
    Ok(())
}

fn validate_generator(generator: &GeneratorConfig) -> Result<(), ConfigError> {
    if generator.timeout_secs == 0 || generator.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "generator.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if generator.mode == GeneratorMode::Command {
        let missing =
            generator.command.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "generator.command is required when generator.mode = \"command\"".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_date(key: &str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    snapshot: Option<SnapshotPatch>,
    generator: Option<GeneratorPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SnapshotPatch {
    lookback_days: Option<u32>,
    report_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
struct GeneratorPatch {
    mode: Option<GeneratorMode>,
    command: Option<String>,
    args: Option<Vec<String>>,
    api_key: Option<String>,
    mock_seed: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
