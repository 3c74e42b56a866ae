use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use groundline_core::config::GeneratorConfig;
use groundline_core::errors::InferenceError;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const API_KEY_ENV: &str = "GROUNDLINE_GENERATOR_API_KEY";

/// External text generator producing a candidate Conclusion document.
/// Output is untrusted: it may be empty, malformed or non-compliant.
#[async_trait]
pub trait ConclusionGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Checked once before any call is attempted.
    fn credential_check(&self) -> Result<(), InferenceError> {
        Ok(())
    }

    async fn generate(&self, system_prompt: &str, payload: &Value) -> Result<GeneratorOutput>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorOutput {
    pub raw: String,
    pub parsed: Option<Value>,
}

impl GeneratorOutput {
    /// Parses `raw` as a JSON object, tolerating surrounding whitespace and a
    /// single Markdown code fence.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let parsed = serde_json::from_str::<Value>(strip_code_fence(&raw))
            .ok()
            .filter(Value::is_object);
        Self { raw, parsed }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = body.strip_suffix("```") else {
        return trimmed;
    };
    // Drop an info string such as `json` on the opening fence line.
    match body.split_once('\n') {
        Some((info, rest)) if !info.trim_start().starts_with('{') => rest.trim(),
        _ => body.trim(),
    }
}

/// Runs an external program per call: the request goes to stdin as JSON and
/// the raw candidate is read from stdout.
#[derive(Clone, Debug)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    api_key: Option<SecretString>,
    timeout: Duration,
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    system_prompt: &'a str,
    payload: &'a Value,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self { program: program.into(), args: Vec::new(), api_key: None, timeout }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let program = config
            .command
            .as_deref()
            .map(str::trim)
            .filter(|command| !command.is_empty())
            .ok_or_else(|| anyhow!("generator.command is not configured"))?;
        Ok(Self::new(program, Duration::from_secs(config.timeout_secs))
            .with_args(config.args.clone())
            .with_api_key(config.api_key().cloned()))
    }

    async fn run(&self, request: Vec<u8>) -> Result<Output> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(api_key) = &self.api_key {
            command.env(API_KEY_ENV, api_key.expose_secret());
        }

        let mut child =
            command.spawn().with_context(|| format!("failed to start `{}`", self.program))?;
        let stdin = child.stdin.take();
        let write_request = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&request).await.context("failed to write generator request")?;
                stdin.shutdown().await.context("failed to close generator stdin")?;
            }
            Ok::<_, anyhow::Error>(())
        };
        let collect_output = async move {
            child.wait_with_output().await.context("failed to collect generator output")
        };

        let ((), output) = tokio::try_join!(write_request, collect_output)?;
        Ok(output)
    }
}

#[async_trait]
impl ConclusionGenerator for CommandGenerator {
    fn name(&self) -> &'static str {
        "command"
    }

    fn credential_check(&self) -> Result<(), InferenceError> {
        let present = self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty());
        if present {
            Ok(())
        } else {
            Err(InferenceError::MissingCredential { generator: self.name().to_string() })
        }
    }

    async fn generate(&self, system_prompt: &str, payload: &Value) -> Result<GeneratorOutput> {
        let request = serde_json::to_vec(&CommandRequest { system_prompt, payload })
            .context("failed to encode generator request")?;

        // Covers the stdin write: a child that never reads stalls it once the pipe fills.
        let output = tokio::time::timeout(self.timeout, self.run(request))
            .await
            .map_err(|_| anyhow!("generator timed out after {}s", self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("generator exited with {}: {}", output.status, stderr.trim());
        }

        Ok(GeneratorOutput::from_raw(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}
