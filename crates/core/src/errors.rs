use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("lookback window must be within 1..=3650 days, got {lookback_days}")]
    InvalidLookback { lookback_days: u32 },
}

/// Hard failures of a decision request. Validation problems with generator
/// output are never surfaced here; they are recorded as `DoctrineViolation`s.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InferenceError {
    #[error("generator `{generator}` has no credential configured")]
    MissingCredential { generator: String },
    #[error("could not serialize inference payload: {0}")]
    Serialization(String),
}

/// Why a candidate Conclusion was rejected. Accumulated as data and used to
/// drive the repair flow.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DoctrineViolation {
    #[error("generator output was not valid JSON")]
    ParseFailed,
    #[error("schema invalid: {}", errors.join("; "))]
    SchemaInvalid { errors: Vec<String> },
    #[error("evidence grounding failed: {}", errors.join("; "))]
    GroundingFailed { errors: Vec<String> },
    #[error("forbidden language detected: {}", terms.join(", "))]
    ForbiddenLanguageDetected { terms: Vec<String> },
    #[error("sample confidence too low: {signal_count} in-window signals")]
    LowSampleConfidence { signal_count: u32 },
}

impl DoctrineViolation {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParseFailed => "parse_failed",
            Self::SchemaInvalid { .. } => "schema_invalid",
            Self::GroundingFailed { .. } => "grounding_failed",
            Self::ForbiddenLanguageDetected { .. } => "forbidden_language_detected",
            Self::LowSampleConfidence { .. } => "low_sample_confidence",
        }
    }
}
