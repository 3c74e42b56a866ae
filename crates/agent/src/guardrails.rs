//! Checks a generator candidate against the doctrine and threads the result
//! through the repair flow as a tagged verdict.
//!
//! Every function here is pure: given the same Snapshot and candidate it
//! returns the same verdict, so each transition can be tested on its own.

use groundline_core::doctrine::{
    scan_forbidden_terms, validate_conclusion_value, ForbiddenScan, ValidationOutcome,
};
use groundline_core::domain::conclusion::Conclusion;
use groundline_core::domain::snapshot::{ConfidenceLevel, Snapshot};
use groundline_core::errors::DoctrineViolation;
use groundline_core::evidence::EvidenceIndex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::GeneratorOutput;

/// Signal count at or below which a low-confidence Snapshot always falls back.
pub const LOW_SAMPLE_SIGNAL_LIMIT: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    GeneratorOutputInvalid,
    GroundingUnrepairable,
    LowSampleConfidence,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneratorOutputInvalid => "generator_output_invalid",
            Self::GroundingUnrepairable => "grounding_unrepairable",
            Self::LowSampleConfidence => "low_sample_confidence",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CandidateVerdict {
    Valid(Conclusion),
    NeedsRewrite,
    /// Structurally sound and clean, but evidence does not ground.
    NeedsPatch(Conclusion),
    Fallback(FallbackReason),
}

impl CandidateVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Distance from a usable Conclusion; higher is closer.
    fn rank(&self) -> u8 {
        match self {
            Self::Valid(_) => 3,
            Self::NeedsPatch(_) => 2,
            Self::NeedsRewrite => 1,
            Self::Fallback(_) => 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub parsed: bool,
    pub schema: ValidationOutcome,
    pub grounding: ValidationOutcome,
    pub forbidden: ForbiddenScan,
    pub conclusion: Option<Conclusion>,
    pub violations: Vec<DoctrineViolation>,
}

impl ValidationReport {
    fn unparsed() -> Self {
        Self {
            parsed: false,
            schema: ValidationOutcome::default(),
            grounding: ValidationOutcome::default(),
            forbidden: ForbiddenScan::default(),
            conclusion: None,
            violations: vec![DoctrineViolation::ParseFailed],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.parsed && self.schema.ok && self.grounding.ok && self.forbidden.is_clean()
    }

    /// Flat error list handed back to the generator on rewrite.
    pub fn errors(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }

    pub fn verdict(&self) -> CandidateVerdict {
        match &self.conclusion {
            Some(conclusion) if self.is_valid() => CandidateVerdict::Valid(conclusion.clone()),
            Some(conclusion) if self.forbidden.is_clean() && !self.grounding.ok => {
                CandidateVerdict::NeedsPatch(conclusion.clone())
            }
            _ => CandidateVerdict::NeedsRewrite,
        }
    }
}

/// Validator bound to one Snapshot. The leaf index is built once and reused
/// for grounding checks and evidence patching.
pub struct CandidateValidator<'a> {
    snapshot: &'a Snapshot,
    index: EvidenceIndex,
}

impl<'a> CandidateValidator<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self { snapshot, index: EvidenceIndex::build(snapshot) }
    }

    pub fn index(&self) -> &EvidenceIndex {
        &self.index
    }

    pub fn evaluate(&self, output: Option<&GeneratorOutput>) -> ValidationReport {
        let Some(value) = output.and_then(|output| output.parsed.as_ref()) else {
            return ValidationReport::unparsed();
        };

        let schema_check = validate_conclusion_value(value);
        let grounding = self.ground(value);
        let forbidden = scan_forbidden_terms(value);

        let mut violations = Vec::new();
        if !schema_check.outcome.ok {
            violations.push(DoctrineViolation::SchemaInvalid {
                errors: schema_check.outcome.errors.clone(),
            });
        }
        if !grounding.ok {
            violations.push(DoctrineViolation::GroundingFailed { errors: grounding.errors.clone() });
        }
        if !forbidden.is_clean() {
            violations
                .push(DoctrineViolation::ForbiddenLanguageDetected { terms: forbidden.terms.clone() });
        }

        ValidationReport {
            parsed: true,
            schema: schema_check.outcome,
            grounding,
            forbidden,
            conclusion: schema_check.conclusion,
            violations,
        }
    }

    fn ground(&self, value: &Value) -> ValidationOutcome {
        let signals = value.get("evidence_signals").and_then(Value::as_array).and_then(|items| {
            items.iter().map(|item| item.as_str().map(str::to_string)).collect::<Option<Vec<_>>>()
        });
        match signals {
            Some(signals) => self.index.validate(&signals),
            None => ValidationOutcome::from_errors(vec![
                "evidence_signals is missing or not a list of strings".to_string(),
            ]),
        }
    }

    /// Replaces the evidence of a patchable candidate with the deterministic
    /// selection and re-grounds it.
    pub fn apply_evidence_patch(
        &self,
        verdict: CandidateVerdict,
    ) -> (CandidateVerdict, Option<ValidationOutcome>) {
        let CandidateVerdict::NeedsPatch(candidate) = verdict else {
            return (verdict, None);
        };
        let patched = candidate.with_evidence(self.index.deterministic_patch(self.snapshot));
        let grounding = self.index.validate(&patched.evidence_signals);
        let next = if grounding.ok {
            CandidateVerdict::Valid(patched)
        } else {
            CandidateVerdict::Fallback(FallbackReason::GroundingUnrepairable)
        };
        (next, Some(grounding))
    }
}

/// Keeps the rewrite only when it parsed and ranks no worse than `current`.
/// Returns the surviving verdict and whether it came from the rewrite.
pub fn prefer_rewrite(
    current: CandidateVerdict,
    rewrite: &ValidationReport,
) -> (CandidateVerdict, bool) {
    let candidate = rewrite.verdict();
    if rewrite.parsed && candidate.rank() >= current.rank() {
        (candidate, true)
    } else {
        (current, false)
    }
}

/// Closes out the generator stages: anything still needing a rewrite falls
/// back, and evidence is only patched when the sample can be trusted.
pub fn settle(verdict: CandidateVerdict, sample_confidence: ConfidenceLevel) -> CandidateVerdict {
    match verdict {
        CandidateVerdict::NeedsRewrite => {
            CandidateVerdict::Fallback(FallbackReason::GeneratorOutputInvalid)
        }
        CandidateVerdict::NeedsPatch(_) if sample_confidence == ConfidenceLevel::Low => {
            CandidateVerdict::Fallback(FallbackReason::GroundingUnrepairable)
        }
        other => other,
    }
}

pub fn low_sample_guard(verdict: CandidateVerdict, snapshot: &Snapshot) -> CandidateVerdict {
    if snapshot.sample_confidence() == ConfidenceLevel::Low
        && snapshot.signal_count() <= LOW_SAMPLE_SIGNAL_LIMIT
    {
        CandidateVerdict::Fallback(FallbackReason::LowSampleConfidence)
    } else {
        verdict
    }
}
