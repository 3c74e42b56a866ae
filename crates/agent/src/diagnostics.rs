use groundline_core::doctrine::PatchReason;
use groundline_core::domain::snapshot::ConfidenceLevel;
use groundline_core::errors::DoctrineViolation;
use serde::{Deserialize, Serialize};

use crate::guardrails::{FallbackReason, ValidationReport};

/// Which stage produced the returned Conclusion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceStage {
    Primary,
    Rewrite,
    EvidencePatch,
    LowSampleFallback,
    FullFallback,
}

impl InferenceStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Rewrite => "rewrite",
            Self::EvidencePatch => "evidence_patch",
            Self::LowSampleFallback => "low_sample_fallback",
            Self::FullFallback => "full_fallback",
        }
    }
}

/// Per-check error lists for one generator attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckErrors {
    pub parsed: bool,
    pub schema: Vec<String>,
    pub grounding: Vec<String>,
    pub forbidden_terms: Vec<String>,
}

impl From<&ValidationReport> for CheckErrors {
    fn from(report: &ValidationReport) -> Self {
        Self {
            parsed: report.parsed,
            schema: report.schema.errors.clone(),
            grounding: report.grounding.errors.clone(),
            forbidden_terms: report.forbidden.terms.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceDiagnostics {
    pub run_id: String,
    pub generator: String,
    pub stage: InferenceStage,
    pub primary_ok: bool,
    pub rewrite_used: bool,
    pub evidence_patch_used: bool,
    pub fallback_used: bool,
    pub fallback_reason: Option<FallbackReason>,
    pub primary_errors: CheckErrors,
    pub rewrite_errors: Option<CheckErrors>,
    pub evidence_patch_errors: Vec<String>,
    pub violations: Vec<DoctrineViolation>,
    pub forbidden_terms: Vec<String>,
    pub forbidden_fields: Vec<String>,
    pub season_warnings: Vec<String>,
    pub confidence_before: ConfidenceLevel,
    pub confidence_after: ConfidenceLevel,
    pub decision_before: String,
    pub decision_after: String,
    pub decision_patch_applied: bool,
    pub decision_patch_reason: Option<PatchReason>,
}

/// Union of forbidden hits across attempts, first occurrence order kept.
pub(crate) fn merge_forbidden<'a>(
    reports: impl IntoIterator<Item = &'a ValidationReport>,
) -> (Vec<String>, Vec<String>) {
    let mut terms: Vec<String> = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    for report in reports {
        for term in &report.forbidden.terms {
            if !terms.contains(term) {
                terms.push(term.clone());
            }
        }
        for field in &report.forbidden.fields {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
    }
    (terms, fields)
}

#[cfg(test)]
mod tests {
    use groundline_core::doctrine::{ForbiddenScan, ValidationOutcome};

    use super::{merge_forbidden, CheckErrors, InferenceStage};
    use crate::guardrails::ValidationReport;

    fn report(terms: &[&str], fields: &[&str]) -> ValidationReport {
        ValidationReport {
            parsed: true,
            schema: ValidationOutcome::passed(),
            grounding: ValidationOutcome::from_errors(vec!["missing".to_string()]),
            forbidden: ForbiddenScan {
                terms: terms.iter().map(|term| term.to_string()).collect(),
                fields: fields.iter().map(|field| field.to_string()).collect(),
            },
            conclusion: None,
            violations: Vec::new(),
        }
    }

    #[test]
    fn forbidden_hits_merge_without_duplicates() {
        let primary = report(&["dashboard", "kpi"], &["decision"]);
        let rewrite = report(&["kpi", "analytics"], &["decision", "why_this_now"]);
        let (terms, fields) = merge_forbidden([&primary, &rewrite]);
        assert_eq!(terms, vec!["dashboard", "kpi", "analytics"]);
        assert_eq!(fields, vec!["decision", "why_this_now"]);
    }

    #[test]
    fn check_errors_copy_report_lists() {
        let errors = CheckErrors::from(&report(&[], &[]));
        assert!(errors.parsed);
        assert!(errors.schema.is_empty());
        assert_eq!(errors.grounding, vec!["missing"]);
        assert_eq!(
            serde_json::to_value(InferenceStage::EvidencePatch).expect("serialize stage"),
            "evidence_patch"
        );
    }
}
