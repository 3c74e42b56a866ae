use std::sync::Arc;

use groundline_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use groundline_core::doctrine::{check_season_sanity, patch_decision_if_needed};
use groundline_core::domain::conclusion::Conclusion;
use groundline_core::domain::snapshot::Snapshot;
use groundline_core::errors::{DoctrineViolation, InferenceError};
use groundline_core::fallback::insufficient_evidence_conclusion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::diagnostics::{merge_forbidden, CheckErrors, InferenceDiagnostics, InferenceStage};
use crate::guardrails::{
    low_sample_guard, prefer_rewrite, settle, CandidateValidator, CandidateVerdict,
    FallbackReason,
};
use crate::llm::{ConclusionGenerator, GeneratorOutput};
use crate::prompts::{
    primary_payload, rewrite_payload, PRIMARY_SYSTEM_PROMPT, REWRITE_SYSTEM_PROMPT,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub conclusion: Conclusion,
    pub diagnostics: InferenceDiagnostics,
}

/// Drives one decision request: primary call, optional rewrite, evidence
/// patch, fallback, season cap and decision patch. At most two generator
/// calls are made, one after the other.
pub struct DecisionRuntime {
    generator: Arc<dyn ConclusionGenerator>,
    audit: Arc<dyn AuditSink>,
}

impl DecisionRuntime {
    pub fn new(generator: Arc<dyn ConclusionGenerator>) -> Self {
        Self { generator, audit: Arc::new(NoopAuditSink) }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Only a missing credential or an unserializable Snapshot is an error.
    /// Every generator failure ends in a valid Conclusion.
    pub async fn infer_decision(&self, snapshot: &Snapshot) -> Result<InferenceResult, InferenceError> {
        self.generator.credential_check()?;

        let run_id = Uuid::new_v4().to_string();
        let validator = CandidateValidator::new(snapshot);

        let payload = primary_payload(snapshot)?;
        let primary_output = self.call(&run_id, "primary", PRIMARY_SYSTEM_PROMPT, &payload).await;
        let primary = validator.evaluate(primary_output.as_ref());
        info!(
            event_name = "inference.primary.completed",
            run_id = %run_id,
            generator = self.generator.name(),
            parsed = primary.parsed,
            valid = primary.is_valid(),
            "primary candidate evaluated"
        );

        let mut stage = InferenceStage::Primary;
        let mut verdict = primary.verdict();
        let mut rewrite = None;
        if !verdict.is_valid() {
            let errors = primary.errors();
            info!(
                event_name = "inference.rewrite.requested",
                run_id = %run_id,
                error_count = errors.len(),
                "requesting rewrite"
            );
            let previous = primary_output.as_ref().map(|output| output.raw.as_str());
            let payload = rewrite_payload(snapshot, previous, &errors)?;
            let rewrite_output =
                self.call(&run_id, "rewrite", REWRITE_SYSTEM_PROMPT, &payload).await;
            let report = validator.evaluate(rewrite_output.as_ref());
            let (kept, from_rewrite) = prefer_rewrite(verdict, &report);
            verdict = kept;
            if from_rewrite {
                stage = InferenceStage::Rewrite;
            }
            rewrite = Some(report);
        }
        verdict = settle(verdict, snapshot.sample_confidence());

        let mut evidence_patch_errors = Vec::new();
        let mut evidence_patch_used = false;
        if matches!(verdict, CandidateVerdict::NeedsPatch(_)) {
            let (patched, grounding) = validator.apply_evidence_patch(verdict);
            verdict = patched;
            evidence_patch_used = true;
            stage = InferenceStage::EvidencePatch;
            evidence_patch_errors = grounding.map(|outcome| outcome.errors).unwrap_or_default();
            info!(
                event_name = "inference.evidence_patch.applied",
                run_id = %run_id,
                grounded = verdict.is_valid(),
                "evidence replaced with deterministic selection"
            );
        }

        verdict = low_sample_guard(verdict, snapshot);

        let mut violations = primary.violations.clone();
        if let Some(report) = &rewrite {
            violations.extend(report.violations.iter().cloned());
        }

        let (mut conclusion, fallback_reason) = match verdict {
            CandidateVerdict::Valid(conclusion) => (conclusion, None),
            CandidateVerdict::Fallback(reason) => (insufficient_evidence_conclusion(snapshot), Some(reason)),
            CandidateVerdict::NeedsRewrite | CandidateVerdict::NeedsPatch(_) => (
                insufficient_evidence_conclusion(snapshot),
                Some(FallbackReason::GeneratorOutputInvalid),
            ),
        };
        if let Some(reason) = fallback_reason {
            stage = if reason == FallbackReason::LowSampleConfidence {
                violations.push(DoctrineViolation::LowSampleConfidence {
                    signal_count: snapshot.signal_count(),
                });
                InferenceStage::LowSampleFallback
            } else {
                InferenceStage::FullFallback
            };
            warn!(
                event_name = "inference.fallback.forced",
                run_id = %run_id,
                reason = reason.as_str(),
                "returning insufficient evidence conclusion"
            );
        }

        let season = check_season_sanity(snapshot, &conclusion);
        let confidence_before = conclusion.confidence;
        if conclusion.confidence > season.max_confidence {
            conclusion = conclusion.with_confidence(season.max_confidence);
        }

        let decision_before = conclusion.decision.clone();
        let decision_patch = patch_decision_if_needed(&decision_before);
        if decision_patch.patched {
            conclusion = conclusion.with_decision(decision_patch.text.clone());
            info!(
                event_name = "inference.decision_patch.applied",
                run_id = %run_id,
                reason = decision_patch.reason.map(|reason| reason.as_str()).unwrap_or_default(),
                "decision text patched"
            );
        }

        let reports = std::iter::once(&primary).chain(rewrite.as_ref());
        let (forbidden_terms, forbidden_fields) = merge_forbidden(reports);

        let diagnostics = InferenceDiagnostics {
            run_id: run_id.clone(),
            generator: self.generator.name().to_string(),
            stage,
            primary_ok: primary.is_valid(),
            rewrite_used: rewrite.is_some(),
            evidence_patch_used,
            fallback_used: fallback_reason.is_some(),
            fallback_reason,
            primary_errors: CheckErrors::from(&primary),
            rewrite_errors: rewrite.as_ref().map(CheckErrors::from),
            evidence_patch_errors,
            violations,
            forbidden_terms,
            forbidden_fields,
            season_warnings: season.warnings,
            confidence_before,
            confidence_after: conclusion.confidence,
            decision_before,
            decision_after: conclusion.decision.clone(),
            decision_patch_applied: decision_patch.patched,
            decision_patch_reason: decision_patch.reason,
        };

        self.record(&diagnostics);
        Ok(InferenceResult { conclusion, diagnostics })
    }

    /// Transport failures degrade to "no output".
    async fn call(
        &self,
        run_id: &str,
        attempt: &'static str,
        system_prompt: &str,
        payload: &Value,
    ) -> Option<GeneratorOutput> {
        match self.generator.generate(system_prompt, payload).await {
            Ok(output) => Some(output),
            Err(error) => {
                warn!(
                    event_name = "inference.generator.failed",
                    run_id = %run_id,
                    attempt,
                    generator = self.generator.name(),
                    error = %error,
                    "generator call failed"
                );
                self.audit.emit(
                    AuditEvent::new(
                        run_id,
                        "inference.generator.failed",
                        AuditCategory::Generator,
                        self.generator.name(),
                        AuditOutcome::Failed,
                    )
                    .with_metadata("attempt", attempt)
                    .with_metadata("error", error.to_string()),
                );
                None
            }
        }
    }

    fn record(&self, diagnostics: &InferenceDiagnostics) {
        // Decision text patching alone does not degrade the run.
        let outcome = if diagnostics.primary_ok && !diagnostics.fallback_used {
            AuditOutcome::Success
        } else {
            AuditOutcome::Degraded
        };
        let mut event = AuditEvent::new(
            diagnostics.run_id.clone(),
            "inference.completed",
            AuditCategory::Inference,
            "decision-runtime",
            outcome,
        )
        .with_metadata("generator", diagnostics.generator.clone())
        .with_metadata("stage", diagnostics.stage.as_str())
        .with_metadata("fallback_used", diagnostics.fallback_used.to_string())
        .with_metadata("decision_patch_applied", diagnostics.decision_patch_applied.to_string());
        if let Some(reason) = diagnostics.fallback_reason {
            event = event.with_metadata("fallback_reason", reason.as_str());
        }
        self.audit.emit(event);
    }
}
