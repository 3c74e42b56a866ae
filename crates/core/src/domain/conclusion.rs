use serde::{Deserialize, Serialize};

use crate::domain::snapshot::ConfidenceLevel;

pub const MIN_EVIDENCE_SIGNALS: usize = 3;
pub const MAX_EVIDENCE_SIGNALS: usize = 6;
pub const MAX_NEXT_STEPS: usize = 3;

/// The single decision handed to the business owner. Values are replaced
/// wholesale at each repair step, never edited in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Conclusion {
    pub pattern_id: String,
    pub one_sentence_pattern: String,
    pub decision: String,
    pub why_this_now: String,
    pub boundary: String,
    pub confidence: ConfidenceLevel,
    pub evidence_signals: Vec<String>,
    pub season_context: String,
    #[serde(default)]
    pub optional_next_steps: Vec<String>,
}

impl Conclusion {
    pub fn with_evidence(&self, evidence_signals: Vec<String>) -> Self {
        Self { evidence_signals, ..self.clone() }
    }

    pub fn with_confidence(&self, confidence: ConfidenceLevel) -> Self {
        Self { confidence, ..self.clone() }
    }

    pub fn with_decision(&self, decision: impl Into<String>) -> Self {
        Self { decision: decision.into(), ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::Conclusion;
    use crate::domain::snapshot::ConfidenceLevel;

    #[test]
    fn rejects_unknown_fields() {
        let result = serde_json::from_str::<Conclusion>(
            r#"{
                "pattern_id": "p", "one_sentence_pattern": "s", "decision": "d",
                "why_this_now": "w", "boundary": "If x", "confidence": "low",
                "evidence_signals": [], "season_context": "Active", "extra": 1
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn next_steps_default_to_empty() {
        let conclusion: Conclusion = serde_json::from_str(
            r#"{
                "pattern_id": "p", "one_sentence_pattern": "s", "decision": "d",
                "why_this_now": "w", "boundary": "If x", "confidence": "medium",
                "evidence_signals": ["a=b"], "season_context": "Active"
            }"#,
        )
        .expect("conclusion parses");
        assert!(conclusion.optional_next_steps.is_empty());
        assert_eq!(conclusion.confidence, ConfidenceLevel::Medium);

        let replaced = conclusion.with_confidence(ConfidenceLevel::Low);
        assert_eq!(conclusion.confidence, ConfidenceLevel::Medium);
        assert_eq!(replaced.confidence, ConfidenceLevel::Low);
    }
}
