use std::sync::OnceLock;

use serde_json::{json, Value};

use crate::doctrine::ValidationOutcome;
use crate::domain::conclusion::{Conclusion, MAX_NEXT_STEPS};

/// Wire contract for a Conclusion document. Evidence count and shape are left
/// to grounding so a short but otherwise valid candidate stays patchable.
pub fn conclusion_schema() -> Value {
    let text = json!({ "type": "string", "minLength": 1 });
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Conclusion",
        "type": "object",
        "additionalProperties": false,
        "required": [
            "pattern_id",
            "one_sentence_pattern",
            "decision",
            "why_this_now",
            "boundary",
            "confidence",
            "evidence_signals",
            "season_context"
        ],
        "properties": {
            "pattern_id": text,
            "one_sentence_pattern": text,
            "decision": text,
            "why_this_now": text,
            "boundary": { "type": "string", "pattern": "^If " },
            "confidence": { "enum": ["low", "medium", "high"] },
            "evidence_signals": { "type": "array", "items": { "type": "string" } },
            "season_context": text,
            "optional_next_steps": {
                "type": "array",
                "maxItems": MAX_NEXT_STEPS,
                "items": text
            }
        }
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaCheck {
    pub outcome: ValidationOutcome,
    pub conclusion: Option<Conclusion>,
}

impl SchemaCheck {
    fn rejected(errors: Vec<String>) -> Self {
        Self { outcome: ValidationOutcome::from_errors(errors), conclusion: None }
    }
}

/// Validates a parsed generator document and, when it conforms, yields the
/// typed Conclusion.
pub fn validate_conclusion_value(value: &Value) -> SchemaCheck {
    let Some(validator) = validator() else {
        return SchemaCheck::rejected(vec!["conclusion schema failed to compile".to_string()]);
    };

    let errors = validator.iter_errors(value).map(|error| error.to_string()).collect::<Vec<_>>();
    if !errors.is_empty() {
        return SchemaCheck::rejected(errors);
    }

    match serde_json::from_value::<Conclusion>(value.clone()) {
        Ok(conclusion) => {
            SchemaCheck { outcome: ValidationOutcome::passed(), conclusion: Some(conclusion) }
        }
        Err(error) => SchemaCheck::rejected(vec![format!("conclusion did not decode: {error}")]),
    }
}

pub fn validate_conclusion(conclusion: &Conclusion) -> ValidationOutcome {
    match serde_json::to_value(conclusion) {
        Ok(value) => validate_conclusion_value(&value).outcome,
        Err(error) => ValidationOutcome::from_errors(vec![format!("conclusion did not encode: {error}")]),
    }
}

fn validator() -> Option<&'static jsonschema::Validator> {
    static VALIDATOR: OnceLock<Option<jsonschema::Validator>> = OnceLock::new();
    VALIDATOR.get_or_init(|| jsonschema::validator_for(&conclusion_schema()).ok()).as_ref()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{validate_conclusion_value, validator};
    use crate::domain::snapshot::ConfidenceLevel;

    fn document() -> serde_json::Value {
        json!({
            "pattern_id": "slow_approvals",
            "one_sentence_pattern": "Quotes wait days for a yes.",
            "decision": "Within 7 days: Call the oldest open quotes.",
            "why_this_now": "Season is Active and approvals are slowing.",
            "boundary": "If approvals recover, stop calling.",
            "confidence": "medium",
            "evidence_signals": [
                "activity_signals.quotes.count=12",
                "activity_signals.quotes.decision_lag_band=high",
                "volatility_band=low"
            ],
            "season_context": "Active season with moderate strength.",
            "optional_next_steps": ["Send a reminder template"]
        })
    }

    #[test]
    fn schema_compiles() {
        assert!(validator().is_some());
    }

    #[test]
    fn accepts_conforming_document() {
        let check = validate_conclusion_value(&document());
        assert!(check.outcome.ok, "{:?}", check.outcome.errors);
        let conclusion = check.conclusion.expect("typed conclusion");
        assert_eq!(conclusion.confidence, ConfidenceLevel::Medium);
    }

    #[test]
    fn rejects_contract_breaks() {
        let mut scalar_signals = document();
        scalar_signals["evidence_signals"] = json!("a=1");

        let mut bad_boundary = document();
        bad_boundary["boundary"] = json!("When approvals recover");

        let mut extra_field = document();
        extra_field["notes"] = json!("extra");

        let mut bad_confidence = document();
        bad_confidence["confidence"] = json!("certain");

        let mut missing = document();
        missing.as_object_mut().expect("object").remove("season_context");

        let mut many_steps = document();
        many_steps["optional_next_steps"] = json!(["a", "b", "c", "d"]);

        for invalid in [scalar_signals, bad_boundary, extra_field, bad_confidence, missing, many_steps] {
            let check = validate_conclusion_value(&invalid);
            assert!(!check.outcome.ok, "{invalid} should be rejected");
            assert!(check.conclusion.is_none());
            assert!(!check.outcome.errors.is_empty());
        }
    }

    #[test]
    fn short_evidence_is_left_to_grounding() {
        let mut two_signals = document();
        two_signals["evidence_signals"] = json!(["a=1", "b=2"]);
        assert!(validate_conclusion_value(&two_signals).outcome.ok);
    }

    #[test]
    fn next_steps_are_optional() {
        let mut without_steps = document();
        without_steps.as_object_mut().expect("object").remove("optional_next_steps");
        assert!(validate_conclusion_value(&without_steps).outcome.ok);
    }
}
