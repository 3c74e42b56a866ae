use groundline_core::doctrine::{conclusion_schema, FORBIDDEN_TERMS};
use groundline_core::domain::conclusion::{MAX_EVIDENCE_SIGNALS, MIN_EVIDENCE_SIGNALS};
use groundline_core::domain::snapshot::Snapshot;
use groundline_core::errors::InferenceError;
use serde_json::{json, Value};

pub const PRIMARY_SYSTEM_PROMPT: &str = "\
You turn a Snapshot of a small business's recent quotes and invoices into exactly one decision.
Reply with a single JSON object matching `schema` and nothing else.
Every entry in evidence_signals must be `path=value` copied from the Snapshot, using dotted paths \
and bracket indices for arrays, for example `activity_signals.quotes.count=12`.
The decision starts with an imperative verb and carries a time box, for example \
`Within 7 days: Call the oldest open quotes.`
The boundary starts with `If `. Never use any word listed in `forbidden_terms`.";

pub const REWRITE_SYSTEM_PROMPT: &str = "\
Your previous reply broke the rules listed in `errors`. Rewrite it so every rule holds.
Reply with a single corrected JSON object matching `schema` and nothing else.
Keep evidence_signals grounded in the Snapshot: each entry is `path=value` with the exact value \
the Snapshot holds at that path.";

fn evidence_rules() -> Value {
    json!({
        "min_items": MIN_EVIDENCE_SIGNALS,
        "max_items": MAX_EVIDENCE_SIGNALS,
        "format": "path=value",
        "distinct_paths": true
    })
}

fn snapshot_value(snapshot: &Snapshot) -> Result<Value, InferenceError> {
    serde_json::to_value(snapshot).map_err(|error| InferenceError::Serialization(error.to_string()))
}

pub fn primary_payload(snapshot: &Snapshot) -> Result<Value, InferenceError> {
    Ok(json!({
        "snapshot": snapshot_value(snapshot)?,
        "schema": conclusion_schema(),
        "forbidden_terms": FORBIDDEN_TERMS,
        "evidence_rules": evidence_rules(),
    }))
}

/// The repair request carries the Snapshot again with the rejected reply and
/// every error collected for it.
pub fn rewrite_payload(
    snapshot: &Snapshot,
    previous_output: Option<&str>,
    errors: &[String],
) -> Result<Value, InferenceError> {
    Ok(json!({
        "snapshot": snapshot_value(snapshot)?,
        "schema": conclusion_schema(),
        "forbidden_terms": FORBIDDEN_TERMS,
        "evidence_rules": evidence_rules(),
        "previous_output": previous_output.unwrap_or_default(),
        "errors": errors,
    }))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use groundline_core::doctrine::text_contains_forbidden_term;
    use groundline_core::snapshot::SnapshotBuilder;

    use super::{primary_payload, rewrite_payload, PRIMARY_SYSTEM_PROMPT, REWRITE_SYSTEM_PROMPT};

    #[test]
    fn payloads_carry_snapshot_and_contract() {
        let snapshot = SnapshotBuilder::default()
            .with_report_date(NaiveDate::from_ymd_opt(2026, 10, 18).expect("date"))
            .build(&[], &[])
            .expect("snapshot builds");

        let primary = primary_payload(&snapshot).expect("primary payload");
        assert_eq!(primary["snapshot"]["window"]["lookback_days"], 90);
        assert_eq!(primary["schema"]["title"], "Conclusion");
        assert!(primary["forbidden_terms"].as_array().is_some_and(|terms| !terms.is_empty()));

        let errors = vec!["evidence_signals must hold between 3 and 6 entries, found 2".to_string()];
        let rewrite = rewrite_payload(&snapshot, Some("{}"), &errors).expect("rewrite payload");
        assert_eq!(rewrite["previous_output"], "{}");
        assert_eq!(rewrite["errors"][0], errors[0]);
        assert_eq!(rewrite["snapshot"], primary["snapshot"]);
    }

    #[test]
    fn prompts_name_rules_without_using_forbidden_words() {
        // The prompts point at `forbidden_terms` instead of spelling the terms out.
        assert!(!text_contains_forbidden_term(PRIMARY_SYSTEM_PROMPT));
        assert!(!text_contains_forbidden_term(REWRITE_SYSTEM_PROMPT));
    }
}
