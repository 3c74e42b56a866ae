use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Vocabulary a Conclusion may never use, in reporting order.
pub const FORBIDDEN_TERMS: &[&str] = &[
    "dashboard",
    "kpi",
    "analytics",
    "monitor",
    "bi",
    "reporting",
    "business intelligence",
    "data visualization",
    "scorecard",
];

/// Short acronyms that only count as whole words ("bi" inside "billing" is fine).
const WHOLE_WORD_TERMS: &[&str] = &["bi", "kpi"];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForbiddenScan {
    pub terms: Vec<String>,
    pub fields: Vec<String>,
}

impl ForbiddenScan {
    pub fn is_clean(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Walks any JSON value and reports the distinct forbidden terms found in its
/// strings together with the paths they occurred at. A bare string root is
/// reported at `$`.
pub fn scan_forbidden_terms(value: &Value) -> ForbiddenScan {
    let mut hits = vec![false; FORBIDDEN_TERMS.len()];
    let mut fields = Vec::new();
    walk(value, String::new(), &mut hits, &mut fields);

    let terms = FORBIDDEN_TERMS
        .iter()
        .zip(hits)
        .filter(|(_, hit)| *hit)
        .map(|(term, _)| (*term).to_string())
        .collect();
    ForbiddenScan { terms, fields }
}

pub fn text_contains_forbidden_term(text: &str) -> bool {
    let lowered = text.to_lowercase();
    FORBIDDEN_TERMS.iter().any(|term| term_matches(term, &lowered))
}

fn walk(value: &Value, path: String, hits: &mut [bool], fields: &mut Vec<String>) {
    match value {
        Value::Object(entries) => {
            for (key, child) in entries {
                let child_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                walk(child, child_path, hits, fields);
            }
        }
        Value::Array(items) => {
            for (position, child) in items.iter().enumerate() {
                walk(child, format!("{path}[{position}]"), hits, fields);
            }
        }
        Value::String(text) => {
            let lowered = text.to_lowercase();
            let mut matched = false;
            for (slot, term) in FORBIDDEN_TERMS.iter().enumerate() {
                if term_matches(term, &lowered) {
                    hits[slot] = true;
                    matched = true;
                }
            }
            if matched {
                let field = if path.is_empty() { "$".to_string() } else { path };
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
        _ => {}
    }
}

fn term_matches(term: &str, lowered: &str) -> bool {
    if let Some(pattern) = whole_word_pattern(term) {
        return pattern.is_match(lowered);
    }
    lowered.contains(term)
}

fn whole_word_pattern(term: &str) -> Option<&'static Regex> {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            WHOLE_WORD_TERMS
                .iter()
                .filter_map(|term| {
                    Regex::new(&format!(r"\b{term}\b")).ok().map(|pattern| (*term, pattern))
                })
                .collect()
        })
        .iter()
        .find(|(candidate, _)| *candidate == term)
        .map(|(_, pattern)| pattern)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{scan_forbidden_terms, text_contains_forbidden_term, whole_word_pattern, WHOLE_WORD_TERMS};

    #[test]
    fn whole_word_patterns_compile() {
        for term in WHOLE_WORD_TERMS {
            assert!(whole_word_pattern(term).is_some(), "pattern for {term} failed to compile");
        }
    }

    #[test]
    fn reports_dashboard_and_kpi_in_list_order() {
        let scan = scan_forbidden_terms(&json!("We will build a dashboard for KPI tracking"));
        assert_eq!(scan.terms, vec!["dashboard", "kpi"]);
        assert_eq!(scan.fields, vec!["$"]);
    }

    #[test]
    fn short_acronyms_need_word_boundaries() {
        assert!(scan_forbidden_terms(&json!("Send the billing reminder")).is_clean());
        assert!(scan_forbidden_terms(&json!("Ship kpis weekly")).is_clean());
        assert_eq!(scan_forbidden_terms(&json!("Set up BI for the crew")).terms, vec!["bi"]);
        assert_eq!(scan_forbidden_terms(&json!("Start monitoring lag")).terms, vec!["monitor"]);
    }

    #[test]
    fn walks_nested_objects_and_arrays() {
        let conclusion = json!({
            "decision": "Within 7 days: Review the scorecard",
            "optional_next_steps": ["Call Acme", "Share analytics with the crew"],
            "confidence": "low",
            "evidence_signals": ["volatility_band=low"],
        });

        let scan = scan_forbidden_terms(&conclusion);
        assert_eq!(scan.terms, vec!["analytics", "scorecard"]);
        assert_eq!(scan.fields, vec!["decision", "optional_next_steps[1]"]);
        assert!(!scan.is_clean());
    }

    #[test]
    fn plain_text_helper_matches_scan() {
        assert!(text_contains_forbidden_term("Quarterly Reporting pack"));
        assert!(!text_contains_forbidden_term("Call the three oldest open quotes"));
    }
}
