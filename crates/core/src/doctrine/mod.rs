//! Structural and vocabulary rules every Conclusion must satisfy.

pub mod decision_text;
pub mod forbidden;
pub mod schema;
pub mod season;

use serde::{Deserialize, Serialize};

pub use decision_text::{
    is_time_boxed, normalize_decision_text, patch_decision_if_needed, starts_with_approved_verb,
    DecisionPatch, PatchReason,
};
pub use forbidden::{
    scan_forbidden_terms, text_contains_forbidden_term, ForbiddenScan, FORBIDDEN_TERMS,
};
pub use schema::{conclusion_schema, validate_conclusion, validate_conclusion_value, SchemaCheck};
pub use season::{check_season_sanity, max_confidence_for, SeasonSanity};

/// Result of one check. A pure function of its inputs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn passed() -> Self {
        Self { ok: true, errors: Vec::new() }
    }

    pub fn from_errors(errors: Vec<String>) -> Self {
        Self { ok: errors.is_empty(), errors }
    }
}
