//! Evidence grounding.
//!
//! Every terminal field of a Snapshot is a candidate `path=value` evidence
//! signal. The candidate list is built once per validation pass into an
//! `EvidenceIndex` and reused for both the grounding check and the
//! deterministic evidence patch.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::doctrine::ValidationOutcome;
use crate::domain::conclusion::{MAX_EVIDENCE_SIGNALS, MIN_EVIDENCE_SIGNALS};
use crate::domain::snapshot::Snapshot;

const APPROVAL_RATE_PATH: &str = "activity_signals.quotes.approval_rate_band";
const DECISION_LAG_PATH: &str = "activity_signals.quotes.decision_lag_band";
const INVOICES_PAID_COUNT_PATH: &str = "activity_signals.invoices.paid_count";
const PAYMENT_LAG_DISTRIBUTION_PATH: &str = "activity_signals.invoices.payment_lag_band_distribution";
const VOLATILITY_PATH: &str = "volatility_band";
const TOP_INPUT_COST_PATH: &str = "input_costs[0].change_30d_pct";

/// Fallback paths used when the priority list does not yield enough
/// populated signals.
const GENERIC_ACTIVITY_PATHS: &[&str] = &[
    "activity_signals.quotes.count",
    "activity_signals.invoices.count",
    "activity_signals.quotes.approved_count",
    "window.sample_confidence",
    "season.phase",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLeafCandidate {
    pub path: String,
    pub value: String,
}

impl EvidenceLeafCandidate {
    pub fn signal(&self) -> String {
        format!("{}={}", self.path, self.value)
    }
}

#[derive(Clone, Debug, Default)]
pub struct EvidenceIndex {
    candidates: Vec<EvidenceLeafCandidate>,
    by_path: HashMap<String, usize>,
}

impl EvidenceIndex {
    pub fn build(snapshot: &Snapshot) -> Self {
        match serde_json::to_value(snapshot) {
            Ok(value) => Self::from_value(&value),
            Err(error) => {
                warn!(
                    event_name = "evidence.index.serialize_failed",
                    error = %error,
                    "snapshot could not be serialized; evidence index is empty"
                );
                Self::default()
            }
        }
    }

    /// Indexes an already serialized snapshot document.
    pub fn from_value(value: &Value) -> Self {
        let mut candidates = Vec::new();
        collect_leaves(value, String::new(), &mut candidates);
        let by_path = candidates
            .iter()
            .enumerate()
            .map(|(position, candidate)| (candidate.path.clone(), position))
            .collect();
        Self { candidates, by_path }
    }

    pub fn candidates(&self) -> &[EvidenceLeafCandidate] {
        &self.candidates
    }

    pub fn get(&self, path: &str) -> Option<&EvidenceLeafCandidate> {
        self.by_path.get(path).map(|position| &self.candidates[*position])
    }

    pub fn validate(&self, signals: &[String]) -> ValidationOutcome {
        let mut errors = Vec::new();
        let mut seen_paths = HashSet::new();
        let mut repeated = 0;

        for signal in signals {
            let Some((path, value)) = signal.split_once('=') else {
                errors.push(format!("evidence signal `{signal}` is not of the form path=value"));
                continue;
            };
            let (path, value) = (path.trim(), value.trim());
            if !seen_paths.insert(path) {
                repeated += 1;
                errors.push(format!("evidence path `{path}` is cited more than once"));
                continue;
            }
            match self.get(path) {
                None => errors.push(format!("evidence path `{path}` does not exist in the snapshot")),
                Some(candidate) if candidate.value != value => errors.push(format!(
                    "evidence `{path}` claims `{value}` but the snapshot holds `{}`",
                    candidate.value
                )),
                Some(_) => {}
            }
        }

        let distinct = signals.len() - repeated;
        if !(MIN_EVIDENCE_SIGNALS..=MAX_EVIDENCE_SIGNALS).contains(&distinct) {
            errors.push(format!(
                "evidence_signals must hold between {MIN_EVIDENCE_SIGNALS} and {MAX_EVIDENCE_SIGNALS} distinct entries, found {distinct}"
            ));
        }

        ValidationOutcome::from_errors(errors)
    }

    /// Picks 3 to 6 grounded signals: populated priority paths first, then
    /// generic activity counts. Every generic path is a Snapshot leaf, so the
    /// minimum is always reached.
    pub fn deterministic_patch(&self, snapshot: &Snapshot) -> Vec<String> {
        let mut selected: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let mut take = |candidate: &EvidenceLeafCandidate, selected: &mut Vec<String>| {
            if selected.len() < MAX_EVIDENCE_SIGNALS && seen.insert(candidate.path.clone()) {
                selected.push(candidate.signal());
            }
        };

        for path in priority_paths(snapshot) {
            if let Some(candidate) = self.get(&path).filter(|candidate| is_populated(&candidate.value)) {
                take(candidate, &mut selected);
            }
        }

        if selected.len() < MIN_EVIDENCE_SIGNALS {
            for path in GENERIC_ACTIVITY_PATHS {
                if selected.len() >= MIN_EVIDENCE_SIGNALS {
                    break;
                }
                if let Some(candidate) = self.get(path) {
                    take(candidate, &mut selected);
                }
            }
        }

        selected
    }
}

pub fn list_evidence_leaf_candidates(snapshot: &Snapshot) -> Vec<EvidenceLeafCandidate> {
    EvidenceIndex::build(snapshot).candidates
}

pub fn validate_evidence_signals(snapshot: &Snapshot, signals: &[String]) -> ValidationOutcome {
    EvidenceIndex::build(snapshot).validate(signals)
}

pub fn deterministic_evidence_patch(snapshot: &Snapshot) -> Vec<String> {
    EvidenceIndex::build(snapshot).deterministic_patch(snapshot)
}

fn priority_paths(snapshot: &Snapshot) -> Vec<String> {
    let mut paths = vec![APPROVAL_RATE_PATH.to_string(), DECISION_LAG_PATH.to_string()];
    if snapshot.activity_signals.invoices.paid_count > 0 {
        paths.push(INVOICES_PAID_COUNT_PATH.to_string());
    }
    let slowest_paid_band = snapshot
        .activity_signals
        .invoices
        .payment_lag_band_distribution
        .highest_populated();
    if let Some(band) = slowest_paid_band {
        paths.push(format!("{PAYMENT_LAG_DISTRIBUTION_PATH}.{band}"));
    }
    paths.push(VOLATILITY_PATH.to_string());
    paths.push(TOP_INPUT_COST_PATH.to_string());
    paths
}

fn is_populated(value: &str) -> bool {
    !matches!(value, "" | "0" | "null")
}

fn collect_leaves(value: &Value, path: String, out: &mut Vec<EvidenceLeafCandidate>) {
    match value {
        Value::Object(fields) => {
            for (key, child) in fields {
                let child_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                collect_leaves(child, child_path, out);
            }
        }
        Value::Array(items) => {
            for (position, child) in items.iter().enumerate() {
                collect_leaves(child, format!("{path}[{position}]"), out);
            }
        }
        Value::String(text) => out.push(EvidenceLeafCandidate { path, value: text.clone() }),
        leaf => out.push(EvidenceLeafCandidate { path, value: leaf.to_string() }),
    }
}
