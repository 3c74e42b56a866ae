//! Terminal "insufficient evidence" Conclusion.
//!
//! Derived entirely from the Snapshot, so it always passes the schema,
//! grounding and vocabulary checks regardless of what the generator did.

use sha2::{Digest, Sha256};

use crate::domain::conclusion::Conclusion;
use crate::domain::snapshot::{ConfidenceLevel, Snapshot};

pub const INSUFFICIENT_EVIDENCE_PREFIX: &str = "insufficient_evidence_";

const FINGERPRINT_LEN: usize = 12;

pub fn insufficient_evidence_conclusion(snapshot: &Snapshot) -> Conclusion {
    let quotes = snapshot.activity_signals.quotes.count;
    let invoices = snapshot.activity_signals.invoices.count;
    let lookback = snapshot.window.lookback_days;
    let season = &snapshot.season;

    Conclusion {
        pattern_id: format!("{INSUFFICIENT_EVIDENCE_PREFIX}{}", snapshot_fingerprint(snapshot)),
        one_sentence_pattern:
            "Recent quote and invoice activity is too thin to show a dependable pattern."
                .to_string(),
        decision: format!(
            "Within 7 days: Add every quote and invoice from the last {lookback} days before the next decision."
        ),
        why_this_now: format!(
            "Only {quotes} quotes and {invoices} invoices landed in the {lookback}-day window, so any pattern would be a guess."
        ),
        boundary: "If at least 20 quotes and invoices are on file, replace this with a pattern-based decision."
            .to_string(),
        confidence: ConfidenceLevel::Low,
        evidence_signals: vec![
            format!("activity_signals.quotes.count={quotes}"),
            format!("activity_signals.invoices.count={invoices}"),
            format!("volatility_band={}", snapshot.volatility_band),
        ],
        season_context: format!(
            "{} season with {} strength and {} predictability.",
            season.phase,
            season.strength.as_str(),
            season.predictability
        ),
        optional_next_steps: vec![
            "Export quotes with created and approved dates.".to_string(),
            "Export invoices with issued and paid dates.".to_string(),
        ],
    }
}

/// First characters of the SHA-256 of the serialized Snapshot.
pub fn snapshot_fingerprint(snapshot: &Snapshot) -> String {
    let canonical = serde_json::to_string(snapshot)
        .unwrap_or_else(|error| format!("serialization_error:{error}"));
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize()).chars().take(FINGERPRINT_LEN).collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{insufficient_evidence_conclusion, INSUFFICIENT_EVIDENCE_PREFIX};
    use crate::doctrine::{
        check_season_sanity, patch_decision_if_needed, scan_forbidden_terms, validate_conclusion,
    };
    use crate::domain::records::{RawActivityRecord, RawInvoice, RawQuote};
    use crate::domain::snapshot::Snapshot;
    use crate::evidence::validate_evidence_signals;
    use crate::snapshot::SnapshotBuilder;

    fn snapshot(quotes: i64, invoices: i64, lookback_days: u32) -> Snapshot {
        let mut records = Vec::new();
        for index in 0..quotes {
            records.push(RawActivityRecord::Quote(RawQuote {
                created_at: Some(format!("2026-10-{:02}", index % 17 + 1)),
                status: Some(if index % 3 == 0 { "approved" } else { "sent" }.to_string()),
                total: Some(Decimal::new(100 + index * 73, 0)),
                ..RawQuote::default()
            }));
        }
        for index in 0..invoices {
            records.push(RawActivityRecord::Invoice(RawInvoice {
                issued_at: Some(format!("2026-10-{:02}", index % 15 + 1)),
                paid_at: Some(format!("2026-10-{:02}", index % 15 + 3)),
                total: Some(Decimal::new(400 + index * 11, 0)),
                ..RawInvoice::default()
            }));
        }
        SnapshotBuilder::new(lookback_days)
            .with_report_date(NaiveDate::from_ymd_opt(2026, 10, 18).expect("date"))
            .build(&records, &[])
            .expect("snapshot builds")
    }

    #[test]
    fn fallback_passes_every_check_for_any_snapshot() {
        for (quotes, invoices, lookback) in
            [(0, 0, 90), (2, 1, 90), (1, 0, 30), (9, 14, 365), (60, 40, 90), (0, 25, 7)]
        {
            let snapshot = snapshot(quotes, invoices, lookback);
            let conclusion = insufficient_evidence_conclusion(&snapshot);

            let schema = validate_conclusion(&conclusion);
            assert!(schema.ok, "schema errors: {:?}", schema.errors);

            let grounding = validate_evidence_signals(&snapshot, &conclusion.evidence_signals);
            assert!(grounding.ok, "grounding errors: {:?}", grounding.errors);

            let encoded = serde_json::to_value(&conclusion).expect("serialize conclusion");
            assert!(scan_forbidden_terms(&encoded).is_clean());

            assert!(!patch_decision_if_needed(&conclusion.decision).patched);
            assert!(check_season_sanity(&snapshot, &conclusion).warnings.is_empty());
            assert!(conclusion.boundary.starts_with("If "));
        }
    }

    #[test]
    fn pattern_id_is_stable_per_snapshot() {
        let first = insufficient_evidence_conclusion(&snapshot(2, 1, 90));
        let again = insufficient_evidence_conclusion(&snapshot(2, 1, 90));
        let other = insufficient_evidence_conclusion(&snapshot(3, 1, 90));

        assert!(first.pattern_id.starts_with(INSUFFICIENT_EVIDENCE_PREFIX));
        assert_eq!(first.pattern_id.len(), INSUFFICIENT_EVIDENCE_PREFIX.len() + 12);
        assert_eq!(first.pattern_id, again.pattern_id);
        assert_ne!(first.pattern_id, other.pattern_id);
    }
}
