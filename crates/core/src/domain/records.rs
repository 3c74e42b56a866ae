use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const DATE_TIME_FORMATS: &[&str] =
    &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%m/%d/%Y %H:%M"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub approved_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total: Option<Decimal>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInvoice {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub issued_at: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawActivityRecord {
    Quote(RawQuote),
    Invoice(RawInvoice),
}

/// Caller-supplied input cost movement, e.g. a supplier price index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputCostChange {
    pub key: String,
    pub change_30d_pct: f64,
}

/// The on-disk shape accepted by the CLI: quotes and invoices side by side.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordBundle {
    #[serde(default)]
    pub quotes: Vec<RawQuote>,
    #[serde(default)]
    pub invoices: Vec<RawInvoice>,
    #[serde(default)]
    pub input_costs: Vec<InputCostChange>,
}

impl RecordBundle {
    pub fn into_records(self) -> (Vec<RawActivityRecord>, Vec<InputCostChange>) {
        let records = self
            .quotes
            .into_iter()
            .map(RawActivityRecord::Quote)
            .chain(self.invoices.into_iter().map(RawActivityRecord::Invoice))
            .collect();
        (records, self.input_costs)
    }
}

impl RawQuote {
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    pub fn approved(&self) -> Option<DateTime<Utc>> {
        self.approved_at.as_deref().and_then(parse_timestamp)
    }

    pub fn is_approved(&self) -> bool {
        status_matches(self.status.as_deref(), &["approved", "accepted", "converted"])
            || self.approved().is_some()
    }

    pub fn total_value(&self) -> Option<f64> {
        self.total.and_then(|total| total.to_f64())
    }
}

impl RawInvoice {
    pub fn issued(&self) -> Option<DateTime<Utc>> {
        self.issued_at.as_deref().and_then(parse_timestamp)
    }

    pub fn paid(&self) -> Option<DateTime<Utc>> {
        self.paid_at.as_deref().and_then(parse_timestamp)
    }

    pub fn is_paid(&self) -> bool {
        status_matches(self.status.as_deref(), &["paid"]) || self.paid().is_some()
    }

    pub fn total_value(&self) -> Option<f64> {
        self.total.and_then(|total| total.to_f64())
    }
}

/// Parses the timestamp shapes seen in quote/invoice exports. Date-only
/// values are anchored at midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    let without_zone = value.trim_end_matches('Z');
    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(without_zone, format) {
            return Some(parsed.and_utc());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return parsed.and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc());
        }
    }

    None
}

fn status_matches(status: Option<&str>, keywords: &[&str]) -> bool {
    let Some(status) = status else {
        return false;
    };
    let normalized = status.trim().to_ascii_lowercase();
    keywords.iter().any(|keyword| {
        normalized.contains(keyword)
            && !normalized.contains(&format!("un{keyword}"))
            && !normalized.contains(&format!("not {keyword}"))
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};
    use rust_decimal::Decimal;

    use super::{parse_timestamp, RawInvoice, RawQuote, RecordBundle};

    #[test]
    fn parses_export_timestamp_shapes() {
        let rfc = parse_timestamp("2026-03-04T10:30:00Z").expect("rfc3339");
        assert_eq!((rfc.year(), rfc.month(), rfc.day(), rfc.hour()), (2026, 3, 4, 10));

        let spaced = parse_timestamp("2026-03-04 08:15:00").expect("spaced");
        assert_eq!(spaced.minute(), 15);

        let us = parse_timestamp("03/04/2026").expect("us date");
        assert_eq!((us.month(), us.day()), (3, 4));

        let date_only = parse_timestamp(" 2026-03-04 ").expect("date only");
        assert_eq!(date_only.hour(), 0);

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("last tuesday").is_none());
    }

    #[test]
    fn approval_reads_status_or_timestamp() {
        let accepted = RawQuote { status: Some("Accepted".to_string()), ..RawQuote::default() };
        assert!(accepted.is_approved());

        let converted = RawQuote { status: Some("converted to job".into()), ..RawQuote::default() };
        assert!(converted.is_approved());

        let unapproved = RawQuote { status: Some("Unapproved".into()), ..RawQuote::default() };
        assert!(!unapproved.is_approved());

        let stamped = RawQuote {
            status: Some("sent".into()),
            approved_at: Some("2026-01-02".into()),
            ..RawQuote::default()
        };
        assert!(stamped.is_approved());
    }

    #[test]
    fn unpaid_status_is_not_paid() {
        let unpaid = RawInvoice { status: Some("Unpaid".into()), ..RawInvoice::default() };
        assert!(!unpaid.is_paid());

        let paid = RawInvoice { status: Some("PAID".into()), ..RawInvoice::default() };
        assert!(paid.is_paid());

        let overdue = RawInvoice {
            status: Some("overdue".into()),
            paid_at: Some("2026-02-01 09:00:00".into()),
            ..RawInvoice::default()
        };
        assert!(overdue.is_paid());
    }

    #[test]
    fn bundle_deserializes_numeric_and_string_totals() {
        let bundle: RecordBundle = serde_json::from_str(
            r#"{
                "quotes": [{"created_at": "2026-01-02", "status": "sent", "total": 1250.5}],
                "invoices": [{"issued_at": "2026-01-03", "total": "980.00"}]
            }"#,
        )
        .expect("bundle parses");

        assert_eq!(bundle.quotes[0].total, Some(Decimal::new(12505, 1)));
        assert_eq!(bundle.invoices[0].total_value(), Some(980.0));

        let (records, input_costs) = bundle.into_records();
        assert_eq!(records.len(), 2);
        assert!(input_costs.is_empty());
    }
}
