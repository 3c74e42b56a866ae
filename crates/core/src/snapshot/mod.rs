//! Snapshot Builder.
//!
//! Reduces raw quote/invoice records into the immutable ordinal `Snapshot`
//! for one report window. No I/O and no randomness: the same records, report
//! date and lookback always produce the same Snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

use crate::domain::records::{InputCostChange, RawActivityRecord, RawInvoice, RawQuote};
use crate::domain::snapshot::{
    ActivitySignals, BandDistribution, ConfidenceLevel, CostDirection, Exclusions,
    InputCostSignal, InvoiceSignals, InvoiceSizeBuckets, QuoteAgeBuckets, QuoteSignals,
    SizeBands, Snapshot, SnapshotWindow, WindowType,
};
use crate::errors::SnapshotError;
use crate::stats::{
    band, coefficient_of_variation, median, quantile, season, weekly_buckets,
    APPROVAL_RATE_THRESHOLDS, DECISION_LAG_DAYS_THRESHOLDS, PAYMENT_LAG_DAYS_THRESHOLDS,
    VOLATILITY_CV_THRESHOLDS,
};

pub const DEFAULT_LOOKBACK_DAYS: u32 = 90;
pub const MAX_LOOKBACK_DAYS: u32 = 3650;
pub const MAX_INPUT_COSTS: usize = 5;

const HIGH_SAMPLE_SIGNALS: u32 = 50;
const MEDIUM_SAMPLE_SIGNALS: u32 = 20;
const SECONDS_PER_DAY: f64 = 86_400.0;
const SMALL_SIZE_QUANTILE: f64 = 0.33;
const MEDIUM_SIZE_QUANTILE: f64 = 0.66;
const FLAT_COST_CHANGE_PCT: f64 = 1.0;

#[derive(Clone, Debug)]
pub struct SnapshotBuilder {
    lookback_days: u32,
    report_date: Option<NaiveDate>,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self { lookback_days: DEFAULT_LOOKBACK_DAYS, report_date: None }
    }
}

impl SnapshotBuilder {
    pub fn new(lookback_days: u32) -> Self {
        Self { lookback_days, ..Self::default() }
    }

    pub fn with_report_date(mut self, report_date: NaiveDate) -> Self {
        self.report_date = Some(report_date);
        self
    }

    pub fn build(
        &self,
        records: &[RawActivityRecord],
        input_costs: &[InputCostChange],
    ) -> Result<Snapshot, SnapshotError> {
        if self.lookback_days == 0 || self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(SnapshotError::InvalidLookback { lookback_days: self.lookback_days });
        }

        let report_date = self.report_date.unwrap_or_else(|| Utc::now().date_naive());
        let window = WindowBounds::new(report_date, self.lookback_days);

        let mut exclusions = Exclusions::default();
        let mut quotes = Vec::new();
        let mut invoices = Vec::new();

        for record in records {
            match record {
                RawActivityRecord::Quote(quote) => match quote.created() {
                    None => exclusions.quotes_invalid_date += 1,
                    Some(created) if !window.contains(created) => {
                        exclusions.quotes_outside_window += 1;
                    }
                    Some(created) => quotes.push(Anchored { anchor: created, record: quote }),
                },
                RawActivityRecord::Invoice(invoice) => match invoice.issued() {
                    None => exclusions.invoices_invalid_date += 1,
                    Some(issued) if !window.contains(issued) => {
                        exclusions.invoices_outside_window += 1;
                    }
                    Some(issued) => invoices.push(Anchored { anchor: issued, record: invoice }),
                },
            }
        }

        let (quote_signals, quote_age_buckets) = quote_signals(&quotes, report_date);
        let (invoice_signals, invoice_size_buckets) = invoice_signals(&invoices);

        let mut daily_totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        let quote_amounts = quotes.iter().map(|quote| (quote.anchor, quote.record.total_value()));
        let invoice_amounts =
            invoices.iter().map(|invoice| (invoice.anchor, invoice.record.total_value()));
        for (anchor, total) in quote_amounts.chain(invoice_amounts) {
            if let Some(total) = total {
                *daily_totals.entry(anchor.date_naive()).or_default() += total;
            }
        }
        let daily_values = daily_totals.into_values().collect::<Vec<_>>();
        let volatility_band = band(coefficient_of_variation(&daily_values), &VOLATILITY_CV_THRESHOLDS);

        let anchors = quotes
            .iter()
            .map(|quote| quote.anchor)
            .chain(invoices.iter().map(|invoice| invoice.anchor))
            .collect::<Vec<_>>();
        let weekly_volume_series = weekly_buckets(&anchors);
        let season = season(&weekly_volume_series);

        let signal_count = quote_signals.count + invoice_signals.count;
        let snapshot = Snapshot {
            window: SnapshotWindow {
                slice_start: window.slice_start,
                slice_end: report_date,
                report_date,
                lookback_days: self.lookback_days,
                sample_confidence: sample_confidence(signal_count),
                window_type: WindowType::for_lookback(self.lookback_days),
            },
            activity_signals: ActivitySignals { quotes: quote_signals, invoices: invoice_signals },
            volatility_band,
            season,
            weekly_volume_series,
            invoice_size_buckets,
            quote_age_buckets,
            input_costs: input_cost_signals(input_costs),
            exclusions,
        };

        tracing::debug!(
            event_name = "snapshot.built",
            report_date = %report_date,
            lookback_days = self.lookback_days,
            signal_count,
            excluded = snapshot.exclusions.total(),
            sample_confidence = %snapshot.window.sample_confidence,
            "snapshot built"
        );

        Ok(snapshot)
    }
}

/// Convenience entry point mirroring `SnapshotBuilder`.
pub fn build_snapshot(
    records: &[RawActivityRecord],
    report_date: Option<NaiveDate>,
    lookback_days: Option<u32>,
    input_costs: &[InputCostChange],
) -> Result<Snapshot, SnapshotError> {
    let mut builder = SnapshotBuilder::new(lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS));
    if let Some(report_date) = report_date {
        builder = builder.with_report_date(report_date);
    }
    builder.build(records, input_costs)
}

pub fn sample_confidence(signal_count: u32) -> ConfidenceLevel {
    if signal_count >= HIGH_SAMPLE_SIGNALS {
        ConfidenceLevel::High
    } else if signal_count >= MEDIUM_SAMPLE_SIGNALS {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

struct Anchored<'a, T> {
    anchor: DateTime<Utc>,
    record: &'a T,
}

/// Calendar days `[slice_start, report_date]`, i.e. the half-open instant
/// range from midnight of `slice_start` to midnight after the report date.
struct WindowBounds {
    slice_start: NaiveDate,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl WindowBounds {
    fn new(report_date: NaiveDate, lookback_days: u32) -> Self {
        let slice_start = report_date
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        let day_after = report_date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
        Self { slice_start, start: day_start(slice_start), end: day_start(day_after) }
    }

    fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn lag_days(from: DateTime<Utc>, to: DateTime<Utc>) -> Option<f64> {
    let seconds = (to - from).num_seconds();
    (seconds >= 0).then(|| seconds as f64 / SECONDS_PER_DAY)
}

fn rate(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    f64::from(part) / f64::from(whole)
}

fn quote_signals(
    quotes: &[Anchored<'_, RawQuote>],
    report_date: NaiveDate,
) -> (QuoteSignals, QuoteAgeBuckets) {
    let count = quotes.len() as u32;
    let mut approved_count = 0;
    let mut decision_lags = Vec::new();
    let mut age_buckets = QuoteAgeBuckets::default();

    for quote in quotes {
        if quote.record.is_approved() {
            approved_count += 1;
            if let Some(lag) =
                quote.record.approved().and_then(|approved| lag_days(quote.anchor, approved))
            {
                decision_lags.push(lag);
            }
        } else {
            let age = report_date.signed_duration_since(quote.anchor.date_naive()).num_days();
            age_buckets.record(age);
        }
    }

    let totals = quotes.iter().filter_map(|quote| quote.record.total_value()).collect::<Vec<_>>();

    let signals = QuoteSignals {
        count,
        approved_count,
        approval_rate_band: (count > 0)
            .then(|| band(rate(approved_count, count), &APPROVAL_RATE_THRESHOLDS)),
        decision_lag_band: (!decision_lags.is_empty())
            .then(|| band(median(&decision_lags), &DECISION_LAG_DAYS_THRESHOLDS)),
        size_bands: size_bands(&totals),
    };
    (signals, age_buckets)
}

fn invoice_signals(invoices: &[Anchored<'_, RawInvoice>]) -> (InvoiceSignals, InvoiceSizeBuckets) {
    let count = invoices.len() as u32;
    let mut paid_count = 0;
    let mut payment_lags = BandDistribution::default();
    let mut size_buckets = InvoiceSizeBuckets::default();

    for invoice in invoices {
        if invoice.record.is_paid() {
            paid_count += 1;
            if let Some(lag) = invoice.record.paid().and_then(|paid| lag_days(invoice.anchor, paid))
            {
                payment_lags.increment(band(lag, &PAYMENT_LAG_DAYS_THRESHOLDS));
            }
        }
        if let Some(total) = invoice.record.total_value().filter(|total| *total > 0.0) {
            size_buckets.record(total);
        }
    }

    let totals =
        invoices.iter().filter_map(|invoice| invoice.record.total_value()).collect::<Vec<_>>();

    let signals = InvoiceSignals {
        count,
        paid_count,
        paid_rate_band: (count > 0).then(|| band(rate(paid_count, count), &APPROVAL_RATE_THRESHOLDS)),
        size_bands: size_bands(&totals),
        payment_lag_band_distribution: payment_lags,
    };
    (signals, size_buckets)
}

/// Tercile split of the positive totals.
fn size_bands(totals: &[f64]) -> SizeBands {
    let mut positive = totals.iter().copied().filter(|total| *total > 0.0).collect::<Vec<_>>();
    positive.sort_by(f64::total_cmp);

    let small_edge = quantile(&positive, SMALL_SIZE_QUANTILE);
    let medium_edge = quantile(&positive, MEDIUM_SIZE_QUANTILE);

    let mut bands = SizeBands::default();
    for total in &positive {
        if *total <= small_edge {
            bands.small += 1;
        } else if *total <= medium_edge {
            bands.medium += 1;
        } else {
            bands.large += 1;
        }
    }
    bands
}

fn input_cost_signals(input_costs: &[InputCostChange]) -> Vec<InputCostSignal> {
    let mut ranked = input_costs
        .iter()
        .filter(|cost| cost.change_30d_pct.is_finite() && !cost.key.trim().is_empty())
        .collect::<Vec<_>>();
    ranked.sort_by(|left, right| {
        right
            .change_30d_pct
            .abs()
            .total_cmp(&left.change_30d_pct.abs())
            .then_with(|| left.key.cmp(&right.key))
    });

    ranked
        .into_iter()
        .take(MAX_INPUT_COSTS)
        .map(|cost| {
            let direction = if cost.change_30d_pct.abs() < FLAT_COST_CHANGE_PCT {
                CostDirection::Flat
            } else if cost.change_30d_pct > 0.0 {
                CostDirection::Up
            } else {
                CostDirection::Down
            };
            InputCostSignal {
                key: cost.key.trim().to_string(),
                change_30d_pct: cost.change_30d_pct.round() as i64,
                direction,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{build_snapshot, sample_confidence, SnapshotBuilder};
    use crate::domain::records::{InputCostChange, RawActivityRecord, RawInvoice, RawQuote};
    use crate::domain::snapshot::{Band, ConfidenceLevel, CostDirection, WindowType};
    use crate::errors::SnapshotError;

    fn report_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date")
    }

    fn quote(created: &str, status: &str, approved: Option<&str>, total: i64) -> RawActivityRecord {
        RawActivityRecord::Quote(RawQuote {
            id: None,
            created_at: Some(created.to_string()),
            approved_at: approved.map(str::to_string),
            status: Some(status.to_string()),
            total: Some(Decimal::new(total, 0)),
        })
    }

    fn invoice(issued: &str, paid: Option<&str>, total: i64) -> RawActivityRecord {
        RawActivityRecord::Invoice(RawInvoice {
            id: None,
            issued_at: Some(issued.to_string()),
            paid_at: paid.map(str::to_string),
            status: Some(if paid.is_some() { "paid" } else { "open" }.to_string()),
            total: Some(Decimal::new(total, 0)),
        })
    }

    fn build(records: &[RawActivityRecord]) -> crate::domain::snapshot::Snapshot {
        SnapshotBuilder::default()
            .with_report_date(report_date())
            .build(records, &[])
            .expect("snapshot builds")
    }

    #[test]
    fn window_edges_and_exclusions_balance() {
        let records = vec![
            quote("2026-07-20 00:00:00", "sent", None, 100),
            quote("2026-07-19 23:59:59", "sent", None, 100),
            quote("2026-10-18 23:30:00", "sent", None, 100),
            quote("2026-10-19 00:00:00", "sent", None, 100),
            quote("not a date", "sent", None, 100),
            invoice("2026-09-01", None, 400),
            invoice("2025-01-01", None, 400),
            RawActivityRecord::Invoice(RawInvoice::default()),
        ];

        let snapshot = build(&records);
        assert_eq!(snapshot.window.slice_start, NaiveDate::from_ymd_opt(2026, 7, 20).expect("date"));
        assert_eq!(snapshot.window.slice_end, report_date());
        assert!(snapshot.window.slice_start <= snapshot.window.slice_end);
        assert_eq!(snapshot.window.window_type, WindowType::Last90Days);

        assert_eq!(snapshot.activity_signals.quotes.count, 2);
        assert_eq!(snapshot.activity_signals.invoices.count, 1);
        assert_eq!(snapshot.exclusions.quotes_outside_window, 2);
        assert_eq!(snapshot.exclusions.quotes_invalid_date, 1);
        assert_eq!(snapshot.exclusions.invoices_outside_window, 1);
        assert_eq!(snapshot.exclusions.invoices_invalid_date, 1);
        assert_eq!(
            snapshot.exclusions.total() + snapshot.signal_count(),
            records.len() as u32
        );
    }

    #[test]
    fn approval_rate_and_decision_lag_are_banded() {
        let records = vec![
            quote("2026-10-01 09:00:00", "approved", Some("2026-10-03 09:00:00"), 500),
            quote("2026-10-02 09:00:00", "Accepted", Some("2026-10-04 09:00:00"), 700),
            quote("2026-10-03 09:00:00", "converted", Some("2026-10-05 21:00:00"), 900),
            quote("2026-10-04 09:00:00", "sent", None, 300),
        ];

        let snapshot = build(&records);
        let quotes = &snapshot.activity_signals.quotes;
        assert_eq!(quotes.approved_count, 3);
        assert_eq!(quotes.approval_rate_band, Some(Band::High));
        assert_eq!(quotes.decision_lag_band, Some(Band::Low));
        assert_eq!(snapshot.quote_age_buckets.days_8_14, 1);
    }

    #[test]
    fn empty_quote_set_leaves_rate_bands_unset() {
        let snapshot = build(&[invoice("2026-10-01", None, 100)]);
        assert_eq!(snapshot.activity_signals.quotes.approval_rate_band, None);
        assert_eq!(snapshot.activity_signals.quotes.decision_lag_band, None);
        assert_eq!(snapshot.activity_signals.invoices.paid_rate_band, Some(Band::VeryLow));

        let encoded = serde_json::to_value(&snapshot).expect("serialize snapshot");
        assert!(encoded["activity_signals"]["quotes"].get("approval_rate_band").is_none());
    }

    #[test]
    fn payment_lags_fill_the_distribution() {
        let records = vec![
            invoice("2026-09-01", Some("2026-09-01 12:00:00"), 200),
            invoice("2026-09-01", Some("2026-09-06"), 1200),
            invoice("2026-09-01", Some("2026-09-20"), 3000),
            invoice("2026-09-01", Some("2026-10-15"), 8000),
            invoice("2026-09-02", None, 600),
        ];

        let snapshot = build(&records);
        let invoices = &snapshot.activity_signals.invoices;
        assert_eq!(invoices.paid_count, 4);
        assert_eq!(invoices.paid_rate_band, Some(Band::High));

        let distribution = invoices.payment_lag_band_distribution;
        assert_eq!(distribution.very_low, 1);
        assert_eq!(distribution.medium, 1);
        assert_eq!(distribution.high, 1);
        assert_eq!(distribution.very_high, 1);

        assert_eq!(snapshot.invoice_size_buckets.under_250, 1);
        assert_eq!(snapshot.invoice_size_buckets.over_5000, 1);
    }

    #[test]
    fn size_bands_split_positive_totals_into_terciles() {
        let records = (1..=9)
            .map(|index| invoice("2026-09-10", None, index * 100))
            .chain(std::iter::once(invoice("2026-09-10", None, 0)))
            .collect::<Vec<_>>();

        let bands = build(&records).activity_signals.invoices.size_bands;
        assert_eq!((bands.small, bands.medium, bands.large), (3, 3, 3));
    }

    #[test]
    fn steady_daily_revenue_is_very_low_volatility() {
        let records = (1..=10)
            .map(|day| invoice(&format!("2026-10-{day:02}"), None, 1000))
            .collect::<Vec<_>>();
        assert_eq!(build(&records).volatility_band, Band::VeryLow);

        let spiky = vec![
            invoice("2026-10-01", None, 100),
            invoice("2026-10-02", None, 5000),
            invoice("2026-10-03", None, 150),
        ];
        assert_eq!(build(&spiky).volatility_band, Band::VeryHigh);
    }

    #[test]
    fn sample_confidence_thresholds() {
        assert_eq!(sample_confidence(0), ConfidenceLevel::Low);
        assert_eq!(sample_confidence(19), ConfidenceLevel::Low);
        assert_eq!(sample_confidence(20), ConfidenceLevel::Medium);
        assert_eq!(sample_confidence(50), ConfidenceLevel::High);
    }

    #[test]
    fn input_costs_keep_top_five_by_magnitude() {
        let costs = [("copper", 12.4), ("freon", -18.0), ("labor", 0.4), ("filters", 3.0),
            ("ducting", -2.6), ("fuel", 7.5)]
            .into_iter()
            .map(|(key, change)| InputCostChange { key: key.to_string(), change_30d_pct: change })
            .collect::<Vec<_>>();

        let snapshot = SnapshotBuilder::default()
            .with_report_date(report_date())
            .build(&[], &costs)
            .expect("snapshot builds");

        let keys = snapshot.input_costs.iter().map(|cost| cost.key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["freon", "copper", "fuel", "filters", "ducting"]);
        assert_eq!(snapshot.input_costs[0].change_30d_pct, -18);
        assert_eq!(snapshot.input_costs[0].direction, CostDirection::Down);
        assert_eq!(snapshot.input_costs[1].change_30d_pct, 12);
    }

    #[test]
    fn rejects_out_of_range_lookback() {
        let error = build_snapshot(&[], Some(report_date()), Some(0), &[])
            .expect_err("zero lookback should fail");
        assert_eq!(error, SnapshotError::InvalidLookback { lookback_days: 0 });
    }

    #[test]
    fn identical_inputs_build_identical_snapshots() {
        let records = vec![
            quote("2026-09-01 10:00:00", "approved", Some("2026-09-04 10:00:00"), 900),
            invoice("2026-09-05", Some("2026-09-19"), 900),
            invoice("2026-09-12", None, 450),
        ];
        let first = build_snapshot(&records, Some(report_date()), Some(90), &[]).expect("first");
        let second = build_snapshot(&records, Some(report_date()), Some(90), &[]).expect("second");
        assert_eq!(first, second);
    }
}
