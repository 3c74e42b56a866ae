use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Five-level ordinal scale shared by every banded Snapshot field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Band {
    pub const ALL: [Band; 5] = [Band::VeryLow, Band::Low, Band::Medium, Band::High, Band::VeryHigh];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Low/medium/high, ordered. Used for sample confidence, season
/// predictability and the confidence a Conclusion declares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeasonPhase {
    Rising,
    Active,
    Peak,
    Lower,
}

impl SeasonPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rising => "Rising",
            Self::Active => "Active",
            Self::Peak => "Peak",
            Self::Lower => "Lower",
        }
    }
}

impl fmt::Display for SeasonPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonStrength {
    Weak,
    Moderate,
    Strong,
}

impl SeasonStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    Last90Days,
    Last12Months,
    Custom,
}

impl WindowType {
    pub fn for_lookback(lookback_days: u32) -> Self {
        match lookback_days {
            90 => Self::Last90Days,
            365 => Self::Last12Months,
            _ => Self::Custom,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostDirection {
    Up,
    Down,
    Flat,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotWindow {
    pub slice_start: NaiveDate,
    pub slice_end: NaiveDate,
    pub report_date: NaiveDate,
    pub lookback_days: u32,
    pub sample_confidence: ConfidenceLevel,
    pub window_type: WindowType,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizeBands {
    pub small: u32,
    pub medium: u32,
    pub large: u32,
}

/// Histogram over the five bands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BandDistribution {
    pub very_low: u32,
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub very_high: u32,
}

impl BandDistribution {
    pub fn count(&self, band: Band) -> u32 {
        match band {
            Band::VeryLow => self.very_low,
            Band::Low => self.low,
            Band::Medium => self.medium,
            Band::High => self.high,
            Band::VeryHigh => self.very_high,
        }
    }

    pub fn increment(&mut self, band: Band) {
        let slot = match band {
            Band::VeryLow => &mut self.very_low,
            Band::Low => &mut self.low,
            Band::Medium => &mut self.medium,
            Band::High => &mut self.high,
            Band::VeryHigh => &mut self.very_high,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u32 {
        Band::ALL.iter().map(|band| self.count(*band)).sum()
    }

    /// The most populated band; ties resolve toward the slower band.
    pub fn dominant(&self) -> Option<Band> {
        Band::ALL
            .iter()
            .copied()
            .filter(|band| self.count(*band) > 0)
            .max_by_key(|band| (self.count(*band), *band))
    }

    /// The slowest band with at least one entry.
    pub fn highest_populated(&self) -> Option<Band> {
        Band::ALL.iter().rev().copied().find(|band| self.count(*band) > 0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuoteSignals {
    pub count: u32,
    pub approved_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_rate_band: Option<Band>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_lag_band: Option<Band>,
    pub size_bands: SizeBands,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvoiceSignals {
    pub count: u32,
    pub paid_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_rate_band: Option<Band>,
    pub size_bands: SizeBands,
    pub payment_lag_band_distribution: BandDistribution,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivitySignals {
    pub quotes: QuoteSignals,
    pub invoices: InvoiceSignals,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeasonSignal {
    pub phase: SeasonPhase,
    pub strength: SeasonStrength,
    pub predictability: ConfidenceLevel,
}

impl Default for SeasonSignal {
    fn default() -> Self {
        Self {
            phase: SeasonPhase::Active,
            strength: SeasonStrength::Weak,
            predictability: ConfidenceLevel::Low,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeeklyVolume {
    pub week: String,
    pub count: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvoiceSizeBuckets {
    pub under_250: u32,
    pub between_250_and_1000: u32,
    pub between_1000_and_2500: u32,
    pub between_2500_and_5000: u32,
    pub over_5000: u32,
}

impl InvoiceSizeBuckets {
    pub fn record(&mut self, total: f64) {
        let slot = if total < 250.0 {
            &mut self.under_250
        } else if total < 1000.0 {
            &mut self.between_250_and_1000
        } else if total < 2500.0 {
            &mut self.between_1000_and_2500
        } else if total < 5000.0 {
            &mut self.between_2500_and_5000
        } else {
            &mut self.over_5000
        };
        *slot = slot.saturating_add(1);
    }
}

/// Age of still-open quotes at the report date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuoteAgeBuckets {
    pub days_0_7: u32,
    pub days_8_14: u32,
    pub days_15_30: u32,
    pub days_31_60: u32,
    pub days_61_plus: u32,
}

impl QuoteAgeBuckets {
    pub fn record(&mut self, age_days: i64) {
        let slot = match age_days {
            i64::MIN..=7 => &mut self.days_0_7,
            8..=14 => &mut self.days_8_14,
            15..=30 => &mut self.days_15_30,
            31..=60 => &mut self.days_31_60,
            _ => &mut self.days_61_plus,
        };
        *slot = slot.saturating_add(1);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputCostSignal {
    pub key: String,
    pub change_30d_pct: i64,
    pub direction: CostDirection,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Exclusions {
    pub quotes_outside_window: u32,
    pub invoices_outside_window: u32,
    pub quotes_invalid_date: u32,
    pub invoices_invalid_date: u32,
}

impl Exclusions {
    pub fn total(&self) -> u32 {
        self.quotes_outside_window
            + self.invoices_outside_window
            + self.quotes_invalid_date
            + self.invoices_invalid_date
    }
}

/// Immutable ordinal summary of one business's recent activity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    pub window: SnapshotWindow,
    pub activity_signals: ActivitySignals,
    pub volatility_band: Band,
    pub season: SeasonSignal,
    pub weekly_volume_series: Vec<WeeklyVolume>,
    pub invoice_size_buckets: InvoiceSizeBuckets,
    pub quote_age_buckets: QuoteAgeBuckets,
    pub input_costs: Vec<InputCostSignal>,
    pub exclusions: Exclusions,
}

impl Snapshot {
    /// Quotes plus invoices that landed inside the window.
    pub fn signal_count(&self) -> u32 {
        self.activity_signals.quotes.count + self.activity_signals.invoices.count
    }

    pub fn sample_confidence(&self) -> ConfidenceLevel {
        self.window.sample_confidence
    }
}

#[cfg(test)]
mod tests {
    use super::{Band, BandDistribution, InvoiceSizeBuckets, QuoteAgeBuckets, WindowType};

    #[test]
    fn band_serializes_snake_case_and_orders_by_severity() {
        let encoded = serde_json::to_string(&Band::VeryHigh).expect("serialize band");
        assert_eq!(encoded, "\"very_high\"");
        assert!(Band::VeryLow < Band::Low && Band::High < Band::VeryHigh);
    }

    #[test]
    fn dominant_band_prefers_count_then_slower_band() {
        let mut distribution = BandDistribution::default();
        assert_eq!(distribution.dominant(), None);

        distribution.increment(Band::Low);
        distribution.increment(Band::High);
        assert_eq!(distribution.dominant(), Some(Band::High));
        assert_eq!(distribution.highest_populated(), Some(Band::High));

        distribution.increment(Band::Low);
        assert_eq!(distribution.dominant(), Some(Band::Low));
        assert_eq!(distribution.total(), 3);
    }

    #[test]
    fn bucket_edges_are_half_open() {
        let mut sizes = InvoiceSizeBuckets::default();
        for total in [10.0, 250.0, 999.99, 2500.0, 5000.0] {
            sizes.record(total);
        }
        assert_eq!(sizes.under_250, 1);
        assert_eq!(sizes.between_250_and_1000, 2);
        assert_eq!(sizes.between_2500_and_5000, 1);
        assert_eq!(sizes.over_5000, 1);

        let mut ages = QuoteAgeBuckets::default();
        for age in [0, 7, 8, 30, 61] {
            ages.record(age);
        }
        assert_eq!((ages.days_0_7, ages.days_8_14, ages.days_15_30), (2, 1, 1));
        assert_eq!(ages.days_61_plus, 1);
    }

    #[test]
    fn window_type_names_known_lookbacks() {
        assert_eq!(WindowType::for_lookback(90), WindowType::Last90Days);
        assert_eq!(WindowType::for_lookback(365), WindowType::Last12Months);
        assert_eq!(WindowType::for_lookback(30), WindowType::Custom);
    }
}
