//! Statistical primitives behind the Snapshot.
//!
//! Everything here is a pure function of its inputs: continuous metrics are
//! reduced to ordinal bands, weekly counts are reduced to a season signal.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};

use crate::domain::snapshot::{
    Band, ConfidenceLevel, SeasonPhase, SeasonSignal, SeasonStrength, WeeklyVolume,
};

/// Four ascending cut points separating the five bands.
pub type Thresholds = [f64; 4];

pub const APPROVAL_RATE_THRESHOLDS: Thresholds = [0.10, 0.30, 0.60, 0.85];
pub const DECISION_LAG_DAYS_THRESHOLDS: Thresholds = [1.0, 3.0, 7.0, 14.0];
pub const PAYMENT_LAG_DAYS_THRESHOLDS: Thresholds = [1.0, 3.0, 7.0, 21.0];
pub const VOLATILITY_CV_THRESHOLDS: Thresholds = [0.10, 0.25, 0.50, 0.90];

const PEAK_RATIO: f64 = 1.15;
const LOWER_RATIO: f64 = 0.85;
const STRONG_AMPLITUDE: f64 = 0.6;
const MODERATE_AMPLITUDE: f64 = 0.3;
const HIGH_PREDICTABILITY_CV: f64 = 0.25;
const MEDIUM_PREDICTABILITY_CV: f64 = 0.5;

pub fn band(x: f64, thresholds: &Thresholds) -> Band {
    if x <= thresholds[0] {
        Band::VeryLow
    } else if x <= thresholds[1] {
        Band::Low
    } else if x <= thresholds[2] {
        Band::Medium
    } else if x <= thresholds[3] {
        Band::High
    } else {
        Band::VeryHigh
    }
}

/// Linear-interpolation order statistic over already sorted values.
pub fn quantile(sorted_values: &[f64], q: f64) -> f64 {
    match sorted_values {
        [] => 0.0,
        [only] => *only,
        _ => {
            let q = q.clamp(0.0, 1.0);
            let position = q * (sorted_values.len() - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let fraction = position - lower as f64;
            sorted_values[lower] + (sorted_values[upper] - sorted_values[lower]) * fraction
        }
    }
}

pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile(&sorted, 0.5)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation over mean. Zero when the mean is not positive
/// or there are fewer than two values.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let average = mean(values);
    if average <= 0.0 || values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|value| (value - average).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt() / average
}

/// Groups timestamps into `YYYY-Www` buckets, where the week number counts
/// seven-day blocks from January 1st. Returned in chronological order.
pub fn weekly_buckets(dates: &[DateTime<Utc>]) -> Vec<WeeklyVolume> {
    let mut counts: BTreeMap<(i32, u32), u32> = BTreeMap::new();
    for date in dates {
        let week = date.ordinal0() / 7 + 1;
        *counts.entry((date.year(), week)).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|((year, week), count)| WeeklyVolume { week: format!("{year}-W{week:02}"), count })
        .collect()
}

pub fn season(buckets: &[WeeklyVolume]) -> SeasonSignal {
    let counts = buckets.iter().map(|bucket| f64::from(bucket.count)).collect::<Vec<_>>();
    let Some(&last) = counts.last() else {
        return SeasonSignal::default();
    };

    let average = mean(&counts);
    let min = counts.iter().copied().fold(f64::INFINITY, f64::min);
    let max = counts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let amplitude = if average > 0.0 { (max - min) / average } else { 0.0 };
    let previous = counts.len().checked_sub(2).map(|index| counts[index]);

    let phase = if last >= PEAK_RATIO * average {
        SeasonPhase::Peak
    } else if last <= LOWER_RATIO * average {
        SeasonPhase::Lower
    } else if previous.is_some_and(|previous| last > previous) {
        SeasonPhase::Rising
    } else {
        SeasonPhase::Active
    };

    let strength = if amplitude > STRONG_AMPLITUDE {
        SeasonStrength::Strong
    } else if amplitude > MODERATE_AMPLITUDE {
        SeasonStrength::Moderate
    } else {
        SeasonStrength::Weak
    };

    let cv = coefficient_of_variation(&counts);
    let predictability = if cv < HIGH_PREDICTABILITY_CV {
        ConfidenceLevel::High
    } else if cv < MEDIUM_PREDICTABILITY_CV {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };

    SeasonSignal { phase, strength, predictability }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{
        band, coefficient_of_variation, median, quantile, season, weekly_buckets,
        APPROVAL_RATE_THRESHOLDS, DECISION_LAG_DAYS_THRESHOLDS, PAYMENT_LAG_DAYS_THRESHOLDS,
        VOLATILITY_CV_THRESHOLDS,
    };
    use crate::domain::snapshot::{
        Band, ConfidenceLevel, SeasonPhase, SeasonStrength, WeeklyVolume,
    };

    fn weeks(counts: &[u32]) -> Vec<WeeklyVolume> {
        counts
            .iter()
            .enumerate()
            .map(|(index, count)| WeeklyVolume {
                week: format!("2026-W{:02}", index + 1),
                count: *count,
            })
            .collect()
    }

    #[test]
    fn band_boundaries_are_inclusive_upper_edges() {
        assert_eq!(band(0.10, &APPROVAL_RATE_THRESHOLDS), Band::VeryLow);
        assert_eq!(band(0.11, &APPROVAL_RATE_THRESHOLDS), Band::Low);
        assert_eq!(band(0.60, &APPROVAL_RATE_THRESHOLDS), Band::Medium);
        assert_eq!(band(0.85, &APPROVAL_RATE_THRESHOLDS), Band::High);
        assert_eq!(band(0.86, &APPROVAL_RATE_THRESHOLDS), Band::VeryHigh);
        assert_eq!(band(21.0, &PAYMENT_LAG_DAYS_THRESHOLDS), Band::High);
    }

    #[test]
    fn banding_is_monotonic_for_every_threshold_set() {
        for thresholds in [
            APPROVAL_RATE_THRESHOLDS,
            DECISION_LAG_DAYS_THRESHOLDS,
            PAYMENT_LAG_DAYS_THRESHOLDS,
            VOLATILITY_CV_THRESHOLDS,
        ] {
            let mut previous = Band::VeryLow;
            for step in 0..=4000 {
                let x = -1.0 + f64::from(step) * 0.01;
                let current = band(x, &thresholds);
                assert!(current >= previous, "band decreased at x={x} for {thresholds:?}");
                assert_eq!(current, band(x, &thresholds));
                previous = current;
            }
            assert_eq!(previous, Band::VeryHigh);
        }
    }

    #[test]
    fn quantile_interpolates_linearly() {
        assert_eq!(quantile(&[], 0.5), 0.0);
        assert_eq!(quantile(&[4.0], 0.9), 4.0);
        assert!((quantile(&[1.0, 2.0, 3.0, 4.0], 0.5) - 2.5).abs() < 1e-9);
        assert!((quantile(&[10.0, 20.0, 30.0], 0.33) - 16.6).abs() < 1e-9);
        assert_eq!(median(&[9.0, 1.0, 5.0]), 5.0);
    }

    #[test]
    fn coefficient_of_variation_guards_degenerate_inputs() {
        assert_eq!(coefficient_of_variation(&[]), 0.0);
        assert_eq!(coefficient_of_variation(&[5.0]), 0.0);
        assert_eq!(coefficient_of_variation(&[-1.0, 1.0]), 0.0);
        assert_eq!(coefficient_of_variation(&[3.0, 3.0, 3.0]), 0.0);

        let cv = coefficient_of_variation(&[2.0, 4.0, 6.0]);
        assert!((cv - 0.5).abs() < 1e-9);
    }

    #[test]
    fn weekly_buckets_count_seven_day_blocks_from_new_year() {
        let dates = vec![
            Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).single().expect("date"),
            Utc.with_ymd_and_hms(2026, 1, 7, 9, 0, 0).single().expect("date"),
            Utc.with_ymd_and_hms(2026, 1, 8, 9, 0, 0).single().expect("date"),
            Utc.with_ymd_and_hms(2025, 12, 31, 9, 0, 0).single().expect("date"),
        ];

        let buckets = weekly_buckets(&dates);
        let keys = buckets.iter().map(|bucket| bucket.week.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["2025-W53", "2026-W01", "2026-W02"]);
        assert_eq!(buckets[1].count, 2);
    }

    #[test]
    fn empty_series_uses_default_season() {
        let signal = season(&[]);
        assert_eq!(signal.phase, SeasonPhase::Active);
        assert_eq!(signal.strength, SeasonStrength::Weak);
        assert_eq!(signal.predictability, ConfidenceLevel::Low);
    }

    #[test]
    fn season_phase_follows_last_week() {
        assert_eq!(season(&weeks(&[4, 4, 4, 8])).phase, SeasonPhase::Peak);
        assert_eq!(season(&weeks(&[8, 8, 8, 4])).phase, SeasonPhase::Lower);
        assert_eq!(season(&weeks(&[9, 10, 10, 10, 10])).phase, SeasonPhase::Active);
        assert_eq!(season(&weeks(&[10, 10, 10, 9, 10])).phase, SeasonPhase::Rising);
    }

    #[test]
    fn season_strength_and_predictability_follow_spread() {
        let steady = season(&weeks(&[10, 10, 11, 10]));
        assert_eq!(steady.strength, SeasonStrength::Weak);
        assert_eq!(steady.predictability, ConfidenceLevel::High);

        let swinging = season(&weeks(&[2, 12, 3, 14, 2]));
        assert_eq!(swinging.strength, SeasonStrength::Strong);
        assert_eq!(swinging.predictability, ConfidenceLevel::Low);
    }
}
