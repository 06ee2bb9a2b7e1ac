//! Time-weighted exposure aggregation.
//!
//! Each reading is credited with the time elapsed since the reading before
//! it, and those durations are summed per category. The reference "now" is the
//! newest reading in the batch rather than the wall clock, so backfilled or
//! seeded history is accounted for the same way as live data.

use crate::core::breakpoints::Category;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds credited to the first reading of a window, which has no
/// predecessor to measure against. Assumes roughly one reading per minute.
pub const FIRST_SAMPLE_SECS: f64 = 60.0;

/// A stored reading reduced to what aggregation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorySample {
    pub timestamp: DateTime<Utc>,
    pub category: Option<Category>,
}

impl CategorySample {
    pub fn new(timestamp: DateTime<Utc>, category: Option<Category>) -> Self {
        Self {
            timestamp,
            category,
        }
    }
}

/// Minutes spent in each category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureTotals {
    pub good: u64,
    pub satisfactory: u64,
    pub moderate: u64,
    pub poor: u64,
    pub very_poor: u64,
    pub severe: u64,
}

impl ExposureTotals {
    pub fn get(&self, category: Category) -> u64 {
        match category {
            Category::Good => self.good,
            Category::Satisfactory => self.satisfactory,
            Category::ModeratelyPolluted => self.moderate,
            Category::Poor => self.poor,
            Category::VeryPoor => self.very_poor,
            Category::Severe => self.severe,
        }
    }

    fn slot_mut(&mut self, category: Category) -> &mut u64 {
        match category {
            Category::Good => &mut self.good,
            Category::Satisfactory => &mut self.satisfactory,
            Category::ModeratelyPolluted => &mut self.moderate,
            Category::Poor => &mut self.poor,
            Category::VeryPoor => &mut self.very_poor,
            Category::Severe => &mut self.severe,
        }
    }

    /// Sum over all categories.
    pub fn total(&self) -> u64 {
        Category::ALL.iter().map(|c| self.get(*c)).sum()
    }
}

/// Exposure totals labelled with the window they cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureReport {
    pub window: String,
    #[serde(flatten)]
    pub totals: ExposureTotals,
}

/// Aggregate minutes per category over the trailing `window`.
///
/// Never fails: an empty batch, or one with nothing inside the window,
/// yields all-zero totals. Samples with no category still advance the clock
/// for the next sample but add minutes to no bucket.
pub fn aggregate_exposure(samples: &[CategorySample], window: Duration) -> ExposureTotals {
    let Some(now) = samples.iter().map(|s| s.timestamp).max() else {
        return ExposureTotals::default();
    };
    let start = now - window;

    let mut retained: Vec<&CategorySample> =
        samples.iter().filter(|s| s.timestamp >= start).collect();
    if retained.is_empty() {
        return ExposureTotals::default();
    }
    retained.sort_by_key(|s| s.timestamp);

    let mut seconds = [0.0_f64; 6];
    let mut previous: Option<DateTime<Utc>> = None;
    for sample in retained {
        let elapsed = match previous {
            Some(prev) => (sample.timestamp - prev).num_milliseconds() as f64 / 1000.0,
            None => FIRST_SAMPLE_SECS,
        };
        previous = Some(sample.timestamp);

        if let Some(category) = sample.category {
            seconds[category.ordinal()] += elapsed;
        }
    }

    let mut totals = ExposureTotals::default();
    for category in Category::ALL {
        *totals.slot_mut(category) = (seconds[category.ordinal()] / 60.0).round() as u64;
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn minute_series(minutes: std::ops::Range<i64>, category: Category) -> Vec<CategorySample> {
        minutes
            .map(|m| CategorySample::new(base() + Duration::minutes(m), Some(category)))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let totals = aggregate_exposure(&[], Duration::hours(24));
        assert_eq!(totals, ExposureTotals::default());
        assert_eq!(totals.total(), 0);
    }

    #[test]
    fn test_ten_good_minutes() {
        let samples = minute_series(0..10, Category::Good);
        let totals = aggregate_exposure(&samples, Duration::hours(24));

        assert_eq!(totals.good, 10);
        assert_eq!(totals.total(), 10);
    }

    #[test]
    fn test_single_sample_gets_default_minute() {
        let samples = vec![CategorySample::new(base(), Some(Category::Severe))];
        let totals = aggregate_exposure(&samples, Duration::hours(1));
        assert_eq!(totals.severe, 1);
        assert_eq!(totals.total(), 1);
    }

    #[test]
    fn test_window_excludes_older_samples() {
        // 25 hours of Good, then the final hour is Poor.
        let mut samples: Vec<CategorySample> = (0..24 * 60)
            .map(|m| CategorySample::new(base() + Duration::minutes(m), Some(Category::Good)))
            .collect();
        samples.extend(minute_series(24 * 60..25 * 60 + 1, Category::Poor));

        let totals = aggregate_exposure(&samples, Duration::hours(1));

        assert_eq!(totals.good, 0);
        // 61 samples from minute 1440 to 1500: 60 intervals plus the default minute.
        assert_eq!(totals.poor, 61);
    }

    #[test]
    fn test_unsorted_input_and_missing_categories() {
        let samples = vec![
            CategorySample::new(base() + Duration::minutes(10), Some(Category::Poor)),
            CategorySample::new(base(), Some(Category::Good)),
            CategorySample::new(base() + Duration::minutes(5), None),
        ];
        let totals = aggregate_exposure(&samples, Duration::hours(1));

        // Good gets the default minute, the uncategorised sample's five
        // minutes go nowhere, Poor gets the five minutes after it.
        assert_eq!(totals.good, 1);
        assert_eq!(totals.poor, 5);
        assert_eq!(totals.total(), 6);
    }

    #[test]
    fn test_time_weighting_follows_gaps() {
        let samples = vec![
            CategorySample::new(base(), Some(Category::Good)),
            CategorySample::new(base() + Duration::minutes(30), Some(Category::VeryPoor)),
            CategorySample::new(base() + Duration::minutes(31), Some(Category::Satisfactory)),
        ];
        let totals = aggregate_exposure(&samples, Duration::hours(2));

        assert_eq!(totals.good, 1);
        assert_eq!(totals.very_poor, 30);
        assert_eq!(totals.satisfactory, 1);
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let samples = minute_series(0..120, Category::ModeratelyPolluted);
        let first = aggregate_exposure(&samples, Duration::hours(1));
        let second = aggregate_exposure(&samples, Duration::hours(1));
        assert_eq!(first, second);
        assert_eq!(first.moderate, 61);
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = ExposureReport {
            window: "24h".to_string(),
            totals: ExposureTotals {
                good: 3,
                ..ExposureTotals::default()
            },
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["window"], "24h");
        assert_eq!(value["good"], 3);
        assert_eq!(value["very_poor"], 0);
    }
}
