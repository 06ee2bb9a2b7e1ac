//! Min/mean/max summaries of recent measurements.

use crate::store::Reading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution, Max, Min};

/// Summary of one measurement series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl SeriesSummary {
    /// Summarize `values`, or `None` if there are none.
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let data = Data::new(values);
        Some(Self {
            min: data.min(),
            mean: data.mean()?,
            max: data.max(),
        })
    }
}

/// Measurement statistics over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub window: String,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm25: Option<SeriesSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2: Option<SeriesSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<SeriesSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rh: Option<SeriesSummary>,
}

/// Summarize readings that are already restricted to the window.
pub fn summarize(window: &str, readings: &[Reading]) -> StatsReport {
    let series = |pick: fn(&Reading) -> Option<f64>| -> Option<SeriesSummary> {
        SeriesSummary::from_values(readings.iter().filter_map(pick).collect())
    };

    StatsReport {
        window: window.to_string(),
        count: readings.len(),
        last: readings.iter().map(|r| r.ts).max(),
        pm25: series(|r| r.pm25),
        co2: series(|r| r.co2),
        temp: series(|r| r.temp),
        rh: series(|r| r.rh),
    }
}
