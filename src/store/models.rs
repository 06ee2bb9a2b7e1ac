//! Records persisted by the store.

use crate::core::{Category, Severity};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Site used when a reading does not name one.
pub const DEFAULT_SITE: &str = "Lab";

/// Alert type recorded for PM2.5 threshold crossings.
pub const PM25_ALERT: &str = "pm25_alert";

/// A stored sensor reading. The timestamp is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub ts: DateTime<Utc>,
    pub pm25: Option<f64>,
    pub co2: Option<f64>,
    pub temp: Option<f64>,
    pub rh: Option<f64>,
    pub pm25_index: Option<u32>,
    pub pm25_category: Option<Category>,
    pub site: String,
    pub source: Option<String>,
}

/// An alert about to be appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub ts: DateTime<Utc>,
    pub site: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub message: String,
}

/// A stored alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub site: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub message: String,
    pub acknowledged: bool,
}

/// Filters for listing readings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingQuery {
    /// Maximum rows, newest first before reordering
    pub limit: usize,
    pub site: Option<String>,
    /// Trailing window anchored at the newest matching reading
    pub window: Option<Duration>,
}

impl Default for ReadingQuery {
    fn default() -> Self {
        Self {
            limit: 500,
            site: None,
            window: None,
        }
    }
}

/// Row count and newest timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub last: Option<DateTime<Utc>>,
    pub count: u64,
}
