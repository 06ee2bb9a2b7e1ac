//! Ingest pipeline: classify incoming readings, persist them, raise alerts,
//! and answer exposure/statistics queries against the store.

use crate::core::{
    aggregate_exposure, summarize, Category, Classifier, ExposureReport, ExposureWindow,
    StatsReport,
};
use crate::generator::{sample, seed_ambient, seed_band};
use crate::store::{NewAlert, Reading, ReadingQuery, Store, StoreError, DEFAULT_SITE, PM25_ALERT};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Row limit applied when computing statistics.
const STATS_ROW_LIMIT: usize = 1_000_000;

/// Upper bound on readings generated by one seed request.
pub const MAX_SEED_READINGS: u64 = 1_000_000;

/// Source tag for seeded readings.
pub const SEED_SOURCE: &str = "seed";

/// An incoming reading as posted by sensors or the simulator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingIn {
    /// Measurement time; defaults to the time of ingest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pm25: Option<f64>,
    #[serde(default)]
    pub co2: Option<f64>,
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub rh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Result of ingesting one reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub inserted: DateTime<Utc>,
    pub pm25_index: Option<u32>,
    pub pm25_category: Option<Category>,
}

/// Request to backfill synthetic history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRequest {
    #[serde(default = "default_seed_hours")]
    pub hours: u32,
    /// Site to seed; the ingestor's default site when absent or blank
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default = "default_period_seconds")]
    pub period_seconds: u32,
}

fn default_seed_hours() -> u32 {
    24
}

fn default_period_seconds() -> u32 {
    60
}

impl Default for SeedRequest {
    fn default() -> Self {
        Self {
            hours: default_seed_hours(),
            site: None,
            period_seconds: default_period_seconds(),
        }
    }
}

/// Result of a seed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedOutcome {
    pub seeded: usize,
    pub site: String,
    pub period_seconds: u32,
}

/// Ingest errors.
#[derive(Debug)]
pub enum IngestError {
    InvalidRequest(String),
    Store(StoreError),
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        IngestError::Store(err)
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::InvalidRequest(msg) => write!(f, "Invalid request: {msg}"),
            IngestError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for IngestError {}

/// Build the alert for a classified reading, if its category warrants one.
pub fn alert_for(reading: &Reading) -> Option<NewAlert> {
    let category = reading.pm25_category?;
    let severity = category.alert_severity()?;
    let value = reading.pm25?;

    Some(NewAlert {
        ts: reading.ts,
        site: reading.site.clone(),
        kind: PM25_ALERT.to_string(),
        severity,
        message: format!("PM2.5 is {category} ({value:.1} µg/m³)"),
    })
}

/// Classifies and stores readings; answers aggregate queries.
#[derive(Clone)]
pub struct Ingestor {
    store: Store,
    classifier: Classifier,
    default_site: String,
}

impl Ingestor {
    pub fn new(store: Store, classifier: Classifier) -> Self {
        Self {
            store,
            classifier,
            default_site: DEFAULT_SITE.to_string(),
        }
    }

    /// Use `site` for readings and seed requests that do not name one.
    pub fn with_default_site(mut self, site: impl Into<String>) -> Self {
        let site = site.into();
        if !site.is_empty() {
            self.default_site = site;
        }
        self
    }

    pub fn default_site(&self) -> &str {
        &self.default_site
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Turn an incoming reading into a stored record plus optional alert.
    pub fn prepare(&self, input: ReadingIn, now: DateTime<Utc>) -> (Reading, Option<NewAlert>) {
        let classification = self.classifier.classify(input.pm25);
        let site = input
            .site
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.default_site.clone());

        let reading = Reading {
            ts: input.ts.unwrap_or(now),
            pm25: input.pm25,
            co2: input.co2,
            temp: input.temp,
            rh: input.rh,
            pm25_index: classification.index,
            pm25_category: classification.category,
            site,
            source: input.source,
        };
        let alert = alert_for(&reading);
        (reading, alert)
    }

    /// Classify and persist one reading, appending an alert when it is Poor
    /// or worse.
    pub async fn ingest(&self, input: ReadingIn) -> Result<IngestOutcome, StoreError> {
        let (reading, alert) = self.prepare(input, Utc::now());
        let outcome = IngestOutcome {
            inserted: reading.ts,
            pm25_index: reading.pm25_index,
            pm25_category: reading.pm25_category,
        };

        if let Some(ref alert) = alert {
            tracing::warn!(site = %alert.site, severity = %alert.severity, "{}", alert.message);
        }
        self.store.record_ingest(reading, alert).await?;

        tracing::debug!(
            ts = %outcome.inserted,
            index = ?outcome.pm25_index,
            "Reading ingested"
        );
        Ok(outcome)
    }

    /// Minutes per category over `window`, optionally for one site.
    pub async fn exposure(
        &self,
        window: &ExposureWindow,
        site: Option<String>,
    ) -> Result<ExposureReport, StoreError> {
        let samples = self.store.category_series(site).await?;
        let totals = aggregate_exposure(&samples, window.duration());

        Ok(ExposureReport {
            window: window.label().to_string(),
            totals,
        })
    }

    /// Measurement statistics over `window`, optionally for one site.
    pub async fn stats(
        &self,
        window: &ExposureWindow,
        site: Option<String>,
    ) -> Result<StatsReport, StoreError> {
        let readings = self
            .store
            .readings(ReadingQuery {
                limit: STATS_ROW_LIMIT,
                site,
                window: Some(window.duration()),
            })
            .await?;
        Ok(summarize(window.label(), &readings))
    }

    /// Generate the readings for a seed request ending at `now`.
    ///
    /// Readings are spaced `period_seconds` apart, the newest one period
    /// before `now`, and walk through the six bands in equal blocks.
    pub fn seed_batch<R: Rng>(
        &self,
        request: &SeedRequest,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Vec<(Reading, Option<NewAlert>)>, IngestError> {
        if request.period_seconds == 0 {
            return Err(IngestError::InvalidRequest(
                "period_seconds must be positive".to_string(),
            ));
        }

        let count = u64::from(request.hours) * 3600 / u64::from(request.period_seconds);
        if count > MAX_SEED_READINGS {
            return Err(IngestError::InvalidRequest(format!(
                "seed would generate {count} readings (limit {MAX_SEED_READINGS})"
            )));
        }
        let n = count as usize;
        let period = i64::from(request.period_seconds);
        let ambient = seed_ambient();

        let batch = (0..n)
            .map(|i| {
                let ts = now - Duration::seconds((n - i) as i64 * period);
                let s = sample(rng, seed_band(i, n), &ambient);
                self.prepare(
                    ReadingIn {
                        ts: Some(ts),
                        pm25: Some(s.pm25),
                        co2: Some(s.co2),
                        temp: Some(s.temp),
                        rh: Some(s.rh),
                        site: request.site.clone(),
                        source: Some(SEED_SOURCE.to_string()),
                    },
                    now,
                )
            })
            .collect();
        Ok(batch)
    }

    /// Site a seed request targets.
    pub fn seed_site(&self, request: &SeedRequest) -> String {
        request
            .site
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.default_site.clone())
    }

    /// Backfill synthetic history ending now.
    pub async fn seed(&self, request: SeedRequest) -> Result<SeedOutcome, IngestError> {
        let site = self.seed_site(&request);
        let batch = {
            let mut rng = StdRng::from_entropy();
            self.seed_batch(&request, Utc::now(), &mut rng)?
        };
        let seeded = batch.len();
        self.store.record_batch(batch).await?;

        tracing::info!(site = %site, seeded, "Seeded synthetic readings");
        Ok(SeedOutcome {
            seeded,
            site,
            period_seconds: request.period_seconds,
        })
    }
}
