use crate::core::{Category, CategorySample};
use crate::store::events::insert_alert;
use crate::store::models::{NewAlert, Reading, ReadingQuery, StoreSummary, DEFAULT_SITE};
use crate::store::{format_ts, parse_ts, Store, StoreError};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

const READING_COLUMNS: &str =
    "ts, pm25, co2, temp, rh, pm25_index, pm25_category, site, source";

fn ts_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    let text: String = row.get(idx)?;
    parse_ts(&text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<Reading> {
    let category: Option<String> = row.get(6)?;
    let site: Option<String> = row.get(7)?;
    Ok(Reading {
        ts: ts_from_row(row, 0)?,
        pm25: row.get(1)?,
        co2: row.get(2)?,
        temp: row.get(3)?,
        rh: row.get(4)?,
        pm25_index: row.get(5)?,
        pm25_category: category.as_deref().and_then(Category::from_label),
        site: site.unwrap_or_else(|| DEFAULT_SITE.to_string()),
        source: row.get(8)?,
    })
}

fn insert_reading_row(conn: &Connection, reading: &Reading) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO readings (ts, pm25, co2, temp, rh, pm25_index, pm25_category, site, source)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            format_ts(&reading.ts),
            reading.pm25,
            reading.co2,
            reading.temp,
            reading.rh,
            reading.pm25_index,
            reading.pm25_category.map(|c| c.label()),
            reading.site,
            reading.source,
        ],
    )?;
    Ok(())
}

/// Newest timestamp among readings, optionally for one site.
fn max_ts(conn: &Connection, site: Option<&str>) -> Result<Option<String>, StoreError> {
    let max: Option<String> = conn.query_row(
        "SELECT MAX(ts) FROM readings WHERE (?1 IS NULL OR site = ?1)",
        params![site],
        |row| row.get(0),
    )?;
    Ok(max)
}

impl Store {
    /// Insert a reading, replacing any existing reading with the same timestamp.
    pub async fn insert_reading(&self, reading: Reading) -> Result<(), StoreError> {
        self.execute(move |conn| insert_reading_row(conn, &reading))
            .await
    }

    /// Insert a reading and its alert (if any) in one transaction.
    pub async fn record_ingest(
        &self,
        reading: Reading,
        alert: Option<NewAlert>,
    ) -> Result<(), StoreError> {
        self.record_batch(vec![(reading, alert)]).await
    }

    /// Insert many readings with their alerts in one transaction.
    pub async fn record_batch(
        &self,
        batch: Vec<(Reading, Option<NewAlert>)>,
    ) -> Result<(), StoreError> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            for (reading, alert) in &batch {
                insert_reading_row(&tx, reading)?;
                if let Some(alert) = alert {
                    insert_alert(&tx, alert)?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// All (timestamp, category) pairs, optionally for one site.
    pub async fn category_series(
        &self,
        site: Option<String>,
    ) -> Result<Vec<CategorySample>, StoreError> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT ts, pm25_category FROM readings WHERE (?1 IS NULL OR site = ?1)",
            )?;
            let rows = stmt.query_map(params![site], |row| {
                let category: Option<String> = row.get(1)?;
                Ok(CategorySample::new(
                    ts_from_row(row, 0)?,
                    category.as_deref().and_then(Category::from_label),
                ))
            })?;

            let mut samples = Vec::new();
            for sample in rows {
                samples.push(sample?);
            }
            Ok(samples)
        })
        .await
    }

    /// The newest `query.limit` readings matching the query, oldest first.
    ///
    /// A window is anchored at the newest reading matching the site filter.
    pub async fn readings(&self, query: ReadingQuery) -> Result<Vec<Reading>, StoreError> {
        self.execute(move |conn| {
            let site = query.site.as_deref();
            let start = match query.window {
                Some(window) => match max_ts(conn, site)? {
                    Some(max) => {
                        let now = parse_ts(&max)
                            .map_err(|e| StoreError::InvalidValue(format!("ts '{max}': {e}")))?;
                        Some(format_ts(&(now - window)))
                    }
                    None => None,
                },
                None => None,
            };
            let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

            let mut stmt = conn.prepare(&format!(
                "SELECT {READING_COLUMNS} FROM readings
                 WHERE (?1 IS NULL OR site = ?1) AND (?2 IS NULL OR ts >= ?2)
                 ORDER BY ts DESC LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![site, start, limit], reading_from_row)?;

            let mut readings = Vec::new();
            for reading in rows {
                readings.push(reading?);
            }
            readings.reverse();
            Ok(readings)
        })
        .await
    }

    /// Distinct site labels in alphabetical order.
    pub async fn sites(&self) -> Result<Vec<String>, StoreError> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT site FROM readings WHERE site IS NOT NULL ORDER BY site",
            )?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

            let mut sites = Vec::new();
            for site in rows {
                sites.push(site?);
            }
            Ok(sites)
        })
        .await
    }

    /// Total reading count and newest timestamp.
    pub async fn summary(&self) -> Result<StoreSummary, StoreError> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
            let last = match max_ts(conn, None)? {
                Some(text) => Some(
                    parse_ts(&text)
                        .map_err(|e| StoreError::InvalidValue(format!("ts '{text}': {e}")))?,
                ),
                None => None,
            };
            Ok(StoreSummary {
                last,
                count: u64::try_from(count).unwrap_or(0),
            })
        })
        .await
    }

    /// Delete readings and events, for one site or everything.
    pub async fn reset(&self, site: Option<String>) -> Result<(), StoreError> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            match &site {
                Some(site) => {
                    tx.execute("DELETE FROM readings WHERE site = ?1", params![site])?;
                    tx.execute("DELETE FROM events WHERE site = ?1", params![site])?;
                }
                None => {
                    tx.execute("DELETE FROM readings", [])?;
                    tx.execute("DELETE FROM events", [])?;
                }
            }
            tx.commit()?;
            tracing::info!("Reset store data for {}", site.as_deref().unwrap_or("all sites"));
            Ok(())
        })
        .await
    }
}
