use crate::core::Severity;
use crate::store::models::{AlertEvent, NewAlert};
use crate::store::{format_ts, parse_ts, Store, StoreError};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

pub(crate) fn insert_alert(conn: &Connection, alert: &NewAlert) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO events (ts, site, type, severity, message) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            format_ts(&alert.ts),
            alert.site,
            alert.kind,
            alert.severity.as_str(),
            alert.message,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<AlertEvent> {
    let ts: String = row.get(1)?;
    let severity: String = row.get(4)?;
    let acknowledged: i64 = row.get(6)?;

    Ok(AlertEvent {
        id: row.get(0)?,
        ts: parse_ts(&ts)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
        site: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        kind: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        severity: Severity::from_str_opt(&severity).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Text,
                format!("unknown severity '{severity}'").into(),
            )
        })?,
        message: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        acknowledged: acknowledged != 0,
    })
}

impl Store {
    /// Append an alert record, returning its id.
    pub async fn append_alert(&self, alert: NewAlert) -> Result<i64, StoreError> {
        self.execute(move |conn| insert_alert(conn, &alert)).await
    }

    /// Newest events first, optionally for one site.
    pub async fn events(
        &self,
        limit: usize,
        site: Option<String>,
    ) -> Result<Vec<AlertEvent>, StoreError> {
        self.execute(move |conn| {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let mut stmt = conn.prepare(
                "SELECT id, ts, site, type, severity, message, acknowledged FROM events
                 WHERE (?1 IS NULL OR site = ?1)
                 ORDER BY ts DESC, id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![site, limit], event_from_row)?;

            let mut events = Vec::new();
            for event in rows {
                events.push(event?);
            }
            Ok(events)
        })
        .await
    }

    /// Mark an event acknowledged. Returns false if no such event exists.
    pub async fn acknowledge_event(&self, event_id: i64) -> Result<bool, StoreError> {
        self.execute(move |conn| {
            let updated = conn.execute(
                "UPDATE events SET acknowledged = 1 WHERE id = ?1",
                params![event_id],
            )?;
            Ok(updated > 0)
        })
        .await
    }
}
