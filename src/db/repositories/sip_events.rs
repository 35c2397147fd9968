use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row, ToSql};

use crate::db::{
    connection::Database,
    helpers::{format_timestamp, parse_datetime, parse_json, parse_source},
    models::{sip_event::validate_sip_volume, SipEvent},
};

const EVENT_COLUMNS: &str =
    "id, timestamp, profile_id, ml_estimate, source, confidence, detection_data";

/// Optional bounds for sip event queries. Both ends are inclusive.
#[derive(Debug, Clone, Default)]
pub struct SipEventFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub profile_id: Option<i64>,
    pub limit: Option<u32>,
}

impl SipEventFilter {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::default()
        }
    }
}

fn row_to_sip_event(row: &Row) -> Result<SipEvent> {
    let timestamp: String = row.get("timestamp")?;
    let source: String = row.get("source")?;

    Ok(SipEvent {
        id: Some(row.get("id")?),
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        profile_id: row.get("profile_id")?,
        ml_estimate: row.get("ml_estimate")?,
        source: parse_source(&source)?,
        confidence: row.get("confidence")?,
        detection_data: parse_json(row.get("detection_data")?, "detection_data")?,
    })
}

/// Matching events, newest first.
pub(crate) fn select_sip_events(conn: &Connection, filter: &SipEventFilter) -> Result<Vec<SipEvent>> {
    let mut conditions = Vec::new();
    let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(start) = &filter.start {
        conditions.push("timestamp >= ?");
        params_vec.push(Box::new(format_timestamp(start)));
    }
    if let Some(end) = &filter.end {
        conditions.push("timestamp <= ?");
        params_vec.push(Box::new(format_timestamp(end)));
    }
    if let Some(profile_id) = filter.profile_id {
        conditions.push("profile_id = ?");
        params_vec.push(Box::new(profile_id));
    }

    let mut query = format!("SELECT {EVENT_COLUMNS} FROM sip_events");
    if !conditions.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&conditions.join(" AND "));
    }
    query.push_str(" ORDER BY timestamp DESC, id DESC");
    if let Some(limit) = filter.limit {
        query.push_str(" LIMIT ?");
        params_vec.push(Box::new(limit));
    }

    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&query)?;
    let mut rows = stmt.query(params_refs.as_slice())?;
    let mut events = Vec::new();
    while let Some(row) = rows.next()? {
        events.push(row_to_sip_event(row)?);
    }
    Ok(events)
}

pub(crate) fn sum_sip_ml(conn: &Connection, start: &DateTime<Utc>, end: &DateTime<Utc>) -> Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(ml_estimate), 0.0) FROM sip_events WHERE timestamp >= ?1 AND timestamp <= ?2",
        params![format_timestamp(start), format_timestamp(end)],
        |row| row.get(0),
    )?;
    Ok(total)
}

impl Database {
    /// Persists an event and returns the id the store assigned.
    pub async fn insert_sip_event(&self, event: &SipEvent) -> Result<i64> {
        validate_sip_volume(event.ml_estimate)?;
        let record = event.clone();
        self.execute(move |conn| {
            let detection_data = record
                .detection_data
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("failed to serialize detection data")?;

            conn.execute(
                "INSERT INTO sip_events (timestamp, profile_id, ml_estimate, source, confidence, detection_data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    format_timestamp(&record.timestamp),
                    record.profile_id,
                    record.ml_estimate,
                    record.source.as_str(),
                    record.confidence,
                    detection_data,
                ],
            )
            .with_context(|| "failed to insert sip event")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn get_sip_events(&self, filter: SipEventFilter) -> Result<Vec<SipEvent>> {
        self.execute(move |conn| select_sip_events(conn, &filter))
            .await
    }
}
