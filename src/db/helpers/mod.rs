use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};

use crate::{db::models::EventSource, detection::EngineKind};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} out of range: {value}"))
}

/// Fixed-width UTC timestamps so that lexical order matches time order.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn format_date(value: &NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).with_context(|| format!("failed to parse {field}"))
}

pub fn format_time(value: &NaiveTime) -> String {
    value.format(TIME_FORMAT).to_string()
}

pub fn parse_time(value: &str, field: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT).with_context(|| format!("failed to parse {field}"))
}

pub fn parse_source(value: &str) -> Result<EventSource> {
    match value {
        "auto" => Ok(EventSource::Auto),
        "manual" => Ok(EventSource::Manual),
        other => Err(anyhow!("unknown sip event source {other}")),
    }
}

pub fn parse_engine(value: &str) -> Result<EngineKind> {
    value.parse::<EngineKind>().map_err(|err| anyhow!(err))
}

pub fn parse_json(value: Option<String>, field: &str) -> Result<Option<serde_json::Value>> {
    value
        .map(|raw| serde_json::from_str(&raw).with_context(|| format!("failed to parse {field}")))
        .transpose()
}
