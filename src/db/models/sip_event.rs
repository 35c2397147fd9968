//! Sip events: the durable record of one detected or manually logged sip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

pub const MAX_SIP_ML: f64 = 1000.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Auto,
    Manual,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Auto => "auto",
            EventSource::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SipEvent {
    /// Assigned by the store on insert.
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub profile_id: i64,
    pub ml_estimate: f64,
    pub source: EventSource,
    pub confidence: Option<f64>,
    pub detection_data: Option<Value>,
}

impl SipEvent {
    /// A user-logged sip. Bypasses detection entirely and carries full confidence.
    pub fn manual(
        timestamp: DateTime<Utc>,
        profile_id: i64,
        ml: f64,
    ) -> Result<Self, ValidationError> {
        validate_sip_volume(ml)?;
        Ok(Self {
            id: None,
            timestamp,
            profile_id,
            ml_estimate: ml,
            source: EventSource::Manual,
            confidence: Some(1.0),
            detection_data: Some(serde_json::json!({ "manual": true })),
        })
    }
}

pub fn validate_sip_volume(ml: f64) -> Result<(), ValidationError> {
    if ml.is_finite() && (0.0..=MAX_SIP_ML).contains(&ml) {
        Ok(())
    } else {
        Err(ValidationError::SipVolume(ml))
    }
}
