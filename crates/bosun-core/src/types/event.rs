use crate::types::ids::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A detected anomaly. Written by the detector; only acknowledgement mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub vessel_id: String,
    pub sensor_name: String,
    pub event_type: String,
    pub severity: String,
    pub details: Option<String>,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NewEvent {
    pub timestamp: DateTime<Utc>,
    pub vessel_id: String,
    pub sensor_name: String,
    pub event_type: String,
    pub severity: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub vessel_id: Option<String>,
    pub acknowledged: Option<bool>,
    pub limit: usize,
}

/// Result of an acknowledge request. `changed` is false when the event was
/// already acknowledged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Acknowledgement {
    pub event: Event,
    pub changed: bool,
}
