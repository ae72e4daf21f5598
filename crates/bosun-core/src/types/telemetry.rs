use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TelemetryReading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NewReading {
    pub timestamp: DateTime<Utc>,
    pub vessel_id: String,
    pub sensor_name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TelemetryWindow {
    pub vessel_id: String,
    pub sensor_name: String,
    pub minutes_back: u32,
    pub readings: Vec<TelemetryReading>,
}
