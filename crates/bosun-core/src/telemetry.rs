use crate::error::TelemetryError;
use crate::types::{NewReading, TelemetryReading};
use chrono::{DateTime, Utc};

pub trait TelemetryRepository {
    fn record(&self, reading: &NewReading) -> Result<(), TelemetryError>;
    /// Readings at or after `since`, newest first.
    fn window(
        &self,
        vessel_id: &str,
        sensor_name: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TelemetryReading>, TelemetryError>;
}
