use crate::util::{from_rfc3339, to_rfc3339};
use bosun_core::error::TelemetryError;
use bosun_core::telemetry::TelemetryRepository;
use bosun_core::types::{NewReading, TelemetryReading};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

pub struct TelemetryRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> TelemetryRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl<'a> TelemetryRepository for TelemetryRepo<'a> {
    fn record(&self, reading: &NewReading) -> Result<(), TelemetryError> {
        if !reading.value.is_finite() {
            return Err(TelemetryError::InvalidInput {
                message: format!("reading value must be finite, got {}", reading.value),
            });
        }
        self.conn
            .execute(
                "INSERT INTO telemetry (timestamp, vessel_id, sensor_name, value) VALUES (?1, ?2, ?3, ?4)",
                (
                    to_rfc3339(&reading.timestamp),
                    reading.vessel_id.as_str(),
                    reading.sensor_name.as_str(),
                    reading.value,
                ),
            )
            .map_err(storage)?;
        Ok(())
    }

    fn window(
        &self,
        vessel_id: &str,
        sensor_name: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TelemetryReading>, TelemetryError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT timestamp, value FROM telemetry WHERE vessel_id = ?1 AND sensor_name = ?2 AND timestamp >= ?3 ORDER BY timestamp DESC, id DESC",
            )
            .map_err(storage)?;
        let mut rows = stmt
            .query((vessel_id, sensor_name, to_rfc3339(&since)))
            .map_err(storage)?;
        let mut readings = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            let timestamp: String = row.get(0).map_err(storage)?;
            readings.push(TelemetryReading {
                timestamp: from_rfc3339(&timestamp).map_err(storage)?,
                value: row.get(1).map_err(storage)?,
            });
        }
        Ok(readings)
    }
}

fn storage(err: impl std::fmt::Display) -> TelemetryError {
    TelemetryError::Storage {
        message: err.to_string(),
    }
}
