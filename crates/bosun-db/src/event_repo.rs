use crate::util::{from_rfc3339, to_rfc3339};
use bosun_core::error::EventError;
use bosun_core::events::EventRepository;
use bosun_core::types::{Acknowledgement, Event, EventFilter, EventId, NewEvent};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

const EVENT_COLUMNS: &str = "id, timestamp, vessel_id, sensor_name, event_type, severity, details, acknowledged, acknowledged_by, acknowledged_at";

pub struct EventRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> EventRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl<'a> EventRepository for EventRepo<'a> {
    fn get(&self, id: EventId) -> Result<Option<Event>, EventError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let mut rows = stmt.query([id.get()]).map_err(storage)?;
        match rows.next().map_err(storage)? {
            Some(row) => Ok(Some(map_event_row(row)?)),
            None => Ok(None),
        }
    }

    fn list(&self, filter: &EventFilter) -> Result<Vec<Event>, EventError> {
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM events");
        let mut clauses = Vec::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(vessel_id) = &filter.vessel_id {
            params.push(Value::Text(vessel_id.clone()));
            clauses.push(format!("vessel_id = ?{}", params.len()));
        }
        if let Some(acknowledged) = filter.acknowledged {
            params.push(Value::Integer(i64::from(acknowledged)));
            clauses.push(format!("acknowledged = ?{}", params.len()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC");
        if filter.limit > 0 {
            let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);
            params.push(Value::Integer(limit));
            sql.push_str(&format!(" LIMIT ?{}", params.len()));
        }

        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let mut rows = stmt.query(params_from_iter(params)).map_err(storage)?;
        let mut events = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            events.push(map_event_row(row)?);
        }
        Ok(events)
    }

    fn insert(&self, event: &NewEvent) -> Result<Event, EventError> {
        for (field, value) in [
            ("vessel_id", &event.vessel_id),
            ("sensor_name", &event.sensor_name),
            ("event_type", &event.event_type),
            ("severity", &event.severity),
        ] {
            if value.trim().is_empty() {
                return Err(EventError::InvalidInput {
                    message: format!("{field} must not be empty"),
                });
            }
        }
        let sql = "INSERT INTO events (timestamp, vessel_id, sensor_name, event_type, severity, details) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
        let params = (
            to_rfc3339(&event.timestamp),
            event.vessel_id.as_str(),
            event.sensor_name.as_str(),
            event.event_type.as_str(),
            event.severity.as_str(),
            event.details.as_deref(),
        );
        self.conn.execute(sql, params).map_err(storage)?;
        let id = EventId::new(self.conn.last_insert_rowid()).map_err(storage)?;
        self.get(id)?.ok_or(EventError::NotFound)
    }

    fn acknowledge(
        &self,
        id: EventId,
        operator: &str,
        at: DateTime<Utc>,
    ) -> Result<Acknowledgement, EventError> {
        let operator = operator.trim();
        if operator.is_empty() {
            return Err(EventError::InvalidInput {
                message: "operator must not be empty".to_string(),
            });
        }
        let changed = self
            .conn
            .execute(
                "UPDATE events SET acknowledged = 1, acknowledged_by = ?2, acknowledged_at = ?3 WHERE id = ?1 AND acknowledged = 0",
                (id.get(), operator, to_rfc3339(&at)),
            )
            .map_err(storage)?;
        let event = self.get(id)?.ok_or(EventError::NotFound)?;
        Ok(Acknowledgement {
            event,
            changed: changed > 0,
        })
    }
}

fn storage(err: impl std::fmt::Display) -> EventError {
    EventError::Storage {
        message: err.to_string(),
    }
}

fn map_event_row(row: &rusqlite::Row<'_>) -> Result<Event, EventError> {
    let id: i64 = row.get(0).map_err(storage)?;
    let timestamp: String = row.get(1).map_err(storage)?;
    let acknowledged: i64 = row.get(7).map_err(storage)?;
    let acknowledged_at: Option<String> = row.get(9).map_err(storage)?;
    Ok(Event {
        id: EventId::new(id).map_err(storage)?,
        timestamp: from_rfc3339(&timestamp).map_err(storage)?,
        vessel_id: row.get(2).map_err(storage)?,
        sensor_name: row.get(3).map_err(storage)?,
        event_type: row.get(4).map_err(storage)?,
        severity: row.get(5).map_err(storage)?,
        details: row.get(6).map_err(storage)?,
        acknowledged: acknowledged != 0,
        acknowledged_by: row.get(8).map_err(storage)?,
        acknowledged_at: acknowledged_at
            .as_deref()
            .map(from_rfc3339)
            .transpose()
            .map_err(storage)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use chrono::{Duration, TimeZone};

    fn new_event(vessel: &str, minutes: i64) -> NewEvent {
        NewEvent {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minutes),
            vessel_id: vessel.to_string(),
            sensor_name: "engine_temp".to_string(),
            event_type: "threshold_breach".to_string(),
            severity: "high".to_string(),
            details: Some("temp 98C".to_string()),
        }
    }

    #[test]
    fn insert_and_get() {
        let conn = with_test_db().unwrap();
        let repo = EventRepo::new(&conn);
        let event = repo.insert(&new_event("V001", 0)).unwrap();
        let loaded = repo.get(event.id).unwrap().unwrap();
        assert_eq!(loaded, event);
        assert!(!loaded.acknowledged);
        assert!(repo.get(EventId::new(999).unwrap()).unwrap().is_none());
    }

    #[test]
    fn rejects_blank_fields() {
        let conn = with_test_db().unwrap();
        let repo = EventRepo::new(&conn);
        let mut event = new_event("V001", 0);
        event.severity = "  ".to_string();
        assert!(matches!(
            repo.insert(&event),
            Err(EventError::InvalidInput { .. })
        ));
    }

    #[test]
    fn list_filters_and_orders_newest_first() {
        let conn = with_test_db().unwrap();
        let repo = EventRepo::new(&conn);
        let first = repo.insert(&new_event("V001", 0)).unwrap();
        let second = repo.insert(&new_event("V002", 5)).unwrap();
        let third = repo.insert(&new_event("V001", 10)).unwrap();
        repo.acknowledge(third.id, "alice", Utc::now()).unwrap();

        let all = repo.list(&EventFilter::default()).unwrap();
        let ids: Vec<EventId> = all.iter().map(|event| event.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let v001_open = repo
            .list(&EventFilter {
                vessel_id: Some("V001".to_string()),
                acknowledged: Some(false),
                limit: 0,
            })
            .unwrap();
        assert_eq!(v001_open.len(), 1);
        assert_eq!(v001_open[0].id, first.id);

        let limited = repo
            .list(&EventFilter {
                limit: 2,
                ..EventFilter::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn acknowledge_is_idempotent() {
        let conn = with_test_db().unwrap();
        let repo = EventRepo::new(&conn);
        let event = repo.insert(&new_event("V001", 0)).unwrap();

        let first = repo.acknowledge(event.id, "alice", Utc::now()).unwrap();
        assert!(first.changed);
        assert_eq!(first.event.acknowledged_by.as_deref(), Some("alice"));

        let second = repo.acknowledge(event.id, "bob", Utc::now()).unwrap();
        assert!(!second.changed);
        assert_eq!(second.event.acknowledged_by.as_deref(), Some("alice"));
    }

    #[test]
    fn acknowledge_missing_event_is_not_found() {
        let conn = with_test_db().unwrap();
        let repo = EventRepo::new(&conn);
        let result = repo.acknowledge(EventId::new(5).unwrap(), "alice", Utc::now());
        assert!(matches!(result, Err(EventError::NotFound)));
    }
}
