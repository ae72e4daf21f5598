use crate::util::{decode_json, encode_json, from_rfc3339, to_rfc3339};
use bosun_core::analyses::AnalysisRepository;
use bosun_core::error::AnalysisError;
use bosun_core::types::{
    Analysis, AnalysisId, AnalysisOutcome, AnalysisStatus, AnalysisSummary, EventId,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode};

const ANALYSIS_COLUMNS: &str =
    "id, event_id, timestamp, analysis_text, suggested_actions, confidence, model_used, status";

pub struct AnalysisRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> AnalysisRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_analyses(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Analysis>, AnalysisError> {
        let mut stmt = self.conn.prepare(sql).map_err(internal)?;
        let mut rows = stmt.query(params).map_err(internal)?;
        let mut analyses = Vec::new();
        while let Some(row) = rows.next().map_err(internal)? {
            analyses.push(map_analysis_row(row)?);
        }
        Ok(analyses)
    }
}

impl<'a> AnalysisRepository for AnalysisRepo<'a> {
    fn get(&self, id: AnalysisId) -> Result<Option<Analysis>, AnalysisError> {
        let sql = format!("SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE id = ?1");
        Ok(self.query_analyses(&sql, [id.get()])?.into_iter().next())
    }

    fn latest_for_event(&self, event_id: EventId) -> Result<Option<Analysis>, AnalysisError> {
        let sql = format!(
            "SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE event_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT 1"
        );
        Ok(self
            .query_analyses(&sql, [event_id.get()])?
            .into_iter()
            .next())
    }

    fn list_for_event(&self, event_id: EventId) -> Result<Vec<Analysis>, AnalysisError> {
        let sql = format!(
            "SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE event_id = ?1 ORDER BY timestamp DESC, id DESC"
        );
        self.query_analyses(&sql, [event_id.get()])
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<AnalysisSummary>, AnalysisError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self
            .conn
            .prepare(
                "SELECT a.id, a.timestamp, a.event_id, e.vessel_id, e.event_type, e.sensor_name, \
                 a.analysis_text, a.suggested_actions, a.confidence, a.model_used, a.status \
                 FROM analyses a JOIN events e ON e.id = a.event_id \
                 ORDER BY a.timestamp DESC, a.id DESC LIMIT ?1",
            )
            .map_err(internal)?;
        let mut rows = stmt.query([limit]).map_err(internal)?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next().map_err(internal)? {
            let id: i64 = row.get(0).map_err(internal)?;
            let timestamp: String = row.get(1).map_err(internal)?;
            let event_id: i64 = row.get(2).map_err(internal)?;
            let actions: String = row.get(7).map_err(internal)?;
            let status: String = row.get(10).map_err(internal)?;
            summaries.push(AnalysisSummary {
                id: AnalysisId::new(id).map_err(internal)?,
                timestamp: from_rfc3339(&timestamp).map_err(internal)?,
                event_id: EventId::new(event_id).map_err(internal)?,
                vessel_id: row.get(3).map_err(internal)?,
                event_type: row.get(4).map_err(internal)?,
                sensor_name: row.get(5).map_err(internal)?,
                analysis_text: row.get(6).map_err(internal)?,
                suggested_actions: decode_json(&actions).map_err(internal)?,
                confidence: row.get(8).map_err(internal)?,
                model_used: row.get(9).map_err(internal)?,
                status: parse_status(&status)?,
            });
        }
        Ok(summaries)
    }

    fn insert_pending(
        &self,
        event_id: EventId,
        model_used: &str,
        at: DateTime<Utc>,
    ) -> Result<Analysis, AnalysisError> {
        let sql = "INSERT INTO analyses (event_id, timestamp, analysis_text, suggested_actions, confidence, model_used, status) VALUES (?1, ?2, '', '[]', NULL, ?3, ?4)";
        let params = (
            event_id.get(),
            to_rfc3339(&at),
            model_used,
            AnalysisStatus::Pending.as_str(),
        );
        self.conn.execute(sql, params).map_err(|err| {
            if is_unique_violation(&err) {
                AnalysisError::Conflict {
                    message: format!("event {event_id} already has a pending analysis"),
                }
            } else {
                internal(err)
            }
        })?;
        let id = AnalysisId::new(self.conn.last_insert_rowid()).map_err(internal)?;
        self.get(id)?.ok_or(AnalysisError::NotFound)
    }

    fn finish(
        &self,
        id: AnalysisId,
        outcome: &AnalysisOutcome,
    ) -> Result<Option<Analysis>, AnalysisError> {
        if !outcome.status.is_terminal() {
            return Err(AnalysisError::Internal {
                message: "an analysis can only finish as completed or failed".to_string(),
            });
        }
        if let Some(confidence) = outcome.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(AnalysisError::Internal {
                    message: format!("confidence out of range: {confidence}"),
                });
            }
        }
        let actions = encode_json(&outcome.suggested_actions).map_err(internal)?;
        let changed = self
            .conn
            .execute(
                "UPDATE analyses SET analysis_text = ?2, suggested_actions = ?3, confidence = ?4, status = ?5 WHERE id = ?1 AND status = 'pending'",
                (
                    id.get(),
                    outcome.analysis_text.as_str(),
                    actions,
                    outcome.confidence,
                    outcome.status.as_str(),
                ),
            )
            .map_err(internal)?;
        if changed == 0 {
            return Ok(None);
        }
        self.get(id)
    }
}

fn internal(err: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::Internal {
        message: err.to_string(),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _) if code.code == ErrorCode::ConstraintViolation
            && code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn parse_status(value: &str) -> Result<AnalysisStatus, AnalysisError> {
    AnalysisStatus::parse(value).ok_or_else(|| AnalysisError::Internal {
        message: format!("invalid status: {value}"),
    })
}

fn map_analysis_row(row: &rusqlite::Row<'_>) -> Result<Analysis, AnalysisError> {
    let id: i64 = row.get(0).map_err(internal)?;
    let event_id: i64 = row.get(1).map_err(internal)?;
    let timestamp: String = row.get(2).map_err(internal)?;
    let actions: String = row.get(4).map_err(internal)?;
    let status: String = row.get(7).map_err(internal)?;
    Ok(Analysis {
        id: AnalysisId::new(id).map_err(internal)?,
        event_id: EventId::new(event_id).map_err(internal)?,
        timestamp: from_rfc3339(&timestamp).map_err(internal)?,
        analysis_text: row.get(3).map_err(internal)?,
        suggested_actions: decode_json(&actions).map_err(internal)?,
        confidence: row.get(5).map_err(internal)?,
        model_used: row.get(6).map_err(internal)?,
        status: parse_status(&status)?,
    })
}
