use crate::error::AnalysisError;
use crate::types::{Analysis, AnalysisId, AnalysisOutcome, AnalysisSummary, EventId};
use chrono::{DateTime, Utc};

/// The Result Store. Rows are appended as `pending` and finished exactly once.
pub trait AnalysisRepository {
    fn get(&self, id: AnalysisId) -> Result<Option<Analysis>, AnalysisError>;
    /// Latest row of any status, ordered by timestamp then id.
    fn latest_for_event(&self, event_id: EventId) -> Result<Option<Analysis>, AnalysisError>;
    fn list_for_event(&self, event_id: EventId) -> Result<Vec<Analysis>, AnalysisError>;
    fn list_recent(&self, limit: usize) -> Result<Vec<AnalysisSummary>, AnalysisError>;
    /// Fails with `Conflict` when the event already has a pending row.
    fn insert_pending(
        &self,
        event_id: EventId,
        model_used: &str,
        at: DateTime<Utc>,
    ) -> Result<Analysis, AnalysisError>;
    /// Returns `None` when the row is no longer pending.
    fn finish(
        &self,
        id: AnalysisId,
        outcome: &AnalysisOutcome,
    ) -> Result<Option<Analysis>, AnalysisError>;
}
