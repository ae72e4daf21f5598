use crate::types::enums::AnalysisStatus;
use crate::types::ids::{AnalysisId, EventId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One analysis attempt for an event. Rows are never deleted; the latest by
/// timestamp is the current analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Analysis {
    pub id: AnalysisId,
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    pub analysis_text: String,
    pub suggested_actions: Vec<String>,
    pub confidence: Option<f64>,
    pub model_used: String,
    pub status: AnalysisStatus,
}

/// Terminal fields written when a pending attempt finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub analysis_text: String,
    pub suggested_actions: Vec<String>,
    pub confidence: Option<f64>,
    pub status: AnalysisStatus,
}

impl AnalysisOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            analysis_text: message.into(),
            suggested_actions: Vec::new(),
            confidence: None,
            status: AnalysisStatus::Failed,
        }
    }
}

/// An analysis joined with the event fields operators scan for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisSummary {
    pub id: AnalysisId,
    pub timestamp: DateTime<Utc>,
    pub event_id: EventId,
    pub vessel_id: String,
    pub event_type: String,
    pub sensor_name: String,
    pub analysis_text: String,
    pub suggested_actions: Vec<String>,
    pub confidence: Option<f64>,
    pub model_used: String,
    pub status: AnalysisStatus,
}
