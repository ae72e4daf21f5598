pub mod analysis;
pub mod enums;
pub mod event;
pub mod ids;
pub mod knowledge;
pub mod telemetry;
pub mod tool;

pub use analysis::{Analysis, AnalysisOutcome, AnalysisSummary};
pub use enums::{AnalysisStatus, ModelProvider};
pub use event::{Acknowledgement, Event, EventFilter, NewEvent};
pub use ids::{AnalysisId, EventId, IdError};
pub use knowledge::{EmbeddingSpec, KnowledgeChunk, RetrievedDocument, SearchHit};
pub use telemetry::{NewReading, TelemetryReading, TelemetryWindow};
pub use tool::{ToolCall, ToolResult, ToolSpec};
