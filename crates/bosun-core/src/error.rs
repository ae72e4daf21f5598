use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("event storage failed: {message}")]
    Storage { message: String },
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("telemetry storage failed: {message}")]
    Storage { message: String },
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis not found")]
    NotFound,
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("knowledge store unavailable: {message}")]
    Unavailable { message: String },
    #[error("embedding mismatch: store holds {stored}, got {given}")]
    EmbeddingMismatch { stored: String, given: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedder unavailable: {message}")]
    Unavailable { message: String },
    #[error("embedding timed out after {after:?}")]
    Timeout { after: Duration },
    #[error("invalid embedding response: {message}")]
    InvalidResponse { message: String },
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model unavailable: {message}")]
    Unavailable { message: String },
    #[error("model timed out after {after:?}")]
    Timeout { after: Duration },
    #[error("model rate limited: {message}")]
    RateLimited { message: String },
    #[error("model server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("invalid model response: {message}")]
    InvalidResponse { message: String },
}

impl ModelError {
    /// Transient failures worth a delayed retry by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Server { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("invalid arguments for {name}: {message}")]
    InvalidArguments { name: String, message: String },
    #[error("tool {name} timed out after {after:?}")]
    Timeout { name: String, after: Duration },
    #[error("tool service unavailable: {message}")]
    Unavailable { message: String },
    #[error("tool {name} failed: {message}")]
    Execution { name: String, message: String },
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownTool { .. } => "unknown_tool",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::Timeout { .. } => "timeout",
            Self::Unavailable { .. } => "unavailable",
            Self::Execution { .. } => "execution_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    Read { path: String, message: String },
    #[error("failed to parse config: {message}")]
    Parse { message: String },
    #[error("invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Error)]
pub enum BosunError {
    #[error(transparent)]
    Event(#[from] EventError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
    #[error(transparent)]
    Embed(#[from] EmbedError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl BosunError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal {
            message: err.to_string(),
        }
    }
}
