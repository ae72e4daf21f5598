use axum::Json;
use axum::http::StatusCode;
use bosun_core::error::{
    AnalysisError, BosunError, EmbedError, EventError, KnowledgeError, ModelError, TelemetryError,
    ToolError,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: &'static str,
    pub message: String,
    pub correlation_id: Option<String>,
}

type Mapped = (StatusCode, &'static str, String);

pub fn map_error(
    err: &BosunError,
    correlation_id: Option<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    let (status, code, message) = match err {
        BosunError::Event(event) => map_event_error(event),
        BosunError::Telemetry(telemetry) => map_telemetry_error(telemetry),
        BosunError::Analysis(analysis) => map_analysis_error(analysis),
        BosunError::Knowledge(knowledge) => map_knowledge_error(knowledge),
        BosunError::Embed(embed) => map_embed_error(embed),
        BosunError::Model(model) => map_model_error(model),
        BosunError::Tool(tool) => map_tool_error(tool),
        BosunError::Config(config) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "config_error",
            config.to_string(),
        ),
        BosunError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            message.clone(),
        ),
    };
    envelope(status, code, message, correlation_id)
}

/// Request-shape failures caught before reaching the domain.
pub fn invalid_input(
    message: impl Into<String>,
    correlation_id: Option<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    envelope(
        StatusCode::BAD_REQUEST,
        "invalid_input",
        message.into(),
        correlation_id,
    )
}

pub fn tool_error(
    err: &ToolError,
    correlation_id: Option<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    let (status, code, message) = map_tool_error(err);
    envelope(status, code, message, correlation_id)
}

fn envelope(
    status: StatusCode,
    code: &'static str,
    message: String,
    correlation_id: Option<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    (
        status,
        Json(ErrorEnvelope {
            code,
            message,
            correlation_id,
        }),
    )
}

fn map_event_error(err: &EventError) -> Mapped {
    match err {
        EventError::NotFound => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
        EventError::InvalidInput { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_input", err.to_string())
        }
        EventError::Storage { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            err.to_string(),
        ),
    }
}

fn map_telemetry_error(err: &TelemetryError) -> Mapped {
    match err {
        TelemetryError::InvalidInput { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_input", err.to_string())
        }
        TelemetryError::Storage { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            err.to_string(),
        ),
    }
}

fn map_analysis_error(err: &AnalysisError) -> Mapped {
    match err {
        AnalysisError::NotFound => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
        AnalysisError::Conflict { .. } => (StatusCode::CONFLICT, "conflict", err.to_string()),
        AnalysisError::Internal { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            err.to_string(),
        ),
    }
}

fn map_knowledge_error(err: &KnowledgeError) -> Mapped {
    match err {
        KnowledgeError::Unavailable { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            "knowledge_unavailable",
            err.to_string(),
        ),
        KnowledgeError::EmbeddingMismatch { .. } => {
            (StatusCode::CONFLICT, "embedding_mismatch", err.to_string())
        }
        KnowledgeError::InvalidInput { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_input", err.to_string())
        }
    }
}

fn map_embed_error(err: &EmbedError) -> Mapped {
    match err {
        EmbedError::Unavailable { .. } | EmbedError::InvalidResponse { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            "embedder_unavailable",
            err.to_string(),
        ),
        EmbedError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout", err.to_string()),
    }
}

fn map_model_error(err: &ModelError) -> Mapped {
    match err {
        ModelError::Unavailable { .. } | ModelError::Server { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            "model_unavailable",
            err.to_string(),
        ),
        ModelError::RateLimited { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            "rate_limited",
            err.to_string(),
        ),
        ModelError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout", err.to_string()),
        ModelError::InvalidResponse { .. } => (
            StatusCode::BAD_GATEWAY,
            "invalid_model_response",
            err.to_string(),
        ),
    }
}

fn map_tool_error(err: &ToolError) -> Mapped {
    let status = match err {
        ToolError::UnknownTool { .. } => StatusCode::NOT_FOUND,
        ToolError::InvalidArguments { .. } => StatusCode::BAD_REQUEST,
        ToolError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ToolError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ToolError::Execution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.code(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (BosunError::from(EventError::NotFound), StatusCode::NOT_FOUND),
            (
                BosunError::from(AnalysisError::Conflict {
                    message: "pending".to_string(),
                }),
                StatusCode::CONFLICT,
            ),
            (
                BosunError::from(ModelError::Timeout {
                    after: Duration::from_secs(1),
                }),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                BosunError::from(KnowledgeError::EmbeddingMismatch {
                    stored: "a/3".to_string(),
                    given: "b/4".to_string(),
                }),
                StatusCode::CONFLICT,
            ),
            (BosunError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let (status, _) = map_error(&err, None);
            assert_eq!(status, expected, "{err}");
        }
    }

    #[test]
    fn envelope_carries_code_and_correlation() {
        let err = ToolError::UnknownTool {
            name: "get_weather".to_string(),
        };
        let (status, Json(body)) = tool_error(&err, Some("corr_1".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "unknown_tool");
        assert_eq!(body.correlation_id.as_deref(), Some("corr_1"));
    }
}
