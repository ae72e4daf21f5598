use bosun_core::error::ModelError;
use std::time::Duration;

/// Maps a non-success HTTP status from the model server onto [`ModelError`].
pub fn parse_http_error(status: u16, body: &str) -> ModelError {
    let body = body.trim();
    match status {
        429 => ModelError::RateLimited {
            message: body.to_string(),
        },
        404 => ModelError::Unavailable {
            message: format!("model not found: {body}"),
        },
        500..=599 => ModelError::Server {
            status,
            message: body.to_string(),
        },
        _ => ModelError::InvalidResponse {
            message: format!("HTTP {status}: {body}"),
        },
    }
}

pub fn transport_error(err: &reqwest::Error, timeout: Duration) -> ModelError {
    if err.is_timeout() {
        ModelError::Timeout { after: timeout }
    } else {
        ModelError::Unavailable {
            message: err.to_string(),
        }
    }
}

pub fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_retry_classes() {
        assert!(matches!(parse_http_error(429, "busy"), ModelError::RateLimited { .. }));
        assert!(parse_http_error(429, "busy").is_retryable());
        assert!(matches!(
            parse_http_error(503, "loading"),
            ModelError::Server { status: 503, .. }
        ));
        assert!(!parse_http_error(404, "no such model").is_retryable());
        assert!(matches!(
            parse_http_error(400, "bad"),
            ModelError::InvalidResponse { .. }
        ));
    }

    #[test]
    fn urls_join_without_double_slashes() {
        assert_eq!(
            join_url("http://localhost:11434/", "/api/chat"),
            "http://localhost:11434/api/chat"
        );
    }
}
