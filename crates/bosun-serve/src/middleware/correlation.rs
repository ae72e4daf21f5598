//! Request correlation ids for the bosun API.
//!
//! Every response carries `x-correlation-id`, and error envelopes repeat it so
//! an operator can match a failed analysis request to the server log.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;
use ulid::Ulid;

pub const HEADER_NAME: &str = "x-correlation-id";
/// Prefix of ids minted by the server.
pub const ID_PREFIX: &str = "bosun_";
const MAX_INBOUND_LEN: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(format!("{ID_PREFIX}{}", Ulid::new()))
    }

    /// Keeps a caller's id when it is short printable ASCII without spaces.
    pub fn from_inbound(value: &str) -> Option<Self> {
        let value = value.trim();
        let usable = !value.is_empty()
            && value.len() <= MAX_INBOUND_LEN
            && value.bytes().all(|byte| byte.is_ascii_graphic());
        usable.then(|| Self(value.to_string()))
    }
}

pub async fn correlation_middleware(mut request: Request<Body>, next: Next) -> Response {
    let header = HeaderName::from_static(HEADER_NAME);
    let id = request
        .headers()
        .get(&header)
        .and_then(|value| value.to_str().ok())
        .and_then(CorrelationId::from_inbound)
        .unwrap_or_else(CorrelationId::generate);
    debug!(correlation_id = %id.0, uri = %request.uri(), "request");

    request.extensions_mut().insert(id.clone());
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id.0) {
        response.headers_mut().insert(header, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_the_prefix() {
        let first = CorrelationId::generate();
        let second = CorrelationId::generate();
        assert!(first.0.starts_with(ID_PREFIX));
        assert_eq!(first.0.len(), ID_PREFIX.len() + 26);
        assert_ne!(first, second);
    }

    #[test]
    fn inbound_ids_are_checked() {
        assert_eq!(
            CorrelationId::from_inbound(" bridge-42 "),
            Some(CorrelationId("bridge-42".to_string()))
        );
        assert_eq!(CorrelationId::from_inbound("   "), None);
        assert_eq!(CorrelationId::from_inbound("two words"), None);
        assert_eq!(CorrelationId::from_inbound(&"x".repeat(129)), None);
    }
}
