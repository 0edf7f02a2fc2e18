use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Correlation id of the current request, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

/// Middleware to generate and propagate correlation IDs
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = get_or_generate_correlation_id(request.headers());

    request
        .extensions_mut()
        .insert(CorrelationId(correlation_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(&correlation_id) {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value.clone());
        response.headers_mut().insert("x-request-id", header_value);
    }

    response
}

/// Get existing correlation ID from headers or generate a new one
fn get_or_generate_correlation_id(headers: &HeaderMap) -> String {
    let correlation_id = headers
        .get("x-correlation-id")
        .or_else(|| headers.get("x-request-id"))
        .and_then(|header| header.to_str().ok())
        .filter(|id| is_valid_correlation_id(id));

    match correlation_id {
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    }
}

/// UUIDs, or 8 to 64 characters of alphanumerics, hyphens and underscores
fn is_valid_correlation_id(id: &str) -> bool {
    if Uuid::parse_str(id).is_ok() {
        return true;
    }

    (8..=64).contains(&id.len()) && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_correlation_id() {
        assert!(is_valid_correlation_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_valid_correlation_id("abc123-def456"));
        assert!(is_valid_correlation_id("request_12345"));
    }

    #[test]
    fn test_invalid_correlation_id() {
        assert!(!is_valid_correlation_id(""));
        assert!(!is_valid_correlation_id("short"));
        assert!(!is_valid_correlation_id("a".repeat(65).as_str()));
        assert!(!is_valid_correlation_id("invalid@id-value"));
        assert!(!is_valid_correlation_id("invalid id value"));
    }

    #[test]
    fn test_existing_id_is_reused() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", "panel-req-0042".parse().unwrap());

        assert_eq!(get_or_generate_correlation_id(&headers), "panel-req-0042");
    }

    #[test]
    fn test_invalid_id_is_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert("x-correlation-id", "bad id".parse().unwrap());

        let id = get_or_generate_correlation_id(&headers);
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
