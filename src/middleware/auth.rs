use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use loco_rs::prelude::*;

use crate::services::config_service::ConfigService;

/// Shared-secret guard for the control plane (§6.1). Every `/api/indexer/*`
/// route requires `Authorization: Bearer <key>` or `X-API-Key: <key>` to
/// match `INDEXER_API_KEY`.
pub async fn api_key_middleware(request: Request, next: Next) -> Result<Response> {
    let expected = ConfigService::control_plane_api_key();
    let presented = extract_api_key(request.headers())
        .ok_or_else(|| Error::Unauthorized("missing API key".to_string()))?;

    if presented != expected {
        return Err(Error::Unauthorized("invalid API key".to_string()));
    }

    Ok(next.run(request).await)
}

fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-api-key") {
        return value.to_str().ok().map(str::to_string);
    }

    let auth_header = headers.get(header::AUTHORIZATION)?;
    let auth_str = auth_header.to_str().ok()?;
    auth_str.strip_prefix("Bearer ").map(str::to_string)
}

/// Security headers middleware, carried over unchanged from the ambient
/// hardening layer.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());
    headers.insert("X-XSS-Protection", "1; mode=block".parse().unwrap());
    headers.insert(
        "Referrer-Policy",
        "strict-origin-when-cross-origin".parse().unwrap(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_from_x_api_key_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("secret123"));
        assert_eq!(extract_api_key(&headers), Some("secret123".to_string()));
    }

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret123"));
        assert_eq!(extract_api_key(&headers), Some("secret123".to_string()));
    }

    #[test]
    fn missing_header_yields_none() {
        let headers = HeaderMap::new();
        assert_eq!(extract_api_key(&headers), None);
    }
}
