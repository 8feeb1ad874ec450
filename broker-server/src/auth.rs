//! Session-token extraction shared by every authenticated endpoint
//! (spec.md §4.6: "dedicated header or a `Bearer` authorization header").

use axum::http::HeaderMap;

pub const SESSION_TOKEN_HEADER: &str = "x-dynamiq-session-token";

/// Pull the raw token string out of either the dedicated header or a
/// standard `Authorization: Bearer <token>` header, preferring the
/// dedicated header when both are present.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(SESSION_TOKEN_HEADER) {
        return value.to_str().ok().map(str::to_string);
    }

    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_dedicated_header() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_TOKEN_HEADER, HeaderValue::from_static("tok-a"));
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer tok-b"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("tok-a"));
    }

    #[test]
    fn falls_back_to_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer tok-b"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("tok-b"));
    }

    #[test]
    fn missing_both_is_none() {
        assert_eq!(extract_token(&HeaderMap::new()), None);
    }
}
