//! Shared-token authentication for internal endpoints.
//!
//! Provides an `InternalCaller` Axum extractor that validates the
//! `X-Internal-Token` header against the configured token.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use relay_common::error::AppError;

use crate::state::AppState;

pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// Marker for a request that presented the internal token.
///
/// Use as an Axum extractor ahead of the body extractor so rejected requests
/// never reach the handler:
/// ```ignore
/// async fn handler(_caller: InternalCaller, Json(body): Json<Body>) -> impl IntoResponse {}
/// ```
#[derive(Debug, Clone, Copy)]
pub struct InternalCaller;

/// Exact match only. An empty configured token accepts nothing.
pub fn token_matches(presented: Option<&str>, expected: &str) -> bool {
    match presented {
        Some(token) => !expected.is_empty() && token == expected,
        None => false,
    }
}

impl FromRequestParts<AppState> for InternalCaller {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let presented = parts
            .headers
            .get(INTERNAL_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());

        let result = if token_matches(presented, &state.config.internal_notify_token) {
            Ok(InternalCaller)
        } else {
            tracing::warn!(
                token_present = presented.is_some(),
                "Rejected internal request with invalid token"
            );
            Err(AppError::Unauthorized(
                "Missing or invalid X-Internal-Token header".to_string(),
            ))
        };

        std::future::ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_token_accepted() {
        assert!(token_matches(Some("s3cret"), "s3cret"));
    }

    #[test]
    fn test_mismatched_token_rejected() {
        assert!(!token_matches(Some("s3cret "), "s3cret"));
        assert!(!token_matches(Some("S3CRET"), "s3cret"));
        assert!(!token_matches(Some(""), "s3cret"));
    }

    #[test]
    fn test_missing_token_rejected() {
        assert!(!token_matches(None, "s3cret"));
    }

    #[test]
    fn test_empty_configured_token_rejects_everything() {
        assert!(!token_matches(Some(""), ""));
        assert!(!token_matches(Some("anything"), ""));
        assert!(!token_matches(None, ""));
    }
}
