//! Bearer extraction and authentication middleware.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

/// Authenticated request extension.
#[derive(Clone, Copy, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Extract a bearer token from the Authorization header(s).
///
/// Per RFC 6750, the "Bearer" scheme is case-insensitive. All
/// `authorization` values are scanned until one carries a bearer token;
/// surrounding whitespace is trimmed and an empty token is rejected.
fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    for value in headers.get_all(AUTHORIZATION) {
        let Ok(value) = value.to_str() else { continue };
        let value = value.trim();
        if value.len() >= 7 && value[..7].eq_ignore_ascii_case("bearer ") {
            let token = value[7..].trim();
            if !token.is_empty() {
                return Some(token);
            }
        }
    }
    None
}

/// Authentication middleware.
///
/// A request without a bearer token passes through unauthenticated and is
/// rejected later by `require_auth` on protected handlers; a request with an
/// invalid token fails here.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_from_headers(req.headers()).map(str::to_owned);
    if let Some(token) = token {
        let user_id = state.auth.authenticate(&token)?;
        req.extensions_mut().insert(AuthenticatedUser { user_id });
    }
    Ok(next.run(req).await)
}

/// Require authentication (bearer must have been validated).
pub fn require_auth(req: &Request) -> ApiResult<AuthenticatedUser> {
    req.extensions()
        .get::<AuthenticatedUser>()
        .copied()
        .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(values: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for v in values {
            map.append(AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn extracts_case_insensitive_bearer() {
        assert_eq!(bearer_from_headers(&headers(&["Bearer abc"])), Some("abc"));
        assert_eq!(bearer_from_headers(&headers(&["bEaReR abc"])), Some("abc"));
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(
            bearer_from_headers(&headers(&["  Bearer   abc  "])),
            Some("abc")
        );
    }

    #[test]
    fn rejects_empty_or_non_bearer() {
        assert_eq!(bearer_from_headers(&headers(&["Bearer    "])), None);
        assert_eq!(bearer_from_headers(&headers(&["Basic abc"])), None);
        assert_eq!(bearer_from_headers(&headers(&[])), None);
    }

    #[test]
    fn scans_multiple_values_until_bearer_found() {
        assert_eq!(
            bearer_from_headers(&headers(&["Basic abc", "Bearer tok"])),
            Some("tok")
        );
    }
}
