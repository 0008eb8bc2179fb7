use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{validate_jwt, Claims};
use crate::error::ApiError;
use crate::security::Identity;
use crate::AppState;

/// Authenticated user context extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub is_admin: bool,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            is_admin: claims.is_admin,
        }
    }
}

/// Resolves the request [`Identity`] from an optional Bearer token.
///
/// Requests without an `Authorization` header continue anonymously; a header
/// carrying a malformed or invalid token is rejected with 401.
pub async fn authentication_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match extract_jwt_from_headers(&headers) {
        Ok(None) => Identity::anonymous(),
        Ok(Some(token)) => match validate_jwt(&token, &state.config.security.jwt_secret) {
            Ok(claims) => Identity::authenticated(AuthUser::from(claims)),
            Err(e) => {
                tracing::debug!("Rejected token: {}", e);
                return ApiError::unauthorized(e.to_string()).into_response();
            }
        },
        Err(msg) => return ApiError::unauthorized(msg).into_response(),
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<Option<String>, String> {
    let Some(auth_header) = headers.get("authorization") else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(Some(token.trim().to_string()))
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
