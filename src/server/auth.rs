use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

/// Header set by the authenticating proxy in front of this service.
///
/// Token validation happens upstream; by the time a request reaches this
/// core it carries the resolved user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor that requires an upstream-resolved user id.
pub struct RequireUser {
    pub user_id: i64,
}

#[derive(Debug)]
pub enum AuthError {
    MissingUser,
    InvalidUser,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingUser => "Authentication required",
            AuthError::InvalidUser => "Invalid user identity",
        };
        (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "data": null, "error": message })),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(AuthError::MissingUser)?;

        let user_id: i64 = header
            .to_str()
            .map_err(|_| AuthError::InvalidUser)?
            .parse()
            .map_err(|_| AuthError::InvalidUser)?;

        if user_id <= 0 {
            return Err(AuthError::InvalidUser);
        }

        Ok(RequireUser { user_id })
    }
}
