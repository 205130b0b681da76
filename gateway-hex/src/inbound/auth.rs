//! Caller identity extraction.
//!
//! Authentication happens upstream of this service; the authenticated
//! user's id arrives in the `X-User-Id` header.

use axum::{extract::FromRequestParts, http::request::Parts};

use gateway_types::{AppError, UserId};

use super::handlers::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The user on whose behalf a request is made.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub UserId);

fn parse_user_id(header: Option<&str>) -> Result<UserId, AppError> {
    let raw = header
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing X-User-Id header".into()))?;
    raw.parse()
        .map_err(|_| AppError::BadRequest("X-User-Id must be a UUID".into()))
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok());
        Ok(Caller(parse_user_id(header)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_id() {
        let id = UserId::new();
        assert_eq!(parse_user_id(Some(&id.to_string())).unwrap(), id);
        assert_eq!(
            parse_user_id(Some(&format!("  {}  ", id))).unwrap(),
            id
        );
    }

    #[test]
    fn test_parse_user_id_missing() {
        assert!(matches!(parse_user_id(None), Err(AppError::Unauthorized(_))));
        assert!(matches!(parse_user_id(Some("  ")), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_parse_user_id_malformed() {
        assert!(matches!(
            parse_user_id(Some("user-42")),
            Err(AppError::BadRequest(_))
        ));
    }
}
