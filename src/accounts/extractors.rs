use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use base64ct::{Base64, Encoding};
use tracing::{error, warn};

use super::repo_types::User;
use crate::state::AppState;

/// Active staff account authenticated with HTTP Basic credentials.
pub struct StaffUser(pub User);

/// Splits a `Basic <base64(email:password)>` header value.
pub(crate) fn parse_basic(header: &str) -> Option<(String, String)> {
    let encoded = header
        .strip_prefix("Basic ")
        .or_else(|| header.strip_prefix("basic "))?;
    let decoded = Base64::decode_vec(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (email, password) = decoded.split_once(':')?;
    Some((email.to_string(), password.to_string()))
}

#[async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing Authorization header".to_string()))?;

        let (email, password) = parse_basic(header)
            .ok_or((StatusCode::UNAUTHORIZED, "invalid auth scheme".to_string()))?;

        let user = match state.users.authenticate(&email, &password).await {
            Ok(Some(u)) => u,
            Ok(None) => {
                warn!("admin credentials rejected");
                return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
            }
            Err(e) => {
                error!(error = %e, "authenticate failed");
                return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
            }
        };

        if !user.is_staff() {
            warn!(user_id = %user.id, "non-staff account on admin route");
            return Err((StatusCode::FORBIDDEN, "Staff account required".into()));
        }

        Ok(StaffUser(user))
    }
}
