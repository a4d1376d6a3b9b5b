use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    accounts::{
        dto::{
            CreateUserRequest, CredentialsRequest, PublicUser, SetPasswordRequest,
            SetSuperuserRequest,
        },
        error::AccountError,
        extractors::StaffUser,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/check", post(check_credentials))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(create_user))
        .route("/accounts/superusers", post(create_superuser))
        .route("/accounts/by-email/:email", get(get_by_email))
        .route("/accounts/:id", get(get_user))
        .route("/accounts/:id/password", put(set_password))
        .route("/accounts/:id/deactivate", post(deactivate))
        .route("/accounts/:id/activate", post(activate))
        .route("/accounts/:id/superuser", put(set_superuser))
}

fn reject(e: AccountError) -> (StatusCode, String) {
    let status = e.status();
    if status.is_server_error() {
        error!(error = %e, "account operation failed");
    }
    (status, e.to_string())
}

#[instrument(skip(state, payload))]
pub async fn check_credentials(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    match state.users.authenticate(&payload.email, &payload.password).await {
        Ok(Some(user)) => {
            info!(user_id = %user.id, "credentials accepted");
            Ok(Json(user.into()))
        }
        Ok(None) => {
            warn!("credentials rejected");
            Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()))
        }
        Err(e) => Err(reject(e)),
    }
}

#[instrument(skip(state, staff, payload), fields(staff_id = %staff.0.id))]
pub async fn create_user(
    State(state): State<AppState>,
    staff: StaffUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    let user = state
        .users
        .create_user(
            &payload.email,
            payload.password.as_deref(),
            payload.extra_fields(),
        )
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, staff, payload), fields(staff_id = %staff.0.id))]
pub async fn create_superuser(
    State(state): State<AppState>,
    staff: StaffUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    let user = state
        .users
        .create_superuser(
            &payload.email,
            payload.password.as_deref(),
            payload.extra_fields(),
        )
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, _staff))]
pub async fn get_by_email(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(email): Path<String>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = state.users.get_by_natural_key(&email).await.map_err(reject)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, _staff))]
pub async fn get_user(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = state.users.get(id).await.map_err(reject)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, _staff, payload))]
pub async fn set_password(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .users
        .set_password(id, payload.password.as_deref())
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, _staff))]
pub async fn deactivate(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = state.users.deactivate(id).await.map_err(reject)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, _staff))]
pub async fn activate(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = state.users.activate(id).await.map_err(reject)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, _staff, payload))]
pub async fn set_superuser(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetSuperuserRequest>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = state
        .users
        .set_superuser(id, payload.is_superuser)
        .await
        .map_err(reject)?;
    Ok(Json(user.into()))
}
