use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{ExtraFields, User};

/// Request body for account creation through the admin API.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_superuser: Option<bool>,
}

impl CreateUserRequest {
    pub fn extra_fields(&self) -> ExtraFields {
        ExtraFields {
            is_active: self.is_active,
            is_superuser: self.is_superuser,
        }
    }
}

/// Request body for credential checks.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Request body for a password change. A missing password makes the
/// account's password unusable.
#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetSuperuserRequest {
    pub is_superuser: bool,
}

/// Account as returned to API clients. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_staff: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub date_created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub date_updated: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            is_staff: u.is_staff(),
            id: u.id,
            email: u.email,
            is_active: u.is_active,
            is_superuser: u.is_superuser,
            last_login: u.last_login,
            date_created: u.date_created,
            date_updated: u.date_updated,
        }
    }
}
