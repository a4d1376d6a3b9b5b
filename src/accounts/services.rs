use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::error::AccountError;
use super::password::make_password;
use super::repo_types::{ExtraFields, Identity, NewUser, User};
use super::store::{UserChange, UserStore};

pub const EMAIL_MAX_LEN: usize = 255;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Spends one hash on a rejected login so it takes as long as a password
/// check against a real account.
fn burn_hash(password: &str) {
    let _ = make_password(Some(password));
}

/// Trims the address and lowercases the domain part. The local part keeps
/// its case; an input without `@` comes back trimmed.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

/// Single entry point for creating and mutating accounts.
#[derive(Clone)]
pub struct UserManager {
    store: Arc<dyn UserStore>,
}

impl UserManager {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    /// Creates an ordinary account. `is_superuser` defaults to false.
    pub async fn create_user(
        &self,
        email: &str,
        password: Option<&str>,
        extra: ExtraFields,
    ) -> Result<User, AccountError> {
        self.create(email, password, extra.superuser_or(false)).await
    }

    /// Creates a superuser. `is_superuser` defaults to true.
    pub async fn create_superuser(
        &self,
        email: &str,
        password: Option<&str>,
        extra: ExtraFields,
    ) -> Result<User, AccountError> {
        self.create(email, password, extra.superuser_or(true)).await
    }

    #[instrument(skip(self, password, extra))]
    async fn create(
        &self,
        email: &str,
        password: Option<&str>,
        extra: ExtraFields,
    ) -> Result<User, AccountError> {
        if email.trim().is_empty() {
            warn!("refusing to create user without email");
            return Err(AccountError::EmptyEmail);
        }
        let email = normalize_email(email);
        if email.chars().count() > EMAIL_MAX_LEN || !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AccountError::InvalidEmail);
        }

        let password_hash =
            make_password(password).map_err(|e| AccountError::PasswordHash(e.to_string()))?;
        if password_hash.is_none() {
            debug!(email = %email, "creating user without a usable password");
        }

        let user = self
            .store
            .insert(NewUser {
                email,
                password_hash,
                is_active: extra.is_active.unwrap_or(true),
                is_superuser: extra.is_superuser.unwrap_or(false),
            })
            .await?;

        info!(
            user_id = %user.id,
            email = %user.email,
            is_superuser = user.is_superuser,
            "user created"
        );
        Ok(user)
    }

    pub async fn get_by_natural_key(&self, email: &str) -> Result<User, AccountError> {
        self.store
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AccountError::NotFound)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, AccountError> {
        self.store.find_by_id(id).await?.ok_or(AccountError::NotFound)
    }

    /// Returns the account when the credentials match an active user with a
    /// usable password, stamping `last_login`.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, AccountError> {
        let Some(user) = self.store.find_by_email(&normalize_email(email)).await? else {
            burn_hash(password);
            debug!("authenticate: unknown email");
            return Ok(None);
        };
        if !user.has_usable_password() {
            burn_hash(password);
            debug!(user_id = %user.id, "authenticate: no usable password");
            return Ok(None);
        }
        if !user.check_password(password) {
            debug!(user_id = %user.id, "authenticate: bad password");
            return Ok(None);
        }
        if !user.is_active {
            debug!(user_id = %user.id, "authenticate: inactive user");
            return Ok(None);
        }
        let stamped = self
            .store
            .update(user.id, UserChange::LastLogin(OffsetDateTime::now_utc()))
            .await?;
        if stamped.is_none() {
            debug!(user_id = %user.id, "authenticate: deactivated during login");
        }
        Ok(stamped)
    }

    async fn apply(&self, id: Uuid, change: UserChange) -> Result<User, AccountError> {
        self.store
            .update(id, change)
            .await?
            .ok_or(AccountError::NotFound)
    }

    #[instrument(skip(self, password))]
    pub async fn set_password(
        &self,
        id: Uuid,
        password: Option<&str>,
    ) -> Result<User, AccountError> {
        let hash =
            make_password(password).map_err(|e| AccountError::PasswordHash(e.to_string()))?;
        let user = self.apply(id, UserChange::PasswordHash(hash)).await?;
        info!(user_id = %user.id, usable = user.has_usable_password(), "password changed");
        Ok(user)
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<User, AccountError> {
        self.set_active(id, false).await
    }

    pub async fn activate(&self, id: Uuid) -> Result<User, AccountError> {
        self.set_active(id, true).await
    }

    #[instrument(skip(self))]
    async fn set_active(&self, id: Uuid, active: bool) -> Result<User, AccountError> {
        let user = self.apply(id, UserChange::Active(active)).await?;
        info!(user_id = %user.id, is_active = active, "activation changed");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn set_superuser(&self, id: Uuid, value: bool) -> Result<User, AccountError> {
        let user = self.apply(id, UserChange::Superuser(value)).await?;
        info!(user_id = %user.id, is_superuser = value, "superuser status changed");
        Ok(user)
    }

    /// Creates the configured superuser unless an account with that email
    /// already exists.
    pub async fn ensure_superuser(&self, email: &str, password: &str) -> Result<User, AccountError> {
        match self.get_by_natural_key(email).await {
            Ok(existing) => {
                info!(user_id = %existing.id, "bootstrap superuser already present");
                Ok(existing)
            }
            Err(AccountError::NotFound) => {
                self.create_superuser(email, Some(password), ExtraFields::default())
                    .await
            }
            Err(e) => Err(e),
        }
    }
}
