use async_trait::async_trait;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::AccountError;
use super::repo_types::{NewUser, User};

/// One column change. Each variant writes only its own column (plus
/// `date_updated`), so concurrent changes to other columns survive.
#[derive(Debug, Clone)]
pub enum UserChange {
    /// Stamps `last_login`; matches only while the account is active.
    LastLogin(OffsetDateTime),
    Active(bool),
    Superuser(bool),
    PasswordHash(Option<String>),
}

/// Persistence for account records. Implementations enforce email
/// uniqueness (case-insensitive) and make every write all-or-nothing.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new record, stamping both timestamps.
    async fn insert(&self, new: NewUser) -> Result<User, AccountError>;
    /// Case-insensitive lookup by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AccountError>;
    /// Applies `change` to row `id` and returns the stored row, or `None`
    /// when no row matched. Refreshes `date_updated`; `date_created` is
    /// never written.
    async fn update(&self, id: Uuid, change: UserChange) -> Result<Option<User>, AccountError>;
    async fn count(&self) -> Result<i64, AccountError>;
}

/// Process-local store, used by tests and `AppState::fake`.
#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<User>>, AccountError> {
        self.rows
            .lock()
            .map_err(|_| AccountError::Storage(anyhow::anyhow!("memory store poisoned")))
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, new: NewUser) -> Result<User, AccountError> {
        let mut rows = self.lock()?;
        if rows.iter().any(|u| same_email(&u.email, &new.email)) {
            return Err(AccountError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            last_login: None,
            date_created: now,
            date_updated: now,
            is_active: new.is_active,
            is_superuser: new.is_superuser,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountError> {
        let rows = self.lock()?;
        Ok(rows.iter().find(|u| same_email(&u.email, email)).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AccountError> {
        let rows = self.lock()?;
        Ok(rows.iter().find(|u| u.id == id).cloned())
    }

    async fn update(&self, id: Uuid, change: UserChange) -> Result<Option<User>, AccountError> {
        let mut rows = self.lock()?;
        let Some(row) = rows.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        match change {
            UserChange::LastLogin(at) => {
                if !row.is_active {
                    return Ok(None);
                }
                row.last_login = Some(at);
            }
            UserChange::Active(v) => row.is_active = v,
            UserChange::Superuser(v) => row.is_superuser = v,
            UserChange::PasswordHash(h) => row.password_hash = h,
        }
        row.date_updated = OffsetDateTime::now_utc();
        Ok(Some(row.clone()))
    }

    async fn count(&self) -> Result<i64, AccountError> {
        Ok(self.lock()?.len() as i64)
    }
}
