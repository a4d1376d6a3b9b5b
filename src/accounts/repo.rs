use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::error::AccountError;
use super::repo_types::{NewUser, User};
use super::store::{UserChange, UserStore};

const USER_COLUMNS: &str = "id, email, password_hash, last_login, date_created, date_updated, \
                            is_active, is_superuser";

/// Postgres-backed store over the `users` table.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, new: NewUser) -> Result<User, AccountError> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, is_active, is_superuser)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.is_active)
        .bind(new.is_superuser)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await.context("commit tx")?;
        debug!(user_id = %user.id, "user row inserted");
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE lower(email) = lower($1)
            "#
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AccountError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, change: UserChange) -> Result<Option<User>, AccountError> {
        let (assignment, guard) = match &change {
            UserChange::LastLogin(_) => ("last_login = $2", " AND is_active"),
            UserChange::Active(_) => ("is_active = $2", ""),
            UserChange::Superuser(_) => ("is_superuser = $2", ""),
            UserChange::PasswordHash(_) => ("password_hash = $2", ""),
        };
        let sql = format!(
            r#"
            UPDATE users
            SET {assignment}, date_updated = clock_timestamp()
            WHERE id = $1{guard}
            RETURNING {USER_COLUMNS}
            "#
        );
        let query = sqlx::query_as::<_, User>(&sql).bind(id);
        let query = match change {
            UserChange::LastLogin(at) => query.bind(at),
            UserChange::Active(v) | UserChange::Superuser(v) => query.bind(v),
            UserChange::PasswordHash(h) => query.bind(h),
        };
        let user = query.fetch_optional(&self.db).await?;
        if let Some(u) = &user {
            debug!(user_id = %u.id, column = assignment, "user row updated");
        }
        Ok(user)
    }

    async fn count(&self) -> Result<i64, AccountError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }
}

// Needs a reachable Postgres in DATABASE_URL: `cargo test -- --ignored`.
#[cfg(test)]
mod pg_tests {
    use super::*;
    use time::OffsetDateTime;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: None,
            is_active: true,
            is_superuser: false,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn unique_index_maps_to_duplicate_email(pool: PgPool) {
        let store = PgUserStore::new(pool);
        store.insert(new_user("dup@example.com")).await.unwrap();
        let err = store.insert(new_user("DUP@example.com")).await.unwrap_err();
        assert!(matches!(err, AccountError::DuplicateEmail));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn update_refreshes_date_updated_only(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let user = store.insert(new_user("t@example.com")).await.unwrap();

        let first = store
            .update(user.id, UserChange::Superuser(true))
            .await
            .unwrap()
            .unwrap();
        let second = store
            .update(user.id, UserChange::Active(false))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(second.date_created, user.date_created);
        assert!(first.date_updated > user.date_updated);
        assert!(second.date_updated > first.date_updated);
        assert!(second.is_superuser);
        assert!(!second.is_active);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn last_login_is_not_stamped_on_inactive_rows(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let user = store.insert(new_user("idle@example.com")).await.unwrap();
        store.update(user.id, UserChange::Active(false)).await.unwrap();

        let stamped = store
            .update(user.id, UserChange::LastLogin(OffsetDateTime::now_utc()))
            .await
            .unwrap();
        assert!(stamped.is_none());
        let row = store.find_by_email("IDLE@example.com").await.unwrap().unwrap();
        assert!(!row.is_active);
        assert!(row.last_login.is_none());
    }
}
