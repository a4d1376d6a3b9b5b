use std::fmt;

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::password;

/// Permission label in `app_label.codename` form.
pub type Permission = str;

/// Capabilities the rest of the service relies on for any account record.
pub trait Identity {
    /// The natural key; for this model the email address.
    fn username(&self) -> &str;
    fn is_active(&self) -> bool;
    fn is_superuser(&self) -> bool;
    fn check_password(&self, raw: &str) -> bool;
    fn has_usable_password(&self) -> bool;

    /// Staff status mirrors superuser status.
    fn is_staff(&self) -> bool {
        self.is_superuser()
    }

    /// Inactive accounts hold no permissions, active superusers hold all of
    /// them. There are no per-account grants.
    fn has_perm(&self, _perm: &Permission) -> bool {
        self.is_active() && self.is_superuser()
    }

    fn has_perms<'a, I>(&self, perms: I) -> bool
    where
        I: IntoIterator<Item = &'a Permission>,
        Self: Sized,
    {
        perms.into_iter().all(|p| self.has_perm(p))
    }

    fn has_module_perms(&self, _app_label: &str) -> bool {
        self.is_active() && self.is_superuser()
    }
}

/// Account row in the `users` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // Argon2 PHC string, None when unusable
    pub last_login: Option<OffsetDateTime>,
    pub date_created: OffsetDateTime,
    pub date_updated: OffsetDateTime,
    pub is_active: bool,
    pub is_superuser: bool,
}

impl User {
    pub fn is_staff(&self) -> bool {
        Identity::is_staff(self)
    }

    /// Replaces the stored credential. `None` leaves the account without a
    /// usable password. Only changes this copy; the manager persists
    /// password changes through the store.
    pub fn set_password(&mut self, raw: Option<&str>) -> anyhow::Result<()> {
        self.password_hash = password::make_password(raw)?;
        Ok(())
    }

    pub fn set_unusable_password(&mut self) {
        self.password_hash = None;
    }
}

impl Identity for User {
    fn username(&self) -> &str {
        &self.email
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn is_superuser(&self) -> bool {
        self.is_superuser
    }

    fn check_password(&self, raw: &str) -> bool {
        password::check_password(raw, self.password_hash.as_deref())
    }

    fn has_usable_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.email)
    }
}

/// Optional field overrides applied at creation time, on top of the
/// entry point's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtraFields {
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

impl ExtraFields {
    pub fn superuser(mut self, value: bool) -> Self {
        self.is_superuser = Some(value);
        self
    }

    pub fn active(mut self, value: bool) -> Self {
        self.is_active = Some(value);
        self
    }

    /// Sets `is_superuser` only when the caller did not.
    pub(crate) fn superuser_or(mut self, default: bool) -> Self {
        self.is_superuser.get_or_insert(default);
        self
    }
}

/// Fully prepared record handed to a store for insertion.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
}

#[cfg(test)]
pub(crate) fn sample_user(email: &str) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: None,
        last_login: None,
        date_created: now,
        date_updated: now,
        is_active: true,
        is_superuser: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_email() {
        let user = sample_user("a@example.com");
        assert_eq!(user.to_string(), "a@example.com");
        assert_eq!(user.username(), "a@example.com");
    }

    #[test]
    fn staff_tracks_superuser() {
        let mut user = sample_user("a@example.com");
        assert!(!user.is_staff());
        user.is_superuser = true;
        assert!(user.is_staff());
        user.is_superuser = false;
        assert!(!user.is_staff());
    }

    #[test]
    fn permissions_follow_active_superuser() {
        let mut user = sample_user("a@example.com");
        assert!(!user.has_perm("accounts.add_user"));
        assert!(!user.has_module_perms("accounts"));

        user.is_superuser = true;
        assert!(user.has_perm("accounts.add_user"));
        assert!(user.has_perms(["accounts.add_user", "accounts.change_user"]));
        assert!(user.has_module_perms("accounts"));

        user.is_active = false;
        assert!(!user.has_perm("accounts.add_user"));
        assert!(!user.has_module_perms("accounts"));
    }

    #[test]
    fn password_lifecycle_on_record() {
        let mut user = sample_user("a@example.com");
        assert!(!user.has_usable_password());
        assert!(!user.check_password(""));

        user.set_password(Some("hunter22")).unwrap();
        assert!(user.has_usable_password());
        assert_ne!(user.password_hash.as_deref(), Some("hunter22"));
        assert!(user.check_password("hunter22"));
        assert!(!user.check_password("hunter23"));

        user.set_unusable_password();
        assert!(!user.check_password("hunter22"));
    }

    #[test]
    fn hash_is_not_serialized() {
        let mut user = sample_user("a@example.com");
        user.set_password(Some("hunter22")).unwrap();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn extra_fields_keep_caller_overrides() {
        assert_eq!(ExtraFields::default().superuser_or(true).is_superuser, Some(true));
        let ef = ExtraFields::default().superuser(false).superuser_or(true);
        assert_eq!(ef.is_superuser, Some(false));
        assert_eq!(ExtraFields::default().active(false).is_active, Some(false));
    }
}
