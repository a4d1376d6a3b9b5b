use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

/// Hashes `plain` into an Argon2 PHC string with a fresh random salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Stored credential for an optional password. `None` in, `None` out:
/// the account ends up without a usable password.
pub fn make_password(plain: Option<&str>) -> anyhow::Result<Option<String>> {
    plain.map(hash_password).transpose()
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Checks `plain` against a stored credential. A missing or corrupt hash
/// never matches.
pub fn check_password(plain: &str, stored: Option<&str>) -> bool {
    let Some(hash) = stored else {
        return false;
    };
    match verify_password(plain, hash) {
        Ok(ok) => ok,
        Err(e) => {
            warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_differs_from_plaintext_and_verifies() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let a = hash_password("secret").unwrap();
        let b = hash_password("secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("correct-horse-battery-staple").unwrap();
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn missing_password_is_unusable() {
        assert_eq!(make_password(None).unwrap(), None);
        assert!(!check_password("", None));
        assert!(!check_password("anything", None));
    }

    #[test]
    fn check_password_swallows_corrupt_hash() {
        assert!(!check_password("anything", Some("garbage")));
    }

    #[test]
    fn make_password_hashes_when_present() {
        let stored = make_password(Some("secret")).unwrap().unwrap();
        assert!(check_password("secret", Some(&stored)));
    }
}
