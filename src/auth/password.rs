use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

const PASSWORD_SYMBOLS: &str = "@$!%*?&";
const PASSWORD_MIN_LEN: usize = 8;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
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

/// Lowercase, uppercase, digit and one of `@$!%*?&`, at least 8 chars.
pub fn meets_policy(plain: &str) -> bool {
    plain.chars().count() >= PASSWORD_MIN_LEN
        && plain.chars().any(|c| c.is_ascii_lowercase())
        && plain.chars().any(|c| c.is_ascii_uppercase())
        && plain.chars().any(|c| c.is_ascii_digit())
        && plain.chars().any(|c| PASSWORD_SYMBOLS.contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("Corr3ct&Horse").expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn policy() {
        assert!(meets_policy("Passw0rd!"));
        assert!(!meets_policy("Pa0!"));
        assert!(!meets_policy("password1!"));
        assert!(!meets_policy("PASSWORD1!"));
        assert!(!meets_policy("Password!!"));
        assert!(!meets_policy("Password12"));
    }
}
