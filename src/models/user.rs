use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::UserId;
use crate::ledger::LedgerError;

pub const MIN_PASSWORD_LEN: usize = 4;

/// A registered wallet owner as stored in `users.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    pub hashed_password: String,
    pub salt: String,
    pub registration_date: DateTime<Utc>,
}

impl User {
    /// Creates a user with a fresh random salt.
    pub fn new(
        user_id: UserId,
        username: &str,
        password: &SecretString,
        registration_date: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let username = validate_username(username)?;
        if password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
            return Err(LedgerError::InvalidPassword {
                min_len: MIN_PASSWORD_LEN,
            });
        }

        let salt = generate_salt();
        let hashed_password = hash_password(password, &salt);
        Ok(Self {
            user_id,
            username,
            hashed_password,
            salt,
            registration_date,
        })
    }

    pub fn verify_password(&self, password: &SecretString) -> bool {
        hash_password(password, &self.salt) == self.hashed_password
    }
}

/// Trims and rejects empty usernames.
pub fn validate_username(username: &str) -> Result<String, LedgerError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidUsername);
    }
    Ok(trimmed.to_string())
}

/// Hex-encoded SHA-256 of `password || salt`.
pub fn hash_password(password: &SecretString, salt: &str) -> String {
    let mut input = Vec::with_capacity(password.expose_secret().len() + salt.len());
    input.extend_from_slice(password.expose_secret().as_bytes());
    input.extend_from_slice(salt.as_bytes());
    to_hex(&hmac_sha256::Hash::hash(&input))
}

fn generate_salt() -> String {
    let bytes: [u8; 8] = rand::random();
    to_hex(&bytes)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn registered_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_verify_password() {
        let user =
            User::new(UserId::new(1), "alice", &secret("hunter22"), registered_at()).unwrap();
        assert!(user.verify_password(&secret("hunter22")));
        assert!(!user.verify_password(&secret("hunter23")));
    }

    #[test]
    fn test_salt_is_random_per_user() {
        let a = User::new(UserId::new(1), "a", &secret("same-pass"), registered_at()).unwrap();
        let b = User::new(UserId::new(2), "b", &secret("same-pass"), registered_at()).unwrap();
        assert_eq!(a.salt.len(), 16);
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hashed_password, b.hashed_password);
    }

    #[test]
    fn test_hash_known_vector() {
        // sha256("abc")
        assert_eq!(
            hash_password(&secret("ab"), "c"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_rejects_empty_username_and_short_password() {
        assert!(matches!(
            User::new(UserId::new(1), "  ", &secret("longenough"), registered_at()),
            Err(LedgerError::InvalidUsername)
        ));
        assert!(matches!(
            User::new(UserId::new(1), "bob", &secret("abc"), registered_at()),
            Err(LedgerError::InvalidPassword { min_len: 4 })
        ));
    }
}
