//! Password hashing and the logged-in principal.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};

use crate::config::UserRecord;

/// Hashes a clear password, returning it in PHC string format.
pub fn hash_password(pass: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(pass.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Tells whether `pass` corresponds to the given PHC-format `hash`.
pub fn check_password(hash: &str, pass: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(pass.as_bytes(), &parsed_hash)
        .is_ok()
}

/// The currently logged-in user, or lack thereof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub uid: u32,
    pub username: String,
}

impl From<&UserRecord> for Principal {
    fn from(u: &UserRecord) -> Self {
        Self {
            uid: u.uid,
            username: u.username.clone(),
        }
    }
}

/// Looks up a user by login/password pair, verifying the Argon2 hash.
pub fn authenticate<'u>(users: &'u [UserRecord], username: &str, password: &str) -> Option<&'u UserRecord> {
    users
        .iter()
        .find(|u| u.username == username && check_password(&u.password_hash, password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_roundtrip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(check_password(&hash, "hunter2"));
        assert!(!check_password(&hash, "wrong"));
    }
}
