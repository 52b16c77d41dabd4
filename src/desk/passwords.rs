use super::error::DeskError;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, TimeDelta, Utc};
use rand::{Rng, distr::Alphanumeric};
use std::collections::HashMap;
use tokio::sync::Mutex;

pub const OTP_LENGTH: usize = 8;

/// Placeholder stored when an admin has no usable password; never verifies.
pub const NO_PASSWORD: &str = "!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redemption {
    Accepted,
    Expired,
    Unknown,
}

/// One-time admin registration passwords, kept in memory only.
pub struct OneTimePasswords {
    issued: Mutex<HashMap<String, DateTime<Utc>>>,
    ttl: TimeDelta,
}

impl OneTimePasswords {
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            issued: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn issue(&self, now: DateTime<Utc>) -> String {
        let mut issued = self.issued.lock().await;
        loop {
            let password: String = rand::rng()
                .sample_iter(&Alphanumeric)
                .take(OTP_LENGTH)
                .map(char::from)
                .collect();
            if !issued.contains_key(&password) {
                issued.insert(password.clone(), now);
                return password;
            }
        }
    }

    /// Consumes the password. Expired passwords are removed as well.
    pub async fn redeem(&self, password: &str, now: DateTime<Utc>) -> Redemption {
        match self.issued.lock().await.remove(password) {
            Some(issued_at) if now - issued_at <= self.ttl => Redemption::Accepted,
            Some(_) => Redemption::Expired,
            None => Redemption::Unknown,
        }
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut issued = self.issued.lock().await;
        let before = issued.len();
        issued.retain(|_, issued_at| now - *issued_at <= self.ttl);
        before - issued.len()
    }

    pub async fn outstanding(&self) -> usize {
        self.issued.lock().await.len()
    }
}

/// Hash a password using Argon2id on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, DeskError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_now(&password))
        .await
        .map_err(|_| DeskError::PasswordHash)?
}

pub async fn verify_password(password: &str, hash: &str) -> bool {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    tokio::task::spawn_blocking(move || verify_now(&password, &hash))
        .await
        .unwrap_or(false)
}

fn hash_now(password: &str) -> Result<String, DeskError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| DeskError::PasswordHash)
}

fn verify_now(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
