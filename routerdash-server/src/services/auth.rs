use anyhow::Context;
use argon2::Argon2;
use base64::Engine;
use password_hash::{PasswordHash, PasswordVerifier};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use subtle::ConstantTimeEq;

#[derive(Debug, Deserialize)]
struct UserRecord {
    password: String,
}

/// Operator accounts loaded once from the users file, e.g.
/// `{"admin": {"password": "$argon2id$..."}}`. Plaintext passwords are
/// accepted for compatibility but compared in constant time.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    users: HashMap<String, String>,
}

impl Credentials {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading users file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing users file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let records: HashMap<String, UserRecord> = serde_json::from_str(raw)?;
        Ok(Self {
            users: records
                .into_iter()
                .map(|(name, record)| (name, record.password))
                .collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        let Some(stored) = self.users.get(username) else {
            return false;
        };

        if stored.starts_with("$argon2") {
            return match PasswordHash::new(stored) {
                Ok(hash) => Argon2::default()
                    .verify_password(password.as_bytes(), &hash)
                    .is_ok(),
                Err(e) => {
                    tracing::error!("Stored hash for {} is malformed: {}", username, e);
                    false
                }
            };
        }

        stored.as_bytes().ct_eq(password.as_bytes()).into()
    }
}

/// Splits an `Authorization: Basic ...` header value into username and password.
pub fn decode_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?.trim();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}
