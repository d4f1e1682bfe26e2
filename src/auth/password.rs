//! Password hashing with PBKDF2-HMAC-SHA256.
//!
//! Stored format: `pbkdf2-sha256$<iterations>$<salt>$<hash>` with the salt and
//! hash in unpadded standard base64.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use log::warn;
use rand::RngCore;
use sha2::Sha256;

use crate::core::error::BlogError;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Hashes and verifies user passwords
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    /// Iterations used for newly created hashes
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self { iterations: iterations.max(1) }
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, BlogError> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let derived = pbkdf2_sha256(password.as_bytes(), &salt, self.iterations)?;

        Ok(format!(
            "{}${}${}${}",
            SCHEME,
            self.iterations,
            STANDARD_NO_PAD.encode(salt),
            STANDARD_NO_PAD.encode(derived)
        ))
    }

    /// Check a password against a stored hash; malformed hashes never verify
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let parts: Vec<&str> = stored.split('$').collect();
        let (iterations, salt, expected) = match parts.as_slice() {
            [scheme, iterations, salt, hash] if *scheme == SCHEME => {
                let iterations = match iterations.parse::<u32>() {
                    Ok(i) if i > 0 => i,
                    _ => return false,
                };
                match (STANDARD_NO_PAD.decode(salt), STANDARD_NO_PAD.decode(hash)) {
                    (Ok(salt), Ok(hash)) => (iterations, salt, hash),
                    _ => return false,
                }
            }
            _ => return false,
        };

        match pbkdf2_sha256(password.as_bytes(), &salt, iterations) {
            Ok(derived) => constant_time_eq(&derived, &expected),
            Err(_) => false,
        }
    }

    /// [`hash`](Self::hash) on the blocking thread pool
    pub async fn hash_off_thread(&self, password: &str) -> Result<String, BlogError> {
        let hasher = self.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| BlogError::Internal(format!("password hashing task failed: {}", e)))?
    }

    /// [`verify`](Self::verify) on the blocking thread pool
    pub async fn verify_off_thread(&self, password: &str, stored: &str) -> bool {
        let hasher = self.clone();
        let (password, stored) = (password.to_string(), stored.to_string());
        match tokio::task::spawn_blocking(move || hasher.verify(&password, &stored)).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Password verification task failed: {}", e);
                false
            }
        }
    }

    /// Well-formed hash with the current cost that stands in for a missing account
    pub fn decoy_hash(&self) -> String {
        format!(
            "{}${}${}${}",
            SCHEME,
            self.iterations,
            STANDARD_NO_PAD.encode([0u8; SALT_LEN]),
            STANDARD_NO_PAD.encode([0u8; 32])
        )
    }
}

/// Enforce the password policy for new passwords
pub fn validate_password(password: &str) -> Result<(), BlogError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(BlogError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(BlogError::Validation(format!(
            "Password must be at most {} characters",
            MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Single-block PBKDF2 (derived key length equals the SHA-256 output length)
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> Result<[u8; 32], BlogError> {
    let prf = HmacSha256::new_from_slice(password)
        .map_err(|e| BlogError::Internal(format!("hmac init failed: {}", e)))?;

    let mut mac = prf.clone();
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut block = [0u8; 32];
    block.copy_from_slice(&mac.finalize().into_bytes());
    let mut output = block;

    for _ in 1..iterations {
        let mut mac = prf.clone();
        mac.update(&block);
        block.copy_from_slice(&mac.finalize().into_bytes());
        for (out, b) in output.iter_mut().zip(block.iter()) {
            *out ^= b;
        }
    }

    Ok(output)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
