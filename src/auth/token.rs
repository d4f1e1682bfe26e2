use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::core::error::BlogError;
use crate::models::user::Role;

type HmacSha256 = Hmac<Sha256>;
const TOKEN_VERSION_V1: &str = "v1";
const MAX_TOKEN_LEN: usize = 2048;

/// Claims carried by a bearer token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Role at issue time
    pub role: Role,
    /// Issued-at, seconds since the epoch
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
}

/// Issues and verifies HMAC-signed bearer tokens
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Issue a token for a user, valid from now for the configured lifetime
    pub fn issue(&self, user_id: &str, role: Role) -> Result<String, BlogError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now,
            exp: now + self.ttl.num_seconds(),
        };
        self.encode(&claims)
    }

    /// Seconds a freshly issued token stays valid
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    fn encode(&self, claims: &Claims) -> Result<String, BlogError> {
        let payload_part = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let sig_part = URL_SAFE_NO_PAD.encode(self.sign(&payload_part)?);
        Ok(format!("{}.{}.{}", TOKEN_VERSION_V1, payload_part, sig_part))
    }

    fn sign(&self, payload_part: &str) -> Result<Vec<u8>, BlogError> {
        let mut mac = self.mac()?;
        mac.update(payload_part.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn mac(&self) -> Result<HmacSha256, BlogError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| BlogError::Internal(format!("hmac init failed: {}", e)))
    }

    /// Verify signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<Claims, BlogError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(BlogError::Unauthorized("token exceeds max length".to_string()));
        }

        let parts: Vec<&str> = token.split('.').collect();
        let (payload_part, sig_part) = match parts.as_slice() {
            [version, payload, sig] if *version == TOKEN_VERSION_V1 => (*payload, *sig),
            [version, _, _] => {
                return Err(BlogError::Unauthorized(format!("unsupported token version: {}", version)))
            }
            _ => return Err(BlogError::Unauthorized("invalid token format".to_string())),
        };

        let signature = URL_SAFE_NO_PAD
            .decode(sig_part)
            .map_err(|_| BlogError::Unauthorized("invalid token format".to_string()))?;
        let mut mac = self.mac()?;
        mac.update(payload_part.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| BlogError::Unauthorized("token signature mismatch".to_string()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|_| BlogError::Unauthorized("invalid token format".to_string()))?;
        let claims: Claims = serde_json::from_slice(&payload)
            .map_err(|_| BlogError::Unauthorized("invalid token payload".to_string()))?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(BlogError::Unauthorized("token expired".to_string()));
        }

        Ok(claims)
    }
}
