use std::env;
use std::fmt::Display;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::{info, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::core::error::BlogError;

/// Runtime configuration for the API server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// SQLite file holding the document collections (`:memory:` allowed)
    pub database_path: String,
    /// Secret used to sign bearer tokens
    #[serde(skip_serializing)]
    pub token_secret: String,
    /// Bearer token lifetime in hours
    pub token_ttl_hours: i64,
    /// PBKDF2 iterations for new password hashes
    pub password_iterations: u32,
    /// Page size when a list request does not name one
    pub default_page_size: u64,
    /// Upper bound for requested page sizes
    pub max_page_size: u64,
    /// Allowed CORS origin for the admin frontend (any when unset)
    pub cors_origin: Option<String>,
    /// Directory with the built admin frontend, served under /admin
    pub admin_dir: Option<String>,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, BlogError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BlogError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let token_secret = match lookup("BLOG_TOKEN_SECRET").filter(|s| !s.trim().is_empty()) {
            Some(secret) => secret,
            None => {
                warn!("BLOG_TOKEN_SECRET not set, generating a per-process secret; tokens will not survive restarts");
                defaults.token_secret.clone()
            }
        };

        let config = Self {
            host: lookup("BLOG_HOST").unwrap_or(defaults.host),
            port: try_load(&lookup, "BLOG_PORT", defaults.port)?,
            database_path: lookup("BLOG_DATABASE_PATH").unwrap_or(defaults.database_path),
            token_secret,
            token_ttl_hours: try_load(&lookup, "BLOG_TOKEN_TTL_HOURS", defaults.token_ttl_hours)?,
            password_iterations: try_load(&lookup, "BLOG_PASSWORD_ITERATIONS", defaults.password_iterations)?,
            default_page_size: try_load(&lookup, "BLOG_DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            max_page_size: try_load(&lookup, "BLOG_MAX_PAGE_SIZE", defaults.max_page_size)?,
            cors_origin: lookup("BLOG_CORS_ORIGIN").filter(|s| !s.is_empty()),
            admin_dir: lookup("BLOG_ADMIN_DIR").filter(|s| !s.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Bind address in `host:port` form
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<(), BlogError> {
        if self.token_ttl_hours <= 0 {
            return Err(BlogError::Validation("BLOG_TOKEN_TTL_HOURS must be positive".to_string()));
        }
        if self.password_iterations == 0 {
            return Err(BlogError::Validation("BLOG_PASSWORD_ITERATIONS must be positive".to_string()));
        }
        if self.max_page_size == 0 || self.default_page_size == 0 {
            return Err(BlogError::Validation("page sizes must be positive".to_string()));
        }
        if self.default_page_size > self.max_page_size {
            return Err(BlogError::Validation(
                "BLOG_DEFAULT_PAGE_SIZE cannot exceed BLOG_MAX_PAGE_SIZE".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: "blog.db".to_string(),
            token_secret: random_secret(),
            token_ttl_hours: 24,
            password_iterations: 100_000,
            default_page_size: 10,
            max_page_size: 100,
            cors_origin: None,
            admin_dir: None,
        }
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: T) -> Result<T, BlogError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| BlogError::Validation(format!("Invalid {} value '{}': {}", key, raw, e))),
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
