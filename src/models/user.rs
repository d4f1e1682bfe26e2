use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::BlogError;
use crate::models::{check_length, check_optional_length, clean_optional, timestamp};

/// Access level of a user account
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access, including taxonomy and user management
    Admin,
    /// Writes and manages their own articles
    Author,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Author => write!(f, "author"),
        }
    }
}

/// Stored user document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Lowercase login name
    pub username: String,
    /// Lowercase email address
    pub email: String,
    /// PBKDF2 hash, never sent to clients
    pub password_hash: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// User as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            bio: user.bio.clone(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Author embedded in article responses
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthorSummary {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
        }
    }
}

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

/// Login payload; `login` accepts a username or an email
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Profile update payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub email: Option<String>,
}

/// Password change payload
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Role change payload
#[derive(Debug, Clone, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

/// Validate and normalise a username (lowercase, `[a-z0-9_-]`, 3-30 chars)
pub fn normalize_username(raw: &str) -> Result<String, BlogError> {
    let username = raw.trim().to_ascii_lowercase();
    check_length("Username", &username, 3, 30)?;
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(BlogError::Validation(
            "Username may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }
    Ok(username)
}

/// Validate and normalise an email address
pub fn normalize_email(raw: &str) -> Result<String, BlogError> {
    let email = raw.trim().to_lowercase();
    let invalid = || BlogError::Validation(format!("Invalid email address: {}", raw.trim()));

    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(invalid());
    }

    Ok(email)
}

/// Validate optional profile fields, returning them trimmed
pub fn clean_profile(display_name: Option<&str>, bio: Option<&str>) -> Result<(Option<String>, Option<String>), BlogError> {
    let display_name = clean_optional(display_name);
    let bio = clean_optional(bio);
    check_optional_length("Display name", display_name.as_deref(), 60)?;
    check_optional_length("Bio", bio.as_deref(), 500)?;
    Ok((display_name, bio))
}
