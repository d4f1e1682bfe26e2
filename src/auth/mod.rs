//! Authentication: password hashing, bearer tokens and the request extractor
//! that turns a token into an [`AuthUser`].

pub mod extractor;
pub mod password;
pub mod token;

use crate::core::error::BlogError;
use crate::models::user::Role;

pub use password::PasswordHasher;
pub use token::TokenIssuer;

/// Identity of the caller: the account named by a verified token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    /// User id
    pub id: String,
    /// Role as currently stored
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fail with `Forbidden` unless the caller is an admin
    pub fn require_admin(&self) -> Result<(), BlogError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(BlogError::Forbidden("Admin privileges required".to_string()))
        }
    }

    /// Owners manage their own documents; admins manage everything
    pub fn can_manage(&self, owner_id: &str) -> bool {
        self.is_admin() || self.id == owner_id
    }
}
