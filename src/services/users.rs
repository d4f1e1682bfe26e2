use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::password::validate_password;
use crate::auth::{AuthUser, PasswordHasher, TokenIssuer};
use crate::core::error::BlogError;
use crate::core::pagination::{Page, PageRequest};
use crate::core::store::{to_document, DocumentStore, Filter, FindOptions, Sort, ARTICLES, USERS};
use crate::models::now;
use crate::models::user::{
    clean_profile, normalize_email, normalize_username, ChangePasswordRequest, LoginRequest,
    PublicUser, RegisterRequest, Role, UpdateProfileRequest, User,
};
use crate::services::{fetch, fetch_many, fetch_one};

/// Token plus the profile it was issued for
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub user: PublicUser,
}

/// Account registration, login and user administration
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, hasher: PasswordHasher, tokens: TokenIssuer) -> Self {
        Self { store, hasher, tokens }
    }

    /// Create an account; the very first account becomes an admin
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, BlogError> {
        let username = normalize_username(&request.username)?;
        let email = normalize_email(&request.email)?;
        validate_password(&request.password)?;
        let (display_name, _) = clean_profile(request.display_name.as_deref(), None)?;

        if self.store.count(USERS, &[Filter::eq("username", username.as_str())]).await? > 0 {
            return Err(BlogError::Conflict("Username already taken".to_string()));
        }
        if self.store.count(USERS, &[Filter::eq("email", email.as_str())]).await? > 0 {
            return Err(BlogError::Conflict("Email already registered".to_string()));
        }

        let role = if self.store.count(USERS, &[]).await? == 0 {
            Role::Admin
        } else {
            Role::Author
        };

        let timestamp = now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash: self.hasher.hash_off_thread(&request.password).await?,
            display_name,
            bio: None,
            role,
            created_at: timestamp,
            updated_at: timestamp,
        };

        self.store
            .insert(USERS, &user.id, to_document(&user)?)
            .await
            .map_err(|e| match e {
                BlogError::Conflict(_) => BlogError::Conflict("Username or email already in use".to_string()),
                other => other,
            })?;

        info!("Registered user {} ({}) as {}", user.username, user.id, user.role);
        self.session_for(&user)
    }

    /// Exchange a username or email plus password for a token
    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, BlogError> {
        let login = request.login.trim().to_lowercase();
        let field = if login.contains('@') { "email" } else { "username" };

        let user: Option<User> = fetch_one(self.store.as_ref(), USERS, &[Filter::eq(field, login.as_str())]).await?;

        // Unknown logins pay the same hashing cost as known ones
        let stored = match user.as_ref() {
            Some(user) => user.password_hash.clone(),
            None => self.hasher.decoy_hash(),
        };
        let verified = self.hasher.verify_off_thread(&request.password, &stored).await;

        match user {
            Some(user) if verified => {
                info!("User {} logged in", user.username);
                self.session_for(&user)
            }
            _ => {
                warn!("Failed login attempt for '{}'", login);
                Err(BlogError::Unauthorized("Invalid credentials".to_string()))
            }
        }
    }

    fn session_for(&self, user: &User) -> Result<AuthSession, BlogError> {
        Ok(AuthSession {
            token: self.tokens.issue(&user.id, user.role)?,
            expires_in: self.tokens.ttl_seconds(),
            user: PublicUser::from(user),
        })
    }

    pub async fn get(&self, id: &str) -> Result<User, BlogError> {
        fetch(self.store.as_ref(), USERS, id)
            .await?
            .ok_or_else(|| BlogError::not_found("User", id))
    }

    /// Paginated user listing for administrators
    pub async fn list(
        &self,
        page: PageRequest,
        search: Option<&str>,
        role: Option<Role>,
    ) -> Result<Page<PublicUser>, BlogError> {
        let mut filters = Vec::new();
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            filters.push(Filter::search(&["username", "email", "display_name"], term));
        }
        if let Some(role) = role {
            filters.push(Filter::eq("role", role.to_string()));
        }

        let total = self.store.count(USERS, &filters).await?;
        let options = FindOptions {
            filters,
            sort: vec![Sort::desc("created_at")],
            skip: page.skip(),
            limit: Some(page.limit),
        };
        let users: Vec<User> = fetch_many(self.store.as_ref(), USERS, &options).await?;

        Ok(Page::new(users.iter().map(PublicUser::from).collect(), page, total))
    }

    pub async fn update_profile(&self, id: &str, request: UpdateProfileRequest) -> Result<User, BlogError> {
        let mut user = self.get(id).await?;

        if let Some(raw_email) = request.email.as_deref() {
            let email = normalize_email(raw_email)?;
            if email != user.email {
                let taken = self
                    .store
                    .count(USERS, &[Filter::eq("email", email.as_str()), Filter::ne("id", id)])
                    .await?;
                if taken > 0 {
                    return Err(BlogError::Conflict("Email already registered".to_string()));
                }
                user.email = email;
            }
        }

        if request.display_name.is_some() || request.bio.is_some() {
            let (display_name, bio) = clean_profile(request.display_name.as_deref(), request.bio.as_deref())?;
            if request.display_name.is_some() {
                user.display_name = display_name;
            }
            if request.bio.is_some() {
                user.bio = bio;
            }
        }

        user.updated_at = now();
        self.save(&user).await?;
        Ok(user)
    }

    pub async fn change_password(&self, id: &str, request: ChangePasswordRequest) -> Result<(), BlogError> {
        let mut user = self.get(id).await?;

        if !self.hasher.verify_off_thread(&request.current_password, &user.password_hash).await {
            return Err(BlogError::Validation("Current password is incorrect".to_string()));
        }
        validate_password(&request.new_password)?;

        user.password_hash = self.hasher.hash_off_thread(&request.new_password).await?;
        user.updated_at = now();
        self.save(&user).await?;

        info!("User {} changed their password", user.username);
        Ok(())
    }

    pub async fn set_role(&self, actor: &AuthUser, id: &str, role: Role) -> Result<User, BlogError> {
        actor.require_admin()?;
        if actor.id == id && role != Role::Admin {
            return Err(BlogError::Validation("You cannot remove your own admin role".to_string()));
        }

        let mut user = self.get(id).await?;
        if user.role != role {
            user.role = role;
            user.updated_at = now();
            self.save(&user).await?;
            info!("User {} is now {}", user.username, role);
        }
        Ok(user)
    }

    /// Delete an account that no longer authors any article
    pub async fn delete(&self, actor: &AuthUser, id: &str) -> Result<(), BlogError> {
        actor.require_admin()?;
        if actor.id == id {
            return Err(BlogError::Validation("You cannot delete your own account".to_string()));
        }

        let user = self.get(id).await?;
        let authored = self.store.count(ARTICLES, &[Filter::eq("author_id", id)]).await?;
        if authored > 0 {
            return Err(BlogError::Conflict(format!(
                "User {} still authors {} article(s)",
                user.username, authored
            )));
        }

        self.store.delete(USERS, id).await?;
        info!("Deleted user {}", user.username);
        Ok(())
    }

    async fn save(&self, user: &User) -> Result<(), BlogError> {
        if !self.store.replace(USERS, &user.id, to_document(user)?).await? {
            return Err(BlogError::not_found("User", &user.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{MockDocumentStore, SqliteDocumentStore};

    fn service() -> UserService {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
        UserService::new(store, PasswordHasher::new(10), TokenIssuer::new("test-secret", 1))
    }

    fn register_request(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "password123".to_string(),
            display_name: None,
        }
    }

    fn actor(session: &AuthSession) -> AuthUser {
        AuthUser { id: session.user.id.clone(), role: session.user.role }
    }

    #[actix_web::test]
    async fn test_first_user_is_admin() {
        let users = service();
        let first = users.register(register_request("alice")).await.unwrap();
        let second = users.register(register_request("bob")).await.unwrap();

        assert_eq!(first.user.role, Role::Admin);
        assert_eq!(second.user.role, Role::Author);
        assert!(!first.token.is_empty());
        assert_eq!(first.expires_in, 3600);
    }

    #[actix_web::test]
    async fn test_duplicate_registration() {
        let users = service();
        users.register(register_request("alice")).await.unwrap();

        let err = users.register(register_request("ALICE")).await.unwrap_err();
        assert_eq!(err, BlogError::Conflict("Username already taken".to_string()));

        let mut other = register_request("alice2");
        other.email = "Alice@Example.com".to_string();
        let err = users.register(other).await.unwrap_err();
        assert_eq!(err, BlogError::Conflict("Email already registered".to_string()));
    }

    #[actix_web::test]
    async fn test_login_by_username_or_email() {
        let users = service();
        users.register(register_request("alice")).await.unwrap();

        let by_name = users
            .login(LoginRequest { login: "Alice".to_string(), password: "password123".to_string() })
            .await
            .unwrap();
        assert_eq!(by_name.user.username, "alice");

        let by_email = users
            .login(LoginRequest { login: "alice@example.com".to_string(), password: "password123".to_string() })
            .await
            .unwrap();
        assert_eq!(by_email.user.id, by_name.user.id);

        let err = users
            .login(LoginRequest { login: "alice".to_string(), password: "wrong-password".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, BlogError::Unauthorized(_)));

        let err = users
            .login(LoginRequest { login: "nobody".to_string(), password: "password123".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, BlogError::Unauthorized(_)));
    }

    #[actix_web::test]
    async fn test_change_password() {
        let users = service();
        let session = users.register(register_request("alice")).await.unwrap();

        let wrong = ChangePasswordRequest {
            current_password: "nope-nope".to_string(),
            new_password: "new-password".to_string(),
        };
        assert!(users.change_password(&session.user.id, wrong).await.is_err());

        let right = ChangePasswordRequest {
            current_password: "password123".to_string(),
            new_password: "new-password".to_string(),
        };
        users.change_password(&session.user.id, right).await.unwrap();

        assert!(users
            .login(LoginRequest { login: "alice".to_string(), password: "new-password".to_string() })
            .await
            .is_ok());
    }

    #[actix_web::test]
    async fn test_update_profile() {
        let users = service();
        let alice = users.register(register_request("alice")).await.unwrap();
        users.register(register_request("bob")).await.unwrap();

        let updated = users
            .update_profile(
                &alice.user.id,
                UpdateProfileRequest {
                    display_name: Some(" Alice A. ".to_string()),
                    bio: Some("Writes about Rust".to_string()),
                    email: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Alice A."));
        assert_eq!(updated.bio.as_deref(), Some("Writes about Rust"));

        let err = users
            .update_profile(
                &alice.user.id,
                UpdateProfileRequest { email: Some("bob@example.com".to_string()), ..Default::default() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BlogError::Conflict(_)));
    }

    #[actix_web::test]
    async fn test_role_and_delete_rules() {
        let users = service();
        let admin = users.register(register_request("alice")).await.unwrap();
        let author = users.register(register_request("bob")).await.unwrap();
        let admin_actor = actor(&admin);

        assert!(users.set_role(&admin_actor, &admin.user.id, Role::Author).await.is_err());
        assert!(matches!(
            users.set_role(&actor(&author), &admin.user.id, Role::Author).await,
            Err(BlogError::Forbidden(_))
        ));

        let promoted = users.set_role(&admin_actor, &author.user.id, Role::Admin).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);

        assert!(users.delete(&admin_actor, &admin.user.id).await.is_err());
        users.delete(&admin_actor, &author.user.id).await.unwrap();
        assert!(matches!(users.get(&author.user.id).await, Err(BlogError::NotFound(_))));
    }

    #[actix_web::test]
    async fn test_list_filters() {
        let users = service();
        users.register(register_request("alice")).await.unwrap();
        users.register(register_request("bob")).await.unwrap();
        users.register(register_request("carol")).await.unwrap();

        let page = users.list(PageRequest { page: 1, limit: 2 }, None, None).await.unwrap();
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.items.len(), 2);

        let authors = users.list(PageRequest { page: 1, limit: 10 }, None, Some(Role::Author)).await.unwrap();
        assert_eq!(authors.pagination.total, 2);

        let search = users.list(PageRequest { page: 1, limit: 10 }, Some("CAR"), None).await.unwrap();
        assert_eq!(search.items.len(), 1);
        assert_eq!(search.items[0].username, "carol");
    }

    #[actix_web::test]
    async fn test_storage_failure_propagates() {
        let mut store = MockDocumentStore::new();
        store
            .expect_count()
            .returning(|_, _| Err(BlogError::Storage("disk full".to_string())));

        let users = UserService::new(Arc::new(store), PasswordHasher::new(1), TokenIssuer::new("s", 1));
        let err = users.register(register_request("alice")).await.unwrap_err();
        assert_eq!(err, BlogError::Storage("disk full".to_string()));
    }
}
