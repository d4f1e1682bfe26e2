use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;

use crate::auth::AuthUser;
use crate::core::error::BlogError;
use crate::web::server::AppState;

/// Requires a valid `Authorization: Bearer <token>` header naming an existing
/// account. The role comes from the stored account, not from the token.
///
/// Use `Option<AuthUser>` on endpoints that also serve anonymous callers.
impl FromRequest for AuthUser {
    type Error = BlogError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move { authenticate(&req).await })
    }
}

async fn authenticate(req: &HttpRequest) -> Result<AuthUser, BlogError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| BlogError::Internal("application state not configured".to_string()))?;

    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| BlogError::Unauthorized("Missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| BlogError::Unauthorized("Malformed Authorization header".to_string()))?;

    let token = bearer_token(value)
        .ok_or_else(|| BlogError::Unauthorized("Expected a Bearer token".to_string()))?;

    let claims = state.tokens.verify(token)?;
    let user = match state.users.get(&claims.sub).await {
        Ok(user) => user,
        Err(BlogError::NotFound(_)) => {
            return Err(BlogError::Unauthorized("Account no longer exists".to_string()));
        }
        Err(e) => return Err(e),
    };

    Ok(AuthUser {
        id: user.id,
        role: user.role,
    })
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
