use actix_web::{web, HttpResponse};

use crate::auth::AuthUser;
use crate::core::error::BlogError;
use crate::models::user::{ChangePasswordRequest, LoginRequest, PublicUser, RegisterRequest, UpdateProfileRequest};
use crate::web::models::{DataResponse, GenericResponse};
use crate::web::server::AppState;

/// Create an account and sign it in
pub async fn register(
    data: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, BlogError> {
    let session = data.users.register(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(DataResponse::new(session)))
}

pub async fn login(data: web::Data<AppState>, body: web::Json<LoginRequest>) -> Result<HttpResponse, BlogError> {
    let session = data.users.login(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(session)))
}

/// Profile of the signed-in user
pub async fn me(data: web::Data<AppState>, user: AuthUser) -> Result<HttpResponse, BlogError> {
    let profile = data.users.get(&user.id).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(PublicUser::from(&profile))))
}

pub async fn update_me(
    data: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, BlogError> {
    let profile = data.users.update_profile(&user.id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(PublicUser::from(&profile))))
}

pub async fn change_password(
    data: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, BlogError> {
    data.users.change_password(&user.id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(GenericResponse::message("Password updated")))
}

#[cfg(test)]
mod tests {
    use crate::web::server::test_state;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_register_login_and_profile() {
        let state = test_state();
        let app = crate::test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "username": "Alice",
                "email": "alice@example.com",
                "password": "password123",
                "display_name": "Alice"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["user"]["username"], "alice");
        assert_eq!(body["data"]["user"]["role"], "admin");
        assert!(body["data"]["user"].get("password_hash").is_none());

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"login": "alice@example.com", "password": "password123"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let token = body["data"]["token"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["email"], "alice@example.com");

        let req = test::TestRequest::put()
            .uri("/api/auth/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({"bio": "Rustacean"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["bio"], "Rustacean");
    }

    #[actix_web::test]
    async fn test_auth_failures() {
        let state = test_state();
        let app = crate::test_app!(state);

        let req = test::TestRequest::get().uri("/api/auth/me").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"login": "ghost", "password": "password123"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Unauthorized: Invalid credentials");

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({"username": "bob", "email": "not-an-email", "password": "password123"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_change_password() {
        let state = test_state();
        let app = crate::test_app!(state);
        let session = state
            .users
            .register(crate::models::user::RegisterRequest {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
                display_name: None,
            })
            .await
            .unwrap();

        let req = test::TestRequest::put()
            .uri("/api/auth/password")
            .insert_header(("Authorization", format!("Bearer {}", session.token)))
            .set_json(json!({"current_password": "password123", "new_password": "better-password"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({"success": true, "message": "Password updated"}));

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"login": "alice", "password": "better-password"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
