use actix_web::{web, HttpResponse};

use crate::auth::AuthUser;
use crate::core::error::BlogError;
use crate::models::category::{CategoryRequest, CategoryUpdate};
use crate::web::models::{DataResponse, GenericResponse};
use crate::web::server::AppState;

pub async fn list_categories(data: web::Data<AppState>) -> Result<HttpResponse, BlogError> {
    let categories = data.categories.list().await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(categories)))
}

pub async fn get_category(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, BlogError> {
    let category = data.categories.get_by_slug(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(category)))
}

pub async fn create_category(
    data: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<CategoryRequest>,
) -> Result<HttpResponse, BlogError> {
    user.require_admin()?;
    let category = data.categories.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(DataResponse::new(category)))
}

pub async fn update_category(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<CategoryUpdate>,
) -> Result<HttpResponse, BlogError> {
    user.require_admin()?;
    let category = data.categories.update(&path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(category)))
}

pub async fn delete_category(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, BlogError> {
    user.require_admin()?;
    data.categories.delete(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(GenericResponse::message("Category deleted")))
}

#[cfg(test)]
mod tests {
    use crate::models::user::RegisterRequest;
    use crate::web::server::test_state;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_category_crud() {
        let state = test_state();
        let app = crate::test_app!(state);
        let admin = state
            .users
            .register(RegisterRequest {
                username: "admin".to_string(),
                email: "admin@example.com".to_string(),
                password: "password123".to_string(),
                display_name: None,
            })
            .await
            .unwrap();
        let auth = ("Authorization", format!("Bearer {}", admin.token));

        let req = test::TestRequest::post()
            .uri("/api/categories")
            .set_json(json!({"name": "Rust"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/api/categories")
            .insert_header(auth.clone())
            .set_json(json!({"name": "Rust", "description": "Systems language"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["slug"], "rust");

        let req = test::TestRequest::post()
            .uri("/api/categories")
            .insert_header(auth.clone())
            .set_json(json!({"name": "RUST"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::put()
            .uri(&format!("/api/categories/{}", id))
            .insert_header(auth.clone())
            .set_json(json!({"name": "Rust Lang"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["slug"], "rust-lang");

        let req = test::TestRequest::get().uri("/api/categories").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"][0]["name"], "Rust Lang");
        assert_eq!(body["data"][0]["article_count"], 0);

        let req = test::TestRequest::get().uri("/api/categories/rust-lang").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/categories/{}", id))
            .insert_header(auth)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/categories/rust-lang").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
