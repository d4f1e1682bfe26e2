use actix_web::{web, HttpResponse};

use crate::auth::AuthUser;
use crate::core::error::BlogError;
use crate::models::article::{CreateArticleRequest, UpdateArticleRequest};
use crate::services::ArticleQuery;
use crate::web::models::{ArticleListQuery, DataResponse, GenericResponse, ListResponse};
use crate::web::server::AppState;

/// Public article listing; a valid token widens what the caller can see
pub async fn list_articles(
    data: web::Data<AppState>,
    viewer: Option<AuthUser>,
    query: web::Query<ArticleListQuery>,
) -> Result<HttpResponse, BlogError> {
    let query = query.into_inner();
    let page = data.page_request(query.page, query.limit);
    let filters = ArticleQuery::from(query);

    let articles = data.articles.list(&filters, page, viewer.as_ref()).await?;
    Ok(HttpResponse::Ok().json(ListResponse::from(articles)))
}

pub async fn get_article(
    data: web::Data<AppState>,
    viewer: Option<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse, BlogError> {
    let article = data.articles.get_by_slug(&path.into_inner(), viewer.as_ref()).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(article)))
}

/// Article by id, for the editor
pub async fn get_article_by_id(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, BlogError> {
    let article = data.articles.get(&path.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(article)))
}

pub async fn create_article(
    data: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<CreateArticleRequest>,
) -> Result<HttpResponse, BlogError> {
    let article = data.articles.create(&user, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(DataResponse::new(article)))
}

pub async fn update_article(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateArticleRequest>,
) -> Result<HttpResponse, BlogError> {
    let article = data.articles.update(&path.into_inner(), &user, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(article)))
}

pub async fn delete_article(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, BlogError> {
    data.articles.delete(&path.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(GenericResponse::message("Article deleted")))
}

#[cfg(test)]
mod tests {
    use crate::models::user::RegisterRequest;
    use crate::web::server::{test_state, AppState};
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{json, Value};

    async fn token_for(state: &AppState, username: &str) -> String {
        let session = state
            .users
            .register(RegisterRequest {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password: "password123".to_string(),
                display_name: None,
            })
            .await
            .unwrap();
        format!("Bearer {}", session.token)
    }

    #[actix_web::test]
    async fn test_publishing_flow() {
        let state = test_state();
        let app = crate::test_app!(state);
        let admin = token_for(&state, "admin").await;
        let alice = token_for(&state, "alice").await;

        // Taxonomy set up by the admin
        let req = test::TestRequest::post()
            .uri("/api/categories")
            .insert_header(("Authorization", admin.clone()))
            .set_json(json!({"name": "Rust"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let category_id = body["data"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri("/api/tags")
            .insert_header(("Authorization", admin.clone()))
            .set_json(json!({"name": "async"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let tag_id = body["data"]["id"].as_str().unwrap().to_string();

        // Anonymous callers cannot write
        let req = test::TestRequest::post()
            .uri("/api/articles")
            .set_json(json!({"title": "Nope", "content": "Body"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/api/articles")
            .insert_header(("Authorization", alice.clone()))
            .set_json(json!({
                "title": "Async Rust in Practice",
                "content": "Futures, *executors* and `Pin`.",
                "category_id": category_id,
                "tag_ids": [tag_id],
                "status": "published"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let article_id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["slug"], "async-rust-in-practice");
        assert_eq!(body["data"]["category"]["slug"], "rust");
        assert_eq!(body["data"]["tags"][0]["name"], "async");
        assert_eq!(body["data"]["author"]["username"], "alice");

        let req = test::TestRequest::post()
            .uri("/api/articles")
            .insert_header(("Authorization", alice.clone()))
            .set_json(json!({"title": "Work in progress", "content": "Draft body"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], "draft");

        // Public listing shows only the published article, without content
        let req = test::TestRequest::get().uri("/api/articles?category=rust&tag=async").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["pagination"]["total"], 1);
        assert!(body["data"][0].get("content").is_none());

        let req = test::TestRequest::get()
            .uri("/api/articles?status=all")
            .insert_header(("Authorization", alice.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["pagination"]["total"], 2);

        // Public read counts a view
        let req = test::TestRequest::get().uri("/api/articles/async-rust-in-practice").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["views"], 1);
        assert_eq!(body["data"]["content"], "Futures, *executors* and `Pin`.");

        let req = test::TestRequest::get().uri("/api/articles/work-in-progress").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        // Owner edits, admin stats, owner deletes
        let req = test::TestRequest::put()
            .uri(&format!("/api/articles/{}", article_id))
            .insert_header(("Authorization", alice.clone()))
            .set_json(json!({"title": "Async Rust, Revisited"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["slug"], "async-rust-revisited");

        let req = test::TestRequest::get()
            .uri(&format!("/api/articles/id/{}", article_id))
            .insert_header(("Authorization", admin.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["views"], 1);

        let req = test::TestRequest::get()
            .uri("/api/stats")
            .insert_header(("Authorization", admin.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["total_articles"], 2);
        assert_eq!(body["data"]["total_views"], 1);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/articles/{}", article_id))
            .insert_header(("Authorization", alice))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_ownership_is_enforced() {
        let state = test_state();
        let app = crate::test_app!(state);
        token_for(&state, "admin").await;
        let alice = token_for(&state, "alice").await;
        let bob = token_for(&state, "bob").await;

        let req = test::TestRequest::post()
            .uri("/api/articles")
            .insert_header(("Authorization", alice))
            .set_json(json!({"title": "Alice writes", "content": "Body", "status": "published"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::put()
            .uri(&format!("/api/articles/{}", id))
            .insert_header(("Authorization", bob.clone()))
            .set_json(json!({"content": "Vandalised"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/articles/{}", id))
            .insert_header(("Authorization", bob.clone()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::get()
            .uri("/api/stats")
            .insert_header(("Authorization", bob))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_invalid_token_on_public_listing_is_anonymous() {
        let state = test_state();
        let app = crate::test_app!(state);

        let req = test::TestRequest::get()
            .uri("/api/articles?sort=-views")
            .insert_header(("Authorization", "Bearer v1.bogus.token"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/articles?sort=password").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
