use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use log::warn;

use crate::auth::AuthUser;
use crate::core::error::BlogError;
use crate::core::store::USERS;
use crate::web::models::{DataResponse, HealthResponse};
use crate::web::server::AppState;

/// Liveness check, including a round trip to the document store
pub async fn health(data: web::Data<AppState>) -> HttpResponse {
    let database = match data.store.count(USERS, &[]).await {
        Ok(_) => "ok",
        Err(e) => {
            warn!("Health check could not reach the document store: {}", e);
            "unavailable"
        }
    };

    let response = HealthResponse {
        status: if database == "ok" { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        uptime_seconds: data.started_at.elapsed().as_secs(),
    };

    HttpResponse::Ok().json(response)
}

/// Dashboard counters (admin only)
pub async fn stats(data: web::Data<AppState>, user: AuthUser) -> Result<HttpResponse, BlogError> {
    user.require_admin()?;
    let stats = data.articles.stats().await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(stats)))
}

/// Fallback for unmatched routes
pub async fn not_found(req: HttpRequest) -> HttpResponse {
    BlogError::NotFound(format!("No route for {} {}", req.method(), req.path())).error_response()
}
